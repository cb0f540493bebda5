//! Security module - Redaction and secret handling
//!
//! This module provides security primitives for:
//! - Sanitizing cookies, tokens, URLs and emails before they reach the logs
//! - Secure string handling with zeroization for captured credentials

mod sanitizer;
mod secure_string;

pub use sanitizer::Sanitizer;
pub use secure_string::SecureString;
