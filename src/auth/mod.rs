//! Authentication module - Page cookies and captured credentials
//!
//! Provides:
//! - Cookie records and change fingerprints for the active page
//! - A vault for bearer tokens captured from provider API traffic
//! - The payload handed to the backend on import

mod cookies;
mod credentials;

pub use cookies::{Cookie, CookieError, CookieJar, CookieSource, Fingerprint};
pub use credentials::{CredentialVault, ImportPayload, SessionIdentifiers};

#[cfg(test)]
pub use cookies::MockCookieSource;
