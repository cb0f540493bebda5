//! Agent module - Background watchers of a page session
//!
//! Provides agents for:
//! - Provider detection on navigation
//! - Login session polling, import and logout

mod base;
mod manager;
mod navigation_watcher;
mod session_state;
mod session_watcher;

pub use base::{Agent, AgentError, AgentStatus};
pub use manager::AgentManager;
pub use navigation_watcher::{DetectionCallback, NavigationEvent, NavigationSource, NavigationWatcher};
pub use session_state::{ImportLimiter, SessionMachine, SessionPhase, SessionTiming, Transition};
pub use session_watcher::{SessionWatcher, TransitionCallback};
