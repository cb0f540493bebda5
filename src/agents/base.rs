//! Base agent trait and types
//!
//! The navigation and session watchers are both long-running tasks with the
//! same lifecycle, expressed by the [`Agent`] trait.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in agents
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent is already running
    #[error("Agent is already running")]
    AlreadyRunning,

    /// No agent registered under that id
    #[error("Agent '{0}' not found")]
    NotFound(String),
}

/// Status of an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// Never started
    Idle,
    Running,
    /// Stopped after running
    Stopped,
}

impl AgentStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, AgentStatus::Running)
    }
}

/// Trait for background agents
///
/// `start` runs the agent's loop until `stop` is called, so callers spawn it.
/// `stop` is idempotent and a stopped agent may be started again.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the unique identifier for this agent
    fn id(&self) -> &'static str;

    /// Returns the display name for this agent
    fn name(&self) -> &'static str;

    fn status(&self) -> AgentStatus;

    /// Runs the agent until it is stopped
    async fn start(&self) -> Result<(), AgentError>;

    /// Signals the agent to stop; a no-op unless it is running
    async fn stop(&self) -> Result<(), AgentError>;

    /// Performs one unit of work immediately (if supported)
    async fn trigger(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
