//! Agent manager - Runs the watchers of a page session
//!
//! Spawns each agent's loop on the tokio runtime and tracks the task handles
//! so the whole page session can be stopped at once.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::base::{Agent, AgentError, AgentStatus};

/// Manages the lifecycle of multiple agents
pub struct AgentManager {
    agents: RwLock<HashMap<&'static str, Arc<dyn Agent>>>,
    handles: RwLock<HashMap<&'static str, JoinHandle<()>>>,
}

impl AgentManager {
    pub fn new() -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            handles: RwLock::new(HashMap::new()),
        }
    }

    /// Registers an agent with the manager
    pub async fn register(&self, agent: Arc<dyn Agent>) {
        let id = agent.id();
        self.agents.write().await.insert(id, agent);
    }

    pub async fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.read().await.get(id).cloned()
    }

    /// Starts every registered agent that is not already running
    pub async fn start_all(&self) -> Result<(), AgentError> {
        let agents = self.agents.read().await.clone();

        for (id, agent) in agents {
            if !self.is_spawned(id).await {
                self.spawn(id, agent).await;
            }
        }

        Ok(())
    }

    async fn is_spawned(&self, id: &'static str) -> bool {
        self.handles
            .read()
            .await
            .get(id)
            .is_some_and(|h| !h.is_finished())
    }

    /// Spawns the agent's loop and waits until it runs
    ///
    /// A `stop_all` right after `start_all` would otherwise reach the agent
    /// before its run began, and agents ignore stops while not running.
    async fn spawn(&self, id: &'static str, agent: Arc<dyn Agent>) {
        let runner = agent.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = runner.start().await {
                tracing::error!("Agent '{}' error: {}", runner.id(), e);
            }
        });

        while !agent.status().is_running() && !handle.is_finished() {
            tokio::task::yield_now().await;
        }

        self.handles.write().await.insert(id, handle);
        tracing::info!("Started agent: {}", id);
    }

    /// Stops all agents and waits for their loops to exit
    pub async fn stop_all(&self) -> Result<(), AgentError> {
        let agents = self.agents.read().await.clone();

        for (id, agent) in agents {
            agent.stop().await?;

            let handle = self.handles.write().await.remove(id);
            if let Some(handle) = handle {
                if let Err(e) = handle.await {
                    if !e.is_cancelled() {
                        tracing::warn!("Agent '{}' task ended abnormally: {}", id, e);
                    }
                }
                tracing::info!("Stopped agent: {}", id);
            }
        }

        Ok(())
    }

    /// Gets the status of all agents
    pub async fn status(&self) -> HashMap<&'static str, AgentStatus> {
        let agents = self.agents.read().await;
        agents
            .iter()
            .map(|(id, agent)| (*id, agent.status()))
            .collect()
    }

    pub async fn agent_count(&self) -> usize {
        self.agents.read().await.len()
    }

    /// Triggers a specific agent
    pub async fn trigger_agent(&self, id: &str) -> Result<(), AgentError> {
        let agent = self.agents.read().await.get(id).cloned();

        match agent {
            Some(agent) => agent.trigger().await,
            None => Err(AgentError::NotFound(id.to_string())),
        }
    }
}

impl Default for AgentManager {
    fn default() -> Self {
        Self::new()
    }
}
