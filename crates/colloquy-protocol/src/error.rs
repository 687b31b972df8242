//! Error taxonomy for serving agents.

use crate::ids::{AgentId, RunId, ThreadId};
use thiserror::Error;

/// Errors surfaced by the registry, engine, and transport.
#[derive(Debug, Error)]
pub enum ServeError {
    /// Routing input named an agent that is not registered.
    #[error("unknown agent: {0}")]
    UnknownAgent(AgentId),
    /// Startup-time misconfiguration; fatal at load.
    #[error("duplicate agent: {0}")]
    DuplicateAgent(AgentId),
    /// Any failure while driving the agent graph, a provider call inside
    /// it, or the moderation check.
    #[error("agent execution failed (agent {agent_id}, thread {thread_id}, run {run_id}): {detail}")]
    AgentExecution {
        agent_id: AgentId,
        thread_id: ThreadId,
        run_id: RunId,
        detail: String,
    },
    /// Thread store load/save failure. A load failure for an existing
    /// thread is fatal — never masked as a fresh thread.
    #[error("thread store failure (thread {thread_id}): {detail}")]
    Store { thread_id: ThreadId, detail: String },
    /// Serialization or connection failure at the wire boundary.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Convenience result type for serving operations.
pub type ServeResult<T> = Result<T, ServeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_error_carries_run_context() {
        let error = ServeError::AgentExecution {
            agent_id: "chatbot".into(),
            thread_id: "t1".into(),
            run_id: "r1".into(),
            detail: "provider timeout".to_owned(),
        };
        let rendered = error.to_string();
        assert!(rendered.contains("chatbot"));
        assert!(rendered.contains("t1"));
        assert!(rendered.contains("r1"));
        assert!(rendered.contains("provider timeout"));
    }

    #[test]
    fn unknown_agent_names_the_agent() {
        let error = ServeError::UnknownAgent("missing".into());
        assert_eq!(error.to_string(), "unknown agent: missing");
    }
}
