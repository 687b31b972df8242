//! Agent descriptors — static metadata served by the discovery endpoint.

use crate::ids::AgentId;
use serde::{Deserialize, Serialize};

/// What an agent graph supports.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub tools: bool,
}

/// Static metadata for one registered agent. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub agent_id: AgentId,
    pub description: String,
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    /// Baseline configuration handed to the graph; per-call overrides are
    /// merged over it.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub default_config: serde_json::Value,
}

impl AgentDescriptor {
    pub fn new(agent_id: impl Into<AgentId>, description: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            description: description.into(),
            capabilities: AgentCapabilities::default(),
            default_config: serde_json::Value::Null,
        }
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_default_config(mut self, default_config: serde_json::Value) -> Self {
        self.default_config = default_config;
        self
    }
}
