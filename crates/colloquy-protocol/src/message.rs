//! Message model — one conversation turn or event.

use crate::ids::RunId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Open metadata bag attached to a message (model name, token usage,
/// moderation category, thread id).
pub type Metadata = HashMap<String, serde_json::Value>;

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Assistant,
    Tool,
    System,
    Custom,
}

/// A tool invocation requested by the assistant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A single conversation turn. Every message belongs to exactly one run;
/// a `tool` message references a `tool_call_id` emitted earlier in that run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    pub run_id: RunId,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub metadata: Metadata,
}

impl Message {
    pub fn new(role: Role, run_id: RunId, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_call_id: None,
            run_id,
            metadata: Metadata::new(),
        }
    }

    pub fn human(run_id: RunId, content: impl Into<String>) -> Self {
        Self::new(Role::Human, run_id, content)
    }

    pub fn assistant(run_id: RunId, content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, run_id, content)
    }

    /// A tool result message answering `tool_call_id`.
    pub fn tool(run_id: RunId, tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut message = Self::new(Role::Tool, run_id, content);
        message.tool_call_id = Some(tool_call_id.into());
        message
    }

    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// Insert one metadata entry, replacing any previous value for the key.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: serde_json::Value) {
        self.metadata.insert(key.into(), value);
    }
}
