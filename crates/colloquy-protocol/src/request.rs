//! Wire request shapes shared by the service and the client library.

use crate::ids::ThreadId;
use serde::{Deserialize, Serialize};

/// Body of both the blocking and the streaming invoke endpoints.
///
/// When `thread_id` is absent the service mints one and echoes it in the
/// response message's `metadata.thread_id`, so the caller can continue the
/// conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvokeRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    pub input: String,
    /// Per-call overrides, merged shallowly over the agent's default config.
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

impl InvokeRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            thread_id: None,
            input: input.into(),
            config: serde_json::Value::Null,
        }
    }

    pub fn with_thread_id(mut self, thread_id: impl Into<ThreadId>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }
}

/// Metadata key carrying the (possibly server-generated) thread id on the
/// response message.
pub const THREAD_ID_METADATA_KEY: &str = "thread_id";

/// Metadata key set on a moderated message; the value is the verdict
/// category.
pub const MODERATION_METADATA_KEY: &str = "moderation";
