//! Thread records — the durable unit of per-conversation state.

use crate::ids::{AgentId, ThreadId};
use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted state of one conversation.
///
/// `checkpoint` is owned by the agent graph and opaque to everything else;
/// the store round-trips it byte-for-byte. The engine treats the store as
/// the single source of truth between turns, so this record is loaded fresh
/// at the start of every invocation and written back exactly once after a
/// successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    /// The agent that most recently ran on this thread.
    pub agent_id: AgentId,
    #[serde(default)]
    pub history: Vec<Message>,
    #[serde(default)]
    pub checkpoint: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

impl ThreadRecord {
    /// A fresh thread with empty history and a null checkpoint.
    pub fn new(thread_id: ThreadId, agent_id: AgentId) -> Self {
        Self {
            thread_id,
            agent_id,
            history: Vec::new(),
            checkpoint: serde_json::Value::Null,
            updated_at: Utc::now(),
        }
    }
}
