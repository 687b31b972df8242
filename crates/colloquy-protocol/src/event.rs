//! Stream events — the discriminated union delivered during a streaming run.
//!
//! Forward-compatible: unknown `"kind"` tags deserialize into
//! [`StreamEvent::Unknown`] instead of failing, so older consumers can skip
//! event kinds introduced after they were built.

use crate::ids::RunId;
use crate::message::Message;
use serde::{Deserialize, Serialize};

/// One event of a streaming run.
///
/// Every run produces exactly one terminal event: `End`, or `Error` which
/// supersedes it. `Token` events arrive in generation order; their
/// concatenation equals the `content` of the terminal assistant `Message`
/// event unless moderation replaced it.
#[derive(Debug, Clone, Serialize)]
#[non_exhaustive]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StreamEvent {
    Token {
        run_id: RunId,
        text: String,
    },
    Message {
        run_id: RunId,
        message: Message,
    },
    CustomUpdate {
        run_id: RunId,
        payload: serde_json::Value,
    },
    Error {
        run_id: RunId,
        detail: String,
    },
    End {
        run_id: RunId,
    },
    /// Pass-through for event kinds this build does not know about. The
    /// original discriminator is kept in `event_kind` (the `kind` slot is
    /// taken by this variant's own tag).
    Unknown {
        event_kind: String,
        data: serde_json::Value,
    },
}

impl StreamEvent {
    /// The wire discriminator for this event.
    pub fn kind_label(&self) -> &str {
        match self {
            Self::Token { .. } => "token",
            Self::Message { .. } => "message",
            Self::CustomUpdate { .. } => "custom_update",
            Self::Error { .. } => "error",
            Self::End { .. } => "end",
            Self::Unknown { event_kind, .. } => event_kind,
        }
    }

    /// The run this event belongs to, when known.
    pub fn run_id(&self) -> Option<&RunId> {
        match self {
            Self::Token { run_id, .. }
            | Self::Message { run_id, .. }
            | Self::CustomUpdate { run_id, .. }
            | Self::Error { run_id, .. }
            | Self::End { run_id } => Some(run_id),
            Self::Unknown { .. } => None,
        }
    }

    /// True for `End` and `Error` — no events follow either.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::End { .. } | Self::Error { .. })
    }
}

/// Helper enum covering only the known kinds; used by the deserializer.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum StreamEventKnown {
    Token { run_id: RunId, text: String },
    Message { run_id: RunId, message: Message },
    CustomUpdate { run_id: RunId, payload: serde_json::Value },
    Error { run_id: RunId, detail: String },
    End { run_id: RunId },
}

impl From<StreamEventKnown> for StreamEvent {
    fn from(known: StreamEventKnown) -> Self {
        match known {
            StreamEventKnown::Token { run_id, text } => Self::Token { run_id, text },
            StreamEventKnown::Message { run_id, message } => Self::Message { run_id, message },
            StreamEventKnown::CustomUpdate { run_id, payload } => {
                Self::CustomUpdate { run_id, payload }
            }
            StreamEventKnown::Error { run_id, detail } => Self::Error { run_id, detail },
            StreamEventKnown::End { run_id } => Self::End { run_id },
        }
    }
}

/// Forward-compatible deserializer: unknown kinds become `Unknown`.
impl<'de> Deserialize<'de> for StreamEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = serde_json::Value::deserialize(deserializer)?;
        match serde_json::from_value::<StreamEventKnown>(raw.clone()) {
            Ok(known) => Ok(known.into()),
            Err(_) => {
                let event_kind = raw
                    .get("kind")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown")
                    .to_string();
                let mut data = raw;
                if let Some(obj) = data.as_object_mut() {
                    obj.remove("kind");
                }
                Ok(StreamEvent::Unknown { event_kind, data })
            }
        }
    }
}
