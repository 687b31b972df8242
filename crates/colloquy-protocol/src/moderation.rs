//! Moderation verdicts — the contract with the safety classifier.

use serde::{Deserialize, Serialize};

/// Outcome of checking one candidate assistant message.
///
/// Never persisted on its own; a flagged verdict is reflected in the final
/// message's metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModerationVerdict {
    pub flagged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ModerationVerdict {
    /// A passing verdict.
    pub fn pass() -> Self {
        Self::default()
    }

    /// A flagged verdict with the given category.
    pub fn flag(category: impl Into<String>) -> Self {
        Self {
            flagged: true,
            category: Some(category.into()),
        }
    }
}
