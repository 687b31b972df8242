//! Moderation gate — the safety check applied to a completed assistant
//! message before it is released to the caller.
//!
//! The gate sees complete messages only, never individual tokens. A gate
//! failure (classifier unreachable, model error) is an error for the run,
//! never an implicit "not flagged".

use anyhow::Result;
use async_trait::async_trait;
use colloquy_protocol::ModerationVerdict;
use tracing::{debug, warn};

/// Content substituted for a flagged assistant message.
pub const SAFETY_NOTICE: &str =
    "This response was withheld because it did not pass the content safety check.";

#[async_trait]
pub trait ModerationGate: Send + Sync {
    /// Classify one candidate assistant message. Stateless and
    /// side-effect-free from the caller's perspective.
    async fn check(&self, candidate: &str) -> Result<ModerationVerdict>;
}

/// Gate that never flags. Default wiring for deployments that run without
/// a classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllowAllGate;

#[async_trait]
impl ModerationGate for AllowAllGate {
    async fn check(&self, _candidate: &str) -> Result<ModerationVerdict> {
        Ok(ModerationVerdict::pass())
    }
}

/// Case-insensitive substring classifier over a fixed blocklist.
///
/// The verdict category names the matched term, so the flagged message's
/// metadata records what tripped the gate.
#[derive(Debug, Default, Clone)]
pub struct KeywordGate {
    blocklist: Vec<String>,
}

impl KeywordGate {
    pub fn new(blocklist: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            blocklist: blocklist
                .into_iter()
                .map(|term| term.into().to_lowercase())
                .collect(),
        }
    }
}

#[async_trait]
impl ModerationGate for KeywordGate {
    async fn check(&self, candidate: &str) -> Result<ModerationVerdict> {
        let lowered = candidate.to_lowercase();
        for term in &self.blocklist {
            if !term.is_empty() && lowered.contains(term.as_str()) {
                warn!(term = term.as_str(), "candidate message flagged");
                return Ok(ModerationVerdict::flag(term.clone()));
            }
        }
        debug!("candidate message passed moderation");
        Ok(ModerationVerdict::pass())
    }
}
