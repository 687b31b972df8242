//! The runnable-agent boundary.
//!
//! Every agent exposes the same capability set — blocking invocation,
//! streaming invocation, resumption from a checkpoint — through one trait,
//! selected by identifier through the registry. Heterogeneous internals
//! (model providers, tool loops) live behind this boundary and must surface
//! failures as a single error per run.
//!
//! Object-safety note: async methods use `async-trait`; streaming returns a
//! boxed stream (`GraphStream`).

use anyhow::Result;
use async_trait::async_trait;
use colloquy_protocol::{AgentId, Message, RunId, ThreadId};
use futures_util::stream::BoxStream;

/// Everything a graph sees for one turn: the thread's prior history, the
/// opaque checkpoint it wrote last time, the new input, and the merged
/// per-call configuration.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub run_id: RunId,
    pub thread_id: ThreadId,
    pub agent_id: AgentId,
    pub history: Vec<Message>,
    pub checkpoint: serde_json::Value,
    pub input: String,
    pub config: serde_json::Value,
}

/// One update yielded while a graph streams a turn.
#[derive(Debug, Clone)]
pub enum GraphUpdate {
    /// A chunk of generated assistant text, in generation order.
    Token { text: String },
    /// An intermediate message (tool call, tool result) produced mid-run.
    Interim { message: Message },
    /// A graph-defined update forwarded to the caller verbatim.
    Custom { payload: serde_json::Value },
    /// The completed turn. A graph yields exactly one of these, last.
    Final {
        message: Message,
        checkpoint: serde_json::Value,
    },
}

/// Result of driving a graph to completion in blocking mode.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The final assistant message.
    pub message: Message,
    /// Intermediate messages produced during the run, in order.
    pub interim: Vec<Message>,
    /// The checkpoint to persist for the next turn.
    pub checkpoint: serde_json::Value,
}

/// Ordered sequence of updates for one streamed turn.
pub type GraphStream = BoxStream<'static, Result<GraphUpdate>>;

/// A runnable agent graph.
///
/// Implementations must be deterministic about ordering: tokens and interim
/// updates come in generation order, and `Final` is the last update of a
/// streamed turn. The concatenation of `Token` texts must equal the final
/// assistant message's content.
#[async_trait]
pub trait AgentGraph: Send + Sync {
    /// Drive one turn to completion.
    async fn invoke(&self, ctx: TurnContext) -> Result<TurnOutcome>;

    /// Drive one turn, yielding updates as they are produced.
    fn stream(&self, ctx: TurnContext) -> GraphStream;
}
