//! Agent graph contract, registry, and built-in demo graphs.

pub mod builtin;
pub mod graph;
pub mod registry;

pub use builtin::{BackgroundTaskAgent, CalculatorAgent, EchoAgent};
pub use graph::{AgentGraph, GraphStream, GraphUpdate, TurnContext, TurnOutcome};
pub use registry::{AgentRegistry, RegisteredAgent};
