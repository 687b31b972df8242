//! # colloquy-client — calling conventions over the agent-service contract
//!
//! Three ways to call an agent, all over one contract:
//!
//! - async: [`AgentInvoker::invoke`]
//! - blocking: [`AgentInvoker::invoke_blocking`]
//! - streaming: [`AgentInvoker::stream`]
//!
//! Two implementations: [`ServiceClient`] talks to a remote colloquy-api
//! over HTTP/SSE; [`LocalClient`] drives the same engine in-process.
//! Unknown stream event kinds arrive as `StreamEvent::Unknown` and should
//! be skipped, not treated as fatal.

pub mod error;
pub mod invoker;
pub mod local;
pub mod remote;
mod sse;

pub use error::ClientError;
pub use invoker::{AgentInvoker, ClientEventStream};
pub use local::LocalClient;
pub use remote::ServiceClient;
