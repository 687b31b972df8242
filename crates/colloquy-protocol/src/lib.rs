//! # colloquy-protocol — shared service contract
//!
//! Defines the types every colloquy crate speaks: the message model, the
//! stream event union, agent descriptors, thread records, wire request
//! shapes, moderation verdicts, and the error taxonomy.
//!
//! Intentionally dependency-light (no tokio, axum, or reqwest) so both the
//! service and the client library can depend on it as a pure contract crate.
//!
//! ## Module Overview
//!
//! - [`ids`] — Typed ID wrappers (AgentId, ThreadId, RunId)
//! - [`message`] — Message, Role, ToolCall, Metadata
//! - [`event`] — StreamEvent (forward-compatible tagged union)
//! - [`descriptor`] — AgentDescriptor, AgentCapabilities
//! - [`thread`] — ThreadRecord (durable per-conversation state)
//! - [`request`] — InvokeRequest and wire metadata keys
//! - [`moderation`] — ModerationVerdict
//! - [`error`] — ServeError, ServeResult

pub mod descriptor;
pub mod error;
pub mod event;
pub mod ids;
pub mod message;
pub mod moderation;
pub mod request;
pub mod thread;

pub use descriptor::{AgentCapabilities, AgentDescriptor};
pub use error::{ServeError, ServeResult};
pub use event::StreamEvent;
pub use ids::{AgentId, RunId, ThreadId};
pub use message::{Message, Metadata, Role, ToolCall};
pub use moderation::ModerationVerdict;
pub use request::{InvokeRequest, MODERATION_METADATA_KEY, THREAD_ID_METADATA_KEY};
pub use thread::ThreadRecord;
