//! The calling-convention contract shared by remote and local clients.

use async_trait::async_trait;
use colloquy_protocol::{AgentDescriptor, AgentId, InvokeRequest, Message, StreamEvent};
use futures_util::stream::BoxStream;

use crate::error::ClientError;

/// Reconstructed event sequence for one streamed run, terminating after the
/// `end`/`error` event. Restartable per invocation, not resumable
/// mid-stream.
pub type ClientEventStream = BoxStream<'static, Result<StreamEvent, ClientError>>;

/// Uniform calling conventions over the agent-service contract.
///
/// Implemented by [`crate::ServiceClient`] (remote HTTP/SSE) and
/// [`crate::LocalClient`] (in-process engine); callers can switch between
/// them without changing how they read messages or streams.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// List the descriptors of every agent the service exposes.
    async fn agents(&self) -> Result<Vec<AgentDescriptor>, ClientError>;

    /// Run one turn and wait for the final message.
    async fn invoke(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<Message, ClientError>;

    /// Run one turn, yielding events as the service produces them.
    async fn stream(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<ClientEventStream, ClientError>;

    /// Synchronous convenience over [`invoke`](Self::invoke) for callers
    /// without a runtime. Spins up a current-thread runtime per call and
    /// refuses to run inside an existing one.
    fn invoke_blocking(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<Message, ClientError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ClientError::Runtime(
                "invoke_blocking called inside an async runtime; use invoke instead".to_owned(),
            ));
        }
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|error| ClientError::Runtime(error.to_string()))?;
        runtime.block_on(self.invoke(agent_id, request))
    }
}
