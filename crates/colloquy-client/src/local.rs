//! In-process client — same contract, no network.

use async_trait::async_trait;
use colloquy_agents::AgentRegistry;
use colloquy_engine::InvocationEngine;
use colloquy_protocol::{AgentDescriptor, AgentId, InvokeRequest, Message};
use futures_util::StreamExt;

use crate::error::ClientError;
use crate::invoker::{AgentInvoker, ClientEventStream};

/// Drives an [`InvocationEngine`] directly instead of talking to a remote
/// service. Event ordering and token-to-content reconstruction are
/// identical to the wire path, so swapping this for a
/// [`crate::ServiceClient`] is transparent to the caller.
#[derive(Clone)]
pub struct LocalClient {
    engine: InvocationEngine,
}

impl LocalClient {
    pub fn new(engine: InvocationEngine) -> Self {
        Self { engine }
    }

    /// An engine over the given registry with in-memory state and no
    /// moderation classifier — the quickest way to drive a graph locally.
    pub fn in_memory(registry: AgentRegistry) -> Self {
        Self::new(InvocationEngine::builder(registry).build())
    }
}

#[async_trait]
impl AgentInvoker for LocalClient {
    async fn agents(&self) -> Result<Vec<AgentDescriptor>, ClientError> {
        Ok(self.engine.registry().list())
    }

    async fn invoke(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<Message, ClientError> {
        Ok(self.engine.invoke(agent_id, request).await?)
    }

    async fn stream(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> Result<ClientEventStream, ClientError> {
        let events = self.engine.stream(agent_id, request).await?;
        Ok(events.map(Ok).boxed())
    }
}
