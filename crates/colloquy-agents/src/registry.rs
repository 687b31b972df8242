//! Agent registry — id → graph + descriptor, populated once at startup.

use std::sync::Arc;

use colloquy_protocol::{AgentDescriptor, AgentId, ServeError, ServeResult};
use indexmap::IndexMap;

use crate::graph::AgentGraph;

/// A graph paired with its descriptive metadata.
#[derive(Clone)]
pub struct RegisteredAgent {
    pub graph: Arc<dyn AgentGraph>,
    pub descriptor: AgentDescriptor,
}

/// Registration-ordered mapping from agent id to runnable agent.
///
/// Registration happens during process startup; afterwards the registry is
/// shared read-only (wrap in `Arc`), so lookups take no lock.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    agents: IndexMap<String, RegisteredAgent>,
    default_agent: Option<AgentId>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a graph under `descriptor.agent_id`. The first registered
    /// agent becomes the default unless overridden.
    pub fn register(
        &mut self,
        graph: Arc<dyn AgentGraph>,
        descriptor: AgentDescriptor,
    ) -> ServeResult<()> {
        let agent_id = descriptor.agent_id.clone();
        if self.agents.contains_key(agent_id.as_str()) {
            return Err(ServeError::DuplicateAgent(agent_id));
        }
        if self.default_agent.is_none() {
            self.default_agent = Some(agent_id.clone());
        }
        self.agents
            .insert(agent_id.as_str().to_owned(), RegisteredAgent { graph, descriptor });
        Ok(())
    }

    pub fn set_default_agent(&mut self, agent_id: AgentId) -> ServeResult<()> {
        if !self.agents.contains_key(agent_id.as_str()) {
            return Err(ServeError::UnknownAgent(agent_id));
        }
        self.default_agent = Some(agent_id);
        Ok(())
    }

    pub fn get(&self, agent_id: &AgentId) -> ServeResult<&RegisteredAgent> {
        self.agents
            .get(agent_id.as_str())
            .ok_or_else(|| ServeError::UnknownAgent(agent_id.clone()))
    }

    /// All descriptors, in registration order.
    pub fn list(&self) -> Vec<AgentDescriptor> {
        self.agents
            .values()
            .map(|agent| agent.descriptor.clone())
            .collect()
    }

    pub fn default_agent(&self) -> Option<&AgentId> {
        self.default_agent.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::EchoAgent;
    use colloquy_protocol::ServeError;

    fn echo_descriptor(id: &str) -> AgentDescriptor {
        AgentDescriptor::new(id, "test agent")
    }

    #[test]
    fn register_and_get() {
        let mut registry = AgentRegistry::new();
        registry
            .register(Arc::new(EchoAgent), echo_descriptor("echo"))
            .unwrap();

        let agent = registry.get(&"echo".into()).unwrap();
        assert_eq!(agent.descriptor.agent_id.as_str(), "echo");
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut registry = AgentRegistry::new();
        registry
            .register(Arc::new(EchoAgent), echo_descriptor("echo"))
            .unwrap();
        let error = registry
            .register(Arc::new(EchoAgent), echo_descriptor("echo"))
            .unwrap_err();
        assert!(matches!(error, ServeError::DuplicateAgent(id) if id.as_str() == "echo"));
    }

    #[test]
    fn unknown_agent_lookup_fails() {
        let registry = AgentRegistry::new();
        let error = match registry.get(&"missing".into()) {
            Err(error) => error,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(error, ServeError::UnknownAgent(id) if id.as_str() == "missing"));
    }

    #[test]
    fn list_preserves_registration_order() {
        let mut registry = AgentRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry
                .register(Arc::new(EchoAgent), echo_descriptor(id))
                .unwrap();
        }
        let ids: Vec<String> = registry
            .list()
            .into_iter()
            .map(|d| d.agent_id.as_str().to_owned())
            .collect();
        assert_eq!(ids, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn first_registered_agent_is_default() {
        let mut registry = AgentRegistry::new();
        registry
            .register(Arc::new(EchoAgent), echo_descriptor("first"))
            .unwrap();
        registry
            .register(Arc::new(EchoAgent), echo_descriptor("second"))
            .unwrap();
        assert_eq!(registry.default_agent().unwrap().as_str(), "first");

        registry.set_default_agent("second".into()).unwrap();
        assert_eq!(registry.default_agent().unwrap().as_str(), "second");
    }
}
