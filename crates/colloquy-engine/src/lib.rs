//! Invocation engine — drives a registered agent graph for one run.
//!
//! The engine is stateless between calls: all cross-turn memory lives in the
//! thread store, which is loaded at the start of an invocation and written
//! back exactly once after the run's terminal event is determined. A crash
//! or a caller disconnecting mid-stream therefore leaves the thread's
//! record unchanged.
//!
//! Streaming is a two-phase protocol: tokens are forwarded to the caller as
//! generated and buffered internally, then the complete text is passed
//! through the moderation gate before the final assistant message is
//! emitted. Tokens already delivered are not withdrawn when the final
//! message is replaced by the safety notice.

use std::sync::Arc;

use async_stream::stream;
use chrono::Utc;
use colloquy_agents::{AgentGraph, AgentRegistry, GraphUpdate, TurnContext, TurnOutcome};
use colloquy_moderation::{AllowAllGate, ModerationGate, SAFETY_NOTICE};
use colloquy_protocol::{
    AgentId, InvokeRequest, MODERATION_METADATA_KEY, Message, RunId, ServeError, ServeResult,
    StreamEvent, THREAD_ID_METADATA_KEY, ThreadId, ThreadRecord,
};
use colloquy_store::{MemoryThreadStore, ThreadStore};
use futures_util::{StreamExt, stream::BoxStream};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

/// Ordered, finite event sequence for one streamed run. Consumable at most
/// once; terminated by exactly one `end` or `error` event.
pub type EventStream = BoxStream<'static, StreamEvent>;

/// Lifecycle of one run. `Errored` is terminal and reachable from
/// `Running`, `Moderating`, and `Persisting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Pending,
    Running,
    Moderating,
    EmittingResult,
    Persisting,
    Done,
    Errored,
}

impl RunPhase {
    fn advance(&mut self, next: RunPhase, run_id: &RunId) {
        debug!(run_id = %run_id, from = ?self, to = ?next, "run phase advanced");
        *self = next;
    }
}

/// Assembles an [`InvocationEngine`] from a registry, a thread store, and a
/// moderation gate. Defaults to an in-memory store and a gate that never
/// flags.
pub struct EngineBuilder {
    registry: AgentRegistry,
    store: Arc<dyn ThreadStore>,
    gate: Arc<dyn ModerationGate>,
}

impl EngineBuilder {
    pub fn new(registry: AgentRegistry) -> Self {
        Self {
            registry,
            store: Arc::new(MemoryThreadStore::new()),
            gate: Arc::new(AllowAllGate),
        }
    }

    pub fn store(mut self, store: Arc<dyn ThreadStore>) -> Self {
        self.store = store;
        self
    }

    pub fn gate(mut self, gate: Arc<dyn ModerationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn build(self) -> InvocationEngine {
        InvocationEngine {
            registry: Arc::new(self.registry),
            store: self.store,
            gate: self.gate,
        }
    }
}

#[derive(Clone)]
pub struct InvocationEngine {
    registry: Arc<AgentRegistry>,
    store: Arc<dyn ThreadStore>,
    gate: Arc<dyn ModerationGate>,
}

/// Everything resolved up front for one run: the graph, the thread's
/// loaded record, and the merged per-call configuration.
struct PreparedRun {
    run_id: RunId,
    agent_id: AgentId,
    thread_id: ThreadId,
    graph: Arc<dyn AgentGraph>,
    record: ThreadRecord,
    input: String,
    config: serde_json::Value,
}

impl PreparedRun {
    fn turn_context(&self) -> TurnContext {
        TurnContext {
            run_id: self.run_id.clone(),
            thread_id: self.thread_id.clone(),
            agent_id: self.agent_id.clone(),
            history: self.record.history.clone(),
            checkpoint: self.record.checkpoint.clone(),
            input: self.input.clone(),
            config: self.config.clone(),
        }
    }

    fn execution_error(&self, detail: impl Into<String>) -> ServeError {
        ServeError::AgentExecution {
            agent_id: self.agent_id.clone(),
            thread_id: self.thread_id.clone(),
            run_id: self.run_id.clone(),
            detail: detail.into(),
        }
    }

    /// Fold the completed turn into the thread record before persisting.
    fn seal(&mut self, interim: Vec<Message>, final_message: Message, checkpoint: serde_json::Value) {
        self.record.agent_id = self.agent_id.clone();
        self.record
            .history
            .push(Message::human(self.run_id.clone(), self.input.clone()));
        self.record.history.extend(interim);
        self.record.history.push(final_message);
        self.record.checkpoint = checkpoint;
        self.record.updated_at = Utc::now();
    }
}

impl InvocationEngine {
    pub fn builder(registry: AgentRegistry) -> EngineBuilder {
        EngineBuilder::new(registry)
    }

    /// The read-only agent registry, for discovery.
    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Drive one run to completion and return the final (possibly
    /// moderated) assistant message.
    #[instrument(skip(self, request), fields(agent_id = %agent_id))]
    pub async fn invoke(&self, agent_id: &AgentId, request: InvokeRequest) -> ServeResult<Message> {
        let mut run = self.prepare(agent_id, request).await?;
        let mut phase = RunPhase::Pending;
        phase.advance(RunPhase::Running, &run.run_id);

        let outcome = run
            .graph
            .invoke(run.turn_context())
            .await
            .map_err(|error| run.execution_error(format!("{error:#}")))?;
        let TurnOutcome {
            mut message,
            interim,
            checkpoint,
        } = outcome;

        phase.advance(RunPhase::Moderating, &run.run_id);
        self.moderate(&run, &mut message).await?;
        message.set_metadata(THREAD_ID_METADATA_KEY, json!(run.thread_id.as_str()));

        phase.advance(RunPhase::Persisting, &run.run_id);
        run.seal(interim, message.clone(), checkpoint);
        self.save(&run).await?;

        phase.advance(RunPhase::Done, &run.run_id);
        info!(
            run_id = %run.run_id,
            thread_id = %run.thread_id,
            messages = run.record.history.len(),
            "run completed"
        );
        Ok(message)
    }

    /// Drive one run, yielding events as they are produced.
    ///
    /// Agent resolution and the thread load happen before the stream is
    /// returned, so routing and store failures surface as errors rather
    /// than in-band events. Dropping the stream cancels the run at its
    /// next suspension point without persisting anything.
    #[instrument(skip(self, request), fields(agent_id = %agent_id))]
    pub async fn stream(
        &self,
        agent_id: &AgentId,
        request: InvokeRequest,
    ) -> ServeResult<EventStream> {
        let run = self.prepare(agent_id, request).await?;
        let engine = self.clone();

        let events = stream! {
            let mut run = run;
            let run_id = run.run_id.clone();
            let mut phase = RunPhase::Pending;
            phase.advance(RunPhase::Running, &run_id);

            let mut updates = run.graph.stream(run.turn_context());
            let mut buffered = String::new();
            let mut interim = Vec::new();
            let mut completed: Option<(Message, serde_json::Value)> = None;

            while let Some(update) = updates.next().await {
                match update {
                    Ok(GraphUpdate::Token { text }) => {
                        buffered.push_str(&text);
                        yield StreamEvent::Token { run_id: run_id.clone(), text };
                    }
                    Ok(GraphUpdate::Interim { message }) => {
                        interim.push(message.clone());
                        yield StreamEvent::Message { run_id: run_id.clone(), message };
                    }
                    Ok(GraphUpdate::Custom { payload }) => {
                        yield StreamEvent::CustomUpdate { run_id: run_id.clone(), payload };
                    }
                    Ok(GraphUpdate::Final { message, checkpoint }) => {
                        completed = Some((message, checkpoint));
                        break;
                    }
                    Err(error) => {
                        phase.advance(RunPhase::Errored, &run_id);
                        let serve_error = run.execution_error(format!("{error:#}"));
                        warn!(error = %serve_error, "run errored while streaming");
                        yield StreamEvent::Error {
                            run_id: run_id.clone(),
                            detail: serve_error.to_string(),
                        };
                        return;
                    }
                }
            }
            drop(updates);

            let Some((mut message, checkpoint)) = completed else {
                phase.advance(RunPhase::Errored, &run_id);
                let serve_error =
                    run.execution_error("agent graph ended without a final message");
                warn!(error = %serve_error, "run errored while streaming");
                yield StreamEvent::Error {
                    run_id: run_id.clone(),
                    detail: serve_error.to_string(),
                };
                return;
            };

            // Graphs that only emit tokens may leave the final content to
            // the engine's buffer.
            if message.content.is_empty() && !buffered.is_empty() {
                message.content = buffered;
            }

            phase.advance(RunPhase::Moderating, &run_id);
            if let Err(serve_error) = engine.moderate(&run, &mut message).await {
                phase.advance(RunPhase::Errored, &run_id);
                warn!(error = %serve_error, "run errored while moderating");
                yield StreamEvent::Error {
                    run_id: run_id.clone(),
                    detail: serve_error.to_string(),
                };
                return;
            }
            message.set_metadata(THREAD_ID_METADATA_KEY, json!(run.thread_id.as_str()));

            phase.advance(RunPhase::EmittingResult, &run_id);
            yield StreamEvent::Message {
                run_id: run_id.clone(),
                message: message.clone(),
            };

            phase.advance(RunPhase::Persisting, &run_id);
            run.seal(interim, message, checkpoint);
            if let Err(serve_error) = engine.save(&run).await {
                phase.advance(RunPhase::Errored, &run_id);
                warn!(error = %serve_error, "run errored while persisting");
                yield StreamEvent::Error {
                    run_id: run_id.clone(),
                    detail: serve_error.to_string(),
                };
                return;
            }

            phase.advance(RunPhase::Done, &run_id);
            info!(run_id = %run_id, thread_id = %run.thread_id, "run completed");
            yield StreamEvent::End { run_id };
        };

        Ok(events.boxed())
    }

    async fn prepare(&self, agent_id: &AgentId, request: InvokeRequest) -> ServeResult<PreparedRun> {
        let agent = self.registry.get(agent_id)?;
        let graph = agent.graph.clone();
        let config = merge_config(&agent.descriptor.default_config, &request.config);

        let thread_id = request.thread_id.unwrap_or_default();
        let record = self
            .store
            .load(&thread_id)
            .await
            .map_err(|error| ServeError::Store {
                thread_id: thread_id.clone(),
                detail: format!("{error:#}"),
            })?
            .unwrap_or_else(|| ThreadRecord::new(thread_id.clone(), agent_id.clone()));

        Ok(PreparedRun {
            run_id: RunId::new_uuid(),
            agent_id: agent_id.clone(),
            thread_id,
            graph,
            record,
            input: request.input,
            config,
        })
    }

    /// Gate the completed assistant message. Called once per run, never
    /// per token. A flagged verdict replaces the content with the safety
    /// notice; a gate failure fails the run.
    async fn moderate(&self, run: &PreparedRun, message: &mut Message) -> ServeResult<()> {
        let verdict = self
            .gate
            .check(&message.content)
            .await
            .map_err(|error| run.execution_error(format!("moderation check failed: {error:#}")))?;

        if verdict.flagged {
            let category = verdict.category.unwrap_or_else(|| "flagged".to_owned());
            warn!(
                run_id = %run.run_id,
                category = category.as_str(),
                "assistant message flagged; substituting safety notice"
            );
            message.content = SAFETY_NOTICE.to_owned();
            message.set_metadata(MODERATION_METADATA_KEY, json!(category));
        }
        Ok(())
    }

    async fn save(&self, run: &PreparedRun) -> ServeResult<()> {
        self.store
            .save(&run.record)
            .await
            .map_err(|error| ServeError::Store {
                thread_id: run.thread_id.clone(),
                detail: format!("{error:#}"),
            })
    }
}

/// Shallow-merge per-call overrides over the agent's default config.
/// Non-object overrides replace the default wholesale; null leaves it
/// untouched.
fn merge_config(default: &serde_json::Value, overrides: &serde_json::Value) -> serde_json::Value {
    use serde_json::Value;
    match (default, overrides) {
        (_, Value::Null) => default.clone(),
        (Value::Object(base), Value::Object(over)) => {
            let mut merged = base.clone();
            for (key, value) in over {
                merged.insert(key.clone(), value.clone());
            }
            Value::Object(merged)
        }
        (_, overrides) => overrides.clone(),
    }
}
