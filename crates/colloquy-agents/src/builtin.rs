//! Built-in demo graphs.
//!
//! These exist to smoke-test the serving stack end to end without a model
//! provider behind them. Real deployments register their own graphs.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use colloquy_protocol::{AgentCapabilities, AgentDescriptor, Message, ToolCall};
use futures_util::StreamExt;
use serde_json::json;

use crate::graph::{AgentGraph, GraphStream, GraphUpdate, TurnContext, TurnOutcome};
use crate::registry::AgentRegistry;

/// Completed turns recorded in a demo checkpoint.
fn turn_count(checkpoint: &serde_json::Value) -> u64 {
    checkpoint
        .get("turns")
        .and_then(|v| v.as_u64())
        .unwrap_or(0)
}

/// Word-boundary token chunks whose concatenation equals the input.
fn split_tokens(text: &str) -> Vec<String> {
    text.split_inclusive(' ').map(str::to_owned).collect()
}

/// Repeats the user's input back, streamed token by token.
///
/// Its checkpoint counts completed turns, which makes cross-turn state
/// visible in demos: `{"turns": N}` after N invocations on a thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoAgent;

#[async_trait]
impl AgentGraph for EchoAgent {
    async fn invoke(&self, ctx: TurnContext) -> Result<TurnOutcome> {
        let turns = turn_count(&ctx.checkpoint) + 1;
        Ok(TurnOutcome {
            message: Message::assistant(ctx.run_id, ctx.input),
            interim: Vec::new(),
            checkpoint: json!({ "turns": turns }),
        })
    }

    fn stream(&self, ctx: TurnContext) -> GraphStream {
        let turns = turn_count(&ctx.checkpoint) + 1;
        let mut updates: Vec<Result<GraphUpdate>> = split_tokens(&ctx.input)
            .into_iter()
            .map(|text| Ok(GraphUpdate::Token { text }))
            .collect();
        updates.push(Ok(GraphUpdate::Final {
            message: Message::assistant(ctx.run_id, ctx.input),
            checkpoint: json!({ "turns": turns }),
        }));
        futures_util::stream::iter(updates).boxed()
    }
}

/// Answers arithmetic questions through a calculator tool call.
///
/// The turn plays out like a tool-using assistant: an assistant message
/// requesting the `calculator` tool, a `tool` message carrying the result,
/// then the final answer streamed token by token. The whole input is treated
/// as the expression (`<lhs> <op> <rhs>`).
#[derive(Debug, Default, Clone, Copy)]
pub struct CalculatorAgent;

impl CalculatorAgent {
    fn evaluate(expression: &str) -> Result<f64> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let [lhs, op, rhs] = parts.as_slice() else {
            bail!("expected `<lhs> <op> <rhs>`, got {expression:?}");
        };
        let lhs: f64 = lhs
            .parse()
            .with_context(|| format!("left operand {lhs:?} is not a number"))?;
        let rhs: f64 = rhs
            .parse()
            .with_context(|| format!("right operand {rhs:?} is not a number"))?;
        match *op {
            "+" => Ok(lhs + rhs),
            "-" => Ok(lhs - rhs),
            "*" => Ok(lhs * rhs),
            "/" if rhs == 0.0 => bail!("division by zero"),
            "/" => Ok(lhs / rhs),
            other => bail!("unsupported operator {other:?}"),
        }
    }

    fn render(value: f64) -> String {
        if value.fract() == 0.0 {
            format!("{value:.0}")
        } else {
            value.to_string()
        }
    }

    /// The tool-call message, the tool result answering it, and the final
    /// answer for one turn.
    fn turn(ctx: &TurnContext) -> Result<(Message, Message, String)> {
        let result = Self::evaluate(&ctx.input)?;
        let rendered = Self::render(result);
        let call_id = format!("{}-calc", ctx.run_id);

        let request = Message::assistant(ctx.run_id.clone(), "").with_tool_calls(vec![
            ToolCall::new(
                call_id.clone(),
                "calculator",
                json!({ "expression": ctx.input }),
            ),
        ]);
        let response = Message::tool(ctx.run_id.clone(), call_id, rendered.clone());
        let answer = format!("{} = {rendered}", ctx.input);
        Ok((request, response, answer))
    }
}

#[async_trait]
impl AgentGraph for CalculatorAgent {
    async fn invoke(&self, ctx: TurnContext) -> Result<TurnOutcome> {
        let (request, response, answer) = Self::turn(&ctx)?;
        Ok(TurnOutcome {
            message: Message::assistant(ctx.run_id, answer),
            interim: vec![request, response],
            checkpoint: json!({ "turns": turn_count(&ctx.checkpoint) + 1 }),
        })
    }

    fn stream(&self, ctx: TurnContext) -> GraphStream {
        let updates = match Self::turn(&ctx) {
            Ok((request, response, answer)) => {
                let mut updates = vec![
                    Ok(GraphUpdate::Interim { message: request }),
                    Ok(GraphUpdate::Interim { message: response }),
                ];
                updates.extend(
                    split_tokens(&answer)
                        .into_iter()
                        .map(|text| Ok(GraphUpdate::Token { text })),
                );
                updates.push(Ok(GraphUpdate::Final {
                    message: Message::assistant(ctx.run_id, answer),
                    checkpoint: json!({ "turns": turn_count(&ctx.checkpoint) + 1 }),
                }));
                updates
            }
            Err(error) => vec![Err(error)],
        };
        futures_util::stream::iter(updates).boxed()
    }
}

/// Simulates a long-running background job, reporting progress through
/// custom updates while streaming and finishing with a summary message.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackgroundTaskAgent;

impl BackgroundTaskAgent {
    const STATES: [&'static str; 3] = ["new", "running", "complete"];

    fn summary(ctx: &TurnContext) -> (String, serde_json::Value) {
        let completed = ctx
            .checkpoint
            .get("completed_tasks")
            .and_then(|v| v.as_u64())
            .unwrap_or(0)
            + 1;
        let summary = format!("Task {:?} finished.", ctx.input);
        (summary, json!({ "completed_tasks": completed }))
    }
}

#[async_trait]
impl AgentGraph for BackgroundTaskAgent {
    async fn invoke(&self, ctx: TurnContext) -> Result<TurnOutcome> {
        let (summary, checkpoint) = Self::summary(&ctx);
        Ok(TurnOutcome {
            message: Message::assistant(ctx.run_id, summary),
            interim: Vec::new(),
            checkpoint,
        })
    }

    fn stream(&self, ctx: TurnContext) -> GraphStream {
        let (summary, checkpoint) = Self::summary(&ctx);
        let mut updates: Vec<Result<GraphUpdate>> = Self::STATES
            .iter()
            .map(|state| {
                Ok(GraphUpdate::Custom {
                    payload: json!({ "task": ctx.input, "state": state }),
                })
            })
            .collect();
        updates.push(Ok(GraphUpdate::Final {
            message: Message::assistant(ctx.run_id, summary),
            checkpoint,
        }));
        futures_util::stream::iter(updates).boxed()
    }
}

impl AgentRegistry {
    /// A registry pre-loaded with the demo graphs.
    pub fn with_demo_agents() -> Self {
        let mut registry = Self::new();

        registry
            .register(
                Arc::new(EchoAgent),
                AgentDescriptor::new("echo", "Repeats the user's input back, streamed token by token")
                    .with_capabilities(AgentCapabilities {
                        streaming: true,
                        tools: false,
                    }),
            )
            .expect("empty registry accepts the demo agent");

        registry
            .register(
                Arc::new(CalculatorAgent),
                AgentDescriptor::new("calculator", "Evaluates arithmetic through a calculator tool call")
                    .with_capabilities(AgentCapabilities {
                        streaming: true,
                        tools: true,
                    }),
            )
            .expect("demo agent ids are distinct");

        registry
            .register(
                Arc::new(BackgroundTaskAgent),
                AgentDescriptor::new(
                    "background-task",
                    "Runs a simulated background job, reporting progress as custom updates",
                )
                .with_capabilities(AgentCapabilities {
                    streaming: true,
                    tools: false,
                }),
            )
            .expect("demo agent ids are distinct");

        registry
    }
}
