//! End-to-end tests: real listener, real client, full wire round trip.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use colloquy_agents::{
    AgentGraph, AgentRegistry, GraphStream, GraphUpdate, TurnContext, TurnOutcome,
};
use colloquy_api::{AppState, build_router};
use colloquy_client::{AgentInvoker, ClientError, ServiceClient};
use colloquy_engine::InvocationEngine;
use colloquy_moderation::{KeywordGate, SAFETY_NOTICE};
use colloquy_protocol::{
    AgentDescriptor, InvokeRequest, MODERATION_METADATA_KEY, Message, StreamEvent,
    THREAD_ID_METADATA_KEY,
};
use futures_util::StreamExt;
use serde_json::json;

/// Replies with the number of prior messages the graph can see.
struct HistoryLengthAgent;

#[async_trait]
impl AgentGraph for HistoryLengthAgent {
    async fn invoke(&self, ctx: TurnContext) -> Result<TurnOutcome> {
        Ok(TurnOutcome {
            message: Message::assistant(
                ctx.run_id,
                format!("history has {} messages", ctx.history.len()),
            ),
            interim: Vec::new(),
            checkpoint: json!({ "seen": ctx.history.len() }),
        })
    }

    fn stream(&self, ctx: TurnContext) -> GraphStream {
        let content = format!("history has {} messages", ctx.history.len());
        futures_util::stream::iter(vec![Ok(GraphUpdate::Final {
            message: Message::assistant(ctx.run_id, content),
            checkpoint: json!({ "seen": ctx.history.len() }),
        })])
        .boxed()
    }
}

fn test_registry() -> AgentRegistry {
    let mut registry = AgentRegistry::with_demo_agents();
    registry
        .register(
            Arc::new(HistoryLengthAgent),
            AgentDescriptor::new("chatbot", "Replies with the visible history length"),
        )
        .unwrap();
    registry
}

async fn serve(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = build_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn serve_default() -> ServiceClient {
    let engine = InvocationEngine::builder(test_registry()).build();
    let addr = serve(AppState {
        engine,
        auth_secret: None,
    })
    .await;
    ServiceClient::new(format!("http://{addr}"))
}

#[tokio::test]
async fn discovery_lists_agents_in_registration_order() {
    let client = serve_default().await;
    let agents = client.agents().await.unwrap();
    let ids: Vec<&str> = agents.iter().map(|a| a.agent_id.as_str()).collect();
    assert_eq!(ids, ["echo", "calculator", "background-task", "chatbot"]);
}

#[tokio::test]
async fn blocking_invoke_preserves_thread_state_across_turns() {
    let client = serve_default().await;

    let first = client
        .invoke(
            &"chatbot".into(),
            InvokeRequest::new("hello").with_thread_id("t1"),
        )
        .await
        .unwrap();
    assert_eq!(first.content, "history has 0 messages");

    let second = client
        .invoke(
            &"chatbot".into(),
            InvokeRequest::new("what did I say?").with_thread_id("t1"),
        )
        .await
        .unwrap();
    assert_eq!(second.content, "history has 2 messages");
}

#[tokio::test]
async fn server_generates_thread_id_when_absent() {
    let client = serve_default().await;

    let message = client
        .invoke(&"chatbot".into(), InvokeRequest::new("hello"))
        .await
        .unwrap();
    let thread_id = message.metadata[THREAD_ID_METADATA_KEY]
        .as_str()
        .expect("generated thread id is echoed")
        .to_owned();

    let followup = client
        .invoke(
            &"chatbot".into(),
            InvokeRequest::new("again").with_thread_id(thread_id),
        )
        .await
        .unwrap();
    assert_eq!(followup.content, "history has 2 messages");
}

#[tokio::test]
async fn streaming_tokens_reconstruct_the_final_content() {
    let client = serve_default().await;

    let events = client
        .stream(
            &"echo".into(),
            InvokeRequest::new("a b c").with_thread_id("t1"),
        )
        .await
        .unwrap();
    let events: Vec<StreamEvent> = events.map(Result::unwrap).collect().await;

    let mut concatenated = String::new();
    let mut final_content = None;
    for event in &events {
        match event {
            StreamEvent::Token { text, .. } => concatenated.push_str(text),
            StreamEvent::Message { message, .. } => final_content = Some(message.content.clone()),
            StreamEvent::End { .. } => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert_eq!(final_content.as_deref(), Some("a b c"));
    assert_eq!(concatenated, "a b c");
    assert!(matches!(events.last(), Some(StreamEvent::End { .. })));
}

#[tokio::test]
async fn custom_updates_travel_the_wire_before_the_terminal_event() {
    let client = serve_default().await;

    let events = client
        .stream(
            &"background-task".into(),
            InvokeRequest::new("reindex").with_thread_id("t-bg"),
        )
        .await
        .unwrap();
    let events: Vec<StreamEvent> = events.map(Result::unwrap).collect().await;

    let states: Vec<&str> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::CustomUpdate { payload, .. } => payload["state"].as_str(),
            _ => None,
        })
        .collect();
    assert_eq!(states, ["new", "running", "complete"]);
    assert!(matches!(events.last(), Some(StreamEvent::End { .. })));
}

#[tokio::test]
async fn tool_call_messages_precede_the_final_answer() {
    let client = serve_default().await;

    let events = client
        .stream(
            &"calculator".into(),
            InvokeRequest::new("2 + 2").with_thread_id("t-calc"),
        )
        .await
        .unwrap();
    let events: Vec<StreamEvent> = events.map(Result::unwrap).collect().await;

    let messages: Vec<&Message> = events
        .iter()
        .filter_map(|event| match event {
            StreamEvent::Message { message, .. } => Some(message),
            _ => None,
        })
        .collect();
    // Tool request, tool response, then the moderated final answer.
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[0].tool_calls[0].name, "calculator");
    assert_eq!(
        messages[1].tool_call_id.as_deref(),
        Some(messages[0].tool_calls[0].id.as_str())
    );
    assert_eq!(messages[2].content, "2 + 2 = 4");
}

#[tokio::test]
async fn graph_failure_streams_a_terminal_error_event() {
    let client = serve_default().await;

    let events = client
        .stream(
            &"calculator".into(),
            InvokeRequest::new("not arithmetic at all").with_thread_id("t-err"),
        )
        .await
        .unwrap();
    let events: Vec<StreamEvent> = events.map(Result::unwrap).collect().await;

    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], StreamEvent::Error { detail, .. }
        if detail.contains("agent execution failed")));
}

#[tokio::test]
async fn unknown_agent_is_not_found_over_the_wire() {
    let client = serve_default().await;

    let error = client
        .invoke(&"missing".into(), InvokeRequest::new("hello"))
        .await
        .unwrap_err();
    match error {
        ClientError::Api { status, message } => {
            assert_eq!(status, 404);
            assert!(message.contains("unknown agent"));
        }
        other => panic!("expected Api error, got {other:?}"),
    }

    let error = match client
        .stream(&"missing".into(), InvokeRequest::new("hello"))
        .await
    {
        Err(error) => error,
        Ok(_) => panic!("expected an error"),
    };
    assert!(matches!(error, ClientError::Api { status: 404, .. }));
}

#[tokio::test]
async fn flagged_output_arrives_as_safety_notice_not_error() {
    let engine = InvocationEngine::builder(test_registry())
        .gate(Arc::new(KeywordGate::new(["BLOCKED"])))
        .build();
    let addr = serve(AppState {
        engine,
        auth_secret: None,
    })
    .await;
    let client = ServiceClient::new(format!("http://{addr}"));

    let message = client
        .invoke(
            &"echo".into(),
            InvokeRequest::new("this is BLOCKED content").with_thread_id("t1"),
        )
        .await
        .unwrap();
    assert_eq!(message.content, SAFETY_NOTICE);
    assert_eq!(message.metadata[MODERATION_METADATA_KEY], json!("blocked"));
}

#[tokio::test]
async fn bearer_auth_guards_every_agent_endpoint() {
    let engine = InvocationEngine::builder(test_registry()).build();
    let addr = serve(AppState {
        engine,
        auth_secret: Some("s3cret".to_owned()),
    })
    .await;

    let anonymous = ServiceClient::new(format!("http://{addr}"));
    let error = anonymous.agents().await.unwrap_err();
    assert!(matches!(error, ClientError::Api { status: 401, .. }));

    let authorized = ServiceClient::new(format!("http://{addr}")).with_auth_secret("s3cret");
    let agents = authorized.agents().await.unwrap();
    assert!(!agents.is_empty());
}
