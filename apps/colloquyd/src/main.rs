use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colloquy_agents::AgentRegistry;
use colloquy_engine::InvocationEngine;
use colloquy_moderation::{AllowAllGate, KeywordGate, ModerationGate};
use colloquy_protocol::{AgentId, InvokeRequest, THREAD_ID_METADATA_KEY};
use colloquy_store::FileThreadStore;
use futures_util::StreamExt;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "colloquyd")]
#[command(about = "colloquy demo daemon")]
struct Cli {
    #[arg(long, default_value = ".colloquy")]
    root: PathBuf,
    /// Agent to drive; defaults to the registry's default agent.
    #[arg(long)]
    agent: Option<String>,
    #[arg(long, default_value = "hello from colloquyd")]
    input: String,
    /// Terms the moderation gate flags (repeatable). Empty disables the
    /// gate.
    #[arg(long = "block", default_value = "BLOCKED")]
    block: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("info")
        .compact()
        .init();

    let cli = Cli::parse();

    let registry = AgentRegistry::with_demo_agents();
    let agent_id: AgentId = match cli.agent {
        Some(agent) => agent.into(),
        None => registry
            .default_agent()
            .cloned()
            .context("registry has no agents")?,
    };

    let gate: Arc<dyn ModerationGate> = if cli.block.is_empty() {
        Arc::new(AllowAllGate)
    } else {
        Arc::new(KeywordGate::new(cli.block))
    };

    let engine = InvocationEngine::builder(registry)
        .store(Arc::new(FileThreadStore::new(&cli.root)))
        .gate(gate)
        .build();

    // Blocking turn.
    let message = engine
        .invoke(&agent_id, InvokeRequest::new(cli.input.clone()))
        .await?;
    let thread_id = message
        .metadata
        .get(THREAD_ID_METADATA_KEY)
        .and_then(|value| value.as_str())
        .map(str::to_owned);
    info!(
        agent = %agent_id,
        thread_id = thread_id.as_deref().unwrap_or("-"),
        content = %message.content,
        "blocking turn complete"
    );

    // Streaming turn on the same thread.
    let mut request = InvokeRequest::new(format!("{} (streamed)", cli.input));
    if let Some(thread_id) = &thread_id {
        request = request.with_thread_id(thread_id.as_str());
    } else {
        warn!("blocking turn did not echo a thread id; streaming on a fresh thread");
    }

    let mut events = engine.stream(&agent_id, request).await?;
    while let Some(event) = events.next().await {
        let rendered = serde_json::to_string(&event).unwrap_or_else(|_| "{}".to_owned());
        info!(event = %rendered, "stream event");
    }

    info!("demo complete");
    Ok(())
}
