use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use colloquy_agents::AgentRegistry;
use colloquy_api::{AppState, build_router};
use colloquy_engine::InvocationEngine;
use colloquy_moderation::{AllowAllGate, KeywordGate, ModerationGate};
use colloquy_store::FileThreadStore;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "colloquy-api")]
#[command(about = "colloquy agent service API")]
struct Cli {
    /// Directory holding durable thread state.
    #[arg(long, default_value = ".colloquy")]
    root: PathBuf,
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,
    /// Terms the moderation gate flags (repeatable). Empty disables the
    /// gate.
    #[arg(long = "block")]
    block: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    let gate: Arc<dyn ModerationGate> = if cli.block.is_empty() {
        Arc::new(AllowAllGate)
    } else {
        Arc::new(KeywordGate::new(cli.block))
    };

    let engine = InvocationEngine::builder(AgentRegistry::with_demo_agents())
        .store(Arc::new(FileThreadStore::new(&cli.root)))
        .gate(gate)
        .build();

    let state = AppState {
        engine,
        auth_secret: std::env::var("AUTH_SECRET").ok().filter(|s| !s.is_empty()),
    };
    let auth_enabled = state.auth_secret.is_some();
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(cli.listen).await?;
    info!(
        listen = %cli.listen,
        root = %cli.root.display(),
        auth_enabled,
        "colloquy-api listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    {
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(error) => {
                    tracing::error!(%error, "failed to install SIGTERM handler");
                }
            }
        };

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
}
