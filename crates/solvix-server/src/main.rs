use std::future::IntoFuture;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use solvix_runtime::{Engine, RuntimeConfig};
use solvix_server::{build_router, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "solvix-server", version, about = "Solvix collections AI engine")]
struct Cli {
    /// YAML settings file. Environment variables override its values.
    #[arg(long, env = "SOLVIX_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0", env = "SOLVIX_HOST")]
    host: String,

    #[arg(long, default_value_t = 8001, env = "SOLVIX_PORT")]
    port: u16,

    /// Log filter used when RUST_LOG is unset, e.g. `info` or `solvix_runtime=debug`.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// How long in-flight requests may run after a shutdown signal.
    #[arg(long, default_value = "30s")]
    shutdown_grace: humantime::Duration,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = RuntimeConfig::load(cli.config.as_deref()).context("loading settings")?;
    if config.has_no_credentials() {
        warn!("no LLM provider API key is set; /classify and /generate-draft will return 503");
    }

    let engine = Engine::from_config(&config);
    for provider in engine.providers() {
        info!(provider = %provider.provider, model = %provider.model, "LLM provider ready");
    }

    let app = build_router(AppState::new(engine));
    let addr: SocketAddr = format!("{}:{}", cli.host, cli.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cli.host, cli.port))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!("solvix-server listening on {}", listener.local_addr()?);

    let grace: Duration = cli.shutdown_grace.into();
    let (signalled_tx, signalled_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        let _ = signalled_tx.send(());
    })
    .into_future();

    tokio::select! {
        result = server => result.context("server error")?,
        _ = async {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        } => {
            warn!(grace = %cli.shutdown_grace, "shutdown grace period elapsed; dropping open connections");
        }
    }

    Ok(())
}
