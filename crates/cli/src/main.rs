//! rtcall-server: the signaling relay daemon
//!
//! Serves the WebSocket signaling endpoint and the in-memory presence
//! registry. All state is process-lifetime; after a restart every party
//! re-registers.

use std::net::SocketAddr;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rtcall_relay_core::AppState;

#[derive(Debug, Parser)]
#[command(name = "rtcall-server", version, about = "rtcall signaling relay")]
struct Args {
    /// Socket address to listen on
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// Default log filter, overridden by RUST_LOG when set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    info!("starting rtcall-server v{}", env!("CARGO_PKG_VERSION"));
    let state = AppState::new();
    rtcall_relay_core::serve(args.bind, state, shutdown_signal())
        .await
        .context("signaling relay failed")?;
    info!("rtcall-server stopped");
    Ok(())
}

fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .context("invalid log filter")?;
    tracing_subscriber::fmt().with_env_filter(filter).init();
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(err) => info!(%err, "shutdown signal listener failed, stopping"),
    }
}
