//! Agent process entry point: answers the symmetric RPC surface for one
//! non-human player. Carries no decision logic of its own; attach one via
//! `ActionDecider` in a downstream binary to drive choices instead of
//! always abstaining.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;

use blind_mafia::config::Config;
use blind_mafia::rpc::server::{router, AbstainDecider, PeerAgentState};

const LOG_TARGET: &str = "bin::mafia_agent";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut config = Config::parse();
    config.resolve_openai_api_key();
    blind_mafia::logging::init_tracing();

    let num_players = config.lobby_addresses.len() + 1;
    let state = Arc::new(PeerAgentState::new(
        config.player_index,
        num_players,
        Arc::new(AbstainDecider),
    ));

    let app = router(state).layer(axum::middleware::from_fn(blind_mafia::logging::log_requests));

    let addr: SocketAddr = config
        .bind_addr
        .parse()
        .with_context(|| format!("invalid bind address {}", config.bind_addr))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        target = LOG_TARGET,
        %addr,
        player_index = config.player_index,
        "mafia agent listening"
    );

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("agent server exited with error")
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(target = LOG_TARGET, error = %err, "failed to install ctrl-c handler");
    }
    tracing::info!(target = LOG_TARGET, "shutdown signal received");
}
