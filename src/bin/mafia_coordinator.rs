//! Coordinator process entry point: the human player (index 0) drives a
//! full game end to end, bootstrapping the threshold DKG against every
//! configured peer address, then running night/day/vote until a winner is
//! decided.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Parser;

use blind_mafia::config::Config;
use blind_mafia::coordinator::GameCoordinator;
use blind_mafia::roles::Role;
use blind_mafia::rpc::client::HttpPeerClient;
use blind_mafia::rpc::server::ActionDecider;
use blind_mafia::rpc::types::RequestActionRequest;
use blind_mafia::session::Player;

const LOG_TARGET: &str = "bin::mafia_coordinator";

/// Reads the human player's chosen target from stdin; any unparsable or
/// empty line is treated as an abstain, matching the zero-triplet default
/// the engine already applies to unreachable peers.
struct StdinActionDecider;

#[async_trait::async_trait]
impl ActionDecider for StdinActionDecider {
    async fn choose_target(&self, req: &RequestActionRequest, role: Option<Role>) -> Option<u8> {
        println!("\n[{:?}] {}", req.phase, req.message);
        println!("role: {role:?}  survivors: {:?}", req.survivors);
        print!("choose a target index (blank to abstain): ");
        std::io::stdout().flush().ok();

        tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line).ok();
            line.trim().parse::<u8>().ok()
        })
        .await
        .unwrap_or(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let mut config = Config::parse();
    config.resolve_openai_api_key();
    blind_mafia::logging::init_tracing();

    let num_players = config.lobby_addresses.len() + 1;
    if num_players < config.min_players || num_players > config.max_players {
        anyhow::bail!(
            "lobby of {num_players} players is outside the supported range {}..={}",
            config.min_players,
            config.max_players
        );
    }

    let mut addresses = vec![String::new()];
    addresses.extend(config.lobby_addresses.clone());
    let peers = HttpPeerClient::new(addresses.clone(), config.connection_timeout());
    let decider = StdinActionDecider;

    let game_id = blind_mafia::session::GameId::new_v4();
    tracing::info!(target = LOG_TARGET, %game_id, num_players, "bootstrapping game");

    let coordinator = GameCoordinator::bootstrap(config.clone(), game_id, num_players, &peers, &decider)
        .await
        .context("dkg bootstrap failed")?;

    let players: Vec<Player> = addresses
        .iter()
        .enumerate()
        .map(|(i, addr)| Player {
            index: i as u8,
            is_human: i == 0,
            address: addr.clone(),
            alive: true,
            name: if i == 0 { "you".to_string() } else { format!("player-{i}") },
        })
        .collect();

    let (winner, reveals) = coordinator.play(players).await.context("game play failed")?;

    println!("\n=== game over: {winner:?} wins ===");
    for (index, role) in reveals {
        println!("player {index}: {role:?}");
    }

    Ok(())
}
