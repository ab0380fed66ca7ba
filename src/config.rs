use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role counts for one player count, as a closed table (§3 of the design notes).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoleCounts {
    pub mafia: usize,
    pub doctor: usize,
    pub police: usize,
    pub citizen: usize,
}

impl RoleCounts {
    pub fn total(&self) -> usize {
        self.mafia + self.doctor + self.police + self.citizen
    }
}

/// Closed role-distribution table for 4..=10 players. Any player count
/// outside this table is a configuration error, not a fallback default.
pub const ROLE_DISTRIBUTION: &[(usize, RoleCounts)] = &[
    (
        4,
        RoleCounts {
            mafia: 1,
            doctor: 1,
            police: 1,
            citizen: 1,
        },
    ),
    (
        5,
        RoleCounts {
            mafia: 1,
            doctor: 1,
            police: 1,
            citizen: 2,
        },
    ),
    (
        6,
        RoleCounts {
            mafia: 2,
            doctor: 1,
            police: 1,
            citizen: 2,
        },
    ),
    (
        7,
        RoleCounts {
            mafia: 2,
            doctor: 1,
            police: 1,
            citizen: 3,
        },
    ),
    (
        8,
        RoleCounts {
            mafia: 2,
            doctor: 1,
            police: 1,
            citizen: 4,
        },
    ),
    (
        9,
        RoleCounts {
            mafia: 3,
            doctor: 1,
            police: 1,
            citizen: 4,
        },
    ),
    (
        10,
        RoleCounts {
            mafia: 3,
            doctor: 1,
            police: 1,
            citizen: 5,
        },
    ),
];

pub fn role_counts_for(n: usize) -> Option<RoleCounts> {
    ROLE_DISTRIBUTION
        .iter()
        .find(|(players, _)| *players == n)
        .map(|(_, counts)| *counts)
}

/// Reference lattice parameters for the BFV crypto context (§6.2).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CryptoParams {
    pub poly_modulus_degree: usize,
    pub plaintext_modulus: u64,
    pub moduli_sizes: &'static [usize],
}

impl Default for CryptoParams {
    fn default() -> Self {
        Self {
            poly_modulus_degree: 8192,
            plaintext_modulus: 1_032_193,
            moduli_sizes: &[62, 62, 62],
        }
    }
}

/// Process-wide configuration, loaded from CLI args/environment.
///
/// Mirrors the closed configuration surface: adding a field here that is
/// not in this set is out of scope for the engine.
#[derive(Debug, Clone, clap::Parser)]
#[command(name = "blind-mafia", about = "Blind threshold-FHE Mafia engine")]
pub struct Config {
    #[arg(long, env = "MAFIA_MIN_PLAYERS", default_value_t = 4)]
    pub min_players: usize,

    #[arg(long, env = "MAFIA_MAX_PLAYERS", default_value_t = 10)]
    pub max_players: usize,

    #[arg(long, env = "MAFIA_NIGHT_TIMEOUT_SECS", default_value_t = 60)]
    pub night_phase_timeout_secs: u64,

    #[arg(long, env = "MAFIA_DAY_TIMEOUT_SECS", default_value_t = 120)]
    pub day_phase_timeout_secs: u64,

    #[arg(long, env = "MAFIA_VOTE_TIMEOUT_SECS", default_value_t = 60)]
    pub vote_phase_timeout_secs: u64,

    #[arg(long, env = "MAFIA_CONNECTION_TIMEOUT_SECS", default_value_t = 10)]
    pub connection_timeout_secs: u64,

    #[arg(long, env = "MAFIA_ACTION_TIMEOUT_SECS", default_value_t = 60)]
    pub action_request_timeout_secs: u64,

    /// Addresses of the N-1 peer agents, in player-index order starting at 1.
    #[arg(long, env = "MAFIA_LOBBY_ADDRESSES", value_delimiter = ',')]
    pub lobby_addresses: Vec<String>,

    /// Opaque; passed through to agent processes, never parsed by the core.
    #[arg(long, env = "OPENAI_API_KEY")]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "MAFIA_BIND_ADDR", default_value = "0.0.0.0:8080")]
    pub bind_addr: String,

    #[arg(long, env = "MAFIA_PLAYER_INDEX", default_value_t = 0)]
    pub player_index: u8,

    #[arg(long, env = "MAFIA_LOG_DIR", default_value = "./logs")]
    pub log_dir: String,
}

impl Config {
    /// Loads `openai_api_key` from the environment, falling back to a
    /// `.env` file in the current directory if unset. The value is never
    /// inspected; it is opaque to the core.
    pub fn resolve_openai_api_key(&mut self) {
        if self.openai_api_key.is_none() {
            let _ = dotenv::dotenv();
            self.openai_api_key = std::env::var("OPENAI_API_KEY").ok();
        }
    }

    pub fn night_phase_timeout(&self) -> Duration {
        Duration::from_secs(self.night_phase_timeout_secs)
    }

    pub fn day_phase_timeout(&self) -> Duration {
        Duration::from_secs(self.day_phase_timeout_secs)
    }

    pub fn vote_phase_timeout(&self) -> Duration {
        Duration::from_secs(self.vote_phase_timeout_secs)
    }

    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    pub fn action_request_timeout(&self) -> Duration {
        Duration::from_secs(self.action_request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_distribution_totals_match_player_count() {
        for (n, counts) in ROLE_DISTRIBUTION {
            assert_eq!(counts.total(), *n);
        }
    }

    #[test]
    fn unknown_player_count_has_no_distribution() {
        assert!(role_counts_for(3).is_none());
        assert!(role_counts_for(11).is_none());
    }
}
