use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type GameId = Uuid;

/// The game-phase state machine (§4.G): `setup → night → day → vote →
/// {night | end}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    Setup,
    Night,
    Day,
    Vote,
    End,
}

impl GamePhase {
    pub fn description(&self) -> &'static str {
        match self {
            GamePhase::Setup => "key generation and role assignment",
            GamePhase::Night => "mafia, doctor and police act under cover",
            GamePhase::Day => "discussion; no cryptography runs",
            GamePhase::Vote => "players vote to eliminate a suspect",
            GamePhase::End => "game over",
        }
    }
}

/// A player's public record (§3). `alive` is the only mutable field after
/// setup, and only transitions `true → false`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub index: u8,
    pub is_human: bool,
    pub address: String,
    pub alive: bool,
    pub name: String,
}

impl Player {
    pub fn kill(&mut self) {
        self.alive = false;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCounts {
    pub counts: Vec<u64>,
}

/// Ephemeral per-game state, mutated exclusively by the phase engine task
/// (§3 "Game session", §5 shared-resource policy).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub game_id: GameId,
    pub num_players: usize,
    pub human_index: u8,
    pub day: u32,
    pub phase: GamePhase,
    pub players: Vec<Player>,
    pub last_killed: Vec<u8>,
    pub last_voted_out: Option<u8>,
    pub last_vote_counts: Option<Vec<u64>>,
}

impl GameSession {
    pub fn new(game_id: GameId, players: Vec<Player>) -> Self {
        Self {
            game_id,
            num_players: players.len(),
            human_index: 0,
            day: 0,
            phase: GamePhase::Setup,
            players,
            last_killed: Vec::new(),
            last_voted_out: None,
            last_vote_counts: None,
        }
    }

    pub fn survivors(&self) -> HashSet<u8> {
        self.players
            .iter()
            .filter(|p| p.alive)
            .map(|p| p.index)
            .collect()
    }

    pub fn dead(&self) -> HashSet<u8> {
        self.players
            .iter()
            .filter(|p| !p.alive)
            .map(|p| p.index)
            .collect()
    }

    pub fn is_alive(&self, index: u8) -> bool {
        self.players
            .get(index as usize)
            .map(|p| p.alive)
            .unwrap_or(false)
    }

    pub fn kill(&mut self, index: u8) {
        if let Some(player) = self.players.get_mut(index as usize) {
            player.kill();
        }
    }
}

/// The outcome of a win check (§4.J). The check itself is never run on
/// plaintext roles — see `PhaseEngine::check_win`, which decrypts only the
/// four aggregate role-count slots of a running ciphertext sum and never a
/// living player's individual role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Citizens,
    Mafia,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_alive(num_players: usize, dead: &[u8]) -> GameSession {
        let players = (0..num_players as u8)
            .map(|i| Player {
                index: i,
                is_human: i == 0,
                address: format!("http://peer-{i}"),
                alive: !dead.contains(&i),
                name: format!("p{i}"),
            })
            .collect();
        GameSession::new(Uuid::new_v4(), players)
    }

    #[test]
    fn alive_transitions_only_true_to_false() {
        let mut session = session_with_alive(4, &[]);
        assert!(session.is_alive(2));
        session.kill(2);
        assert!(!session.is_alive(2));
        session.kill(2);
        assert!(!session.is_alive(2));
    }
}
