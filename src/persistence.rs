//! Append-only game log (§6.4): one newline-delimited JSON record per
//! decrypted outcome. Never logs a ciphertext, a secret key share, or an
//! individual action triplet — only the plaintexts the engine itself is
//! entitled to reveal (kill/vote outcomes, final roles, win condition).

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::roles::Role;
use crate::session::{GameId, Winner};

const LOG_TARGET: &str = "persistence::log";

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum GameLogEntry {
    NightResolved {
        day: u32,
        killed: Vec<u8>,
        killed_vector: Vec<u64>,
    },
    VoteResolved {
        day: u32,
        voted_out: Option<u8>,
        counts: Vec<u64>,
    },
    GameEnded {
        day: u32,
        winner: Winner,
        survivors: Vec<u8>,
        reveals: Vec<(u8, Option<Role>)>,
    },
}

/// A logged entry with the wall-clock time it was appended, since
/// `GameLogEntry` itself carries only the game's own notion of time (`day`).
#[derive(Debug, Clone, Serialize)]
struct TimestampedEntry<'a> {
    timestamp: chrono::DateTime<chrono::Utc>,
    #[serde(flatten)]
    entry: &'a GameLogEntry,
}

/// One append-only `.jsonl` file per game, opened once and reused for the
/// life of the process.
pub struct GameLog {
    path: PathBuf,
}

impl GameLog {
    pub fn new(log_dir: impl AsRef<Path>, game_id: GameId) -> std::io::Result<Self> {
        std::fs::create_dir_all(&log_dir)?;
        let path = log_dir.as_ref().join(format!("{game_id}.jsonl"));
        Ok(Self { path })
    }

    pub fn append(&self, entry: &GameLogEntry) -> std::io::Result<()> {
        let stamped = TimestampedEntry {
            timestamp: chrono::Utc::now(),
            entry,
        };
        let line = serde_json::to_string(&stamped)
            .expect("GameLogEntry serialization cannot fail for these plain types");
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(target = LOG_TARGET, path = %self.path.display(), "appended game log entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_writes_one_line_per_entry() {
        let dir = std::env::temp_dir().join(format!("blind-mafia-test-{}", uuid::Uuid::new_v4()));
        let game_id = uuid::Uuid::new_v4();
        let log = GameLog::new(&dir, game_id).unwrap();

        log.append(&GameLogEntry::NightResolved {
            day: 1,
            killed: vec![2],
            killed_vector: vec![0, 0, 1, 0],
        })
        .unwrap();
        log.append(&GameLogEntry::VoteResolved {
            day: 1,
            voted_out: Some(3),
            counts: vec![0, 0, 0, 4, 0],
        })
        .unwrap();

        let contents = std::fs::read_to_string(dir.join(format!("{game_id}.jsonl"))).unwrap();
        assert_eq!(contents.lines().count(), 2);

        std::fs::remove_dir_all(&dir).ok();
    }
}
