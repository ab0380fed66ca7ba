use rand::seq::SliceRandom;
use rand::thread_rng;
use serde::{Deserialize, Serialize};

use crate::config::role_counts_for;
use crate::error::GameRuleError;

/// One of the four roles, ordered to match the fixed one-hot encoding in
/// §3: `citizen=0, mafia=1, doctor=2, police=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Citizen,
    Mafia,
    Doctor,
    Police,
}

impl Role {
    fn slot(self) -> usize {
        self.slot_index()
    }

    /// This role's fixed slot in the one-hot encoding (§3).
    pub fn slot_index(self) -> usize {
        match self {
            Role::Citizen => 0,
            Role::Mafia => 1,
            Role::Doctor => 2,
            Role::Police => 3,
        }
    }

    pub fn to_one_hot(self) -> [u64; 4] {
        let mut vector = [0u64; 4];
        vector[self.slot()] = 1;
        vector
    }

    /// Returns `None` ("unknown") if no slot is exactly 1 — a decryption
    /// artifact or tampering, per §4.C; callers treat the round as
    /// corrupt rather than guessing a role.
    pub fn from_one_hot(vector: &[u64]) -> Option<Role> {
        if vector.len() < 4 {
            return None;
        }
        let ones: Vec<usize> = (0..4).filter(|&i| vector[i] == 1).collect();
        let zeros_elsewhere = (0..4).all(|i| vector[i] == 0 || vector[i] == 1);
        if ones.len() != 1 || !zeros_elsewhere {
            return None;
        }
        Some(match ones[0] {
            0 => Role::Citizen,
            1 => Role::Mafia,
            2 => Role::Doctor,
            3 => Role::Police,
            _ => unreachable!(),
        })
    }

    pub fn is_mafia(self) -> bool {
        matches!(self, Role::Mafia)
    }
}

/// Builds the shuffled role multiset for `num_players`, per the closed
/// distribution table (§3). The shuffle uses the coordinator's local
/// randomness — acceptable under the semi-honest model because roles are
/// encrypted before distribution (§4.E step 1).
pub fn shuffled_roles_for(num_players: usize) -> Result<Vec<Role>, GameRuleError> {
    let counts = role_counts_for(num_players)
        .ok_or(GameRuleError::NoRoleDistribution(num_players))?;

    let mut roles = Vec::with_capacity(num_players);
    roles.extend(std::iter::repeat(Role::Mafia).take(counts.mafia));
    roles.extend(std::iter::repeat(Role::Doctor).take(counts.doctor));
    roles.extend(std::iter::repeat(Role::Police).take(counts.police));
    roles.extend(std::iter::repeat(Role::Citizen).take(counts.citizen));

    roles.shuffle(&mut thread_rng());
    Ok(roles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_hot_round_trips() {
        for role in [Role::Citizen, Role::Mafia, Role::Doctor, Role::Police] {
            let encoded = role.to_one_hot();
            assert_eq!(Role::from_one_hot(&encoded), Some(role));
        }
    }

    #[test]
    fn malformed_vector_is_unknown() {
        assert_eq!(Role::from_one_hot(&[1, 1, 0, 0]), None);
        assert_eq!(Role::from_one_hot(&[0, 0, 0, 0]), None);
        assert_eq!(Role::from_one_hot(&[2, 0, 0, 0]), None);
    }

    #[test]
    fn shuffled_roles_match_distribution_table() {
        for n in 4..=10 {
            let roles = shuffled_roles_for(n).unwrap();
            assert_eq!(roles.len(), n);
            let mafia = roles.iter().filter(|r| r.is_mafia()).count();
            let counts = role_counts_for(n).unwrap();
            assert_eq!(mafia, counts.mafia);
        }
    }

    #[test]
    fn unsupported_player_count_is_rejected() {
        assert!(shuffled_roles_for(3).is_err());
    }
}
