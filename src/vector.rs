use crate::crypto::{CipherVector, FheBackend};
use crate::error::{FheCryptoError, GameRuleError};
use crate::roles::Role;
use crate::session::GamePhase;

const LOG_TARGET: &str = "phase::vector";

/// Builds encrypted zero and one-hot vectors over the joint key, and
/// composes the per-phase triplet every party sends (§4.B).
pub struct VectorFactory<'a> {
    backend: &'a dyn FheBackend,
    num_players: usize,
}

/// The three ciphertexts every party sends every phase, real encryptions
/// even when the semantic action is "none" (§3 invariants, §4.F).
pub struct ActionTriplet {
    pub vote: CipherVector,
    pub attack: CipherVector,
    pub heal: CipherVector,
}

impl<'a> VectorFactory<'a> {
    pub fn new(backend: &'a dyn FheBackend, num_players: usize) -> Self {
        Self {
            backend,
            num_players,
        }
    }

    /// Encryption of the N-zero vector — required dummy traffic.
    pub fn zero_n(&self) -> Result<CipherVector, FheCryptoError> {
        self.backend.encrypt(&vec![0u64; self.num_players])
    }

    /// Encryption of the N-vector with a single 1 at index `target`.
    /// `target` must already be `< num_players`; callers that accept a
    /// target from outside this module go through [`triplet`](Self::triplet),
    /// which validates it first.
    pub fn one_hot_n(&self, target: u8) -> Result<CipherVector, FheCryptoError> {
        if target as usize >= self.num_players {
            return Err(FheCryptoError::ValueOutOfRange(target as u64));
        }
        let mut vector = vec![0u64; self.num_players];
        vector[target as usize] = 1;
        self.backend.encrypt(&vector)
    }

    /// Rejects a target that is out of range or not among `survivors` (§7
    /// boundary validation: "invalid target ... rejected at the boundary").
    fn validate_target(&self, target: u8, survivors: &[u8]) -> Result<u8, GameRuleError> {
        if (target as usize) < self.num_players && survivors.contains(&target) {
            Ok(target)
        } else {
            Err(GameRuleError::InvalidTarget(target))
        }
    }

    /// Builds `(C_vote, C_attack, C_heal)` for one player's action this
    /// phase, per the role/phase → slot table in §4.F. `target` is
    /// ignored for roles/phases with no slot to fill. An out-of-range or
    /// dead `target` is rejected at this boundary and silently treated as
    /// no target — the caller's triplet becomes an all-zero triplet rather
    /// than panicking or aborting the phase.
    pub fn triplet(
        &self,
        target: Option<u8>,
        role: Role,
        phase: GamePhase,
        survivors: &[u8],
    ) -> Result<ActionTriplet, FheCryptoError> {
        let target = match target {
            Some(t) => match self.validate_target(t, survivors) {
                Ok(t) => Some(t),
                Err(e) => {
                    tracing::warn!(target = LOG_TARGET, error = %e, "substituting zero-triplet for invalid target");
                    None
                }
            },
            None => None,
        };

        let zero = || self.zero_n();
        let one_hot = |t: u8| self.one_hot_n(t);

        let (vote, attack, heal) = match (phase, role) {
            (GamePhase::Night, Role::Mafia) => (
                zero()?,
                match target {
                    Some(t) => one_hot(t)?,
                    None => zero()?,
                },
                zero()?,
            ),
            (GamePhase::Night, Role::Doctor) => (
                zero()?,
                zero()?,
                match target {
                    Some(t) => one_hot(t)?,
                    None => zero()?,
                },
            ),
            (GamePhase::Vote, _) => (
                match target {
                    Some(t) => one_hot(t)?,
                    None => zero()?,
                },
                zero()?,
                zero()?,
            ),
            // Night: police and citizen contribute only dummy traffic;
            // police investigation runs separately via fan-out decryption.
            _ => (zero()?, zero()?, zero()?),
        };

        Ok(ActionTriplet { vote, attack, heal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CryptoParams;
    use crate::crypto::{BfvBackend, CryptoContext, PartyKeyShare};

    /// Single-party crypto setup (own key acts as the joint key) so the
    /// slot assignment logic can be checked against real ciphertexts.
    fn single_party_backend(num_players: usize) -> (BfvBackend, PartyKeyShare) {
        let params = CryptoParams {
            poly_modulus_degree: 1024,
            plaintext_modulus: 65537,
            moduli_sizes: &[36],
        };
        let ctx = CryptoContext::new(&params, num_players).unwrap();
        let sk = PartyKeyShare::generate(&ctx);
        let share = sk.public_share(&ctx).unwrap();
        let (_, pk) = crate::crypto::JointPublicKey::from_shares(vec![share]).unwrap();
        (BfvBackend::new(ctx, pk), sk)
    }

    fn decrypt_single_party(
        backend: &BfvBackend,
        sk: &PartyKeyShare,
        ct: &CipherVector,
    ) -> Vec<u64> {
        let lead = backend.partial_decrypt_lead(sk, ct, 0).unwrap();
        backend.fusion_decrypt(vec![lead]).unwrap()
    }

    #[test]
    fn mafia_night_attack_fills_attack_slot_only() {
        let (backend, sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        let triplet = factory
            .triplet(Some(2), Role::Mafia, GamePhase::Night, &[0, 1, 2, 3])
            .unwrap();

        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.vote)[..4], [0, 0, 0, 0]);
        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.attack)[..4], [0, 0, 1, 0]);
        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.heal)[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn doctor_night_heal_fills_heal_slot_only() {
        let (backend, sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        let triplet = factory
            .triplet(Some(1), Role::Doctor, GamePhase::Night, &[0, 1, 2, 3])
            .unwrap();

        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.attack)[..4], [0, 0, 0, 0]);
        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.heal)[..4], [0, 1, 0, 0]);
    }

    #[test]
    fn police_and_citizen_night_action_is_all_dummy() {
        let (backend, sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        for role in [Role::Police, Role::Citizen] {
            let triplet = factory
                .triplet(Some(0), role, GamePhase::Night, &[0, 1, 2, 3])
                .unwrap();
            assert_eq!(decrypt_single_party(&backend, &sk, &triplet.vote)[..4], [0, 0, 0, 0]);
            assert_eq!(decrypt_single_party(&backend, &sk, &triplet.attack)[..4], [0, 0, 0, 0]);
            assert_eq!(decrypt_single_party(&backend, &sk, &triplet.heal)[..4], [0, 0, 0, 0]);
        }
    }

    #[test]
    fn vote_phase_fills_vote_slot_for_live_player() {
        let (backend, sk) = single_party_backend(5);
        let factory = VectorFactory::new(&backend, 5);
        let triplet = factory
            .triplet(Some(3), Role::Citizen, GamePhase::Vote, &[0, 1, 2, 3, 4])
            .unwrap();
        assert_eq!(
            decrypt_single_party(&backend, &sk, &triplet.vote)[..5],
            [0, 0, 0, 1, 0]
        );
    }

    #[test]
    fn dead_or_abstaining_player_sends_zero_triplet() {
        let (backend, sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        let triplet = factory
            .triplet(None, Role::Mafia, GamePhase::Night, &[0, 1, 2, 3])
            .unwrap();
        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.attack)[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_range_target_is_rejected_and_substitutes_zero_triplet() {
        let (backend, sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        let triplet = factory
            .triplet(Some(9), Role::Mafia, GamePhase::Night, &[0, 1, 2, 3])
            .unwrap();
        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.attack)[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn dead_player_target_is_rejected_and_substitutes_zero_triplet() {
        let (backend, sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        // player 1 is not in the survivors list, so targeting it is invalid
        // even though the index itself is in range.
        let triplet = factory
            .triplet(Some(1), Role::Mafia, GamePhase::Night, &[0, 2, 3])
            .unwrap();
        assert_eq!(decrypt_single_party(&backend, &sk, &triplet.attack)[..4], [0, 0, 0, 0]);
    }

    #[test]
    fn one_hot_n_rejects_out_of_range_target_instead_of_panicking() {
        let (backend, _sk) = single_party_backend(4);
        let factory = VectorFactory::new(&backend, 4);
        assert!(factory.one_hot_n(4).is_err());
    }
}
