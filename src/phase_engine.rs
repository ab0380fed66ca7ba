//! Phase engine (§4.G): drives `setup → night → day → vote → {night|end}`,
//! homomorphically aggregates the night kill formula and the vote tally,
//! and maintains a running encrypted role-count so the win condition can
//! be checked without ever decrypting an individual player's role.

use crate::action_collector::CollectedActions;
use crate::crypto::{CipherVector, FheBackend, PartyKeyShare};
use crate::error::{DkgError, ProtocolError};
use crate::roles::Role;
use crate::session::{GameSession, Winner};
use crate::threshold_decrypt::ThresholdDecryptionService;

const LOG_TARGET: &str = "phase::engine";

/// Outcome of one night phase.
pub struct NightResult {
    pub killed: Vec<u8>,
    /// The full decrypted `killed = attack ⊙ (1 - heal)` vector, one slot
    /// per player index, not just the indices that actually died (§6.4).
    pub killed_vector: Vec<u64>,
}

/// Outcome of one vote phase.
pub struct VoteResult {
    pub voted_out: Option<u8>,
    pub counts: Vec<u64>,
}

/// Owns the encrypted role list `E` and the running `role_sum_alive`
/// ciphertext (§3 invariant: no party decrypts a role that is not its
/// own, except at game end).
pub struct PhaseEngine<'a> {
    backend: &'a dyn FheBackend,
    num_players: usize,
    encrypted_roles: Vec<CipherVector>,
    role_sum_alive: CipherVector,
}

impl<'a> PhaseEngine<'a> {
    /// `encrypted_roles` is `E`, one ciphertext per player in player-index
    /// order, as published by the role assigner.
    pub fn new(backend: &'a dyn FheBackend, encrypted_roles: Vec<CipherVector>) -> Result<Self, ProtocolError> {
        let num_players = encrypted_roles.len();
        let mut role_sum_alive = encrypted_roles[0].clone();
        for ct in &encrypted_roles[1..] {
            role_sum_alive = backend
                .add(&role_sum_alive, ct)
                .map_err(DkgError::Crypto)
                .map_err(ProtocolError::Dkg)?;
        }
        Ok(Self {
            backend,
            num_players,
            encrypted_roles,
            role_sum_alive,
        })
    }

    fn ones_vector(&self) -> Result<CipherVector, ProtocolError> {
        self.backend
            .encrypt(&vec![1u64; self.num_players])
            .map_err(DkgError::Crypto)
            .map_err(ProtocolError::Dkg)
    }

    /// Removes a killed player's role ciphertext from the running alive
    /// sum. Called once per confirmed death (night kill or vote).
    fn remove_from_alive_sum(&mut self, index: u8) -> Result<(), ProtocolError> {
        let removed = self
            .backend
            .negate(&self.encrypted_roles[index as usize])
            .map_err(DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
        self.role_sum_alive = self
            .backend
            .add(&self.role_sum_alive, &removed)
            .map_err(DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
        Ok(())
    }

    /// Sums every alive player's triplet ciphertext for one slot across
    /// the whole player list.
    fn sum_slot(
        &self,
        collected: &CollectedActions,
        pick: impl Fn(&crate::vector::ActionTriplet) -> &CipherVector,
    ) -> Result<CipherVector, ProtocolError> {
        let mut iter = collected.triplets.values();
        let first = iter
            .next()
            .ok_or_else(|| ProtocolError::UnknownPlayer(0))?;
        let mut sum = pick(first).clone();
        for triplet in iter {
            sum = self
                .backend
                .add(&sum, pick(triplet))
                .map_err(DkgError::Crypto)
                .map_err(ProtocolError::Dkg)?;
        }
        Ok(sum)
    }

    /// Night phase (§4.G): aggregates every attack/heal vector, applies
    /// `killed = attack ⊙ (1 - heal)`, and fan-out decrypts only the
    /// result. Individual attack/heal choices are never decrypted.
    pub async fn run_night(
        &mut self,
        collected: CollectedActions,
        sk: &PartyKeyShare,
        threshold: &ThresholdDecryptionService<'_>,
        session: &mut GameSession,
    ) -> Result<NightResult, ProtocolError> {
        let attack_sum = self.sum_slot(&collected, |t| &t.attack)?;
        let heal_sum = self.sum_slot(&collected, |t| &t.heal)?;
        let ones = self.ones_vector()?;
        let not_healed = self
            .backend
            .add(&ones, &self.backend.negate(&heal_sum).map_err(DkgError::Crypto).map_err(ProtocolError::Dkg)?)
            .map_err(DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
        let killed_ct = self
            .backend
            .mul(&attack_sum, &not_healed)
            .map_err(DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;

        let plain = threshold
            .parallel_decrypt(sk, &killed_ct)
            .await
            .map_err(ProtocolError::Reconstruction)?;

        let mut killed = Vec::new();
        for (index, &value) in plain.iter().enumerate().take(self.num_players) {
            if value != 0 && session.is_alive(index as u8) {
                session.kill(index as u8);
                self.remove_from_alive_sum(index as u8)?;
                killed.push(index as u8);
            }
        }
        tracing::info!(target = LOG_TARGET, killed = ?killed, "night phase resolved");
        let killed_vector = plain.into_iter().take(self.num_players).collect();
        Ok(NightResult { killed, killed_vector })
    }

    /// Vote phase (§4.G): aggregates every vote vector and fan-out
    /// decrypts the tally. A player is eliminated only on a strict
    /// majority count among the candidates (unique max, nonzero); a tie
    /// or an all-abstain round elects no one.
    pub async fn run_vote(
        &mut self,
        collected: CollectedActions,
        sk: &PartyKeyShare,
        threshold: &ThresholdDecryptionService<'_>,
        session: &mut GameSession,
    ) -> Result<VoteResult, ProtocolError> {
        let vote_sum = self.sum_slot(&collected, |t| &t.vote)?;
        let counts = threshold
            .parallel_decrypt(sk, &vote_sum)
            .await
            .map_err(ProtocolError::Reconstruction)?;

        let mut max = 0u64;
        let mut max_index = None;
        let mut tie = false;
        for (index, &count) in counts.iter().enumerate().take(self.num_players) {
            if count > max {
                max = count;
                max_index = Some(index as u8);
                tie = false;
            } else if count == max && count > 0 {
                tie = true;
            }
        }

        let voted_out = if tie { None } else { max_index.filter(|_| max > 0) };
        if let Some(index) = voted_out {
            session.kill(index);
            self.remove_from_alive_sum(index)?;
        }
        tracing::info!(target = LOG_TARGET, ?voted_out, "vote phase resolved");
        Ok(VoteResult { voted_out, counts })
    }

    /// Checks the win condition by fan-out decrypting the running alive
    /// role-count sum (§4.J). Reveals only the four aggregate counts,
    /// never which living player holds which role.
    pub async fn check_win(
        &self,
        sk: &PartyKeyShare,
        threshold: &ThresholdDecryptionService<'_>,
    ) -> Result<Option<Winner>, ProtocolError> {
        let counts = threshold
            .parallel_decrypt(sk, &self.role_sum_alive)
            .await
            .map_err(ProtocolError::Reconstruction)?;
        let mafia_alive = *counts.get(Role::Mafia.slot_index()).unwrap_or(&0) as usize;
        let nonmafia_alive: usize = [Role::Citizen, Role::Doctor, Role::Police]
            .iter()
            .map(|r| *counts.get(r.slot_index()).unwrap_or(&0) as usize)
            .sum();

        Ok(if mafia_alive == 0 {
            Some(Winner::Citizens)
        } else if nonmafia_alive <= mafia_alive {
            Some(Winner::Mafia)
        } else {
            None
        })
    }

    /// Police investigation (§4.G): fan-out (via the `investigate_parallel`
    /// verb, indistinguishable from a generic decryption request) on a
    /// single player's encrypted role.
    pub async fn investigate(
        &self,
        target: u8,
        sk: &PartyKeyShare,
        threshold: &ThresholdDecryptionService<'_>,
    ) -> Result<Option<Role>, ProtocolError> {
        let ct = self
            .encrypted_roles
            .get(target as usize)
            .ok_or(ProtocolError::UnknownPlayer(target))?;
        let plain = threshold
            .investigate(sk, ct)
            .await
            .map_err(ProtocolError::Reconstruction)?;
        Ok(Role::from_one_hot(&plain))
    }

    /// Reveals a single player's role for a death announcement (§4.G,
    /// §6.3's `death_announcement` verb). Unlike `investigate`, this runs
    /// over the plain `parallel_decrypt` verb: a dead player's role is
    /// common knowledge once announced, not a police-only secret.
    pub async fn reveal_one(
        &self,
        target: u8,
        sk: &PartyKeyShare,
        threshold: &ThresholdDecryptionService<'_>,
    ) -> Result<Option<Role>, ProtocolError> {
        let ct = self
            .encrypted_roles
            .get(target as usize)
            .ok_or(ProtocolError::UnknownPlayer(target))?;
        let plain = threshold
            .parallel_decrypt(sk, ct)
            .await
            .map_err(ProtocolError::Reconstruction)?;
        Ok(Role::from_one_hot(&plain))
    }

    /// End-of-game full reveal (§4.G): every player's role is fan-out
    /// decrypted once the game is over.
    pub async fn reveal_all(
        &self,
        sk: &PartyKeyShare,
        threshold: &ThresholdDecryptionService<'_>,
    ) -> Result<Vec<(u8, Option<Role>)>, ProtocolError> {
        let mut reveals = Vec::with_capacity(self.num_players);
        for (index, ct) in self.encrypted_roles.iter().enumerate() {
            let plain = threshold
                .parallel_decrypt(sk, ct)
                .await
                .map_err(ProtocolError::Reconstruction)?;
            reveals.push((index as u8, Role::from_one_hot(&plain)));
        }
        Ok(reveals)
    }
}
