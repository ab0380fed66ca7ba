//! Action Collector (§4.F): for night, day and vote phases, dispatches one
//! `request_action` RPC per live peer and gathers the local (human)
//! player's action, in the specific order required to keep the human UI
//! responsive while network calls are in flight: peer requests are fired
//! first and not awaited, the local action is collected next, and only
//! then does the collector wait on the peer futures.

use std::collections::HashMap;

use crate::crypto::context::CryptoContext;
use crate::crypto::FheBackend;
use crate::error::ProtocolError;
use crate::roles::Role;
use crate::rpc::client::PeerClient;
use crate::rpc::server::ActionDecider;
use crate::rpc::types::RequestActionRequest;
use crate::session::GamePhase;
use crate::vector::{ActionTriplet, VectorFactory};

const LOG_TARGET: &str = "phase::collector";

/// Collected triplet for every live player, indexed by player index.
pub struct CollectedActions {
    pub triplets: HashMap<u8, ActionTriplet>,
    /// The local (Coordinator) player's own chosen target this round, if
    /// any. Carried separately from `triplets` because it is the only
    /// slot-free action in the protocol: a live police player's night
    /// target is never embedded in its triplet (police contributes only
    /// dummy zeros there, per the role/phase slot table) and instead
    /// drives a standalone fan-out investigation (§4.G).
    pub local_target: Option<u8>,
}

pub struct ActionCollector<'a> {
    backend: &'a dyn FheBackend,
    ctx: &'a CryptoContext,
    peers: &'a dyn PeerClient,
    num_players: usize,
    local_decider: &'a dyn ActionDecider,
}

impl<'a> ActionCollector<'a> {
    pub fn new(
        backend: &'a dyn FheBackend,
        ctx: &'a CryptoContext,
        peers: &'a dyn PeerClient,
        num_players: usize,
        local_decider: &'a dyn ActionDecider,
    ) -> Self {
        Self {
            backend,
            ctx,
            peers,
            num_players,
            local_decider,
        }
    }

    /// Runs one collection round. `local_index` is the human player's own
    /// index; `local_role` its decrypted role. Every live peer other than
    /// `local_index` is asked for its triplet; any peer that errors or
    /// misses the deadline contributes a zero-triplet instead of stalling
    /// the phase (§4.F caching contract — missing actions default to "no
    /// action" rather than blocking).
    pub async fn collect(
        &self,
        local_index: u8,
        local_role: Option<Role>,
        survivors: &[u8],
        dead_players: &[u8],
        phase: GamePhase,
        message: String,
    ) -> Result<CollectedActions, ProtocolError> {
        let req = RequestActionRequest {
            phase,
            message,
            survivors: survivors.to_vec(),
            dead_players: dead_players.to_vec(),
            remaining_time_secs: None,
        };

        // Build (but do not yet await) every peer request, then poll them
        // concurrently with the local (human/UI-blocking) action below via
        // `tokio::join!` — futures are lazy, so merely constructing this
        // combinator would never actually put the peer calls on the wire
        // until something drives it; joining it alongside the local future
        // is what makes both start making progress immediately.
        let peer_futures: Vec<_> = survivors
            .iter()
            .copied()
            .filter(|&p| p != local_index)
            .map(|peer| {
                let req = req.clone();
                async move {
                    let result = self.peers.request_action(peer, req).await;
                    (peer, result)
                }
            })
            .collect();
        let pending = futures::future::join_all(peer_futures);

        let local_decider_req = RequestActionRequest {
            phase,
            message: String::new(),
            survivors: survivors.to_vec(),
            dead_players: dead_players.to_vec(),
            remaining_time_secs: None,
        };
        let local_future = self.local_decider.choose_target(&local_decider_req, local_role);

        let (peer_results, local_target) = tokio::join!(pending, local_future);

        let factory = VectorFactory::new(self.backend, self.num_players);
        let local_triplet = factory
            .triplet(local_target, local_role.unwrap_or(Role::Citizen), phase, survivors)
            .map_err(crate::error::DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;

        let mut triplets = HashMap::with_capacity(self.num_players);
        triplets.insert(local_index, local_triplet);

        for (peer, result) in peer_results {
            let triplet = match result.map_err(ProtocolError::Network).and_then(|resp| {
                Ok(ActionTriplet {
                    vote: crate::crypto::CipherVector::from_wire(&resp.vote_vector, self.ctx)
                        .map_err(crate::error::DkgError::Crypto)
                        .map_err(ProtocolError::Dkg)?,
                    attack: crate::crypto::CipherVector::from_wire(&resp.attack_vector, self.ctx)
                        .map_err(crate::error::DkgError::Crypto)
                        .map_err(ProtocolError::Dkg)?,
                    heal: crate::crypto::CipherVector::from_wire(&resp.heal_vector, self.ctx)
                        .map_err(crate::error::DkgError::Crypto)
                        .map_err(ProtocolError::Dkg)?,
                })
            }) {
                Ok(triplet) => triplet,
                Err(e) => {
                    tracing::warn!(target = LOG_TARGET, peer, error = %e, "defaulting to zero-triplet");
                    factory
                        .triplet(None, Role::Citizen, phase, survivors)
                        .map_err(crate::error::DkgError::Crypto)
                        .map_err(ProtocolError::Dkg)?
                }
            };
            triplets.insert(peer, triplet);
        }

        for &dead in dead_players {
            triplets.entry(dead).or_insert(
                factory
                    .triplet(None, Role::Citizen, phase, survivors)
                    .map_err(crate::error::DkgError::Crypto)
                    .map_err(ProtocolError::Dkg)?,
            );
        }

        Ok(CollectedActions {
            triplets,
            local_target,
        })
    }
}
