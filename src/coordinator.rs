//! Top-level orchestrator (§4): the Coordinator process runs one game end
//! to end, driving DKG, role assignment, the phase loop and the game log.
//! An Agent process never runs this; it only answers RPCs (see
//! `rpc::server`).

use crate::action_collector::ActionCollector;
use crate::config::Config;
use crate::crypto::context::CryptoContext;
use crate::crypto::{BfvBackend, CipherVector, PartyKeyShare};
use crate::dkg::protocol::DkgEngine;
use crate::error::ProtocolError;
use crate::persistence::{GameLog, GameLogEntry};
use crate::phase_engine::PhaseEngine;
use crate::role_assignment::RoleAssigner;
use crate::roles::Role;
use crate::rpc::client::PeerClient;
use crate::rpc::server::ActionDecider;
use crate::rpc::types::{DeathAnnouncementRequest, DeathEntry, DkgRoundRequest, DkgSetupRequest, MultMultKeyRequest};
use crate::session::{GameId, GamePhase, Player, Winner};

const LOG_TARGET: &str = "coordinator";

pub struct GameCoordinator<'a> {
    config: Config,
    game_id: GameId,
    peers: &'a dyn PeerClient,
    local_decider: &'a dyn ActionDecider,
    ctx: CryptoContext,
    sk: PartyKeyShare,
    backend: BfvBackend,
    log: GameLog,
    joint_public_key_wire: String,
    joint_relin_key_wire: String,
    num_players: usize,
}

impl<'a> GameCoordinator<'a> {
    /// Runs the full three-round DKG among `num_players` parties (index 0
    /// is always the Coordinator itself) and returns an initialized
    /// coordinator ready to assign roles and start play.
    pub async fn bootstrap(
        config: Config,
        game_id: GameId,
        num_players: usize,
        peers: &'a dyn PeerClient,
        local_decider: &'a dyn ActionDecider,
    ) -> Result<Self, ProtocolError> {
        let crypto_params = crate::config::CryptoParams::default();
        let ctx = CryptoContext::new(&crypto_params, num_players.max(4))
            .map_err(crate::error::DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
        let sk = PartyKeyShare::generate(&ctx);

        let crypto_context_wire =
            serde_json::to_string(&crypto_params).expect("CryptoParams serialization cannot fail");
        let crp_wire = ctx.crp_to_wire();
        for peer in 1..num_players as u8 {
            peers
                .dkg_setup(
                    peer,
                    DkgSetupRequest {
                        game_id,
                        crypto_context: crypto_context_wire.clone(),
                        crp: crp_wire.clone(),
                        num_players,
                        player_index: peer,
                    },
                )
                .await?;
        }

        // Round 1: sequential key-chain walk starting from this party's
        // own share (§4.D round 1).
        let engine = DkgEngine::new(&ctx);
        let mut chain = engine.round1_join(&sk, Vec::new()).map_err(ProtocolError::Dkg)?;
        for peer in 1..num_players as u8 {
            let resp = peers
                .dkg_round(
                    peer,
                    DkgRoundRequest {
                        round_number: 1,
                        previous_shares: chain,
                    },
                )
                .await?;
            chain = resp.shares;
        }
        let (jpk, pk) = engine.finalize_round1(&chain, num_players).map_err(ProtocolError::Dkg)?;

        let mut backend = BfvBackend::new(ctx.clone(), pk);

        // Round 2: every party (including this one) produces its own
        // `KS_i` independently and in parallel (no ordering requirement).
        let (own_round_one, own_ks) = engine.round2_generate(&sk).map_err(ProtocolError::Dkg)?;
        let mut round2_shares = vec![own_ks];
        for peer in 1..num_players as u8 {
            let resp = peers
                .generate_keyswitchgen(
                    peer,
                    crate::rpc::types::KeySwitchGenRequest {
                        game_id,
                        prev_key: String::new(),
                    },
                )
                .await?;
            round2_shares.push(resp.key_switch_key);
        }
        let combined_round2 = engine.combine_round2(&round2_shares).map_err(ProtocolError::Dkg)?;

        // Round 3: every party finalizes its own `MM_i` against the
        // combined round-2 contributions, then all `MM_i` are combined
        // into `JMK` and redistributed for local installation.
        let own_mm = engine
            .round3_finalize_self(own_round_one, &combined_round2, &sk)
            .map_err(ProtocolError::Dkg)?;
        let mut round3_shares = vec![own_mm];
        for peer in 1..num_players as u8 {
            let resp = peers
                .generate_multmultkey(
                    peer,
                    MultMultKeyRequest {
                        game_id,
                        combined_key: combined_round2.clone(),
                        key_tag: "joint-mult-key".to_string(),
                        install_joint_key: None,
                    },
                )
                .await?;
            let bytes = base64::Engine::decode(
                &base64::engine::general_purpose::STANDARD,
                &resp.mult_key_share,
            )
            .map_err(|e| crate::error::FheCryptoError::Backend(e.to_string()))
            .map_err(crate::error::DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
            let share = <fhe::mbfv::RelinKeyShare as fhe_traits::DeserializeParametrized>::from_bytes(
                &bytes,
                ctx.params.clone(),
            )
            .map_err(|e| crate::error::FheCryptoError::Backend(e.to_string()))
            .map_err(crate::error::DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
            round3_shares.push(share);
        }
        let jmk = engine
            .finalize_round3(round3_shares, num_players)
            .map_err(ProtocolError::Dkg)?;
        backend.install_relin_key(jmk.clone().into_inner());
        let joint_relin_key_wire = jmk.to_wire();
        let joint_public_key_wire = jpk.to_wire_string();

        tracing::info!(target = LOG_TARGET, game_id = %game_id, num_players, "dkg complete");

        let log = GameLog::new(&config.log_dir, game_id)
            .map_err(|e| ProtocolError::Network(crate::error::NetworkError::MalformedResponse(0, e.to_string())))?;

        Ok(Self {
            config,
            game_id,
            peers,
            local_decider,
            ctx,
            sk,
            backend,
            log,
            joint_public_key_wire,
            joint_relin_key_wire,
            num_players,
        })
    }

    /// Pushes the combined relinearization key to every peer. Must run
    /// after role assignment, since a peer only installs its `BfvBackend`
    /// (the `rk` field lives there) on its first `blind_role_assignment`
    /// call — there is no earlier point at which a peer has anywhere to
    /// put this key.
    async fn install_relin_key_on_peers(&self) -> Result<(), ProtocolError> {
        for peer in 1..self.num_players as u8 {
            self.peers
                .generate_multmultkey(
                    peer,
                    MultMultKeyRequest {
                        game_id: self.game_id,
                        combined_key: String::new(),
                        key_tag: "install".to_string(),
                        install_joint_key: Some(self.joint_relin_key_wire.clone()),
                    },
                )
                .await?;
        }
        Ok(())
    }

    /// Runs role assignment and then the night/day/vote loop until a
    /// winner is determined, returning the winner and the full reveal.
    pub async fn play(
        &self,
        players: Vec<Player>,
    ) -> Result<(Winner, Vec<(u8, Option<Role>)>), ProtocolError> {
        let addresses: Vec<String> = players.iter().map(|p| p.address.clone()).collect();
        let assigner = RoleAssigner::new(
            &self.backend,
            &self.ctx,
            self.peers,
            players.len(),
            0,
            &self.sk,
            addresses,
            self.joint_public_key_wire.clone(),
        );
        let (_roles, role_wire, own_role) = assigner.assign_and_reveal().await?;
        tracing::info!(target = LOG_TARGET, ?own_role, "coordinator role revealed");

        // Only now does every peer have a `BfvBackend` installed (from its
        // first `blind_role_assignment` call) to install the relin key into.
        self.install_relin_key_on_peers().await?;
        let encrypted_roles = role_wire
            .iter()
            .map(|w| CipherVector::from_wire(w, &self.ctx))
            .collect::<Result<Vec<_>, _>>()
            .map_err(crate::error::DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;

        let mut engine = PhaseEngine::new(&self.backend, encrypted_roles)?;
        let mut session = crate::session::GameSession::new(self.game_id, players);
        let peer_indices: Vec<u8> = (1..session.num_players as u8).collect();
        let threshold = crate::threshold_decrypt::ThresholdDecryptionService::new(
            &self.backend,
            &self.ctx,
            self.peers,
            peer_indices,
            0,
            self.config.connection_timeout(),
        );
        let collector = ActionCollector::new(
            &self.backend,
            &self.ctx,
            self.peers,
            session.num_players,
            self.local_decider,
        );

        loop {
            session.day += 1;
            session.phase = GamePhase::Night;
            let survivors: Vec<u8> = session.survivors().into_iter().collect();
            let dead: Vec<u8> = session.dead().into_iter().collect();

            let night_actions = collector
                .collect(
                    0,
                    own_role,
                    &survivors,
                    &dead,
                    GamePhase::Night,
                    format!("night {} begins", session.day),
                )
                .await?;
            let police_target = night_actions.local_target.filter(|_| own_role == Some(Role::Police));
            let night_result = engine.run_night(night_actions, &self.sk, &threshold, &mut session).await?;
            self.log
                .append(&GameLogEntry::NightResolved {
                    day: session.day,
                    killed: night_result.killed.clone(),
                    killed_vector: night_result.killed_vector.clone(),
                })
                .ok();

            // Police investigation is never embedded in the night triplet
            // and never broadcast: only the Coordinator, if it is the
            // police this game, ever sees this result (§4.G).
            if let Some(target) = police_target {
                let investigated = engine.investigate(target, &self.sk, &threshold).await?;
                tracing::info!(target = LOG_TARGET, player = target, role = ?investigated, "police investigation result");
            }

            self.announce_deaths(&engine, &threshold, &night_result.killed).await?;

            if let Some(winner) = engine.check_win(&self.sk, &threshold).await? {
                let reveals = engine.reveal_all(&self.sk, &threshold).await?;
                self.log
                    .append(&GameLogEntry::GameEnded {
                        day: session.day,
                        winner,
                        survivors: session.survivors().into_iter().collect(),
                        reveals: reveals.clone(),
                    })
                    .ok();
                return Ok((winner, reveals));
            }

            session.phase = GamePhase::Day;
            self.broadcast_update(&session, None, None).await?;

            session.phase = GamePhase::Vote;
            let survivors: Vec<u8> = session.survivors().into_iter().collect();
            let dead: Vec<u8> = session.dead().into_iter().collect();
            let vote_actions = collector
                .collect(
                    0,
                    own_role,
                    &survivors,
                    &dead,
                    GamePhase::Vote,
                    format!("day {} vote begins", session.day),
                )
                .await?;
            let vote_result = engine.run_vote(vote_actions, &self.sk, &threshold, &mut session).await?;
            self.log
                .append(&GameLogEntry::VoteResolved {
                    day: session.day,
                    voted_out: vote_result.voted_out,
                    counts: vote_result.counts.clone(),
                })
                .ok();

            if let Some(target) = vote_result.voted_out {
                self.announce_deaths(&engine, &threshold, &[target]).await?;
            }

            if let Some(winner) = engine.check_win(&self.sk, &threshold).await? {
                let reveals = engine.reveal_all(&self.sk, &threshold).await?;
                self.log
                    .append(&GameLogEntry::GameEnded {
                        day: session.day,
                        winner,
                        survivors: session.survivors().into_iter().collect(),
                        reveals: reveals.clone(),
                    })
                    .ok();
                return Ok((winner, reveals));
            }

            self.broadcast_update(&session, Some(night_result.killed), vote_result.voted_out)
                .await?;
        }
    }

    /// Reveals each newly-dead player's role and relays the announcement to
    /// every peer (§6.3 `death_announcement`). A no-op for an empty list
    /// (e.g. a night with no kill, or a vote that eliminated no one).
    async fn announce_deaths(
        &self,
        engine: &PhaseEngine<'_>,
        threshold: &crate::threshold_decrypt::ThresholdDecryptionService<'_>,
        deaths: &[u8],
    ) -> Result<(), ProtocolError> {
        if deaths.is_empty() {
            return Ok(());
        }
        let mut entries = Vec::with_capacity(deaths.len());
        for &player_index in deaths {
            let role = engine.reveal_one(player_index, &self.sk, threshold).await?;
            entries.push(DeathEntry {
                player_index,
                role: role.unwrap_or(Role::Citizen),
            });
        }
        for peer in 1..self.num_players as u8 {
            self.peers
                .death_announcement(
                    peer,
                    DeathAnnouncementRequest {
                        deaths: entries.clone(),
                    },
                )
                .await?;
        }
        Ok(())
    }

    async fn broadcast_update(
        &self,
        session: &crate::session::GameSession,
        recently_killed: Option<Vec<u8>>,
        recently_voted_out: Option<u8>,
    ) -> Result<(), ProtocolError> {
        let survivors: Vec<u8> = session.survivors().into_iter().collect();
        let dead: Vec<u8> = session.dead().into_iter().collect();
        for peer in 1..session.num_players as u8 {
            self.peers
                .update(
                    peer,
                    crate::rpc::types::UpdateRequest {
                        phase: session.phase,
                        message: session.phase.description().to_string(),
                        survivors: survivors.clone(),
                        dead_players: dead.clone(),
                        recently_killed: recently_killed.clone(),
                        recently_voted_out,
                    },
                )
                .await?;
        }
        Ok(())
    }
}
