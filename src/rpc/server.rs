use std::sync::Arc;

use axum::extract::{Extension, Json};
use axum::routing::{get, post};
use axum::Router;
use parking_lot::RwLock;
use tower_http::cors::{Any, CorsLayer};

use base64::Engine;
use fhe_traits::Serialize as FheSerialize;

use crate::crypto::keys::RelinRoundOneShare;
use crate::crypto::{BfvBackend, CipherVector, CryptoContext, FheBackend, PartyKeyShare};
use crate::dkg::protocol::DkgEngine;
use crate::error::ApiError;
use crate::roles::Role;

use super::types::*;

const LOG_TARGET: &str = "rpc::server";

/// Decides a live player's action for the current phase. The engine only
/// defines this seam; concrete decision logic (human UI, LLM agent) is an
/// external collaborator (§1 out-of-scope).
#[async_trait::async_trait]
pub trait ActionDecider: Send + Sync {
    async fn choose_target(&self, req: &RequestActionRequest, role: Option<Role>) -> Option<u8>;
}

/// Decider that always abstains; used by agent processes with no attached
/// decision logic and by tests.
pub struct AbstainDecider;

#[async_trait::async_trait]
impl ActionDecider for AbstainDecider {
    async fn choose_target(&self, _req: &RequestActionRequest, _role: Option<Role>) -> Option<u8> {
        None
    }
}

/// Per-process state for one peer (Coordinator or Agent) answering RPCs.
pub struct PeerAgentState {
    pub player_index: u8,
    pub num_players: usize,
    pub ctx: RwLock<Option<CryptoContext>>,
    pub sk: RwLock<Option<PartyKeyShare>>,
    pub backend: RwLock<Option<BfvBackend>>,
    pub my_encrypted_role: RwLock<Option<CipherVector>>,
    pub my_role: RwLock<Option<Role>>,
    pub relin_round_one: RwLock<Option<RelinRoundOneShare>>,
    pub action_decider: Arc<dyn ActionDecider>,
}

impl PeerAgentState {
    pub fn new(player_index: u8, num_players: usize, action_decider: Arc<dyn ActionDecider>) -> Self {
        Self {
            player_index,
            num_players,
            ctx: RwLock::new(None),
            sk: RwLock::new(None),
            backend: RwLock::new(None),
            my_encrypted_role: RwLock::new(None),
            my_role: RwLock::new(None),
            relin_round_one: RwLock::new(None),
            action_decider,
        }
    }

    fn backend_or_err(&self) -> Result<(), ApiError> {
        if self.backend.read().is_none() {
            return Err(ApiError::bad_request("dkg not yet complete"));
        }
        Ok(())
    }
}

pub fn router(state: Arc<PeerAgentState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/dkg_setup", post(dkg_setup))
        .route("/dkg_round", post(dkg_round))
        .route("/generate_keyswitchgen", post(generate_keyswitchgen))
        .route("/generate_multmultkey", post(generate_multmultkey))
        .route("/blind_role_assignment", post(blind_role_assignment))
        .route("/complete_role_decryption", post(complete_role_decryption))
        .route("/partial_decrypt", post(partial_decrypt))
        .route("/investigate_parallel", post(investigate_parallel))
        .route("/relay_decrypt", post(relay_decrypt))
        .route("/request_action", post(request_action))
        .route("/update", post(update))
        .route("/death_announcement", post(death_announcement))
        .route("/reveal_role", get(reveal_role))
        .route("/shutdown", post(shutdown))
        .layer(Extension(state))
        .layer(cors)
}

async fn dkg_setup(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<DkgSetupRequest>,
) -> Result<Json<Ack>, ApiError> {
    tracing::info!(
        target = LOG_TARGET,
        game_id = %req.game_id,
        num_players = req.num_players,
        player_index = req.player_index,
        "dkg_setup received"
    );
    if state.ctx.read().is_none() {
        let params: crate::config::CryptoParams = serde_json::from_str(&req.crypto_context)
            .map_err(|e| ApiError::bad_request(format!("malformed crypto_context: {e}")))?;
        let ctx = CryptoContext::from_wire(&params, &req.crp, req.num_players.max(4))
            .map_err(|e| ApiError::internal(e.to_string()))?;
        *state.ctx.write() = Some(ctx);
    }
    let sk = state
        .ctx
        .read()
        .as_ref()
        .map(PartyKeyShare::generate)
        .ok_or_else(|| ApiError::internal("crypto context not initialized before dkg_setup"))?;
    *state.sk.write() = Some(sk);
    Ok(Json(Ack::ok()))
}

async fn dkg_round(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<DkgRoundRequest>,
) -> Result<Json<DkgRoundResponse>, ApiError> {
    tracing::info!(target = LOG_TARGET, round = req.round_number, "dkg_round received");
    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("crypto context not initialized before dkg_round"))?;
    let sk_guard = state.sk.read();
    let sk = sk_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("dkg_setup not yet called"))?;

    let chain = DkgEngine::new(ctx)
        .round1_join(sk, req.previous_shares)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(DkgRoundResponse { shares: chain }))
}

async fn generate_keyswitchgen(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<KeySwitchGenRequest>,
) -> Result<Json<KeySwitchGenResponse>, ApiError> {
    tracing::info!(target = LOG_TARGET, "generate_keyswitchgen received");
    let _ = req.prev_key;
    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("crypto context not initialized"))?;
    let sk_guard = state.sk.read();
    let sk = sk_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("dkg_setup not yet called"))?;

    let (round_one, wire) = DkgEngine::new(ctx)
        .round2_generate(sk)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    *state.relin_round_one.write() = Some(round_one);

    Ok(Json(KeySwitchGenResponse { key_switch_key: wire }))
}

async fn generate_multmultkey(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<MultMultKeyRequest>,
) -> Result<Json<MultMultKeyResponse>, ApiError> {
    tracing::info!(target = LOG_TARGET, key_tag = %req.key_tag, "generate_multmultkey received");
    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("crypto context not initialized"))?;

    if let Some(wire) = &req.install_joint_key {
        let jmk = crate::crypto::keys::JointRelinKey::from_wire(ctx, wire)
            .map_err(|e| ApiError::bad_request(e.to_string()))?;
        let mut backend_guard = state.backend.write();
        let backend = backend_guard
            .as_mut()
            .ok_or_else(|| ApiError::internal("backend not installed before relin key"))?;
        backend.install_relin_key(jmk.into_inner());
        return Ok(Json(MultMultKeyResponse {
            mult_key_share: String::new(),
        }));
    }

    let sk_guard = state.sk.read();
    let sk = sk_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("dkg_setup not yet called"))?;
    let round_one = state
        .relin_round_one
        .write()
        .take()
        .ok_or_else(|| ApiError::internal("generate_keyswitchgen not yet called"))?;

    let share = DkgEngine::new(ctx)
        .round3_finalize_self(round_one, &req.combined_key, sk)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let wire = base64::engine::general_purpose::STANDARD.encode(FheSerialize::to_bytes(&share));

    Ok(Json(MultMultKeyResponse { mult_key_share: wire }))
}

async fn blind_role_assignment(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<BlindRoleAssignmentRequest>,
) -> Result<Json<Ack>, ApiError> {
    // First arrival of the joint public key: DKG round 1 has finished, so
    // this is where the backend gets installed for every peer (there is no
    // dedicated "install key" verb — the joint public key rides along with
    // the first message that needs it).
    if state.backend.read().is_none() {
        let ctx = state
            .ctx
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| ApiError::internal("crypto context not initialized"))?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&req.joint_public_key)
            .map_err(|e| ApiError::bad_request(format!("malformed joint_public_key: {e}")))?;
        let pk = <fhe::bfv::PublicKey as fhe_traits::DeserializeParametrized>::from_bytes(
            &bytes,
            ctx.params.clone(),
        )
        .map_err(|e| ApiError::bad_request(format!("malformed joint_public_key: {e}")))?;
        *state.backend.write() = Some(BfvBackend::new(ctx, pk));
    }

    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("missing crypto context"))?;
    let wire = req
        .encrypted_roles
        .get(req.my_index as usize)
        .ok_or_else(|| ApiError::bad_request("my_index out of range of encrypted_roles"))?;
    let mine = CipherVector::from_wire(wire, ctx).map_err(|e| ApiError::internal(e.to_string()))?;
    *state.my_encrypted_role.write() = Some(mine);
    Ok(Json(Ack::ok()))
}

async fn complete_role_decryption(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<CompleteRoleDecryptionRequest>,
) -> Result<Json<Ack>, ApiError> {
    state.backend_or_err()?;
    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("missing crypto context"))?;
    let backend_guard = state.backend.read();
    let backend = backend_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("backend not ready"))?;
    let sk_guard = state.sk.read();
    let sk = sk_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("secret key share missing"))?;
    let my_ct_guard = state.my_encrypted_role.read();
    let my_ct = my_ct_guard
        .as_ref()
        .ok_or_else(|| ApiError::internal("own encrypted role not yet received"))?;

    let lead = backend
        .partial_decrypt_lead(sk, my_ct, state.player_index)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let mut shares = vec![lead];
    for wire in &req.partial_ciphertexts {
        shares.push(crate::rpc::wire_to_partial(wire, ctx).map_err(|e| ApiError::internal(e.to_string()))?);
    }

    let plain = backend
        .fusion_decrypt(shares)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let role = Role::from_one_hot(&plain)
        .ok_or_else(|| ApiError::internal("decrypted role vector was not a valid one-hot"))?;

    tracing::info!(target = LOG_TARGET, player_index = state.player_index, "role revealed locally");
    *state.my_role.write() = Some(role);
    Ok(Json(Ack::ok()))
}

async fn partial_decrypt(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<PartialDecryptRequest>,
) -> Result<Json<PartialDecryptResponse>, ApiError> {
    state.backend_or_err()?;
    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard.as_ref().ok_or_else(|| ApiError::internal("no context"))?;
    let ct = CipherVector::from_wire(&req.ciphertext, ctx)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let backend_guard = state.backend.read();
    let backend = backend_guard.as_ref().ok_or_else(|| ApiError::internal("no backend"))?;
    let sk_guard = state.sk.read();
    let sk = sk_guard.as_ref().ok_or_else(|| ApiError::internal("no sk"))?;

    let partial = if req.is_lead {
        backend.partial_decrypt_lead(sk, &ct, state.player_index)
    } else {
        backend.partial_decrypt_main(sk, &ct, state.player_index)
    }
    .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(PartialDecryptResponse {
        partial: crate::rpc::partial_to_wire(&partial),
    }))
}

async fn investigate_parallel(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<InvestigateParallelRequest>,
) -> Result<Json<PartialDecryptResponse>, ApiError> {
    // The peer never learns what this ciphertext represents (§4.H).
    partial_decrypt(
        Extension(state),
        Json(PartialDecryptRequest {
            ciphertext: req.ciphertext,
            is_lead: false,
        }),
    )
    .await
}

async fn relay_decrypt(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(mut req): Json<RelayDecryptRequest>,
) -> Result<Json<RelayDecryptResponse>, ApiError> {
    state.backend_or_err()?;
    let ctx_guard = state.ctx.read();
    let ctx = ctx_guard.as_ref().ok_or_else(|| ApiError::internal("no context"))?;
    let ct = CipherVector::from_wire(&req.ciphertext, ctx)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let backend_guard = state.backend.read();
    let backend = backend_guard.as_ref().ok_or_else(|| ApiError::internal("no backend"))?;
    let sk_guard = state.sk.read();
    let sk = sk_guard.as_ref().ok_or_else(|| ApiError::internal("no sk"))?;

    let partial = backend
        .partial_decrypt_main(sk, &ct, state.player_index)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    req.partial_results.push(crate::rpc::partial_to_wire(&partial));
    req.remaining_order.retain(|&p| p != state.player_index);
    drop(ctx_guard);
    drop(backend_guard);
    drop(sk_guard);

    if let Some(&next) = req.remaining_order.first() {
        tracing::debug!(target = LOG_TARGET, next, "relaying decryption to next hop");
        let client = super::client::HttpPeerClient::new(
            req.player_addresses.clone(),
            std::time::Duration::from_secs(10),
        );
        let response = client
            .relay_decrypt(next, req)
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
        return Ok(Json(response));
    }

    Ok(Json(RelayDecryptResponse {
        partial_results: req.partial_results,
    }))
}

async fn request_action(
    Extension(state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<RequestActionRequest>,
) -> Result<Json<RequestActionResponse>, ApiError> {
    state.backend_or_err()?;
    let role = *state.my_role.read();
    let target = state.action_decider.choose_target(&req, role).await;

    let backend_guard = state.backend.read();
    let backend = backend_guard.as_ref().ok_or_else(|| ApiError::internal("no backend"))?;
    let factory = crate::vector::VectorFactory::new(backend, state.num_players);
    let triplet = factory
        .triplet(target, role.unwrap_or(crate::roles::Role::Citizen), req.phase, &req.survivors)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(RequestActionResponse {
        vote_vector: triplet.vote.to_wire(),
        attack_vector: triplet.attack.to_wire(),
        heal_vector: triplet.heal.to_wire(),
        chat_messages: None,
    }))
}

async fn update(
    Extension(_state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<UpdateRequest>,
) -> Result<Json<Ack>, ApiError> {
    tracing::info!(target = LOG_TARGET, phase = ?req.phase, "update received");
    Ok(Json(Ack::ok()))
}

async fn death_announcement(
    Extension(_state): Extension<Arc<PeerAgentState>>,
    Json(req): Json<DeathAnnouncementRequest>,
) -> Result<Json<Ack>, ApiError> {
    tracing::info!(target = LOG_TARGET, deaths = req.deaths.len(), "death announcement received");
    Ok(Json(Ack::ok()))
}

async fn reveal_role(
    Extension(state): Extension<Arc<PeerAgentState>>,
) -> Result<Json<RevealRoleResponse>, ApiError> {
    let role = state
        .my_role
        .read()
        .ok_or_else(|| ApiError::bad_request("role not yet decrypted"))?;
    Ok(Json(RevealRoleResponse { role }))
}

async fn shutdown(
    Extension(_state): Extension<Arc<PeerAgentState>>,
) -> Result<Json<Ack>, ApiError> {
    tracing::info!(target = LOG_TARGET, "shutdown requested");
    Ok(Json(Ack::ok()))
}
