use serde::{Deserialize, Serialize};

use crate::crypto::ciphertext::WireCiphertext;
use crate::crypto::partial::WirePartialDecryption;
use crate::roles::Role;
use crate::session::GamePhase;

/// `dkg_setup{game_id, crypto_context, crp, num_players, player_index}` →
/// ack. `crp` is the Coordinator's common random polynomial, serialized so
/// every peer installs the identical value rather than generating its own
/// (two independently-generated CRPs would make every party's public key
/// share incompatible with every other's).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgSetupRequest {
    pub game_id: uuid::Uuid,
    pub crypto_context: String,
    pub crp: String,
    pub num_players: usize,
    pub player_index: u8,
}

/// `dkg_round{round_number, previous_public_key}` → next aggregate public key.
///
/// `previous_shares` carries the growing list of base64 public-key-share
/// contributions collected so far rather than a single midway "aggregate
/// key" value — there is no well-formed public key until the chain
/// completes, only a running set of shares (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgRoundRequest {
    pub round_number: u8,
    pub previous_shares: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DkgRoundResponse {
    pub shares: Vec<String>,
}

/// `generate_keyswitchgen{game_id, prev_key}` → `KS_i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySwitchGenRequest {
    pub game_id: uuid::Uuid,
    pub prev_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySwitchGenResponse {
    pub key_switch_key: String,
}

/// `generate_multmultkey{game_id, combined_key, key_tag, install_joint_key?}` → `MM_i`.
///
/// When `install_joint_key` is set this is the coordinator's second call to
/// this verb per peer, carrying the fully combined `JMK` (built from every
/// peer's `MM_i`) for local installation rather than asking for a fresh
/// share — there is no separate "install key" verb in the RPC surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultMultKeyRequest {
    pub game_id: uuid::Uuid,
    pub combined_key: String,
    pub key_tag: String,
    pub install_joint_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultMultKeyResponse {
    pub mult_key_share: String,
}

/// `blind_role_assignment{my_index, encrypted_roles, joint_public_key, player_addresses}` → ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlindRoleAssignmentRequest {
    pub my_index: u8,
    pub encrypted_roles: Vec<WireCiphertext>,
    pub joint_public_key: String,
    pub player_addresses: Vec<String>,
}

/// `complete_role_decryption{partial_ciphertexts}` → ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteRoleDecryptionRequest {
    pub partial_ciphertexts: Vec<WirePartialDecryption>,
}

/// `partial_decrypt{ciphertext, is_lead}` → partial ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialDecryptRequest {
    pub ciphertext: WireCiphertext,
    pub is_lead: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartialDecryptResponse {
    pub partial: WirePartialDecryption,
}

/// `investigate_parallel{ciphertext}` → partial ciphertext; the peer does
/// not learn what the ciphertext represents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigateParallelRequest {
    pub ciphertext: WireCiphertext,
}

/// `relay_decrypt{ciphertext, partial_results, remaining_order, player_addresses}`
/// → either forwards or returns `{partial_results}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayDecryptRequest {
    pub ciphertext: WireCiphertext,
    pub partial_results: Vec<WirePartialDecryption>,
    pub remaining_order: Vec<u8>,
    pub player_addresses: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayDecryptResponse {
    pub partial_results: Vec<WirePartialDecryption>,
}

/// `request_action{phase, message, survivors, dead_players, remaining_time?}`
/// → `{vote_vector, attack_vector, heal_vector, chat_messages?}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestActionRequest {
    pub phase: GamePhase,
    pub message: String,
    pub survivors: Vec<u8>,
    pub dead_players: Vec<u8>,
    pub remaining_time_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestActionResponse {
    pub vote_vector: WireCiphertext,
    pub attack_vector: WireCiphertext,
    pub heal_vector: WireCiphertext,
    pub chat_messages: Option<Vec<String>>,
}

/// `update{phase, message, survivors, dead_players, recently_killed?, recently_voted_out?}` → ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub phase: GamePhase,
    pub message: String,
    pub survivors: Vec<u8>,
    pub dead_players: Vec<u8>,
    pub recently_killed: Option<Vec<u8>>,
    pub recently_voted_out: Option<u8>,
}

/// `death_announcement{deaths: [{player_index, role}]}` → ack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathAnnouncementRequest {
    pub deaths: Vec<DeathEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeathEntry {
    pub player_index: u8,
    pub role: Role,
}

/// `reveal_role` → `{role}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealRoleResponse {
    pub role: Role,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ack {
    pub ok: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// `shutdown_agent{port}` → ack, issued by the lobby supervisor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShutdownAgentRequest {
    pub port: u16,
}
