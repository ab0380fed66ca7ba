use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

const LOG_TARGET: &str = "server::error";

/// Failures from the crypto adapter: key generation, encode/decode, homomorphic ops.
#[derive(Debug, thiserror::Error)]
pub enum FheCryptoError {
    #[error("fhe library error: {0}")]
    Backend(String),
    #[error("ciphertext slot count mismatch: expected {expected}, got {actual}")]
    SlotMismatch { expected: usize, actual: usize },
    #[error("plaintext value {0} out of range for configured modulus")]
    ValueOutOfRange(u64),
}

/// Failures during the three-round distributed key generation protocol.
#[derive(Debug, thiserror::Error)]
pub enum DkgError {
    #[error(transparent)]
    Crypto(#[from] FheCryptoError),
    #[error("dkg round {round} received {got} contributions, expected {expected}")]
    IncompleteRound {
        round: u8,
        got: usize,
        expected: usize,
    },
    #[error("dkg round {0} contribution received out of order")]
    OutOfOrder(u8),
    #[error("dkg already finalized for this game")]
    AlreadyFinalized,
}

/// Failures reconstructing a plaintext from threshold decryption shares.
#[derive(Debug, thiserror::Error)]
pub enum ReconstructionError {
    #[error(transparent)]
    Crypto(#[from] FheCryptoError),
    #[error("missing decryption share from player {0}")]
    MissingShare(u8),
    #[error("expected exactly one lead share, got {0}")]
    LeadShareCount(usize),
    #[error("duplicate decryption share from player {0}")]
    DuplicateShare(u8),
}

/// Failures in the peer RPC transport layer.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("request to peer {peer} failed: {source}")]
    Request {
        peer: u8,
        #[source]
        source: reqwest::Error,
    },
    #[error("peer {0} timed out")]
    Timeout(u8),
    #[error("malformed response from peer {0}: {1}")]
    MalformedResponse(u8, String),
    #[error("no address configured for peer {0}")]
    UnknownPeer(u8),
}

/// Protocol-level violations: messages arriving in the wrong phase, from the wrong sender.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error(transparent)]
    Dkg(#[from] DkgError),
    #[error(transparent)]
    Reconstruction(#[from] ReconstructionError),
    #[error(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    GameRule(#[from] GameRuleError),
    #[error("message for phase {expected:?} arrived during phase {actual:?}")]
    WrongPhase {
        expected: crate::session::GamePhase,
        actual: crate::session::GamePhase,
    },
    #[error("player {0} is not part of this game")]
    UnknownPlayer(u8),
}

/// Violations of game rules: invalid role counts, double actions, bad targets.
#[derive(Debug, thiserror::Error)]
pub enum GameRuleError {
    #[error("player count {0} outside supported range {1}..={2}")]
    PlayerCountOutOfRange(usize, usize, usize),
    #[error("no role distribution configured for {0} players")]
    NoRoleDistribution(usize),
    #[error("action target {0} is not a valid player index")]
    InvalidTarget(u8),
    #[error("player {0} already submitted an action this phase")]
    DuplicateAction(u8),
    #[error("game is already complete")]
    GameComplete,
}

/// Errors surfaced across the axum RPC boundary.
#[derive(Debug)]
pub enum ApiError {
    NotFound,
    BadRequest(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found() -> Self {
        ApiError::NotFound
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl From<ProtocolError> for ApiError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::WrongPhase { .. }
            | ProtocolError::UnknownPlayer(_)
            | ProtocolError::GameRule(_) => ApiError::bad_request(err.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<GameRuleError> for ApiError {
    fn from(err: GameRuleError) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND.into_response(),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            ApiError::Internal(message) => {
                error!(target = LOG_TARGET, %message, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message).into_response()
            }
        }
    }
}
