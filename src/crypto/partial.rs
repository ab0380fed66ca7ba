use fhe::mbfv::DecryptionShare;
use serde::{Deserialize, Serialize};

use super::ciphertext::base64_bytes;

/// One party's contribution to threshold decryption of a ciphertext
/// (§4.A `PC`). `is_lead` marks the single distinguished share every
/// fusion must contain exactly once (§3 invariants, §8 property 2).
///
/// The backing `fhe` crate's decryption shares are symmetric — there is
/// no native lead/main distinction — so `is_lead` is bookkeeping owned by
/// this engine, not the underlying library; [`super::FheBackend::fusion_decrypt`]
/// is the enforcement point.
pub struct PartialDecryption {
    pub(crate) share: DecryptionShare,
    pub is_lead: bool,
    pub player_index: u8,
}

/// Wire representation of a [`PartialDecryption`].
#[derive(Clone, Serialize, Deserialize)]
pub struct WirePartialDecryption {
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub is_lead: bool,
    pub player_index: u8,
}
