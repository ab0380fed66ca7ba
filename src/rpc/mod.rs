//! The symmetric peer RPC surface (§4.I): wire types, an HTTP/in-memory
//! client, and the axum router every peer process serves.

pub mod client;
pub mod server;
pub mod types;

pub use client::{HttpPeerClient, PeerClient};

use fhe_traits::{DeserializeParametrized, Serialize as FheSerialize};

use crate::crypto::context::CryptoContext;
use crate::crypto::partial::{PartialDecryption, WirePartialDecryption};
use crate::error::FheCryptoError;

/// Converts a [`PartialDecryption`] to its wire form. `DecryptionShare`
/// supports the same parametrized (de)serialization as the other
/// `fhe`-crate artifacts (see `fhe_traits::{Serialize, DeserializeParametrized}`,
/// grounded in the `EnclaveBFV` wrapper's `.to_bytes()`/`try_deserialize` usage).
pub fn partial_to_wire(partial: &PartialDecryption) -> WirePartialDecryption {
    WirePartialDecryption {
        bytes: FheSerialize::to_bytes(&partial.share),
        is_lead: partial.is_lead,
        player_index: partial.player_index,
    }
}

pub fn wire_to_partial(
    wire: &WirePartialDecryption,
    ctx: &CryptoContext,
) -> Result<PartialDecryption, FheCryptoError> {
    let share = fhe::mbfv::DecryptionShare::from_bytes(&wire.bytes, ctx.params.clone())
        .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
    Ok(PartialDecryption {
        share,
        is_lead: wire.is_lead,
        player_index: wire.player_index,
    })
}
