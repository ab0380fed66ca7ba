use fhe::bfv::Ciphertext;
use fhe_traits::{DeserializeParametrized, Serialize as FheSerialize};
use serde::{Deserialize, Serialize};

use super::context::CryptoContext;
use crate::error::FheCryptoError;

/// A ciphertext encoding an integer vector over the joint key (§3 "Ciphertext C").
///
/// Wraps the backend ciphertext type plus enough shape metadata
/// (`slots`) to catch accidental slot-count mismatches before they reach
/// the wire.
#[derive(Clone)]
pub struct CipherVector {
    pub(crate) ct: Ciphertext,
    pub slots: usize,
}

impl CipherVector {
    pub fn to_wire(&self) -> WireCiphertext {
        WireCiphertext {
            bytes: self.ct.to_bytes(),
            slots: self.slots,
        }
    }

    pub fn from_wire(
        wire: &WireCiphertext,
        ctx: &CryptoContext,
    ) -> Result<Self, FheCryptoError> {
        let ct = Ciphertext::from_bytes(&wire.bytes, &ctx.params)
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        Ok(Self {
            ct,
            slots: wire.slots,
        })
    }
}

/// Wire representation of a [`CipherVector`]: base64-over-binary, matching
/// the reference wire format (§6.1).
#[derive(Clone, Serialize, Deserialize)]
pub struct WireCiphertext {
    #[serde(with = "base64_bytes")]
    pub bytes: Vec<u8>,
    pub slots: usize,
}

pub(crate) mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Vec<u8>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(d)?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
