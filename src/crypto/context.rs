use std::sync::Arc;

use base64::Engine;
use fhe::bfv::{BfvParameters, BfvParametersBuilder};
use fhe::mbfv::CommonRandomPoly;
use fhe_traits::{DeserializeParametrized, Serialize as FheSerialize};
use rand::thread_rng;

use crate::config::CryptoParams;
use crate::error::FheCryptoError;

const LOG_TARGET: &str = "crypto::context";

/// Process-wide handle bound to one lattice ring, created once per game
/// and immutable after creation (§3 "Crypto context CC").
#[derive(Clone)]
pub struct CryptoContext {
    pub params: Arc<BfvParameters>,
    pub crp: CommonRandomPoly,
    pub slot_count: usize,
}

impl CryptoContext {
    /// Builds the shared parameters and generates a fresh common random
    /// polynomial. Only the Coordinator calls this — the CRP it produces
    /// must then be distributed verbatim to every peer via
    /// [`CryptoContext::from_wire`], since two independently-generated CRPs
    /// would make every party's public key share incompatible with every
    /// other's (§4.D round 1).
    pub fn new(crypto: &CryptoParams, slot_count: usize) -> Result<Self, FheCryptoError> {
        let params = build_params(crypto)?;
        let crp = CommonRandomPoly::new(&params, &mut thread_rng())
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;

        tracing::info!(
            target = LOG_TARGET,
            degree = crypto.poly_modulus_degree,
            slot_count,
            "crypto context created"
        );

        Ok(Self {
            params,
            crp,
            slot_count,
        })
    }

    /// Builds a context from parameters and a CRP received over the wire
    /// from the Coordinator. Every peer calls this in `dkg_setup` rather
    /// than generating its own CRP.
    pub fn from_wire(
        crypto: &CryptoParams,
        crp_wire: &str,
        slot_count: usize,
    ) -> Result<Self, FheCryptoError> {
        let params = build_params(crypto)?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(crp_wire)
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        let crp = CommonRandomPoly::from_bytes(&bytes, params.clone())
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;

        tracing::info!(
            target = LOG_TARGET,
            degree = crypto.poly_modulus_degree,
            slot_count,
            "crypto context installed from coordinator's crp"
        );

        Ok(Self {
            params,
            crp,
            slot_count,
        })
    }

    /// Serializes this context's CRP so the Coordinator can hand it to
    /// every peer's `dkg_setup` call.
    pub fn crp_to_wire(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(FheSerialize::to_bytes(&self.crp))
    }
}

fn build_params(crypto: &CryptoParams) -> Result<Arc<BfvParameters>, FheCryptoError> {
    let moduli = default_moduli(crypto.moduli_sizes, crypto.poly_modulus_degree)?;
    BfvParametersBuilder::new()
        .set_degree(crypto.poly_modulus_degree)
        .set_plaintext_modulus(crypto.plaintext_modulus)
        .set_moduli(&moduli)
        .build_arc()
        .map_err(|e| FheCryptoError::Backend(e.to_string()))
}

/// Reference uses a 62-bit NTT-friendly prime chain; the exact primes are
/// an implementation detail of the moduli sizes requested.
fn default_moduli(sizes: &[usize], degree: usize) -> Result<Vec<u64>, FheCryptoError> {
    if sizes.is_empty() {
        return Err(FheCryptoError::Backend("no moduli configured".into()));
    }
    // fhe-util exposes generate_prime; we only need NTT-friendly primes of
    // the requested bit sizes for the requested degree.
    sizes
        .iter()
        .map(|&bits| {
            fhe_util::generate_prime(bits, 2 * degree as u64, 1u64 << bits)
                .ok_or_else(|| FheCryptoError::Backend(format!("no {bits}-bit prime found")))
        })
        .collect()
}
