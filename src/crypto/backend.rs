use fhe::bfv::{Encoding, Plaintext};
use fhe::mbfv::{Aggregate, DecryptionShare};
use fhe_traits::{FheDecoder, FheEncoder, FheEncrypter};
use rand::thread_rng;

use super::ciphertext::CipherVector;
use super::context::CryptoContext;
use super::keys::PartyKeyShare;
use super::partial::PartialDecryption;
use super::FheBackend;
use crate::error::FheCryptoError;

const LOG_TARGET: &str = "crypto::backend";

/// The sole [`FheBackend`] implementation, backed by the `fhe` crate's BFV
/// scheme.
pub struct BfvBackend {
    ctx: CryptoContext,
    jpk: fhe::bfv::PublicKey,
    rk: Option<fhe::bfv::RelinearizationKey>,
}

impl BfvBackend {
    pub fn new(ctx: CryptoContext, jpk: fhe::bfv::PublicKey) -> Self {
        Self { ctx, jpk, rk: None }
    }

    /// Installs the joint relinearization key produced by DKG round 3.
    /// Must be called before any [`FheBackend::mul`] (§4.D round 3, §4.G
    /// night-phase kill formula).
    pub fn install_relin_key(&mut self, rk: fhe::bfv::RelinearizationKey) {
        self.rk = Some(rk);
    }
}

impl FheBackend for BfvBackend {
    fn encrypt(&self, values: &[u64]) -> Result<CipherVector, FheCryptoError> {
        let mut padded = values.to_vec();
        padded.resize(self.ctx.slot_count, 0);
        let pt = Plaintext::try_encode(&padded, Encoding::poly(), &self.ctx.params)
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        let ct = self
            .jpk
            .try_encrypt(&pt, &mut thread_rng())
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        Ok(CipherVector {
            ct,
            slots: self.ctx.slot_count,
        })
    }

    fn add(&self, a: &CipherVector, b: &CipherVector) -> Result<CipherVector, FheCryptoError> {
        if a.slots != b.slots {
            return Err(FheCryptoError::SlotMismatch {
                expected: a.slots,
                actual: b.slots,
            });
        }
        Ok(CipherVector {
            ct: &a.ct + &b.ct,
            slots: a.slots,
        })
    }

    fn negate(&self, a: &CipherVector) -> Result<CipherVector, FheCryptoError> {
        Ok(CipherVector {
            ct: -&a.ct,
            slots: a.slots,
        })
    }

    fn mul(&self, a: &CipherVector, b: &CipherVector) -> Result<CipherVector, FheCryptoError> {
        if a.slots != b.slots {
            return Err(FheCryptoError::SlotMismatch {
                expected: a.slots,
                actual: b.slots,
            });
        }
        let rk = self
            .rk
            .as_ref()
            .ok_or_else(|| FheCryptoError::Backend("joint relinearization key not installed".into()))?;
        let mut product = &a.ct * &b.ct;
        rk.relinearizes(&mut product)
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        Ok(CipherVector {
            ct: product,
            slots: a.slots,
        })
    }

    fn partial_decrypt_lead(
        &self,
        sk: &PartyKeyShare,
        ct: &CipherVector,
        player_index: u8,
    ) -> Result<PartialDecryption, FheCryptoError> {
        self.partial_decrypt(sk, ct, true, player_index)
    }

    fn partial_decrypt_main(
        &self,
        sk: &PartyKeyShare,
        ct: &CipherVector,
        player_index: u8,
    ) -> Result<PartialDecryption, FheCryptoError> {
        self.partial_decrypt(sk, ct, false, player_index)
    }

    fn fusion_decrypt(&self, shares: Vec<PartialDecryption>) -> Result<Vec<u64>, FheCryptoError> {
        let lead_count = shares.iter().filter(|s| s.is_lead).count();
        if lead_count != 1 {
            return Err(FheCryptoError::Backend(format!(
                "fusion requires exactly one lead share, got {lead_count}"
            )));
        }
        let pt: Plaintext = shares
            .into_iter()
            .map(|s| s.share)
            .aggregate()
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        Vec::<u64>::try_decode(&pt, Encoding::poly())
            .map_err(|e| FheCryptoError::Backend(e.to_string()))
    }
}

impl BfvBackend {
    fn partial_decrypt(
        &self,
        sk: &PartyKeyShare,
        ct: &CipherVector,
        is_lead: bool,
        player_index: u8,
    ) -> Result<PartialDecryption, FheCryptoError> {
        let share = DecryptionShare::new(&sk.sk, &ct.ct, &mut thread_rng())
            .map_err(|e| FheCryptoError::Backend(e.to_string()))?;
        tracing::debug!(
            target = LOG_TARGET,
            is_lead,
            player_index,
            slots = ct.slots,
            "produced partial decryption share"
        );
        Ok(PartialDecryption {
            share,
            is_lead,
            player_index,
        })
    }
}
