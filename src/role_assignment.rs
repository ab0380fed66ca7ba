//! Role Assigner (§4.E): shuffles and encrypts the role multiset, publishes
//! the ordered ciphertext list `E`, then drives each player's private
//! reveal without any party but that player ever seeing its own role in
//! the clear to anyone else.

use crate::crypto::ciphertext::WireCiphertext;
use crate::crypto::context::CryptoContext;
use crate::crypto::{CipherVector, FheBackend, PartyKeyShare};
use crate::error::ProtocolError;
use crate::roles::{shuffled_roles_for, Role};
use crate::rpc::client::PeerClient;
use crate::rpc::types::{
    BlindRoleAssignmentRequest, CompleteRoleDecryptionRequest, PartialDecryptRequest,
};

const LOG_TARGET: &str = "roles::assigner";

pub struct RoleAssigner<'a> {
    backend: &'a dyn FheBackend,
    ctx: &'a CryptoContext,
    peers: &'a dyn PeerClient,
    num_players: usize,
    requester_index: u8,
    sk: &'a PartyKeyShare,
    player_addresses: Vec<String>,
    joint_public_key_wire: String,
}

impl<'a> RoleAssigner<'a> {
    /// `requester_index` is the Coordinator's own player index. It never
    /// loops an RPC back to itself — the Coordinator process runs no RPC
    /// server of its own, so every step that would otherwise address
    /// `requester_index` is instead computed directly against `backend`
    /// and `sk`, the same convention `ThresholdDecryptionService` already
    /// uses for its own lead share.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        backend: &'a dyn FheBackend,
        ctx: &'a CryptoContext,
        peers: &'a dyn PeerClient,
        num_players: usize,
        requester_index: u8,
        sk: &'a PartyKeyShare,
        player_addresses: Vec<String>,
        joint_public_key_wire: String,
    ) -> Self {
        Self {
            backend,
            ctx,
            peers,
            num_players,
            requester_index,
            sk,
            player_addresses,
            joint_public_key_wire,
        }
    }

    /// Shuffles the role multiset, encrypts every role as a one-hot vector
    /// under the joint key, and returns the ordered list `E` alongside the
    /// shuffled roles (kept only by the caller for bookkeeping such as
    /// end-of-game reveal verification — never sent anywhere as plaintext).
    fn build_encrypted_roles(&self) -> Result<(Vec<Role>, Vec<CipherVector>), ProtocolError> {
        let roles = shuffled_roles_for(self.num_players)?;
        let ciphertexts = roles
            .iter()
            .map(|role| self.backend.encrypt(&role.to_one_hot()))
            .collect::<Result<Vec<CipherVector>, _>>()
            .map_err(crate::error::DkgError::Crypto)
            .map_err(ProtocolError::Dkg)?;
        Ok((roles, ciphertexts))
    }

    /// Publishes `E` to every remote peer (§4.E step 2) and drives each
    /// player's private reveal (§4.E step 3): for player `i`, every other
    /// party computes a non-lead partial decryption of `E[i]`, and player
    /// `i` fuses those with its own lead partial. Returns the shuffled
    /// roles (bookkeeping only, never sent anywhere), the published
    /// ciphertext list, and the Coordinator's own revealed role.
    pub async fn assign_and_reveal(
        &self,
    ) -> Result<(Vec<Role>, Vec<WireCiphertext>, Option<Role>), ProtocolError> {
        let (roles, ciphertexts) = self.build_encrypted_roles()?;
        let wire: Vec<WireCiphertext> = ciphertexts.iter().map(CipherVector::to_wire).collect();

        for peer in 0..self.num_players as u8 {
            if peer == self.requester_index {
                continue;
            }
            self.peers
                .blind_role_assignment(
                    peer,
                    BlindRoleAssignmentRequest {
                        my_index: peer,
                        encrypted_roles: wire.clone(),
                        joint_public_key: self.joint_public_key_wire.clone(),
                        player_addresses: self.player_addresses.clone(),
                    },
                )
                .await?;
        }

        let mut own_role = None;
        for target in 0..self.num_players as u8 {
            let mut partials = Vec::with_capacity(self.num_players - 1);
            for voter in 0..self.num_players as u8 {
                if voter == target {
                    continue;
                }
                if voter == self.requester_index {
                    let partial = self
                        .backend
                        .partial_decrypt_main(self.sk, &ciphertexts[target as usize], voter)
                        .map_err(crate::error::DkgError::Crypto)
                        .map_err(ProtocolError::Dkg)?;
                    partials.push(crate::rpc::partial_to_wire(&partial));
                    continue;
                }
                let resp = self
                    .peers
                    .partial_decrypt(
                        voter,
                        PartialDecryptRequest {
                            ciphertext: wire[target as usize].clone(),
                            is_lead: false,
                        },
                    )
                    .await?;
                partials.push(resp.partial);
            }

            if target == self.requester_index {
                let lead = self
                    .backend
                    .partial_decrypt_lead(self.sk, &ciphertexts[target as usize], target)
                    .map_err(crate::error::DkgError::Crypto)
                    .map_err(ProtocolError::Dkg)?;
                let mut shares = vec![lead];
                for wire_partial in &partials {
                    shares.push(
                        crate::rpc::wire_to_partial(wire_partial, self.ctx)
                            .map_err(crate::error::DkgError::Crypto)
                            .map_err(ProtocolError::Dkg)?,
                    );
                }
                let plain = self
                    .backend
                    .fusion_decrypt(shares)
                    .map_err(crate::error::DkgError::Crypto)
                    .map_err(ProtocolError::Dkg)?;
                own_role = Role::from_one_hot(&plain);
            } else {
                self.peers
                    .complete_role_decryption(
                        target,
                        CompleteRoleDecryptionRequest {
                            partial_ciphertexts: partials,
                        },
                    )
                    .await?;
            }
            tracing::debug!(target = LOG_TARGET, player = target, "role revealed privately");
        }

        Ok((roles, wire, own_role))
    }
}
