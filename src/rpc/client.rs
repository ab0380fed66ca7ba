use async_trait::async_trait;

use crate::error::NetworkError;

use super::types::*;

/// The symmetric RPC surface every peer exposes (§4.I). Both the
/// Coordinator and Agent binaries implement this trait so engine code
/// never distinguishes "the human" from "an agent" when relaying.
#[async_trait]
pub trait PeerClient: Send + Sync {
    async fn dkg_setup(&self, peer: u8, req: DkgSetupRequest) -> Result<Ack, NetworkError>;
    async fn dkg_round(
        &self,
        peer: u8,
        req: DkgRoundRequest,
    ) -> Result<DkgRoundResponse, NetworkError>;
    async fn generate_keyswitchgen(
        &self,
        peer: u8,
        req: KeySwitchGenRequest,
    ) -> Result<KeySwitchGenResponse, NetworkError>;
    async fn generate_multmultkey(
        &self,
        peer: u8,
        req: MultMultKeyRequest,
    ) -> Result<MultMultKeyResponse, NetworkError>;
    async fn blind_role_assignment(
        &self,
        peer: u8,
        req: BlindRoleAssignmentRequest,
    ) -> Result<Ack, NetworkError>;
    async fn complete_role_decryption(
        &self,
        peer: u8,
        req: CompleteRoleDecryptionRequest,
    ) -> Result<Ack, NetworkError>;
    async fn partial_decrypt(
        &self,
        peer: u8,
        req: PartialDecryptRequest,
    ) -> Result<PartialDecryptResponse, NetworkError>;
    async fn investigate_parallel(
        &self,
        peer: u8,
        req: InvestigateParallelRequest,
    ) -> Result<PartialDecryptResponse, NetworkError>;
    async fn relay_decrypt(
        &self,
        peer: u8,
        req: RelayDecryptRequest,
    ) -> Result<RelayDecryptResponse, NetworkError>;
    async fn request_action(
        &self,
        peer: u8,
        req: RequestActionRequest,
    ) -> Result<RequestActionResponse, NetworkError>;
    async fn update(&self, peer: u8, req: UpdateRequest) -> Result<Ack, NetworkError>;
    async fn death_announcement(
        &self,
        peer: u8,
        req: DeathAnnouncementRequest,
    ) -> Result<Ack, NetworkError>;
    async fn reveal_role(&self, peer: u8) -> Result<RevealRoleResponse, NetworkError>;
    async fn shutdown(&self, peer: u8) -> Result<Ack, NetworkError>;
}

/// HTTP implementation of [`PeerClient`], used between real processes.
/// Peer addresses are resolved from the lobby address list (§6.3).
pub struct HttpPeerClient {
    http: reqwest::Client,
    addresses: Vec<String>,
    timeout: std::time::Duration,
}

impl HttpPeerClient {
    pub fn new(addresses: Vec<String>, timeout: std::time::Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client building never fails with this config");
        Self {
            http,
            addresses,
            timeout,
        }
    }

    fn addr(&self, peer: u8) -> Result<&str, NetworkError> {
        self.addresses
            .get(peer as usize)
            .map(|s| s.as_str())
            .ok_or(NetworkError::UnknownPeer(peer))
    }

    async fn post<Req: serde::Serialize + Sync, Resp: for<'de> serde::Deserialize<'de>>(
        &self,
        peer: u8,
        path: &str,
        body: &Req,
    ) -> Result<Resp, NetworkError> {
        let url = format!("{}{}", self.addr(peer)?, path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| NetworkError::Request { peer, source })?;
        resp.json::<Resp>()
            .await
            .map_err(|source| NetworkError::Request { peer, source })
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn dkg_setup(&self, peer: u8, req: DkgSetupRequest) -> Result<Ack, NetworkError> {
        self.post(peer, "/dkg_setup", &req).await
    }

    async fn dkg_round(
        &self,
        peer: u8,
        req: DkgRoundRequest,
    ) -> Result<DkgRoundResponse, NetworkError> {
        self.post(peer, "/dkg_round", &req).await
    }

    async fn generate_keyswitchgen(
        &self,
        peer: u8,
        req: KeySwitchGenRequest,
    ) -> Result<KeySwitchGenResponse, NetworkError> {
        self.post(peer, "/generate_keyswitchgen", &req).await
    }

    async fn generate_multmultkey(
        &self,
        peer: u8,
        req: MultMultKeyRequest,
    ) -> Result<MultMultKeyResponse, NetworkError> {
        self.post(peer, "/generate_multmultkey", &req).await
    }

    async fn blind_role_assignment(
        &self,
        peer: u8,
        req: BlindRoleAssignmentRequest,
    ) -> Result<Ack, NetworkError> {
        self.post(peer, "/blind_role_assignment", &req).await
    }

    async fn complete_role_decryption(
        &self,
        peer: u8,
        req: CompleteRoleDecryptionRequest,
    ) -> Result<Ack, NetworkError> {
        self.post(peer, "/complete_role_decryption", &req).await
    }

    async fn partial_decrypt(
        &self,
        peer: u8,
        req: PartialDecryptRequest,
    ) -> Result<PartialDecryptResponse, NetworkError> {
        self.post(peer, "/partial_decrypt", &req).await
    }

    async fn investigate_parallel(
        &self,
        peer: u8,
        req: InvestigateParallelRequest,
    ) -> Result<PartialDecryptResponse, NetworkError> {
        self.post(peer, "/investigate_parallel", &req).await
    }

    async fn relay_decrypt(
        &self,
        peer: u8,
        req: RelayDecryptRequest,
    ) -> Result<RelayDecryptResponse, NetworkError> {
        self.post(peer, "/relay_decrypt", &req).await
    }

    async fn request_action(
        &self,
        peer: u8,
        req: RequestActionRequest,
    ) -> Result<RequestActionResponse, NetworkError> {
        self.post(peer, "/request_action", &req).await
    }

    async fn update(&self, peer: u8, req: UpdateRequest) -> Result<Ack, NetworkError> {
        self.post(peer, "/update", &req).await
    }

    async fn death_announcement(
        &self,
        peer: u8,
        req: DeathAnnouncementRequest,
    ) -> Result<Ack, NetworkError> {
        self.post(peer, "/death_announcement", &req).await
    }

    async fn reveal_role(&self, peer: u8) -> Result<RevealRoleResponse, NetworkError> {
        let url = format!("{}/reveal_role", self.addr(peer)?);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|source| NetworkError::Request { peer, source })?;
        resp.json().await.map_err(|source| NetworkError::Request { peer, source })
    }

    async fn shutdown(&self, peer: u8) -> Result<Ack, NetworkError> {
        let url = format!("{}/shutdown", self.addr(peer)?);
        let resp = self
            .http
            .post(&url)
            .send()
            .await
            .map_err(|source| NetworkError::Request { peer, source })?;
        resp.json().await.map_err(|source| NetworkError::Request { peer, source })
    }
}
