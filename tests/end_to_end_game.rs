//! Drives a full N=4..6 game through `GameCoordinator` over an in-memory
//! `PeerClient`, the gap `tests/dkg_and_reveal.rs` deliberately leaves open
//! (that suite exercises `DkgEngine`/`BfvBackend` directly and never calls
//! `GameCoordinator`, `RoleAssigner`, `ActionCollector` or `PhaseEngine`).

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::Router;
use tower::ServiceExt;

use blind_mafia::config::{role_counts_for, Config};
use blind_mafia::coordinator::GameCoordinator;
use blind_mafia::error::NetworkError;
use blind_mafia::roles::Role;
use blind_mafia::rpc::client::PeerClient;
use blind_mafia::rpc::server::{ActionDecider, PeerAgentState};
use blind_mafia::rpc::types::*;
use blind_mafia::session::{GamePhase, Player};

/// Drives each peer's router in-process via `tower::ServiceExt::oneshot`
/// instead of a real socket. Handler functions in `rpc::server` are private,
/// so this is the only way to reach them from outside the crate.
struct InMemoryPeerClient {
    routers: HashMap<u8, Router>,
}

impl InMemoryPeerClient {
    fn new(routers: HashMap<u8, Router>) -> Self {
        Self { routers }
    }

    async fn dispatch<Resp: for<'de> serde::Deserialize<'de>>(
        &self,
        peer: u8,
        request: Request<Body>,
    ) -> Result<Resp, NetworkError> {
        let router = self
            .routers
            .get(&peer)
            .cloned()
            .ok_or(NetworkError::UnknownPeer(peer))?;
        let response = router
            .oneshot(request)
            .await
            .expect("in-memory router call cannot fail at the transport layer");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("reading in-memory response body cannot fail");
        if !status.is_success() {
            return Err(NetworkError::MalformedResponse(
                peer,
                String::from_utf8_lossy(&bytes).to_string(),
            ));
        }
        serde_json::from_slice(&bytes).map_err(|e| NetworkError::MalformedResponse(peer, e.to_string()))
    }

    async fn post<Req: serde::Serialize, Resp: for<'de> serde::Deserialize<'de>>(
        &self,
        peer: u8,
        path: &str,
        req: &Req,
    ) -> Result<Resp, NetworkError> {
        let body = serde_json::to_vec(req).expect("request serialization cannot fail for these plain types");
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .expect("request building cannot fail");
        self.dispatch(peer, request).await
    }
}

#[async_trait::async_trait]
impl PeerClient for InMemoryPeerClient {
    async fn dkg_setup(&self, peer: u8, req: DkgSetupRequest) -> Result<Ack, NetworkError> {
        self.post(peer, "/dkg_setup", &req).await
    }

    async fn dkg_round(&self, peer: u8, req: DkgRoundRequest) -> Result<DkgRoundResponse, NetworkError> {
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

    async fn blind_role_assignment(&self, peer: u8, req: BlindRoleAssignmentRequest) -> Result<Ack, NetworkError> {
        self.post(peer, "/blind_role_assignment", &req).await
    }

    async fn complete_role_decryption(
        &self,
        peer: u8,
        req: CompleteRoleDecryptionRequest,
    ) -> Result<Ack, NetworkError> {
        self.post(peer, "/complete_role_decryption", &req).await
    }

    async fn partial_decrypt(&self, peer: u8, req: PartialDecryptRequest) -> Result<PartialDecryptResponse, NetworkError> {
        self.post(peer, "/partial_decrypt", &req).await
    }

    async fn investigate_parallel(
        &self,
        peer: u8,
        req: InvestigateParallelRequest,
    ) -> Result<PartialDecryptResponse, NetworkError> {
        self.post(peer, "/investigate_parallel", &req).await
    }

    async fn relay_decrypt(&self, peer: u8, req: RelayDecryptRequest) -> Result<RelayDecryptResponse, NetworkError> {
        self.post(peer, "/relay_decrypt", &req).await
    }

    async fn request_action(&self, peer: u8, req: RequestActionRequest) -> Result<RequestActionResponse, NetworkError> {
        self.post(peer, "/request_action", &req).await
    }

    async fn update(&self, peer: u8, req: UpdateRequest) -> Result<Ack, NetworkError> {
        self.post(peer, "/update", &req).await
    }

    async fn death_announcement(&self, peer: u8, req: DeathAnnouncementRequest) -> Result<Ack, NetworkError> {
        self.post(peer, "/death_announcement", &req).await
    }

    async fn reveal_role(&self, peer: u8) -> Result<RevealRoleResponse, NetworkError> {
        let request = Request::builder()
            .method("GET")
            .uri("/reveal_role")
            .body(Body::empty())
            .expect("request building cannot fail");
        self.dispatch(peer, request).await
    }

    async fn shutdown(&self, peer: u8) -> Result<Ack, NetworkError> {
        let request = Request::builder()
            .method("POST")
            .uri("/shutdown")
            .body(Body::empty())
            .expect("request building cannot fail");
        self.dispatch(peer, request).await
    }
}

/// Mafia always attacks the lowest-indexed other survivor; every other role
/// and phase abstains. Guarantees at least one death per night regardless
/// of which role the decider's own player turns out to hold, so the game
/// reaches a winner in a bounded number of nights.
struct ScriptedActionDecider {
    self_index: u8,
}

#[async_trait::async_trait]
impl ActionDecider for ScriptedActionDecider {
    async fn choose_target(&self, req: &RequestActionRequest, role: Option<Role>) -> Option<u8> {
        if req.phase != GamePhase::Night || role != Some(Role::Mafia) {
            return None;
        }
        req.survivors.iter().copied().find(|&p| p != self.self_index)
    }
}

fn test_config(log_dir: &std::path::Path) -> Config {
    Config {
        min_players: 4,
        max_players: 10,
        night_phase_timeout_secs: 30,
        day_phase_timeout_secs: 30,
        vote_phase_timeout_secs: 30,
        connection_timeout_secs: 10,
        action_request_timeout_secs: 30,
        lobby_addresses: Vec::new(),
        openai_api_key: None,
        bind_addr: "0.0.0.0:0".to_string(),
        player_index: 0,
        log_dir: log_dir.display().to_string(),
    }
}

fn make_players(num_players: usize) -> Vec<Player> {
    (0..num_players as u8)
        .map(|i| Player {
            index: i,
            is_human: i == 0,
            address: format!("in-memory-{i}"),
            alive: true,
            name: format!("p{i}"),
        })
        .collect()
}

async fn run_full_game(num_players: usize) {
    let routers: HashMap<u8, Router> = (1..num_players as u8)
        .map(|i| {
            let decider: Arc<dyn ActionDecider> = Arc::new(ScriptedActionDecider { self_index: i });
            let state = Arc::new(PeerAgentState::new(i, num_players, decider));
            (i, blind_mafia::rpc::server::router(state))
        })
        .collect();
    let client = InMemoryPeerClient::new(routers);
    let local_decider = ScriptedActionDecider { self_index: 0 };

    let log_dir = std::env::temp_dir().join(format!("blind-mafia-e2e-{}", uuid::Uuid::new_v4()));
    let config = test_config(&log_dir);
    let game_id = uuid::Uuid::new_v4();

    let coordinator = GameCoordinator::bootstrap(config, game_id, num_players, &client, &local_decider)
        .await
        .expect("dkg bootstrap succeeds over the in-memory transport");

    let (winner, reveals) = coordinator
        .play(make_players(num_players))
        .await
        .expect("game runs to completion");

    assert_eq!(reveals.len(), num_players);
    let expected = role_counts_for(num_players).expect("supported player count");

    let mut mafia = 0;
    let mut doctor = 0;
    let mut police = 0;
    let mut citizen = 0;
    for (_, role) in &reveals {
        match role.expect("every player's role is revealed at game end") {
            Role::Mafia => mafia += 1,
            Role::Doctor => doctor += 1,
            Role::Police => police += 1,
            Role::Citizen => citizen += 1,
        }
    }
    assert_eq!(mafia, expected.mafia);
    assert_eq!(doctor, expected.doctor);
    assert_eq!(police, expected.police);
    assert_eq!(citizen, expected.citizen);

    assert!(matches!(
        winner,
        blind_mafia::session::Winner::Citizens | blind_mafia::session::Winner::Mafia
    ));

    std::fs::remove_dir_all(&log_dir).ok();
}

#[tokio::test]
async fn four_player_game_runs_to_completion() {
    run_full_game(4).await;
}

#[tokio::test]
async fn five_player_game_runs_to_completion() {
    run_full_game(5).await;
}

#[tokio::test]
async fn six_player_game_runs_to_completion() {
    run_full_game(6).await;
}
