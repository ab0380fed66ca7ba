//! Blind game-state engine for multi-party Mafia under threshold BFV
//! homomorphic encryption: no party, including the Coordinator, ever
//! observes a player's role, vote, attack or heal target in the clear
//! except for what the game rules themselves entitle it to learn.

pub mod action_collector;
pub mod config;
pub mod coordinator;
pub mod crypto;
pub mod dkg;
pub mod error;
pub mod logging;
pub mod persistence;
pub mod phase_engine;
pub mod role_assignment;
pub mod roles;
pub mod rpc;
pub mod session;
pub mod threshold_decrypt;
pub mod vector;
