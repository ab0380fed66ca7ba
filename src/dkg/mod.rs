//! Three-round distributed key generation (§4.D).
//!
//! `setup → r1_pending → r2_pending → r3_pending → ready`. Any party may
//! abort with [`crate::error::DkgError`] on timeout; abort is fatal — the
//! session is unrecoverable, matching §4.D's "no resharing" rule. A peer's
//! position in that progression is never tracked by an explicit state enum:
//! it falls out of which of `PeerAgentState`'s `ctx`/`sk`/`backend`/
//! `relin_round_one` fields have gone from `None` to `Some`.

pub mod protocol;

pub use protocol::DkgEngine;
