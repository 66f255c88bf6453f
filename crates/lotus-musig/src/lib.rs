//! MuSig2 (BIP-327) aggregation arithmetic and deterministic coordinator
//! election — components C and D.

pub mod aggregate;
pub mod election;
pub mod error;

pub use aggregate::*;
pub use election::{elect_coordinator, failover_chain, verify_election, ElectionMethod, ElectionResult};
pub use error::MusigError;
