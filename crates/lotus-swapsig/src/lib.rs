//! SwapSig: a privacy-preserving coin-swap built on top of MuSig2
//! (components H, I, J). A pool of equal-denomination participants
//! commits destinations, broadcasts setup transactions with a
//! Sybil-defense burn output, reveals destinations, and settles through
//! parallel per-group MuSig2 sessions into a deterministically permuted
//! payout.

pub mod burn;
pub mod grouping;
pub mod permutation;
pub mod pool;

pub use burn::{burn_amount, burn_output, BurnConfig};
pub use grouping::{form_groups, group_size_for};
pub use permutation::{apply_permutation, derive_permutation};
pub use pool::{
    verify_ownership_proof, InputRef, OutputGroup, Participant, PoolConfig, PoolPhase, PoolStore,
    SwapPool,
};
