use thiserror::Error;

/// The full error taxonomy for the MuSig2/SwapSig core.
///
/// Ingress-side validation/security failures are absorbed by the caller
/// (logged, dropped) rather than matched on by kind; this enum exists so
/// that every place in the core that *can* fail says precisely how.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("rate limited: peer {peer} type {message_type}")]
    RateLimited { peer: String, message_type: String },

    #[error("replay detected")]
    ReplayDetected,

    #[error("timestamp skewed by {skew_ms}ms (max {max_ms}ms)")]
    TimestampSkewed { skew_ms: i64, max_ms: i64 },

    #[error("unknown session: {0}")]
    UnknownSession(String),

    #[error("wrong phase: expected one of {expected:?}, got {actual}")]
    WrongPhase { expected: Vec<String>, actual: String },

    #[error("duplicate contribution from signer {0}")]
    DuplicateContribution(usize),

    #[error("conflicting contribution from signer {0}")]
    ConflictingContribution(usize),

    #[error("invalid partial signature from signer {0}")]
    InvalidPartialSig(usize),

    #[error("invalid ownership proof")]
    InvalidOwnershipProof,

    #[error("commitment broken for participant {0}")]
    CommitmentBroken(usize),

    #[error("amount mismatch: expected {expected}, got {actual}")]
    AmountMismatch { expected: u64, actual: u64 },

    #[error("chain unavailable: {0}")]
    ChainUnavailable(String),

    #[error("timeout")]
    Timeout,

    #[error("aborted by peer: {0}")]
    AbortedByPeer(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
