use lotus_primitives::CoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MusigError {
    #[error("key aggregation failed: {0}")]
    KeyAggregation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("need at least 2 signers, got {0}")]
    TooFewSigners(usize),
}

impl From<MusigError> for CoreError {
    fn from(e: MusigError) -> Self {
        match e {
            MusigError::Signing(_) => CoreError::Internal(e.to_string()),
            MusigError::KeyAggregation(_) | MusigError::TooFewSigners(_) => {
                CoreError::ValidationFailed(e.to_string())
            }
            MusigError::Serialization(_) => CoreError::InvalidPayload(e.to_string()),
        }
    }
}
