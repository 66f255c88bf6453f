//! Serialization primitives, the error taxonomy, and message-envelope glue
//! shared by the MuSig2 and SwapSig crates.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod hash;

pub use codec::{PublicKeyBytes, PublicNonceBytes, ScalarBytes, SignatureBytes};
pub use envelope::{now_millis, random_id32, MessageEnvelope, MUSIG2_PROTOCOL_ID, SWAPSIG_PROTOCOL_ID};
pub use error::{CoreError, CoreResult};
