//! MuSig2 protocol wiring: message schemas (§6.3/§6.4) and the ingress/
//! egress handler that sits between `Transport` and `lotus-session`.

pub mod handler;
pub mod messages;

pub use handler::MusigProtocolHandler;
pub use messages::{MusigMessage, SwapsigMessageKind};
