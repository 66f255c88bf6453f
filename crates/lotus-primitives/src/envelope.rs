//! Glue: the wire message envelope shared by both protocols, the
//! timestamp source, and random id generation (component L).

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MUSIG2_PROTOCOL_ID: &str = "/lotus/musig2/1.0.0";
pub const SWAPSIG_PROTOCOL_ID: &str = "/lotus/swapsig/1.0.0";

/// The envelope every inbound/outbound protocol message is wrapped in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub protocol: String,
    #[serde(rename = "type")]
    pub message_type: String,
    pub payload: serde_json::Value,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl MessageEnvelope {
    pub fn new(protocol: &str, message_type: &str, payload: serde_json::Value) -> Self {
        Self {
            protocol: protocol.to_string(),
            message_type: message_type.to_string(),
            payload,
            timestamp: now_millis(),
            signature: None,
        }
    }
}

/// Monotonic-enough wall-clock source, in milliseconds since the epoch.
///
/// Isolated behind a function so session/pool tests can fake a clock if a
/// future deployment needs to; today it is a thin wrapper over
/// `SystemTime::now()`.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before the epoch")
        .as_millis() as i64
}

/// A random 32-byte identifier (pool ids, blinding factors).
pub fn random_id32() -> [u8; 32] {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}
