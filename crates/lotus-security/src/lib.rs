//! The security validator (§4.4): the gate every inbound protocol message
//! passes through before it reaches session/pool state. A rejection is
//! logged and surfaced on the `security:rejected` observer channel —
//! never echoed back to the source peer, to avoid giving an attacker an
//! oracle into which check failed.

mod rate_limit;
mod replay;

pub use rate_limit::RateLimiterConfig;
pub use replay::ReplayCacheConfig;

use lotus_primitives::{envelope::now_millis, hash::sha256};
use rate_limit::RateLimiter;
use replay::ReplayCache;
use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    PeerBlocked,
    RateLimited,
    TimestampSkewed,
    Replayed,
    PayloadTooLarge,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::PeerBlocked => "PEER_BLOCKED",
            RejectionReason::RateLimited => "RATE_LIMITED",
            RejectionReason::TimestampSkewed => "TIMESTAMP_SKEWED",
            RejectionReason::Replayed => "REPLAY_DETECTED",
            RejectionReason::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SecurityConfig {
    pub rate_limit: RateLimiterConfig,
    pub max_clock_skew_ms: i64,
    pub replay: ReplayCacheConfig,
    pub max_payload_bytes: usize,
    /// Tests that don't want rate-limiting noise can disable it outright.
    pub rate_limit_enabled: bool,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rate_limit: RateLimiterConfig::default(),
            max_clock_skew_ms: 30_000,
            replay: ReplayCacheConfig::default(),
            max_payload_bytes: 64 * 1024,
            rate_limit_enabled: true,
        }
    }
}

/// A message's session id, type, and raw payload bytes — the minimal
/// shape the validator needs, independent of the envelope's full schema.
pub struct InboundMessage<'a> {
    pub peer: &'a str,
    pub message_type: &'a str,
    pub session_id: &'a str,
    pub payload: &'a [u8],
    pub timestamp_ms: i64,
}

/// Process-wide: the replay cache and rate limiter are shared across every
/// session and pool, as §5 requires. Safe under concurrent mutation via
/// interior `Mutex`es.
pub struct SecurityValidator {
    config: SecurityConfig,
    blocklist: Mutex<HashSet<String>>,
    rate_limiter: Mutex<RateLimiter>,
    replay_cache: Mutex<ReplayCache>,
}

impl SecurityValidator {
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            rate_limiter: Mutex::new(RateLimiter::new(config.rate_limit)),
            replay_cache: Mutex::new(ReplayCache::new(config.replay)),
            blocklist: Mutex::new(HashSet::new()),
            config,
        }
    }

    pub fn block_peer(&self, peer: &str) {
        self.blocklist.lock().unwrap().insert(peer.to_string());
    }

    pub fn unblock_peer(&self, peer: &str) {
        self.blocklist.lock().unwrap().remove(peer);
    }

    /// Run every check in order; returns `Ok(())` on pass or the first
    /// failing `RejectionReason`. The reason is logged locally by the
    /// caller — it must never be serialized back onto the wire.
    pub fn validate(&self, msg: &InboundMessage<'_>) -> Result<(), RejectionReason> {
        if self.blocklist.lock().unwrap().contains(msg.peer) {
            log::warn!("security: peer {} is blocklisted", msg.peer);
            return Err(RejectionReason::PeerBlocked);
        }

        if self.config.rate_limit_enabled
            && !self
                .rate_limiter
                .lock()
                .unwrap()
                .allow(msg.peer, msg.message_type)
        {
            log::warn!(
                "security: rate limit exceeded for peer {} type {}",
                msg.peer,
                msg.message_type
            );
            return Err(RejectionReason::RateLimited);
        }

        let skew = (msg.timestamp_ms - now_millis()).abs();
        if skew > self.config.max_clock_skew_ms {
            log::warn!("security: timestamp skew {}ms from peer {}", skew, msg.peer);
            return Err(RejectionReason::TimestampSkewed);
        }

        let payload_hash = sha256(msg.payload);
        let fingerprint = sha256(
            &[
                msg.session_id.as_bytes(),
                msg.message_type.as_bytes(),
                &payload_hash,
            ]
            .concat(),
        );
        if !self
            .replay_cache
            .lock()
            .unwrap()
            .observe(fingerprint, now_millis())
        {
            log::warn!("security: replay detected from peer {}", msg.peer);
            return Err(RejectionReason::Replayed);
        }

        if msg.payload.len() > self.config.max_payload_bytes {
            log::warn!(
                "security: payload of {} bytes from peer {} exceeds ceiling",
                msg.payload.len(),
                msg.peer
            );
            return Err(RejectionReason::PayloadTooLarge);
        }

        Ok(())
    }
}
