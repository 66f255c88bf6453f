//! The MuSig2 protocol handler (component G): ingress runs every inbound
//! envelope through the security validator before it ever touches session
//! state; egress turns session-store transitions into envelopes broadcast
//! over a `Transport`.

use crate::messages::{
    MusigMessage, NonceCommitment, NonceShare, PartialSigShare, PublicNonceWire, SessionAbort,
    SessionComplete as SessionCompleteMsg, SessionJoin, SessionJoinAck,
};
use bitcoin::secp256k1::SecretKey;
use lotus_capabilities::{PeerId, Transport};
use lotus_primitives::{
    envelope::now_millis, error::CoreError, MessageEnvelope, PublicKeyBytes, MUSIG2_PROTOCOL_ID,
};
use lotus_security::{InboundMessage, SecurityValidator};
use lotus_session::{ContributionOutcome, SessionPhase, SessionStore};
use std::sync::Arc;

/// Parses a hex-encoded fixed-width field, mapping any failure to
/// `INVALID_PAYLOAD` rather than panicking on malformed wire input.
fn hex_array<const N: usize>(field: &str, value: &str) -> Result<[u8; N], CoreError> {
    let bytes = hex::decode(value)
        .map_err(|e| CoreError::InvalidPayload(format!("{field}: bad hex: {e}")))?;
    if bytes.len() != N {
        return Err(CoreError::InvalidPayload(format!(
            "{field}: expected {N} bytes, got {}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

fn decode_pubnonce(wire: &PublicNonceWire) -> Result<[u8; 66], CoreError> {
    let r1 = hex_array::<33>("publicNonce.r1", &wire.r1)?;
    let r2 = hex_array::<33>("publicNonce.r2", &wire.r2)?;
    let mut out = [0u8; 66];
    out[..33].copy_from_slice(&r1);
    out[33..].copy_from_slice(&r2);
    Ok(out)
}

fn encode_pubnonce(bytes: &[u8; 66]) -> PublicNonceWire {
    PublicNonceWire {
        r1: hex::encode(&bytes[..33]),
        r2: hex::encode(&bytes[33..]),
    }
}

/// Wires the `SessionStore` to a `Transport` and a `SecurityValidator`.
/// One instance per node; cheap to clone the `Arc`s it holds internally.
pub struct MusigProtocolHandler {
    sessions: Arc<SessionStore>,
    security: Arc<SecurityValidator>,
    transport: Arc<dyn Transport>,
}

impl MusigProtocolHandler {
    pub fn new(
        sessions: Arc<SessionStore>,
        security: Arc<SecurityValidator>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            sessions,
            security,
            transport,
        }
    }

    /// Entry point for every inbound envelope on the MuSig2 protocol.
    /// Ingress failures (security rejection, unparseable payload) are
    /// absorbed here: logged, dropped, nothing sent back to `from`.
    pub async fn handle_inbound(&self, from: &PeerId, envelope: MessageEnvelope) {
        let payload_bytes = match serde_json::to_vec(&envelope.payload) {
            Ok(b) => b,
            Err(e) => {
                log::warn!("protocol: envelope from {from} has unserializable payload: {e}");
                return;
            }
        };

        let message: MusigMessage = match serde_json::from_value(envelope.payload.clone()) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("protocol: unknown/malformed musig2 message from {from}: {e}");
                return;
            }
        };

        let inbound = InboundMessage {
            peer: from,
            message_type: message.type_tag(),
            session_id: message.session_id(),
            payload: &payload_bytes,
            timestamp_ms: envelope.timestamp,
        };
        if let Err(reason) = self.security.validate(&inbound) {
            log::warn!(
                "protocol: rejected {} from {from}: {:?}",
                message.type_tag(),
                reason
            );
            return;
        }

        if let Err(e) = self.dispatch(from, message).await {
            log::warn!("protocol: error handling message from {from}: {e}");
        }
    }

    async fn dispatch(&self, from: &PeerId, message: MusigMessage) -> Result<(), CoreError> {
        match message {
            MusigMessage::SessionJoin(join) => self.on_session_join(from, join).await,
            MusigMessage::SessionJoinAck(_) => Ok(()),
            MusigMessage::NonceCommitment(c) => self.on_nonce_commitment(c),
            MusigMessage::NonceShare(share) => self.on_nonce_share(share).await,
            MusigMessage::PartialSigShare(share) => self.on_partial_sig_share(share).await,
            MusigMessage::SessionAbort(abort) => {
                self.sessions.abort(&abort.session_id, &abort.reason)
            }
            MusigMessage::SessionComplete(_) => Ok(()),
        }
    }

    async fn on_session_join(&self, from: &PeerId, join: SessionJoin) -> Result<(), CoreError> {
        let accepted = self.sessions.phase(&join.session_id).is_ok();
        let ack = MusigMessage::SessionJoinAck(SessionJoinAck {
            session_id: join.session_id,
            accepted,
            timestamp: now_millis(),
        });
        self.send_to(from, &ack).await
    }

    fn on_nonce_commitment(&self, c: NonceCommitment) -> Result<(), CoreError> {
        let commitment = hex_array::<32>("commitment", &c.commitment)?;
        self.sessions
            .record_nonce_commitment(&c.session_id, c.signer_index, commitment)
    }

    async fn on_nonce_share(&self, share: NonceShare) -> Result<(), CoreError> {
        let pubnonce = decode_pubnonce(&share.public_nonce)?;
        let outcome =
            self.sessions
                .record_public_nonce(&share.session_id, share.signer_index, pubnonce)?;
        if outcome == ContributionOutcome::PhaseComplete {
            self.broadcast_nonce_share(&share.session_id, share.signer_index, pubnonce)
                .await?;
        }
        Ok(())
    }

    async fn on_partial_sig_share(&self, share: PartialSigShare) -> Result<(), CoreError> {
        let sig = hex_array::<32>("partialSig", &share.partial_sig)?;
        let outcome =
            self.sessions
                .record_partial_sig(&share.session_id, share.signer_index, sig)?;
        if outcome == ContributionOutcome::PhaseComplete {
            if let Some(final_sig) = self.sessions.final_signature(&share.session_id)? {
                self.broadcast_session_complete(&share.session_id, &final_sig)
                    .await?;
            }
        }
        Ok(())
    }

    /// Create (or idempotently fetch) a session in the local store. Every
    /// node derives the same session id from the same signer set and
    /// message, independent of who calls `create` first.
    pub fn create_session(
        &self,
        signers: Vec<PublicKeyBytes>,
        message: [u8; 32],
        local_signer_index: Option<usize>,
    ) -> Result<String, CoreError> {
        self.sessions.create(signers, message, local_signer_index)
    }

    pub fn phase(&self, session_id: &str) -> Result<SessionPhase, CoreError> {
        self.sessions.phase(session_id)
    }

    pub fn final_signature(&self, session_id: &str) -> Result<Option<[u8; 64]>, CoreError> {
        self.sessions.final_signature(session_id)
    }

    /// Start round 1 locally and broadcast the resulting nonce share.
    pub async fn start_round1(
        &self,
        session_id: &str,
        signer_index: usize,
        seckey: &SecretKey,
    ) -> Result<(), CoreError> {
        let pubnonce = self.sessions.start_round1(session_id, seckey)?;
        self.broadcast_nonce_share(session_id, signer_index, pubnonce)
            .await
    }

    /// Compute and broadcast this node's partial signature for a session
    /// that has reached `PARTIAL_SIG_EXCHANGE`.
    pub async fn broadcast_local_partial_sig(
        &self,
        session_id: &str,
        signer_index: usize,
        seckey: &SecretKey,
    ) -> Result<(), CoreError> {
        let sig = self.sessions.compute_local_partial_sig(session_id, seckey)?;
        let message = MusigMessage::PartialSigShare(PartialSigShare {
            session_id: session_id.to_string(),
            signer_index,
            partial_sig: hex::encode(sig),
        });
        self.publish(&message).await
    }

    async fn broadcast_nonce_share(
        &self,
        session_id: &str,
        signer_index: usize,
        pubnonce: [u8; 66],
    ) -> Result<(), CoreError> {
        let message = MusigMessage::NonceShare(NonceShare {
            session_id: session_id.to_string(),
            signer_index,
            public_nonce: encode_pubnonce(&pubnonce),
        });
        self.publish(&message).await
    }

    async fn broadcast_session_complete(
        &self,
        session_id: &str,
        signature: &[u8; 64],
    ) -> Result<(), CoreError> {
        let message = MusigMessage::SessionComplete(SessionCompleteMsg {
            session_id: session_id.to_string(),
            signature: hex::encode(signature),
            timestamp: now_millis(),
        });
        self.publish(&message).await
    }

    pub async fn abort_session(&self, session_id: &str, reason: &str) -> Result<(), CoreError> {
        self.sessions.abort(session_id, reason)?;
        let message = MusigMessage::SessionAbort(SessionAbort {
            session_id: session_id.to_string(),
            reason: reason.to_string(),
            timestamp: now_millis(),
        });
        self.publish(&message).await
    }

    async fn publish(&self, message: &MusigMessage) -> Result<(), CoreError> {
        let envelope = to_envelope(message)?;
        self.transport.publish(MUSIG2_PROTOCOL_ID, envelope).await
    }

    async fn send_to(&self, peer: &PeerId, message: &MusigMessage) -> Result<(), CoreError> {
        let envelope = to_envelope(message)?;
        self.transport.send(peer, envelope).await
    }
}

fn to_envelope(message: &MusigMessage) -> Result<MessageEnvelope, CoreError> {
    let payload = serde_json::to_value(message)
        .map_err(|e| CoreError::Internal(format!("failed to encode outgoing message: {e}")))?;
    Ok(MessageEnvelope::new(
        MUSIG2_PROTOCOL_ID,
        message.type_tag(),
        payload,
    ))
}

/// Convert the local party's compressed public key into the hex field
/// `SESSION_JOIN` carries on the wire.
pub fn encode_public_key(pk: &PublicKeyBytes) -> String {
    hex::encode(pk.0)
}
