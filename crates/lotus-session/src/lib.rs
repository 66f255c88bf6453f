//! The MuSig2 session store and state machine (§4.2). Sessions are owned
//! by a `SessionStore` keyed by session id; contributions are indexed by
//! signer index rather than arrival order so the state machine tolerates
//! out-of-order delivery.

use bitcoin::secp256k1::{PublicKey as BtcPublicKey, SecretKey};
use lotus_events::{Event, EventBus, EventKind};
use lotus_musig::{
    aggregate_nonces, aggregate_signatures, generate_nonce, key_agg, partial_sig_from_bytes,
    partial_sig_to_bytes, partial_sign, pubnonce_from_bytes, pubnonce_to_bytes,
    verify_aggregated_signature, verify_partial_signature,
};
use lotus_primitives::{envelope::now_millis, hash::sha256, CoreError, PublicKeyBytes};
use musig2::{AggNonce, PartialSignature, PubNonce, SecNonce};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Created,
    NonceExchange,
    PartialSigExchange,
    Complete,
    Aborted,
    TimedOut,
}

impl SessionPhase {
    fn name(&self) -> &'static str {
        match self {
            SessionPhase::Created => "CREATED",
            SessionPhase::NonceExchange => "NONCE_EXCHANGE",
            SessionPhase::PartialSigExchange => "PARTIAL_SIG_EXCHANGE",
            SessionPhase::Complete => "COMPLETE",
            SessionPhase::Aborted => "ABORTED",
            SessionPhase::TimedOut => "TIMED_OUT",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub require_nonce_commitments: bool,
    pub nonce_exchange_timeout_ms: i64,
    pub partial_sig_timeout_ms: i64,
    pub terminal_grace_ms: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_nonce_commitments: true,
            nonce_exchange_timeout_ms: 60_000,
            partial_sig_timeout_ms: 60_000,
            terminal_grace_ms: 5 * 60 * 1000,
        }
    }
}

/// `sessionId = SHA-256(sort(compressed(signers)) || message)`.
pub fn compute_session_id(sorted_signers: &[PublicKeyBytes], message: &[u8]) -> [u8; 32] {
    let mut buf = Vec::with_capacity(sorted_signers.len() * 33 + message.len());
    for s in sorted_signers {
        buf.extend_from_slice(&s.0);
    }
    buf.extend_from_slice(message);
    sha256(&buf)
}

pub fn session_id_hex(id: &[u8; 32]) -> String {
    hex::encode(id)
}

struct MusigSession {
    session_id: [u8; 32],
    signers: Vec<PublicKeyBytes>,
    local_signer_index: Option<usize>,
    message: [u8; 32],
    key_agg_ctx: musig2::KeyAggContext,
    aggregated_pubkey: PublicKeyBytes,
    config: SessionConfig,

    nonce_commitments: HashMap<usize, [u8; 32]>,
    public_nonces: HashMap<usize, PubNonce>,
    local_secnonce: Option<SecNonce>,
    aggregated_nonce: Option<AggNonce>,

    partial_sigs: HashMap<usize, PartialSignature>,
    nonces_used: bool,
    final_signature: Option<[u8; 64]>,

    phase: SessionPhase,
    abort_reason: Option<String>,
    offending_signer: Option<usize>,
    created_at: i64,
    updated_at: i64,
}

impl MusigSession {
    fn touch(&mut self) {
        self.updated_at = now_millis();
    }

    fn abort(&mut self, reason: &str) {
        if self.phase == SessionPhase::Aborted || self.phase == SessionPhase::Complete {
            return;
        }
        self.phase = SessionPhase::Aborted;
        self.abort_reason = Some(reason.to_string());
        self.touch();
    }
}

/// Outcome of recording a nonce/partial-sig contribution, for the caller
/// to decide whether to broadcast anything further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionOutcome {
    /// Recorded, session unchanged otherwise.
    Recorded,
    /// Byte-identical duplicate; no-op.
    DuplicateNoOp,
    /// This contribution completed the phase (all indices present).
    PhaseComplete,
}

pub struct SessionStore {
    sessions: Mutex<HashMap<String, Arc<Mutex<MusigSession>>>>,
    events: Arc<EventBus>,
    default_config: SessionConfig,
}

impl SessionStore {
    pub fn new(events: Arc<EventBus>, default_config: SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            events,
            default_config,
        }
    }

    /// Create a session from a signer set and message. Sorts `signers`
    /// into canonical order internally. Idempotent: creating the same
    /// (signers, message) pair twice returns the same session id without
    /// disturbing existing state.
    pub fn create(
        &self,
        mut signers: Vec<PublicKeyBytes>,
        message: [u8; 32],
        local_signer_index: Option<usize>,
    ) -> Result<String, CoreError> {
        if signers.len() < 2 {
            return Err(CoreError::ValidationFailed(
                "musig2 session needs at least 2 signers".to_string(),
            ));
        }
        let original = signers.clone();
        signers.sort();

        let local_signer_index = local_signer_index.and_then(|orig_idx| {
            original
                .get(orig_idx)
                .and_then(|pk| signers.iter().position(|s| s == pk))
        });

        let id = compute_session_id(&signers, &message);
        let id_hex = session_id_hex(&id);

        let mut store = self.sessions.lock().unwrap();
        if store.contains_key(&id_hex) {
            return Ok(id_hex);
        }

        let btc_keys: Vec<BtcPublicKey> = signers
            .iter()
            .map(|pk| {
                BtcPublicKey::from_slice(&pk.0)
                    .map_err(|e| CoreError::InvalidPayload(format!("bad signer key: {e}")))
            })
            .collect::<Result<_, _>>()?;

        let (key_agg_ctx, aggregated_pubkey) = key_agg(&btc_keys)?;

        let now = now_millis();
        let session = MusigSession {
            session_id: id,
            signers,
            local_signer_index,
            message,
            key_agg_ctx,
            aggregated_pubkey,
            config: self.default_config,
            nonce_commitments: HashMap::new(),
            public_nonces: HashMap::new(),
            local_secnonce: None,
            aggregated_nonce: None,
            partial_sigs: HashMap::new(),
            nonces_used: false,
            final_signature: None,
            phase: SessionPhase::Created,
            abort_reason: None,
            offending_signer: None,
            created_at: now,
            updated_at: now,
        };

        store.insert(id_hex.clone(), Arc::new(Mutex::new(session)));
        Ok(id_hex)
    }

    fn get(&self, session_id: &str) -> Result<Arc<Mutex<MusigSession>>, CoreError> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::UnknownSession(session_id.to_string()))
    }

    pub fn aggregated_pubkey(&self, session_id: &str) -> Result<PublicKeyBytes, CoreError> {
        let s = self.get(session_id)?;
        let s = s.lock().unwrap();
        Ok(s.aggregated_pubkey)
    }

    pub fn phase(&self, session_id: &str) -> Result<SessionPhase, CoreError> {
        let s = self.get(session_id)?;
        let s = s.lock().unwrap();
        Ok(s.phase)
    }

    pub fn final_signature(&self, session_id: &str) -> Result<Option<[u8; 64]>, CoreError> {
        let s = self.get(session_id)?;
        let s = s.lock().unwrap();
        Ok(s.final_signature)
    }

    /// Local node generates and records its own nonce, transitioning
    /// CREATED -> NONCE_EXCHANGE. Returns the public nonce to broadcast.
    pub fn start_round1(&self, session_id: &str, seckey: &SecretKey) -> Result<[u8; 66], CoreError> {
        let handle = self.get(session_id)?;
        let mut s = handle.lock().unwrap();

        if s.phase != SessionPhase::Created {
            return Err(CoreError::WrongPhase {
                expected: vec!["CREATED".to_string()],
                actual: s.phase.name().to_string(),
            });
        }
        let local_idx = s
            .local_signer_index
            .ok_or_else(|| CoreError::ValidationFailed("session has no local signer".to_string()))?;

        let (secnonce, pubnonce) = generate_nonce(seckey, &s.key_agg_ctx, &s.message)?;
        let pubnonce_bytes = pubnonce_to_bytes(&pubnonce);

        s.local_secnonce = Some(secnonce);
        s.public_nonces.insert(local_idx, pubnonce);
        s.phase = SessionPhase::NonceExchange;
        s.touch();

        Ok(pubnonce_bytes)
    }

    pub fn record_nonce_commitment(
        &self,
        session_id: &str,
        signer_index: usize,
        commitment: [u8; 32],
    ) -> Result<(), CoreError> {
        let handle = self.get(session_id)?;
        let mut s = handle.lock().unwrap();
        s.nonce_commitments.insert(signer_index, commitment);
        s.touch();
        Ok(())
    }

    /// Record a remote (or local-echoed) public nonce. Enforces the
    /// nonce-commitment mode if enabled, idempotence for duplicate bytes,
    /// and `CONFLICTING_CONTRIBUTION` for a differing value at an
    /// already-populated index.
    pub fn record_public_nonce(
        &self,
        session_id: &str,
        signer_index: usize,
        pubnonce_bytes: [u8; 66],
    ) -> Result<ContributionOutcome, CoreError> {
        let handle = self.get(session_id)?;
        let mut s = handle.lock().unwrap();

        if signer_index >= s.signers.len() {
            return Err(CoreError::InvalidPayload(format!(
                "signer index {signer_index} out of range"
            )));
        }

        if s.config.require_nonce_commitments {
            let commitment = s.nonce_commitments.get(&signer_index).copied();
            match commitment {
                Some(c) if c == sha256(&pubnonce_bytes) => {}
                _ => {
                    return Err(CoreError::ValidationFailed(format!(
                        "nonce share for signer {signer_index} without matching commitment"
                    )))
                }
            }
        }

        if let Some(existing) = s.public_nonces.get(&signer_index) {
            if pubnonce_to_bytes(existing) == pubnonce_bytes {
                return Ok(ContributionOutcome::DuplicateNoOp);
            }
            s.abort("CONFLICTING_CONTRIBUTION");
            return Err(CoreError::ConflictingContribution(signer_index));
        }

        let pubnonce = pubnonce_from_bytes(&pubnonce_bytes)?;
        s.public_nonces.insert(signer_index, pubnonce);
        s.touch();

        if s.public_nonces.len() == s.signers.len() && s.phase == SessionPhase::NonceExchange {
            let all_nonces: Vec<PubNonce> = (0..s.signers.len())
                .map(|i| s.public_nonces.get(&i).unwrap().clone())
                .collect();
            s.aggregated_nonce = Some(aggregate_nonces(&all_nonces));
            s.phase = SessionPhase::PartialSigExchange;
            s.touch();
            let session_id_hex = session_id_hex(&s.session_id);
            drop(s);
            self.events.emit(Event {
                kind: EventKind::SessionNoncesComplete,
                subject_id: session_id_hex,
                detail: String::new(),
            });
            return Ok(ContributionOutcome::PhaseComplete);
        }

        Ok(ContributionOutcome::Recorded)
    }

    /// Compute this node's own partial signature. Idempotent once the
    /// secret nonce has been consumed: a repeat call for the same message
    /// returns the cached partial signature rather than re-signing.
    pub fn compute_local_partial_sig(
        &self,
        session_id: &str,
        seckey: &SecretKey,
    ) -> Result<[u8; 32], CoreError> {
        let handle = self.get(session_id)?;
        let mut s = handle.lock().unwrap();

        let local_idx = s
            .local_signer_index
            .ok_or_else(|| CoreError::ValidationFailed("session has no local signer".to_string()))?;

        if let Some(existing) = s.partial_sigs.get(&local_idx) {
            if s.nonces_used {
                return Ok(partial_sig_to_bytes(existing));
            }
        }

        if s.phase != SessionPhase::PartialSigExchange {
            return Err(CoreError::WrongPhase {
                expected: vec!["PARTIAL_SIG_EXCHANGE".to_string()],
                actual: s.phase.name().to_string(),
            });
        }

        let secnonce = s
            .local_secnonce
            .take()
            .ok_or_else(|| CoreError::Internal("secret nonce already consumed".to_string()))?;
        let agg_nonce = s
            .aggregated_nonce
            .clone()
            .ok_or_else(|| CoreError::Internal("aggregated nonce missing".to_string()))?;
        let message = s.message;

        let partial = partial_sign(seckey, secnonce, &s.key_agg_ctx, &agg_nonce, &message)?;
        s.nonces_used = true;
        let bytes = partial_sig_to_bytes(&partial);
        s.partial_sigs.insert(local_idx, partial);
        s.touch();

        Ok(bytes)
    }

    /// Record and verify a peer's partial signature. An invalid signature
    /// aborts the session and records the offending index.
    pub fn record_partial_sig(
        &self,
        session_id: &str,
        signer_index: usize,
        sig_bytes: [u8; 32],
    ) -> Result<ContributionOutcome, CoreError> {
        let handle = self.get(session_id)?;
        let mut s = handle.lock().unwrap();

        if signer_index >= s.signers.len() {
            return Err(CoreError::InvalidPayload(format!(
                "signer index {signer_index} out of range"
            )));
        }

        if let Some(existing) = s.partial_sigs.get(&signer_index) {
            if partial_sig_to_bytes(existing) == sig_bytes {
                return Ok(ContributionOutcome::DuplicateNoOp);
            }
            s.abort("CONFLICTING_CONTRIBUTION");
            return Err(CoreError::ConflictingContribution(signer_index));
        }

        let agg_nonce = s
            .aggregated_nonce
            .clone()
            .ok_or_else(|| CoreError::WrongPhase {
                expected: vec!["PARTIAL_SIG_EXCHANGE".to_string()],
                actual: s.phase.name().to_string(),
            })?;
        let signer_pubkey = BtcPublicKey::from_slice(&s.signers[signer_index].0)
            .map_err(|e| CoreError::InvalidPayload(format!("bad signer key: {e}")))?;
        let signer_pubnonce = s
            .public_nonces
            .get(&signer_index)
            .cloned()
            .ok_or_else(|| CoreError::ValidationFailed("no public nonce on file".to_string()))?;
        let partial = partial_sig_from_bytes(&sig_bytes)?;
        let message = s.message;

        let valid = verify_partial_signature(
            &s.key_agg_ctx,
            &partial,
            &agg_nonce,
            &signer_pubkey,
            &signer_pubnonce,
            &message,
        );
        if !valid {
            s.offending_signer = Some(signer_index);
            s.abort("INVALID_PARTIAL_SIG");
            let id_hex = session_id_hex(&s.session_id);
            drop(s);
            self.events.emit(Event {
                kind: EventKind::SessionAborted,
                subject_id: id_hex,
                detail: format!("INVALID_PARTIAL_SIG signer={signer_index}"),
            });
            return Err(CoreError::InvalidPartialSig(signer_index));
        }

        s.partial_sigs.insert(signer_index, partial);
        s.touch();

        if s.partial_sigs.len() == s.signers.len() {
            let all_sigs: Vec<PartialSignature> = (0..s.signers.len())
                .map(|i| *s.partial_sigs.get(&i).unwrap())
                .collect();
            let final_sig = aggregate_signatures(&s.key_agg_ctx, &agg_nonce, &all_sigs, &message)?;
            if !verify_aggregated_signature(&s.aggregated_pubkey, &final_sig, &message) {
                s.abort("INTERNAL");
                return Err(CoreError::Internal(
                    "aggregated signature failed verification".to_string(),
                ));
            }
            s.final_signature = Some(final_sig);
            s.phase = SessionPhase::Complete;
            s.touch();
            let id_hex = session_id_hex(&s.session_id);
            drop(s);
            self.events.emit(Event {
                kind: EventKind::SessionComplete,
                subject_id: id_hex,
                detail: String::new(),
            });
            return Ok(ContributionOutcome::PhaseComplete);
        }

        Ok(ContributionOutcome::Recorded)
    }

    /// Final and idempotent: aborting an already-terminal session is a
    /// no-op.
    pub fn abort(&self, session_id: &str, reason: &str) -> Result<(), CoreError> {
        let handle = self.get(session_id)?;
        let mut s = handle.lock().unwrap();
        s.abort(reason);
        let id_hex = session_id_hex(&s.session_id);
        let detail = reason.to_string();
        drop(s);
        self.events.emit(Event {
            kind: EventKind::SessionAborted,
            subject_id: id_hex,
            detail,
        });
        Ok(())
    }

    pub fn abort_reason(&self, session_id: &str) -> Result<Option<String>, CoreError> {
        let s = self.get(session_id)?;
        let s = s.lock().unwrap();
        Ok(s.abort_reason.clone())
    }

    pub fn offending_signer(&self, session_id: &str) -> Result<Option<usize>, CoreError> {
        let s = self.get(session_id)?;
        let s = s.lock().unwrap();
        Ok(s.offending_signer)
    }

    /// Mark any session past its phase deadline as TIMED_OUT.
    pub fn sweep_timeouts(&self) {
        let now = now_millis();
        for handle in self.sessions.lock().unwrap().values() {
            let mut s = handle.lock().unwrap();
            let deadline = match s.phase {
                SessionPhase::Created | SessionPhase::NonceExchange => {
                    s.created_at + s.config.nonce_exchange_timeout_ms
                }
                SessionPhase::PartialSigExchange => s.created_at + s.config.partial_sig_timeout_ms,
                _ => continue,
            };
            if now > deadline {
                s.phase = SessionPhase::TimedOut;
                s.abort_reason = Some("TIMEOUT".to_string());
                s.touch();
            }
        }
    }

    /// Garbage-collect sessions that have been terminal for longer than
    /// the configured grace window.
    pub fn gc(&self) {
        let now = now_millis();
        let mut store = self.sessions.lock().unwrap();
        store.retain(|_, handle| {
            let s = handle.lock().unwrap();
            let terminal = matches!(
                s.phase,
                SessionPhase::Complete | SessionPhase::Aborted | SessionPhase::TimedOut
            );
            !terminal || now - s.updated_at < s.config.terminal_grace_ms
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::secp256k1::Secp256k1;

    fn keypair(seed: u8) -> (SecretKey, PublicKeyBytes) {
        let secp = Secp256k1::new();
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        bytes[31] = seed;
        let sk = SecretKey::from_slice(&bytes).unwrap();
        let pk = sk.public_key(&secp);
        (sk, PublicKeyBytes(pk.serialize()))
    }

    fn store() -> SessionStore {
        SessionStore::new(Arc::new(EventBus::new()), SessionConfig {
            require_nonce_commitments: false,
            ..SessionConfig::default()
        })
    }

    #[test]
    fn session_id_is_pure_function_of_sorted_keys_and_message() {
        let (_, pk_a) = keypair(1);
        let (_, pk_b) = keypair(2);
        let message = b"Test transaction to sign with MuSig2";

        let mut sorted = vec![pk_a, pk_b];
        sorted.sort();
        let id1 = compute_session_id(&sorted, message);

        let mut reordered = vec![pk_b, pk_a];
        reordered.sort();
        let id2 = compute_session_id(&reordered, message);

        assert_eq!(id1, id2);
        assert_eq!(session_id_hex(&id1).len(), 64);
    }

    /// Each party in a real deployment runs its own node with its own
    /// `SessionStore`; they rendezvous on the same session id and forward
    /// each other's wire contributions. Build one store per party here so
    /// `start_round1`'s single `local_signer_index` per session holds.
    struct Party {
        store: SessionStore,
        sk: SecretKey,
        local_idx: usize,
    }

    fn spawn_parties(
        pubkeys: &[PublicKeyBytes],
        message: [u8; 32],
        sks: &[SecretKey],
        config: SessionConfig,
    ) -> (Vec<Party>, String) {
        let mut sorted = pubkeys.to_vec();
        sorted.sort();

        let mut parties = Vec::new();
        let mut session_id = String::new();
        for (orig_idx, sk) in sks.iter().enumerate() {
            let store = SessionStore::new(Arc::new(EventBus::new()), config);
            let id = store.create(pubkeys.to_vec(), message, Some(orig_idx)).unwrap();
            session_id = id;
            let local_idx = sorted.iter().position(|k| *k == pubkeys[orig_idx]).unwrap();
            parties.push(Party {
                store,
                sk: *sk,
                local_idx,
            });
        }
        (parties, session_id)
    }

    #[test]
    fn two_of_two_session_completes() {
        let (sk_a, pk_a) = keypair(1);
        let (sk_b, pk_b) = keypair(2);
        let message = sha256(b"hello world");

        let (parties, id) = spawn_parties(
            &[pk_a, pk_b],
            message,
            &[sk_a, sk_b],
            SessionConfig {
                require_nonce_commitments: false,
                ..SessionConfig::default()
            },
        );

        let nonces: Vec<_> = parties
            .iter()
            .map(|p| (p.local_idx, p.store.start_round1(&id, &p.sk).unwrap()))
            .collect();

        for p in &parties {
            for (idx, nonce) in &nonces {
                p.store.record_public_nonce(&id, *idx, *nonce).unwrap();
            }
            assert_eq!(p.store.phase(&id).unwrap(), SessionPhase::PartialSigExchange);
        }

        let sigs: Vec<_> = parties
            .iter()
            .map(|p| (p.local_idx, p.store.compute_local_partial_sig(&id, &p.sk).unwrap()))
            .collect();

        for p in &parties {
            for (idx, sig) in &sigs {
                p.store.record_partial_sig(&id, *idx, *sig).unwrap();
            }
            assert_eq!(p.store.phase(&id).unwrap(), SessionPhase::Complete);
            assert!(p.store.final_signature(&id).unwrap().is_some());
        }
    }

    #[test]
    fn three_of_three_session_completes() {
        let parties_keys: Vec<_> = [1u8, 2, 3].iter().map(|b| keypair(*b)).collect();
        let pubkeys: Vec<_> = parties_keys.iter().map(|(_, pk)| *pk).collect();
        let sks: Vec<_> = parties_keys.iter().map(|(sk, _)| *sk).collect();
        let message = sha256(b"three party tx");

        let (parties, id) = spawn_parties(
            &pubkeys,
            message,
            &sks,
            SessionConfig {
                require_nonce_commitments: false,
                ..SessionConfig::default()
            },
        );

        let nonces: Vec<_> = parties
            .iter()
            .map(|p| (p.local_idx, p.store.start_round1(&id, &p.sk).unwrap()))
            .collect();
        for p in &parties {
            for (idx, nonce) in &nonces {
                p.store.record_public_nonce(&id, *idx, *nonce).unwrap();
            }
        }

        let sigs: Vec<_> = parties
            .iter()
            .map(|p| (p.local_idx, p.store.compute_local_partial_sig(&id, &p.sk).unwrap()))
            .collect();
        for p in &parties {
            for (idx, sig) in &sigs {
                p.store.record_partial_sig(&id, *idx, *sig).unwrap();
            }
            assert_eq!(p.store.phase(&id).unwrap(), SessionPhase::Complete);
        }
    }

    #[test]
    fn invalid_partial_sig_aborts_with_offender_recorded() {
        let (sk_a, pk_a) = keypair(1);
        let (sk_b, pk_b) = keypair(2);
        let message = sha256(b"bad sig test");

        let (parties, id) = spawn_parties(
            &[pk_a, pk_b],
            message,
            &[sk_a, sk_b],
            SessionConfig {
                require_nonce_commitments: false,
                ..SessionConfig::default()
            },
        );
        let nonces: Vec<_> = parties
            .iter()
            .map(|p| (p.local_idx, p.store.start_round1(&id, &p.sk).unwrap()))
            .collect();
        for p in &parties {
            for (idx, nonce) in &nonces {
                p.store.record_public_nonce(&id, *idx, *nonce).unwrap();
            }
        }

        let offender = &parties[0];
        let mut bad_sig = offender.store.compute_local_partial_sig(&id, &offender.sk).unwrap();
        bad_sig[0] ^= 0xFF;
        bad_sig[31] ^= 0x01;

        let victim = &parties[1];
        let err = victim.store.record_partial_sig(&id, offender.local_idx, bad_sig);
        assert!(err.is_err());
        assert_eq!(victim.store.phase(&id).unwrap(), SessionPhase::Aborted);
        assert_eq!(victim.store.offending_signer(&id).unwrap(), Some(offender.local_idx));
    }

    #[test]
    fn conflicting_nonce_contribution_aborts() {
        let (sk_a, pk_a) = keypair(1);
        let (sk_b, pk_b) = keypair(2);
        let message = sha256(b"conflict test");

        let (parties, id) = spawn_parties(
            &[pk_a, pk_b],
            message,
            &[sk_a, sk_b],
            SessionConfig {
                require_nonce_commitments: false,
                ..SessionConfig::default()
            },
        );

        let sender = &parties[0];
        let nonce = sender.store.start_round1(&id, &sender.sk).unwrap();

        let receiver = &parties[1];
        receiver.store.record_public_nonce(&id, sender.local_idx, nonce).unwrap();

        let mut different_nonce = nonce;
        different_nonce[0] ^= 0x01;
        different_nonce[1] ^= 0x01;

        let result = receiver.store.record_public_nonce(&id, sender.local_idx, different_nonce);
        assert!(matches!(result, Err(CoreError::ConflictingContribution(_))));
        assert_eq!(receiver.store.phase(&id).unwrap(), SessionPhase::Aborted);
    }

    #[test]
    fn abort_is_idempotent() {
        let s = store();
        let (_, pk_a) = keypair(1);
        let (_, pk_b) = keypair(2);
        let id = s.create(vec![pk_a, pk_b], sha256(b"m"), None).unwrap();

        s.abort(&id, "ABORTED_BY_PEER").unwrap();
        s.abort(&id, "ANOTHER_REASON").unwrap();
        assert_eq!(s.abort_reason(&id).unwrap(), Some("ABORTED_BY_PEER".to_string()));
    }

    #[test]
    fn nonce_commitment_mode_rejects_share_without_commitment() {
        let (sk_a, pk_a) = keypair(1);
        let (_, pk_b) = keypair(2);
        let message = sha256(b"m");

        let (parties, id) = spawn_parties(
            &[pk_a, pk_b],
            message,
            &[sk_a, SecretKey::from_slice(&[0x01; 32]).unwrap()],
            SessionConfig::default(),
        );

        let sender = &parties[0];
        let nonce = sender.store.start_round1(&id, &sender.sk).unwrap();

        let receiver = &parties[1];
        let result = receiver.store.record_public_nonce(&id, sender.local_idx, nonce);
        assert!(result.is_err());

        receiver
            .store
            .record_nonce_commitment(&id, sender.local_idx, sha256(&nonce))
            .unwrap();
        assert!(receiver.store.record_public_nonce(&id, sender.local_idx, nonce).is_ok());
    }

    #[test]
    fn gc_removes_terminal_sessions_past_grace_window() {
        let s = SessionStore::new(
            Arc::new(EventBus::new()),
            SessionConfig {
                terminal_grace_ms: -1,
                ..SessionConfig::default()
            },
        );
        let (_, pk_a) = keypair(1);
        let (_, pk_b) = keypair(2);
        let id = s.create(vec![pk_a, pk_b], sha256(b"m"), None).unwrap();
        s.abort(&id, "ABORTED_BY_PEER").unwrap();
        s.gc();
        assert!(matches!(s.phase(&id), Err(CoreError::UnknownSession(_))));
    }
}
