//! The SwapSig pool lifecycle (components H and J): registration
//! admission, group formation, commit-then-reveal destinations, and
//! per-group settlement MuSig2 sessions spawned into a `SessionStore`.
//!
//! One `SwapPool` per pool id, held behind its own lock so independent
//! pools never contend with each other; within a pool, groups settle in
//! parallel and each is its own failure domain (§4.5 SETTLEMENT).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use secp256k1::{schnorr::Signature, Message, PublicKey, Secp256k1};
use serde::{Deserialize, Serialize};

use lotus_capabilities::OutputDescriptor;
use lotus_events::{Event, EventBus, EventKind};
use lotus_musig::key_agg;
use lotus_primitives::envelope::now_millis;
use lotus_primitives::hash::{sha256, sha256_concat};
use lotus_primitives::{CoreError, PublicKeyBytes};
use lotus_session::SessionStore;

use crate::burn::{burn_amount, burn_output, BurnConfig};
use crate::grouping::form_groups;
use crate::permutation::{apply_permutation, derive_permutation};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolPhase {
    Discovery,
    Registration,
    Setup,
    Confirmation,
    Reveal,
    Permutation,
    Settlement,
    SettlementConfirmation,
    Complete,
    Aborted,
}

impl PoolPhase {
    fn name(&self) -> &'static str {
        match self {
            PoolPhase::Discovery => "DISCOVERY",
            PoolPhase::Registration => "REGISTRATION",
            PoolPhase::Setup => "SETUP",
            PoolPhase::Confirmation => "CONFIRMATION",
            PoolPhase::Reveal => "REVEAL",
            PoolPhase::Permutation => "PERMUTATION",
            PoolPhase::Settlement => "SETTLEMENT",
            PoolPhase::SettlementConfirmation => "SETTLEMENT_CONFIRMATION",
            PoolPhase::Complete => "COMPLETE",
            PoolPhase::Aborted => "ABORTED",
        }
    }
}

/// The UTXO a participant contributes as pool input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputRef {
    pub txid: String,
    pub vout: u32,
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

/// `serialize(input)` for the ownership-proof message: txid bytes, vout
/// and amount big-endian, then the script. Any caller signing or
/// verifying a proof must agree on this exact layout.
fn serialize_input(input: &InputRef) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.txid.len() + 12 + input.script_pubkey.len());
    out.extend_from_slice(input.txid.as_bytes());
    out.extend_from_slice(&input.vout.to_be_bytes());
    out.extend_from_slice(&input.amount.to_be_bytes());
    out.extend_from_slice(&input.script_pubkey);
    out
}

/// Verifies `proof` as a BIP-340 Schnorr signature over
/// `poolId ‖ serialize(input)` under `public_key`'s x-only point.
pub fn verify_ownership_proof(
    pool_id: &[u8; 32],
    input: &InputRef,
    public_key: &PublicKeyBytes,
    proof: &[u8; 64],
) -> bool {
    let secp = Secp256k1::verification_only();
    let full_pk = match PublicKey::from_slice(&public_key.0) {
        Ok(pk) => pk,
        Err(_) => return false,
    };
    let (xonly, _) = full_pk.x_only_public_key();
    let sig = match Signature::from_slice(proof) {
        Ok(s) => s,
        Err(_) => return false,
    };
    let mut preimage = Vec::with_capacity(32 + input.txid.len() + 12 + input.script_pubkey.len());
    preimage.extend_from_slice(pool_id);
    preimage.extend_from_slice(&serialize_input(input));
    let digest = sha256(&preimage);
    let msg = Message::from_digest(digest);
    secp.verify_schnorr(&sig, &msg, &xonly).is_ok()
}

#[derive(Debug, Clone)]
pub struct Participant {
    pub public_key: PublicKeyBytes,
    pub input: InputRef,
    pub final_output_commitment: [u8; 32],
    pub final_output_encrypted: Vec<u8>,
    pub final_address: Option<String>,
    pub setup_confirmed: bool,
    pub dropped: bool,
}

/// The group a participant belongs to, found by membership scan — groups
/// are few and this runs once per setup/confirm call, not per signature.
fn group_containing(pool: &SwapPool, participant_index: usize) -> Result<&OutputGroup, CoreError> {
    pool.groups
        .iter()
        .find(|g| g.members.contains(&participant_index))
        .ok_or_else(|| {
            CoreError::ValidationFailed(format!(
                "participant {participant_index} is not assigned to any group"
            ))
        })
}

/// `denomination − burnAmount − feePerParticipant` (§4.5 SETUP, §3.3
/// `sharedOutputs`). Errors if the burn and fee together exceed the
/// denomination rather than silently wrapping.
fn setup_shared_amount(pool: &SwapPool) -> Result<u64, CoreError> {
    let burn = burn_amount(pool.denomination, &pool.burn_config);
    pool.denomination
        .checked_sub(burn)
        .and_then(|v| v.checked_sub(pool.fee_per_participant))
        .ok_or_else(|| {
            CoreError::ValidationFailed(
                "burn amount and fee per participant exceed the pool denomination".to_string(),
            )
        })
}

/// The two outputs `participant_index`'s setup transaction must carry:
/// the group's shared MuSig2 output and the Sybil-defense burn.
fn setup_output_descriptors(
    pool: &SwapPool,
    participant_index: usize,
) -> Result<(OutputDescriptor, OutputDescriptor), CoreError> {
    let group = group_containing(pool, participant_index)?;
    let amount = setup_shared_amount(pool)?;
    let mut aggregated_xonly = [0u8; 32];
    aggregated_xonly.copy_from_slice(&group.aggregated_pubkey.0[1..]);
    let shared = OutputDescriptor::PayToAggregatedKey {
        aggregated_xonly,
        amount,
    };
    let burn = burn_output(&pool.pool_id, burn_amount(pool.denomination, &pool.burn_config));
    Ok((shared, burn))
}

/// §4.5 SETUP peer verification: checks that a claimed setup TX (i) uses
/// the participant's registered input, (ii) pays the group's aggregated
/// key at the correct amount, and (iii) carries the correct burn output.
fn verify_setup_tx(
    pool: &SwapPool,
    participant_index: usize,
    claimed_input: &InputRef,
    outputs: &[OutputDescriptor],
) -> Result<(), CoreError> {
    let participant = pool.participants.get(participant_index).ok_or_else(|| {
        CoreError::ValidationFailed("unknown participant index".to_string())
    })?;
    let expected_input = &participant.input;
    if claimed_input.txid != expected_input.txid
        || claimed_input.vout != expected_input.vout
        || claimed_input.amount != expected_input.amount
        || claimed_input.script_pubkey != expected_input.script_pubkey
    {
        return Err(CoreError::ValidationFailed(format!(
            "setup tx for participant {participant_index} does not spend its claimed input"
        )));
    }

    let (expected_shared, expected_burn) = setup_output_descriptors(pool, participant_index)?;
    let [shared, burn] = outputs else {
        return Err(CoreError::ValidationFailed(format!(
            "setup tx for participant {participant_index} has {} outputs, need exactly 2",
            outputs.len()
        )));
    };
    match (shared, &expected_shared) {
        (
            OutputDescriptor::PayToAggregatedKey { aggregated_xonly, amount },
            OutputDescriptor::PayToAggregatedKey {
                aggregated_xonly: expected_key,
                amount: expected_amount,
            },
        ) if aggregated_xonly == expected_key && amount == expected_amount => {}
        _ => {
            return Err(CoreError::ValidationFailed(format!(
                "setup tx for participant {participant_index} does not pay the group's aggregated key"
            )))
        }
    }
    match (burn, &expected_burn) {
        (
            OutputDescriptor::OpReturn { tag, amount },
            OutputDescriptor::OpReturn {
                tag: expected_tag,
                amount: expected_amount,
            },
        ) if tag == expected_tag && amount == expected_amount => {}
        _ => {
            return Err(CoreError::ValidationFailed(format!(
                "setup tx for participant {participant_index} carries the wrong burn output"
            )))
        }
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct OutputGroup {
    pub group_index: u32,
    /// Participant indices in this group, already in the sorted-pubkey
    /// order `key_agg`/session-id derivation requires.
    pub members: Vec<usize>,
    pub aggregated_pubkey: PublicKeyBytes,
    pub settlement_session_id: Option<String>,
    pub settlement_mapping: Option<Vec<String>>,
    pub settled: bool,
    pub aborted: bool,
}

pub struct SwapPool {
    pub pool_id: [u8; 32],
    pub denomination: u64,
    pub min_participants: usize,
    pub max_participants: usize,
    pub burn_config: BurnConfig,
    pub fee_per_participant: u64,
    pub strict_mode: bool,
    pub local_public_key: Option<PublicKeyBytes>,
    pub participants: Vec<Participant>,
    pub groups: Vec<OutputGroup>,
    pub deferred: Vec<usize>,
    pub phase: PoolPhase,
    pub abort_reason: Option<String>,
    pub created_at: i64,
}

impl SwapPool {
    fn touch_phase(&mut self, phase: PoolPhase) {
        log::info!(
            "swapsig pool {}: {} -> {}",
            hex::encode(self.pool_id),
            self.phase.name(),
            phase.name()
        );
        self.phase = phase;
    }

    fn active_count(&self) -> usize {
        self.participants.iter().filter(|p| !p.dropped).count()
    }
}

/// Configuration a pool is created with (the DISCOVERY announcement).
pub struct PoolConfig {
    pub pool_id: [u8; 32],
    pub denomination: u64,
    pub min_participants: usize,
    pub max_participants: usize,
    pub burn_config: BurnConfig,
    pub fee_per_participant: u64,
    pub strict_mode: bool,
    /// This node's own public key, if and when it is itself a participant
    /// in the pool. Lets `spawn_settlements` resolve which signer index
    /// in each group is local, so settlement sessions it belongs to are
    /// not spawned observer-only.
    pub local_public_key: Option<PublicKeyBytes>,
}

/// Owns every `SwapPool` the node is tracking and the `SessionStore` it
/// spawns per-group settlement MuSig2 sessions into.
pub struct PoolStore {
    pools: Mutex<HashMap<String, Arc<Mutex<SwapPool>>>>,
    events: Arc<EventBus>,
    sessions: Arc<SessionStore>,
}

impl PoolStore {
    pub fn new(events: Arc<EventBus>, sessions: Arc<SessionStore>) -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
            events,
            sessions,
        }
    }

    pub fn create_pool(&self, config: PoolConfig) -> Result<String, CoreError> {
        config.burn_config.validate()?;
        let id_hex = hex::encode(config.pool_id);
        let mut pools = self.pools.lock().unwrap();
        if pools.contains_key(&id_hex) {
            return Err(CoreError::ValidationFailed(format!(
                "pool {id_hex} already exists"
            )));
        }
        let pool = SwapPool {
            pool_id: config.pool_id,
            denomination: config.denomination,
            min_participants: config.min_participants,
            max_participants: config.max_participants,
            burn_config: config.burn_config,
            fee_per_participant: config.fee_per_participant,
            strict_mode: config.strict_mode,
            local_public_key: config.local_public_key,
            participants: Vec::new(),
            groups: Vec::new(),
            deferred: Vec::new(),
            phase: PoolPhase::Discovery,
            abort_reason: None,
            created_at: now_millis(),
        };
        pools.insert(id_hex.clone(), Arc::new(Mutex::new(pool)));
        Ok(id_hex)
    }

    fn get(&self, pool_id_hex: &str) -> Result<Arc<Mutex<SwapPool>>, CoreError> {
        self.pools
            .lock()
            .unwrap()
            .get(pool_id_hex)
            .cloned()
            .ok_or_else(|| CoreError::UnknownSession(pool_id_hex.to_string()))
    }

    pub fn phase(&self, pool_id_hex: &str) -> Result<PoolPhase, CoreError> {
        Ok(self.get(pool_id_hex)?.lock().unwrap().phase)
    }

    /// Admits a participant (§4.5 REGISTRATION). The pool moves from
    /// DISCOVERY to REGISTRATION on the first successful join.
    pub fn register_participant(
        &self,
        pool_id_hex: &str,
        public_key: PublicKeyBytes,
        input: InputRef,
        ownership_proof: [u8; 64],
        final_output_commitment: [u8; 32],
        final_output_encrypted: Vec<u8>,
    ) -> Result<usize, CoreError> {
        let handle = self.get(pool_id_hex)?;
        let mut pool = handle.lock().unwrap();

        if !matches!(pool.phase, PoolPhase::Discovery | PoolPhase::Registration) {
            return Err(CoreError::WrongPhase {
                expected: vec!["DISCOVERY".into(), "REGISTRATION".into()],
                actual: pool.phase.name().to_string(),
            });
        }
        if input.amount != pool.denomination {
            return Err(CoreError::AmountMismatch {
                expected: pool.denomination,
                actual: input.amount,
            });
        }
        if pool.participants.iter().any(|p| p.public_key == public_key) {
            return Err(CoreError::ValidationFailed(
                "peer already registered".to_string(),
            ));
        }
        if pool.participants.len() >= pool.max_participants {
            return Err(CoreError::ValidationFailed(
                "registration capacity exceeded".to_string(),
            ));
        }
        if !verify_ownership_proof(&pool.pool_id, &input, &public_key, &ownership_proof) {
            return Err(CoreError::InvalidOwnershipProof);
        }

        pool.participants.push(Participant {
            public_key,
            input,
            final_output_commitment,
            final_output_encrypted,
            final_address: None,
            setup_confirmed: false,
            dropped: false,
        });
        let index = pool.participants.len() - 1;

        if matches!(pool.phase, PoolPhase::Discovery) {
            pool.touch_phase(PoolPhase::Registration);
        }
        Ok(index)
    }

    /// Closes registration (§4.5 Group sizing): requires the participant
    /// count to be within `[min, max]`, forms groups by the size table,
    /// key-aggregates each group, and moves the pool to SETUP.
    pub fn close_registration(&self, pool_id_hex: &str) -> Result<(), CoreError> {
        let handle = self.get(pool_id_hex)?;
        let mut pool = handle.lock().unwrap();
        if !matches!(pool.phase, PoolPhase::Registration) {
            return Err(CoreError::WrongPhase {
                expected: vec!["REGISTRATION".into()],
                actual: pool.phase.name().to_string(),
            });
        }
        let count = pool.active_count();
        if count < pool.min_participants {
            return Err(CoreError::ValidationFailed(format!(
                "only {count} participants, need at least {}",
                pool.min_participants
            )));
        }

        let (raw_groups, deferred) = form_groups(count);
        if !deferred.is_empty() && pool.strict_mode {
            let reason = format!("{} participants cannot be grouped evenly", deferred.len());
            pool.touch_phase(PoolPhase::Aborted);
            pool.abort_reason = Some(reason.clone());
            drop(pool);
            self.emit_aborted(pool_id_hex, &reason);
            return Err(CoreError::ValidationFailed(reason));
        }

        let mut groups = Vec::with_capacity(raw_groups.len());
        for (group_index, members) in raw_groups.into_iter().enumerate() {
            let btc_keys: Vec<bitcoin::secp256k1::PublicKey> = members
                .iter()
                .map(|&i| {
                    bitcoin::secp256k1::PublicKey::from_slice(&pool.participants[i].public_key.0)
                        .map_err(|e| CoreError::Internal(format!("group member key: {e}")))
                })
                .collect::<Result<_, _>>()?;
            let (_ctx, aggregated_pubkey) = key_agg(&btc_keys)
                .map_err(|e| CoreError::Internal(format!("group key aggregation: {e}")))?;
            groups.push(OutputGroup {
                group_index: group_index as u32,
                members,
                aggregated_pubkey,
                settlement_session_id: None,
                settlement_mapping: None,
                settled: false,
                aborted: false,
            });
        }
        pool.groups = groups;
        pool.deferred = deferred;
        pool.touch_phase(PoolPhase::Setup);
        Ok(())
    }

    /// The output descriptors `participant_index`'s setup transaction
    /// must pay (§4.5 SETUP): the group's shared MuSig2 output, sized as
    /// `denomination − burnAmount − feePerParticipant`, and the burn
    /// OP_RETURN. Callers build and broadcast the setup TX from these,
    /// then every other participant confirms it via `confirm_setup`.
    pub fn setup_outputs(
        &self,
        pool_id_hex: &str,
        participant_index: usize,
    ) -> Result<(OutputDescriptor, OutputDescriptor), CoreError> {
        let handle = self.get(pool_id_hex)?;
        let pool = handle.lock().unwrap();
        setup_output_descriptors(&pool, participant_index)
    }

    /// Verifies `participant_index`'s claimed setup transaction against
    /// (i) its registered input, (ii) the group's aggregated key and
    /// amount, and (iii) the burn output, then records it as confirmed.
    /// Moves SETUP to CONFIRMATION on the first call, and on to REVEAL
    /// once every grouped (non-deferred) participant has confirmed.
    pub fn confirm_setup(
        &self,
        pool_id_hex: &str,
        participant_index: usize,
        claimed_input: &InputRef,
        outputs: &[OutputDescriptor],
    ) -> Result<(), CoreError> {
        let handle = self.get(pool_id_hex)?;
        let mut pool = handle.lock().unwrap();
        if !matches!(pool.phase, PoolPhase::Setup | PoolPhase::Confirmation) {
            return Err(CoreError::WrongPhase {
                expected: vec!["SETUP".into(), "CONFIRMATION".into()],
                actual: pool.phase.name().to_string(),
            });
        }
        verify_setup_tx(&pool, participant_index, claimed_input, outputs)?;
        if matches!(pool.phase, PoolPhase::Setup) {
            pool.touch_phase(PoolPhase::Confirmation);
        }
        let participant = pool
            .participants
            .get_mut(participant_index)
            .ok_or_else(|| CoreError::ValidationFailed("unknown participant index".to_string()))?;
        participant.setup_confirmed = true;

        let deferred = pool.deferred.clone();
        let all_grouped_confirmed = pool
            .participants
            .iter()
            .enumerate()
            .filter(|(i, p)| !p.dropped && !deferred.contains(i))
            .all(|(_, p)| p.setup_confirmed);
        if all_grouped_confirmed {
            pool.touch_phase(PoolPhase::Reveal);
        }
        Ok(())
    }

    /// Records a destination reveal (§4.5 REVEAL). A commitment mismatch
    /// aborts the whole pool: no valid permutation can be computed without
    /// every member's destination.
    pub fn reveal_destination(
        &self,
        pool_id_hex: &str,
        participant_index: usize,
        final_address: String,
        blinding: &[u8],
    ) -> Result<(), CoreError> {
        let handle = self.get(pool_id_hex)?;
        {
            let mut pool = handle.lock().unwrap();
            if !matches!(pool.phase, PoolPhase::Reveal) {
                return Err(CoreError::WrongPhase {
                    expected: vec!["REVEAL".into()],
                    actual: pool.phase.name().to_string(),
                });
            }
            let mut preimage = final_address.as_bytes().to_vec();
            preimage.extend_from_slice(blinding);
            let digest = sha256(&preimage);

            let participant = pool
                .participants
                .get_mut(participant_index)
                .ok_or_else(|| {
                    CoreError::ValidationFailed("unknown participant index".to_string())
                })?;
            if digest != participant.final_output_commitment {
                pool.touch_phase(PoolPhase::Aborted);
                pool.abort_reason = Some(format!(
                    "commitment broken for participant {participant_index}"
                ));
                drop(pool);
                self.emit_aborted(pool_id_hex, "COMMITMENT_BROKEN");
                return Err(CoreError::CommitmentBroken(participant_index));
            }
            participant.final_address = Some(final_address);

            let deferred = pool.deferred.clone();
            let all_revealed = pool
                .participants
                .iter()
                .enumerate()
                .filter(|(i, p)| !p.dropped && !deferred.contains(i))
                .all(|(_, p)| p.final_address.is_some());
            if !all_revealed {
                return Ok(());
            }
        }
        self.spawn_settlements(pool_id_hex)
    }

    /// §4.5 PERMUTATION + SETTLEMENT: derive each group's permutation,
    /// compute its settlement mapping, and spawn one MuSig2 session per
    /// group into the shared `SessionStore`.
    fn spawn_settlements(&self, pool_id_hex: &str) -> Result<(), CoreError> {
        let handle = self.get(pool_id_hex)?;
        let mut pool = handle.lock().unwrap();
        pool.touch_phase(PoolPhase::Permutation);

        let pool_id = pool.pool_id;
        let signer_keys: Vec<Vec<PublicKeyBytes>> = pool
            .groups
            .iter()
            .map(|g| g.members.iter().map(|&i| pool.participants[i].public_key).collect())
            .collect();
        let group_addresses: Vec<Vec<String>> = pool
            .groups
            .iter()
            .map(|g| {
                g.members
                    .iter()
                    .map(|&i| pool.participants[i].final_address.clone().unwrap())
                    .collect()
            })
            .collect();
        // Resolve this node's own signer index within each group, if it is
        // a member at all, so its settlement sessions aren't observer-only.
        let local_indices: Vec<Option<usize>> = pool
            .groups
            .iter()
            .map(|g| {
                pool.local_public_key.and_then(|local| {
                    g.members
                        .iter()
                        .position(|&i| pool.participants[i].public_key == local)
                })
            })
            .collect();

        for (idx, group) in pool.groups.iter_mut().enumerate() {
            let addresses = &group_addresses[idx];
            let sigma = derive_permutation(&pool_id, group.group_index, addresses);
            let mapping = apply_permutation(&sigma, addresses);

            let message = sha256_concat(&[
                &pool_id,
                &group.group_index.to_be_bytes(),
                mapping.concat().as_bytes(),
            ]);
            let session_id = self.sessions.create(
                signer_keys[idx].clone(),
                message,
                local_indices[idx],
            )?;
            group.settlement_mapping = Some(mapping);
            group.settlement_session_id = Some(session_id);
        }
        pool.touch_phase(PoolPhase::Settlement);
        Ok(())
    }

    pub fn settlement_session_id(
        &self,
        pool_id_hex: &str,
        group_index: usize,
    ) -> Result<Option<String>, CoreError> {
        let handle = self.get(pool_id_hex)?;
        let pool = handle.lock().unwrap();
        Ok(pool
            .groups
            .get(group_index)
            .and_then(|g| g.settlement_session_id.clone()))
    }

    pub fn settlement_mapping(
        &self,
        pool_id_hex: &str,
        group_index: usize,
    ) -> Result<Option<Vec<String>>, CoreError> {
        let handle = self.get(pool_id_hex)?;
        let pool = handle.lock().unwrap();
        Ok(pool
            .groups
            .get(group_index)
            .and_then(|g| g.settlement_mapping.clone()))
    }

    /// Marks one group's settlement as confirmed on-chain. A group that
    /// settles does not roll back because a sibling group later aborts
    /// (§4.5 SETTLEMENT_CONFIRMATION / COMPLETE).
    pub fn mark_group_settled(&self, pool_id_hex: &str, group_index: usize) -> Result<(), CoreError> {
        self.update_group_and_maybe_complete(pool_id_hex, group_index, true)
    }

    pub fn mark_group_aborted(
        &self,
        pool_id_hex: &str,
        group_index: usize,
        reason: &str,
    ) -> Result<(), CoreError> {
        log::warn!("swapsig pool {pool_id_hex}: group {group_index} aborted: {reason}");
        self.update_group_and_maybe_complete(pool_id_hex, group_index, false)
    }

    fn update_group_and_maybe_complete(
        &self,
        pool_id_hex: &str,
        group_index: usize,
        settled: bool,
    ) -> Result<(), CoreError> {
        let handle = self.get(pool_id_hex)?;
        let mut pool = handle.lock().unwrap();
        if matches!(pool.phase, PoolPhase::Settlement) {
            pool.touch_phase(PoolPhase::SettlementConfirmation);
        }
        {
            let group = pool.groups.get_mut(group_index).ok_or_else(|| {
                CoreError::ValidationFailed("unknown group index".to_string())
            })?;
            if settled {
                group.settled = true;
            } else {
                group.aborted = true;
            }
        }
        let all_decided = pool.groups.iter().all(|g| g.settled || g.aborted);
        if all_decided {
            pool.touch_phase(PoolPhase::Complete);
        }
        Ok(())
    }

    /// Aborts the whole pool (creator cancellation, registration
    /// deadline, or an upstream COMMITMENT_BROKEN/security event).
    pub fn abort(&self, pool_id_hex: &str, reason: &str) -> Result<(), CoreError> {
        let handle = self.get(pool_id_hex)?;
        let mut pool = handle.lock().unwrap();
        if matches!(pool.phase, PoolPhase::Complete | PoolPhase::Aborted) {
            return Ok(());
        }
        pool.touch_phase(PoolPhase::Aborted);
        pool.abort_reason = Some(reason.to_string());
        drop(pool);
        self.emit_aborted(pool_id_hex, reason);
        Ok(())
    }

    fn emit_aborted(&self, pool_id_hex: &str, reason: &str) {
        self.events.emit(Event {
            kind: EventKind::PoolAborted,
            subject_id: pool_id_hex.to_string(),
            detail: reason.to_string(),
        });
    }
}
