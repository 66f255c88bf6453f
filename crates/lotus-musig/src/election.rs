//! Deterministic coordinator election (§4.3). Every method is pure and
//! independently computable by every participant — no handshake is needed
//! to agree on who drives phase advancement.

use lotus_primitives::{hash::sha256, PublicKeyBytes};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectionMethod {
    Lexicographic,
    HashBased,
    FirstSigner,
    LastSigner,
}

impl ElectionMethod {
    fn tag(&self) -> &'static str {
        match self {
            ElectionMethod::Lexicographic => "LEXICOGRAPHIC",
            ElectionMethod::HashBased => "HASH_BASED",
            ElectionMethod::FirstSigner => "FIRST_SIGNER",
            ElectionMethod::LastSigner => "LAST_SIGNER",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElectionResult {
    pub coordinator_index: usize,
    pub coordinator_public_key: PublicKeyBytes,
    pub sorted_signers: Vec<PublicKeyBytes>,
    /// original index -> index in `sorted_signers`
    pub index_mapping: Vec<usize>,
    pub election_proof: [u8; 32],
}

fn concat_keys(keys: &[PublicKeyBytes]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(keys.len() * 33);
    for k in keys {
        buf.extend_from_slice(&k.0);
    }
    buf
}

fn election_proof(method: ElectionMethod, sorted: &[PublicKeyBytes], coordinator: &PublicKeyBytes) -> [u8; 32] {
    let mut buf = Vec::new();
    buf.extend_from_slice(method.tag().as_bytes());
    buf.extend_from_slice(&concat_keys(sorted));
    buf.extend_from_slice(&coordinator.0);
    sha256(&buf)
}

/// `signers` is in submission order; it is sorted internally where the
/// method requires it. Returns the elected coordinator plus everything
/// needed to verify the election independently.
pub fn elect_coordinator(signers: &[PublicKeyBytes], method: ElectionMethod) -> ElectionResult {
    let mut sorted = signers.to_vec();
    let original_order = signers.to_vec();

    let (coordinator_index, sorted_signers) = match method {
        ElectionMethod::Lexicographic => {
            sorted.sort();
            (0usize, sorted)
        }
        ElectionMethod::HashBased => {
            sorted.sort();
            let seed = sha256(&concat_keys(&sorted));
            let idx = (u64::from_be_bytes(seed[..8].try_into().unwrap()) as usize) % sorted.len();
            (idx, sorted)
        }
        ElectionMethod::FirstSigner => (0usize, original_order.clone()),
        ElectionMethod::LastSigner => (original_order.len() - 1, original_order.clone()),
    };

    let coordinator_public_key = sorted_signers[coordinator_index];

    let index_mapping: Vec<usize> = original_order
        .iter()
        .map(|orig| {
            sorted_signers
                .iter()
                .position(|s| s == orig)
                .expect("signer present in both orderings")
        })
        .collect();

    let election_proof = election_proof(method, &sorted_signers, &coordinator_public_key);

    ElectionResult {
        coordinator_index,
        coordinator_public_key,
        sorted_signers,
        index_mapping,
        election_proof,
    }
}

/// Recompute the election from scratch and byte-compare against a
/// claimed result. Rejects on any mismatch, including a tampered proof or
/// coordinator index.
pub fn verify_election(signers: &[PublicKeyBytes], result: &ElectionResult, method: ElectionMethod) -> bool {
    let recomputed = elect_coordinator(signers, method);
    recomputed == *result
}

/// The ordered failover chain of coordinator indices (into
/// `result.sorted_signers`) to try if the current coordinator is
/// unresponsive. Always a permutation of `[0..N)` with no duplicates.
pub fn failover_chain(result: &ElectionResult, method: ElectionMethod) -> Vec<usize> {
    let n = result.sorted_signers.len();
    match method {
        ElectionMethod::Lexicographic => (0..n).collect(),
        ElectionMethod::HashBased => {
            let mut chain = Vec::with_capacity(n);
            let mut tried = vec![false; n];
            let mut seed = election_proof(method, &result.sorted_signers, &result.coordinator_public_key);
            chain.push(result.coordinator_index);
            tried[result.coordinator_index] = true;
            while chain.len() < n {
                seed = sha256(&seed);
                let mut idx = (u64::from_be_bytes(seed[..8].try_into().unwrap()) as usize) % n;
                while tried[idx] {
                    idx = (idx + 1) % n;
                }
                tried[idx] = true;
                chain.push(idx);
            }
            chain
        }
        ElectionMethod::FirstSigner => (0..n).collect(),
        ElectionMethod::LastSigner => (0..n).rev().collect(),
    }
}
