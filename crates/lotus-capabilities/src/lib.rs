//! The four collaborator capabilities this core is wired against:
//! `Transport`, `Chain`, `Crypto`, `TxBuilder`.
//!
//! `Crypto` isn't a trait here — its operations (curve arithmetic, SHA-256,
//! single-signer Schnorr) are satisfied directly by `secp256k1`/`bitcoin`/
//! `musig2`, the libraries the rest of this workspace already depends on.
//! Wrapping them behind a trait would be indirection with no second
//! implementation to justify it.

use async_trait::async_trait;
use lotus_primitives::MessageEnvelope;
use std::fmt;

pub use lotus_primitives::error::CoreError;

/// A UTXO as reported by the chain backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub amount: u64,
    pub script_pubkey: Vec<u8>,
}

/// Confirmation depth of a previously-broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmations {
    Unconfirmed,
    Confirmed(u32),
}

/// A peer identifier on the transport substrate. Opaque to the core.
pub type PeerId = String;

/// The P2P transport substrate: peer discovery, connection management,
/// and stream multiplexing live below this trait and are out of scope
/// here.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn publish(&self, protocol: &str, message: MessageEnvelope) -> Result<(), CoreError>;

    async fn send(
        &self,
        peer: &PeerId,
        message: MessageEnvelope,
    ) -> Result<(), CoreError>;

    fn peer_id(&self) -> PeerId;

    async fn is_connected(&self, peer: &PeerId) -> bool;
}

/// A handler invoked for every inbound message on a given protocol.
/// Registered against a `Transport` by the protocol handler (component G).
pub trait MessageHandler: Send + Sync {
    fn handle(&self, from: &PeerId, message: MessageEnvelope);
}

/// The blockchain data provider: UTXO status and confirmation depth.
/// Full consensus validation is explicitly out of scope.
#[async_trait]
pub trait Chain: Send + Sync {
    async fn get_utxo(&self, txid: &str, vout: u32) -> Result<Option<Utxo>, CoreError>;

    async fn get_confirmations(&self, txid: &str) -> Result<Confirmations, CoreError>;

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, CoreError>;
}

/// An output descriptor the transaction builder turns into a concrete
/// script. Address classification/encoding stays entirely inside
/// `TxBuilder` — it is a stable black box from the core's point of view.
#[derive(Debug, Clone)]
pub enum OutputDescriptor {
    /// Pay `amount` satoshis to an opaque destination address string.
    PayToAddress { address: String, amount: u64 },
    /// Pay `amount` satoshis to a MuSig2-aggregated Taproot output key.
    PayToAggregatedKey {
        aggregated_xonly: [u8; 32],
        amount: u64,
    },
    /// An unspendable OP_RETURN output carrying `tag` bytes (Sybil-defense burn).
    OpReturn { tag: Vec<u8>, amount: u64 },
}

/// Builds UTXO transactions from output descriptors and computes the
/// signing hash under the host chain's rules. Script interpretation and
/// address parsing/classification are entirely this capability's concern.
pub trait TxBuilder: Send + Sync {
    /// Build an unsigned transaction spending `input` (txid, vout) to the
    /// given outputs, returning the raw unsigned transaction bytes and the
    /// 32-byte sighash each input's signer must sign.
    fn build(
        &self,
        input: (&str, u32),
        outputs: &[OutputDescriptor],
    ) -> Result<(Vec<u8>, [u8; 32]), CoreError>;

    /// Attach a signature to a previously built transaction, returning the
    /// final raw transaction ready to broadcast.
    fn finalize(&self, unsigned_tx: &[u8], signature: &[u8; 64]) -> Result<Vec<u8>, CoreError>;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Transport(peer_id={})", self.peer_id())
    }
}

/// In-memory fakes for `Transport`/`Chain`/`TxBuilder`, reused by the test
/// suites of every crate that needs a wired-up end-to-end scenario without
/// a real P2P stack or live chain.
pub mod testing;
