//! In-process fakes for the three collaborator capabilities. Used by test
//! suites across the workspace; never compiled into the node binary.

use crate::{Chain, Confirmations, CoreError, OutputDescriptor, PeerId, Transport, TxBuilder, Utxo};
use async_trait::async_trait;
use lotus_primitives::MessageEnvelope;
use std::collections::HashMap;
use std::sync::Mutex;

/// A `Transport` that records every publish/send and lets a test inject
/// inbound deliveries by draining `sent`/`published` from one fake's
/// perspective and feeding them to another's `inbox`.
pub struct FakeTransport {
    peer_id: PeerId,
    pub published: Mutex<Vec<(String, MessageEnvelope)>>,
    pub sent: Mutex<Vec<(PeerId, MessageEnvelope)>>,
    connected: Mutex<Vec<PeerId>>,
}

impl FakeTransport {
    pub fn new(peer_id: &str) -> Self {
        Self {
            peer_id: peer_id.to_string(),
            published: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            connected: Mutex::new(Vec::new()),
        }
    }

    pub fn mark_connected(&self, peer: &str) {
        self.connected.lock().unwrap().push(peer.to_string());
    }

    pub fn take_published(&self) -> Vec<(String, MessageEnvelope)> {
        std::mem::take(&mut self.published.lock().unwrap())
    }

    pub fn take_sent(&self) -> Vec<(PeerId, MessageEnvelope)> {
        std::mem::take(&mut self.sent.lock().unwrap())
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn publish(&self, protocol: &str, message: MessageEnvelope) -> Result<(), CoreError> {
        self.published
            .lock()
            .unwrap()
            .push((protocol.to_string(), message));
        Ok(())
    }

    async fn send(&self, peer: &PeerId, message: MessageEnvelope) -> Result<(), CoreError> {
        self.sent.lock().unwrap().push((peer.clone(), message));
        Ok(())
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id.clone()
    }

    async fn is_connected(&self, peer: &PeerId) -> bool {
        self.connected.lock().unwrap().contains(peer)
    }
}

/// A `Chain` backed by in-memory maps, populated by the test.
#[derive(Default)]
pub struct FakeChain {
    utxos: Mutex<HashMap<(String, u32), Utxo>>,
    confirmations: Mutex<HashMap<String, Confirmations>>,
    pub broadcasts: Mutex<Vec<Vec<u8>>>,
}

impl FakeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_utxo(&self, txid: &str, vout: u32, utxo: Utxo) {
        self.utxos
            .lock()
            .unwrap()
            .insert((txid.to_string(), vout), utxo);
    }

    pub fn set_confirmations(&self, txid: &str, confirmations: Confirmations) {
        self.confirmations
            .lock()
            .unwrap()
            .insert(txid.to_string(), confirmations);
    }
}

#[async_trait]
impl Chain for FakeChain {
    async fn get_utxo(&self, txid: &str, vout: u32) -> Result<Option<Utxo>, CoreError> {
        Ok(self
            .utxos
            .lock()
            .unwrap()
            .get(&(txid.to_string(), vout))
            .cloned())
    }

    async fn get_confirmations(&self, txid: &str) -> Result<Confirmations, CoreError> {
        Ok(self
            .confirmations
            .lock()
            .unwrap()
            .get(txid)
            .copied()
            .unwrap_or(Confirmations::Unconfirmed))
    }

    async fn broadcast(&self, raw_tx: &[u8]) -> Result<String, CoreError> {
        self.broadcasts.lock().unwrap().push(raw_tx.to_vec());
        Ok(lotus_primitives::hash::sha256(raw_tx)
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect())
    }
}

/// A `TxBuilder` that serializes a minimal deterministic byte encoding —
/// enough to drive the signing/verification flow in tests without a real
/// script interpreter.
pub struct FakeTxBuilder;

impl TxBuilder for FakeTxBuilder {
    fn build(
        &self,
        input: (&str, u32),
        outputs: &[OutputDescriptor],
    ) -> Result<(Vec<u8>, [u8; 32]), CoreError> {
        let mut buf = Vec::new();
        buf.extend_from_slice(input.0.as_bytes());
        buf.extend_from_slice(&input.1.to_le_bytes());
        for out in outputs {
            match out {
                OutputDescriptor::PayToAddress { address, amount } => {
                    buf.extend_from_slice(address.as_bytes());
                    buf.extend_from_slice(&amount.to_le_bytes());
                }
                OutputDescriptor::PayToAggregatedKey {
                    aggregated_xonly,
                    amount,
                } => {
                    buf.extend_from_slice(aggregated_xonly);
                    buf.extend_from_slice(&amount.to_le_bytes());
                }
                OutputDescriptor::OpReturn { tag, amount } => {
                    buf.extend_from_slice(tag);
                    buf.extend_from_slice(&amount.to_le_bytes());
                }
            }
        }
        let sighash = lotus_primitives::hash::sha256(&buf);
        Ok((buf, sighash))
    }

    fn finalize(&self, unsigned_tx: &[u8], signature: &[u8; 64]) -> Result<Vec<u8>, CoreError> {
        let mut out = unsigned_tx.to_vec();
        out.extend_from_slice(signature);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fake_transport_records_publish_and_send() {
        let t = FakeTransport::new("peer-a");
        let env = MessageEnvelope::new("/lotus/musig2/1.0.0", "SESSION_JOIN", serde_json::json!({}));
        t.publish("/lotus/musig2/1.0.0", env.clone()).await.unwrap();
        t.send(&"peer-b".to_string(), env).await.unwrap();
        assert_eq!(t.take_published().len(), 1);
        assert_eq!(t.take_sent().len(), 1);
    }

    #[tokio::test]
    async fn fake_chain_tracks_utxos_and_confirmations() {
        let chain = FakeChain::new();
        chain.insert_utxo(
            "abc",
            0,
            Utxo {
                amount: 1_000_000,
                script_pubkey: vec![0x51, 0x20],
            },
        );
        chain.set_confirmations("abc", Confirmations::Confirmed(6));

        let utxo = chain.get_utxo("abc", 0).await.unwrap().unwrap();
        assert_eq!(utxo.amount, 1_000_000);
        assert_eq!(
            chain.get_confirmations("abc").await.unwrap(),
            Confirmations::Confirmed(6)
        );
        assert_eq!(
            chain.get_confirmations("missing").await.unwrap(),
            Confirmations::Unconfirmed
        );
    }

    #[test]
    fn fake_tx_builder_build_and_finalize_roundtrip() {
        let builder = FakeTxBuilder;
        let (unsigned, sighash) = builder
            .build(
                ("abc", 0),
                &[OutputDescriptor::PayToAddress {
                    address: "addr1".to_string(),
                    amount: 1000,
                }],
            )
            .unwrap();
        assert_eq!(sighash, lotus_primitives::hash::sha256(&unsigned));
        let finalized = builder.finalize(&unsigned, &[0u8; 64]).unwrap();
        assert_eq!(finalized.len(), unsigned.len() + 64);
    }
}
