//! The node's runtime: wires the security validator, MuSig2 session store,
//! SwapSig pool store, and protocol handler onto a `Transport`/`Chain`/
//! `TxBuilder` substrate, then idles, logging observer events as they fire.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use lotus_capabilities::{Chain, Confirmations, OutputDescriptor, PeerId, Transport, TxBuilder, Utxo};
use lotus_events::{EventBus, EventKind};
use lotus_primitives::{CoreError, MessageEnvelope};
use lotus_protocol::handler::MusigProtocolHandler;
use lotus_session::SessionStore;
use lotus_swapsig::PoolStore;
use std::sync::Arc;
use std::time::Duration;

/// Out-of-scope substrates (§10): this crate wires the protocol against
/// real `Transport`/`Chain`/`TxBuilder` implementations supplied by the
/// embedding application. Standing this binary up on its own gets these
/// stubs, which surface the gap loudly instead of silently no-op'ing.
struct UnavailableTransport {
    peer_id: PeerId,
}

#[async_trait]
impl Transport for UnavailableTransport {
    async fn publish(&self, _protocol: &str, _message: MessageEnvelope) -> Result<(), CoreError> {
        Err(CoreError::ChainUnavailable(
            "no transport substrate wired into lotus-node".to_string(),
        ))
    }

    async fn send(&self, _peer: &PeerId, _message: MessageEnvelope) -> Result<(), CoreError> {
        Err(CoreError::ChainUnavailable(
            "no transport substrate wired into lotus-node".to_string(),
        ))
    }

    fn peer_id(&self) -> PeerId {
        self.peer_id.clone()
    }

    async fn is_connected(&self, _peer: &PeerId) -> bool {
        false
    }
}

struct UnavailableChain;

#[async_trait]
impl Chain for UnavailableChain {
    async fn get_utxo(&self, _txid: &str, _vout: u32) -> Result<Option<Utxo>, CoreError> {
        Err(CoreError::ChainUnavailable(
            "no chain substrate wired into lotus-node".to_string(),
        ))
    }

    async fn get_confirmations(&self, _txid: &str) -> Result<Confirmations, CoreError> {
        Err(CoreError::ChainUnavailable(
            "no chain substrate wired into lotus-node".to_string(),
        ))
    }

    async fn broadcast(&self, _raw_tx: &[u8]) -> Result<String, CoreError> {
        Err(CoreError::ChainUnavailable(
            "no chain substrate wired into lotus-node".to_string(),
        ))
    }
}

struct UnavailableTxBuilder;

impl TxBuilder for UnavailableTxBuilder {
    fn build(
        &self,
        _input: (&str, u32),
        _outputs: &[OutputDescriptor],
    ) -> Result<(Vec<u8>, [u8; 32]), CoreError> {
        Err(CoreError::ChainUnavailable(
            "no transaction builder wired into lotus-node".to_string(),
        ))
    }

    fn finalize(&self, _unsigned_tx: &[u8], _signature: &[u8; 64]) -> Result<Vec<u8>, CoreError> {
        Err(CoreError::ChainUnavailable(
            "no transaction builder wired into lotus-node".to_string(),
        ))
    }
}

/// Everything the node has wired up, held alive for the process lifetime.
pub struct NodeHandle {
    pub events: Arc<EventBus>,
    pub sessions: Arc<SessionStore>,
    pub pools: Arc<PoolStore>,
    pub protocol: Arc<MusigProtocolHandler>,
    #[allow(dead_code)]
    chain: Arc<dyn Chain>,
    #[allow(dead_code)]
    tx_builder: Arc<dyn TxBuilder>,
}

fn subscribe_logging(events: &EventBus) {
    for kind in [
        EventKind::SessionNoncesComplete,
        EventKind::SessionComplete,
        EventKind::SessionAborted,
        EventKind::PoolAborted,
    ] {
        events.on(kind, |event| {
            log::info!(
                "event: {:?} subject={} detail={}",
                event.kind,
                event.subject_id,
                event.detail
            );
        });
    }
}

/// Build the node's capability stack and protocol handler from config.
pub fn build(config: &NodeConfig) -> NodeHandle {
    let events = Arc::new(EventBus::new());
    subscribe_logging(&events);

    let security = Arc::new(lotus_security::SecurityValidator::new(
        config.security_config(),
    ));
    if let Some(path) = &config.security.peer_blocklist_file {
        if let Ok(contents) = std::fs::read_to_string(path) {
            for peer in contents.lines().map(str::trim).filter(|l| !l.is_empty()) {
                security.block_peer(peer);
                log::info!("security: blocked peer {peer} from blocklist file");
            }
        }
    }

    let sessions = Arc::new(SessionStore::new(events.clone(), config.session_config()));
    let pools = Arc::new(PoolStore::new(events.clone(), sessions.clone()));

    let transport: Arc<dyn Transport> = Arc::new(UnavailableTransport {
        peer_id: config.node.peer_id.clone(),
    });
    let chain: Arc<dyn Chain> = Arc::new(UnavailableChain);
    let tx_builder: Arc<dyn TxBuilder> = Arc::new(UnavailableTxBuilder);

    let protocol = Arc::new(MusigProtocolHandler::new(
        sessions.clone(),
        security,
        transport,
    ));

    NodeHandle {
        events,
        sessions,
        pools,
        protocol,
        chain,
        tx_builder,
    }
}

/// Run the node. Blocks forever (until shutdown signal), logging a
/// heartbeat of live session/pool counts on a fixed interval.
pub async fn run(config: NodeConfig) -> Result<()> {
    log::info!("lotus-node starting…");
    log::info!("  Peer id:    {}", config.node.peer_id);
    log::info!("  Data dir:   {}", config.node.data_dir.display());
    log::info!(
        "  Burn:       {:.3}% [{}, {}]",
        config.swapsig.burn_percentage * 100.0,
        config.swapsig.burn_min,
        config.swapsig.burn_max
    );
    log::info!("  Strict mode: {}", config.swapsig.strict_mode);

    std::fs::create_dir_all(&config.node.data_dir).with_context(|| {
        format!(
            "Failed to create data dir: {}",
            config.node.data_dir.display()
        )
    })?;

    let node = build(&config);
    node.sessions.sweep_timeouts();
    node.sessions.gc();
    let heartbeat = Duration::from_secs(60);

    loop {
        tokio::time::sleep(heartbeat).await;
        node.sessions.sweep_timeouts();
        node.sessions.gc();
        log::debug!("heartbeat: sessions swept and garbage-collected");
    }
}
