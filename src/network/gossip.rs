// Best-effort fan-out. Every peer gets its own thread so a slow or dead peer
// never delays the others; failures are logged inside the thread and also
// handed back through `Broadcast::wait` for callers that want to look.

use crate::core::{Block, Transaction};
use crate::error::{BlockchainError, Result};
use crate::network::client;
use crate::network::message::{
    write_package, Package, WireMessage, HANDLE_BLOCK, HANDLE_TRANSACTION, MSG_BLOCK,
    MSG_TRANSACTION,
};
use crate::network::peers::{Peer, PeerRegistry};
use log::{debug, error, info};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

const DELIVERED_ON_STREAM: &str = "delivered";

/// Outcome of one peer's delivery
#[derive(Debug)]
pub struct Delivery {
    pub peer: String,
    pub outcome: Result<String>,
}

impl Delivery {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// In-flight deliveries of one broadcast. Dropping it detaches the threads.
pub struct Broadcast {
    handles: Vec<(String, JoinHandle<Result<String>>)>,
}

impl Broadcast {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Block until every peer has been tried
    pub fn wait(self) -> Vec<Delivery> {
        self.handles
            .into_iter()
            .map(|(peer, handle)| {
                let outcome = handle.join().unwrap_or_else(|_| {
                    Err(BlockchainError::Network(format!("Delivery thread for {peer} panicked")))
                });
                Delivery { peer, outcome }
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct Gossip {
    peers: Arc<PeerRegistry>,
    timeout: Option<Duration>,
}

impl Gossip {
    pub fn new(peers: Arc<PeerRegistry>) -> Gossip {
        Gossip {
            peers,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Gossip {
        self.timeout = timeout;
        self
    }

    pub fn get_peers(&self) -> &Arc<PeerRegistry> {
        &self.peers
    }

    pub fn broadcast_block(&self, block: &Block) -> Broadcast {
        let payload = match block.to_json() {
            Ok(payload) => payload,
            Err(e) => {
                error!("Not broadcasting block {}: {e}", block.get_index());
                return Broadcast { handles: vec![] };
            }
        };
        info!("Broadcasting block {} to peers", block.get_index());
        self.fan_out(HANDLE_BLOCK, MSG_BLOCK, payload)
    }

    pub fn broadcast_transaction(&self, tx: &dyn Transaction) -> Broadcast {
        self.fan_out(HANDLE_TRANSACTION, MSG_TRANSACTION, tx.serialize())
    }

    /// Push a raw message to every peer holding a live connection
    pub fn send_message(&self, message: WireMessage) -> Broadcast {
        let handles = self
            .peers
            .list()
            .into_iter()
            .filter(Peer::is_connected)
            .map(|peer| {
                let message = message.clone();
                let addr = peer.get_addr();
                let handle = thread::spawn(move || {
                    let result = Self::push(&peer, message);
                    Self::log_outcome(&peer.get_addr(), "message", &result);
                    result
                });
                (addr, handle)
            })
            .collect();
        Broadcast { handles }
    }

    // Peers we hold a connection to get the payload pushed down that stream;
    // the rest are dialed and called.
    fn fan_out(&self, method: &'static str, msg_type: &'static str, payload: String) -> Broadcast {
        let timeout = self.timeout;
        let handles = self
            .peers
            .list()
            .into_iter()
            .map(|peer| {
                let payload = payload.clone();
                let addr = peer.get_addr();
                let handle = thread::spawn(move || {
                    let result = if peer.is_connected() {
                        Self::push(&peer, WireMessage::new(msg_type, &payload))
                    } else {
                        client::call(&peer.get_addr(), method, &payload, timeout)
                    };
                    Self::log_outcome(&peer.get_addr(), method, &result);
                    result
                });
                (addr, handle)
            })
            .collect();
        Broadcast { handles }
    }

    fn push(peer: &Peer, message: WireMessage) -> Result<String> {
        let connection = peer.get_connection().ok_or_else(|| {
            BlockchainError::Network(format!("{} has no live connection", peer.get_addr()))
        })?;
        let mut stream = connection.writer()?;
        write_package(&mut *stream, &Package::Message(message))?;
        Ok(DELIVERED_ON_STREAM.to_string())
    }

    fn log_outcome(peer: &str, what: &str, result: &Result<String>) {
        match result {
            Ok(reply) => debug!("{what} to {peer}: {reply}"),
            Err(e) => error!("Failed to send {what} to {peer}: {e}"),
        }
    }
}
