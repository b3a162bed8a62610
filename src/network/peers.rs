use crate::error::{BlockchainError, Result};
use log::{debug, info};
use std::fmt;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex, MutexGuard};

/// A live link to a peer. Replies and gossip pushes serialize on `writer`;
/// `control` is a second handle on the same socket so closing it never waits
/// behind a blocked write.
pub struct Connection {
    writer: Mutex<TcpStream>,
    control: TcpStream,
}

impl Connection {
    pub fn new(stream: &TcpStream) -> Result<Connection> {
        let clone = || {
            stream
                .try_clone()
                .map_err(|e| BlockchainError::Network(format!("Failed to clone connection: {e}")))
        };
        Ok(Connection {
            writer: Mutex::new(clone()?),
            control: clone()?,
        })
    }

    pub fn writer(&self) -> Result<MutexGuard<'_, TcpStream>> {
        self.writer
            .lock()
            .map_err(|_| BlockchainError::Network("Connection lock poisoned".to_string()))
    }

    pub fn shutdown(&self) {
        let _ = self.control.shutdown(Shutdown::Both);
    }
}

pub type SharedConnection = Arc<Connection>;

#[derive(Clone)]
pub struct Peer {
    address: String,
    port: u16,
    connection: Option<SharedConnection>,
    // Known as a dialable endpoint, so it outlives any single connection
    dialable: bool,
}

impl Peer {
    fn new(
        address: &str,
        port: u16,
        connection: Option<SharedConnection>,
        dialable: bool,
    ) -> Peer {
        Peer {
            address: address.to_string(),
            port,
            connection,
            dialable,
        }
    }

    pub fn get_address(&self) -> &str {
        self.address.as_str()
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Registry key, `address:port`
    pub fn get_addr(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn get_connection(&self) -> Option<SharedConnection> {
        self.connection.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn is_dialable(&self) -> bool {
        self.dialable
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("addr", &self.get_addr())
            .field("connected", &self.is_connected())
            .field("dialable", &self.dialable)
            .finish()
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts
pub fn parse_peer_addr(addr: &str) -> Result<(String, u16)> {
    let (host, port) = addr
        .rsplit_once(':')
        .ok_or_else(|| BlockchainError::Network(format!("Peer address {addr} has no port")))?;
    let port = port
        .parse::<u16>()
        .map_err(|e| BlockchainError::Network(format!("Invalid port in {addr}: {e}")))?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return Err(BlockchainError::Network(format!("Peer address {addr} has no host")));
    }
    Ok((host.to_string(), port))
}

/// Known peer endpoints keyed by `address:port`
pub struct PeerRegistry {
    inner: Mutex<Vec<Peer>>,
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PeerRegistry {
    pub fn new() -> PeerRegistry {
        PeerRegistry {
            inner: Mutex::new(vec![]),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Peer>> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            log::error!("Peer registry lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Register a dialable endpoint; a no-op if it is already known
    pub fn add(&self, address: &str, port: u16) -> bool {
        let mut inner = self.lock();
        let key = format!("{address}:{port}");
        if let Some(peer) = inner.iter_mut().find(|p| p.get_addr() == key) {
            peer.dialable = true;
            return false;
        }
        inner.push(Peer::new(address, port, None, true));
        info!("Added peer {key}");
        true
    }

    pub fn add_addr(&self, addr: &str) -> Result<bool> {
        let (address, port) = parse_peer_addr(addr)?;
        Ok(self.add(&address, port))
    }

    /// Register an endpoint together with its live connection, replacing any
    /// previous entry for the same key
    pub fn add_connected(&self, address: &str, port: u16, connection: SharedConnection) {
        let mut inner = self.lock();
        let key = format!("{address}:{port}");
        let dialable = inner.iter().any(|p| p.get_addr() == key && p.dialable);
        inner.retain(|p| p.get_addr() != key);
        inner.push(Peer::new(address, port, Some(connection), dialable));
        info!("Connected to peer {key}");
    }

    /// Drop the peer and close its connection if it has one
    pub fn remove(&self, address: &str, port: u16) -> bool {
        let mut inner = self.lock();
        let key = format!("{address}:{port}");
        let Some(idx) = inner.iter().position(|p| p.get_addr() == key) else {
            return false;
        };
        let peer = inner.remove(idx);
        drop(inner);

        if let Some(connection) = peer.connection {
            connection.shutdown();
        }
        info!("Removed peer {key}");
        true
    }

    /// Forget a closed link. Only the entry still holding `connection` is
    /// touched; a dialable peer stays registered without it.
    pub fn drop_connection(&self, address: &str, port: u16, connection: &SharedConnection) -> bool {
        let mut inner = self.lock();
        let key = format!("{address}:{port}");
        let Some(idx) = inner.iter().position(|p| {
            p.get_addr() == key
                && p.connection
                    .as_ref()
                    .is_some_and(|current| Arc::ptr_eq(current, connection))
        }) else {
            drop(inner);
            connection.shutdown();
            return false;
        };

        if inner[idx].dialable {
            inner[idx].connection = None;
            info!("Peer {key} disconnected, keeping it for dialing");
        } else {
            inner.remove(idx);
            info!("Removed peer {key}");
        }
        drop(inner);
        connection.shutdown();
        true
    }

    /// Snapshot of the current peers, safe to iterate without the lock
    pub fn list(&self) -> Vec<Peer> {
        let peers = self.lock().clone();
        debug!("Listing {} peers", peers.len());
        peers
    }

    pub fn contains(&self, address: &str, port: u16) -> bool {
        let key = format!("{address}:{port}");
        self.lock().iter().any(|p| p.get_addr() == key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
