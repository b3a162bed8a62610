use crate::error::{BlockchainError, Result};
use crate::network::client;
use crate::network::message::{write_package, Package, WireMessage};
use crate::network::peers::{parse_peer_addr, Connection, PeerRegistry, SharedConnection};
use log::{debug, error, info, warn};
use serde_json::Deserializer;
use std::io::BufReader;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Receiver for everything a peer sends us
pub trait InboundHandler: Send + Sync {
    /// Resolve a logical method name and produce the reply string
    fn handle_call(&self, method: &str, payload: &str) -> Result<String>;

    /// Consume a pushed stream message; there is no reply
    fn handle_message(&self, message: WireMessage);
}

/// Passive listener: every accepted connection becomes a peer with its own
/// decode loop
pub struct Server {
    listener: TcpListener,
    peers: Arc<PeerRegistry>,
    handler: Arc<dyn InboundHandler>,
}

impl Server {
    pub fn bind(
        addr: &str,
        peers: Arc<PeerRegistry>,
        handler: Arc<dyn InboundHandler>,
    ) -> Result<Server> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;
        info!("Server listening on {addr}");
        Ok(Server {
            listener,
            peers,
            handler,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|e| BlockchainError::Network(format!("Failed to read local address: {e}")))
    }

    /// Accept connections forever
    pub fn run(&self) -> Result<()> {
        for stream in self.listener.incoming() {
            match stream {
                Ok(stream) => {
                    let peer_addr = match stream.peer_addr() {
                        Ok(addr) => addr,
                        Err(e) => {
                            error!("Failed to get peer address: {e}");
                            continue;
                        }
                    };
                    info!("New connection from {peer_addr}");

                    let peers = Arc::clone(&self.peers);
                    let handler = Arc::clone(&self.handler);
                    thread::spawn(move || {
                        let address = peer_addr.ip().to_string();
                        serve_connection(stream, &address, peer_addr.port(), peers, handler);
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {e}");
                }
            }
        }

        Ok(())
    }

    /// Run the accept loop on a background thread
    pub fn spawn(self) -> JoinHandle<()> {
        thread::spawn(move || {
            if let Err(e) = self.run() {
                error!("Server stopped: {e}");
            }
        })
    }
}

/// Dial `addr`, keep the connection open as a peer and serve whatever the
/// remote side pushes over it
pub fn connect_peer(
    addr: &str,
    peers: Arc<PeerRegistry>,
    handler: Arc<dyn InboundHandler>,
    timeout: Option<Duration>,
) -> Result<JoinHandle<()>> {
    let (address, port) = parse_peer_addr(addr)?;
    let stream = client::dial(addr, timeout)?;
    // Persistent gossip links must not time out while idle
    stream
        .set_read_timeout(None)
        .map_err(|e| BlockchainError::Network(format!("Failed to clear read timeout: {e}")))?;
    info!("Connected to peer at {addr}");

    let connection = register(&stream, &address, port, &peers)?;
    Ok(thread::spawn(move || {
        decode_loop(stream, &address, port, connection, peers, handler);
    }))
}

fn register(
    stream: &TcpStream,
    address: &str,
    port: u16,
    peers: &PeerRegistry,
) -> Result<SharedConnection> {
    let connection = Arc::new(Connection::new(stream)?);
    peers.add_connected(address, port, Arc::clone(&connection));
    Ok(connection)
}

fn serve_connection(
    stream: TcpStream,
    address: &str,
    port: u16,
    peers: Arc<PeerRegistry>,
    handler: Arc<dyn InboundHandler>,
) {
    match register(&stream, address, port, &peers) {
        Ok(connection) => decode_loop(stream, address, port, connection, peers, handler),
        Err(e) => error!("Dropping connection from {address}:{port}: {e}"),
    }
}

// Runs until the peer disconnects or sends something undecodable; either way
// the peer leaves the registry.
fn decode_loop(
    stream: TcpStream,
    address: &str,
    port: u16,
    connection: SharedConnection,
    peers: Arc<PeerRegistry>,
    handler: Arc<dyn InboundHandler>,
) {
    let reader = BufReader::new(stream);
    let pkg_reader = Deserializer::from_reader(reader).into_iter::<Package>();

    for pkg in pkg_reader {
        let pkg = match pkg {
            Ok(pkg) => pkg,
            Err(e) => {
                warn!("Failed to decode package from {address}:{port}: {e}");
                break;
            }
        };
        debug!("Received from {address}:{port}: {pkg:?}");

        if let Err(e) = dispatch(pkg, &connection, handler.as_ref()) {
            error!("Error answering {address}:{port}: {e}");
            break;
        }
    }

    peers.drop_connection(address, port, &connection);
    info!("Connection with {address}:{port} closed");
}

fn dispatch(pkg: Package, connection: &SharedConnection, handler: &dyn InboundHandler) -> Result<()> {
    match pkg {
        Package::Call { method, payload } => {
            let response = match handler.handle_call(&method, &payload) {
                Ok(reply) => Package::Reply { reply },
                Err(e) => Package::Fault {
                    message: e.to_string(),
                },
            };
            let mut stream = connection.writer()?;
            write_package(&mut *stream, &response)
        }
        Package::Message(message) => {
            handler.handle_message(message);
            Ok(())
        }
        Package::Reply { reply } => {
            debug!("Ignoring unsolicited reply: {reply}");
            Ok(())
        }
        Package::Fault { message } => {
            warn!("Peer reported fault: {message}");
            Ok(())
        }
    }
}
