//! Peer-to-peer networking
//!
//! This module handles network communication between nodes: the registry of
//! known peers, the wire packages, the listener with its per-connection
//! decode loops, and best-effort gossip of blocks and transactions.

pub mod client;
pub mod gossip;
pub mod message;
pub mod peers;
pub mod server;

pub use client::call;
pub use gossip::{Broadcast, Delivery, Gossip};
pub use message::{
    Package, WireMessage, HANDLE_BLOCK, HANDLE_TRANSACTION, MSG_BLOCK, MSG_TRANSACTION,
};
pub use peers::{parse_peer_addr, Connection, Peer, PeerRegistry, SharedConnection};
pub use server::{connect_peer, InboundHandler, Server};
