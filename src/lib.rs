//! # Cluster Chain
//!
//! A small proof-of-work blockchain whose transactions carry clustering
//! results (a cluster id, its centroid and the dataset it came from).
//! Nodes keep a single ledger of blocks, collect pending transactions in a
//! mempool and gossip both transactions and freshly mined blocks to their
//! peers over TCP.
//!
//! ## Layout
//! - `core/`: blocks, the proof-of-work search, transactions and the ledger
//! - `consensus/`: admission rules, the coordinator and the peer-facing RPC
//! - `network/`: wire packages, the peer registry, server loop and gossip
//! - `storage/`: record stores (JSON files or sled) and the memory pool
//! - `config/`: environment-seeded settings
//! - `utils/`: hashing and time helpers
//! - `cli/`: command-line parsing for the binary
//!
//! A node never reorganizes: a block is accepted only when it extends the
//! local tip, so two nodes that mine the same height stay diverged.

pub mod cli;
pub mod config;
pub mod consensus;
pub mod core;
pub mod error;
pub mod network;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub mod testnet;

pub use cli::{Command, Opt};
pub use config::{Config, StoreBackend, GLOBAL_CONFIG};
pub use consensus::{ConsensusCoordinator, MinedBlock, NodeRpc};
pub use core::{
    Block, ClusterTransaction, Ledger, PayloadTransaction, ProofOfWork, SharedTransaction,
    Transaction,
};
pub use error::{BlockchainError, Result};
pub use network::{Gossip, PeerRegistry, Server};
pub use storage::{open_store, JsonFileStore, MemoryPool, RecordStore, SledStore};
pub use utils::{current_timestamp, sha256_digest};
