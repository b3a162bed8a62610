//! Consensus: admission rules, the coordinator that drives mining and block
//! acceptance, and the RPC handler that exposes it to peers.

pub mod coordinator;
pub mod rpc;
pub mod validation;

pub use coordinator::{ConsensusCoordinator, MinedBlock};
pub use rpc::{NodeRpc, BLOCK_ACCEPTED, BLOCK_REJECTED, TRANSACTION_RECEIVED, TRANSACTION_REJECTED};
pub use validation::{validate_block, validate_transaction};
