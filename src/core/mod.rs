//! Core ledger functionality
//!
//! This module contains the fundamental chain components: blocks, the
//! transaction capability, the proof-of-work engine and the ledger itself.

pub mod block;
pub mod ledger;
pub mod proof_of_work;
pub mod transaction;

pub use block::{Block, GENESIS_TRANSACTION};
pub use ledger::Ledger;
pub use proof_of_work::{ProofOfWork, MAX_DIFFICULTY};
pub use transaction::{ClusterTransaction, PayloadTransaction, SharedTransaction, Transaction};
