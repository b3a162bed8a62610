//! Data storage and persistence
//!
//! This module holds the durable record stores the ledger persists blocks
//! into, and the memory pool of transactions waiting to be mined.

pub mod memory_pool;
pub mod record_store;

pub use memory_pool::MemoryPool;
pub use record_store::{open_store, JsonFileStore, RecordStore, SledStore};
