//! Configuration management
//!
//! Node settings seeded from environment variables (`NODE_ADDRESS`,
//! `DATA_DIR`, `DIFFICULTY`, `STORE_BACKEND`, `MINE_THRESHOLD`,
//! `RPC_TIMEOUT_MS`) and overridden by command-line flags.

pub mod settings;

pub use settings::{Config, StoreBackend, DEFAULT_DIFFICULTY, GLOBAL_CONFIG};
