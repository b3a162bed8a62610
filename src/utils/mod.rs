//! Utility functions and helpers
//!
//! Hashing and clock helpers shared by blocks and proof-of-work.

pub mod crypto;

pub use crypto::{current_timestamp, sha256_digest};
