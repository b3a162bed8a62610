//! Test fixtures
//!
//! Throwaway ledgers and nodes in temporary directories, shared by the
//! unit tests of the consensus and network layers.

pub mod test_utils;

pub use test_utils::*;
