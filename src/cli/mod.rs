//! Command-line interface
//!
//! Argument parsing for running a node and for poking at a local ledger.

pub mod commands;

pub use commands::{Command, Opt};
