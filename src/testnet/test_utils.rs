//! Test utilities for node and consensus testing

use crate::consensus::ConsensusCoordinator;
use crate::core::{Block, Ledger, PayloadTransaction, SharedTransaction};
use crate::error::{BlockchainError, Result};
use crate::network::{Gossip, PeerRegistry};
use crate::storage::{JsonFileStore, MemoryPool};
use std::sync::Arc;
use tempfile::TempDir;

/// Difficulty low enough that every test block is found within a few nonces
pub const TEST_DIFFICULTY: u32 = 4;

/// Create a temporary directory for testing
pub fn create_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(|e| BlockchainError::Io(e.to_string()))
}

/// Create a ledger backed by JSON files in a temporary directory
pub fn create_test_ledger(difficulty: u32) -> Result<(Arc<Ledger>, TempDir)> {
    let temp_dir = create_temp_dir()?;
    let store = Arc::new(JsonFileStore::open(temp_dir.path())?);
    let ledger = Ledger::open(store, difficulty)?;
    Ok((Arc::new(ledger), temp_dir))
}

/// Create a coordinator with no peers
pub fn create_test_node(difficulty: u32) -> Result<(Arc<ConsensusCoordinator>, TempDir)> {
    let (ledger, temp_dir) = create_test_ledger(difficulty)?;
    let gossip = Gossip::new(Arc::new(PeerRegistry::new()));
    let coordinator = ConsensusCoordinator::new(ledger, Arc::new(MemoryPool::new()), gossip);
    Ok((Arc::new(coordinator), temp_dir))
}

/// Create several isolated nodes sharing a difficulty
pub fn create_test_network(
    node_count: usize,
    difficulty: u32,
) -> Result<Vec<(Arc<ConsensusCoordinator>, TempDir)>> {
    (0..node_count)
        .map(|_| create_test_node(difficulty))
        .collect()
}

pub fn payload_tx(payload: &str) -> SharedTransaction {
    Arc::new(PayloadTransaction::new(payload))
}

/// Submit `payloads` to `node` and mine them into one block
pub fn mine_test_block(node: &ConsensusCoordinator, payloads: &[&str]) -> Result<Block> {
    for payload in payloads {
        node.submit_transaction(payload_tx(payload));
    }
    node.mine_block()?
        .map(|mined| mined.block)
        .ok_or_else(|| BlockchainError::Mining("Nothing was pending".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_network() {
        let nodes = create_test_network(3, TEST_DIFFICULTY).unwrap();
        assert_eq!(nodes.len(), 3);

        for (node, _) in &nodes {
            assert_eq!(node.get_ledger().height(), 0);
        }
    }

    #[test]
    fn test_mine_test_block() {
        let (node, _temp_dir) = create_test_node(TEST_DIFFICULTY).unwrap();
        let block = mine_test_block(&node, &["a", "b"]).unwrap();
        assert_eq!(block.get_index(), 1);
        assert!(mine_test_block(&node, &[]).is_err());
    }
}
