use crate::core::{ProofOfWork, SharedTransaction};
use crate::error::{BlockchainError, Result};
use crate::utils::current_timestamp;
use data_encoding::HEXLOWER;
use log::info;
use serde::{Deserialize, Serialize};

/// Sentinel payload carried by every genesis block
pub const GENESIS_TRANSACTION: &str = "Genesis Block";

/// Record name prefix for persisted blocks (`block_<index>`)
pub const BLOCK_RECORD_PREFIX: &str = "block_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    index: u64,
    timestamp: i64,
    transactions: Vec<String>,
    prev_hash: String,
    hash: String,
    nonce: u64,
}

impl Block {
    /// Build an unsolved candidate on top of `prev_hash`; nonce and hash are
    /// filled in by [`Block::mine`]
    pub fn new_candidate(
        index: u64,
        transactions: &[SharedTransaction],
        prev_hash: &str,
    ) -> Result<Block> {
        let transactions = transactions.iter().map(|tx| tx.serialize()).collect();
        Ok(Block::from_parts(
            index,
            current_timestamp()?,
            transactions,
            prev_hash.to_string(),
            0,
        ))
    }

    /// Genesis is fixed (timestamp 0, nonce 0) so that every node derives the
    /// same root hash
    pub fn generate_genesis_block() -> Block {
        Block::from_parts(0, 0, vec![GENESIS_TRANSACTION.to_string()], String::new(), 0)
    }

    /// Assemble a block from raw fields, computing its hash
    pub fn from_parts(
        index: u64,
        timestamp: i64,
        transactions: Vec<String>,
        prev_hash: String,
        nonce: u64,
    ) -> Block {
        let mut block = Block {
            index,
            timestamp,
            transactions,
            prev_hash,
            hash: String::new(),
            nonce,
        };
        block.hash = block.calculate_hash();
        block
    }

    /// Run proof-of-work over the header and store the winning nonce and hash
    pub fn mine(&mut self, difficulty: u32) -> Result<()> {
        info!(
            "Starting proof-of-work for block {} with difficulty {difficulty}",
            self.index
        );
        let (nonce, hash) = ProofOfWork::solve(&self.header_bytes(), difficulty)?;
        self.nonce = nonce;
        self.hash = HEXLOWER.encode(hash.as_slice());
        info!("Proof-of-work completed for block {}: {}", self.index, self.hash);
        Ok(())
    }

    /// Pre-nonce content the proof-of-work is computed over
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut data_bytes = vec![];
        data_bytes.extend(self.index.to_be_bytes());
        data_bytes.extend(self.prev_hash.as_bytes());
        data_bytes.extend(self.timestamp.to_be_bytes());
        for tx in &self.transactions {
            // Length prefix keeps ["ab", "c"] and ["a", "bc"] distinct
            data_bytes.extend((tx.len() as u64).to_be_bytes());
            data_bytes.extend(tx.as_bytes());
        }
        data_bytes
    }

    pub fn calculate_hash(&self) -> String {
        let hash = ProofOfWork::hash_with_nonce(&self.header_bytes(), self.nonce);
        HEXLOWER.encode(hash.as_slice())
    }

    /// Whether the stored hash still matches the block's content
    pub fn has_consistent_hash(&self) -> bool {
        self.hash == self.calculate_hash()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| BlockchainError::Serialization(format!("Failed to encode block: {e}")))
    }

    pub fn from_json(data: &str) -> Result<Block> {
        serde_json::from_str(data)
            .map_err(|e| BlockchainError::Serialization(format!("Failed to decode block: {e}")))
    }

    pub fn record_name(&self) -> String {
        format!("{BLOCK_RECORD_PREFIX}{}", self.index)
    }

    pub fn get_index(&self) -> u64 {
        self.index
    }

    pub fn get_timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn get_transactions(&self) -> &[String] {
        self.transactions.as_slice()
    }

    pub fn get_prev_hash(&self) -> &str {
        self.prev_hash.as_str()
    }

    pub fn get_hash(&self) -> &str {
        self.hash.as_str()
    }

    pub fn get_nonce(&self) -> u64 {
        self.nonce
    }

    #[cfg(test)]
    pub fn set_hash_for_test(&mut self, hash: &str) {
        self.hash = hash.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PayloadTransaction;
    use std::sync::Arc;

    fn payloads(items: &[&str]) -> Vec<SharedTransaction> {
        items
            .iter()
            .map(|p| Arc::new(PayloadTransaction::new(p)) as SharedTransaction)
            .collect()
    }

    #[test]
    fn test_calculate_hash_is_deterministic() {
        let block = Block::from_parts(3, 42, vec!["tx1".to_string()], "abc".to_string(), 7);
        assert_eq!(block.calculate_hash(), block.calculate_hash());
        let twin = Block::from_parts(3, 42, vec!["tx1".to_string()], "abc".to_string(), 7);
        assert_eq!(block.get_hash(), twin.get_hash());
    }

    #[test]
    fn test_hash_covers_every_field() {
        let base = Block::from_parts(1, 10, vec!["a".to_string()], "p".to_string(), 0);
        let variants = [
            Block::from_parts(2, 10, vec!["a".to_string()], "p".to_string(), 0),
            Block::from_parts(1, 11, vec!["a".to_string()], "p".to_string(), 0),
            Block::from_parts(1, 10, vec!["b".to_string()], "p".to_string(), 0),
            Block::from_parts(1, 10, vec!["a".to_string()], "q".to_string(), 0),
            Block::from_parts(1, 10, vec!["a".to_string()], "p".to_string(), 1),
        ];
        for variant in variants {
            assert_ne!(base.get_hash(), variant.get_hash());
        }
    }

    #[test]
    fn test_transaction_boundaries_are_hashed() {
        let split_a = Block::from_parts(1, 0, vec!["ab".into(), "c".into()], String::new(), 0);
        let split_b = Block::from_parts(1, 0, vec!["a".into(), "bc".into()], String::new(), 0);
        assert_ne!(split_a.get_hash(), split_b.get_hash());
    }

    #[test]
    fn test_genesis_is_fixed() {
        let genesis = Block::generate_genesis_block();
        assert_eq!(genesis.get_index(), 0);
        assert_eq!(genesis.get_prev_hash(), "");
        assert_eq!(genesis.get_transactions(), &[GENESIS_TRANSACTION.to_string()]);
        assert_eq!(genesis, Block::generate_genesis_block());
        assert!(genesis.has_consistent_hash());
    }

    #[test]
    fn test_mined_block_meets_target() {
        let mut block = Block::new_candidate(1, &payloads(&["tx1"]), "prev").unwrap();
        block.mine(8).unwrap();
        assert!(block.has_consistent_hash());
        assert!(block.get_hash().starts_with("00"));
        assert!(ProofOfWork::validate(&block.header_bytes(), block.get_nonce(), 8));
    }

    #[test]
    fn test_json_record_shape() {
        let block = Block::from_parts(5, 99, vec!["tx".to_string()], "prev".to_string(), 3);
        let json = block.to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in ["index", "timestamp", "transactions", "prev_hash", "hash", "nonce"] {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(Block::from_json(&json).unwrap(), block);
        assert_eq!(block.record_name(), "block_5");
    }
}
