use crate::core::{Block, PayloadTransaction, ProofOfWork, Transaction};
use crate::error::{BlockchainError, Result};

/// Admission rule for the mempool
pub fn validate_transaction(tx: &dyn Transaction) -> bool {
    tx.is_well_formed()
}

/// Check that `block` may be appended directly on top of `tip` without
/// re-mining it
pub fn validate_block(block: &Block, tip: &Block, difficulty: u32) -> Result<()> {
    if block.get_prev_hash() != tip.get_hash() {
        return Err(BlockchainError::Validation(format!(
            "invalid previous hash for block {}",
            block.get_index()
        )));
    }

    if block.get_index() != tip.get_index() + 1 {
        return Err(BlockchainError::Validation(format!(
            "block index {} does not follow tip {}",
            block.get_index(),
            tip.get_index()
        )));
    }

    if !ProofOfWork::validate(&block.header_bytes(), block.get_nonce(), difficulty) {
        return Err(BlockchainError::Validation(format!(
            "invalid proof of work for block {}",
            block.get_index()
        )));
    }

    if !block.has_consistent_hash() {
        return Err(BlockchainError::Validation(format!(
            "hash of block {} does not match its content",
            block.get_index()
        )));
    }

    for (i, tx) in block.get_transactions().iter().enumerate() {
        if !PayloadTransaction::new(tx).is_well_formed() {
            return Err(BlockchainError::Validation(format!(
                "malformed transaction {i} in block {}",
                block.get_index()
            )));
        }
    }

    Ok(())
}
