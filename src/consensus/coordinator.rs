// The coordinator ties the ledger, mempool and gossip together. It owns no
// timer: transactions arrive, mining is requested and remote blocks are
// offered by whoever drives it (the RPC surface, the CLI, tests).

use crate::consensus::validation::{validate_block, validate_transaction};
use crate::core::{Block, Ledger, SharedTransaction};
use crate::error::Result;
use crate::network::{Broadcast, Gossip};
use crate::storage::MemoryPool;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};

/// A freshly mined block and the deliveries announcing it
pub struct MinedBlock {
    pub block: Block,
    pub broadcast: Broadcast,
}

pub struct ConsensusCoordinator {
    ledger: Arc<Ledger>,
    mempool: Arc<MemoryPool>,
    gossip: Gossip,
    // Separate from the ledger's own lock: it serializes whole mining rounds
    // (snapshot, solve, cleanup) without blocking ledger readers in between
    mining_lock: Mutex<()>,
}

impl ConsensusCoordinator {
    pub fn new(ledger: Arc<Ledger>, mempool: Arc<MemoryPool>, gossip: Gossip) -> Self {
        Self {
            ledger,
            mempool,
            gossip,
            mining_lock: Mutex::new(()),
        }
    }

    pub fn get_ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn get_mempool(&self) -> &Arc<MemoryPool> {
        &self.mempool
    }

    pub fn get_gossip(&self) -> &Gossip {
        &self.gossip
    }

    /// Admit a transaction into the mempool if it passes validation
    pub fn submit_transaction(&self, tx: SharedTransaction) -> bool {
        if !validate_transaction(tx.as_ref()) {
            warn!("Rejected invalid transaction: {}", tx.serialize());
            return false;
        }
        self.mempool.add(tx);
        info!("Transaction added to mempool ({} pending)", self.mempool.len());
        true
    }

    /// Submit locally and, if admitted, gossip the transaction to every peer
    pub fn publish_transaction(&self, tx: SharedTransaction) -> Option<Broadcast> {
        if !self.submit_transaction(Arc::clone(&tx)) {
            return None;
        }
        Some(self.gossip.broadcast_transaction(tx.as_ref()))
    }

    /// Mine everything currently pending into one block. Returns `Ok(None)`
    /// when there is nothing to mine.
    pub fn mine_block(&self) -> Result<Option<MinedBlock>> {
        let _round = self.mining_lock.lock().unwrap_or_else(|poisoned| {
            error!("Mining lock was poisoned, recovering");
            poisoned.into_inner()
        });

        let transactions = self.mempool.snapshot();
        if transactions.is_empty() {
            info!("No transactions to mine");
            return Ok(None);
        }

        let block = self.ledger.add_block(&transactions)?;

        // Only what went into the block leaves the pool; anything submitted
        // during the search stays for the next round
        for tx in &transactions {
            self.mempool.remove(tx);
        }
        info!(
            "New block {} is mined with {} transactions",
            block.get_index(),
            transactions.len()
        );

        let broadcast = self.gossip.broadcast_block(&block);
        Ok(Some(MinedBlock { block, broadcast }))
    }

    /// Append a block solved by another node if it extends our tip with valid
    /// work. Rejections leave every piece of state untouched.
    pub fn accept_remote_block(&self, block: &Block) -> bool {
        let tip = match self.ledger.tip() {
            Ok(tip) => tip,
            Err(e) => {
                error!("Cannot read ledger tip: {e}");
                return false;
            }
        };

        if let Err(e) = validate_block(block, &tip, self.ledger.difficulty()) {
            warn!("Invalid block {}: {e}", block.get_index());
            return false;
        }

        if let Err(e) = self.ledger.append_foreign_block(block.clone()) {
            warn!("Block {} lost the race for the tip: {e}", block.get_index());
            return false;
        }

        for tx in block.get_transactions() {
            self.mempool.remove_serialized(tx);
        }
        info!("Block {} added to blockchain", block.get_index());
        true
    }
}
