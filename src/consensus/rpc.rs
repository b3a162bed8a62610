use crate::consensus::coordinator::ConsensusCoordinator;
use crate::core::{Block, PayloadTransaction};
use crate::error::{BlockchainError, Result};
use crate::network::{
    InboundHandler, WireMessage, HANDLE_BLOCK, HANDLE_TRANSACTION, MSG_BLOCK, MSG_TRANSACTION,
};
use log::{error, warn};
use std::sync::Arc;

pub const BLOCK_ACCEPTED: &str = "Block Accepted";
pub const BLOCK_REJECTED: &str = "Block Rejected";
pub const TRANSACTION_RECEIVED: &str = "Transaction Received";
pub const TRANSACTION_REJECTED: &str = "Transaction Rejected";

/// Remote surface of a node: maps wire methods and stream messages onto the
/// coordinator
pub struct NodeRpc {
    coordinator: Arc<ConsensusCoordinator>,
    mine_threshold: Option<usize>,
}

impl NodeRpc {
    pub fn new(coordinator: Arc<ConsensusCoordinator>) -> NodeRpc {
        NodeRpc {
            coordinator,
            mine_threshold: None,
        }
    }

    /// Mine as soon as this many transactions are pending
    pub fn with_mine_threshold(mut self, threshold: Option<usize>) -> NodeRpc {
        self.mine_threshold = threshold.filter(|t| *t > 0);
        self
    }

    pub fn get_coordinator(&self) -> &Arc<ConsensusCoordinator> {
        &self.coordinator
    }

    pub fn handle_block(&self, payload: &str) -> Result<String> {
        let block = Block::from_json(payload)?;
        if self.coordinator.accept_remote_block(&block) {
            Ok(BLOCK_ACCEPTED.to_string())
        } else {
            Ok(BLOCK_REJECTED.to_string())
        }
    }

    pub fn handle_transaction(&self, payload: &str) -> Result<String> {
        let tx = Arc::new(PayloadTransaction::new(payload));
        if !self.coordinator.submit_transaction(tx) {
            return Ok(TRANSACTION_REJECTED.to_string());
        }
        self.mine_if_due();
        Ok(TRANSACTION_RECEIVED.to_string())
    }

    fn mine_if_due(&self) {
        let Some(threshold) = self.mine_threshold else {
            return;
        };
        if self.coordinator.get_mempool().len() < threshold {
            return;
        }
        // The round runs off the connection thread so the sender gets its
        // reply before the search finishes
        let coordinator = Arc::clone(&self.coordinator);
        std::thread::spawn(move || {
            if let Err(e) = coordinator.mine_block() {
                error!("Mining failed: {e}");
            }
        });
    }
}

impl InboundHandler for NodeRpc {
    fn handle_call(&self, method: &str, payload: &str) -> Result<String> {
        match method {
            HANDLE_BLOCK => self.handle_block(payload),
            HANDLE_TRANSACTION => self.handle_transaction(payload),
            _ => Err(BlockchainError::Network(format!("Unknown method {method}"))),
        }
    }

    fn handle_message(&self, message: WireMessage) {
        let result = match message.get_type() {
            MSG_TRANSACTION => self.handle_transaction(message.get_payload()),
            MSG_BLOCK => self.handle_block(message.get_payload()),
            other => {
                warn!("Unknown message type: {other}");
                return;
            }
        };
        if let Err(e) = result {
            warn!("Dropping {} message: {e}", message.get_type());
        }
    }
}
