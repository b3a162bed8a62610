// Transactions are opaque to the ledger: the only thing consensus ever asks of
// one is its serialized string, which is used for hashing, for mempool
// equality and as the on-wire payload.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Capability every pending transaction exposes to the node
pub trait Transaction: Send + Sync + fmt::Debug {
    /// Deterministic string form used for hashing and equality
    fn serialize(&self) -> String;

    /// Transaction-level admission predicate run before entering the mempool
    fn is_well_formed(&self) -> bool {
        !self.serialize().is_empty()
    }
}

/// Shared handle so snapshots of the mempool can be handed out cheaply
pub type SharedTransaction = Arc<dyn Transaction>;

/// Result of a clustering run over a dataset, carried as a transaction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterTransaction {
    cluster_id: i64,
    centroid: Vec<f64>,
    dataset: String,
}

impl ClusterTransaction {
    pub fn new(cluster_id: i64, centroid: Vec<f64>, dataset: &str) -> ClusterTransaction {
        ClusterTransaction {
            cluster_id,
            centroid,
            dataset: dataset.to_string(),
        }
    }

    pub fn get_cluster_id(&self) -> i64 {
        self.cluster_id
    }

    pub fn get_centroid(&self) -> &[f64] {
        self.centroid.as_slice()
    }

    pub fn get_dataset(&self) -> &str {
        self.dataset.as_str()
    }
}

impl Transaction for ClusterTransaction {
    fn serialize(&self) -> String {
        let coords: Vec<String> = self.centroid.iter().map(|c| c.to_string()).collect();
        format!(
            "Cluster {}: [{}] from Dataset {}",
            self.cluster_id,
            coords.join(" "),
            self.dataset
        )
    }

    // A clustering result without a centroid carries no information
    fn is_well_formed(&self) -> bool {
        !self.centroid.is_empty() && self.centroid.iter().all(|c| c.is_finite())
    }
}

/// A transaction known only by its serialized form, e.g. one received from a peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadTransaction(String);

impl PayloadTransaction {
    pub fn new(payload: &str) -> PayloadTransaction {
        PayloadTransaction(payload.to_string())
    }
}

impl Transaction for PayloadTransaction {
    fn serialize(&self) -> String {
        self.0.clone()
    }

    fn is_well_formed(&self) -> bool {
        !self.0.trim().is_empty()
    }
}
