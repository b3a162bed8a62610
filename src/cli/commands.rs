use crate::config::StoreBackend;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "cluster-chain")]
pub struct Opt {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "start-node", about = "Start a node and serve peers")]
    StartNode {
        #[arg(long, help = "Address to listen on (defaults to NODE_ADDRESS)")]
        address: Option<String>,
        #[arg(long, help = "Port to listen on")]
        port: Option<u16>,
        #[arg(long, help = "Peer to keep a gossip connection to (host:port)")]
        connect: Option<String>,
        #[arg(long = "peer", help = "Additional peer reached by dialing (host:port)")]
        peers: Vec<String>,
        #[arg(long = "data-dir", help = "Directory for block records")]
        data_dir: Option<PathBuf>,
        #[arg(long, help = "Leading zero bits required of a block hash")]
        difficulty: Option<u32>,
        #[arg(long, help = "Record store backend (json, sled)")]
        store: Option<StoreBackend>,
        #[arg(long = "mine-threshold", help = "Mine once this many transactions are pending")]
        mine_threshold: Option<usize>,
    },
    #[command(name = "send-tx", about = "Send a cluster transaction to a running node")]
    SendTx {
        #[arg(long, help = "Node to send to (host:port)")]
        peer: String,
        #[arg(long = "cluster-id")]
        cluster_id: i64,
        #[arg(long, value_delimiter = ',', help = "Centroid coordinates, e.g. 1.0,2.0")]
        centroid: Vec<f64>,
        #[arg(long)]
        dataset: String,
    },
    #[command(name = "mine", about = "Mine one block of payloads into the local ledger")]
    Mine {
        #[arg(long = "data-dir")]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        difficulty: Option<u32>,
        #[arg(long)]
        store: Option<StoreBackend>,
        #[arg(long = "tx", required = true, help = "Transaction payload (repeatable)")]
        transactions: Vec<String>,
    },
    #[command(name = "print-chain", about = "Print all blocks in the ledger")]
    PrintChain {
        #[arg(long = "data-dir")]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        store: Option<StoreBackend>,
    },
    #[command(name = "validate-chain", about = "Check every link and hash in the ledger")]
    ValidateChain {
        #[arg(long = "data-dir")]
        data_dir: Option<PathBuf>,
        #[arg(long)]
        store: Option<StoreBackend>,
    },
}
