// Entry point for the cluster-chain node and its maintenance commands
use clap::Parser;
use cluster_chain::network::{call, connect_peer, Gossip, PeerRegistry, Server, HANDLE_TRANSACTION};
use cluster_chain::{
    open_store, ClusterTransaction, Command, ConsensusCoordinator, Ledger, MemoryPool, NodeRpc,
    Opt, PayloadTransaction, SharedTransaction, StoreBackend, Transaction, GLOBAL_CONFIG,
};
use log::{error, info, warn, LevelFilter};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

fn main() {
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    // Anything that escapes a command is fatal: log it and exit non-zero
    if let Err(e) = run_command(opt.command) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn apply_overrides(
    data_dir: Option<PathBuf>,
    difficulty: Option<u32>,
    store: Option<StoreBackend>,
) {
    if let Some(dir) = data_dir {
        GLOBAL_CONFIG.set_data_dir(dir.to_string_lossy().into_owned());
    }
    if let Some(difficulty) = difficulty {
        GLOBAL_CONFIG.set_difficulty(difficulty);
    }
    if let Some(store) = store {
        GLOBAL_CONFIG.set_store_backend(store);
    }
}

fn open_ledger() -> cluster_chain::Result<Arc<Ledger>> {
    let data_dir = GLOBAL_CONFIG.get_data_dir();
    let backend = GLOBAL_CONFIG.get_store_backend()?;
    let difficulty = GLOBAL_CONFIG.get_difficulty()?;
    info!(
        "Opening {} ledger at {} (difficulty {difficulty})",
        backend.as_str(),
        data_dir.display()
    );
    let store = open_store(backend, &data_dir)?;
    Ok(Arc::new(Ledger::open(store, difficulty)?))
}

fn local_coordinator(ledger: Arc<Ledger>) -> ConsensusCoordinator {
    let gossip = Gossip::new(Arc::new(PeerRegistry::new()));
    ConsensusCoordinator::new(ledger, Arc::new(MemoryPool::new()), gossip)
}

fn run_command(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::StartNode {
            address,
            port,
            connect,
            peers: extra_peers,
            data_dir,
            difficulty,
            store,
            mine_threshold,
        } => {
            apply_overrides(data_dir, difficulty, store);
            if let Some(threshold) = mine_threshold {
                GLOBAL_CONFIG.set_mine_threshold(threshold);
            }
            if address.is_some() || port.is_some() {
                let current = GLOBAL_CONFIG.get_node_addr();
                let (default_host, default_port) = current
                    .rsplit_once(':')
                    .ok_or_else(|| format!("Invalid NODE_ADDRESS: {current}"))?;
                let host = address.unwrap_or_else(|| default_host.to_string());
                let port = match port {
                    Some(port) => port.to_string(),
                    None => default_port.to_string(),
                };
                GLOBAL_CONFIG.set_node_addr(format!("{host}:{port}"));
            }

            let socket_addr = GLOBAL_CONFIG.get_node_addr();
            let timeout = GLOBAL_CONFIG.get_rpc_timeout()?;
            let threshold = GLOBAL_CONFIG.get_mine_threshold()?;
            info!("Starting node {}", GLOBAL_CONFIG.extract_node_id_from_addr());

            let ledger = open_ledger()?;
            let peers = Arc::new(PeerRegistry::new());
            for peer in &extra_peers {
                peers.add_addr(peer)?;
            }
            let gossip = Gossip::new(Arc::clone(&peers)).with_timeout(timeout);
            let coordinator = Arc::new(ConsensusCoordinator::new(
                ledger,
                Arc::new(MemoryPool::new()),
                gossip,
            ));
            let rpc = Arc::new(NodeRpc::new(coordinator).with_mine_threshold(threshold));

            // Failing to bind is fatal; an unreachable bootstrap peer is not
            let server = Server::bind(&socket_addr, Arc::clone(&peers), rpc.clone())?;
            if let Some(addr) = connect {
                if let Err(e) = connect_peer(&addr, peers, rpc, timeout) {
                    warn!("Could not connect to {addr}: {e}");
                }
            }
            server.run()?;
        }
        Command::SendTx {
            peer,
            cluster_id,
            centroid,
            dataset,
        } => {
            let tx = ClusterTransaction::new(cluster_id, centroid, &dataset);
            if !tx.is_well_formed() {
                return Err(format!("Refusing to send malformed transaction: {}", tx.serialize()).into());
            }
            let timeout = GLOBAL_CONFIG.get_rpc_timeout()?;
            let reply = call(&peer, HANDLE_TRANSACTION, &tx.serialize(), timeout)?;
            println!("{reply}");
        }
        Command::Mine {
            data_dir,
            difficulty,
            store,
            transactions,
        } => {
            apply_overrides(data_dir, difficulty, store);
            let coordinator = local_coordinator(open_ledger()?);
            for payload in &transactions {
                let tx: SharedTransaction = Arc::new(PayloadTransaction::new(payload));
                if !coordinator.submit_transaction(tx) {
                    warn!("Skipping empty payload");
                }
            }
            match coordinator.mine_block()? {
                Some(mined) => println!(
                    "Mined block {} with hash {}",
                    mined.block.get_index(),
                    mined.block.get_hash()
                ),
                None => println!("Nothing to mine"),
            }
        }
        Command::PrintChain { data_dir, store } => {
            apply_overrides(data_dir, None, store);
            for block in open_ledger()?.get_blocks() {
                println!("Index: {}", block.get_index());
                println!("Timestamp: {}", block.get_timestamp());
                println!("Prev hash: {}", block.get_prev_hash());
                println!("Hash: {}", block.get_hash());
                println!("Nonce: {}", block.get_nonce());
                for tx in block.get_transactions() {
                    println!("- {tx}");
                }
                println!();
            }
        }
        Command::ValidateChain { data_dir, store } => {
            apply_overrides(data_dir, None, store);
            let ledger = open_ledger()?;
            if !ledger.is_valid() {
                return Err("Chain is invalid".into());
            }
            println!("Chain of {} blocks is valid", ledger.len());
        }
    }
    Ok(())
}
