// The ledger is the node's local copy of the hash-linked chain. All reads and
// appends go through one mutex so a reader never sees a half-appended block;
// every appended block is written to the record store before the call returns.

use crate::core::block::BLOCK_RECORD_PREFIX;
use crate::core::proof_of_work::MAX_DIFFICULTY;
use crate::core::{Block, SharedTransaction};
use crate::error::{BlockchainError, Result};
use crate::storage::RecordStore;
use log::{error, info, warn};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

pub struct Ledger {
    blocks: Mutex<Vec<Block>>,
    difficulty: AtomicU32,
    store: Arc<dyn RecordStore>,
}

impl Ledger {
    /// Load the persisted chain, or start a fresh one from genesis when the
    /// store is empty or unreadable
    pub fn open(store: Arc<dyn RecordStore>, difficulty: u32) -> Result<Ledger> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "Difficulty {difficulty} exceeds {MAX_DIFFICULTY} bits"
            )));
        }

        let blocks = match Self::load_blocks(store.as_ref()) {
            Ok(blocks) if !blocks.is_empty() => {
                info!("Loaded {} blocks from store", blocks.len());
                blocks
            }
            Ok(_) => {
                info!("No persisted blocks found, creating genesis block");
                Self::init_genesis(store.as_ref())?
            }
            Err(e) => {
                error!("Failed to load persisted chain, falling back to genesis: {e}");
                // Leftover records would otherwise be picked up again on the
                // next start, mixed with blocks mined after the fallback
                Self::discard_block_records(store.as_ref())?;
                Self::init_genesis(store.as_ref())?
            }
        };

        Ok(Ledger {
            blocks: Mutex::new(blocks),
            difficulty: AtomicU32::new(difficulty),
            store,
        })
    }

    fn init_genesis(store: &dyn RecordStore) -> Result<Vec<Block>> {
        let genesis = Block::generate_genesis_block();
        // Without a durable genesis there is no ledger to serve
        Self::persist(store, &genesis)?;
        Ok(vec![genesis])
    }

    fn is_block_record(name: &str) -> bool {
        name.strip_prefix(BLOCK_RECORD_PREFIX)
            .map(|suffix| suffix.parse::<u64>().is_ok())
            .unwrap_or(false)
    }

    fn discard_block_records(store: &dyn RecordStore) -> Result<()> {
        let stale: Vec<String> = store
            .list()?
            .into_iter()
            .filter(|name| Self::is_block_record(name))
            .collect();
        for name in &stale {
            store.delete(name)?;
        }
        warn!("Discarded {} unusable block records", stale.len());
        Ok(())
    }

    /// Read every `block_<n>` record and order the result by index. The store's
    /// listing order carries no meaning.
    fn load_blocks(store: &dyn RecordStore) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        for name in store.list()? {
            if !Self::is_block_record(&name) {
                continue;
            }

            let bytes = store.load(&name)?;
            let data = String::from_utf8(bytes).map_err(|e| {
                BlockchainError::Persistence(format!("Record {name} is not UTF-8: {e}"))
            })?;
            blocks.push(Block::from_json(&data)?);
        }

        blocks.sort_by_key(|b| b.get_index());

        for (position, block) in blocks.iter().enumerate() {
            if block.get_index() != position as u64 {
                return Err(BlockchainError::Persistence(format!(
                    "Expected block {position} but found block {}",
                    block.get_index()
                )));
            }
        }
        Ok(blocks)
    }

    fn persist(store: &dyn RecordStore, block: &Block) -> Result<()> {
        let data = block.to_json()?;
        store.save(&block.record_name(), data.as_bytes())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Block>> {
        // Appends push a fully built block, so the Vec is consistent even if a
        // holder panicked
        self.blocks.lock().unwrap_or_else(|poisoned| {
            error!("Ledger lock was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn tip_of(blocks: &[Block]) -> Result<&Block> {
        blocks
            .last()
            .ok_or_else(|| BlockchainError::Persistence("Ledger has no blocks".to_string()))
    }

    /// Mine a block holding `transactions` on top of the tip and append it.
    /// The ledger stays locked for the whole proof-of-work search.
    pub fn add_block(&self, transactions: &[SharedTransaction]) -> Result<Block> {
        let mut blocks = self.lock();
        let tip = Self::tip_of(&blocks)?;
        let mut block = Block::new_candidate(tip.get_index() + 1, transactions, tip.get_hash())?;
        block.mine(self.difficulty())?;

        blocks.push(block.clone());
        self.persist_appended(&block);
        info!(
            "Appended mined block {} ({} transactions): {}",
            block.get_index(),
            block.get_transactions().len(),
            block.get_hash()
        );
        Ok(block)
    }

    /// Append a block that was already solved elsewhere. Proof-of-work is the
    /// caller's responsibility; linkage and index are re-checked here because
    /// the tip may have moved since the caller validated.
    pub fn append_foreign_block(&self, block: Block) -> Result<()> {
        let mut blocks = self.lock();
        let tip = Self::tip_of(&blocks)?;

        if block.get_prev_hash() != tip.get_hash() {
            return Err(BlockchainError::Validation(format!(
                "Block {} does not extend tip {}",
                block.get_index(),
                tip.get_hash()
            )));
        }
        if block.get_index() != tip.get_index() + 1 {
            return Err(BlockchainError::Validation(format!(
                "Block index {} does not follow tip index {}",
                block.get_index(),
                tip.get_index()
            )));
        }

        blocks.push(block.clone());
        self.persist_appended(&block);
        info!("Appended foreign block {}: {}", block.get_index(), block.get_hash());
        Ok(())
    }

    // The in-memory chain has already advanced; a failed write only costs
    // durability, which is reported but not rolled back.
    fn persist_appended(&self, block: &Block) {
        if let Err(e) = Self::persist(self.store.as_ref(), block) {
            error!(
                "Block {} is held in memory only, failed to persist: {e}",
                block.get_index()
            );
        }
    }

    pub fn get_blocks(&self) -> Vec<Block> {
        self.lock().clone()
    }

    pub fn tip(&self) -> Result<Block> {
        Self::tip_of(&self.lock()).cloned()
    }

    pub fn height(&self) -> u64 {
        self.lock().last().map(|b| b.get_index()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty.load(Ordering::SeqCst)
    }

    /// Difficulty only ever moves up
    pub fn raise_difficulty(&self, difficulty: u32) -> Result<u32> {
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Validation(format!(
                "Difficulty {difficulty} exceeds {MAX_DIFFICULTY} bits"
            )));
        }
        let previous = self.difficulty.fetch_max(difficulty, Ordering::SeqCst);
        if difficulty < previous {
            warn!("Refusing to lower difficulty from {previous} to {difficulty}");
            return Err(BlockchainError::Validation(format!(
                "Difficulty cannot decrease from {previous} to {difficulty}"
            )));
        }
        Ok(difficulty)
    }

    /// Check every block's stored hash against its content and its link to the
    /// previous block
    pub fn is_valid(&self) -> bool {
        let blocks = self.lock();
        for i in 1..blocks.len() {
            let current = &blocks[i];
            let previous = &blocks[i - 1];

            if !current.has_consistent_hash() {
                warn!("Block {} hash does not match its content", current.get_index());
                return false;
            }
            if current.get_prev_hash() != previous.get_hash() {
                warn!("Block {} is not linked to its predecessor", current.get_index());
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PayloadTransaction, ProofOfWork};
    use crate::storage::JsonFileStore;
    use std::thread;
    use tempfile::{tempdir, TempDir};

    fn txs(items: &[&str]) -> Vec<SharedTransaction> {
        items
            .iter()
            .map(|p| Arc::new(PayloadTransaction::new(p)) as SharedTransaction)
            .collect()
    }

    fn open_ledger(difficulty: u32) -> (Ledger, TempDir) {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        (Ledger::open(store, difficulty).unwrap(), temp_dir)
    }

    /// Store that yields names in reverse and can be told to fail writes
    struct ReversedStore {
        inner: JsonFileStore,
        fail_writes: bool,
    }

    impl RecordStore for ReversedStore {
        fn save(&self, name: &str, data: &[u8]) -> Result<()> {
            if self.fail_writes {
                return Err(BlockchainError::Persistence("disk full".to_string()));
            }
            self.inner.save(name, data)
        }

        fn load(&self, name: &str) -> Result<Vec<u8>> {
            self.inner.load(name)
        }

        fn list(&self) -> Result<Vec<String>> {
            let mut names = self.inner.list()?;
            names.sort();
            names.reverse();
            Ok(names)
        }

        fn delete(&self, name: &str) -> Result<()> {
            if self.fail_writes {
                return Err(BlockchainError::Persistence("disk full".to_string()));
            }
            self.inner.delete(name)
        }
    }

    #[test]
    fn test_open_empty_store_creates_genesis() {
        let (ledger, temp_dir) = open_ledger(2);
        let blocks = ledger.get_blocks();

        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].get_index(), 0);
        assert_eq!(blocks[0].get_prev_hash(), "");
        assert!(ledger.is_valid());
        assert!(temp_dir.path().join("block_0.json").exists());
    }

    #[test]
    fn test_add_block_links_to_genesis() {
        let (ledger, _temp_dir) = open_ledger(2);
        let genesis = ledger.tip().unwrap();

        let block = ledger.add_block(&txs(&["tx1"])).unwrap();

        assert_eq!(block.get_index(), 1);
        assert_eq!(block.get_prev_hash(), genesis.get_hash());
        assert!(ProofOfWork::validate(&block.header_bytes(), block.get_nonce(), 2));
        assert_eq!(block.get_hash(), block.calculate_hash());
        assert!(ledger.is_valid());
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn test_valid_after_every_add() {
        let (ledger, _temp_dir) = open_ledger(4);
        for i in 0..5 {
            ledger.add_block(&txs(&[&format!("tx{i}")])).unwrap();
            assert!(ledger.is_valid());
        }
        assert_eq!(ledger.len(), 6);
    }

    #[test]
    fn test_reload_reproduces_chain() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        let ledger = Ledger::open(store.clone(), 3).unwrap();
        ledger.add_block(&txs(&["Transaction 1", "Transaction 2"])).unwrap();
        ledger.add_block(&txs(&["Transaction 3", "Transaction 4"])).unwrap();
        let original = ledger.get_blocks();

        let reloaded = Ledger::open(store, 3).unwrap();
        assert_eq!(reloaded.get_blocks(), original);
        assert_eq!(reloaded.get_blocks()[1].get_transactions()[0], "Transaction 1");
        assert!(reloaded.is_valid());
    }

    #[test]
    fn test_load_sorts_by_index() {
        let temp_dir = tempdir().unwrap();
        let writer = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        let ledger = Ledger::open(writer, 1).unwrap();
        for i in 0..11 {
            ledger.add_block(&txs(&[&format!("tx{i}")])).unwrap();
        }

        // Reverse lexical order puts block_9 before block_10 before block_1
        let reader = Arc::new(ReversedStore {
            inner: JsonFileStore::open(temp_dir.path()).unwrap(),
            fail_writes: false,
        });
        let reloaded = Ledger::open(reader, 1).unwrap();
        let indices: Vec<u64> = reloaded.get_blocks().iter().map(|b| b.get_index()).collect();
        assert_eq!(indices, (0..=11).collect::<Vec<u64>>());
        assert!(reloaded.is_valid());
    }

    #[test]
    fn test_tampered_hash_detected_after_reload() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        let ledger = Ledger::open(store.clone(), 2).unwrap();
        ledger.add_block(&txs(&["tx1"])).unwrap();
        ledger.add_block(&txs(&["tx2"])).unwrap();

        let record = store.load("block_1").unwrap();
        let mut block = Block::from_json(&String::from_utf8(record).unwrap()).unwrap();
        let mut hash: Vec<char> = block.get_hash().chars().collect();
        let last = hash.len() - 1;
        hash[last] = if hash[last] == '0' { '1' } else { '0' };
        block.set_hash_for_test(&hash.into_iter().collect::<String>());
        store.save("block_1", block.to_json().unwrap().as_bytes()).unwrap();

        let reloaded = Ledger::open(store, 2).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert!(!reloaded.is_valid());
    }

    #[test]
    fn test_gap_in_records_falls_back_to_genesis() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        let ledger = Ledger::open(store.clone(), 1).unwrap();
        ledger.add_block(&txs(&["tx1"])).unwrap();
        ledger.add_block(&txs(&["tx2"])).unwrap();
        std::fs::remove_file(temp_dir.path().join("block_1.json")).unwrap();

        let reloaded = Ledger::open(store, 1).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.tip().unwrap(), Block::generate_genesis_block());
    }

    #[test]
    fn test_fallback_survives_restart() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        let ledger = Ledger::open(store.clone(), 1).unwrap();
        for i in 1..=3 {
            ledger.add_block(&txs(&[&format!("old{i}")])).unwrap();
        }
        std::fs::remove_file(temp_dir.path().join("block_1.json")).unwrap();
        std::fs::write(temp_dir.path().join("notes.json"), b"{}").unwrap();

        let fallback = Ledger::open(store.clone(), 1).unwrap();
        assert_eq!(fallback.len(), 1);
        assert!(!temp_dir.path().join("block_2.json").exists());
        assert!(!temp_dir.path().join("block_3.json").exists());
        assert!(temp_dir.path().join("notes.json").exists());
        let new1 = fallback.add_block(&txs(&["new1"])).unwrap();

        let restarted = Ledger::open(store, 1).unwrap();
        assert_eq!(restarted.len(), 2);
        assert_eq!(restarted.tip().unwrap(), new1);
        assert!(restarted.is_valid());
    }

    #[test]
    fn test_persist_failure_keeps_block_in_memory() {
        let temp_dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::open(temp_dir.path()).unwrap());
        Ledger::open(store, 1).unwrap();

        let failing = Arc::new(ReversedStore {
            inner: JsonFileStore::open(temp_dir.path()).unwrap(),
            fail_writes: true,
        });
        let ledger = Ledger::open(failing, 1).unwrap();
        let block = ledger.add_block(&txs(&["tx1"])).unwrap();

        assert_eq!(ledger.tip().unwrap(), block);
        assert!(!temp_dir.path().join("block_1.json").exists());
    }

    #[test]
    fn test_unwritable_genesis_is_fatal() {
        let temp_dir = tempdir().unwrap();
        let failing = Arc::new(ReversedStore {
            inner: JsonFileStore::open(temp_dir.path()).unwrap(),
            fail_writes: true,
        });
        assert!(Ledger::open(failing, 1).is_err());
    }

    #[test]
    fn test_append_foreign_block_checks_linkage() {
        let (ledger, _temp_dir) = open_ledger(1);
        let genesis = ledger.tip().unwrap();

        let mut good = Block::new_candidate(1, &txs(&["remote"]), genesis.get_hash()).unwrap();
        good.mine(1).unwrap();
        let mut orphan = Block::new_candidate(1, &txs(&["remote"]), "elsewhere").unwrap();
        orphan.mine(1).unwrap();

        assert!(matches!(
            ledger.append_foreign_block(orphan),
            Err(BlockchainError::Validation(_))
        ));
        ledger.append_foreign_block(good.clone()).unwrap();
        assert_eq!(ledger.tip().unwrap(), good);
        assert!(ledger.append_foreign_block(good).is_err());
        assert!(ledger.is_valid());
    }

    #[test]
    fn test_difficulty_is_monotonic() {
        let (ledger, _temp_dir) = open_ledger(2);
        assert_eq!(ledger.raise_difficulty(4).unwrap(), 4);
        assert!(ledger.raise_difficulty(3).is_err());
        assert_eq!(ledger.difficulty(), 4);
        assert!(ledger.raise_difficulty(MAX_DIFFICULTY + 1).is_err());
    }

    #[test]
    fn test_concurrent_appends_stay_linked() {
        let (ledger, _temp_dir) = open_ledger(2);
        let ledger = Arc::new(ledger);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let ledger = Arc::clone(&ledger);
                thread::spawn(move || {
                    for j in 0..3 {
                        ledger.add_block(&txs(&[&format!("{i}-{j}")])).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let blocks = ledger.get_blocks();
        assert_eq!(blocks.len(), 13);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.get_index(), i as u64);
        }
        assert!(ledger.is_valid());
    }
}
