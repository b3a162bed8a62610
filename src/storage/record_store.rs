// Durable key/value persistence for the ledger. The ledger only needs to store
// a record under a name, list what exists and read a record back; the two
// backends here keep one JSON file per record or a sled tree of records.

use crate::config::StoreBackend;
use crate::error::{BlockchainError, Result};
use log::debug;
use sled::Db;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const RECORD_EXTENSION: &str = "json";
const RECORDS_TREE: &str = "blocks";

pub trait RecordStore: Send + Sync {
    fn save(&self, name: &str, data: &[u8]) -> Result<()>;

    fn load(&self, name: &str) -> Result<Vec<u8>>;

    /// Names of stored records, in whatever order the backend yields them
    fn list(&self) -> Result<Vec<String>>;

    /// Remove a record; removing a missing record is not an error
    fn delete(&self, name: &str) -> Result<()>;
}

/// Open the configured backend rooted at `data_dir`
pub fn open_store(backend: StoreBackend, data_dir: &Path) -> Result<Arc<dyn RecordStore>> {
    let store: Arc<dyn RecordStore> = match backend {
        StoreBackend::Json => Arc::new(JsonFileStore::open(data_dir)?),
        StoreBackend::Sled => Arc::new(SledStore::open(data_dir)?),
    };
    Ok(store)
}

/// One `<name>.json` file per record inside a data directory
pub struct JsonFileStore {
    data_dir: PathBuf,
}

impl JsonFileStore {
    pub fn open(data_dir: &Path) -> Result<JsonFileStore> {
        fs::create_dir_all(data_dir).map_err(|e| {
            BlockchainError::Persistence(format!(
                "Failed to create data directory {}: {e}",
                data_dir.display()
            ))
        })?;
        Ok(JsonFileStore {
            data_dir: data_dir.to_path_buf(),
        })
    }

    pub fn get_data_dir(&self) -> &Path {
        self.data_dir.as_path()
    }

    fn record_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{name}.{RECORD_EXTENSION}"))
    }
}

impl RecordStore for JsonFileStore {
    fn save(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.record_path(name);
        fs::write(&path, data).map_err(|e| {
            BlockchainError::Persistence(format!("Failed to write {}: {e}", path.display()))
        })?;
        debug!("Saved record {name} to {}", path.display());
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.record_path(name);
        fs::read(&path).map_err(|e| {
            BlockchainError::Persistence(format!("Failed to read {}: {e}", path.display()))
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.data_dir).map_err(|e| {
            BlockchainError::Persistence(format!(
                "Failed to read directory {}: {e}",
                self.data_dir.display()
            ))
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|ext| ext.to_str()) != Some(RECORD_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                names.push(stem.to_string());
            }
        }
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let path = self.record_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted record {name} at {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlockchainError::Persistence(format!(
                "Failed to delete {}: {e}",
                path.display()
            ))),
        }
    }
}

/// Records kept in a tree of an embedded sled database
pub struct SledStore {
    db: Db,
}

impl SledStore {
    pub fn open(db_path: &Path) -> Result<SledStore> {
        let db = sled::open(db_path)
            .map_err(|e| BlockchainError::Persistence(format!("Failed to open database: {e}")))?;
        Ok(SledStore { db })
    }

    fn records(&self) -> Result<sled::Tree> {
        self.db
            .open_tree(RECORDS_TREE)
            .map_err(|e| BlockchainError::Persistence(format!("Failed to open records tree: {e}")))
    }
}

impl RecordStore for SledStore {
    fn save(&self, name: &str, data: &[u8]) -> Result<()> {
        let tree = self.records()?;
        tree.insert(name, data)
            .map_err(|e| BlockchainError::Persistence(format!("Failed to save {name}: {e}")))?;
        tree.flush()
            .map_err(|e| BlockchainError::Persistence(format!("Failed to flush {name}: {e}")))?;
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Vec<u8>> {
        self.records()?
            .get(name)
            .map_err(|e| BlockchainError::Persistence(format!("Failed to load {name}: {e}")))?
            .map(|value| value.to_vec())
            .ok_or_else(|| BlockchainError::Persistence(format!("Record not found: {name}")))
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for key in self.records()?.iter().keys() {
            let key = key.map_err(|e| {
                BlockchainError::Persistence(format!("Failed to iterate records: {e}"))
            })?;
            let name = String::from_utf8(key.to_vec()).map_err(|e| {
                BlockchainError::Persistence(format!("Invalid record name: {e}"))
            })?;
            names.push(name);
        }
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<()> {
        let tree = self.records()?;
        tree.remove(name)
            .map_err(|e| BlockchainError::Persistence(format!("Failed to delete {name}: {e}")))?;
        tree.flush()
            .map_err(|e| BlockchainError::Persistence(format!("Failed to flush {name}: {e}")))?;
        Ok(())
    }
}
