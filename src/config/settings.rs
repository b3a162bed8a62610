use crate::core::MAX_DIFFICULTY;
use crate::error::{BlockchainError, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

pub static GLOBAL_CONFIG: Lazy<Config> = Lazy::new(Config::new);

static DEFAULT_NODE_ADDR: &str = "127.0.0.1:2001";
static DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_DIFFICULTY: u32 = 8;

const NODE_ADDRESS_KEY: &str = "NODE_ADDRESS";
const DATA_DIR_KEY: &str = "DATA_DIR";
const DIFFICULTY_KEY: &str = "DIFFICULTY";
const STORE_BACKEND_KEY: &str = "STORE_BACKEND";
const MINE_THRESHOLD_KEY: &str = "MINE_THRESHOLD";
const RPC_TIMEOUT_KEY: &str = "RPC_TIMEOUT_MS";

const ALL_KEYS: [&str; 6] = [
    NODE_ADDRESS_KEY,
    DATA_DIR_KEY,
    DIFFICULTY_KEY,
    STORE_BACKEND_KEY,
    MINE_THRESHOLD_KEY,
    RPC_TIMEOUT_KEY,
];

/// Where block records live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Json,
    Sled,
}

impl StoreBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreBackend::Json => "json",
            StoreBackend::Sled => "sled",
        }
    }
}

impl FromStr for StoreBackend {
    type Err = BlockchainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "json" => Ok(StoreBackend::Json),
            "sled" => Ok(StoreBackend::Sled),
            _ => Err(BlockchainError::Config(format!(
                "Invalid store backend: {s}. Valid options: json, sled"
            ))),
        }
    }
}

/// Node settings, seeded from the environment and overridable at runtime.
/// Values are kept as raw strings and parsed on read so a bad value surfaces
/// as a configuration error where it is used.
pub struct Config {
    inner: RwLock<HashMap<String, String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Config {
        let mut map = HashMap::new();
        for key in ALL_KEYS {
            if let Ok(value) = env::var(key) {
                map.insert(String::from(key), value);
            }
        }
        Config {
            inner: RwLock::new(map),
        }
    }

    /// A config that ignores the environment
    pub fn empty() -> Config {
        Config {
            inner: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    fn set(&self, key: &str, value: String) {
        self.write().insert(String::from(key), value);
    }

    fn parse<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
                BlockchainError::Config(format!("Invalid value for {key}: {raw}"))
            }),
        }
    }

    pub fn get_node_addr(&self) -> String {
        self.get(NODE_ADDRESS_KEY)
            .unwrap_or_else(|| String::from(DEFAULT_NODE_ADDR))
    }

    pub fn set_node_addr(&self, addr: String) {
        self.set(NODE_ADDRESS_KEY, addr);
    }

    pub fn get_data_dir(&self) -> PathBuf {
        PathBuf::from(
            self.get(DATA_DIR_KEY)
                .unwrap_or_else(|| String::from(DEFAULT_DATA_DIR)),
        )
    }

    pub fn set_data_dir(&self, dir: String) {
        self.set(DATA_DIR_KEY, dir);
    }

    pub fn get_difficulty(&self) -> Result<u32> {
        let difficulty = self
            .parse::<u32>(DIFFICULTY_KEY)?
            .unwrap_or(DEFAULT_DIFFICULTY);
        if difficulty > MAX_DIFFICULTY {
            return Err(BlockchainError::Config(format!(
                "Difficulty {difficulty} exceeds the maximum of {MAX_DIFFICULTY}"
            )));
        }
        Ok(difficulty)
    }

    pub fn set_difficulty(&self, difficulty: u32) {
        self.set(DIFFICULTY_KEY, difficulty.to_string());
    }

    pub fn get_store_backend(&self) -> Result<StoreBackend> {
        Ok(self
            .parse::<String>(STORE_BACKEND_KEY)?
            .map(|raw| raw.parse::<StoreBackend>())
            .transpose()?
            .unwrap_or(StoreBackend::Json))
    }

    pub fn set_store_backend(&self, backend: StoreBackend) {
        self.set(STORE_BACKEND_KEY, backend.as_str().to_string());
    }

    pub fn get_mine_threshold(&self) -> Result<Option<usize>> {
        match self.parse::<usize>(MINE_THRESHOLD_KEY)? {
            Some(0) => Err(BlockchainError::Config(format!(
                "{MINE_THRESHOLD_KEY} must be at least 1"
            ))),
            other => Ok(other),
        }
    }

    pub fn set_mine_threshold(&self, threshold: usize) {
        self.set(MINE_THRESHOLD_KEY, threshold.to_string());
    }

    pub fn get_rpc_timeout(&self) -> Result<Option<Duration>> {
        Ok(self
            .parse::<u64>(RPC_TIMEOUT_KEY)?
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis))
    }

    /// Extract node ID from address (e.g., "127.0.0.1:2001" -> "2001")
    pub fn extract_node_id_from_addr(&self) -> String {
        let addr = self.get_node_addr();
        match addr.rsplit_once(':') {
            Some((_, port)) => port.to_string(),
            None => "default".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::empty();
        assert_eq!(config.get_node_addr(), DEFAULT_NODE_ADDR);
        assert_eq!(config.get_data_dir(), PathBuf::from(DEFAULT_DATA_DIR));
        assert_eq!(config.get_difficulty().unwrap(), DEFAULT_DIFFICULTY);
        assert_eq!(config.get_store_backend().unwrap(), StoreBackend::Json);
        assert_eq!(config.get_mine_threshold().unwrap(), None);
        assert_eq!(config.get_rpc_timeout().unwrap(), None);
    }

    #[test]
    fn test_overrides() {
        let config = Config::empty();
        config.set_node_addr("0.0.0.0:3005".to_string());
        config.set_difficulty(12);
        config.set(STORE_BACKEND_KEY, "SLED".to_string());
        config.set_mine_threshold(3);
        config.set(RPC_TIMEOUT_KEY, "250".to_string());

        assert_eq!(config.extract_node_id_from_addr(), "3005");
        assert_eq!(config.get_difficulty().unwrap(), 12);
        assert_eq!(config.get_store_backend().unwrap(), StoreBackend::Sled);
        assert_eq!(config.get_mine_threshold().unwrap(), Some(3));
        assert_eq!(
            config.get_rpc_timeout().unwrap(),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let config = Config::empty();
        config.set(DIFFICULTY_KEY, "eight".to_string());
        assert!(matches!(
            config.get_difficulty(),
            Err(BlockchainError::Config(_))
        ));

        config.set_difficulty(MAX_DIFFICULTY + 1);
        assert!(matches!(
            config.get_difficulty(),
            Err(BlockchainError::Config(_))
        ));

        config.set(STORE_BACKEND_KEY, "postgres".to_string());
        assert!(config.get_store_backend().is_err());

        config.set_mine_threshold(0);
        assert!(config.get_mine_threshold().is_err());
    }
}
