//! # Node Configuration
//!
//! Storage, Electrum and sync settings for the node.
//!
//! Defaults come first; `ZETA_*` environment variables override them.

use std::path::PathBuf;
use std::str::FromStr;

use zeta_header_sync::{HeaderSyncConfig, Network, QuorumSettings};

/// Complete node configuration.
#[derive(Debug, Clone, Default)]
pub struct NodeConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Electrum configuration.
    pub electrum: ElectrumConfig,
    /// Header sync configuration.
    pub sync: HeaderSyncConfig,
}

impl NodeConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, usually the process environment.
    ///
    /// Changing the network without naming servers also switches to that
    /// network's default servers.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup("ZETA_DB_PATH") {
            self.storage.data_dir = PathBuf::from(path);
        }
        if let Some(name) = lookup("ZETA_DB_NAME") {
            self.storage.db_name = name;
        }
        if let Some(network) = lookup("ZETA_NETWORK") {
            self.sync.network =
                Network::from_str(&network).map_err(ConfigError::InvalidValue)?;
            self.electrum.servers = default_servers(self.sync.network);
        }
        if let Some(servers) = lookup("ZETA_ELECTRUM_SERVERS") {
            self.electrum.servers = servers
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(backend) = lookup("ZETA_STORAGE_BACKEND") {
            self.storage.backend = StorageBackend::from_str(&backend)?;
        }
        Ok(())
    }

    /// Path of the header store for the configured network.
    pub fn store_path(&self) -> PathBuf {
        self.storage.data_dir.join(format!(
            "{}_{}.db",
            self.storage.db_name,
            self.sync.network.chain_name()
        ))
    }

    /// Reject settings the node cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.electrum.servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.electrum.fanout == 0 || self.electrum.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "electrum fanout and request timeout must be non-zero".into(),
            ));
        }
        self.sync
            .validate()
            .map_err(|e| ConfigError::InvalidValue(e.to_string()))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An override could not be parsed.
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    /// No Electrum servers to connect to.
    #[error("no Electrum servers configured; set ZETA_ELECTRUM_SERVERS")]
    NoServers,
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    /// Single-file snapshot store.
    #[default]
    File,
    /// RocksDB (requires the `rocksdb` feature).
    RocksDb,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "rocksdb" => Ok(StorageBackend::RocksDb),
            other => Err(ConfigError::InvalidValue(format!(
                "unknown storage backend: {}",
                other
            ))),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the header store.
    pub data_dir: PathBuf,
    /// Store name prefix.
    pub db_name: String,
    /// Backend.
    pub backend: StorageBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let root = std::env::var_os("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_dir: root.join(".summa").join("zeta"),
            db_name: "zeta".to_string(),
            backend: StorageBackend::File,
        }
    }
}

/// Electrum configuration.
#[derive(Debug, Clone)]
pub struct ElectrumConfig {
    /// Servers as `host:port` (plain TCP).
    pub servers: Vec<String>,
    /// Servers asked per request.
    pub fanout: usize,
    /// Servers that must deliver a tip before it is accepted.
    pub min_agreement: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Seconds between keepalive pings.
    pub ping_interval_secs: u64,
    /// User agent sent with `server.version`.
    pub user_agent: String,
}

impl Default for ElectrumConfig {
    fn default() -> Self {
        Self {
            servers: default_servers(Network::Mainnet),
            fanout: 2,
            min_agreement: 2,
            request_timeout_secs: 5,
            ping_interval_secs: 100,
            user_agent: format!("zeta/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ElectrumConfig {
    /// Quorum settings for the merged source.
    pub fn quorum(&self, buffer: usize) -> QuorumSettings {
        QuorumSettings {
            fanout: self.fanout,
            min_agreement: self.min_agreement,
            request_timeout_secs: self.request_timeout_secs,
            buffer,
        }
    }
}

/// Public plain-TCP servers for `network`.
pub fn default_servers(network: Network) -> Vec<String> {
    let servers: &[&str] = match network {
        Network::Mainnet => &[
            "electrum.blockstream.info:50001",
            "bitcoin.aranguren.org:50001",
            "electrum.emzy.de:50001",
        ],
        Network::Testnet => &["electrum.blockstream.info:60001"],
        Network::Regtest => &["127.0.0.1:50001"],
    };
    servers.iter().map(|s| s.to_string()).collect()
}
