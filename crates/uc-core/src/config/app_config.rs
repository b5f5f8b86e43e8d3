//! Application configuration domain model

use std::path::PathBuf;
use std::time::Duration;

use anyhow::ensure;
use serde::{Deserialize, Serialize};

/// Application configuration
///
/// Built by the bootstrap layer and handed to constructors. Nothing reads it
/// from a global.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub peer: PeerConfig,
    pub server: ServerConfig,
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub transfer: TransferConfig,
    pub identity: IdentityConfig,
}

/// Where the remote node listens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerConfig {
    /// Base URL of the peer's server, e.g. `http://192.168.1.20:5000`
    pub address: String,
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

/// Clipboard polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub poll_interval_ms: u64,
    /// Superseded snapshots kept for debugging
    pub history_capacity: usize,
}

/// Backoff applied by the sync engine to failed sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Sends per request, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub factor: u32,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    pub chunk_size_bytes: u32,
    /// Sends per chunk before the whole transfer is failed
    pub chunk_attempts: u32,
    /// Largest file accepted from the peer
    pub max_file_size_bytes: u64,
    /// How long finished or failed transfers stay in the ledger
    pub retention_secs: u64,
    /// Idle time after which an unfinished transfer is failed
    pub stale_secs: u64,
    pub evict_interval_secs: u64,
    /// Folder for received files. Empty means the platform download dir.
    pub shared_dir: PathBuf,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Fixed peer id. When unset a persisted UUID is used.
    pub peer_id: Option<String>,
}

impl AppConfig {
    /// Create AppConfig from TOML value
    pub fn from_toml(toml_value: &toml::Value) -> anyhow::Result<Self> {
        let config = Self::deserialize(toml_value.clone())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no loop or ledger can run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.sync.poll_interval_ms > 0, "sync.poll_interval_ms must be greater than 0");
        ensure!(
            self.transfer.evict_interval_secs > 0,
            "transfer.evict_interval_secs must be greater than 0"
        );
        ensure!(
            self.transfer.chunk_size_bytes > 0,
            "transfer.chunk_size_bytes must be greater than 0"
        );
        ensure!(self.retry.max_attempts > 0, "retry.max_attempts must be at least 1");
        ensure!(
            self.transfer.chunk_attempts > 0,
            "transfer.chunk_attempts must be at least 1"
        );
        Ok(())
    }
}

impl PeerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl SyncConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl TransferConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }

    pub fn evict_interval(&self) -> Duration {
        Duration::from_secs(self.evict_interval_secs)
    }
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            address: "http://localhost:5000".to_string(),
            request_timeout_ms: 5_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:5000".to_string(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            history_capacity: 32,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            factor: 2,
            max_delay_ms: 4_000,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_bytes: 1024 * 1024,
            chunk_attempts: 3,
            max_file_size_bytes: 2 * 1024 * 1024 * 1024,
            retention_secs: 3_600,
            stale_secs: 600,
            evict_interval_secs: 60,
            shared_dir: PathBuf::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml::Value;

    #[test]
    fn test_from_toml_fills_missing_sections_with_defaults() {
        let toml_value: Value = toml::from_str(
            r#"
            [peer]
            address = "http://10.0.0.2:5000"
        "#,
        )
        .unwrap();

        let config = AppConfig::from_toml(&toml_value).unwrap();

        assert_eq!(config.peer.address, "http://10.0.0.2:5000");
        assert_eq!(config.peer.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.retry, RetryConfig::default());
        assert_eq!(config.transfer.chunk_size_bytes, 1024 * 1024);
        assert_eq!(config.sync.poll_interval(), Duration::from_secs(2));
        assert_eq!(config.identity.peer_id, None);
    }

    #[test]
    fn test_from_toml_reads_every_section() {
        let toml_value: Value = toml::from_str(
            r#"
            [server]
            bind = "127.0.0.1:6000"

            [sync]
            poll_interval_ms = 250
            history_capacity = 4

            [retry]
            max_attempts = 5
            base_delay_ms = 100
            factor = 3
            max_delay_ms = 900

            [transfer]
            chunk_size_bytes = 4096
            chunk_attempts = 1
            max_file_size_bytes = 65536
            retention_secs = 10
            stale_secs = 30
            evict_interval_secs = 2
            shared_dir = "/tmp/shared"

            [identity]
            peer_id = "peer-a"
        "#,
        )
        .unwrap();

        let config = AppConfig::from_toml(&toml_value).unwrap();

        assert_eq!(config.server.bind, "127.0.0.1:6000");
        assert_eq!(config.sync.history_capacity, 4);
        assert_eq!(config.retry.factor, 3);
        assert_eq!(config.transfer.shared_dir, PathBuf::from("/tmp/shared"));
        assert_eq!(config.transfer.retention(), Duration::from_secs(10));
        assert_eq!(config.transfer.stale_after(), Duration::from_secs(30));
        assert_eq!(config.transfer.max_file_size_bytes, 65536);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.identity.peer_id.as_deref(), Some("peer-a"));
    }

    #[test]
    fn test_from_toml_rejects_wrong_types() {
        let toml_value: Value = toml::from_str(
            r#"
            [sync]
            poll_interval_ms = "fast"
        "#,
        )
        .unwrap();

        assert!(AppConfig::from_toml(&toml_value).is_err());
    }

    #[test]
    fn test_from_toml_rejects_zero_periods() {
        for body in [
            "[sync]\npoll_interval_ms = 0",
            "[transfer]\nevict_interval_secs = 0",
            "[transfer]\nchunk_size_bytes = 0",
            "[retry]\nmax_attempts = 0",
        ] {
            let toml_value: Value = toml::from_str(body).unwrap();
            let err = AppConfig::from_toml(&toml_value).unwrap_err();
            assert!(err.to_string().contains("must be"), "{body}: {err}");
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }
}
