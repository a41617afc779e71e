use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tangle_message::{PowConfig, MAX_DIFFICULTY};
use tangle_types::{DerivationPath, HRP_MAINNET};
use tangle_wallet::{ScanOptions, DEFAULT_BATCH_SIZE, DEFAULT_GAP_LIMIT};

use crate::error::{ClientError, ClientResult};

/// Client configuration. Immutable once a client is built.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Node base URLs, tried in order.
    pub nodes: Vec<String>,
    /// Per-request timeout in milliseconds.
    pub request_timeout_ms: u64,
    /// Upper bound on one whole send, proof of work included.
    pub send_timeout_ms: u64,
    pub gap_limit: u32,
    pub scan_batch_size: u32,
    /// Nodes asked for balance and output queries.
    pub quorum_size: usize,
    /// Percentage of asked nodes that must agree.
    pub quorum_threshold: u8,
    /// Seal messages locally; otherwise the node does the proof of work.
    pub local_pow: bool,
    pub pow_difficulty: u32,
    /// Dedicated proof-of-work threads, 0 for the global rayon pool.
    pub pow_workers: usize,
    pub pow_max_attempts: u64,
    pub bech32_hrp: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            nodes: vec!["http://localhost:14265".into()],
            request_timeout_ms: 30_000,
            send_timeout_ms: 120_000,
            gap_limit: DEFAULT_GAP_LIMIT,
            scan_batch_size: DEFAULT_BATCH_SIZE,
            quorum_size: 1,
            quorum_threshold: tangle_node::DEFAULT_QUORUM_THRESHOLD,
            local_pow: true,
            pow_difficulty: 14,
            pow_workers: 0,
            pow_max_attempts: 1 << 32,
            bech32_hrp: HRP_MAINNET.into(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_str(s: &str) -> ClientResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| ClientError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> ClientResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> ClientResult<()> {
        let fail = |msg: &str| Err(ClientError::Config(msg.into()));
        if self.request_timeout_ms == 0 || self.send_timeout_ms == 0 {
            return fail("timeouts must be positive");
        }
        if self.gap_limit == 0 {
            return fail("gap_limit must be at least 1");
        }
        if self.scan_batch_size == 0 {
            return fail("scan_batch_size must be at least 1");
        }
        if self.quorum_size == 0 {
            return fail("quorum_size must be at least 1");
        }
        if !(1..=100).contains(&self.quorum_threshold) {
            return fail("quorum_threshold must be within 1..=100");
        }
        if self.pow_difficulty > MAX_DIFFICULTY {
            return Err(ClientError::Config(format!(
                "pow_difficulty {} exceeds {MAX_DIFFICULTY}",
                self.pow_difficulty
            )));
        }
        if self.bech32_hrp.is_empty() {
            return fail("bech32_hrp must not be empty");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn pow_config(&self) -> PowConfig {
        PowConfig::default()
            .with_difficulty(self.pow_difficulty)
            .with_workers(self.pow_workers)
            .with_max_attempts(self.pow_max_attempts)
            .with_timeout(self.send_timeout())
    }

    /// Scan settings for an account starting at `start_index`.
    pub fn scan_options(&self, account: &DerivationPath, start_index: u32) -> ScanOptions {
        ScanOptions::new(account.clone())
            .with_start_index(start_index)
            .with_gap_limit(self.gap_limit)
            .with_batch_size(self.scan_batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.nodes, vec!["http://localhost:14265".to_string()]);
        assert_eq!(config.gap_limit, 20);
        assert_eq!(config.scan_batch_size, 10);
        assert!(config.local_pow);
        assert_eq!(config.bech32_hrp, "iot");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            nodes = ["http://node-a:14265", "http://node-b:14265"]
            quorum_size = 2
            local_pow = false
            "#,
        )
        .unwrap();
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.quorum_size, 2);
        assert!(!config.local_pow);
        assert_eq!(config.gap_limit, DEFAULT_GAP_LIMIT);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ClientConfig::from_toml_str("gap_limit = 0"),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("quorum_threshold = 101"),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("pow_difficulty = 300"),
            Err(ClientError::Config(_))
        ));
        assert!(matches!(
            ClientConfig::from_toml_str("nodes = 3"),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "gap_limit = 5\npow_difficulty = 4\nbech32_hrp = \"atoi\"").unwrap();

        let config = ClientConfig::from_file(file.path()).unwrap();
        assert_eq!(config.gap_limit, 5);
        assert_eq!(config.pow_config().difficulty, 4);
        assert_eq!(config.bech32_hrp, "atoi");
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClientConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ClientError::Config(msg) if msg.contains("absent.toml")));
    }

    #[test]
    fn scan_options_follow_config() {
        let config = ClientConfig {
            gap_limit: 3,
            scan_batch_size: 2,
            ..Default::default()
        };
        let account: DerivationPath = "m/0'".parse().unwrap();
        let options = config.scan_options(&account, 7);
        assert_eq!(options.account, account);
        assert_eq!(options.start_index, 7);
        assert_eq!(options.gap_limit, 3);
        assert_eq!(options.batch_size, 2);
    }
}
