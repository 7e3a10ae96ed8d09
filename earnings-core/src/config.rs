//! Configuration for the earnings ledger

use crate::types::{Money, ReviewDepth};
use crate::withdrawal::RefundPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// RocksDB configuration
    pub rocksdb: RocksDBConfig,

    /// Writer actor configuration
    pub actor: ActorConfig,

    /// Submission review configuration
    pub review: ReviewConfig,

    /// Withdrawal rules
    pub withdrawal: WithdrawalConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/earnings"),
            service_name: "earnings-core".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            rocksdb: RocksDBConfig::default(),
            actor: ActorConfig::default(),
            review: ReviewConfig::default(),
            withdrawal: WithdrawalConfig::default(),
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RocksDBConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDBConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 3,
            max_background_jobs: 2,
            enable_statistics: false,
        }
    }
}

/// Writer actor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorConfig {
    /// Number of single-writer shards; one user always maps to the same shard
    pub shards: usize,

    /// Bounded mailbox size per shard (backpressure)
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            shards: 8,
            mailbox_capacity: 1000,
        }
    }
}

/// Submission review configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Single- or two-stage review
    pub depth: ReviewDepth,
}

/// Withdrawal rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WithdrawalConfig {
    /// Smallest payout accepted
    pub min_withdrawal: Money,

    /// Accepted payout method ids
    pub methods: Vec<String>,

    /// Account references must be strictly longer than this (after trimming)
    pub min_account_ref_len: usize,

    /// Refuse withdrawals above the available balance
    pub enforce_available_funds: bool,

    /// What happens to debited funds when a withdrawal is rejected
    pub refund_policy: RefundPolicy,
}

impl Default for WithdrawalConfig {
    fn default() -> Self {
        Self {
            min_withdrawal: Money::from(20),
            methods: vec![
                "bKash".to_string(),
                "Nagad".to_string(),
                "Rocket".to_string(),
                "Binance".to_string(),
            ],
            min_account_ref_len: 5,
            enforce_available_funds: true,
            refund_policy: RefundPolicy::default(),
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("EARNINGS_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(depth) = std::env::var("EARNINGS_REVIEW_DEPTH") {
            config.review.depth = ReviewDepth::parse(&depth).ok_or_else(|| {
                crate::Error::Config(format!("Unknown review depth: {}", depth))
            })?;
        }

        if let Ok(min) = std::env::var("EARNINGS_MIN_WITHDRAWAL") {
            config.withdrawal.min_withdrawal = min.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid minimum withdrawal {}: {}", min, e))
            })?;
        }

        if let Ok(policy) = std::env::var("EARNINGS_REFUND_POLICY") {
            config.withdrawal.refund_policy = RefundPolicy::parse(&policy).ok_or_else(|| {
                crate::Error::Config(format!("Unknown refund policy: {}", policy))
            })?;
        }

        if let Ok(shards) = std::env::var("EARNINGS_SHARDS") {
            config.actor.shards = shards.parse().map_err(|e| {
                crate::Error::Config(format!("Invalid shard count {}: {}", shards, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the ledger cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.actor.shards == 0 {
            return Err(crate::Error::Config("actor.shards must be at least 1".into()));
        }
        if self.actor.mailbox_capacity == 0 {
            return Err(crate::Error::Config(
                "actor.mailbox_capacity must be at least 1".into(),
            ));
        }
        if self.withdrawal.min_withdrawal < Money::ZERO {
            return Err(crate::Error::Config(
                "withdrawal.min_withdrawal must not be negative".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "earnings-core");
        assert_eq!(config.review.depth, ReviewDepth::Staged);
        assert_eq!(config.withdrawal.min_withdrawal, Money::from(20));
        assert_eq!(config.withdrawal.refund_policy, RefundPolicy::Retain);
        assert!(config.withdrawal.enforce_available_funds);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/tmp/earnings"

            [review]
            depth = "direct"

            [withdrawal]
            min_withdrawal = "50"
            refund_policy = "refund_on_reject"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/earnings"));
        assert_eq!(config.review.depth, ReviewDepth::Direct);
        assert_eq!(config.withdrawal.min_withdrawal, Money::from(50));
        assert_eq!(config.withdrawal.refund_policy, RefundPolicy::RefundOnReject);
        assert_eq!(config.withdrawal.methods.len(), 4);
        assert_eq!(config.actor.shards, 8);
    }

    #[test]
    fn test_zero_shards_rejected() {
        let mut config = Config::default();
        config.actor.shards = 0;
        assert!(config.validate().is_err());
    }
}
