//! Engine configuration
//!
//! Loaded from TOML with a built-in default for every field. Resolution order:
//! 1. `--config` command-line argument
//! 2. `GIVEAWAY_CONFIG` environment variable
//! 3. `<config_dir>/giveaway/engine.toml`
//! 4. Built-in defaults
//!
//! A missing file falls back to defaults with a warning. A file that fails to
//! parse or validate is an error.

use giveaway_common::config::{load_toml_or_default, resolve_config_path, LoggingConfig};
use giveaway_common::time::millis_to_duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{EngineError, Result};
use crate::model::Tier;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "GIVEAWAY_CONFIG";

/// Config file name under the per-user config directory
pub const CONFIG_FILE_NAME: &str = "engine.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub limits: TierLimits,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Qualification and preview tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Concurrent evaluation workers
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    /// Participants per worker batch
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Excluded entries kept as preview samples
    #[serde(default = "default_sample_excluded_limit")]
    pub sample_excluded_limit: usize,
    /// Per-call timeout for the follower-verification collaborator
    #[serde(default = "default_verification_timeout_ms")]
    pub verification_timeout_ms: u64,
    /// Concurrent follower-verification calls
    #[serde(default = "default_verification_concurrency")]
    pub verification_concurrency: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            chunk_size: default_chunk_size(),
            sample_excluded_limit: default_sample_excluded_limit(),
            verification_timeout_ms: default_verification_timeout_ms(),
            verification_concurrency: default_verification_concurrency(),
        }
    }
}

impl EvaluationConfig {
    pub fn verification_timeout(&self) -> Duration {
        millis_to_duration(self.verification_timeout_ms)
    }
}

/// Winner selection supervision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Supervising timeout; selection not finished by then is forced to FAILED
    #[serde(default = "default_execution_timeout_ms")]
    pub timeout_ms: u64,
    /// A PROCESSING claim older than this is considered abandoned and reclaimable
    #[serde(default = "default_processing_lease_ms")]
    pub processing_lease_ms: u64,
    /// Execution attempts allowed per caller per hour
    #[serde(default = "default_max_executions_per_hour")]
    pub max_executions_per_hour: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_execution_timeout_ms(),
            processing_lease_ms: default_processing_lease_ms(),
            max_executions_per_hour: default_max_executions_per_hour(),
        }
    }
}

impl ExecutionConfig {
    pub fn timeout(&self) -> Duration {
        millis_to_duration(self.timeout_ms)
    }

    pub fn processing_lease(&self) -> Duration {
        millis_to_duration(self.processing_lease_ms)
    }
}

/// Candidate-volume ceilings per tier; absent means unlimited
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
    #[serde(default = "default_free_limit")]
    pub free: Option<u64>,
    #[serde(default = "default_basic_limit")]
    pub basic: Option<u64>,
    #[serde(default = "default_premium_limit")]
    pub premium: Option<u64>,
    #[serde(default)]
    pub enterprise: Option<u64>,
}

impl Default for TierLimits {
    fn default() -> Self {
        Self {
            free: default_free_limit(),
            basic: default_basic_limit(),
            premium: default_premium_limit(),
            enterprise: None,
        }
    }
}

impl TierLimits {
    pub fn limit_for(&self, tier: Tier) -> Option<u64> {
        match tier {
            Tier::Free => self.free,
            Tier::Basic => self.basic,
            Tier::Premium => self.premium,
            Tier::Enterprise => self.enterprise,
        }
    }
}

fn default_worker_count() -> usize {
    4
}

fn default_chunk_size() -> usize {
    256
}

fn default_sample_excluded_limit() -> usize {
    25
}

fn default_verification_timeout_ms() -> u64 {
    2000
}

fn default_verification_concurrency() -> usize {
    8
}

fn default_execution_timeout_ms() -> u64 {
    30_000
}

fn default_processing_lease_ms() -> u64 {
    120_000
}

fn default_max_executions_per_hour() -> u32 {
    10
}

fn default_free_limit() -> Option<u64> {
    Some(1_000)
}

fn default_basic_limit() -> Option<u64> {
    Some(10_000)
}

fn default_premium_limit() -> Option<u64> {
    Some(100_000)
}

impl EngineConfig {
    /// Resolve and load the engine config, then validate it
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path, CONFIG_ENV_VAR, CONFIG_FILE_NAME);
        let config: EngineConfig = load_toml_or_default(path.as_deref())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| EngineError::Configuration(format!("Parse TOML failed: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("evaluation.worker_count", self.evaluation.worker_count as u64),
            ("evaluation.chunk_size", self.evaluation.chunk_size as u64),
            ("evaluation.verification_timeout_ms", self.evaluation.verification_timeout_ms),
            ("evaluation.verification_concurrency", self.evaluation.verification_concurrency as u64),
            ("execution.timeout_ms", self.execution.timeout_ms),
            ("execution.processing_lease_ms", self.execution.processing_lease_ms),
            ("execution.max_executions_per_hour", u64::from(self.execution.max_executions_per_hour)),
        ];
        for (key, value) in checks {
            if value == 0 {
                return Err(EngineError::Configuration(format!("{}: must be greater than 0", key)));
            }
        }
        // A claim must outlive the selection it guards
        if self.execution.processing_lease_ms <= self.execution.timeout_ms {
            return Err(EngineError::Configuration(format!(
                "execution.processing_lease_ms: {} must exceed execution.timeout_ms {}",
                self.execution.processing_lease_ms, self.execution.timeout_ms
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.evaluation.worker_count, 4);
        assert_eq!(config.limits.limit_for(Tier::Free), Some(1_000));
        assert_eq!(config.limits.limit_for(Tier::Enterprise), None);
        assert_eq!(config.logging.level, "info");
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = EngineConfig::from_toml(
            r#"
            [evaluation]
            worker_count = 2

            [limits]
            free = 50
            "#,
        )
        .unwrap();
        assert_eq!(config.evaluation.worker_count, 2);
        assert_eq!(config.evaluation.chunk_size, 256);
        assert_eq!(config.limits.free, Some(50));
        assert_eq!(config.limits.basic, Some(10_000));
        assert_eq!(config.execution.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let result = EngineConfig::from_toml("[evaluation]\nworker_count = 0\n");
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_lease_must_exceed_timeout() {
        let result = EngineConfig::from_toml("[execution]\ntimeout_ms = 5000\nprocessing_lease_ms = 5000\n");
        assert!(matches!(result, Err(EngineError::Configuration(msg)) if msg.contains("processing_lease_ms")));

        let result = EngineConfig::from_toml("[execution]\ntimeout_ms = 5000\nprocessing_lease_ms = 50\n");
        assert!(matches!(result, Err(EngineError::Configuration(_))));

        let config = EngineConfig::from_toml("[execution]\ntimeout_ms = 5000\nprocessing_lease_ms = 5001\n").unwrap();
        assert_eq!(config.execution.processing_lease(), Duration::from_millis(5001));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(EngineConfig::from_toml("[evaluation\n").is_err());
    }
}
