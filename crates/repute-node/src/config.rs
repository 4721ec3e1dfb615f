//! Node configuration for the Repute service.
//!
//! [`NodeConfig`] is assembled in layers: built-in defaults, an optional TOML
//! file, then `REPUTE__`-prefixed environment variables (`__` separates
//! nesting levels, e.g. `REPUTE__ANOMALY__MIN_TASKS=8`). The binary applies
//! CLI flags last.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use repute_core::constants::{
    DEFAULT_BENCHMARK_WINDOW_DAYS, DEFAULT_PENALTY_HISTORY_LEN, DEFAULT_RECENT_N,
    DEFAULT_RPC_PORT, DEFAULT_SCORING_WINDOW_DAYS, SECS_PER_DAY,
};
use repute_core::types::Timestamp;
use repute_scoring::{AnomalyParams, BackoffParams, NormalizeParams};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "REPUTE";

/// Score aggregation tunables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Samples per provider kept in a category's population.
    pub recent_n: usize,
    /// Task outcomes newer than this make a provider "tested".
    pub scoring_window_days: i64,
    /// Benchmark samples newer than this enter the population.
    pub benchmark_window_days: i64,
    /// Own samples averaged by the CPU deviation penalty.
    pub penalty_history_len: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            recent_n: DEFAULT_RECENT_N,
            scoring_window_days: DEFAULT_SCORING_WINDOW_DAYS,
            benchmark_window_days: DEFAULT_BENCHMARK_WINDOW_DAYS,
            penalty_history_len: DEFAULT_PENALTY_HISTORY_LEN,
        }
    }
}

impl ScoringConfig {
    pub fn normalize_params(&self) -> NormalizeParams {
        NormalizeParams {
            recent_n: self.recent_n,
            benchmark_window_days: self.benchmark_window_days,
        }
    }

    /// Earliest outcome timestamp inside the scoring window.
    pub fn scoring_cutoff(&self, now: Timestamp) -> Timestamp {
        now - self.scoring_window_days * SECS_PER_DAY
    }
}

/// Job periods in seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub operator_blacklist_secs: u64,
    pub provider_blacklist_secs: u64,
    pub scores_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            operator_blacklist_secs: 120,
            provider_blacklist_secs: 120,
            scores_secs: 300,
        }
    }
}

impl ScheduleConfig {
    pub fn operator_blacklist_period(&self) -> Duration {
        Duration::from_secs(self.operator_blacklist_secs.max(1))
    }

    pub fn provider_blacklist_period(&self) -> Duration {
        Duration::from_secs(self.provider_blacklist_secs.max(1))
    }

    pub fn scores_period(&self) -> Duration {
        Duration::from_secs(self.scores_secs.max(1))
    }
}

/// Configuration for a Repute node instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Root directory for all persistent data.
    pub data_dir: PathBuf,
    /// IP address for the JSON-RPC server to bind to.
    pub rpc_bind: String,
    /// Port for the JSON-RPC server.
    pub rpc_port: u16,
    /// Log level filter string (e.g. "info", "debug", "repute_node_lib=trace").
    pub log_level: String,
    pub scoring: ScoringConfig,
    pub anomaly: AnomalyParams,
    pub backoff: BackoffParams,
    pub schedule: ScheduleConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let data_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("repute");

        Self {
            data_dir,
            rpc_bind: "127.0.0.1".to_string(),
            rpc_port: DEFAULT_RPC_PORT,
            log_level: "info".to_string(),
            scoring: ScoringConfig::default(),
            anomaly: AnomalyParams::default(),
            backoff: BackoffParams::default(),
            schedule: ScheduleConfig::default(),
        }
    }
}

impl NodeConfig {
    /// Load defaults, then `file` if given, then environment overrides.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Path to the RocksDB data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("reputedata")
    }

    /// Socket address string for the RPC server.
    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_bind, self.rpc_port)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn default_rpc_port() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.rpc_port, DEFAULT_RPC_PORT);
        assert_eq!(cfg.rpc_addr(), format!("127.0.0.1:{DEFAULT_RPC_PORT}"));
    }

    #[test]
    fn default_data_dir_ends_with_repute() {
        let cfg = NodeConfig::default();
        assert!(
            cfg.data_dir.ends_with("repute"),
            "data_dir should end with 'repute': {:?}",
            cfg.data_dir
        );
    }

    #[test]
    fn db_path_appends_reputedata() {
        let cfg = NodeConfig {
            data_dir: PathBuf::from("/tmp/repute-test"),
            ..NodeConfig::default()
        };
        assert_eq!(cfg.db_path(), PathBuf::from("/tmp/repute-test/reputedata"));
    }

    #[test]
    fn thresholds_default_to_documented_values() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.anomaly.min_tasks, 5);
        assert_eq!(cfg.anomaly.z_score_threshold, -1.0);
        assert_eq!(cfg.anomaly.cpu_deviation_threshold, 0.20);
        assert_eq!(cfg.backoff.max_failures, 6);
        assert_eq!(cfg.scoring.recent_n, 3);
        assert_eq!(cfg.schedule.scores_period(), Duration::from_secs(300));
    }

    #[test]
    fn toml_file_overrides_selected_fields() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "rpc_port = 9999\n[anomaly]\nmin_tasks = 8\n[schedule]\nscores_secs = 60"
        )
        .unwrap();

        let cfg = NodeConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.rpc_port, 9999);
        assert_eq!(cfg.anomaly.min_tasks, 8);
        // untouched fields keep their defaults
        assert_eq!(cfg.anomaly.z_score_threshold, -1.0);
        assert_eq!(cfg.schedule.scores_secs, 60);
        assert_eq!(cfg.schedule.operator_blacklist_secs, 120);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(NodeConfig::load(Some(Path::new("/nonexistent/repute.toml"))).is_err());
    }

    #[test]
    fn zero_period_is_clamped() {
        let s = ScheduleConfig {
            scores_secs: 0,
            ..ScheduleConfig::default()
        };
        assert_eq!(s.scores_period(), Duration::from_secs(1));
    }
}
