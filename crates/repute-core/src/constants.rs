//! Engine constants. All timestamps are Unix seconds.

use serde::{Deserialize, Serialize};

/// Seconds in one hour.
pub const SECS_PER_HOUR: i64 = 60 * 60;

/// Seconds in one day.
pub const SECS_PER_DAY: i64 = 24 * SECS_PER_HOUR;

/// Default JSON-RPC port for the read API.
pub const DEFAULT_RPC_PORT: u16 = 28_400;

/// Number of most recent samples per provider kept in the normalisation population.
pub const DEFAULT_RECENT_N: usize = 3;

/// Window over which task outcomes count towards a published success ratio.
pub const DEFAULT_SCORING_WINDOW_DAYS: i64 = 10;

/// Recency cutoff for benchmark samples entering a normalisation population.
pub const DEFAULT_BENCHMARK_WINDOW_DAYS: i64 = 3;

/// Number of a provider's own latest CPU samples averaged by the deviation penalizer.
pub const DEFAULT_PENALTY_HISTORY_LEN: usize = 5;

/// Minimum own-history length before the deviation penalizer applies any weight.
pub const MIN_PENALTY_HISTORY: usize = 2;

/// Window over which task outcomes are grouped per operator wallet.
pub const DEFAULT_SUCCESS_WINDOW_DAYS: i64 = 3;

/// Wallets with fewer outcomes than this are statistically insufficient.
pub const DEFAULT_MIN_OPERATOR_TASKS: usize = 5;

/// Success-ratio z-score at or below which an operator is blacklisted.
pub const DEFAULT_Z_SCORE_THRESHOLD: f64 = -1.0;

/// Window over which CPU benchmark activity is examined per provider.
pub const DEFAULT_CPU_WINDOW_DAYS: i64 = 3;

/// Coefficient of variation above which CPU allocation is considered inconsistent.
pub const DEFAULT_CPU_DEVIATION_THRESHOLD: f64 = 0.20;

/// Online providers an operator must run before CPU variance is examined.
pub const DEFAULT_MIN_ONLINE_PROVIDERS: usize = 3;

/// Backoff length for a single failure, in hours.
pub const DEFAULT_BACKOFF_BASE_HOURS: i64 = 10;

/// Failure count at which the exponential backoff stops growing.
pub const DEFAULT_BACKOFF_MAX_FAILURES: u32 = 6;

/// Lookback window for counting a provider's trailing failures.
pub const DEFAULT_BACKOFF_LOOKBACK_DAYS: i64 = 3;

/// Network segment a provider declares through its payment platforms.
///
/// Snapshots are produced and cached per segment.
///
/// # Examples
///
/// ```
/// use repute_core::constants::Network;
/// assert_eq!(Network::default(), Network::Main);
/// assert_eq!(Network::from_alias("polygon"), Some(Network::Main));
/// assert_eq!(Network::from_alias("holesky"), Some(Network::Test));
/// assert_eq!(Network::from_alias("rinkeby"), None);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Production payment chains.
    #[default]
    Main,
    /// Test payment chains.
    Test,
}

impl Network {
    /// All segments, in publication order.
    pub const ALL: [Network; 2] = [Network::Main, Network::Test];

    /// Resolve a read-API network name to a segment.
    ///
    /// `mainnet` and `polygon` map to [`Network::Main`]; `testnet`, `goerli`,
    /// `mumbai` and `holesky` map to [`Network::Test`].
    pub fn from_alias(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "main" | "mainnet" | "polygon" => Some(Self::Main),
            "test" | "testnet" | "goerli" | "mumbai" | "holesky" => Some(Self::Test),
            _ => None,
        }
    }

    /// Short name used in cache keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Main => "mainnet",
            Self::Test => "testnet",
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_case_insensitive() {
        assert_eq!(Network::from_alias("MainNet"), Some(Network::Main));
        assert_eq!(Network::from_alias("GOERLI"), Some(Network::Test));
    }

    #[test]
    fn display_matches_cache_key_name() {
        assert_eq!(Network::Main.to_string(), "mainnet");
        assert_eq!(Network::Test.to_string(), "testnet");
    }

    #[test]
    fn backoff_defaults_cap_near_two_weeks() {
        let max_hours = DEFAULT_BACKOFF_BASE_HOURS << (DEFAULT_BACKOFF_MAX_FAILURES - 1);
        assert_eq!(max_hours, 320);
        assert!(max_hours * SECS_PER_HOUR < 14 * SECS_PER_DAY);
    }

    #[test]
    fn network_serializes_lowercase() {
        let json = serde_json::to_string(&Network::Test).unwrap();
        assert_eq!(json, "\"test\"");
    }
}
