//! Domain types: providers, observations, samples, outcomes, and blacklist entries.
//!
//! Every record the engine reads is an append-only fact persisted by an
//! external collaborator. Timestamps are Unix seconds ([`Timestamp`]).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::Network;
use crate::error::IngestError;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Length in hex characters of node ids and wallet addresses (20 bytes).
const ADDRESS_HEX_LEN: usize = 40;

/// Validate and normalise a `0x`-prefixed 20-byte hex identifier.
fn normalise_address(raw: &str) -> Option<String> {
    let hex_part = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X"))?;
    if hex_part.len() != ADDRESS_HEX_LEN {
        return None;
    }
    let bytes = hex::decode(hex_part).ok()?;
    Some(format!("0x{}", hex::encode(bytes)))
}

// ---------------------------------------------------------------------------
// Identities
// ---------------------------------------------------------------------------

/// Stable identity of a provider node (`0x` followed by 40 hex characters).
///
/// Stored lowercase so that ids collected by different probes compare equal.
///
/// # Examples
///
/// ```
/// use repute_core::types::NodeId;
///
/// let id = NodeId::parse("0xABCDEF0123456789abcdef0123456789ABCDEF01").unwrap();
/// assert_eq!(id.as_str(), "0xabcdef0123456789abcdef0123456789abcdef01");
/// assert!(NodeId::parse("not-a-node").is_err());
/// ```
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Parse and normalise a node id.
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        normalise_address(raw)
            .map(Self)
            .ok_or_else(|| IngestError::InvalidNodeId(raw.to_string()))
    }

    /// The normalised id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payment wallet address identifying an operator.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(transparent)]
pub struct WalletAddress(String);

impl WalletAddress {
    /// Parse and normalise a wallet address.
    pub fn parse(raw: &str) -> Result<Self, IngestError> {
        normalise_address(raw)
            .map(Self)
            .ok_or_else(|| IngestError::InvalidWalletAddress(raw.to_string()))
    }

    /// The normalised address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Payment platforms
// ---------------------------------------------------------------------------

/// Closed set of (driver, chain, token) payment platforms a provider may advertise.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentPlatform {
    Erc20MainnetGlm,
    Erc20PolygonGlm,
    Erc20GoerliTglm,
    Erc20MumbaiTglm,
    Erc20HoleskyTglm,
    Erc20NextMainnetGlm,
    Erc20NextPolygonGlm,
    Erc20NextGoerliTglm,
    Erc20NextMumbaiTglm,
    Erc20NextHoleskyTglm,
}

/// Offer property key prefix shared by every payment address property.
const PLATFORM_KEY_PREFIX: &str = "golem.com.payment.platform.";
/// Offer property key suffix shared by every payment address property.
const PLATFORM_KEY_SUFFIX: &str = ".address";

impl PaymentPlatform {
    /// Every platform, in operator-wallet preference order.
    pub const ALL: [PaymentPlatform; 10] = [
        Self::Erc20MainnetGlm,
        Self::Erc20NextMainnetGlm,
        Self::Erc20PolygonGlm,
        Self::Erc20NextPolygonGlm,
        Self::Erc20HoleskyTglm,
        Self::Erc20NextHoleskyTglm,
        Self::Erc20GoerliTglm,
        Self::Erc20NextGoerliTglm,
        Self::Erc20MumbaiTglm,
        Self::Erc20NextMumbaiTglm,
    ];

    /// Platform identifier as it appears inside offer property keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Erc20MainnetGlm => "erc20-mainnet-glm",
            Self::Erc20PolygonGlm => "erc20-polygon-glm",
            Self::Erc20GoerliTglm => "erc20-goerli-tglm",
            Self::Erc20MumbaiTglm => "erc20-mumbai-tglm",
            Self::Erc20HoleskyTglm => "erc20-holesky-tglm",
            Self::Erc20NextMainnetGlm => "erc20next-mainnet-glm",
            Self::Erc20NextPolygonGlm => "erc20next-polygon-glm",
            Self::Erc20NextGoerliTglm => "erc20next-goerli-tglm",
            Self::Erc20NextMumbaiTglm => "erc20next-mumbai-tglm",
            Self::Erc20NextHoleskyTglm => "erc20next-holesky-tglm",
        }
    }

    /// Resolve a full offer property key such as
    /// `golem.com.payment.platform.erc20-polygon-glm.address`.
    ///
    /// # Examples
    ///
    /// ```
    /// use repute_core::types::PaymentPlatform;
    ///
    /// let key = "golem.com.payment.platform.erc20-polygon-glm.address";
    /// assert_eq!(
    ///     PaymentPlatform::from_property_key(key).unwrap(),
    ///     PaymentPlatform::Erc20PolygonGlm,
    /// );
    /// assert!(PaymentPlatform::from_property_key("golem.node.id.name").is_err());
    /// ```
    pub fn from_property_key(key: &str) -> Result<Self, IngestError> {
        key.strip_prefix(PLATFORM_KEY_PREFIX)
            .and_then(|rest| rest.strip_suffix(PLATFORM_KEY_SUFFIX))
            .and_then(|id| Self::ALL.into_iter().find(|p| p.as_str() == id))
            .ok_or_else(|| IngestError::UnknownPaymentPlatform(key.to_string()))
    }

    /// The offer property key for this platform.
    pub fn property_key(&self) -> String {
        format!("{PLATFORM_KEY_PREFIX}{}{PLATFORM_KEY_SUFFIX}", self.as_str())
    }

    /// Whether the platform settles on a test chain.
    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Self::Erc20GoerliTglm
                | Self::Erc20MumbaiTglm
                | Self::Erc20HoleskyTglm
                | Self::Erc20NextGoerliTglm
                | Self::Erc20NextMumbaiTglm
                | Self::Erc20NextHoleskyTglm
        )
    }
}

/// Payment addresses advertised by a provider, keyed by platform.
#[derive(
    Debug,
    Clone,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(transparent)]
pub struct PaymentAddresses(BTreeMap<PaymentPlatform, WalletAddress>);

impl PaymentAddresses {
    /// Empty address set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the address for a platform.
    pub fn insert(&mut self, platform: PaymentPlatform, address: WalletAddress) {
        self.0.insert(platform, address);
    }

    /// Address advertised for a platform, if any.
    pub fn get(&self, platform: PaymentPlatform) -> Option<&WalletAddress> {
        self.0.get(&platform)
    }

    /// Number of advertised platforms.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no platform is advertised.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The wallet that identifies the provider's operator.
    ///
    /// Picks the first advertised platform in [`PaymentPlatform::ALL`] order,
    /// so mainnet GLM addresses win over polygon, which win over test chains.
    pub fn operator_wallet(&self) -> Option<&WalletAddress> {
        PaymentPlatform::ALL.iter().find_map(|p| self.0.get(p))
    }

    /// Network segment implied by the advertised platforms.
    ///
    /// A provider advertising any test-chain platform is a test provider.
    pub fn declared_network(&self) -> Network {
        if self.0.keys().any(PaymentPlatform::is_testnet) {
            Network::Test
        } else {
            Network::Main
        }
    }

    /// Iterate over `(platform, address)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&PaymentPlatform, &WalletAddress)> {
        self.0.iter()
    }
}

// ---------------------------------------------------------------------------
// Provider
// ---------------------------------------------------------------------------

/// A compute provider known to the marketplace.
///
/// Identity is immutable once created; `created_at` anchors the uptime
/// denominator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Provider {
    pub id: NodeId,
    /// Human-readable node name from the provider's offer.
    pub name: Option<String>,
    /// First-seen timestamp.
    pub created_at: Timestamp,
    pub network: Network,
    pub payment_addresses: PaymentAddresses,
}

impl Provider {
    /// Build a provider whose network is derived from its payment platforms.
    pub fn new(
        id: NodeId,
        name: Option<String>,
        created_at: Timestamp,
        payment_addresses: PaymentAddresses,
    ) -> Self {
        Self {
            id,
            name,
            created_at,
            network: payment_addresses.declared_network(),
            payment_addresses,
        }
    }

    /// Operator wallet, if the provider advertises any payment address.
    pub fn operator_wallet(&self) -> Option<&WalletAddress> {
        self.payment_addresses.operator_wallet()
    }
}

// ---------------------------------------------------------------------------
// Observations and samples
// ---------------------------------------------------------------------------

/// A timestamped online/offline signal for one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct LivenessObservation {
    pub node_id: NodeId,
    pub online: bool,
    pub timestamp: Timestamp,
}

/// Whether a larger raw value is better or worse for a benchmark category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

/// Hardware benchmark category.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(rename_all = "kebab-case")]
pub enum BenchmarkCategory {
    CpuSingle,
    CpuMulti,
    MemorySeqRead,
    MemorySeqWrite,
    MemoryRandRead,
    MemoryRandWrite,
    /// 95th percentile random-read latency in milliseconds.
    MemoryLatency,
    DiskSeqRead,
    DiskSeqWrite,
    DiskRandRead,
    DiskRandWrite,
    NetworkThroughput,
    Gpu,
}

impl BenchmarkCategory {
    /// Every category.
    pub const ALL: [BenchmarkCategory; 13] = [
        Self::CpuSingle,
        Self::CpuMulti,
        Self::MemorySeqRead,
        Self::MemorySeqWrite,
        Self::MemoryRandRead,
        Self::MemoryRandWrite,
        Self::MemoryLatency,
        Self::DiskSeqRead,
        Self::DiskSeqWrite,
        Self::DiskRandRead,
        Self::DiskRandWrite,
        Self::NetworkThroughput,
        Self::Gpu,
    ];

    /// Kebab-case category name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CpuSingle => "cpu-single",
            Self::CpuMulti => "cpu-multi",
            Self::MemorySeqRead => "memory-seq-read",
            Self::MemorySeqWrite => "memory-seq-write",
            Self::MemoryRandRead => "memory-rand-read",
            Self::MemoryRandWrite => "memory-rand-write",
            Self::MemoryLatency => "memory-latency",
            Self::DiskSeqRead => "disk-seq-read",
            Self::DiskSeqWrite => "disk-seq-write",
            Self::DiskRandRead => "disk-rand-read",
            Self::DiskRandWrite => "disk-rand-write",
            Self::NetworkThroughput => "network-throughput",
            Self::Gpu => "gpu",
        }
    }

    /// Which end of the raw value range is best.
    pub fn direction(&self) -> Direction {
        match self {
            Self::MemoryLatency => Direction::LowerIsBetter,
            _ => Direction::HigherIsBetter,
        }
    }

    /// Whether the category is one of the two CPU events-per-second benchmarks.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Self::CpuSingle | Self::CpuMulti)
    }
}

impl fmt::Display for BenchmarkCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BenchmarkCategory {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| IngestError::UnknownBenchmarkCategory(s.to_string()))
    }
}

/// One hardware benchmark measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct BenchmarkSample {
    pub provider: NodeId,
    pub category: BenchmarkCategory,
    pub value: f64,
    pub timestamp: Timestamp,
}

impl BenchmarkSample {
    /// Build a sample, rejecting non-finite or negative values.
    pub fn new(
        provider: NodeId,
        category: BenchmarkCategory,
        value: f64,
        timestamp: Timestamp,
    ) -> Result<Self, IngestError> {
        if !value.is_finite() || value < 0.0 {
            return Err(IngestError::InvalidBenchmarkValue {
                category: category.to_string(),
                value,
            });
        }
        Ok(Self {
            provider,
            category,
            value,
            timestamp,
        })
    }
}

/// Success/failure record for a unit of work assigned to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct TaskOutcome {
    pub provider: NodeId,
    pub task_id: u64,
    pub success: bool,
    /// Error text reported for a failed task.
    pub error: Option<String>,
    /// Amount paid for the task, in GLM.
    pub cost: Option<f64>,
    pub timestamp: Timestamp,
}

// ---------------------------------------------------------------------------
// Blacklist
// ---------------------------------------------------------------------------

/// What a blacklist entry excludes.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    bincode::Encode,
    bincode::Decode,
)]
#[serde(tag = "scope", content = "id", rename_all = "lowercase")]
pub enum BlacklistSubject {
    Provider(NodeId),
    Operator(WalletAddress),
}

/// An exclusion with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct BlacklistEntry {
    pub subject: BlacklistSubject,
    pub reason: String,
    pub created_at: Timestamp,
}

impl BlacklistEntry {
    /// Provider-scoped entry.
    pub fn provider(id: NodeId, reason: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            subject: BlacklistSubject::Provider(id),
            reason: reason.into(),
            created_at,
        }
    }

    /// Operator-scoped entry.
    pub fn operator(wallet: WalletAddress, reason: impl Into<String>, created_at: Timestamp) -> Self {
        Self {
            subject: BlacklistSubject::Operator(wallet),
            reason: reason.into(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wallet(n: u8) -> WalletAddress {
        WalletAddress::parse(&format!("0x{}", hex::encode([n; 20]))).unwrap()
    }

    #[test]
    fn node_id_rejects_wrong_length() {
        assert!(NodeId::parse("0x1234").is_err());
        assert!(NodeId::parse(&format!("0x{}", "a".repeat(42))).is_err());
    }

    #[test]
    fn node_id_rejects_missing_prefix() {
        assert!(NodeId::parse(&"a".repeat(40)).is_err());
    }

    #[test]
    fn wallet_normalises_case() {
        let upper = WalletAddress::parse(&format!("0x{}", "AB".repeat(20))).unwrap();
        let lower = WalletAddress::parse(&format!("0x{}", "ab".repeat(20))).unwrap();
        assert_eq!(upper, lower);
    }

    #[test]
    fn property_keys_roundtrip_for_every_platform() {
        for platform in PaymentPlatform::ALL {
            let key = platform.property_key();
            assert_eq!(PaymentPlatform::from_property_key(&key).unwrap(), platform);
        }
    }

    #[test]
    fn unknown_chain_is_rejected() {
        let key = "golem.com.payment.platform.erc20-rinkeby-tglm.address";
        assert!(matches!(
            PaymentPlatform::from_property_key(key),
            Err(IngestError::UnknownPaymentPlatform(_))
        ));
    }

    #[test]
    fn operator_wallet_prefers_mainnet() {
        let mut addrs = PaymentAddresses::new();
        addrs.insert(PaymentPlatform::Erc20PolygonGlm, wallet(2));
        addrs.insert(PaymentPlatform::Erc20MainnetGlm, wallet(1));
        assert_eq!(addrs.operator_wallet(), Some(&wallet(1)));
        assert_eq!(addrs.declared_network(), Network::Main);
    }

    #[test]
    fn any_test_chain_makes_provider_testnet() {
        let mut addrs = PaymentAddresses::new();
        addrs.insert(PaymentPlatform::Erc20MainnetGlm, wallet(1));
        addrs.insert(PaymentPlatform::Erc20HoleskyTglm, wallet(1));
        assert_eq!(addrs.declared_network(), Network::Test);
    }

    #[test]
    fn empty_addresses_have_no_operator() {
        assert!(PaymentAddresses::new().operator_wallet().is_none());
    }

    #[test]
    fn benchmark_sample_rejects_nan_and_negative() {
        let id = NodeId::parse(&format!("0x{}", "01".repeat(20))).unwrap();
        assert!(BenchmarkSample::new(id.clone(), BenchmarkCategory::Gpu, f64::NAN, 0).is_err());
        assert!(BenchmarkSample::new(id.clone(), BenchmarkCategory::Gpu, -1.0, 0).is_err());
        assert!(BenchmarkSample::new(id, BenchmarkCategory::Gpu, 0.0, 0).is_ok());
    }

    #[test]
    fn category_names_parse_back() {
        for category in BenchmarkCategory::ALL {
            assert_eq!(category.as_str().parse::<BenchmarkCategory>().unwrap(), category);
        }
        assert!("cpu-quad".parse::<BenchmarkCategory>().is_err());
    }

    #[test]
    fn only_latency_is_lower_is_better() {
        let lower: Vec<_> = BenchmarkCategory::ALL
            .into_iter()
            .filter(|c| c.direction() == Direction::LowerIsBetter)
            .collect();
        assert_eq!(lower, vec![BenchmarkCategory::MemoryLatency]);
    }

    #[test]
    fn blacklist_subject_serializes_tagged() {
        let entry = BlacklistEntry::operator(wallet(7), "bad", 10);
        let json = serde_json::to_string(&entry.subject).unwrap();
        assert!(json.contains("\"scope\":\"operator\""));
    }
}
