//! Error types for the Repute engine.
//!
//! Insufficient data and degenerate populations are not errors: scoring
//! functions return `Option` for those. Only [`StoreError`] aborts a batch.
use thiserror::Error;

use crate::constants::Network;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend: {0}")] Backend(String),
    #[error("codec: {0}")] Codec(String),
    #[error("missing column family: {0}")] MissingColumnFamily(String),
    #[error("unknown provider: {0}")] UnknownProvider(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("invalid node id: {0}")] InvalidNodeId(String),
    #[error("invalid wallet address: {0}")] InvalidWalletAddress(String),
    #[error("unknown payment platform: {0}")] UnknownPaymentPlatform(String),
    #[error("unparseable duration: {0:?}")] InvalidDuration(String),
    #[error("invalid benchmark value {value} for {category}")] InvalidBenchmarkValue { category: String, value: f64 },
    #[error("unknown benchmark category: {0}")] UnknownBenchmarkCategory(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("no snapshot published yet for {0}")] NotYetAvailable(Network),
    #[error("unknown network: {0}")] UnknownNetwork(String),
    #[error("snapshot encoding: {0}")] Encoding(String),
}

#[derive(Error, Debug)]
pub enum ReputeError {
    #[error(transparent)] Store(#[from] StoreError),
    #[error(transparent)] Ingest(#[from] IngestError),
    #[error(transparent)] Snapshot(#[from] SnapshotError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_converts_into_umbrella() {
        let err: ReputeError = StoreError::Backend("io".into()).into();
        assert_eq!(err.to_string(), "backend: io");
    }

    #[test]
    fn not_yet_available_names_the_network() {
        let err = SnapshotError::NotYetAvailable(Network::Test);
        assert!(err.to_string().contains("testnet"));
    }
}
