//! # repute-node
//!
//! Service composition: RocksDB, jobs, RPC.
//!
//! Wires the Repute engine into a running service:
//! - [`storage::RocksStore`]: persistent reputation store backed by RocksDB
//! - [`cache::SharedSnapshotCache`]: latest published snapshot per network
//! - [`pipeline`]: score aggregation and blacklist refresh jobs
//! - [`node::Node`]: handle composition and job scheduler
//! - [`rpc`]: JSON-RPC read API
//! - [`config::NodeConfig`]: layered configuration

pub mod cache;
pub mod config;
pub mod node;
pub mod pipeline;
pub mod rpc;
pub mod storage;

pub use cache::SharedSnapshotCache;
pub use config::NodeConfig;
pub use node::{Job, Node};
pub use rpc::start_rpc_server;
pub use storage::RocksStore;
