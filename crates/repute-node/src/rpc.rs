//! JSON-RPC read API for the Repute service.
//!
//! Uses jsonrpsee 0.24 to expose the published score snapshots and filters
//! over them, the current blacklist sets, per-node blacklist checks, and
//! on-demand uptime lookups.

use std::sync::Arc;

use jsonrpsee::core::async_trait;
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;

use repute_core::constants::Network;
use repute_core::error::{SnapshotError, StoreError};
use repute_core::query::{BlacklistStatus, ProviderFilter};
use repute_core::snapshot::ProviderScoreSnapshot;
use repute_core::types::{BlacklistEntry, NodeId};

use crate::node::{Node, unix_now};

/// Generic internal failure.
pub const RPC_INTERNAL: i32 = -1;
/// Unknown network name or malformed parameter.
pub const RPC_INVALID_PARAMETER: i32 = -8;
/// Provider id not in the store.
pub const RPC_NOT_FOUND: i32 = -5;
/// No snapshot has been published yet.
pub const RPC_NOT_YET_AVAILABLE: i32 = -28;

/// Create a JSON-RPC error.
fn rpc_error(code: i32, msg: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(code, msg.to_string(), None::<()>)
}

fn snapshot_error(e: SnapshotError) -> ErrorObjectOwned {
    let code = match e {
        SnapshotError::NotYetAvailable(_) => RPC_NOT_YET_AVAILABLE,
        SnapshotError::UnknownNetwork(_) => RPC_INVALID_PARAMETER,
        SnapshotError::Encoding(_) => RPC_INTERNAL,
    };
    rpc_error(code, &e.to_string())
}

fn store_error(e: StoreError) -> ErrorObjectOwned {
    let code = match e {
        StoreError::UnknownProvider(_) => RPC_NOT_FOUND,
        _ => RPC_INTERNAL,
    };
    rpc_error(code, &e.to_string())
}

/// Resolve a network name or alias.
pub fn parse_network(name: &str) -> Result<Network, SnapshotError> {
    Network::from_alias(name).ok_or_else(|| SnapshotError::UnknownNetwork(name.to_string()))
}

/// The Repute JSON-RPC interface.
#[rpc(server)]
pub trait ReputeRpc {
    /// Returns the latest score snapshot for a network (`mainnet`, `polygon`,
    /// `testnet`, `goerli`, `mumbai`, `holesky`).
    #[method(name = "getproviderscores")]
    async fn get_provider_scores(
        &self,
        network: String,
    ) -> Result<ProviderScoreSnapshot, ErrorObjectOwned>;

    /// Returns the current provider backoff blacklist.
    #[method(name = "getblacklistedproviders")]
    async fn get_blacklisted_providers(&self) -> Result<Vec<BlacklistEntry>, ErrorObjectOwned>;

    /// Returns the current operator blacklist.
    #[method(name = "getblacklistedoperators")]
    async fn get_blacklisted_operators(&self) -> Result<Vec<BlacklistEntry>, ErrorObjectOwned>;

    /// Returns a provider's uptime ratio, or null without observations.
    #[method(name = "getuptime")]
    async fn get_uptime(&self, node_id: String) -> Result<Option<f64>, ErrorObjectOwned>;

    /// Returns whether a node, or the operator wallet it is paid to, is blacklisted.
    #[method(name = "checkblacklist")]
    async fn check_blacklist(&self, node_id: String) -> Result<BlacklistStatus, ErrorObjectOwned>;

    /// Returns the ids of providers in the latest snapshot for a network that
    /// match every given bound. An omitted filter matches every provider.
    #[method(name = "filterproviders")]
    async fn filter_providers(
        &self,
        network: String,
        filter: Option<ProviderFilter>,
    ) -> Result<Vec<NodeId>, ErrorObjectOwned>;
}

fn parse_node_id(node_id: &str) -> Result<NodeId, ErrorObjectOwned> {
    NodeId::parse(node_id).map_err(|e| rpc_error(RPC_INVALID_PARAMETER, &e.to_string()))
}

/// Implementation of the Repute JSON-RPC server.
pub struct RpcServerImpl {
    node: Arc<Node>,
}

impl RpcServerImpl {
    /// Create a new RPC server implementation wrapping the given node.
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ErrorObjectOwned>
    where
        T: Send + 'static,
        F: FnOnce(&Node) -> Result<T, StoreError> + Send + 'static,
    {
        let node = Arc::clone(&self.node);
        tokio::task::spawn_blocking(move || f(&node))
            .await
            .map_err(|e| rpc_error(RPC_INTERNAL, &e.to_string()))?
            .map_err(store_error)
    }
}

#[async_trait]
impl ReputeRpcServer for RpcServerImpl {
    async fn get_provider_scores(
        &self,
        network: String,
    ) -> Result<ProviderScoreSnapshot, ErrorObjectOwned> {
        let network = parse_network(&network).map_err(snapshot_error)?;
        let snapshot = self.node.snapshot(network).map_err(snapshot_error)?;
        Ok(snapshot.as_ref().clone())
    }

    async fn get_blacklisted_providers(&self) -> Result<Vec<BlacklistEntry>, ErrorObjectOwned> {
        self.blocking(|node| node.provider_blacklist()).await
    }

    async fn get_blacklisted_operators(&self) -> Result<Vec<BlacklistEntry>, ErrorObjectOwned> {
        self.blocking(|node| node.operator_blacklist()).await
    }

    async fn get_uptime(&self, node_id: String) -> Result<Option<f64>, ErrorObjectOwned> {
        let id = parse_node_id(&node_id)?;
        self.blocking(move |node| node.uptime(&id, unix_now())).await
    }

    async fn check_blacklist(&self, node_id: String) -> Result<BlacklistStatus, ErrorObjectOwned> {
        let id = parse_node_id(&node_id)?;
        self.blocking(move |node| node.check_blacklist(&id)).await
    }

    async fn filter_providers(
        &self,
        network: String,
        filter: Option<ProviderFilter>,
    ) -> Result<Vec<NodeId>, ErrorObjectOwned> {
        let network = parse_network(&network).map_err(snapshot_error)?;
        self.node
            .filter_providers(network, &filter.unwrap_or_default(), unix_now())
            .map_err(snapshot_error)
    }
}

/// Start the JSON-RPC server on the given address.
///
/// Returns a [`ServerHandle`] that can be used to stop the server.
pub async fn start_rpc_server(addr: &str, node: Arc<Node>) -> std::io::Result<ServerHandle> {
    let server = Server::builder().build(addr).await?;
    let rpc_impl = RpcServerImpl::new(node);
    Ok(server.start(rpc_impl.into_rpc()))
}
