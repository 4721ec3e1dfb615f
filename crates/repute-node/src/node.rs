//! Service composition and job scheduler.
//!
//! The [`Node`] struct owns the store and snapshot cache handles, built once
//! at startup and shared with every job run and the RPC server. [`Node::run`]
//! drives one timer loop per job; the loops run concurrently, while runs of
//! the same job never overlap because each loop awaits its own run.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use repute_core::constants::Network;
use repute_core::error::{ReputeError, SnapshotError, StoreError};
use repute_core::query::{BlacklistStatus, ProviderFilter};
use repute_core::snapshot::ProviderScoreSnapshot;
use repute_core::traits::{ReputationStore, SnapshotCache};
use repute_core::types::{BlacklistEntry, NodeId, Timestamp};

use crate::cache::SharedSnapshotCache;
use crate::config::NodeConfig;
use crate::pipeline;
use crate::storage::RocksStore;

/// Current time in Unix seconds.
pub fn unix_now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// A scheduled batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Job {
    OperatorBlacklist,
    ProviderBlacklist,
    /// Score aggregation for every network segment.
    Scores,
}

impl Job {
    pub const ALL: [Job; 3] = [Job::OperatorBlacklist, Job::ProviderBlacklist, Job::Scores];

    fn period(&self, config: &NodeConfig) -> Duration {
        match self {
            Self::OperatorBlacklist => config.schedule.operator_blacklist_period(),
            Self::ProviderBlacklist => config.schedule.provider_blacklist_period(),
            Self::Scores => config.schedule.scores_period(),
        }
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OperatorBlacklist => "operator-blacklist",
            Self::ProviderBlacklist => "provider-blacklist",
            Self::Scores => "scores",
        })
    }
}

/// A running Repute service.
pub struct Node {
    store: Arc<dyn ReputationStore>,
    cache: Arc<dyn SnapshotCache>,
    config: NodeConfig,
}

impl Node {
    /// Open the RocksDB store under the configured data directory.
    pub fn open(config: NodeConfig) -> Result<Arc<Self>, StoreError> {
        let store = RocksStore::open(config.db_path())?;
        Ok(Self::with_backends(
            config,
            Arc::new(store),
            Arc::new(SharedSnapshotCache::new()),
        ))
    }

    /// Build a node over caller-supplied store and cache (tests, tooling).
    pub fn with_backends(
        config: NodeConfig,
        store: Arc<dyn ReputationStore>,
        cache: Arc<dyn SnapshotCache>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            cache,
            config,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn ReputationStore> {
        &self.store
    }

    /// Run one job to completion at `now`.
    ///
    /// Blocking: call from a blocking context.
    pub fn run_job(&self, job: Job, now: Timestamp) -> Result<(), ReputeError> {
        match job {
            Job::OperatorBlacklist => {
                pipeline::refresh_operator_blacklist(self.store.as_ref(), now, &self.config)?;
            }
            Job::ProviderBlacklist => {
                pipeline::refresh_provider_blacklist(self.store.as_ref(), now, &self.config)?;
            }
            Job::Scores => {
                for network in Network::ALL {
                    pipeline::aggregate_scores(
                        self.store.as_ref(),
                        self.cache.as_ref(),
                        network,
                        now,
                        &self.config,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Timer loop for one job. Failed runs are logged and retried next tick.
    async fn job_loop(self: Arc<Self>, job: Job) {
        let mut interval = tokio::time::interval(job.period(&self.config));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let node = Arc::clone(&self);
            let started = std::time::Instant::now();
            match tokio::task::spawn_blocking(move || node.run_job(job, unix_now())).await {
                Ok(Ok(())) => {
                    info!(%job, elapsed_ms = started.elapsed().as_millis() as u64, "job: run complete")
                }
                Ok(Err(e)) => warn!(%job, error = %e, "job: run failed; keeping previous output"),
                Err(e) => warn!(%job, error = %e, "job: run panicked"),
            }
        }
    }

    /// Run every job on its schedule. Never returns.
    pub async fn run(self: &Arc<Self>) {
        let handles: Vec<_> = Job::ALL
            .into_iter()
            .map(|job| {
                info!(%job, period_secs = job.period(&self.config).as_secs(), "job: scheduled");
                tokio::spawn(Arc::clone(self).job_loop(job))
            })
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "job loop exited");
            }
        }
    }

    // --- Read side ---

    /// Latest published snapshot for `network`.
    pub fn snapshot(&self, network: Network) -> Result<Arc<ProviderScoreSnapshot>, SnapshotError> {
        self.cache.latest(network)
    }

    pub fn provider_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.store.provider_blacklist()
    }

    pub fn operator_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.store.operator_blacklist()
    }

    /// Provider and operator-wallet blacklist membership of one node.
    ///
    /// An unknown node can still be provider-blacklisted but has no wallet.
    pub fn check_blacklist(&self, id: &NodeId) -> Result<BlacklistStatus, StoreError> {
        let provider = self.store.provider(id)?;
        Ok(BlacklistStatus::check(
            id,
            provider.as_ref(),
            &self.store.provider_blacklist()?,
            &self.store.operator_blacklist()?,
        ))
    }

    /// Ids of published providers on `network` matching `filter`.
    pub fn filter_providers(
        &self,
        network: Network,
        filter: &ProviderFilter,
        now: Timestamp,
    ) -> Result<Vec<NodeId>, SnapshotError> {
        Ok(filter.apply(&*self.cache.latest(network)?, now))
    }

    /// On-demand uptime of one provider.
    pub fn uptime(&self, id: &NodeId, now: Timestamp) -> Result<Option<f64>, StoreError> {
        let provider = self
            .store
            .provider(id)?
            .ok_or_else(|| StoreError::UnknownProvider(id.to_string()))?;
        pipeline::provider_uptime(self.store.as_ref(), &provider, now)
    }
}
