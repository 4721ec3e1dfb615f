//! RocksDB-backed persistent reputation store.
//!
//! Implements [`ReputationStore`] using column families for providers,
//! liveness history, benchmark samples, task outcomes, and blacklist sets.
//! Multi-key mutations go through a single [`WriteBatch`].
//!
//! Time-ordered keys carry timestamps as order-preserving big-endian bytes so
//! forward iteration returns records in ascending time. Blacklist sets are
//! generational: a replacement writes the new generation, flips the
//! generation pointer, and drops the old generation in one batch, and readers
//! resolve the pointer and scan through the same RocksDB snapshot.

use std::collections::HashSet;
use std::path::Path;

use parking_lot::Mutex;
use rocksdb::{ColumnFamilyDescriptor, DB, Direction, IteratorMode, Options, WriteBatch};
use tracing::{debug, info};

use repute_core::constants::Network;
use repute_core::error::StoreError;
use repute_core::traits::ReputationStore;
use repute_core::types::{
    BenchmarkCategory, BenchmarkSample, BlacklistEntry, LivenessObservation, NodeId, Provider,
    TaskOutcome, Timestamp,
};

// --- Column family names ---

const CF_PROVIDERS: &str = "providers";
const CF_LIVENESS: &str = "liveness";
const CF_LIVENESS_LATEST: &str = "liveness_latest";
const CF_BENCHMARKS: &str = "benchmarks";
const CF_TASKS: &str = "tasks";
const CF_BLACKLIST: &str = "blacklist";
const CF_METADATA: &str = "metadata";

/// All column family names.
const ALL_CFS: &[&str] = &[
    CF_PROVIDERS,
    CF_LIVENESS,
    CF_LIVENESS_LATEST,
    CF_BENCHMARKS,
    CF_TASKS,
    CF_BLACKLIST,
    CF_METADATA,
];

// --- Metadata keys ---

const META_NEXT_SEQ: &[u8] = b"next_seq";
const META_PROVIDER_BLACKLIST_GEN: &[u8] = b"provider_blacklist_gen";
const META_OPERATOR_BLACKLIST_GEN: &[u8] = b"operator_blacklist_gen";

// --- Blacklist scopes (first key byte in CF_BLACKLIST) ---

const SCOPE_PROVIDER: u8 = b'p';
const SCOPE_OPERATOR: u8 = b'o';

fn backend(e: rocksdb::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode<T: bincode::Encode>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StoreError::Codec(e.to_string()))
}

fn decode<T: bincode::Decode<()>>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::decode_from_slice(bytes, bincode::config::standard())
        .map(|(v, _)| v)
        .map_err(|e| StoreError::Codec(e.to_string()))
}

/// Big-endian bytes whose lexicographic order matches signed order.
fn ts_key(ts: Timestamp) -> [u8; 8] {
    ((ts as u64) ^ (1 << 63)).to_be_bytes()
}

fn read_u64(bytes: &[u8]) -> Result<u64, StoreError> {
    let arr: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Codec("invalid u64 length".into()))?;
    Ok(u64::from_be_bytes(arr))
}

fn category_byte(category: BenchmarkCategory) -> u8 {
    BenchmarkCategory::ALL
        .iter()
        .position(|c| *c == category)
        .map_or(u8::MAX, |i| i as u8)
}

/// RocksDB-backed reputation store.
///
/// All record keys that need a tiebreaker get a store-wide sequence number,
/// so two samples with the same timestamp never overwrite each other.
pub struct RocksStore {
    db: DB,
    /// Serialises read-modify-write paths (sequence allocation, liveness
    /// dedup, blacklist generation flips).
    write_lock: Mutex<u64>,
}

impl RocksStore {
    /// Open or create a RocksDB database at the given path.
    ///
    /// Creates all column families if they don't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&db_opts, path.as_ref(), cf_descriptors).map_err(backend)?;

        let next_seq = {
            let cf = db
                .cf_handle(CF_METADATA)
                .ok_or_else(|| StoreError::MissingColumnFamily(CF_METADATA.into()))?;
            match db.get_cf(cf, META_NEXT_SEQ).map_err(backend)? {
                Some(bytes) => read_u64(&bytes)?,
                None => 0,
            }
        };
        info!(path = %path.as_ref().display(), next_seq, "storage: opened");

        Ok(Self {
            db,
            write_lock: Mutex::new(next_seq),
        })
    }

    /// Flush all in-memory buffers to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush().map_err(backend)
    }

    // --- Internal helpers ---

    /// Get a column family handle.
    fn cf_handle(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::MissingColumnFamily(name.to_string()))
    }

    /// Take the next sequence number and stage the advanced counter in `batch`.
    fn stage_seq(&self, seq: &mut u64, batch: &mut WriteBatch) -> Result<u64, StoreError> {
        let cf = self.cf_handle(CF_METADATA)?;
        let current = *seq;
        *seq += 1;
        batch.put_cf(cf, META_NEXT_SEQ, seq.to_be_bytes());
        Ok(current)
    }

    fn liveness_key(node: &NodeId, ts: Timestamp, seq: u64) -> Vec<u8> {
        let mut key = node.as_str().as_bytes().to_vec();
        key.extend_from_slice(&ts_key(ts));
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    /// The node's last stored observation at or before `ts`.
    fn liveness_before(
        &self,
        node: &NodeId,
        ts: Timestamp,
    ) -> Result<Option<LivenessObservation>, StoreError> {
        let cf = self.cf_handle(CF_LIVENESS)?;
        let prefix = node.as_str().as_bytes();
        let start = Self::liveness_key(node, ts, u64::MAX);
        let mut iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Reverse));
        match iter.next() {
            Some(item) => {
                let (key, value) = item.map_err(backend)?;
                if key.starts_with(prefix) {
                    Ok(Some(decode(&value)?))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    fn benchmark_key(category: BenchmarkCategory, ts: Timestamp, seq: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(17);
        key.push(category_byte(category));
        key.extend_from_slice(&ts_key(ts));
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn task_key(ts: Timestamp, seq: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(16);
        key.extend_from_slice(&ts_key(ts));
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn blacklist_prefix(scope: u8, generation: u64) -> Vec<u8> {
        let mut key = Vec::with_capacity(13);
        key.push(scope);
        key.extend_from_slice(&generation.to_be_bytes());
        key
    }

    fn generation_meta(scope: u8) -> &'static [u8] {
        if scope == SCOPE_PROVIDER {
            META_PROVIDER_BLACKLIST_GEN
        } else {
            META_OPERATOR_BLACKLIST_GEN
        }
    }

    /// Decode every value whose key starts with `prefix`, in key order.
    fn scan_prefix<T: bincode::Decode<()>>(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<T>, StoreError> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(backend)?;
            if !key.starts_with(prefix) {
                break;
            }
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Decode every value from `start` to the end of the column family.
    fn scan_from<T: bincode::Decode<()>>(
        &self,
        cf_name: &str,
        start: &[u8],
    ) -> Result<Vec<T>, StoreError> {
        let cf = self.cf_handle(cf_name)?;
        let iter = self
            .db
            .iterator_cf(cf, IteratorMode::From(start, Direction::Forward));
        let mut out = Vec::new();
        for item in iter {
            let (_, value) = item.map_err(backend)?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn replace_blacklist(&self, scope: u8, entries: &[BlacklistEntry]) -> Result<(), StoreError> {
        let cf_blacklist = self.cf_handle(CF_BLACKLIST)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let meta_key = Self::generation_meta(scope);

        let _guard = self.write_lock.lock();
        let current = match self.db.get_cf(cf_meta, meta_key).map_err(backend)? {
            Some(bytes) => read_u64(&bytes)?,
            None => 0,
        };
        let next = current + 1;

        let mut batch = WriteBatch::default();
        let prefix = Self::blacklist_prefix(scope, next);
        for (i, entry) in entries.iter().enumerate() {
            let mut key = prefix.clone();
            key.extend_from_slice(&(i as u32).to_be_bytes());
            batch.put_cf(cf_blacklist, key, encode(entry)?);
        }
        batch.put_cf(cf_meta, meta_key, next.to_be_bytes());
        batch.delete_range_cf(
            cf_blacklist,
            Self::blacklist_prefix(scope, current),
            Self::blacklist_prefix(scope, next),
        );
        self.db.write(batch).map_err(backend)?;

        let scope = scope as char;
        debug!(%scope, generation = next, count = entries.len(), "storage: blacklist replaced");
        Ok(())
    }

    fn read_blacklist(&self, scope: u8) -> Result<Vec<BlacklistEntry>, StoreError> {
        let cf_blacklist = self.cf_handle(CF_BLACKLIST)?;
        let cf_meta = self.cf_handle(CF_METADATA)?;
        let snapshot = self.db.snapshot();

        let generation = match snapshot
            .get_cf(cf_meta, Self::generation_meta(scope))
            .map_err(backend)?
        {
            Some(bytes) => read_u64(&bytes)?,
            None => return Ok(Vec::new()),
        };

        let prefix = Self::blacklist_prefix(scope, generation);
        let mut out = Vec::new();
        for item in snapshot.iterator_cf(cf_blacklist, IteratorMode::From(&prefix, Direction::Forward)) {
            let (key, value) = item.map_err(backend)?;
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(decode(&value)?);
        }
        Ok(out)
    }
}

impl ReputationStore for RocksStore {
    fn upsert_provider(&self, provider: &Provider) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_PROVIDERS)?;
        self.db
            .put_cf(cf, provider.id.as_str().as_bytes(), encode(provider)?)
            .map_err(backend)
    }

    fn record_liveness(&self, observation: &LivenessObservation) -> Result<bool, StoreError> {
        let cf_latest = self.cf_handle(CF_LIVENESS_LATEST)?;
        let cf_history = self.cf_handle(CF_LIVENESS)?;
        let node_key = observation.node_id.as_str().as_bytes();

        let mut seq = self.write_lock.lock();
        if let Some(previous) = self.liveness_before(&observation.node_id, observation.timestamp)? {
            if previous.online == observation.online {
                return Ok(false);
            }
        }
        // A late observation lands in history but never replaces a newer latest.
        let is_newest = match self.db.get_cf(cf_latest, node_key).map_err(backend)? {
            Some(bytes) => {
                let latest: LivenessObservation = decode(&bytes)?;
                observation.timestamp >= latest.timestamp
            }
            None => true,
        };

        let value = encode(observation)?;
        let mut batch = WriteBatch::default();
        let n = self.stage_seq(&mut *seq, &mut batch)?;
        batch.put_cf(
            cf_history,
            Self::liveness_key(&observation.node_id, observation.timestamp, n),
            &value,
        );
        if is_newest {
            batch.put_cf(cf_latest, node_key, &value);
        }
        self.db.write(batch).map_err(backend)?;
        Ok(true)
    }

    fn record_benchmark(&self, sample: &BenchmarkSample) -> Result<(), StoreError> {
        let cf = self.cf_handle(CF_BENCHMARKS)?;
        let value = encode(sample)?;

        let mut seq = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let n = self.stage_seq(&mut *seq, &mut batch)?;
        batch.put_cf(cf, Self::benchmark_key(sample.category, sample.timestamp, n), value);
        self.db.write(batch).map_err(backend)
    }

    fn record_task_outcome(&self, outcome: &TaskOutcome) -> Result<(), StoreError> {
        let cf_tasks = self.cf_handle(CF_TASKS)?;
        let value = encode(outcome)?;

        let mut seq = self.write_lock.lock();
        let mut batch = WriteBatch::default();
        let n = self.stage_seq(&mut *seq, &mut batch)?;
        batch.put_cf(cf_tasks, Self::task_key(outcome.timestamp, n), value);
        self.db.write(batch).map_err(backend)
    }

    fn provider(&self, id: &NodeId) -> Result<Option<Provider>, StoreError> {
        let cf = self.cf_handle(CF_PROVIDERS)?;
        match self.db.get_cf(cf, id.as_str().as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn providers(&self, network: Option<Network>) -> Result<Vec<Provider>, StoreError> {
        let all: Vec<Provider> = self.scan_from(CF_PROVIDERS, &[])?;
        Ok(all
            .into_iter()
            .filter(|p| network.is_none_or(|n| p.network == n))
            .collect())
    }

    fn liveness_history(&self, node: &NodeId) -> Result<Vec<LivenessObservation>, StoreError> {
        self.scan_prefix(CF_LIVENESS, node.as_str().as_bytes())
    }

    fn latest_liveness(&self, node: &NodeId) -> Result<Option<LivenessObservation>, StoreError> {
        let cf = self.cf_handle(CF_LIVENESS_LATEST)?;
        match self.db.get_cf(cf, node.as_str().as_bytes()).map_err(backend)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn online_providers(&self) -> Result<HashSet<NodeId>, StoreError> {
        let latest: Vec<LivenessObservation> = self.scan_from(CF_LIVENESS_LATEST, &[])?;
        Ok(latest
            .into_iter()
            .filter(|o| o.online)
            .map(|o| o.node_id)
            .collect())
    }

    fn benchmark_samples(
        &self,
        category: BenchmarkCategory,
        since: Timestamp,
    ) -> Result<Vec<BenchmarkSample>, StoreError> {
        let start = Self::benchmark_key(category, since, 0);
        let cf = self.cf_handle(CF_BENCHMARKS)?;
        let prefix = [category_byte(category)];
        let mut out = Vec::new();
        for item in self
            .db
            .iterator_cf(cf, IteratorMode::From(&start, Direction::Forward))
        {
            let (key, value) = item.map_err(backend)?;
            if !key.starts_with(&prefix) {
                break;
            }
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    fn task_outcomes_since(&self, since: Timestamp) -> Result<Vec<TaskOutcome>, StoreError> {
        self.scan_from(CF_TASKS, &Self::task_key(since, 0))
    }

    fn replace_provider_blacklist(&self, entries: &[BlacklistEntry]) -> Result<(), StoreError> {
        self.replace_blacklist(SCOPE_PROVIDER, entries)
    }

    fn replace_operator_blacklist(&self, entries: &[BlacklistEntry]) -> Result<(), StoreError> {
        self.replace_blacklist(SCOPE_OPERATOR, entries)
    }

    fn provider_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.read_blacklist(SCOPE_PROVIDER)
    }

    fn operator_blacklist(&self) -> Result<Vec<BlacklistEntry>, StoreError> {
        self.read_blacklist(SCOPE_OPERATOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_key_orders_negative_before_positive() {
        assert!(ts_key(-1) < ts_key(0));
        assert!(ts_key(0) < ts_key(1));
        assert!(ts_key(i64::MIN) < ts_key(i64::MAX));
    }

    #[test]
    fn category_bytes_are_distinct() {
        let bytes: HashSet<u8> = BenchmarkCategory::ALL.iter().map(|c| category_byte(*c)).collect();
        assert_eq!(bytes.len(), BenchmarkCategory::ALL.len());
    }

    #[test]
    fn blacklist_generations_do_not_share_prefixes() {
        let a = RocksStore::blacklist_prefix(SCOPE_PROVIDER, 1);
        let b = RocksStore::blacklist_prefix(SCOPE_PROVIDER, 2);
        let c = RocksStore::blacklist_prefix(SCOPE_OPERATOR, 1);
        assert!(a < b);
        assert!(!b.starts_with(&a));
        assert_ne!(a, c);
    }
}
