use super::{ShardRecord, ShardedStore};
use crate::error::Result;
use crate::sharding::ShardId;
use crate::storage::Record;
use rayon::prelude::*;
use tracing::debug;

impl ShardedStore {
    /// Store `value` under `key` in the key's shard and return that shard.
    ///
    /// An existing key is overwritten under `ConflictPolicy::Replace` and
    /// rejected with `Error::DuplicateKey` under `ConflictPolicy::Fail`.
    /// Values are unbounded in length apart from the per-record frame limit
    /// (`storage::record::MAX_PAYLOAD_LEN`, just under 4 GiB encoded), past
    /// which the insert fails with `Error::Serialization`.
    pub fn insert(&self, key: i64, value: &str) -> Result<ShardId> {
        let shard = self.shard_for_key(key);
        shard.insert(key, value)?;
        Ok(shard.shard())
    }

    /// Look up `key`. A missing key is `Ok(None)`, not an error.
    pub fn get(&self, key: i64) -> Result<Option<String>> {
        Ok(self.shard_for_key(key).get(key))
    }

    /// Remove `key`, returning whether it was present.
    pub fn delete(&self, key: i64) -> Result<bool> {
        self.shard_for_key(key).delete(key)
    }

    pub fn contains(&self, key: i64) -> bool {
        self.shard_for_key(key).contains(key)
    }

    /// Snapshot of a single shard.
    pub fn scan_shard(&self, shard: ShardId) -> Result<Vec<Record>> {
        Ok(self.shard(shard)?.scan())
    }

    /// Snapshot of every shard, in shard order `1..=N`.
    ///
    /// Each shard is snapshotted independently, so the result is not a single
    /// point-in-time view across shards.
    pub fn scan_all(&self) -> Result<Vec<ShardRecord>> {
        let per_shard: Vec<(ShardId, Vec<Record>)> = self
            .shards()
            .par_iter()
            .map(|store| (store.shard(), store.scan()))
            .collect();

        let records: Vec<ShardRecord> = per_shard
            .into_iter()
            .flat_map(|(shard, records)| {
                records.into_iter().map(move |record| ShardRecord {
                    shard,
                    key: record.key,
                    value: record.value,
                })
            })
            .collect();

        debug!(records = records.len(), "scanned all shards");
        Ok(records)
    }

    /// Total number of records across all shards.
    pub fn len(&self) -> usize {
        self.shards().iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards().iter().all(|s| s.is_empty())
    }
}
