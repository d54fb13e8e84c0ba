use super::ShardedStore;
use crate::error::Result;
use crate::sharding::ShardId;
use crate::statistics::{ShardStats, StoreStats};
use rayon::prelude::*;

impl ShardedStore {
    /// Compact every shard. Shards are independent, so this runs them in
    /// parallel; the first failure is returned after all shards have run.
    pub fn compact_all(&self) -> Result<()> {
        let results: Vec<Result<()>> = self.shards().par_iter().map(|s| s.compact()).collect();
        results.into_iter().collect()
    }

    pub fn compact_shard(&self, shard: ShardId) -> Result<()> {
        self.shard(shard)?.compact()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            shards: self.shards().iter().map(|s| s.stats()).collect(),
        }
    }

    pub fn shard_stats(&self, shard: ShardId) -> Result<ShardStats> {
        Ok(self.shard(shard)?.stats())
    }
}
