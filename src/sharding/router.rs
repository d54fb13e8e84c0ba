use super::{ShardId, ShardRouter};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

/// Resolve `key` against `shard_count` shards.
///
/// The residue is taken with `rem_euclid`, so negative keys land in
/// `[0, shard_count)` just like positive ones: `resolve(-1, 3) == resolve(2, 3)`.
pub fn resolve(key: i64, shard_count: i64) -> Result<ShardId> {
    if shard_count <= 0 {
        return Err(Error::Config(format!(
            "shard count must be positive, got {}",
            shard_count
        )));
    }
    if shard_count > u32::MAX as i64 {
        return Err(Error::Config(format!(
            "shard count {} exceeds {}",
            shard_count,
            u32::MAX
        )));
    }
    Ok(ShardId::new(key.rem_euclid(shard_count) as u32 + 1))
}

/// All shard ids for a set of `shard_count` shards, in index order.
pub fn shard_ids(shard_count: u32) -> impl Iterator<Item = ShardId> {
    (1..=shard_count).map(ShardId::new)
}

/// `key mod N` router. Stateless beyond the shard count.
#[derive(Debug, Clone, Copy)]
pub struct ModuloRouter {
    shard_count: u32,
}

impl ModuloRouter {
    pub fn new(shard_count: u32) -> Result<Self> {
        if shard_count == 0 {
            return Err(Error::Config("shard count must be at least 1".to_string()));
        }
        Ok(Self { shard_count })
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> {
        shard_ids(self.shard_count)
    }

    /// Count how many of `keys` each shard would receive.
    pub fn distribution<I>(&self, keys: I) -> BTreeMap<ShardId, u64>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut counts: BTreeMap<ShardId, u64> = self.shard_ids().map(|id| (id, 0)).collect();
        for key in keys {
            *counts.entry(self.route(key)).or_insert(0) += 1;
        }
        counts
    }
}

impl ShardRouter for ModuloRouter {
    #[inline]
    fn route(&self, key: i64) -> ShardId {
        ShardId::new(key.rem_euclid(self.shard_count as i64) as u32 + 1)
    }

    fn shard_count(&self) -> u32 {
        self.shard_count
    }
}
