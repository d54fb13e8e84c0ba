//! Shard identifiers and key routing.
//!
//! A key lives in exactly one shard. Shards are numbered `1..=N` and named
//! `shard_<n>`; the name doubles as the on-disk file stem, so it must never
//! change for a given index.

pub mod router;

pub use router::{resolve, shard_ids, ModuloRouter};

use serde::{Deserialize, Serialize};
use std::fmt;

/// 1-based shard identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardId(u32);

impl ShardId {
    /// Create a shard id from its 1-based number.
    #[inline]
    pub const fn new(number: u32) -> Self {
        Self(number)
    }

    #[inline]
    pub const fn number(&self) -> u32 {
        self.0
    }

    /// Zero-based position in the shard set.
    #[inline]
    pub fn index(&self) -> usize {
        (self.0 as usize).saturating_sub(1)
    }

    /// Storage file name, e.g. `shard_2.db`.
    pub fn file_name(&self) -> String {
        format!("shard_{}.db", self.0)
    }
}

impl From<u32> for ShardId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ShardId> for u32 {
    fn from(shard: ShardId) -> Self {
        shard.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard_{}", self.0)
    }
}

/// Maps a key to the shard that owns it.
pub trait ShardRouter: Send + Sync {
    fn route(&self, key: i64) -> ShardId;
    fn shard_count(&self) -> u32;
}
