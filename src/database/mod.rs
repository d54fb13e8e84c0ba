//! The caller-facing sharded store.
//!
//! `ShardedStore` owns the router and one [`ShardStore`] per shard. It is
//! built once at startup and shared by reference (or `Arc`); there is no
//! global state. Every operation resolves the key to exactly one shard and
//! touches only that shard's lock.

pub mod lifecycle;
pub mod maintenance;
pub mod operations;

use crate::config::ShardStoreConfig;
use crate::sharding::{ModuloRouter, ShardId};
use crate::storage::{RootLock, ShardStore};
use serde::{Deserialize, Serialize};

/// A record together with the shard that holds it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardRecord {
    pub shard: ShardId,
    pub key: i64,
    pub value: String,
}

pub struct ShardedStore {
    config: ShardStoreConfig,
    router: ModuloRouter,
    /// Indexed by `ShardId::index()`; fixed after open.
    shards: Vec<ShardStore>,
    /// Held for the store's lifetime; dropped after the shards.
    _lock: RootLock,
}

impl std::fmt::Debug for ShardedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStore")
            .field("root", &self.config.root)
            .field("shard_count", &self.shards.len())
            .finish()
    }
}
