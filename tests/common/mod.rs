#![allow(dead_code)]

use shard_store::{ShardStoreConfig, ShardedStore};
use tempfile::TempDir;

/// A store in a temporary directory that lives as long as the struct.
pub struct TestStore {
    pub store: ShardedStore,
    pub dir: TempDir,
}

impl TestStore {
    pub fn new(shard_count: u32) -> Self {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let store = ShardedStore::open_at(dir.path(), shard_count).expect("failed to open store");
        Self { store, dir }
    }

    pub fn with_config<F>(shard_count: u32, adjust: F) -> Self
    where
        F: FnOnce(ShardStoreConfig) -> ShardStoreConfig,
    {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let config = adjust(ShardStoreConfig::new(dir.path(), shard_count));
        let store = ShardedStore::open(config).expect("failed to open store");
        Self { store, dir }
    }

    /// Close and reopen the store over the same directory.
    pub fn reopen(self) -> Self {
        let TestStore { store, dir } = self;
        let config = store.config().clone();
        drop(store);
        let store = ShardedStore::open(config).expect("failed to reopen store");
        Self { store, dir }
    }
}
