use super::ShardedStore;
use crate::config::ShardStoreConfig;
use crate::error::{Error, Result};
use crate::sharding::{ModuloRouter, ShardId, ShardRouter};
use crate::storage::{Manifest, RootLock, ShardOptions, ShardStore};
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::info;

impl ShardedStore {
    /// Open (or create) every shard under `config.root`.
    ///
    /// Configuration problems, including a root that cannot be created and a
    /// shard count that disagrees with the one the root was created with,
    /// surface here as `Error::Config`. A shard file that cannot be opened is
    /// reported as that shard's storage error.
    ///
    /// A root is owned by one open store at a time: while this store is alive,
    /// another `open` on the same root fails with `Error::Config`.
    pub fn open(config: ShardStoreConfig) -> Result<Self> {
        let start = Instant::now();
        config.validate()?;
        let router = ModuloRouter::new(config.shard_count)?;

        fs::create_dir_all(&config.root).map_err(|e| {
            Error::Config(format!(
                "cannot create storage root {}: {}",
                config.root.display(),
                e
            ))
        })?;
        let lock = RootLock::acquire(&config.root)?;
        Manifest::load_or_create(&config.root, config.shard_count)?;

        let options = ShardOptions::from(&config);
        let shards = router
            .shard_ids()
            .map(|shard| ShardStore::open(shard, &config.root, options.clone()))
            .collect::<Result<Vec<_>>>()?;

        info!(
            root = %config.root.display(),
            shard_count = router.shard_count(),
            on_conflict = ?config.on_conflict,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "sharded store opened"
        );

        Ok(Self {
            config,
            router,
            shards,
            _lock: lock,
        })
    }

    /// Open with default settings for `shard_count` shards under `root`.
    pub fn open_at<P: AsRef<Path>>(root: P, shard_count: u32) -> Result<Self> {
        Self::open(ShardStoreConfig::new(root, shard_count))
    }

    pub fn config(&self) -> &ShardStoreConfig {
        &self.config
    }

    pub fn shard_count(&self) -> u32 {
        self.router.shard_count()
    }

    pub fn router(&self) -> &ModuloRouter {
        &self.router
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = ShardId> {
        self.router.shard_ids()
    }

    /// The shard that owns `key`.
    pub fn shard_for(&self, key: i64) -> ShardId {
        self.router.route(key)
    }

    /// Direct access to one shard's storage handle.
    pub fn shard(&self, shard: ShardId) -> Result<&ShardStore> {
        if shard.number() == 0 {
            return Err(Error::InvalidInput(format!("{} does not exist", shard)));
        }
        self.shards.get(shard.index()).ok_or_else(|| {
            Error::InvalidInput(format!(
                "{} does not exist; store has {} shards",
                shard,
                self.shards.len()
            ))
        })
    }

    pub(crate) fn shard_for_key(&self, key: i64) -> &ShardStore {
        // The router only yields ids in 1..=N and `shards` holds exactly N entries.
        &self.shards[self.router.route(key).index()]
    }

    pub(crate) fn shards(&self) -> &[ShardStore] {
        &self.shards
    }
}
