//! Embedded key-value store partitioned across a fixed set of shards.
//!
//! Keys are signed 64-bit integers routed with `key mod N` to one of
//! `shard_1 ..= shard_N`. Each shard is an independent single-file store
//! with its own lock, so operations on different shards never contend.
//!
//! ```no_run
//! use shard_store::{ShardStoreConfig, ShardedStore};
//!
//! # fn main() -> shard_store::Result<()> {
//! let store = ShardedStore::open(ShardStoreConfig::new("db_files", 3))?;
//! store.insert(1, "UserA")?;
//! assert_eq!(store.get(1)?.as_deref(), Some("UserA"));
//! for record in store.scan_all()? {
//!     println!("{} {} {}", record.shard, record.key, record.value);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod database;
pub mod error;
pub mod key;
pub mod logging;
pub mod sharding;
pub mod statistics;
pub mod storage;

pub use config::{CompactionConfig, ConflictPolicy, RecoveryMode, ShardStoreConfig, SyncMode};
pub use database::{ShardRecord, ShardedStore};
pub use error::{Error, Result};
pub use key::parse_key;
pub use sharding::{resolve, ModuloRouter, ShardId, ShardRouter};
pub use statistics::{ShardStats, StoreStats};
pub use storage::{Record, ShardOptions, ShardStore};
