//! Per-shard durable storage.

pub mod lock;
pub mod manifest;
pub mod record;
pub mod shard_store;

pub use lock::{RootLock, LOCK_FILE};
pub use manifest::{Manifest, MANIFEST_FILE};
pub use shard_store::{ShardOptions, ShardStore};

use serde::{Deserialize, Serialize};

/// A key/value pair as stored in one shard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub key: i64,
    pub value: String,
}
