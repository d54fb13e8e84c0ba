//! Store configuration.
//!
//! The shard count and storage root are fixed for the lifetime of an open
//! store. Configuration can be built in code, loaded from a JSON file, and
//! overridden from the environment.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_SHARDS: &str = "SHARD_STORE_SHARDS";
pub const ENV_ROOT: &str = "SHARD_STORE_ROOT";
pub const ENV_ON_CONFLICT: &str = "SHARD_STORE_ON_CONFLICT";

pub const DEFAULT_SHARD_COUNT: u32 = 3;
pub const DEFAULT_ROOT: &str = "db_files";

/// What `insert` does when the key already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Last write wins.
    #[default]
    Replace,
    /// Reject the write with `Error::DuplicateKey`.
    Fail,
}

impl FromStr for ConflictPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(ConflictPolicy::Replace),
            "fail" => Ok(ConflictPolicy::Fail),
            other => Err(Error::Config(format!(
                "invalid conflict policy: {}. Use 'replace' or 'fail'.",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// fsync after every write (safest, slowest)
    #[default]
    Sync,
    /// Flush to the OS only; a crash may lose the most recent writes
    Async,
}

/// Handling of a torn or corrupt tail found while opening a shard file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMode {
    /// Keep every intact record and cut the file at the first bad frame.
    #[default]
    TruncateTail,
    /// Refuse to open the shard.
    Strict,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    pub auto: bool,
    /// Garbage below this many bytes never triggers compaction.
    pub min_garbage_bytes: u64,
    /// Fraction of the file that must be garbage before compacting.
    pub garbage_ratio: f64,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            auto: true,
            min_garbage_bytes: 1024 * 1024,
            garbage_ratio: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardStoreConfig {
    pub shard_count: u32,
    pub root: PathBuf,
    pub on_conflict: ConflictPolicy,
    pub sync_mode: SyncMode,
    pub recovery: RecoveryMode,
    pub compaction: CompactionConfig,
}

impl Default for ShardStoreConfig {
    fn default() -> Self {
        Self {
            shard_count: DEFAULT_SHARD_COUNT,
            root: PathBuf::from(DEFAULT_ROOT),
            on_conflict: ConflictPolicy::default(),
            sync_mode: SyncMode::default(),
            recovery: RecoveryMode::default(),
            compaction: CompactionConfig::default(),
        }
    }
}

impl ShardStoreConfig {
    pub fn new<P: AsRef<Path>>(root: P, shard_count: u32) -> Self {
        Self {
            shard_count,
            root: root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.on_conflict = policy;
        self
    }

    pub fn with_sync_mode(mut self, mode: SyncMode) -> Self {
        self.sync_mode = mode;
        self
    }

    pub fn with_recovery(mut self, mode: RecoveryMode) -> Self {
        self.recovery = mode;
        self
    }

    pub fn with_compaction(mut self, compaction: CompactionConfig) -> Self {
        self.compaction = compaction;
        self
    }

    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    /// Apply `SHARD_STORE_*` environment overrides.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_SHARDS) {
            self.shard_count = raw.trim().parse().map_err(|e| {
                Error::Config(format!("{} must be a positive integer, got {:?}: {}", ENV_SHARDS, raw, e))
            })?;
        }
        if let Some(raw) = lookup(ENV_ROOT) {
            self.root = PathBuf::from(raw);
        }
        if let Some(raw) = lookup(ENV_ON_CONFLICT) {
            self.on_conflict = raw.parse()?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 {
            return Err(Error::Config("shard_count must be at least 1".to_string()));
        }
        if self.root.as_os_str().is_empty() {
            return Err(Error::Config("storage root must not be empty".to_string()));
        }
        if !(0.0..=1.0).contains(&self.compaction.garbage_ratio) {
            return Err(Error::Config(format!(
                "compaction.garbage_ratio must be within [0, 1], got {}",
                self.compaction.garbage_ratio
            )));
        }
        Ok(())
    }
}
