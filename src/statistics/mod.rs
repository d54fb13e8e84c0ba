//! Per-shard operation counters.

use crate::sharding::ShardId;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free counters owned by one shard.
#[derive(Debug, Default)]
pub struct ShardCounters {
    inserts: AtomicU64,
    replacements: AtomicU64,
    gets: AtomicU64,
    hits: AtomicU64,
    deletes: AtomicU64,
    scans: AtomicU64,
    compactions: AtomicU64,
}

impl ShardCounters {
    pub fn record_insert(&self, replaced: bool) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
        if replaced {
            self.replacements.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_get(&self, hit: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_scan(&self) {
        self.scans.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_compaction(&self) {
        self.compactions.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine the counters with storage figures into a snapshot.
    pub fn snapshot(&self, shard: ShardId, records: u64, file_bytes: u64, garbage_bytes: u64) -> ShardStats {
        ShardStats {
            shard,
            records,
            file_bytes,
            garbage_bytes,
            inserts: self.inserts.load(Ordering::Relaxed),
            replacements: self.replacements.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            scans: self.scans.load(Ordering::Relaxed),
            compactions: self.compactions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardStats {
    pub shard: ShardId,
    pub records: u64,
    pub file_bytes: u64,
    pub garbage_bytes: u64,
    pub inserts: u64,
    pub replacements: u64,
    pub gets: u64,
    pub hits: u64,
    pub deletes: u64,
    pub scans: u64,
    pub compactions: u64,
}

impl ShardStats {
    pub fn hit_rate(&self) -> f64 {
        if self.gets == 0 {
            0.0
        } else {
            self.hits as f64 / self.gets as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub shards: Vec<ShardStats>,
}

impl StoreStats {
    pub fn total_records(&self) -> u64 {
        self.shards.iter().map(|s| s.records).sum()
    }

    pub fn total_file_bytes(&self) -> u64 {
        self.shards.iter().map(|s| s.file_bytes).sum()
    }
}
