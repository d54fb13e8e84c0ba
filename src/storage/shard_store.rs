//! Storage engine for a single shard.
//!
//! Each shard is one append-only file of checksummed records. The live table
//! (`key -> value`) is rebuilt in memory on open by replaying the file, and
//! every write appends exactly one frame before the in-memory table changes.
//!
//! Locking is per shard: reads share a `RwLock`, writes hold it exclusively
//! for the append and the table update, so a reader sees either the state
//! before a write or after it.

use super::record::{encode_header, check_header, FrameReader, LogRecord, HEADER_LEN};
use super::Record;
use crate::config::{CompactionConfig, ConflictPolicy, RecoveryMode, ShardStoreConfig, SyncMode};
use crate::error::{Error, Result};
use crate::log_operation;
use crate::sharding::ShardId;
use crate::statistics::{ShardCounters, ShardStats};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Per-shard behavior, taken from the store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ShardOptions {
    pub on_conflict: ConflictPolicy,
    pub sync_mode: SyncMode,
    pub recovery: RecoveryMode,
    pub compaction: CompactionConfig,
}

impl Default for ShardOptions {
    fn default() -> Self {
        Self::from(&ShardStoreConfig::default())
    }
}

impl From<&ShardStoreConfig> for ShardOptions {
    fn from(config: &ShardStoreConfig) -> Self {
        Self {
            on_conflict: config.on_conflict,
            sync_mode: config.sync_mode,
            recovery: config.recovery,
            compaction: config.compaction.clone(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: String,
    /// Size of the frame that wrote this value.
    frame_len: u64,
}

struct ShardState {
    file: File,
    index: BTreeMap<i64, Entry>,
    file_len: u64,
    /// Bytes of frames still backing a live entry.
    live_bytes: u64,
    /// Set when a partial frame could not be cut off the file. The tail is
    /// unknown, so writes are refused until a reopen or a compaction rewrites it.
    failed: Option<String>,
}

impl ShardState {
    fn garbage_bytes(&self) -> u64 {
        self.file_len
            .saturating_sub(HEADER_LEN)
            .saturating_sub(self.live_bytes)
    }

    fn apply_put(&mut self, key: i64, value: String, frame_len: u64) -> bool {
        self.live_bytes += frame_len;
        match self.index.insert(key, Entry { value, frame_len }) {
            Some(previous) => {
                self.live_bytes -= previous.frame_len;
                true
            }
            None => false,
        }
    }

    fn apply_delete(&mut self, key: i64) -> bool {
        match self.index.remove(&key) {
            Some(previous) => {
                self.live_bytes -= previous.frame_len;
                true
            }
            None => false,
        }
    }
}

/// Handle to one open shard. Dropping it closes the file.
pub struct ShardStore {
    shard: ShardId,
    path: PathBuf,
    options: ShardOptions,
    state: RwLock<ShardState>,
    counters: ShardCounters,
}

impl std::fmt::Debug for ShardStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardStore")
            .field("shard", &self.shard)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn open_for_append(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
}

impl ShardStore {
    /// Open the shard file under `root`, creating it if absent.
    ///
    /// Safe to call on every startup: an existing file is validated and
    /// replayed, never rewritten.
    pub fn open<P: AsRef<Path>>(shard: ShardId, root: P, options: ShardOptions) -> Result<Self> {
        let start = Instant::now();
        let root = root.as_ref();
        fs::create_dir_all(root).map_err(|e| Error::unavailable(shard, e))?;
        let path = root.join(shard.file_name());

        let mut file = open_for_append(&path).map_err(|e| Error::unavailable(shard, e))?;
        let mut bytes = Vec::new();
        file.seek(SeekFrom::Start(0))
            .and_then(|_| file.read_to_end(&mut bytes))
            .map_err(|e| Error::unavailable(shard, e))?;

        if bytes.len() < HEADER_LEN as usize {
            // Empty, or a header write that never finished.
            if !bytes.is_empty() && options.recovery == RecoveryMode::Strict {
                return Err(Error::Corrupted {
                    shard,
                    offset: 0,
                    reason: format!("incomplete header of {} bytes", bytes.len()),
                });
            }
            if !bytes.is_empty() {
                warn!(shard = %shard, bytes = bytes.len(), "rewriting incomplete shard header");
            }
            file.set_len(0)
                .and_then(|_| file.write_all(&encode_header()))
                .and_then(|_| file.sync_all())
                .map_err(|e| Error::unavailable(shard, e))?;
            bytes = encode_header().to_vec();
            debug!(shard = %shard, path = %path.display(), "created shard file");
        }

        check_header(&bytes).map_err(|reason| Error::Corrupted {
            shard,
            offset: 0,
            reason,
        })?;

        let mut state = ShardState {
            file,
            index: BTreeMap::new(),
            file_len: HEADER_LEN,
            live_bytes: 0,
            failed: None,
        };

        let body = &bytes[HEADER_LEN as usize..];
        for frame in FrameReader::new(body, HEADER_LEN) {
            match frame {
                Ok(frame) => {
                    state.file_len = frame.offset + frame.len;
                    match frame.record {
                        LogRecord::Put { key, value } => {
                            state.apply_put(key, value, frame.len);
                        }
                        LogRecord::Delete { key } => {
                            state.apply_delete(key);
                        }
                    }
                }
                Err(err) => {
                    if options.recovery == RecoveryMode::Strict {
                        return Err(Error::Corrupted {
                            shard,
                            offset: err.offset(),
                            reason: err.to_string(),
                        });
                    }
                    warn!(
                        shard = %shard,
                        offset = err.offset(),
                        dropped_bytes = bytes.len() as u64 - err.offset(),
                        "truncating damaged shard tail: {}",
                        err
                    );
                    state
                        .file
                        .set_len(err.offset())
                        .and_then(|_| state.file.sync_all())
                        .map_err(|e| Error::unavailable(shard, e))?;
                    break;
                }
            }
        }

        info!(
            shard = %shard,
            records = state.index.len(),
            file_bytes = state.file_len,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "opened shard"
        );

        Ok(Self {
            shard,
            path,
            options,
            state: RwLock::new(state),
            counters: ShardCounters::default(),
        })
    }

    pub fn shard(&self) -> ShardId {
        self.shard
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &ShardOptions {
        &self.options
    }

    /// Write `key -> value`. Returns whether an existing value was replaced.
    ///
    /// With [`ConflictPolicy::Fail`] an existing key is left untouched and
    /// `Error::DuplicateKey` is returned instead.
    ///
    /// A record is framed with a 32-bit length, so a key and value encoding to
    /// more than `u32::MAX` bytes is rejected with `Error::Serialization`.
    pub fn insert(&self, key: i64, value: &str) -> Result<bool> {
        let start = Instant::now();
        let mut state = self.state.write();

        if self.options.on_conflict == ConflictPolicy::Fail && state.index.contains_key(&key) {
            return Err(Error::DuplicateKey {
                key,
                shard: self.shard,
            });
        }

        let frame = LogRecord::Put {
            key,
            value: value.to_string(),
        }
        .encode_frame()?;
        self.append_frame(&mut state, &frame)?;
        let replaced = state.apply_put(key, value.to_string(), frame.len() as u64);

        self.counters.record_insert(replaced);
        self.maybe_compact(&mut state);
        log_operation!("insert", self.shard, key, start.elapsed());
        Ok(replaced)
    }

    pub fn get(&self, key: i64) -> Option<String> {
        let start = Instant::now();
        let value = self.state.read().index.get(&key).map(|e| e.value.clone());
        self.counters.record_get(value.is_some());
        log_operation!("get", self.shard, key, start.elapsed());
        value
    }

    pub fn contains(&self, key: i64) -> bool {
        self.state.read().index.contains_key(&key)
    }

    /// Remove `key`. Absent keys are a no-op and return `false`.
    pub fn delete(&self, key: i64) -> Result<bool> {
        let start = Instant::now();
        let mut state = self.state.write();

        if !state.index.contains_key(&key) {
            self.counters.record_delete();
            return Ok(false);
        }

        let frame = LogRecord::Delete { key }.encode_frame()?;
        self.append_frame(&mut state, &frame)?;
        state.apply_delete(key);

        self.counters.record_delete();
        self.maybe_compact(&mut state);
        log_operation!("delete", self.shard, key, start.elapsed());
        Ok(true)
    }

    /// Snapshot of every record, in ascending key order.
    pub fn scan(&self) -> Vec<Record> {
        let records: Vec<Record> = self
            .state
            .read()
            .index
            .iter()
            .map(|(key, entry)| Record {
                key: *key,
                value: entry.value.clone(),
            })
            .collect();
        self.counters.record_scan();
        debug!(shard = %self.shard, records = records.len(), "scanned shard");
        records
    }

    pub fn len(&self) -> usize {
        self.state.read().index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().index.is_empty()
    }

    /// Rewrite the shard file with only its live records.
    pub fn compact(&self) -> Result<()> {
        let mut state = self.state.write();
        self.compact_locked(&mut state)
    }

    pub fn stats(&self) -> ShardStats {
        let state = self.state.read();
        self.counters.snapshot(
            self.shard,
            state.index.len() as u64,
            state.file_len,
            state.garbage_bytes(),
        )
    }

    /// Append one frame. On failure the file is cut back to its previous
    /// length so no partial frame survives. If that cut fails too, the shard
    /// stops accepting writes.
    fn append_frame(&self, state: &mut ShardState, frame: &[u8]) -> Result<()> {
        if let Some(reason) = &state.failed {
            return Err(Error::unavailable(
                self.shard,
                format!("writes disabled until reopen: {}", reason),
            ));
        }

        let previous_len = state.file_len;
        let written = state.file.write_all(frame).and_then(|_| match self.options.sync_mode {
            SyncMode::Sync => state.file.sync_data(),
            SyncMode::Async => state.file.flush(),
        });

        if let Err(e) = written {
            if let Err(rollback) = state.file.set_len(previous_len) {
                error!(
                    shard = %self.shard,
                    "failed to roll back partial write: {}",
                    rollback
                );
                state.failed = Some(format!("partial write not rolled back: {}", rollback));
            }
            return Err(Error::unavailable(self.shard, e));
        }

        state.file_len += frame.len() as u64;
        Ok(())
    }

    fn maybe_compact(&self, state: &mut ShardState) {
        let policy = &self.options.compaction;
        if !policy.auto {
            return;
        }
        let garbage = state.garbage_bytes();
        if garbage < policy.min_garbage_bytes
            || (garbage as f64) < policy.garbage_ratio * state.file_len as f64
        {
            return;
        }
        // The triggering write is already durable; a failed compaction only
        // leaves the garbage in place.
        if let Err(e) = self.compact_locked(state) {
            warn!(shard = %self.shard, "automatic compaction failed: {}", e);
        }
    }

    fn compact_locked(&self, state: &mut ShardState) -> Result<()> {
        let start = Instant::now();
        let before = state.file_len;
        let tmp_path = self.path.with_extension("db.compact");

        let rewrite = || -> Result<(File, u64, Vec<(i64, u64)>)> {
            let file = open_for_append(&tmp_path)?;
            file.set_len(0)?;

            let mut frame_lens = Vec::with_capacity(state.index.len());
            let mut len = HEADER_LEN;
            {
                let mut writer = BufWriter::new(&file);
                writer.write_all(&encode_header())?;
                for (key, entry) in &state.index {
                    let frame = LogRecord::Put {
                        key: *key,
                        value: entry.value.clone(),
                    }
                    .encode_frame()?;
                    writer.write_all(&frame)?;
                    len += frame.len() as u64;
                    frame_lens.push((*key, frame.len() as u64));
                }
                writer.flush()?;
            }
            file.sync_all()?;
            fs::rename(&tmp_path, &self.path)?;
            Ok((file, len, frame_lens))
        };

        let (file, file_len, frame_lens) = match rewrite() {
            Ok(done) => done,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(Error::unavailable(self.shard, e));
            }
        };

        if let Some(dir) = self.path.parent() {
            if let Ok(dir) = File::open(dir) {
                let _ = dir.sync_all();
            }
        }

        for (key, frame_len) in frame_lens {
            if let Some(entry) = state.index.get_mut(&key) {
                entry.frame_len = frame_len;
            }
        }
        state.file = file;
        state.file_len = file_len;
        state.live_bytes = file_len - HEADER_LEN;
        state.failed = None;
        self.counters.record_compaction();

        info!(
            shard = %self.shard,
            before_bytes = before,
            after_bytes = file_len,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "compacted shard"
        );
        Ok(())
    }
}
