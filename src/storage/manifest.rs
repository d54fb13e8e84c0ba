use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::info;

pub const MANIFEST_FILE: &str = "MANIFEST.json";
pub const MANIFEST_VERSION: u32 = 1;

/// Records the shard count a storage root was created with.
///
/// Routing is `key mod N`, so reopening with a different N would silently
/// address the wrong shard for existing keys. The manifest turns that into a
/// configuration error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub format_version: u32,
    pub shard_count: u32,
}

impl Manifest {
    pub fn new(shard_count: u32) -> Self {
        Self {
            format_version: MANIFEST_VERSION,
            shard_count,
        }
    }

    /// Read the manifest under `root`, writing one if the root is fresh.
    pub fn load_or_create(root: &Path, shard_count: u32) -> Result<Self> {
        let path = root.join(MANIFEST_FILE);

        if !path.exists() {
            let manifest = Self::new(shard_count);
            manifest.write(root)?;
            info!(root = %root.display(), shard_count, "created store manifest");
            return Ok(manifest);
        }

        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        let manifest: Manifest = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("invalid manifest {}: {}", path.display(), e)))?;

        if manifest.format_version != MANIFEST_VERSION {
            return Err(Error::Config(format!(
                "unsupported manifest version {} in {}",
                manifest.format_version,
                path.display()
            )));
        }
        if manifest.shard_count != shard_count {
            return Err(Error::Config(format!(
                "store at {} was created with {} shards, configured with {}",
                root.display(),
                manifest.shard_count,
                shard_count
            )));
        }
        Ok(manifest)
    }

    fn write(&self, root: &Path) -> Result<()> {
        let path = root.join(MANIFEST_FILE);
        let tmp = root.join(format!("{}.tmp", MANIFEST_FILE));
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Serialization(format!("failed to encode manifest: {}", e)))?;

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&tmp, &path)
        };
        write().map_err(|e| Error::Config(format!("cannot write {}: {}", path.display(), e)))
    }
}
