use crate::sharding::ShardId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage unavailable for {shard}: {reason}")]
    StorageUnavailable { shard: ShardId, reason: String },

    #[error("Corrupted {shard} at offset {offset}: {reason}")]
    Corrupted {
        shard: ShardId,
        offset: u64,
        reason: String,
    },

    #[error("Key {key} already exists in {shard}")]
    DuplicateKey { key: i64, shard: ShardId },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::Io(_) => -1,
            Error::Config(_) => -2,
            Error::StorageUnavailable { .. } => -3,
            Error::Corrupted { .. } => -4,
            Error::DuplicateKey { .. } => -5,
            Error::InvalidInput(_) => -6,
            Error::Serialization(_) => -7,
        }
    }

    /// Wraps an I/O failure on a specific shard.
    pub(crate) fn unavailable(shard: ShardId, err: impl std::fmt::Display) -> Self {
        Error::StorageUnavailable {
            shard,
            reason: err.to_string(),
        }
    }

    /// True for errors a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StorageUnavailable { .. } | Error::Io(_))
    }
}
