//! # Checkpoint Store
//!
//! Durable per-stream offsets over sled. Each relay loop records the
//! absolute event-log offset it has fully processed, keyed by a stream
//! name ("hub-positions", "hub-bridge", "spoke-bridge"). On restart the
//! loops resume from these — nothing skipped, and nothing the domains'
//! idempotency keys wouldn't neutralize if a crash landed between
//! delivery and checkpoint.
//!
//! Offsets are stored as big-endian `u64` bytes and flushed on every
//! write. A checkpoint that survives only until the next power cut is no
//! checkpoint at all.

use sled::Db;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur in the checkpoint store.
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("corrupt checkpoint value for stream {stream}")]
    Corrupt {
        /// The stream whose stored value was not 8 bytes.
        stream: String,
    },
}

/// Durable map of stream name → last fully processed offset.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    db: Db,
}

impl CheckpointStore {
    /// Open or create a checkpoint database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CheckpointError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }

    /// Create a temporary in-memory store. For tests.
    pub fn open_temporary() -> Result<Self, CheckpointError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    /// The last checkpointed offset for `stream`, or 0 if never written.
    pub fn get(&self, stream: &str) -> Result<u64, CheckpointError> {
        match self.db.get(stream.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.as_ref().try_into().map_err(|_| {
                    CheckpointError::Corrupt {
                        stream: stream.to_string(),
                    }
                })?;
                Ok(u64::from_be_bytes(arr))
            }
            None => Ok(0),
        }
    }

    /// Persists `offset` for `stream`, flushed to disk before returning.
    pub fn set(&self, stream: &str, offset: u64) -> Result<(), CheckpointError> {
        self.db.insert(stream.as_bytes(), offset.to_be_bytes().to_vec())?;
        self.db.flush()?;
        Ok(())
    }
}
