use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::Framing;

pub const DEFAULT_API: &str = "http://localhost:8080";
pub const DEFAULT_ROOT: &str = ".sy";
/// Larger blocks trade dedup granularity for fewer round trips.
pub const DEFAULT_BLOCK_SIZE: usize = 4 * 1024 * 1024;
pub const DEFAULT_FLUSH_THRESHOLD: u64 = 10 * 1024 * 1024;
/// Payload cap of one batch request; half the server's default body limit.
pub const DEFAULT_MAX_BATCH_BYTES: u64 = 32 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per request, including the first.
    pub attempts: u32,
    pub base_delay_ms: u64,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        attempts: 1,
        base_delay_ms: 0,
    };

    /// Backoff before attempt `attempt + 1`, doubling each time.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay_ms: 200,
        }
    }
}

/// Everything one `sy index` run needs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory tree to index.
    pub workdir: PathBuf,
    /// Index storage (metadata + chunk cache); excluded from the walk.
    pub root: PathBuf,
    pub api: String,
    pub block_size: usize,
    pub flush_threshold: u64,
    /// A flush is split into requests of at most this many payload bytes.
    /// A single chunk larger than this still travels alone.
    pub max_batch_bytes: u64,
    pub framing: Framing,
    pub retry: RetryPolicy,
}

impl SyncConfig {
    /// Index root resolved against the working directory.
    pub fn index_root(&self) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            self.workdir.join(&self.root)
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("."),
            root: PathBuf::from(DEFAULT_ROOT),
            api: DEFAULT_API.to_string(),
            block_size: DEFAULT_BLOCK_SIZE,
            flush_threshold: DEFAULT_FLUSH_THRESHOLD,
            max_batch_bytes: DEFAULT_MAX_BATCH_BYTES,
            framing: Framing::default(),
            retry: RetryPolicy::default(),
        }
    }
}
