use serde::{Deserialize, Serialize};

/// Upload-side counters for one run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    pub revalidations: u64,
    /// Dropped from the queue because the remote already had them.
    pub skipped_remote: u64,
    pub uploaded: u64,
    pub bytes_uploaded: u64,
    pub batches: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub files: u64,
    /// Every block read, duplicates included.
    pub chunks: u64,
    /// Blocks not known to the local index before this run.
    pub new_chunks: u64,
    pub bytes_read: u64,
    pub upload: BatchStats,
}
