#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod id;
pub mod stats;

pub mod util {
    pub mod hex;
    pub mod random;
}

pub mod chunking {
    pub mod fixed;
}

pub mod hash {
    pub mod blake3;
}

pub mod index {
    pub mod local;
}

pub mod batch;
pub mod chunker;
pub mod protocol;
pub mod remote;
pub mod store;
pub mod sync;
pub mod walker;

// Re-exports: stable API surface
pub use config::{RetryPolicy, SyncConfig};
pub use error::{Result, SyError};
pub use hash::blake3::chunk_id;
pub use id::ChunkId;
pub use index::local::{KnownChunks, LocalIndex};
pub use remote::ChunkRemote;
pub use stats::RunReport;
pub use sync::{index_tree, run};
