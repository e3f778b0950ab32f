use bytes::Bytes;

use crate::error::Result;
use crate::id::ChunkId;

pub mod http;
pub mod memory;

pub use http::HttpRemote;
pub use memory::MemoryRemote;

/// A store that can be asked what it lacks and handed chunk bytes.
#[allow(async_fn_in_trait)]
pub trait ChunkRemote {
    /// The subset of `chunks` the store does not have. No side effects.
    async fn diff(&self, chunks: &[ChunkId]) -> Result<Vec<ChunkId>>;

    async fn upload(&self, id: &ChunkId, bytes: Bytes) -> Result<()>;

    /// One transfer carrying every chunk.
    async fn upload_batch(&self, chunks: Vec<(ChunkId, Bytes)>) -> Result<()>;
}
