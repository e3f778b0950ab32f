use std::path::Path;

use tokio::fs::File;
use tracing::debug;

use crate::chunking::fixed::FixedChunker;
use crate::error::{Result, SyError};
use crate::hash::blake3::chunk_id;
use crate::id::ChunkId;
use crate::index::local::LocalIndex;
use crate::util::random::random_file_id;

/// Outcome of chunking one file.
#[derive(Clone, Debug)]
pub struct ChunkedFile {
    pub file_id: i64,
    pub chunks: u64,
    pub bytes: u64,
    /// Ids this file introduced to the index, in first-seen order.
    pub fresh: Vec<ChunkId>,
}

pub struct Chunker<'a> {
    index: &'a LocalIndex,
    blocks: FixedChunker,
}

impl<'a> Chunker<'a> {
    pub fn new(index: &'a LocalIndex, block_size: usize) -> Self {
        Self {
            index,
            blocks: FixedChunker::new(block_size),
        }
    }

    /// Re-chunk `path` from scratch and record it under `key`.
    ///
    /// Any earlier record for `key` is dropped first. Each block gets a
    /// file_chunk edge; blocks the index has never seen are added and
    /// their bytes cached for upload. A read error aborts the file rather
    /// than leaving a truncated chunk sequence.
    pub async fn chunk_file(&self, path: &Path, key: &str) -> Result<ChunkedFile> {
        let file_io = |source: std::io::Error| SyError::FileIo {
            path: path.to_path_buf(),
            source,
        };
        let mut f = File::open(path).await.map_err(file_io)?;

        match self.index.remove_file(key).await {
            Ok(()) => debug!(path = key, "re-indexing"),
            Err(SyError::UnknownFile(_)) => {}
            Err(e) => return Err(e),
        }

        let file_id = random_file_id()?;
        let mut buf = Vec::new();
        let mut out = ChunkedFile {
            file_id,
            chunks: 0,
            bytes: 0,
            fresh: Vec::new(),
        };

        loop {
            let n = self
                .blocks
                .next_chunk(&mut f, &mut buf)
                .await
                .map_err(file_io)?;
            if n == 0 {
                break;
            }
            let block = &buf[..n];
            let id = chunk_id(block);

            self.index
                .add_file_chunk(file_id, &id, out.chunks as i64)
                .await?;
            out.chunks += 1;
            out.bytes += n as u64;

            if !self.index.exists(&id) {
                self.index.add_chunk(&id).await?;
                self.index.write_chunk(&id, block).await?;
                out.fresh.push(id);
            }
        }

        // whole-file checksum reserved, left empty
        self.index.add_file(file_id, "", key).await?;
        debug!(
            path = key,
            chunks = out.chunks,
            fresh = out.fresh.len(),
            "file chunked"
        );
        Ok(out)
    }
}
