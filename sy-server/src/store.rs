use std::collections::HashSet;
use std::path::Path;

use sy_core::store::ChunkStore;
use sy_core::{ChunkId, KnownChunks, LocalIndex, SyError, chunk_id};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::Result;

/// Server side of the protocol: a [`LocalIndex`] whose chunk cache is the
/// permanent store.
///
/// `diff` reads the shared known set and never waits on writers. Writes
/// take the index lock for a request-scoped transaction; inside it the
/// chunk row insert is the commit point, so two uploads of one id cannot
/// both win, and an id only becomes visible to `diff` after commit.
pub struct ServerStore {
    index: Mutex<LocalIndex>,
    known: KnownChunks,
    chunks: ChunkStore,
}

impl ServerStore {
    pub async fn open(root: &Path) -> Result<Self> {
        let index = LocalIndex::open(root).await?;
        let n = index.load().await?;
        info!(chunks = n, root = %root.display(), "chunk store loaded");
        let known = index.known_chunks();
        let chunks = index.store().clone();
        Ok(Self {
            index: Mutex::new(index),
            known,
            chunks,
        })
    }

    /// The candidates not yet stored, each once, in request order.
    pub fn diff(&self, candidates: &[ChunkId]) -> Vec<ChunkId> {
        let mut seen = HashSet::new();
        candidates
            .iter()
            .filter(|id| !self.known.contains(*id) && seen.insert(*id))
            .cloned()
            .collect()
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.known.contains(id)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    pub async fn read_chunk(&self, id: &ChunkId) -> Result<Vec<u8>> {
        Ok(self.chunks.read(id).await?)
    }

    /// Returns true if this call stored the chunk, false if it was already there.
    pub async fn store_chunk(&self, id: &ChunkId, bytes: &[u8]) -> Result<bool> {
        Ok(self.store_batch(&[(id.clone(), bytes)]).await? == 1)
    }

    /// Store every chunk in one transaction; returns how many were new.
    /// Content is checked against its id before anything is written.
    pub async fn store_batch<B: AsRef<[u8]>>(&self, chunks: &[(ChunkId, B)]) -> Result<usize> {
        for (id, bytes) in chunks {
            let actual = chunk_id(bytes.as_ref());
            if actual != *id {
                return Err(SyError::Protocol(format!(
                    "content of {id} hashes to {actual}"
                ))
                .into());
            }
        }
        let fresh: Vec<&(ChunkId, B)> = chunks.iter().filter(|(id, _)| !self.contains(id)).collect();
        if fresh.is_empty() {
            debug!(chunks = chunks.len(), "all chunks already stored");
            return Ok(0);
        }

        let mut index = self.index.lock().await;
        index.begin().await?;
        let claimed = match claim_and_write(&index, &fresh).await {
            Ok(won) => index.commit().await.map(|()| won),
            Err(e) => Err(e),
        };
        match claimed {
            Ok(won) => {
                for id in &won {
                    index.mark_known(id);
                }
                info!(stored = won.len(), offered = chunks.len(), "chunks stored");
                Ok(won.len())
            }
            Err(e) => {
                if let Err(rb) = index.rollback().await {
                    warn!(error = %rb, "rollback failed");
                }
                Err(e.into())
            }
        }
    }
}

async fn claim_and_write<B: AsRef<[u8]>>(
    index: &LocalIndex,
    chunks: &[&(ChunkId, B)],
) -> sy_core::Result<Vec<ChunkId>> {
    let mut won = Vec::new();
    for (id, bytes) in chunks.iter().copied() {
        if !index.claim_chunk(id).await? {
            debug!(chunk = %id, "already stored");
            continue;
        }
        index.write_chunk(id, bytes.as_ref()).await?;
        won.push(id.clone());
    }
    Ok(won)
}
