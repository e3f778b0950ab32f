use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

use super::ChunkRemote;
use crate::error::{Result, SyError};
use crate::id::ChunkId;

/// In-process remote for driving the client without a server.
#[derive(Default)]
pub struct MemoryRemote {
    chunks: Mutex<BTreeMap<ChunkId, Vec<u8>>>,
    diff_calls: AtomicU64,
    batch_calls: AtomicU64,
    largest_batch: AtomicU64,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a chunk out of band, as another client would.
    pub fn insert(&self, id: ChunkId, bytes: Vec<u8>) {
        self.lock().entry(id).or_insert(bytes);
    }

    pub fn get(&self, id: &ChunkId) -> Option<Vec<u8>> {
        self.lock().get(id).cloned()
    }

    pub fn contains(&self, id: &ChunkId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn diff_calls(&self) -> u64 {
        self.diff_calls.load(Ordering::Relaxed)
    }

    pub fn batch_calls(&self) -> u64 {
        self.batch_calls.load(Ordering::Relaxed)
    }

    /// Payload bytes of the biggest batch received so far.
    pub fn largest_batch(&self) -> u64 {
        self.largest_batch.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ChunkId, Vec<u8>>> {
        // a poisoned map is still a valid map
        self.chunks.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ChunkRemote for MemoryRemote {
    async fn diff(&self, chunks: &[ChunkId]) -> Result<Vec<ChunkId>> {
        self.diff_calls.fetch_add(1, Ordering::Relaxed);
        let store = self.lock();
        let mut seen = HashSet::new();
        Ok(chunks
            .iter()
            .filter(|id| !store.contains_key(*id) && seen.insert(*id))
            .cloned()
            .collect())
    }

    async fn upload(&self, id: &ChunkId, bytes: Bytes) -> Result<()> {
        if crate::hash::blake3::chunk_id(&bytes) != *id {
            return Err(SyError::Protocol(format!("content does not match {id}")));
        }
        self.insert(id.clone(), bytes.to_vec());
        Ok(())
    }

    async fn upload_batch(&self, chunks: Vec<(ChunkId, Bytes)>) -> Result<()> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        let size: u64 = chunks.iter().map(|(_, b)| b.len() as u64).sum();
        self.largest_batch.fetch_max(size, Ordering::Relaxed);
        for (id, bytes) in chunks {
            self.upload(&id, bytes).await?;
        }
        Ok(())
    }
}
