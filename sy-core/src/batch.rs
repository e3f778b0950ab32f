use std::collections::{BTreeMap, HashSet};

use bytes::Bytes;
use tracing::{debug, info};

use crate::error::Result;
use crate::id::ChunkId;
use crate::index::local::LocalIndex;
use crate::remote::ChunkRemote;
use crate::stats::BatchStats;

/// Collects freshly cached chunks and ships them in size-bounded batches.
///
/// Local novelty is not remote novelty: another client (or an earlier,
/// interrupted run) may have uploaded the same content. So before a batch
/// goes out the queue is re-checked with a diff and anything the remote
/// already holds is dropped. Every chunk that leaves the queue, uploaded or
/// dropped, is deleted from the local cache. A flush goes out as one or
/// more requests of at most `max_batch` payload bytes each.
pub struct UploadBatcher<'a, R: ChunkRemote> {
    index: &'a LocalIndex,
    remote: &'a R,
    threshold: u64,
    max_batch: u64,
    pending: BTreeMap<ChunkId, u64>,
    total: u64,
    stats: BatchStats,
}

impl<'a, R: ChunkRemote> UploadBatcher<'a, R> {
    pub fn new(index: &'a LocalIndex, remote: &'a R, threshold: u64, max_batch: u64) -> Self {
        Self {
            index,
            remote,
            threshold,
            max_batch: max_batch.max(1),
            pending: BTreeMap::new(),
            total: 0,
            stats: BatchStats::default(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_bytes(&self) -> u64 {
        self.total
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    pub async fn enqueue(&mut self, ids: &[ChunkId]) -> Result<()> {
        for id in ids {
            if self.pending.contains_key(id) {
                continue;
            }
            let size = self.index.store().size(id).await?;
            self.pending.insert(id.clone(), size);
            self.total += size;
        }
        Ok(())
    }

    /// Threshold check after a file. Returns true if a batch was flushed.
    pub async fn after_file(&mut self) -> Result<bool> {
        if self.total <= self.threshold {
            return Ok(false);
        }
        self.revalidate().await?;
        if self.total <= self.threshold {
            return Ok(false);
        }
        self.flush().await?;
        Ok(true)
    }

    /// Drop every pending chunk the remote already has.
    pub async fn revalidate(&mut self) -> Result<usize> {
        if self.pending.is_empty() {
            return Ok(0);
        }
        self.stats.revalidations += 1;
        let candidates: Vec<ChunkId> = self.pending.keys().cloned().collect();
        let unknown: HashSet<ChunkId> = self.remote.diff(&candidates).await?.into_iter().collect();

        let mut dropped = 0;
        for id in candidates {
            if unknown.contains(&id) {
                continue;
            }
            if let Some(size) = self.pending.remove(&id) {
                self.total -= size;
                self.index.delete_chunk(&id).await?;
                dropped += 1;
            }
        }
        self.stats.skipped_remote += dropped as u64;
        debug!(dropped, remaining = self.pending.len(), "revalidated queue");
        Ok(dropped)
    }

    /// Ship everything pending, `max_batch` bytes per request, emptying the
    /// queue. Only one request's chunks are held in memory at a time.
    pub async fn flush(&mut self) -> Result<()> {
        let queued: Vec<(ChunkId, u64)> = self
            .pending
            .iter()
            .map(|(id, size)| (id.clone(), *size))
            .collect();
        let mut batch = Vec::new();
        let mut batch_bytes = 0;
        for (id, size) in queued {
            if !batch.is_empty() && batch_bytes + size > self.max_batch {
                self.send(std::mem::take(&mut batch), batch_bytes).await?;
                batch_bytes = 0;
            }
            batch.push(id);
            batch_bytes += size;
        }
        if !batch.is_empty() {
            self.send(batch, batch_bytes).await?;
        }
        Ok(())
    }

    async fn send(&mut self, ids: Vec<ChunkId>, bytes: u64) -> Result<()> {
        let mut parts = Vec::with_capacity(ids.len());
        for id in &ids {
            parts.push((id.clone(), Bytes::from(self.index.read_chunk(id).await?)));
        }
        self.remote.upload_batch(parts).await?;

        for id in &ids {
            self.index.delete_chunk(id).await?;
            if let Some(size) = self.pending.remove(id) {
                self.total -= size;
            }
        }
        info!(chunks = ids.len(), bytes, "batch uploaded");
        self.stats.uploaded += ids.len() as u64;
        self.stats.bytes_uploaded += bytes;
        self.stats.batches += 1;
        Ok(())
    }

    /// End of run: whatever is left goes out regardless of the threshold.
    pub async fn finish(mut self) -> Result<BatchStats> {
        if !self.pending.is_empty() {
            self.revalidate().await?;
            self.flush().await?;
        }
        Ok(self.stats)
    }
}
