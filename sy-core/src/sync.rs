use tracing::{info, warn};

use crate::batch::UploadBatcher;
use crate::chunker::Chunker;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::index::local::LocalIndex;
use crate::remote::{ChunkRemote, HttpRemote};
use crate::stats::RunReport;
use crate::walker::{TreeWalker, WalkEntry};

/// One full `sy index` run against the configured HTTP remote.
pub async fn run(cfg: &SyncConfig) -> Result<RunReport> {
    let remote = HttpRemote::new(&cfg.api, cfg.framing, cfg.retry)?;
    let mut index = LocalIndex::open(cfg.index_root()).await?;
    index.load().await?;
    let report = index_tree(&mut index, &remote, cfg).await;
    index.close();
    report
}

/// Walk, chunk and upload inside a single index transaction.
///
/// The transaction is committed only after the final flush, so an aborted
/// run leaves the index exactly as it was before (cached chunk bytes aside).
pub async fn index_tree<R: ChunkRemote>(
    index: &mut LocalIndex,
    remote: &R,
    cfg: &SyncConfig,
) -> Result<RunReport> {
    let files = TreeWalker::new(&cfg.workdir, index.root())?.files()?;
    info!(files = files.len(), workdir = %cfg.workdir.display(), "indexing");

    index.begin().await?;
    match index_files(index, remote, cfg, &files).await {
        Ok(report) => {
            index.commit().await?;
            info!(
                files = report.files,
                chunks = report.chunks,
                new = report.new_chunks,
                uploaded = report.upload.uploaded,
                "index committed"
            );
            Ok(report)
        }
        Err(e) => {
            if let Err(rb) = index.rollback().await {
                warn!(error = %rb, "rollback failed");
            }
            Err(e)
        }
    }
}

async fn index_files<R: ChunkRemote>(
    index: &LocalIndex,
    remote: &R,
    cfg: &SyncConfig,
    files: &[WalkEntry],
) -> Result<RunReport> {
    let chunker = Chunker::new(index, cfg.block_size);
    let mut batcher = UploadBatcher::new(index, remote, cfg.flush_threshold, cfg.max_batch_bytes);
    let mut report = RunReport::default();

    for entry in files {
        let chunked = chunker.chunk_file(&entry.path, &entry.key).await?;
        report.files += 1;
        report.chunks += chunked.chunks;
        report.bytes_read += chunked.bytes;
        report.new_chunks += chunked.fresh.len() as u64;

        batcher.enqueue(&chunked.fresh).await?;
        batcher.after_file().await?;
    }

    report.upload = batcher.finish().await?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyError;
    use crate::hash::blake3::chunk_id;
    use crate::id::ChunkId;
    use crate::remote::MemoryRemote;
    use bytes::Bytes;
    use std::path::Path;

    const MIB: usize = 1024 * 1024;

    fn content(seed: &[u8], len: usize) -> Vec<u8> {
        let mut out = vec![0u8; len];
        ::blake3::Hasher::new()
            .update(seed)
            .finalize_xof()
            .fill(&mut out);
        out
    }

    fn config(workdir: &Path, block_size: usize) -> SyncConfig {
        SyncConfig {
            workdir: workdir.to_path_buf(),
            block_size,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn shared_prefix_is_uploaded_once_and_rerun_is_quiet() {
        let tmp = tempfile::tempdir().unwrap();
        let x = content(b"X", 5 * MIB);
        let y = content(b"Y", MIB);
        let mut a = x.clone();
        a.extend_from_slice(&y);
        std::fs::write(tmp.path().join("a.txt"), &a).unwrap();
        std::fs::write(tmp.path().join("b.txt"), &x).unwrap();

        let cfg = config(tmp.path(), 5 * MIB);
        let remote = MemoryRemote::new();
        let x_id = chunk_id(&x);
        let y_id = chunk_id(&y);

        let mut index = LocalIndex::open(cfg.index_root()).await.unwrap();
        index.load().await.unwrap();
        let first = index_tree(&mut index, &remote, &cfg).await.unwrap();
        assert_eq!(first.files, 2);
        assert_eq!(first.chunks, 3);
        assert_eq!(first.new_chunks, 2);
        assert_eq!(first.upload.uploaded, 2);
        assert_eq!(remote.len(), 2);
        assert_eq!(remote.get(&x_id), Some(x.clone()));
        assert_eq!(remote.get(&y_id), Some(y.clone()));
        assert_eq!(
            index.file_chunks("a.txt").await.unwrap(),
            vec![x_id.clone(), y_id.clone()]
        );
        assert_eq!(index.chunk_refs(&x_id).await.unwrap(), 2);
        index.close();

        let mut index = LocalIndex::open(cfg.index_root()).await.unwrap();
        index.load().await.unwrap();
        let second = index_tree(&mut index, &remote, &cfg).await.unwrap();
        assert_eq!(second.new_chunks, 0);
        assert_eq!(second.upload.uploaded, 0);
        assert_eq!(remote.batch_calls(), 1);
        assert_eq!(index.chunk_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn large_tree_flushes_mid_run() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..4u8 {
            std::fs::write(tmp.path().join(format!("f{i}")), content(&[i], 64 * 1024)).unwrap();
        }
        let cfg = SyncConfig {
            flush_threshold: 100 * 1024,
            ..config(tmp.path(), 16 * 1024)
        };
        let remote = MemoryRemote::new();
        let mut index = LocalIndex::open(cfg.index_root()).await.unwrap();
        index.load().await.unwrap();

        let report = index_tree(&mut index, &remote, &cfg).await.unwrap();
        assert_eq!(report.new_chunks, 16);
        assert_eq!(report.upload.uploaded, 16);
        assert_eq!(report.upload.batches, 2);
        assert_eq!(remote.len(), 16);
    }

    struct Offline;

    impl ChunkRemote for Offline {
        async fn diff(&self, _: &[ChunkId]) -> Result<Vec<ChunkId>> {
            Err(SyError::Network("connection refused".into()))
        }
        async fn upload(&self, _: &ChunkId, _: Bytes) -> Result<()> {
            Err(SyError::Network("connection refused".into()))
        }
        async fn upload_batch(&self, _: Vec<(ChunkId, Bytes)>) -> Result<()> {
            Err(SyError::Network("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn failed_run_commits_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"some content").unwrap();
        let cfg = config(tmp.path(), 4);

        let mut index = LocalIndex::open(cfg.index_root()).await.unwrap();
        index.load().await.unwrap();
        let err = index_tree(&mut index, &Offline, &cfg).await.err().unwrap();
        assert!(matches!(err, SyError::Network(_)));
        assert!(!index.in_transaction());
        index.close();

        let index = LocalIndex::open(cfg.index_root()).await.unwrap();
        assert_eq!(index.load().await.unwrap(), 0);
        assert_eq!(index.file_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn retry_on_the_same_index_uploads_everything() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.txt"), b"some content").unwrap();
        let cfg = config(tmp.path(), 4);

        let mut index = LocalIndex::open(cfg.index_root()).await.unwrap();
        index.load().await.unwrap();
        assert!(index_tree(&mut index, &Offline, &cfg).await.is_err());

        let remote = MemoryRemote::new();
        let report = index_tree(&mut index, &remote, &cfg).await.unwrap();
        assert_eq!(report.new_chunks, 3);
        assert_eq!(report.upload.uploaded, 3);
        assert_eq!(remote.len(), 3);
        assert_eq!(index.chunk_count().await.unwrap(), 3);
        for id in index.file_chunks("a.txt").await.unwrap() {
            assert!(remote.contains(&id));
        }
    }
}
