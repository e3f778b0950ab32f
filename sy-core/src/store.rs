use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::error::Result;
use crate::id::ChunkId;
use crate::util::random::random_u64;

/// Content-addressed chunk bytes on disk, sharded as `<dir>/<id[..2]>/<id>`.
/// Knows nothing about files.
#[derive(Clone, Debug)]
pub struct ChunkStore {
    dir: PathBuf,
}

impl ChunkStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn chunk_path(&self, id: &ChunkId) -> PathBuf {
        self.dir.join(id.shard()).join(id.as_str())
    }

    pub async fn contains(&self, id: &ChunkId) -> Result<bool> {
        Ok(fs::try_exists(self.chunk_path(id)).await?)
    }

    /// Write `bytes` unless the chunk is already present. Returns whether
    /// anything was written. The file appears atomically (temp + rename).
    pub async fn write(&self, id: &ChunkId, bytes: &[u8]) -> Result<bool> {
        let path = self.chunk_path(id);
        if fs::try_exists(&path).await? {
            return Ok(false);
        }
        let shard = self.dir.join(id.shard());
        fs::create_dir_all(&shard).await?;

        let tmp = shard.join(format!(".{id}.{:016x}.tmp", random_u64()?));
        if let Err(e) = fs::write(&tmp, bytes).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        fs::rename(&tmp, &path).await?;
        debug!(chunk = %id, len = bytes.len(), "chunk written");
        Ok(true)
    }

    pub async fn read(&self, id: &ChunkId) -> Result<Vec<u8>> {
        Ok(fs::read(self.chunk_path(id)).await?)
    }

    pub async fn size(&self, id: &ChunkId) -> Result<u64> {
        Ok(fs::metadata(self.chunk_path(id)).await?.len())
    }

    /// Missing chunks are not an error.
    pub async fn delete(&self, id: &ChunkId) -> Result<()> {
        match fs::remove_file(self.chunk_path(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
