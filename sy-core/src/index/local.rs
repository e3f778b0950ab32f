use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashSet;
use libsql::{Builder, Connection, Database, params};
use tracing::{debug, warn};

use crate::error::{Result, SyError};
use crate::id::ChunkId;
use crate::store::ChunkStore;

pub const DB_FILE: &str = "db";
pub const CACHE_DIR: &str = "idx";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS file (
    file_id INTEGER PRIMARY KEY,
    file_checksum TEXT,
    filename TEXT UNIQUE
);
CREATE TABLE IF NOT EXISTS chunk (
    chunk_checksum TEXT PRIMARY KEY
);
CREATE TABLE IF NOT EXISTS file_chunk (
    file_id INTEGER,
    chunk_checksum TEXT,
    num INTEGER
);
CREATE INDEX IF NOT EXISTS index_file_chunk_file_id ON file_chunk (file_id);
";

/// Shared handle on the known-chunk set. Readers (the server's diff) use it
/// without going through the index.
pub type KnownChunks = Arc<DashSet<ChunkId>>;

/// File → chunk metadata plus the chunk cache under one root directory.
///
/// Lifecycle is `open → load → begin → … → commit → close`. All metadata
/// mutations between `begin` and `commit` land together or not at all;
/// chunk bytes written to the cache are not covered by the transaction.
/// One transaction normally spans a whole indexing run, which holds the
/// database write lock for the run's duration.
pub struct LocalIndex {
    root: PathBuf,
    _db: Database,
    conn: Connection,
    known: KnownChunks,
    /// Ids `add_chunk` published during the open transaction.
    staged: DashSet<ChunkId>,
    store: ChunkStore,
    in_tx: bool,
}

impl LocalIndex {
    pub async fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let unavailable = |reason: String| SyError::StorageUnavailable {
            path: root.clone(),
            reason,
        };

        std::fs::create_dir_all(&root).map_err(|e| unavailable(e.to_string()))?;
        let store =
            ChunkStore::open(root.join(CACHE_DIR)).map_err(|e| unavailable(e.to_string()))?;
        let db = Builder::new_local(root.join(DB_FILE))
            .build()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        let conn = db.connect().map_err(|e| unavailable(e.to_string()))?;
        conn.execute_batch(SCHEMA)
            .await
            .map_err(|e| unavailable(e.to_string()))?;

        debug!(root = %root.display(), "index opened");
        Ok(Self {
            root,
            _db: db,
            conn,
            known: Arc::new(DashSet::new()),
            staged: DashSet::new(),
            store,
            in_tx: false,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn known_chunks(&self) -> KnownChunks {
        Arc::clone(&self.known)
    }

    /// Populate the known-chunk set from every persisted chunk row.
    pub async fn load(&self) -> Result<usize> {
        let mut rows = self
            .conn
            .query("SELECT chunk_checksum FROM chunk", ())
            .await?;
        let mut n = 0;
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            match ChunkId::parse(&raw) {
                Ok(id) => {
                    self.known.insert(id);
                    n += 1;
                }
                Err(e) => warn!(chunk = %raw, error = %e, "skipping malformed chunk row"),
            }
        }
        debug!(chunks = n, "known chunks loaded");
        Ok(n)
    }

    pub async fn begin(&mut self) -> Result<()> {
        if self.in_tx {
            return Err(SyError::Storage("transaction already open".into()));
        }
        self.conn.execute("BEGIN IMMEDIATE", ()).await?;
        self.in_tx = true;
        Ok(())
    }

    pub async fn commit(&mut self) -> Result<()> {
        if !self.in_tx {
            return Err(SyError::Storage("no open transaction".into()));
        }
        self.conn.execute("COMMIT", ()).await?;
        self.in_tx = false;
        self.staged.clear();
        Ok(())
    }

    /// Abandon the open transaction and forget the ids it added.
    pub async fn rollback(&mut self) -> Result<()> {
        if !self.in_tx {
            return Ok(());
        }
        self.in_tx = false;
        let forgotten = self.staged.len();
        for id in self.staged.iter() {
            self.known.remove(id.key());
        }
        self.staged.clear();
        debug!(forgotten, "transaction rolled back");
        self.conn.execute("ROLLBACK", ()).await?;
        Ok(())
    }

    pub fn in_transaction(&self) -> bool {
        self.in_tx
    }

    pub fn exists(&self, id: &ChunkId) -> bool {
        self.known.contains(id)
    }

    /// Mark `id` known and insert its chunk row.
    pub async fn add_chunk(&self, id: &ChunkId) -> Result<()> {
        if self.known.insert(id.clone()) && self.in_tx {
            self.staged.insert(id.clone());
        }
        self.conn
            .execute(
                "INSERT OR IGNORE INTO chunk (chunk_checksum) VALUES (?1)",
                params![id.as_str()],
            )
            .await?;
        Ok(())
    }

    /// Insert the chunk row without publishing it to the known set.
    /// Returns true if this call created the row.
    pub async fn claim_chunk(&self, id: &ChunkId) -> Result<bool> {
        let n = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO chunk (chunk_checksum) VALUES (?1)",
                params![id.as_str()],
            )
            .await?;
        Ok(n == 1)
    }

    pub fn mark_known(&self, id: &ChunkId) {
        self.known.insert(id.clone());
    }

    pub async fn add_file_chunk(&self, file_id: i64, id: &ChunkId, num: i64) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO file_chunk (file_id, chunk_checksum, num) VALUES (?1, ?2, ?3)",
                params![file_id, id.as_str(), num],
            )
            .await?;
        Ok(())
    }

    /// A path that is already recorded is left untouched; remove it first.
    pub async fn add_file(&self, file_id: i64, checksum: &str, path: &str) -> Result<()> {
        let n = self
            .conn
            .execute(
                "INSERT OR IGNORE INTO file (file_id, file_checksum, filename) VALUES (?1, ?2, ?3)",
                params![file_id, checksum, path],
            )
            .await?;
        if n == 0 {
            debug!(path, "file row already present");
        }
        Ok(())
    }

    pub async fn file_id(&self, path: &str) -> Result<i64> {
        let mut rows = self
            .conn
            .query("SELECT file_id FROM file WHERE filename = ?1", params![path])
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)?),
            None => Err(SyError::UnknownFile(path.to_string())),
        }
    }

    /// Drop the file row and its chunk edges. `UnknownFile` if never indexed.
    pub async fn remove_file(&self, path: &str) -> Result<()> {
        let file_id = self.file_id(path).await?;
        self.conn
            .execute(
                "DELETE FROM file_chunk WHERE file_id = ?1",
                params![file_id],
            )
            .await?;
        self.conn
            .execute("DELETE FROM file WHERE file_id = ?1", params![file_id])
            .await?;
        Ok(())
    }

    /// Chunk ids of `path` in file order.
    pub async fn file_chunks(&self, path: &str) -> Result<Vec<ChunkId>> {
        let file_id = self.file_id(path).await?;
        let mut rows = self
            .conn
            .query(
                "SELECT chunk_checksum FROM file_chunk WHERE file_id = ?1 ORDER BY num",
                params![file_id],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(ChunkId::parse(&row.get::<String>(0)?)?);
        }
        Ok(out)
    }

    pub async fn file_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM file", ()).await
    }

    pub async fn chunk_count(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM chunk", ()).await
    }

    /// Number of file_chunk edges pointing at `id`.
    pub async fn chunk_refs(&self, id: &ChunkId) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM file_chunk WHERE chunk_checksum = ?1",
            params![id.as_str()],
        )
        .await
    }

    async fn count(&self, sql: &str, p: impl libsql::params::IntoParams) -> Result<u64> {
        let mut rows = self.conn.query(sql, p).await?;
        let n = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(n.max(0) as u64)
    }

    pub fn chunk_path(&self, id: &ChunkId) -> PathBuf {
        self.store.chunk_path(id)
    }

    pub async fn write_chunk(&self, id: &ChunkId, bytes: &[u8]) -> Result<bool> {
        self.store.write(id, bytes).await
    }

    pub async fn read_chunk(&self, id: &ChunkId) -> Result<Vec<u8>> {
        self.store.read(id).await
    }

    pub async fn delete_chunk(&self, id: &ChunkId) -> Result<()> {
        self.store.delete(id).await
    }

    /// Release the connection; an open transaction is discarded.
    pub fn close(self) {
        if self.in_tx {
            warn!(root = %self.root.display(), "closing index with an open transaction");
        }
    }
}
