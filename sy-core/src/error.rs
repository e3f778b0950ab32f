use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyError {
    #[error("cannot open index at {}: {reason}", path.display())]
    StorageUnavailable { path: PathBuf, reason: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Db(#[from] libsql::Error),

    #[error("cannot read {}: {source}", path.display())]
    FileIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown file: {0}")]
    UnknownFile(String),

    #[error("invalid chunk id: {0}")]
    InvalidChunkId(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SyError {
    /// Process exit code for the fault class; only the binaries consult this.
    pub fn exit_code(&self) -> u8 {
        match self {
            SyError::StorageUnavailable { .. } | SyError::Storage(_) | SyError::Db(_) => 1,
            SyError::FileIo { .. } => 2,
            SyError::Network(_) => 3,
            SyError::Protocol(_) | SyError::UnsupportedMethod(_) | SyError::InvalidChunkId(_) => 4,
            SyError::UnknownFile(_) | SyError::Io(_) => 5,
        }
    }
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, SyError>;
