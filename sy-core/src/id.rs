use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyError};
use crate::util::hex::parse_hex_array;

/// Length of a hex-encoded chunk id (BLAKE3-256).
pub const CHUNK_ID_LEN: usize = 64;

/// Content identifier of one chunk: lowercase hex of the BLAKE3 hash of its bytes.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChunkId(String);

impl ChunkId {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.len() != CHUNK_ID_LEN {
            return Err(SyError::InvalidChunkId(format!(
                "expected {CHUNK_ID_LEN} hex chars, got {}",
                raw.len()
            )));
        }
        parse_hex_array::<32>(raw)?;
        Ok(Self(raw.to_ascii_lowercase()))
    }

    pub(crate) fn from_hash(hash: ::blake3::Hash) -> Self {
        Self(hash.to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Cache subdirectory: the first two hex chars.
    pub fn shard(&self) -> &str {
        &self.0[..2]
    }
}

impl TryFrom<String> for ChunkId {
    type Error = SyError;

    fn try_from(raw: String) -> Result<Self> {
        Self::parse(&raw)
    }
}

impl From<ChunkId> for String {
    fn from(id: ChunkId) -> Self {
        id.0
    }
}

impl FromStr for ChunkId {
    type Err = SyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for ChunkId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChunkId({})", &self.0[..12])
    }
}
