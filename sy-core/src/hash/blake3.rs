use crate::id::ChunkId;

/// Content identifier of `bytes`.
pub fn chunk_id(bytes: &[u8]) -> ChunkId {
    ChunkId::from_hash(::blake3::hash(bytes))
}
