use crate::error::{Result, SyError};

/// Decode exactly `N` bytes of hex; any other length is rejected.
pub fn parse_hex_array<const N: usize>(hex_str: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    let bytes =
        hex::decode(hex_str).map_err(|e| SyError::InvalidChunkId(format!("invalid hex: {e}")))?;
    if bytes.len() != N {
        return Err(SyError::InvalidChunkId(format!(
            "expected {N} bytes ({} hex chars), got {}",
            N * 2,
            bytes.len()
        )));
    }
    out.copy_from_slice(&bytes);
    Ok(out)
}
