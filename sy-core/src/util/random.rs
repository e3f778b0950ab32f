use crate::error::{Result, SyError};

fn fill<const N: usize>() -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    getrandom::getrandom(&mut buf).map_err(|e| SyError::Storage(format!("entropy: {e}")))?;
    Ok(buf)
}

pub fn random_u64() -> Result<u64> {
    Ok(u64::from_le_bytes(fill::<8>()?))
}

/// Non-negative synthetic file id; only unique within one indexing run.
pub fn random_file_id() -> Result<i64> {
    Ok(i64::from_le_bytes(fill::<8>()?) & i64::MAX)
}
