use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Splits a stream into blocks of exactly `block_size` bytes; only the last may be short.
#[derive(Clone, Copy, Debug)]
pub struct FixedChunker {
    block_size: usize,
}

impl FixedChunker {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size: block_size.max(1),
        }
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Fill `buf` with the next block and return its length (0 at EOF).
    /// Short reads are accumulated so boundaries depend only on content.
    pub async fn next_chunk<R: AsyncRead + Unpin>(
        &self,
        r: &mut R,
        buf: &mut Vec<u8>,
    ) -> io::Result<usize> {
        if buf.len() != self.block_size {
            buf.resize(self.block_size, 0);
        }
        let mut filled = 0;
        while filled < self.block_size {
            let n = r.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn lengths<R: AsyncRead + Unpin>(chunker: FixedChunker, mut r: R) -> Vec<usize> {
        let mut buf = Vec::new();
        let mut out = Vec::new();
        loop {
            let n = chunker.next_chunk(&mut r, &mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.push(n);
        }
        out
    }

    #[tokio::test]
    async fn last_block_may_be_short() {
        let data = [7u8; 10];
        assert_eq!(lengths(FixedChunker::new(4), &data[..]).await, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn short_reads_do_not_move_boundaries() {
        // chain() returns a short read at the seam between its halves
        let a = [1u8; 3];
        let b = [2u8; 5];
        let r = (&a[..]).chain(&b[..]);
        assert_eq!(lengths(FixedChunker::new(4), r).await, vec![4, 4]);
    }

    #[tokio::test]
    async fn empty_input_has_no_blocks() {
        assert!(lengths(FixedChunker::new(4), &[0u8; 0][..]).await.is_empty());
    }
}
