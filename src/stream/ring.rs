//! Ring buffer memory shared by the producer and the clock thread.

use crate::error::{Result, VsndError};

/// Fixed-size byte ring. Offsets wrap at the buffer length.
#[derive(Debug, Default)]
pub struct RingBuffer {
    data: Vec<u8>,
}

impl RingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the contents with `size` zero bytes.
    ///
    /// Allocation failure is reported instead of aborting; the old contents
    /// are kept in that case.
    pub fn resize(&mut self, size: usize) -> Result<()> {
        let mut data = Vec::new();
        data.try_reserve_exact(size)
            .map_err(|e| VsndError::ResourceExhausted {
                message: format!("ring buffer of {size} bytes: {e}"),
            })?;
        data.resize(size, 0);
        self.data = data;
        Ok(())
    }

    /// Copy `src` in at `offset`, wrapping. Returns the bytes written, which
    /// is at most one buffer's worth.
    pub fn write_at(&mut self, offset: usize, src: &[u8]) -> usize {
        let size = self.data.len();
        if size == 0 {
            return 0;
        }
        let src = &src[..src.len().min(size)];
        let start = offset % size;
        let first = src.len().min(size - start);
        self.data[start..start + first].copy_from_slice(&src[..first]);
        self.data[..src.len() - first].copy_from_slice(&src[first..]);
        src.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
