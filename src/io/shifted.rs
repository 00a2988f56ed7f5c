use async_trait::async_trait;

use super::ReadAt;
use crate::error::Result;

/// View of `source` that starts at `start`.
///
/// Reads at relative offset `r` are served from `start + r`, so the zip reader
/// can treat an archive appended to an executable as if it began at offset 0.
/// Bounds are not checked here beyond what the underlying source enforces.
pub struct ShiftedReader<R: ReadAt> {
    source: R,
    start: u64,
    len: u64,
}

impl<R: ReadAt> ShiftedReader<R> {
    pub fn new(source: R, start: u64, len: u64) -> Self {
        Self { source, start, len }
    }
}

#[async_trait]
impl<R: ReadAt> ReadAt for ShiftedReader<R> {
    async fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize> {
        self.source.read_at(self.start + offset, buf).await
    }

    fn size(&self) -> u64 {
        self.len
    }
}
