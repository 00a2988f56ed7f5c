use flate2::{Decompress, FlushDecompress, Status};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::{CompressionMethod, ZipFileEntry};

/// Compressed bytes fetched from the source per refill.
const INPUT_CHUNK: u64 = 32 * 1024;

/// Forward-only decompression stream over one archive entry.
///
/// Reads pull compressed bytes from the source on demand, so nothing beyond
/// one input chunk is buffered. There is no way back: rewinding means opening
/// a new stream. Once the declared size has been produced, the CRC-32 and the
/// size are checked and a mismatch is reported as corruption.
pub struct EntryReader<R: ReadAt> {
    reader: Arc<R>,
    name: String,
    data_offset: u64,
    compressed_size: u64,
    uncompressed_size: u64,
    expected_crc: u32,
    decoder: Option<Decompress>,
    input: Vec<u8>,
    input_pos: usize,
    /// Compressed bytes fetched so far
    fetched: u64,
    /// Uncompressed bytes handed out so far
    produced: u64,
    hasher: crc32fast::Hasher,
    verified: bool,
}

impl<R: ReadAt> EntryReader<R> {
    pub(crate) fn new(reader: Arc<R>, entry: &ZipFileEntry, data_offset: u64) -> Result<Self> {
        if entry.is_encrypted() {
            return Err(Error::Encrypted(entry.file_name.clone()));
        }

        let decoder = match entry.compression_method {
            CompressionMethod::Stored => {
                if entry.compressed_size != entry.uncompressed_size {
                    return Err(Error::corrupt(format!(
                        "{}: stored entry with compressed size {} and size {}",
                        entry.file_name, entry.compressed_size, entry.uncompressed_size
                    )));
                }
                None
            }
            // raw deflate, no zlib header
            CompressionMethod::Deflate => Some(Decompress::new(false)),
            CompressionMethod::Unknown(method) => {
                return Err(Error::UnsupportedCompression {
                    name: entry.file_name.clone(),
                    method,
                });
            }
        };

        Ok(Self {
            reader,
            name: entry.file_name.clone(),
            data_offset,
            compressed_size: entry.compressed_size,
            uncompressed_size: entry.uncompressed_size,
            expected_crc: entry.crc32,
            decoder,
            input: Vec::new(),
            input_pos: 0,
            fetched: 0,
            produced: 0,
            hasher: crc32fast::Hasher::new(),
            verified: false,
        })
    }

    /// Uncompressed bytes read so far.
    pub fn position(&self) -> u64 {
        self.produced
    }

    /// Read up to `buf.len()` decompressed bytes. Returns 0 at end of entry.
    pub async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let remaining = self.uncompressed_size - self.produced;
        if remaining == 0 {
            self.verify()?;
            return Ok(0);
        }
        let want = buf.len().min(usize::try_from(remaining).unwrap_or(usize::MAX));
        let buf = &mut buf[..want];

        let n = if self.decoder.is_some() {
            self.inflate(buf).await?
        } else {
            self.reader
                .read_exact_at(self.data_offset + self.produced, buf)
                .await?;
            buf.len()
        };

        self.hasher.update(&buf[..n]);
        self.produced += n as u64;
        if self.produced == self.uncompressed_size {
            self.verify()?;
        }
        Ok(n)
    }

    /// Read and drop `count` bytes, stopping early at end of entry.
    pub async fn skip(&mut self, mut count: u64) -> Result<u64> {
        let mut scratch = [0u8; 8 * 1024];
        let mut skipped = 0;
        while count > 0 {
            let chunk = count.min(scratch.len() as u64) as usize;
            let n = self.read(&mut scratch[..chunk]).await?;
            if n == 0 {
                break;
            }
            skipped += n as u64;
            count -= n as u64;
        }
        Ok(skipped)
    }

    async fn refill(&mut self) -> Result<()> {
        let chunk = INPUT_CHUNK.min(self.compressed_size - self.fetched) as usize;
        self.input.resize(chunk, 0);
        self.reader
            .read_exact_at(self.data_offset + self.fetched, &mut self.input)
            .await?;
        self.fetched += chunk as u64;
        self.input_pos = 0;
        Ok(())
    }

    async fn inflate(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            if self.input_pos == self.input.len() && self.fetched < self.compressed_size {
                self.refill().await?;
            }

            let Some(decoder) = self.decoder.as_mut() else {
                return Ok(0);
            };
            let before_in = decoder.total_in();
            let before_out = decoder.total_out();
            let status = decoder
                .decompress(&self.input[self.input_pos..], buf, FlushDecompress::None)
                .map_err(|e| Error::corrupt(format!("{}: {}", self.name, e)))?;
            let consumed = (decoder.total_in() - before_in) as usize;
            let written = (decoder.total_out() - before_out) as usize;
            self.input_pos += consumed;

            if written > 0 {
                return Ok(written);
            }

            let exhausted =
                self.input_pos == self.input.len() && self.fetched == self.compressed_size;
            if status == Status::StreamEnd || (consumed == 0 && exhausted) {
                return Err(Error::corrupt(format!(
                    "{}: deflate stream ended after {} of {} bytes",
                    self.name, self.produced, self.uncompressed_size
                )));
            }
            if consumed == 0 && self.input_pos < self.input.len() {
                return Err(Error::corrupt(format!(
                    "{}: deflate stream made no progress",
                    self.name
                )));
            }
        }
    }

    fn verify(&mut self) -> Result<()> {
        if self.verified {
            return Ok(());
        }
        self.verified = true;

        let actual = self.hasher.clone().finalize();
        if actual != self.expected_crc {
            return Err(Error::ChecksumMismatch {
                name: self.name.clone(),
                expected: self.expected_crc,
                actual,
            });
        }
        Ok(())
    }
}
