//! ZIP archive reading.
//!
//! ## Architecture
//!
//! - [`structures`]: data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`locator`]: finding where an archive starts inside a larger stream
//! - [`parser`]: low-level parsing of ZIP structures from raw bytes
//! - [`stream`]: forward-only per-entry decompression
//! - [`archive`]: the opened archive handed to the virtual filesystem
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Everything is located from the EOCD, which is why anything may precede
//! the archive, including an entire executable.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED and DEFLATE compression methods
//! - CRC-32 verification on full reads
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod archive;
pub mod locator;
mod parser;
mod stream;
mod structures;

pub use archive::ZipArchive;
pub use locator::{ArchiveBounds, find_end_record, locate_archive};
pub use parser::{DirectoryInfo, ZipParser};
pub use stream::EntryReader;
pub use structures::*;
