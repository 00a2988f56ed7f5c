//! # packer
//!
//! Serve the files of a zip archive appended to an executable.
//!
//! A self-contained binary is just `[executable image][zip archive]`, as
//! produced by concatenating any standard zip file onto a program. This crate
//! finds the archive through its end-of-central-directory trailer and exposes
//! its entries through a small read-only virtual filesystem, so code that
//! serves files does not need to know they live inside the binary. When the
//! executable carries no archive, the same interface is backed by a plain
//! directory.
//!
//! ## Features
//!
//! - Locate an archive behind arbitrary prefix data, comments included
//! - ZIP64, STORED and DEFLATE entries with CRC-32 checks
//! - `open`/`read`/`seek`/`stat`/`readdir`/`close` over archive entries
//! - Transparent fallback to a directory on disk
//!
//! ## Example
//!
//! ```no_run
//! use packer::{File, FileSystem};
//!
//! #[tokio::main]
//! async fn main() -> packer::Result<()> {
//!     // Embedded archive if present, ./public otherwise
//!     let root = packer::open_root("public").await?;
//!
//!     let mut file = root.open("/index.html").await?;
//!     let mut html = Vec::new();
//!     file.read_to_end(&mut html).await?;
//!     file.close().await?;
//!
//!     println!("{}", String::from_utf8_lossy(&html));
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod root;
pub mod vfs;
pub mod zip;

pub use cli::Cli;
pub use error::{Error, Result};
pub use io::{HttpRangeReader, LocalFileReader, ReadAt, ShiftedReader};
pub use root::{EmbeddedFileSystem, Root, open_dir, open_root, open_root_from};
pub use vfs::{DirFileSystem, File, FileInfo, FileSystem, ZipFileSystem};
pub use zip::{ArchiveBounds, ZipArchive, ZipFileEntry, locate_archive};
