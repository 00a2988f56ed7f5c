//! Read-only virtual filesystem interface.
//!
//! [`FileSystem::open`] hands out [`File`] handles with the usual
//! read/seek/stat/readdir/close contract, so a consumer such as a static file
//! server cannot tell whether the bytes come from an archive appended to the
//! executable ([`ZipFileSystem`]) or from a directory on disk
//! ([`DirFileSystem`]).
//!
//! A handle carries its own position and listing cursor and is meant to be
//! driven by one owner at a time; separate handles are independent.

mod archive;
mod dir;

pub use archive::{ZipFile, ZipFileSystem};
pub use dir::{DirFile, DirFileSystem};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::SeekFrom;

use crate::error::Result;

/// Path separator used by archive names and request paths.
pub const SEPARATOR: char = '/';

/// Descriptor returned by [`File::stat`] and [`File::readdir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Last path component, without a trailing separator.
    pub name: String,
    /// Full path relative to the filesystem root. Archive directories keep
    /// their trailing separator.
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

impl FileInfo {
    /// Descriptor of the synthetic root: empty name, zero size, epoch mtime.
    pub fn root() -> Self {
        Self {
            name: String::new(),
            path: String::new(),
            size: 0,
            modified: DateTime::<Utc>::UNIX_EPOCH,
            is_dir: true,
        }
    }
}

#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Open `path`. A single leading separator is ignored; the empty path
    /// names the root directory.
    async fn open(&self, path: &str) -> Result<Box<dyn File>>;
}

#[async_trait]
pub trait File: Send {
    /// Read into `buf`, returning the number of bytes read; 0 means end of
    /// file. Directories read as empty.
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the read position and return the new absolute position.
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    async fn stat(&self) -> Result<FileInfo>;

    /// Return up to `count` further directory entries (`0` means all that
    /// remain), or `None` once the listing is exhausted.
    async fn readdir(&mut self, count: usize) -> Result<Option<Vec<FileInfo>>>;

    /// Release the handle's resources. Closing twice is a no-op.
    async fn close(&mut self) -> Result<()>;

    /// Read from the current position to the end of the file.
    async fn read_to_end(&mut self, out: &mut Vec<u8>) -> Result<usize> {
        let mut buf = [0u8; 8 * 1024];
        let mut total = 0;
        loop {
            let n = self.read(&mut buf).await?;
            if n == 0 {
                return Ok(total);
            }
            out.extend_from_slice(&buf[..n]);
            total += n;
        }
    }
}

/// Last component of a `/`-separated name, ignoring a trailing separator.
pub(crate) fn base_name(name: &str) -> &str {
    let trimmed = name.strip_suffix(SEPARATOR).unwrap_or(name);
    trimmed.rsplit(SEPARATOR).next().unwrap_or(trimmed)
}

/// Name of the directory that directly contains `name`, with its trailing
/// separator; `""` for top-level names.
pub(crate) fn parent_name(name: &str) -> &str {
    let trimmed = name.strip_suffix(SEPARATOR).unwrap_or(name);
    match trimmed.rfind(SEPARATOR) {
        Some(pos) => &name[..=pos],
        None => "",
    }
}

/// Resolve a request path lexically against a virtual `/`, dropping `.` and
/// empty segments and applying `..` without ever climbing above the root.
pub(crate) fn clean_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_and_parent() {
        assert_eq!(base_name("assets/style.css"), "style.css");
        assert_eq!(base_name("assets/"), "assets");
        assert_eq!(base_name("index.html"), "index.html");
        assert_eq!(parent_name("assets/style.css"), "assets/");
        assert_eq!(parent_name("assets/img/"), "assets/");
        assert_eq!(parent_name("assets/"), "");
        assert_eq!(parent_name("index.html"), "");
    }

    #[test]
    fn clean_never_escapes_root() {
        assert_eq!(clean_path("/a/./b/../c"), "a/c");
        assert_eq!(clean_path("../../etc/passwd"), "etc/passwd");
        assert_eq!(clean_path("//"), "");
        assert_eq!(clean_path(""), "");
    }
}
