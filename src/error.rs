//! Error type shared by the byte sources, the zip reader and both filesystems.
//!
//! The variants follow how a caller is expected to react:
//!
//! - [`Error::NotAnArchive`]: the stream has no valid end-of-central-directory
//!   trailer. The root resolver recovers from this by serving a directory.
//! - [`Error::NotFound`]: the requested path has no entry.
//! - [`Error::Io`]: the byte source failed. Never retried here.
//! - [`Error::Corrupt`] and [`Error::ChecksumMismatch`]: an archive was
//!   detected but does not decode. Always fatal.

use std::io;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("not a zip archive: no end of central directory record found")]
    NotAnArchive,

    #[error("corrupt archive: {0}")]
    Corrupt(String),

    #[error("checksum mismatch in {name}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    #[error("unsupported compression method {method} in {name}")]
    UnsupportedCompression { name: String, method: u16 },

    #[error("{0}: encrypted entries are not supported")]
    Encrypted(String),

    #[error("{0}: file does not exist")]
    NotFound(String),

    #[error("{0}: not a directory")]
    NotADirectory(String),

    #[error("invalid seek: {0}")]
    InvalidSeek(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("remote source: {0}")]
    Remote(String),
}

impl Error {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Error::Corrupt(msg.into())
    }

    /// True for the "does not exist" condition, whichever filesystem raised it.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            Error::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
            Error::InvalidSeek(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
            Error::NotADirectory(_) => io::Error::new(io::ErrorKind::NotADirectory, e),
            Error::UnsupportedCompression { .. } | Error::Encrypted(_) => {
                io::Error::new(io::ErrorKind::Unsupported, e)
            }
            Error::NotAnArchive | Error::Corrupt(_) | Error::ChecksumMismatch { .. } => {
                io::Error::new(io::ErrorKind::InvalidData, e)
            }
            Error::Http(_) | Error::Remote(_) => io::Error::other(e),
        }
    }
}
