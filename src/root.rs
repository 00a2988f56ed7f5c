//! Choosing between an embedded archive and a directory on disk.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::{LocalFileReader, ReadAt, ShiftedReader};
use crate::vfs::{DirFileSystem, File, FileSystem, ZipFileSystem};
use crate::zip::{ArchiveBounds, ZipArchive, locate_archive};

/// Archive filesystem over the tail of an arbitrary byte source.
pub type EmbeddedFileSystem = ZipFileSystem<ShiftedReader<Arc<dyn ReadAt>>>;

/// Filesystem produced by the resolver.
pub enum Root {
    /// Serving the zip archive found at the end of the inspected file.
    Embedded {
        bounds: ArchiveBounds,
        fs: EmbeddedFileSystem,
    },
    /// No archive was found; serving a directory instead.
    Directory(DirFileSystem),
}

impl Root {
    pub fn is_embedded(&self) -> bool {
        matches!(self, Root::Embedded { .. })
    }

    /// Where the archive sits in the inspected file, if one was found.
    pub fn bounds(&self) -> Option<ArchiveBounds> {
        match self {
            Root::Embedded { bounds, .. } => Some(*bounds),
            Root::Directory(_) => None,
        }
    }
}

#[async_trait]
impl FileSystem for Root {
    async fn open(&self, path: &str) -> Result<Box<dyn File>> {
        match self {
            Root::Embedded { fs, .. } => fs.open(path).await,
            Root::Directory(fs) => fs.open(path).await,
        }
    }
}

/// Serve the archive appended to the running executable, or `fallback_dir`
/// if the executable carries none.
pub async fn open_root(fallback_dir: impl AsRef<Path>) -> Result<Root> {
    let reader = LocalFileReader::current_exe()?;
    open_root_from(Arc::new(reader), fallback_dir).await
}

/// Same as [`open_root`] for an arbitrary byte source.
///
/// Only the absence of a valid trailer falls back to the directory. Read
/// errors, and decode errors after an archive was detected, are returned.
pub async fn open_root_from<R: ReadAt + 'static>(
    reader: Arc<R>,
    fallback_dir: impl AsRef<Path>,
) -> Result<Root> {
    let bounds = match locate_archive(&*reader).await {
        Ok(bounds) => bounds,
        Err(Error::NotAnArchive) => {
            log::info!(
                "no embedded archive, serving {}",
                fallback_dir.as_ref().display()
            );
            return Ok(Root::Directory(open_dir(fallback_dir)));
        }
        Err(e) => return Err(e),
    };

    let reader: Arc<dyn ReadAt> = reader;
    let shifted = ShiftedReader::new(reader, bounds.start, bounds.len);
    let archive = ZipArchive::open(Arc::new(shifted)).await?;
    log::info!(
        "serving {} embedded entries ({} bytes at offset {})",
        archive.entries().len(),
        bounds.len,
        bounds.start
    );

    Ok(Root::Embedded {
        bounds,
        fs: ZipFileSystem::new(archive),
    })
}

/// Serve `path` from disk without looking for an archive.
pub fn open_dir(path: impl AsRef<Path>) -> DirFileSystem {
    DirFileSystem::new(PathBuf::from(path.as_ref()))
}
