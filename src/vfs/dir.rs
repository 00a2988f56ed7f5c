use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use super::{File, FileInfo, FileSystem, base_name, clean_path};
use crate::error::{Error, Result};

/// Filesystem rooted at a directory on disk.
///
/// Request paths are cleaned against a virtual `/` before being joined to the
/// root, so `..` segments cannot reach outside it.
#[derive(Debug, Clone)]
pub struct DirFileSystem {
    root: PathBuf,
}

impl DirFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn open_file(&self, path: &str) -> Result<DirFile> {
        if path.contains('\0')
            || (std::path::MAIN_SEPARATOR != '/' && path.contains(std::path::MAIN_SEPARATOR))
        {
            return Err(Error::NotFound(path.to_string()));
        }

        let rel = clean_path(path);
        let full = if rel.is_empty() {
            self.root.clone()
        } else {
            self.root.join(&rel)
        };

        let metadata = tokio::fs::metadata(&full)
            .await
            .map_err(|e| not_found_or(e, path))?;

        let kind = if metadata.is_dir() {
            Kind::Dir {
                listing: None,
                cursor: 0,
            }
        } else {
            let file = tokio::fs::File::open(&full)
                .await
                .map_err(|e| not_found_or(e, path))?;
            Kind::File(Some(file))
        };

        Ok(DirFile {
            full,
            rel,
            kind,
        })
    }
}

fn not_found_or(e: io::Error, path: &str) -> Error {
    if e.kind() == io::ErrorKind::NotFound {
        Error::NotFound(path.to_string())
    } else {
        e.into()
    }
}

fn file_info(name: String, path: String, metadata: &Metadata) -> FileInfo {
    FileInfo {
        name,
        path,
        size: if metadata.is_dir() { 0 } else { metadata.len() },
        modified: metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        is_dir: metadata.is_dir(),
    }
}

#[async_trait]
impl FileSystem for DirFileSystem {
    async fn open(&self, path: &str) -> Result<Box<dyn File>> {
        Ok(Box::new(self.open_file(path).await?))
    }
}

enum Kind {
    /// `None` once closed
    File(Option<tokio::fs::File>),
    Dir {
        /// Read on the first `readdir` call, sorted by name
        listing: Option<Vec<FileInfo>>,
        cursor: usize,
    },
}

/// Open handle on a [`DirFileSystem`] path.
pub struct DirFile {
    full: PathBuf,
    rel: String,
    kind: Kind,
}

impl DirFile {
    async fn list(&self) -> Result<Vec<FileInfo>> {
        let mut listing = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.full).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = if self.rel.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", self.rel, name)
            };
            let metadata = entry.metadata().await?;
            listing.push(file_info(name, path, &metadata));
        }
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }
}

#[async_trait]
impl File for DirFile {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.kind {
            Kind::File(file) => {
                let file = file
                    .as_mut()
                    .ok_or_else(|| io::Error::other("file already closed"))?;
                Ok(file.read(buf).await?)
            }
            Kind::Dir { .. } => Ok(0),
        }
    }

    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        match &mut self.kind {
            Kind::File(file) => {
                let file = file
                    .as_mut()
                    .ok_or_else(|| io::Error::other("file already closed"))?;
                file.seek(pos).await.map_err(|e| {
                    if e.kind() == io::ErrorKind::InvalidInput {
                        Error::InvalidSeek(e.to_string())
                    } else {
                        e.into()
                    }
                })
            }
            Kind::Dir { .. } => Err(Error::InvalidSeek("directories cannot be seeked".into())),
        }
    }

    async fn stat(&self) -> Result<FileInfo> {
        let metadata = tokio::fs::metadata(&self.full).await?;
        let name = if self.rel.is_empty() {
            String::new()
        } else {
            base_name(&self.rel).to_string()
        };
        Ok(file_info(name, self.rel.clone(), &metadata))
    }

    async fn readdir(&mut self, count: usize) -> Result<Option<Vec<FileInfo>>> {
        if matches!(self.kind, Kind::File(_)) {
            return Err(Error::NotADirectory(self.rel.clone()));
        }

        let fresh = match &self.kind {
            Kind::Dir { listing: None, .. } => Some(self.list().await?),
            _ => None,
        };

        let Kind::Dir { listing, cursor } = &mut self.kind else {
            return Err(Error::NotADirectory(self.rel.clone()));
        };
        if let Some(fresh) = fresh {
            *listing = Some(fresh);
        }

        let all = listing.as_deref().unwrap_or(&[]);
        if *cursor >= all.len() {
            return Ok(None);
        }

        let end = if count == 0 {
            all.len()
        } else {
            cursor.saturating_add(count).min(all.len())
        };
        let chunk = all[*cursor..end].to_vec();
        *cursor = end;
        Ok(Some(chunk))
    }

    async fn close(&mut self) -> Result<()> {
        if let Kind::File(file) = &mut self.kind {
            file.take();
        }
        Ok(())
    }
}
