use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::io::{self, SeekFrom};
use std::sync::Arc;

use super::{File, FileInfo, FileSystem, SEPARATOR, base_name, parent_name};
use crate::error::{Error, Result};
use crate::io::ReadAt;
use crate::zip::{EntryReader, ZipArchive, ZipFileEntry};

/// A name in the archive's directory tree.
enum Node {
    /// Backed by the archive entry at this index.
    Entry(usize),
    /// Directory that only exists as the prefix of other entries' names.
    Implicit(String),
}

/// Archive plus the lookup tables built once at open time.
struct Tree<R: ReadAt> {
    archive: ZipArchive<R>,
    nodes: Vec<Node>,
    /// name -> first node carrying it
    by_name: HashMap<String, usize>,
    /// directory name (with separator, `""` for root) -> direct children in
    /// archive order
    children: HashMap<String, Vec<usize>>,
}

impl<R: ReadAt> Tree<R> {
    fn build(archive: ZipArchive<R>) -> Self {
        let explicit: HashSet<&str> = archive
            .entries()
            .iter()
            .map(|e| e.file_name.as_str())
            .collect();

        let mut nodes = Vec::with_capacity(archive.entries().len());
        let mut synthesized = HashSet::new();

        for (index, entry) in archive.entries().iter().enumerate() {
            let name = entry.file_name.as_str();
            let last = name.len().saturating_sub(1);
            for (pos, _) in name.match_indices(SEPARATOR).filter(|(pos, _)| *pos < last) {
                let dir = &name[..=pos];
                if !explicit.contains(dir) && synthesized.insert(dir.to_string()) {
                    nodes.push(Node::Implicit(dir.to_string()));
                }
            }
            nodes.push(Node::Entry(index));
        }

        let mut by_name = HashMap::new();
        let mut children: HashMap<String, Vec<usize>> = HashMap::new();
        for (id, node) in nodes.iter().enumerate() {
            let name = match node {
                Node::Entry(index) => archive.entries()[*index].file_name.as_str(),
                Node::Implicit(name) => name.as_str(),
            };
            by_name.entry(name.to_string()).or_insert(id);
            children
                .entry(parent_name(name).to_string())
                .or_default()
                .push(id);
        }

        Self {
            archive,
            nodes,
            by_name,
            children,
        }
    }

    fn name(&self, id: usize) -> &str {
        match &self.nodes[id] {
            Node::Entry(index) => &self.archive.entries()[*index].file_name,
            Node::Implicit(name) => name,
        }
    }

    fn info(&self, id: usize) -> FileInfo {
        match &self.nodes[id] {
            Node::Entry(index) => entry_info(&self.archive.entries()[*index]),
            Node::Implicit(name) => FileInfo {
                name: base_name(name).to_string(),
                path: name.clone(),
                size: 0,
                modified: DateTime::<Utc>::UNIX_EPOCH,
                is_dir: true,
            },
        }
    }
}

fn entry_info(entry: &ZipFileEntry) -> FileInfo {
    FileInfo {
        name: base_name(&entry.file_name).to_string(),
        path: entry.file_name.clone(),
        size: entry.uncompressed_size,
        modified: entry.modified(),
        is_dir: entry.is_directory,
    }
}

/// Read-only filesystem over the entries of a zip archive.
///
/// Directories are entries whose name ends in `/`; parents that the archive
/// never lists on their own are synthesized so every prefix can be opened and
/// listed. Listings follow archive order. When names repeat, the first one in
/// archive order wins.
pub struct ZipFileSystem<R: ReadAt> {
    tree: Arc<Tree<R>>,
}

impl<R: ReadAt> Clone for ZipFileSystem<R> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
        }
    }
}

impl<R: ReadAt + 'static> ZipFileSystem<R> {
    pub fn new(archive: ZipArchive<R>) -> Self {
        Self {
            tree: Arc::new(Tree::build(archive)),
        }
    }

    pub fn archive(&self) -> &ZipArchive<R> {
        &self.tree.archive
    }

    /// Open `path` as a concrete [`ZipFile`].
    pub async fn open_file(&self, path: &str) -> Result<ZipFile<R>> {
        let name = path.strip_prefix(SEPARATOR).unwrap_or(path);

        if name.is_empty() {
            return Ok(ZipFile {
                tree: self.tree.clone(),
                handle: Handle::Root,
                cursor: 0,
            });
        }

        let exact = self.tree.by_name.get(name).copied();
        let with_slash = self.tree.by_name.get(&format!("{name}/")).copied();
        let id = match (exact, with_slash) {
            (Some(a), Some(b)) => a.min(b),
            (Some(id), None) | (None, Some(id)) => id,
            (None, None) => return Err(Error::NotFound(path.to_string())),
        };

        let handle = match &self.tree.nodes[id] {
            Node::Implicit(_) => Handle::Implicit { node: id },
            Node::Entry(index) => {
                let entry = &self.tree.archive.entries()[*index];
                let stream = self.tree.archive.open_entry(entry).await?;
                Handle::Entry {
                    node: id,
                    entry: *index,
                    stream: Some(stream),
                    position: 0,
                }
            }
        };

        Ok(ZipFile {
            tree: self.tree.clone(),
            handle,
            cursor: 0,
        })
    }
}

#[async_trait]
impl<R: ReadAt + 'static> FileSystem for ZipFileSystem<R> {
    async fn open(&self, path: &str) -> Result<Box<dyn File>> {
        Ok(Box::new(self.open_file(path).await?))
    }
}

enum Handle<R: ReadAt> {
    Root,
    Implicit {
        node: usize,
    },
    Entry {
        node: usize,
        entry: usize,
        /// `None` once closed
        stream: Option<EntryReader<R>>,
        position: u64,
    },
}

/// Open handle on a [`ZipFileSystem`] path.
pub struct ZipFile<R: ReadAt> {
    tree: Arc<Tree<R>>,
    handle: Handle<R>,
    /// Next child to return from `readdir`
    cursor: usize,
}

fn closed() -> Error {
    io::Error::other("file already closed").into()
}

#[async_trait]
impl<R: ReadAt + 'static> File for ZipFile<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match &mut self.handle {
            Handle::Root | Handle::Implicit { .. } => Ok(0),
            Handle::Entry {
                stream, position, ..
            } => {
                let stream = stream.as_mut().ok_or_else(closed)?;
                // a seek past the end leaves the position ahead of the stream
                if *position > stream.position() {
                    return Ok(0);
                }
                let n = stream.read(buf).await?;
                *position += n as u64;
                Ok(n)
            }
        }
    }

    /// Entry streams only go forward, so every seek reopens the entry and
    /// decompresses up to the target. Seeking backwards costs the same as
    /// reading from the start. A target past the end is accepted; reads from
    /// there return 0 bytes.
    async fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        let Handle::Entry {
            entry,
            stream,
            position,
            ..
        } = &mut self.handle
        else {
            return Err(Error::InvalidSeek("directories cannot be seeked".into()));
        };
        if stream.is_none() {
            return Err(closed());
        }

        let size = self.tree.archive.entries()[*entry].uncompressed_size;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(delta) => *position as i128 + delta as i128,
            SeekFrom::End(delta) => size as i128 + delta as i128,
        };
        let target = u64::try_from(target)
            .map_err(|_| Error::InvalidSeek(format!("position {target} is out of range")))?;

        *stream = None;
        let mut fresh = self
            .tree
            .archive
            .open_entry(&self.tree.archive.entries()[*entry])
            .await?;
        fresh.skip(target).await?;
        *stream = Some(fresh);
        *position = target;
        Ok(target)
    }

    async fn stat(&self) -> Result<FileInfo> {
        Ok(match &self.handle {
            Handle::Root => FileInfo::root(),
            Handle::Implicit { node } | Handle::Entry { node, .. } => self.tree.info(*node),
        })
    }

    async fn readdir(&mut self, count: usize) -> Result<Option<Vec<FileInfo>>> {
        let dir = match &self.handle {
            Handle::Root => "",
            Handle::Implicit { node } => self.tree.name(*node),
            Handle::Entry { node, entry, .. } => {
                if !self.tree.archive.entries()[*entry].is_directory {
                    return Err(Error::NotADirectory(self.tree.name(*node).to_string()));
                }
                self.tree.name(*node)
            }
        };

        let children = self.tree.children.get(dir).map(Vec::as_slice).unwrap_or(&[]);
        if self.cursor >= children.len() {
            return Ok(None);
        }

        let end = if count == 0 {
            children.len()
        } else {
            self.cursor.saturating_add(count).min(children.len())
        };
        let listing = children[self.cursor..end]
            .iter()
            .map(|id| self.tree.info(*id))
            .collect();
        self.cursor = end;
        Ok(Some(listing))
    }

    async fn close(&mut self) -> Result<()> {
        if let Handle::Entry { stream, .. } = &mut self.handle {
            stream.take();
        }
        Ok(())
    }
}
