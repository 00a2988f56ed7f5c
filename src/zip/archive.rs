use std::sync::Arc;

use crate::error::Result;
use crate::io::ReadAt;

use super::parser::ZipParser;
use super::stream::EntryReader;
use super::structures::ZipFileEntry;

/// An opened zip archive: the decoded central directory plus the source the
/// entry data is read from.
///
/// The entry list is immutable after [`ZipArchive::open`] and may be shared
/// between any number of readers.
pub struct ZipArchive<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
    comment: Vec<u8>,
}

impl<R: ReadAt> ZipArchive<R> {
    /// Decode the central directory of the archive starting at offset 0 of
    /// `reader`. Any failure here means the archive is corrupt or unreadable.
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let info = parser.read_directory_info().await?;
        let entries = parser.list_files(&info).await?;

        log::debug!(
            "zip archive: {} entries, central directory {} bytes at {}",
            entries.len(),
            info.cd_size,
            info.cd_offset
        );

        Ok(Self {
            parser,
            entries,
            comment: info.comment,
        })
    }

    /// Entries in central directory order.
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    /// Archive size in bytes.
    pub fn size(&self) -> u64 {
        self.parser.size()
    }

    /// Open a fresh decompression stream positioned at the entry's first byte.
    pub async fn open_entry(&self, entry: &ZipFileEntry) -> Result<EntryReader<R>> {
        let data_offset = self.parser.get_data_offset(entry).await?;
        EntryReader::new(self.parser.reader().clone(), entry, data_offset)
    }
}
