//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For reading an entry, read its Local File Header to find the data
//!
//! The source handed to the parser must start at the archive's first byte;
//! archives embedded in a larger stream go through a
//! [`ShiftedReader`](crate::io::ShiftedReader) first.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{self, Cursor, Read};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::locator::{read_end_record, read_zip64_locator};
use super::structures::*;

/// Central directory location, in archive-relative offsets.
#[derive(Debug, Clone)]
pub struct DirectoryInfo {
    pub cd_offset: u64,
    pub cd_size: u64,
    pub total_entries: u64,
    pub comment: Vec<u8>,
}

/// Low-level ZIP file parser.
///
/// Generic over the reader type so local files, in-memory buffers, HTTP
/// sources and shifted views all go through the same code.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD holds sentinel values (0xFFFF or
    /// 0xFFFFFFFF). Returns `None` when no ZIP64 locator precedes the EOCD,
    /// in which case the classic fields are taken at face value.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Option<Zip64EOCD>> {
        let Some((locator, _)) = read_zip64_locator(&*self.reader, eocd_offset).await? else {
            return Ok(None);
        };

        if locator.eocd64_offset.saturating_add(Zip64EOCD::MIN_SIZE as u64) > self.size {
            return Err(Error::corrupt("ZIP64 end record lies outside the archive"));
        }

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf).map(Some)
    }

    /// Locate the central directory and read the archive comment.
    pub async fn read_directory_info(&self) -> Result<DirectoryInfo> {
        let (eocd, eocd_offset) = match read_end_record(&*self.reader).await {
            Ok(found) => found,
            // The caller already detected an archive here, so a missing
            // trailer now means the bytes changed or the bounds are wrong.
            Err(Error::NotAnArchive) => {
                return Err(Error::corrupt("end of central directory record not found"));
            }
            Err(e) => return Err(e),
        };

        if eocd.disk_number != eocd.disk_with_cd || eocd.disk_entries != eocd.total_entries {
            return Err(Error::corrupt("multi-volume archives are not supported"));
        }

        let eocd64 = if eocd.is_zip64() {
            self.read_zip64_eocd(eocd_offset).await?
        } else {
            None
        };
        let (cd_offset, cd_size, total_entries) = match eocd64 {
            Some(eocd64) => (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries),
            None => (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
            ),
        };

        if cd_offset.saturating_add(cd_size) > eocd_offset {
            return Err(Error::corrupt(format!(
                "central directory ({} bytes at {}) overlaps its end record at {}",
                cd_size, cd_offset, eocd_offset
            )));
        }
        if total_entries.saturating_mul(CDFH_MIN_SIZE as u64) > cd_size {
            return Err(Error::corrupt(format!(
                "{} entries cannot fit in a {} byte central directory",
                total_entries, cd_size
            )));
        }

        let mut comment = vec![0u8; eocd.comment_len as usize];
        self.reader
            .read_exact_at(eocd_offset + EndOfCentralDirectory::SIZE as u64, &mut comment)
            .await?;

        Ok(DirectoryInfo {
            cd_offset,
            cd_size,
            total_entries,
            comment,
        })
    }

    /// List all files in the ZIP archive, in central directory order.
    pub async fn list_files(&self, info: &DirectoryInfo) -> Result<Vec<ZipFileEntry>> {
        // Read the entire Central Directory in one request
        let mut cd_data = vec![0u8; info.cd_size as usize];
        self.reader.read_exact_at(info.cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(info.total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..info.total_entries {
            let entry = parse_cdfh(&mut cursor).map_err(|e| {
                Error::corrupt(format!("central directory entry {}: {}", index, e))
            })?;
            if entry.lfh_offset >= info.cd_offset {
                return Err(Error::corrupt(format!(
                    "{}: local header offset {} points past the file data",
                    entry.file_name, entry.lfh_offset
                )));
            }
            entries.push(entry);
        }

        Ok(entries)
    }

    /// Get the actual data offset for a file entry.
    ///
    /// The Local File Header (LFH) has variable-length fields (filename,
    /// extra field) that may differ from the Central Directory entry.
    /// This method reads the LFH to calculate where the actual file
    /// data begins.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = [0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            return Err(Error::corrupt(format!(
                "{}: invalid local file header",
                entry.file_name
            )));
        }

        // filename and extra field lengths sit at fixed positions
        let file_name_length = u16::from_le_bytes([lfh_buf[26], lfh_buf[27]]) as u64;
        let extra_field_length = u16::from_le_bytes([lfh_buf[28], lfh_buf[29]]) as u64;

        let data_offset =
            entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length;

        if data_offset.saturating_add(entry.compressed_size) > self.size {
            return Err(Error::corrupt(format!(
                "{}: data extends past the end of the archive",
                entry.file_name
            )));
        }

        Ok(data_offset)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }

    pub fn size(&self) -> u64 {
        self.size
    }
}

fn invalid(msg: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.to_string())
}

/// Parse a Central Directory File Header from a cursor.
fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> io::Result<ZipFileEntry> {
    let mut sig = [0u8; 4];
    cursor.read_exact(&mut sig)?;
    if sig != CDFH_SIGNATURE {
        return Err(invalid("bad signature"));
    }

    let _version_made_by = cursor.read_u16::<LittleEndian>()?;
    let _version_needed = cursor.read_u16::<LittleEndian>()?;
    let flags = cursor.read_u16::<LittleEndian>()?;
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let last_mod_time = cursor.read_u16::<LittleEndian>()?;
    let last_mod_date = cursor.read_u16::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()?;
    let extra_field_length = cursor.read_u16::<LittleEndian>()?;
    let file_comment_length = cursor.read_u16::<LittleEndian>()?;
    let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
    let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
    let _external_attrs = cursor.read_u32::<LittleEndian>()?;
    let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let mut file_name_bytes = vec![0u8; file_name_length as usize];
    cursor.read_exact(&mut file_name_bytes)?;
    // Use lossy conversion to handle non-UTF8 filenames gracefully
    let file_name = String::from_utf8_lossy(&file_name_bytes).to_string();

    let is_directory = file_name.ends_with('/');

    let mut extra = vec![0u8; extra_field_length as usize];
    cursor.read_exact(&mut extra)?;
    let mut unix_mtime = None;

    let mut fields = Cursor::new(extra.as_slice());
    while fields.position() + 4 <= extra.len() as u64 {
        let header_id = fields.read_u16::<LittleEndian>()?;
        let field_size = fields.read_u16::<LittleEndian>()? as u64;
        let field_end = fields.position() + field_size;
        if field_end > extra.len() as u64 {
            return Err(invalid("extra field overruns its block"));
        }

        match header_id {
            EXTRA_ZIP64 => {
                // Fields are present only if corresponding header field is 0xFFFFFFFF
                if uncompressed_size == 0xFFFFFFFF && fields.position() + 8 <= field_end {
                    uncompressed_size = fields.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && fields.position() + 8 <= field_end {
                    compressed_size = fields.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && fields.position() + 8 <= field_end {
                    lfh_offset = fields.read_u64::<LittleEndian>()?;
                }
            }
            EXTRA_EXTENDED_TIMESTAMP if field_size >= 5 => {
                // bit 0 of the flags byte: mtime follows
                let ts_flags = fields.read_u8()?;
                if ts_flags & 0x01 != 0 {
                    unix_mtime = Some(fields.read_i32::<LittleEndian>()? as i64);
                }
            }
            _ => {}
        }

        fields.set_position(field_end);
    }

    // Skip over the file comment (we don't use it)
    cursor.set_position(cursor.position() + file_comment_length as u64);

    Ok(ZipFileEntry {
        file_name,
        flags,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        lfh_offset,
        last_mod_time,
        last_mod_date,
        unix_mtime,
        is_directory,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn cdfh(name: &str, extra: &[u8]) -> Vec<u8> {
        let mut raw = Vec::from(CDFH_SIGNATURE);
        raw.write_u16::<LittleEndian>(20).unwrap();
        raw.write_u16::<LittleEndian>(20).unwrap();
        raw.write_u16::<LittleEndian>(0).unwrap();
        raw.write_u16::<LittleEndian>(8).unwrap();
        raw.write_u16::<LittleEndian>(0).unwrap();
        raw.write_u16::<LittleEndian>(0).unwrap();
        raw.write_u32::<LittleEndian>(0xDEADBEEF).unwrap();
        raw.write_u32::<LittleEndian>(0xFFFFFFFF).unwrap();
        raw.write_u32::<LittleEndian>(0xFFFFFFFF).unwrap();
        raw.write_u16::<LittleEndian>(name.len() as u16).unwrap();
        raw.write_u16::<LittleEndian>(extra.len() as u16).unwrap();
        raw.write_u16::<LittleEndian>(0).unwrap();
        raw.write_u16::<LittleEndian>(0).unwrap();
        raw.write_u16::<LittleEndian>(0).unwrap();
        raw.write_u32::<LittleEndian>(0).unwrap();
        raw.write_u32::<LittleEndian>(0).unwrap();
        raw.extend_from_slice(name.as_bytes());
        raw.extend_from_slice(extra);
        raw
    }

    #[test]
    fn parses_zip64_and_timestamp_extras() {
        let mut extra = Vec::new();
        extra.write_u16::<LittleEndian>(EXTRA_EXTENDED_TIMESTAMP).unwrap();
        extra.write_u16::<LittleEndian>(5).unwrap();
        extra.write_u8(1).unwrap();
        extra.write_i32::<LittleEndian>(1_600_000_000).unwrap();
        extra.write_u16::<LittleEndian>(EXTRA_ZIP64).unwrap();
        extra.write_u16::<LittleEndian>(16).unwrap();
        extra.write_u64::<LittleEndian>(5_000_000_000).unwrap();
        extra.write_u64::<LittleEndian>(4_000_000_000).unwrap();

        let raw = cdfh("big/file.bin", &extra);
        let entry = parse_cdfh(&mut Cursor::new(raw.as_slice())).unwrap();
        assert_eq!(entry.file_name, "big/file.bin");
        assert_eq!(entry.uncompressed_size, 5_000_000_000);
        assert_eq!(entry.compressed_size, 4_000_000_000);
        assert_eq!(entry.unix_mtime, Some(1_600_000_000));
        assert_eq!(entry.compression_method, CompressionMethod::Deflate);
        assert!(!entry.is_directory);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut raw = cdfh("a", &[]);
        raw[2] = 0x03;
        assert!(parse_cdfh(&mut Cursor::new(raw.as_slice())).is_err());
    }

    #[test]
    fn rejects_overrunning_extra_field() {
        let extra = [0x99, 0x99, 0x10, 0x00, 0x01];
        let raw = cdfh("a", &extra);
        assert!(parse_cdfh(&mut Cursor::new(raw.as_slice())).is_err());
    }
}
