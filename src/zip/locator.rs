//! Locating a zip archive at the tail of a larger stream.
//!
//! A self-contained executable is `[executable image][zip archive]` with no
//! delimiter. The only way to find the boundary is to read the archive's own
//! trailer: the end-of-central-directory record (EOCD) sits in the last
//! `22 + comment_len` bytes and records where the central directory lives
//! relative to the archive start. From that the archive's total length, and
//! therefore its start inside the stream, follows.

use crate::error::{Error, Result};
use crate::io::ReadAt;

use super::structures::{EndOfCentralDirectory, Zip64EOCD, Zip64EOCDLocator};

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
pub const MAX_COMMENT_SIZE: u64 = 65535;

/// Position of an archive inside a larger stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveBounds {
    /// Offset of the first archive byte; everything before belongs to the host.
    pub start: u64,
    /// Bytes from `start` to the end of the stream.
    pub len: u64,
}

/// Find the EOCD record in `tail`, the trailing bytes of a stream.
///
/// Candidates are tried from the end backwards. A candidate is accepted only
/// if the signature matches and the record, including its declared comment,
/// ends exactly at the end of `tail`. Signature bytes that merely appear
/// inside a comment fail the length check and are skipped.
///
/// Returns the record's index within `tail`.
pub fn find_end_record(tail: &[u8]) -> Option<(usize, EndOfCentralDirectory)> {
    let last = tail.len().checked_sub(EndOfCentralDirectory::SIZE)?;

    for i in (0..=last).rev() {
        if &tail[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
            continue;
        }

        let comment_len = u16::from_le_bytes([tail[i + 20], tail[i + 21]]) as usize;
        if i + EndOfCentralDirectory::SIZE + comment_len != tail.len() {
            continue;
        }

        let record = &tail[i..i + EndOfCentralDirectory::SIZE];
        if let Ok(eocd) = EndOfCentralDirectory::from_bytes(record) {
            return Some((i, eocd));
        }
    }

    None
}

/// Read the tail of `reader` and return its EOCD record with the record's
/// absolute offset.
///
/// Fails with [`Error::NotAnArchive`] if no candidate in the window is valid.
pub async fn read_end_record<R: ReadAt + ?Sized>(
    reader: &R,
) -> Result<(EndOfCentralDirectory, u64)> {
    let size = reader.size();
    if size < EndOfCentralDirectory::SIZE as u64 {
        return Err(Error::NotAnArchive);
    }

    let window = (MAX_COMMENT_SIZE + EndOfCentralDirectory::SIZE as u64).min(size);
    let window_start = size - window;

    let mut tail = vec![0u8; window as usize];
    reader.read_exact_at(window_start, &mut tail).await?;

    let (index, eocd) = find_end_record(&tail).ok_or(Error::NotAnArchive)?;
    Ok((eocd, window_start + index as u64))
}

/// Read the ZIP64 locator that sits right before the EOCD at `eocd_offset`.
///
/// Returns `None` when those bytes do not carry the locator signature. A
/// classic archive may hold sentinel values such as exactly 65535 entries
/// without having any ZIP64 records.
pub async fn read_zip64_locator<R: ReadAt + ?Sized>(
    reader: &R,
    eocd_offset: u64,
) -> Result<Option<(Zip64EOCDLocator, u64)>> {
    let Some(locator_offset) = eocd_offset.checked_sub(Zip64EOCDLocator::SIZE as u64) else {
        return Ok(None);
    };

    let mut buf = [0u8; Zip64EOCDLocator::SIZE];
    reader.read_exact_at(locator_offset, &mut buf).await?;
    if &buf[0..4] != Zip64EOCDLocator::SIGNATURE {
        return Ok(None);
    }

    Ok(Some((Zip64EOCDLocator::from_bytes(&buf)?, locator_offset)))
}

/// Locate the zip archive at the end of `reader`.
///
/// Classic archives are `cd_offset + cd_size + 22 + comment_len` bytes long.
/// ZIP64 archives are measured from their ZIP64 end record, whose
/// archive-relative offset is stored in the locator.
pub async fn locate_archive<R: ReadAt + ?Sized>(reader: &R) -> Result<ArchiveBounds> {
    let size = reader.size();
    let (eocd, eocd_offset) = read_end_record(reader).await?;

    let zip64 = if eocd.is_zip64() {
        read_zip64_locator(reader, eocd_offset).await?
    } else {
        None
    };

    let start = match zip64 {
        Some((locator, locator_offset)) => {
            // The ZIP64 record immediately precedes its locator.
            let record_offset = locator_offset
                .checked_sub(Zip64EOCD::MIN_SIZE as u64)
                .ok_or_else(|| Error::corrupt("ZIP64 end record out of range"))?;
            let mut buf = [0u8; Zip64EOCD::MIN_SIZE];
            reader.read_exact_at(record_offset, &mut buf).await?;
            Zip64EOCD::from_bytes(&buf)?;

            record_offset
                .checked_sub(locator.eocd64_offset)
                .ok_or_else(|| Error::corrupt("ZIP64 end record offset exceeds stream"))?
        }
        None => size.checked_sub(eocd.archive_len()).ok_or_else(|| {
            Error::corrupt(format!(
                "central directory extends {} bytes before the start of the stream",
                eocd.archive_len() - size
            ))
        })?,
    };

    let bounds = ArchiveBounds {
        start,
        len: size - start,
    };
    log::debug!(
        "found zip archive of {} bytes at offset {} (stream is {} bytes)",
        bounds.len,
        bounds.start,
        size
    );
    Ok(bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eocd(cd_size: u32, cd_offset: u32, comment: &[u8], declared_len: u16) -> Vec<u8> {
        let mut raw = Vec::from(EndOfCentralDirectory::SIGNATURE);
        raw.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        raw.extend_from_slice(&cd_size.to_le_bytes());
        raw.extend_from_slice(&cd_offset.to_le_bytes());
        raw.extend_from_slice(&declared_len.to_le_bytes());
        raw.extend_from_slice(comment);
        raw
    }

    #[test]
    fn finds_record_without_comment() {
        let mut stream = vec![0xAA; 10];
        stream.extend(eocd(0, 0, b"", 0));
        let (index, record) = find_end_record(&stream).unwrap();
        assert_eq!(index, 10);
        assert_eq!(record.comment_len, 0);
    }

    #[test]
    fn honours_declared_comment_length() {
        let comment = b"hello, comment";
        let mut stream = vec![1, 2, 3];
        stream.extend(eocd(0, 0, comment, comment.len() as u16));
        let (index, record) = find_end_record(&stream).unwrap();
        assert_eq!(index, 3);
        assert_eq!(record.comment_len as usize, comment.len());
    }

    #[test]
    fn rejects_record_whose_length_overshoots() {
        let mut stream = vec![0; 4];
        stream.extend(eocd(0, 0, b"abc", 4));
        assert!(find_end_record(&stream).is_none());
    }

    #[test]
    fn skips_signature_inside_comment() {
        // A comment that holds a fake record whose comment length does not
        // reach the end of the stream.
        let fake = eocd(99, 99, b"", 7);
        let mut comment = fake.clone();
        comment.extend_from_slice(b"tail");
        let mut stream = vec![0; 8];
        stream.extend(eocd(0, 0, &comment, comment.len() as u16));

        let (index, record) = find_end_record(&stream).unwrap();
        assert_eq!(index, 8);
        assert_eq!(record.cd_size, 0);
    }

    #[test]
    fn too_short_for_a_record() {
        assert!(find_end_record(&[0x50, 0x4b, 0x05, 0x06]).is_none());
        assert!(find_end_record(&[]).is_none());
    }

    #[tokio::test]
    async fn computes_start_after_prefix() {
        // 5 bytes of "central directory" at archive offset 3, comment "xy"
        let mut archive = vec![0u8; 3 + 5];
        archive.extend(eocd(5, 3, b"xy", 2));
        let archive_len = archive.len() as u64;

        let mut stream = b"#!/bin/true\n".to_vec();
        let prefix_len = stream.len() as u64;
        stream.extend(archive);

        let bounds = locate_archive(&stream).await.unwrap();
        assert_eq!(bounds.start, prefix_len);
        assert_eq!(bounds.len, archive_len);
    }

    #[tokio::test]
    async fn plain_bytes_are_not_an_archive() {
        let stream = vec![7u8; 100];
        assert!(matches!(
            locate_archive(&stream).await,
            Err(Error::NotAnArchive)
        ));
    }

    #[tokio::test]
    async fn oversized_directory_is_corrupt() {
        let stream = eocd(10, 1000, b"", 0);
        assert!(matches!(
            locate_archive(&stream).await,
            Err(Error::Corrupt(_))
        ));
    }
}
