//! Shared fixtures: a minimal zip writer for building test archives.

#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use std::io::Write;

/// 2024-01-01 12:00:00 in DOS format
pub const DOS_DATE: u16 = ((2024 - 1980) << 9) | (1 << 5) | 1;
pub const DOS_TIME: u16 = 12 << 11;

struct Entry {
    name: String,
    data: Vec<u8>,
    method: u16,
    crc: Option<u32>,
}

#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<Entry>,
    comment: Vec<u8>,
    zip64: bool,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.with_method(name, data, 0)
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.with_method(name, data, 8)
    }

    pub fn dir(self, name: &str) -> Self {
        self.with_method(name, &[], 0)
    }

    /// Methods other than 0 and 8 store `data` untouched.
    pub fn with_method(mut self, name: &str, data: &[u8], method: u16) -> Self {
        self.entries.push(Entry {
            name: name.to_string(),
            data: data.to_vec(),
            method,
            crc: None,
        });
        self
    }

    /// Record a wrong CRC for the last added entry.
    pub fn wrong_crc(mut self) -> Self {
        if let Some(last) = self.entries.last_mut() {
            last.crc = Some(!crc32fast::hash(&last.data));
        }
        self
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    /// Write a ZIP64 end record and locator, leaving only sentinels in the
    /// classic end record.
    pub fn zip64(mut self) -> Self {
        self.zip64 = true;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for entry in &self.entries {
            let offset = out.len() as u32;
            let payload = match entry.method {
                8 => {
                    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&entry.data).unwrap();
                    encoder.finish().unwrap()
                }
                _ => entry.data.clone(),
            };
            let crc = entry.crc.unwrap_or_else(|| crc32fast::hash(&entry.data));

            out.extend_from_slice(b"PK\x03\x04");
            out.write_u16::<LittleEndian>(20).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.write_u16::<LittleEndian>(entry.method).unwrap();
            out.write_u16::<LittleEndian>(DOS_TIME).unwrap();
            out.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            out.write_u32::<LittleEndian>(crc).unwrap();
            out.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
            out.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            out.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            out.write_u16::<LittleEndian>(0).unwrap();
            out.extend_from_slice(entry.name.as_bytes());
            out.extend_from_slice(&payload);

            central.extend_from_slice(b"PK\x01\x02");
            central.write_u16::<LittleEndian>(0x031E).unwrap();
            central.write_u16::<LittleEndian>(20).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(entry.method).unwrap();
            central.write_u16::<LittleEndian>(DOS_TIME).unwrap();
            central.write_u16::<LittleEndian>(DOS_DATE).unwrap();
            central.write_u32::<LittleEndian>(crc).unwrap();
            central.write_u32::<LittleEndian>(payload.len() as u32).unwrap();
            central.write_u32::<LittleEndian>(entry.data.len() as u32).unwrap();
            central.write_u16::<LittleEndian>(entry.name.len() as u16).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u16::<LittleEndian>(0).unwrap();
            central.write_u32::<LittleEndian>(0).unwrap();
            central.write_u32::<LittleEndian>(offset).unwrap();
            central.extend_from_slice(entry.name.as_bytes());
        }

        let cd_offset = out.len() as u64;
        out.extend_from_slice(&central);
        let cd_size = central.len() as u64;
        let count = self.entries.len() as u64;

        if self.zip64 {
            let record_offset = out.len() as u64;
            out.extend_from_slice(b"PK\x06\x06");
            out.write_u64::<LittleEndian>(44).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u16::<LittleEndian>(45).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(count).unwrap();
            out.write_u64::<LittleEndian>(count).unwrap();
            out.write_u64::<LittleEndian>(cd_size).unwrap();
            out.write_u64::<LittleEndian>(cd_offset).unwrap();

            out.extend_from_slice(b"PK\x06\x07");
            out.write_u32::<LittleEndian>(0).unwrap();
            out.write_u64::<LittleEndian>(record_offset).unwrap();
            out.write_u32::<LittleEndian>(1).unwrap();
        }

        let (count16, cd_size32, cd_offset32) = if self.zip64 {
            (0xFFFF, 0xFFFF_FFFF, 0xFFFF_FFFF)
        } else {
            (count as u16, cd_size as u32, cd_offset as u32)
        };
        out.extend_from_slice(b"PK\x05\x06");
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(0).unwrap();
        out.write_u16::<LittleEndian>(count16).unwrap();
        out.write_u16::<LittleEndian>(count16).unwrap();
        out.write_u32::<LittleEndian>(cd_size32).unwrap();
        out.write_u32::<LittleEndian>(cd_offset32).unwrap();
        out.write_u16::<LittleEndian>(self.comment.len() as u16).unwrap();
        out.extend_from_slice(&self.comment);
        out
    }
}

/// A fake executable image: an ELF-looking header plus filler that contains
/// a stray end-record signature.
pub fn fake_executable(len: usize) -> Vec<u8> {
    let mut image = vec![0x90u8; len.max(32)];
    image[0..4].copy_from_slice(b"\x7FELF");
    image[16..20].copy_from_slice(b"PK\x05\x06");
    image
}

/// `[prefix][archive]`, the layout of a self-contained binary.
pub fn self_contained(prefix: &[u8], archive: &[u8]) -> Vec<u8> {
    [prefix, archive].concat()
}

/// Deterministic, poorly compressible test data.
pub fn pseudo_random(len: usize, seed: u32) -> Vec<u8> {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect()
}
