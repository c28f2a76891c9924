//! Shared fixtures for integration tests: archives assembled byte by byte.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;

use flate2::write::DeflateEncoder;
use flate2::Compression;
use tmod_extract::binary::encode_7bit_int;
use tmod_extract::format::{HASH_LEN, SIGNATURE_LEN, TMOD_MAGIC};

static INIT: Once = Once::new();

/// Routes library logs to the test harness.
pub fn init_logging() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Compresses `data` as a raw DEFLATE stream.
pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// Creates raw image bytes: a version 1 header and `width * height` pixels.
pub fn rawimg(width: u32, height: u32) -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&width.to_le_bytes());
    data.extend_from_slice(&height.to_le_bytes());
    for i in 0..width * height {
        data.extend_from_slice(&[(i % 256) as u8, 0x40, 0x80, 0xFF]);
    }
    data
}

/// One entry as it will be written into an archive.
pub struct FixtureEntry {
    pub filename: String,
    pub raw_size: i32,
    pub payload: Vec<u8>,
}

impl FixtureEntry {
    /// An entry stored as-is.
    pub fn stored(filename: &str, data: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            raw_size: data.len() as i32,
            payload: data.to_vec(),
        }
    }

    /// An entry stored as a raw DEFLATE stream.
    pub fn compressed(filename: &str, data: &[u8]) -> Self {
        let payload = deflate(data);
        assert!(
            payload.len() < data.len(),
            "fixture {filename} does not compress"
        );
        Self {
            filename: filename.to_string(),
            raw_size: data.len() as i32,
            payload,
        }
    }

    /// An entry with an arbitrary declared raw size.
    pub fn with_sizes(filename: &str, raw_size: i32, payload: &[u8]) -> Self {
        Self {
            filename: filename.to_string(),
            raw_size,
            payload: payload.to_vec(),
        }
    }
}

/// Builds archive bytes field by field.
pub struct ArchiveBuilder {
    magic: [u8; 4],
    version: String,
    mod_name: String,
    mod_version: String,
    entries: Vec<FixtureEntry>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self {
            magic: *TMOD_MAGIC,
            version: "v2024.5.3.0".to_string(),
            mod_name: "ExampleMod".to_string(),
            mod_version: "1.4.0".to_string(),
            entries: Vec::new(),
        }
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn magic(mut self, magic: &[u8; 4]) -> Self {
        self.magic = *magic;
        self
    }

    pub fn mod_name(mut self, name: &str) -> Self {
        self.mod_name = name.to_string();
        self
    }

    pub fn entry(mut self, entry: FixtureEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut section = Vec::new();
        push_string(&mut section, &self.mod_name);
        push_string(&mut section, &self.mod_version);
        section.extend_from_slice(&(self.entries.len() as i32).to_le_bytes());
        for entry in &self.entries {
            push_string(&mut section, &entry.filename);
            section.extend_from_slice(&entry.raw_size.to_le_bytes());
            section.extend_from_slice(&(entry.payload.len() as i32).to_le_bytes());
        }
        for entry in &self.entries {
            section.extend_from_slice(&entry.payload);
        }

        let mut data = self.magic.to_vec();
        push_string(&mut data, &self.version);
        data.extend_from_slice(&[0xAB; HASH_LEN]);
        data.extend_from_slice(&[0xCD; SIGNATURE_LEN]);
        data.extend_from_slice(&(section.len() as u32).to_le_bytes());
        data.extend(section);
        data
    }

    /// Writes the archive to `dir/<name>` and returns the path.
    pub fn write_to(&self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, self.build()).unwrap();
        path
    }
}

fn push_string(out: &mut Vec<u8>, s: &str) {
    out.extend(encode_7bit_int(s.len() as u64));
    out.extend_from_slice(s.as_bytes());
}
