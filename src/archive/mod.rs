//! Decoding of tmod archives.
//!
//! An archive is decoded in one pass over its bytes, in strict field order:
//! header strings and opaque blobs, the entry table, then every entry's
//! payload in table order. Any structural problem aborts the decode; an
//! archive is never partially trusted.
//!
//! # Example
//!
//! ```no_run
//! use tmod_extract::archive::Archive;
//!
//! let archive = Archive::open("MyMod.tmod")?;
//! println!("{} v{}", archive.mod_name, archive.mod_version);
//! for entry in &archive.entries {
//!     println!("{} {} {}", entry.filename, entry.raw_size, entry.comp_size);
//! }
//! # Ok::<(), tmod_extract::error::ExtractError>(())
//! ```

mod entry;

pub use entry::{resolve_entry_path, Entry};

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::binary::ByteReader;
use crate::error::{ExtractError, Result};
use crate::format::{HASH_LEN, MIN_ENTRY_ROW_LEN, SIGNATURE_LEN, TMOD_MAGIC};

/// A decoded tmod archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Archive {
    /// Magic bytes "TMOD".
    pub magic: [u8; 4],

    /// Version of the mod loader that built the archive.
    pub version: String,

    /// Content hash, kept as opaque bytes.
    pub hash: [u8; HASH_LEN],

    /// Signature blob, kept as opaque bytes.
    pub signature: [u8; SIGNATURE_LEN],

    /// Declared length of the data following the length field.
    pub data_len: u32,

    /// Internal name of the mod.
    pub mod_name: String,

    /// Version string of the mod.
    pub mod_version: String,

    /// Entries in table order.
    pub entries: Vec<Entry>,
}

/// Entry table row as read, before its payload is attached.
struct TableRow {
    filename: String,
    raw_size: u32,
    comp_size: u32,
}

impl Archive {
    /// Reads and decodes the archive at `path`.
    ///
    /// # Errors
    ///
    /// - `ExtractError::Io` if the file cannot be read
    /// - any error from [`Archive::parse`], wrapped with the file path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| ExtractError::io(path, e))?;
        info!("Decoding {} ({} bytes)", path.display(), data.len());

        Self::parse(&data).map_err(|e| e.in_entry(path.display().to_string()))
    }

    /// Decodes an archive from raw bytes.
    ///
    /// # Errors
    ///
    /// - `ExtractError::InvalidHeader` if the magic bytes are not "TMOD"
    /// - `ExtractError::TruncatedArchive` if any field runs past the end of the data
    /// - `ExtractError::InvalidVarInt` if a string length prefix is malformed
    /// - `ExtractError::InvalidString` if a string is not valid UTF-8
    /// - `ExtractError::InvalidEntryCount` if the entry count is negative or
    ///   too large for the remaining data
    /// - `ExtractError::InvalidEntrySize` if an entry declares a negative size
    /// - `ExtractError::DuplicateEntry` if two entries share a filename
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(data);

        let magic = reader.read_array::<4>("magic")?;
        if &magic != TMOD_MAGIC {
            return Err(ExtractError::invalid_header(TMOD_MAGIC, &magic));
        }

        let version = reader.read_string("version")?;
        let hash = reader.read_array::<HASH_LEN>("hash")?;
        let signature = reader.read_array::<SIGNATURE_LEN>("signature")?;
        let data_len = reader.read_u32_le("data length")?;
        let data_section_len = reader.remaining();

        let mod_name = reader.read_string("mod name")?;
        let mod_version = reader.read_string("mod version")?;

        let rows = read_entry_table(&mut reader)?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let payload = reader.read_bytes(row.comp_size as usize, "entry payload")?;
            entries.push(Entry::new(
                row.filename,
                row.raw_size,
                row.comp_size,
                payload.to_vec(),
            )?);
        }

        if !reader.is_empty() {
            warn!(
                "{} trailing bytes after the last entry payload",
                reader.remaining()
            );
        }

        let archive = Archive {
            magic,
            version,
            hash,
            signature,
            data_len,
            mod_name,
            mod_version,
            entries,
        };

        let payload_len = archive.total_payload_len();
        if u64::from(data_len) != payload_len && data_len as usize != data_section_len {
            warn!(
                "Declared data length {data_len} matches neither the payload total ({payload_len}) nor the data section ({data_section_len})"
            );
        }

        info!(
            "Decoded {} v{}: {} entries",
            archive.mod_name,
            archive.mod_version,
            archive.entries.len()
        );
        Ok(archive)
    }

    /// Returns the content hash as 40 lowercase hex digits.
    #[must_use]
    pub fn hash_hex(&self) -> String {
        self.hash.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Returns the sum of all entries' compressed sizes.
    #[must_use]
    pub fn total_payload_len(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.comp_size)).sum()
    }

    /// Looks up an entry by filename.
    #[must_use]
    pub fn entry(&self, filename: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.filename == filename)
    }

    /// Returns the directory this archive's entries are extracted to.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::UnsafeEntryPath` if the mod name is not a
    /// plain relative path.
    pub fn module_dir(&self, output_root: &Path) -> Result<PathBuf> {
        resolve_entry_path(output_root, &self.mod_name)
    }
}

/// Reads the entry count and the entry table.
fn read_entry_table(reader: &mut ByteReader<'_>) -> Result<Vec<TableRow>> {
    let count = reader.read_i32_le("entry count")?;
    let count = usize::try_from(count)
        .ok()
        .filter(|&n| n <= reader.remaining() / MIN_ENTRY_ROW_LEN)
        .ok_or(ExtractError::InvalidEntryCount {
            count: i64::from(count),
        })?;

    let mut seen = HashSet::with_capacity(count);
    let mut rows = Vec::with_capacity(count);

    for _ in 0..count {
        let filename = reader.read_string("entry filename")?;
        let raw_size = reader.read_i32_le("entry raw size")?;
        let comp_size = reader.read_i32_le("entry compressed size")?;

        let (Ok(raw), Ok(comp)) = (u32::try_from(raw_size), u32::try_from(comp_size)) else {
            return Err(ExtractError::InvalidEntrySize {
                entry: filename,
                raw_size,
                comp_size,
            });
        };

        if !seen.insert(filename.clone()) {
            return Err(ExtractError::DuplicateEntry { entry: filename });
        }

        debug!("Entry {filename}: raw {raw} bytes, stored {comp} bytes");
        rows.push(TableRow {
            filename,
            raw_size: raw,
            comp_size: comp,
        });
    }

    Ok(rows)
}
