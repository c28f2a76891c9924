//! # tmod-extract
//!
//! A library for unpacking tModLoader `.tmod` archives.
//!
//! The library decodes an archive, writes each entry's stored payload to
//! disk, inflates the entries that were stored compressed and turns the
//! game's raw image dumps into PNG files.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tmod_extract::archive::Archive;
//! use tmod_extract::error::Result;
//!
//! fn list_entries(path: &str) -> Result<()> {
//!     let archive = Archive::open(path)?;
//!
//!     println!("{} v{} (built with {})", archive.mod_name, archive.mod_version, archive.version);
//!     for entry in &archive.entries {
//!         let state = if entry.is_compressed() { "compressed" } else { "stored" };
//!         println!("{} {} bytes ({state})", entry.filename, entry.raw_size);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`error`] - Error types and result alias
//! - [`binary`] - Little-endian integers and 7-bit length-prefixed strings
//! - [`format`] - Format constants and file naming conventions
//! - [`archive`] - Archive decoding and entry extraction
//! - [`manifest`] - The `entries.txt` manifest
//! - [`decompress`] - Raw DEFLATE decompression of extracted entries
//! - [`rawimg`] - Raw image to PNG conversion
//! - [`pipeline`] - Runs the stages over whole archives, manifests or files
//!
//! ## Format Reference
//!
//! - **Header**: `TMOD` magic, loader version string, 20-byte hash,
//!   256-byte signature, u32 data length, mod name and mod version
//! - **Entry table**: i32 count, then per entry a filename, i32 raw size
//!   and i32 stored size
//! - **Payloads**: concatenated in table order, each exactly its stored size
//!
//! Strings are prefixed with a 7-bit encoded length. All multi-byte
//! integers are little-endian.

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod binary;
pub mod decompress;
pub mod error;
pub mod format;
pub mod manifest;
pub mod pipeline;
pub mod rawimg;

// Re-export commonly used types at the crate root
pub use archive::{Archive, Entry};
pub use decompress::{DecompressOutcome, OutputMode};
pub use error::{ErrorKind, ExtractError, Result};
pub use manifest::ManifestRow;
pub use pipeline::{EntryReport, EntryState, Pipeline, PipelineOptions, PipelineReport};
pub use rawimg::RawImage;
