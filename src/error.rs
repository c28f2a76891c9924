//! Error types for the tmod extractor.
//!
//! This module defines the error hierarchy shared by every stage of the
//! pipeline: archive decoding, manifest parsing, entry decompression and
//! raw image conversion. Structural decode errors are always fatal for the
//! archive being decoded; the per-entry kinds may be skipped by the
//! orchestrator when errors are ignored.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

/// The main error type for tmod extraction operations.
///
/// # Example
///
/// ```
/// use tmod_extract::error::{ExtractError, Result};
///
/// fn example_operation() -> Result<()> {
///     Err(ExtractError::InvalidEntryCount { count: -1 })
/// }
///
/// assert!(example_operation().is_err());
/// ```
#[derive(Error, Debug)]
pub enum ExtractError {
    /// A filesystem operation failed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// The path the operation was applied to.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The archive does not start with the `TMOD` magic bytes.
    #[error("Invalid header: expected {expected}, found {found}")]
    InvalidHeader {
        /// The expected magic bytes (as hex string for display).
        expected: String,
        /// The bytes found at the start of the file (as hex string).
        found: String,
    },

    /// A 7-bit encoded integer ran past its tenth byte with a bad value.
    #[error("Invalid 7-bit encoded integer at offset {offset}: tenth byte is 0x{byte:02X} (must be 0 or 1)")]
    InvalidVarInt {
        /// Offset of the offending byte.
        offset: usize,
        /// The offending byte.
        byte: u8,
    },

    /// The entry count is negative or cannot fit in the remaining data.
    #[error("Invalid entry count: {count}")]
    InvalidEntryCount {
        /// The declared entry count.
        count: i64,
    },

    /// The data ended before a field could be read completely.
    #[error("Truncated archive while reading {field} at offset {offset}: needed {needed} bytes, only {available} available")]
    TruncatedArchive {
        /// Name of the field being read.
        field: &'static str,
        /// Offset the read started at.
        offset: usize,
        /// Number of bytes the field needed.
        needed: usize,
        /// Number of bytes left in the data.
        available: usize,
    },

    /// A length-prefixed string is not valid UTF-8.
    #[error("Invalid UTF-8 in {field} at offset {offset}: {reason}")]
    InvalidString {
        /// Name of the field being read.
        field: &'static str,
        /// Offset of the string bytes.
        offset: usize,
        /// The UTF-8 decoding diagnostic.
        reason: String,
    },

    /// An entry declares a negative raw or compressed size.
    #[error("Invalid sizes for entry `{entry}`: raw size {raw_size}, compressed size {comp_size}")]
    InvalidEntrySize {
        /// The entry filename.
        entry: String,
        /// Declared raw size.
        raw_size: i32,
        /// Declared compressed size.
        comp_size: i32,
    },

    /// An entry's payload length does not match its declared compressed size.
    #[error("Size mismatch for entry `{entry}`: expected {expected} bytes, found {actual}")]
    SizeMismatch {
        /// The entry filename.
        entry: String,
        /// Declared compressed size.
        expected: usize,
        /// Actual payload length.
        actual: usize,
    },

    /// Two entries share the same filename.
    #[error("Duplicate entry `{entry}` in archive")]
    DuplicateEntry {
        /// The repeated filename.
        entry: String,
    },

    /// An entry name would be written outside the output directory.
    #[error("Refusing to extract entry `{entry}`: path escapes the output directory")]
    UnsafeEntryPath {
        /// The entry filename.
        entry: String,
    },

    /// A manifest line could not be parsed.
    #[error("Malformed manifest row at line {line}: {reason}")]
    MalformedManifestRow {
        /// One-based line number.
        line: usize,
        /// Why the row was rejected.
        reason: String,
    },

    /// Raw DEFLATE decoding failed.
    #[error("Decompression of `{entry}` failed: {reason}")]
    DecompressionFailure {
        /// The file or entry being decompressed.
        entry: String,
        /// The codec diagnostic.
        reason: String,
    },

    /// The raw image header is shorter than 12 bytes.
    #[error("Raw image is too short: {len} bytes, the header alone needs 12. Did you forget to decompress it? (use `decompress` or the `-d` flag)")]
    RawImageTooShort {
        /// Length of the data.
        len: usize,
    },

    /// The raw image version tag is not supported.
    #[error("Invalid rawimg version: {version} (supported version: {supported}). Are you sure this is a decompressed rawimg file? Did you forget to decompress it? (use `decompress` or the `-d` flag)")]
    UnsupportedRawImageVersion {
        /// The version tag found.
        version: u32,
        /// The only supported version.
        supported: u32,
    },

    /// The pixel buffer length disagrees with the declared dimensions.
    #[error("Pixel buffer size mismatch for {width}x{height} image: expected {expected} bytes, found {actual}. Did you forget to decompress it? (use `decompress` or the `-d` flag)")]
    PixelBufferSizeMismatch {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// `width * height * 4`.
        expected: u128,
        /// Actual pixel buffer length.
        actual: usize,
    },

    /// The PNG encoder rejected the image.
    #[error("Image encoding failed: {reason}")]
    ImageEncodingFailure {
        /// The encoder diagnostic.
        reason: String,
    },

    /// An error raised while processing one named entry or file.
    #[error("{entry}: {source}")]
    InEntry {
        /// The entry filename or file path.
        entry: String,
        /// The underlying error.
        #[source]
        source: Box<ExtractError>,
    },
}

/// A copyable classification of [`ExtractError`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ErrorKind {
    Io,
    InvalidHeader,
    InvalidVarInt,
    InvalidEntryCount,
    TruncatedArchive,
    InvalidString,
    InvalidEntrySize,
    SizeMismatch,
    DuplicateEntry,
    UnsafeEntryPath,
    MalformedManifestRow,
    DecompressionFailure,
    RawImageTooShort,
    UnsupportedRawImageVersion,
    PixelBufferSizeMismatch,
    ImageEncodingFailure,
}

impl ExtractError {
    /// Creates an `InvalidHeader` error with the given byte slices.
    ///
    /// The bytes are converted to hex strings for human-readable display.
    ///
    /// # Example
    ///
    /// ```
    /// use tmod_extract::error::ExtractError;
    ///
    /// let err = ExtractError::invalid_header(b"TMOD", b"XXXX");
    /// assert!(err.to_string().contains("Invalid header"));
    /// ```
    #[must_use]
    pub fn invalid_header(expected: &[u8], found: &[u8]) -> Self {
        ExtractError::InvalidHeader {
            expected: bytes_to_hex(expected),
            found: bytes_to_hex(found),
        }
    }

    /// Creates a `TruncatedArchive` error for a read of `needed` bytes at `offset`.
    #[must_use]
    pub fn truncated(field: &'static str, offset: usize, needed: usize, data_len: usize) -> Self {
        ExtractError::TruncatedArchive {
            field,
            offset,
            needed,
            available: data_len.saturating_sub(offset),
        }
    }

    /// Creates an `Io` error for the given path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        ExtractError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Wraps this error with the name of the entry or file it belongs to.
    #[must_use]
    pub fn in_entry(self, entry: impl Into<String>) -> Self {
        ExtractError::InEntry {
            entry: entry.into(),
            source: Box::new(self),
        }
    }

    /// Returns the kind of this error, looking through `InEntry` wrappers.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExtractError::Io { .. } => ErrorKind::Io,
            ExtractError::InvalidHeader { .. } => ErrorKind::InvalidHeader,
            ExtractError::InvalidVarInt { .. } => ErrorKind::InvalidVarInt,
            ExtractError::InvalidEntryCount { .. } => ErrorKind::InvalidEntryCount,
            ExtractError::TruncatedArchive { .. } => ErrorKind::TruncatedArchive,
            ExtractError::InvalidString { .. } => ErrorKind::InvalidString,
            ExtractError::InvalidEntrySize { .. } => ErrorKind::InvalidEntrySize,
            ExtractError::SizeMismatch { .. } => ErrorKind::SizeMismatch,
            ExtractError::DuplicateEntry { .. } => ErrorKind::DuplicateEntry,
            ExtractError::UnsafeEntryPath { .. } => ErrorKind::UnsafeEntryPath,
            ExtractError::MalformedManifestRow { .. } => ErrorKind::MalformedManifestRow,
            ExtractError::DecompressionFailure { .. } => ErrorKind::DecompressionFailure,
            ExtractError::RawImageTooShort { .. } => ErrorKind::RawImageTooShort,
            ExtractError::UnsupportedRawImageVersion { .. } => {
                ErrorKind::UnsupportedRawImageVersion
            }
            ExtractError::PixelBufferSizeMismatch { .. } => ErrorKind::PixelBufferSizeMismatch,
            ExtractError::ImageEncodingFailure { .. } => ErrorKind::ImageEncodingFailure,
            ExtractError::InEntry { source, .. } => source.kind(),
        }
    }

    /// Returns whether this error means the archive structure cannot be trusted.
    ///
    /// Structural errors abort the decode of the whole archive regardless of
    /// the ignore-errors policy.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::InvalidHeader
                | ErrorKind::InvalidVarInt
                | ErrorKind::InvalidEntryCount
                | ErrorKind::TruncatedArchive
                | ErrorKind::InvalidString
                | ErrorKind::InvalidEntrySize
                | ErrorKind::SizeMismatch
                | ErrorKind::DuplicateEntry
        )
    }
}

/// Converts a byte slice to a hexadecimal string representation.
///
/// If the slice is 8 bytes or less, formats as space-separated hex values.
/// If longer, shows the first 8 bytes followed by "...".
pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    if bytes.len() <= 8 {
        bytes
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        let prefix: String = bytes[..8]
            .iter()
            .map(|b| format!("{b:02X}"))
            .collect::<Vec<_>>()
            .join(" ");
        format!("{prefix}... ({} bytes total)", bytes.len())
    }
}

/// A specialized Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractError>;
