//! Constants describing the tmod container and its companion files.
//!
//! # Archive Layout
//!
//! | Field | Size | Description |
//! |-------|------|-------------|
//! | `magic` | 4 | "TMOD" |
//! | `version` | var | 7-bit length-prefixed UTF-8 string |
//! | `hash` | 20 | Content hash (not validated) |
//! | `signature` | 256 | Signature blob (not validated) |
//! | `data_len` | 4 | Declared data length (u32) |
//! | `mod_name` | var | Length-prefixed string |
//! | `mod_version` | var | Length-prefixed string |
//! | `entry_count` | 4 | Number of entries (i32) |
//! | entry table | var | `filename`, `raw_size` (i32), `comp_size` (i32) per entry |
//! | payloads | var | `comp_size` bytes per entry, in table order |
//!
//! All multi-byte integers are little-endian.

/// The magic bytes at the start of every archive.
pub const TMOD_MAGIC: &[u8; 4] = b"TMOD";

/// Length of the content hash that follows the version string.
pub const HASH_LEN: usize = 20;

/// Length of the signature blob that follows the hash.
pub const SIGNATURE_LEN: usize = 256;

/// Smallest possible entry table row: empty name, raw size, compressed size.
pub const MIN_ENTRY_ROW_LEN: usize = 1 + 4 + 4;

/// Conventional file name of the manifest written beside extracted entries.
pub const MANIFEST_FILE_NAME: &str = "entries.txt";

/// Extension of archived raw image dumps.
pub const RAWIMG_EXTENSION: &str = "rawimg";

/// Suffix appended to decompressed output kept beside the original.
pub const DECOMPRESSED_SUFFIX: &str = ".out";

/// Suffix of the temporary file used when inflating an image before conversion.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Default directory extracted modules are written under.
pub const DEFAULT_OUTPUT_ROOT: &str = "out";

/// Returns whether `filename` names an archived raw image.
///
/// # Example
///
/// ```
/// use tmod_extract::format::is_rawimg;
///
/// assert!(is_rawimg("Items/Sword.rawimg"));
/// assert!(!is_rawimg("Items/Sword.png"));
/// ```
#[must_use]
pub fn is_rawimg(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext == RAWIMG_EXTENSION)
}
