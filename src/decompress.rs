//! Decompression of extracted archive entries.
//!
//! Entries are stored either as-is or as a raw (headerless) DEFLATE stream.
//! The archive does not flag which; the entry table's sizes decide: an
//! entry is inflated only when its raw size is strictly larger than its
//! stored size. Equal sizes, and the odd case of a stored size larger than
//! the raw size, are left untouched.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use tmod_extract::decompress::{decompress_extracted, DecompressOutcome, OutputMode};
//!
//! let outcome = decompress_extracted(Path::new("out/MyMod/Items/Sword.rawimg"), 4108, 361, OutputMode::Replace)?;
//! if let DecompressOutcome::Decompressed { bytes, .. } = outcome {
//!     println!("inflated to {bytes} bytes");
//! }
//! # Ok::<(), tmod_extract::error::ExtractError>(())
//! ```

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use flate2::{Decompress, FlushDecompress, Status};
use log::{debug, info, warn};
use serde::Serialize;

use crate::error::{ExtractError, Result};
use crate::format::DECOMPRESSED_SUFFIX;

/// Output buffer growth step while inflating.
const INFLATE_CHUNK: usize = 32 * 1024;

/// What happened to an entry in the decompression stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecompressOutcome {
    /// The entry is stored uncompressed and was left as-is.
    Skipped,

    /// The entry was inflated.
    Decompressed {
        /// Where the decompressed bytes were written.
        output: PathBuf,
        /// Number of decompressed bytes.
        bytes: usize,
    },
}

/// Where decompressed output ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// Replace the original file with the decompressed bytes.
    #[default]
    Replace,

    /// Keep the original and write the decompressed bytes beside it with a `.out` suffix.
    KeepBoth,
}

/// Returns whether an entry with these sizes must be inflated.
///
/// Only `raw_size > comp_size` counts as compressed. An entry whose stored
/// size equals or exceeds its raw size is treated as stored, even if it
/// was in fact run through the compressor.
#[must_use]
pub fn should_decompress(raw_size: u32, comp_size: u32) -> bool {
    raw_size > comp_size
}

/// Inflates a raw DEFLATE stream.
///
/// `name` identifies the data in error messages.
///
/// # Errors
///
/// Returns `ExtractError::DecompressionFailure` if the stream is corrupt or
/// ends before its final block.
pub fn inflate_raw(data: &[u8], name: &str) -> Result<Vec<u8>> {
    let failure = |reason: String| ExtractError::DecompressionFailure {
        entry: name.to_string(),
        reason,
    };

    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(data.len().saturating_mul(2).max(INFLATE_CHUNK));

    loop {
        if out.len() == out.capacity() {
            out.reserve(INFLATE_CHUNK);
        }

        let before_in = inflater.total_in();
        let before_out = inflater.total_out();
        let consumed = usize::try_from(before_in).map_or(data.len(), |n| n.min(data.len()));

        let status = inflater
            .decompress_vec(&data[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| failure(e.to_string()))?;

        if status == Status::StreamEnd {
            return Ok(out);
        }

        let progressed = inflater.total_in() != before_in || inflater.total_out() != before_out;
        if !progressed && out.len() < out.capacity() {
            return Err(failure(format!(
                "deflate stream ended prematurely after {} input bytes",
                inflater.total_in()
            )));
        }
    }
}

/// Appends `suffix` to the final component of `path`.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use tmod_extract::decompress::append_suffix;
///
/// assert_eq!(append_suffix(Path::new("a/b.rawimg"), ".out"), Path::new("a/b.rawimg.out"));
/// ```
#[must_use]
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Inflates the file at `input` unconditionally and writes the result to `output`.
///
/// Returns the number of decompressed bytes. Nothing is written when
/// decompression fails, and a partially written `output` is removed.
///
/// # Errors
///
/// - `ExtractError::Io` if `input` cannot be read or `output` cannot be written
/// - `ExtractError::DecompressionFailure` if the stream is invalid
pub fn decompress_file(input: &Path, output: &Path) -> Result<usize> {
    let data = fs::read(input).map_err(|e| ExtractError::io(input, e))?;
    let inflated = inflate_raw(&data, &input.display().to_string())?;
    fs::write(output, &inflated).map_err(|e| {
        remove_temp(output);
        ExtractError::io(output, e)
    })?;

    debug!(
        "Inflated {} ({} -> {} bytes) into {}",
        input.display(),
        data.len(),
        inflated.len(),
        output.display()
    );
    Ok(inflated.len())
}

/// Decompresses one extracted entry according to its declared sizes.
///
/// When `raw_size <= comp_size` the payload is not read and the entry is
/// reported as skipped. Otherwise the payload at `payload_path` is inflated
/// and written to `output_path`.
///
/// # Errors
///
/// - `ExtractError::Io` if the payload cannot be read or the output cannot be written
/// - `ExtractError::DecompressionFailure` if the payload is not a valid raw DEFLATE stream
pub fn decompress_entry(
    payload_path: &Path,
    raw_size: u32,
    comp_size: u32,
    output_path: &Path,
) -> Result<DecompressOutcome> {
    if !should_decompress(raw_size, comp_size) {
        debug!(
            "File should not be decompressed: {} (raw {raw_size}, stored {comp_size})",
            payload_path.display()
        );
        return Ok(DecompressOutcome::Skipped);
    }

    let bytes = decompress_file(payload_path, output_path)?;
    if bytes != raw_size as usize {
        warn!(
            "{} inflated to {bytes} bytes, but the entry table declares {raw_size}",
            payload_path.display()
        );
    }

    Ok(DecompressOutcome::Decompressed {
        output: output_path.to_path_buf(),
        bytes,
    })
}

/// Decompresses an extracted entry in place or beside the original.
///
/// The decompressed bytes are first written to `<path>.out`. In
/// [`OutputMode::Replace`] that file is then renamed over `path`, so the
/// original is only replaced by a complete output.
///
/// # Errors
///
/// See [`decompress_entry`]; a failed rename is reported as `ExtractError::Io`.
pub fn decompress_extracted(
    path: &Path,
    raw_size: u32,
    comp_size: u32,
    mode: OutputMode,
) -> Result<DecompressOutcome> {
    let temp = append_suffix(path, DECOMPRESSED_SUFFIX);
    let outcome = decompress_entry(path, raw_size, comp_size, &temp)?;

    match (outcome, mode) {
        (DecompressOutcome::Decompressed { bytes, .. }, OutputMode::Replace) => {
            replace_file(&temp, path)?;
            info!("Saved file as {}", path.display());
            Ok(DecompressOutcome::Decompressed {
                output: path.to_path_buf(),
                bytes,
            })
        }
        (DecompressOutcome::Decompressed { output, bytes }, OutputMode::KeepBoth) => {
            info!("Saved file as {}", output.display());
            Ok(DecompressOutcome::Decompressed { output, bytes })
        }
        (DecompressOutcome::Skipped, _) => Ok(DecompressOutcome::Skipped),
    }
}

/// Renames `temp` over `target`.
///
/// If the rename fails the temporary file is removed; failing to remove it
/// only logs a warning.
pub(crate) fn replace_file(temp: &Path, target: &Path) -> Result<()> {
    fs::rename(temp, target).map_err(|e| {
        remove_temp(temp);
        ExtractError::io(target, e)
    })
}

/// Removes a temporary file, logging instead of failing.
pub(crate) fn remove_temp(temp: &Path) {
    if let Err(e) = fs::remove_file(temp) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove the file {}: {e}", temp.display());
        }
    }
}
