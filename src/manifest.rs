//! The manifest: a plain-text copy of an archive's entry table.
//!
//! Extraction writes one line per entry, `<filename> <raw size> <compressed size>`,
//! in table order. Later runs read it back to decompress or convert the
//! extracted files without decoding the archive again.
//!
//! # Example
//!
//! ```
//! use tmod_extract::manifest::{parse_manifest, render_manifest, ManifestRow};
//!
//! let rows = vec![ManifestRow::new("Items/Sword.rawimg", 4108, 361)];
//! let text = render_manifest(&rows);
//! assert_eq!(text, "Items/Sword.rawimg 4108 361\n");
//! assert_eq!(parse_manifest(&text).unwrap(), rows);
//! ```

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;

use crate::archive::Entry;
use crate::error::{ExtractError, Result};

/// One manifest line: an entry's filename and declared sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestRow {
    /// Relative filename of the entry.
    pub filename: String,

    /// Size after decompression.
    pub raw_size: u32,

    /// Stored (compressed) size.
    pub comp_size: u32,
}

impl ManifestRow {
    /// Creates a row.
    #[must_use]
    pub fn new(filename: impl Into<String>, raw_size: u32, comp_size: u32) -> Self {
        Self {
            filename: filename.into(),
            raw_size,
            comp_size,
        }
    }
}

impl From<&Entry> for ManifestRow {
    fn from(entry: &Entry) -> Self {
        Self::new(entry.filename.clone(), entry.raw_size, entry.comp_size)
    }
}

/// Renders rows to manifest text, one line per row.
#[must_use]
pub fn render_manifest(rows: &[ManifestRow]) -> String {
    let mut out = String::new();
    for row in rows {
        // Writing to a String cannot fail
        let _ = writeln!(out, "{} {} {}", row.filename, row.raw_size, row.comp_size);
    }
    out
}

/// Writes rows to the manifest file at `path`, replacing any existing file.
///
/// # Errors
///
/// Returns `ExtractError::Io` if the file cannot be written.
pub fn write_manifest(path: impl AsRef<Path>, rows: &[ManifestRow]) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, render_manifest(rows)).map_err(|e| ExtractError::io(path, e))?;
    info!("Wrote {} manifest rows to {}", rows.len(), path.display());
    Ok(())
}

/// Parses a single manifest line. `line_no` is one-based.
///
/// The last two whitespace-separated tokens are the sizes; everything before
/// them, trimmed, is the filename.
///
/// # Errors
///
/// Returns `ExtractError::MalformedManifestRow` if the line lacks a filename
/// or either size is not a non-negative integer.
pub fn parse_row(line: &str, line_no: usize) -> Result<ManifestRow> {
    let malformed = |reason: String| ExtractError::MalformedManifestRow {
        line: line_no,
        reason,
    };

    let trimmed = line.trim();
    let (rest, comp) = trimmed
        .rsplit_once(char::is_whitespace)
        .unwrap_or(("", trimmed));
    let rest = rest.trim_end();
    let (filename, raw) = rest.rsplit_once(char::is_whitespace).unwrap_or(("", rest));
    let filename = filename.trim_end();

    if filename.is_empty() {
        return Err(malformed(format!(
            "expected `<filename> <raw size> <compressed size>`, found `{}`",
            line.trim()
        )));
    }

    let raw_size = raw
        .parse::<u32>()
        .map_err(|e| malformed(format!("invalid raw size `{raw}`: {e}")))?;
    let comp_size = comp
        .parse::<u32>()
        .map_err(|e| malformed(format!("invalid compressed size `{comp}`: {e}")))?;

    Ok(ManifestRow::new(filename, raw_size, comp_size))
}

/// Parses manifest text, failing on the first malformed row.
///
/// Blank lines are skipped.
///
/// # Errors
///
/// Returns `ExtractError::MalformedManifestRow` naming the first bad line.
pub fn parse_manifest(text: &str) -> Result<Vec<ManifestRow>> {
    numbered_lines(text)
        .map(|(line_no, line)| parse_row(line, line_no))
        .collect()
}

/// Parses manifest text, collecting malformed rows instead of failing.
///
/// Returns the rows that parsed, in order, and one error per rejected line.
#[must_use]
pub fn parse_manifest_lenient(text: &str) -> (Vec<ManifestRow>, Vec<ExtractError>) {
    let mut rows = Vec::new();
    let mut errors = Vec::new();

    for (line_no, line) in numbered_lines(text) {
        match parse_row(line, line_no) {
            Ok(row) => rows.push(row),
            Err(e) => {
                warn!("Skipping manifest line {line_no}: {e}");
                errors.push(e);
            }
        }
    }

    (rows, errors)
}

/// Reads and parses the manifest at `path`.
///
/// # Errors
///
/// - `ExtractError::Io` if the file cannot be read
/// - `ExtractError::MalformedManifestRow` for the first bad line
pub fn read_manifest(path: impl AsRef<Path>) -> Result<Vec<ManifestRow>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
    parse_manifest(&text).map_err(|e| e.in_entry(path.display().to_string()))
}

/// Reads the manifest at `path`, skipping malformed rows.
///
/// # Errors
///
/// Returns `ExtractError::Io` if the file cannot be read.
pub fn read_manifest_lenient(
    path: impl AsRef<Path>,
) -> Result<(Vec<ManifestRow>, Vec<ExtractError>)> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
    Ok(parse_manifest_lenient(&text))
}

/// Yields non-blank lines with their one-based line numbers.
fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line))
        .filter(|(_, line)| !line.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_manifest() {
        let rows = vec![
            ManifestRow::new("a.raw", 100, 100),
            ManifestRow::new("Items/b.rawimg", 4108, 361),
        ];
        assert_eq!(
            render_manifest(&rows),
            "a.raw 100 100\nItems/b.rawimg 4108 361\n"
        );
    }

    #[test]
    fn test_round_trip_preserves_order() {
        let rows = vec![
            ManifestRow::new("z.txt", 0, 0),
            ManifestRow::new("a.rawimg", 40, 90),
            ManifestRow::new("Sounds/My Sound.wav", 2048, 1024),
            ManifestRow::new("m.bin", u32::MAX, 1),
        ];
        assert_eq!(parse_manifest(&render_manifest(&rows)).unwrap(), rows);
    }

    #[test]
    fn test_parse_row_tolerates_whitespace_runs() {
        let row = parse_row("  b.raw \t 40   90  ", 1).unwrap();
        assert_eq!(row, ManifestRow::new("b.raw", 40, 90));
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let rows = parse_manifest("a 1 1\n\n   \nb 2 2\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].filename, "b");
    }

    #[test]
    fn test_parse_missing_field() {
        let result = parse_manifest("a.raw 1 1\nb.raw 40\n");
        assert!(matches!(
            result,
            Err(ExtractError::MalformedManifestRow { line: 2, .. })
        ));
    }

    #[test]
    fn test_parse_non_numeric_size() {
        let result = parse_row("a.raw forty 90", 7);
        assert!(matches!(
            result,
            Err(ExtractError::MalformedManifestRow { line: 7, ref reason }) if reason.contains("raw size")
        ));

        let result = parse_row("a.raw 40 -1", 3);
        assert!(matches!(
            result,
            Err(ExtractError::MalformedManifestRow { line: 3, ref reason }) if reason.contains("compressed size")
        ));
    }

    #[test]
    fn test_lenient_parse_keeps_good_rows() {
        let (rows, errors) = parse_manifest_lenient("a 1 1\nbroken\nc 3 3\n");
        assert_eq!(
            rows,
            vec![ManifestRow::new("a", 1, 1), ManifestRow::new("c", 3, 3)]
        );
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            ExtractError::MalformedManifestRow { line: 2, .. }
        ));
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entries.txt");
        let rows = vec![ManifestRow::new("a.raw", 100, 100)];

        write_manifest(&path, &rows).unwrap();
        assert_eq!(read_manifest(&path).unwrap(), rows);
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_manifest(dir.path().join("entries.txt"));
        assert!(matches!(result, Err(ExtractError::Io { .. })));
    }
}
