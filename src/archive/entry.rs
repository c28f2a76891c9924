//! Archive entries and their on-disk extraction.

use std::fs;
use std::path::{Component, Path, PathBuf};

use log::debug;

use crate::error::{ExtractError, Result};

/// One file stored in an archive.
///
/// The sizes come from the entry table; `payload` holds the stored bytes,
/// which are still DEFLATE-compressed whenever `raw_size > comp_size`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Relative filename, unique within its archive.
    pub filename: String,

    /// Size of the entry after decompression.
    pub raw_size: u32,

    /// Size of the stored payload.
    pub comp_size: u32,

    /// The stored payload bytes.
    pub payload: Vec<u8>,
}

impl Entry {
    /// Creates an entry, checking that the payload matches the declared compressed size.
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::SizeMismatch` naming the entry if
    /// `payload.len() != comp_size`.
    pub fn new(
        filename: impl Into<String>,
        raw_size: u32,
        comp_size: u32,
        payload: Vec<u8>,
    ) -> Result<Self> {
        let filename = filename.into();
        let expected = comp_size as usize;
        if payload.len() != expected {
            return Err(ExtractError::SizeMismatch {
                entry: filename,
                expected,
                actual: payload.len(),
            });
        }

        Ok(Self {
            filename,
            raw_size,
            comp_size,
            payload,
        })
    }

    /// Returns whether the stored payload is compressed and must be inflated.
    ///
    /// An entry counts as compressed only when its raw size is strictly
    /// larger than its stored size.
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        crate::decompress::should_decompress(self.raw_size, self.comp_size)
    }

    /// Writes the stored payload to `module_dir/filename`.
    ///
    /// Parent directories are created as needed and an existing file at the
    /// destination is overwritten.
    ///
    /// # Errors
    ///
    /// - `ExtractError::UnsafeEntryPath` if the filename escapes `module_dir`
    /// - `ExtractError::Io` if a directory or the file cannot be written
    pub fn write_to(&self, module_dir: &Path) -> Result<PathBuf> {
        let path = resolve_entry_path(module_dir, &self.filename)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
        }
        fs::write(&path, &self.payload).map_err(|e| ExtractError::io(&path, e))?;

        debug!(
            "Wrote {} ({} bytes) to {}",
            self.filename,
            self.payload.len(),
            path.display()
        );
        Ok(path)
    }
}

/// Joins a relative entry name onto `base`, refusing names that escape it.
///
/// Only plain path components are accepted; `.` components are dropped.
///
/// # Errors
///
/// Returns `ExtractError::UnsafeEntryPath` for empty, absolute or
/// parent-relative names.
///
/// # Example
///
/// ```
/// use std::path::Path;
/// use tmod_extract::archive::resolve_entry_path;
///
/// let path = resolve_entry_path(Path::new("out/MyMod"), "Items/Sword.rawimg").unwrap();
/// assert_eq!(path, Path::new("out/MyMod/Items/Sword.rawimg"));
/// assert!(resolve_entry_path(Path::new("out/MyMod"), "../evil").is_err());
/// ```
pub fn resolve_entry_path(base: &Path, name: &str) -> Result<PathBuf> {
    let unsafe_path = || ExtractError::UnsafeEntryPath {
        entry: name.to_string(),
    };

    let mut resolved = base.to_path_buf();
    let mut pushed = false;

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                resolved.push(part);
                pushed = true;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(unsafe_path());
            }
        }
    }

    if pushed {
        Ok(resolved)
    } else {
        Err(unsafe_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_checks_payload_length() {
        let entry = Entry::new("a.raw", 10, 3, vec![1, 2, 3]).unwrap();
        assert_eq!(entry.comp_size, 3);

        let result = Entry::new("b.raw", 10, 4, vec![1, 2, 3]);
        assert!(matches!(
            result,
            Err(ExtractError::SizeMismatch {
                ref entry,
                expected: 4,
                actual: 3
            }) if entry == "b.raw"
        ));
    }

    #[test]
    fn test_is_compressed() {
        assert!(Entry::new("a", 10, 0, vec![]).unwrap().is_compressed());
        assert!(!Entry::new("a", 0, 0, vec![]).unwrap().is_compressed());
        assert!(!Entry::new("a", 1, 2, vec![0, 0]).unwrap().is_compressed());
    }

    #[test]
    fn test_resolve_entry_path() {
        let base = Path::new("root");
        assert_eq!(
            resolve_entry_path(base, "./a/b.txt").unwrap(),
            Path::new("root/a/b.txt")
        );
        assert!(resolve_entry_path(base, "").is_err());
        assert!(resolve_entry_path(base, ".").is_err());
        assert!(resolve_entry_path(base, "a/../../b").is_err());
        assert!(resolve_entry_path(base, "/etc/passwd").is_err());
    }

    #[test]
    fn test_write_to_creates_parents_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let entry = Entry::new("Items/Weapons/Sword.rawimg", 3, 3, b"abc".to_vec()).unwrap();

        let path = entry.write_to(dir.path()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"abc");

        let entry = Entry::new("Items/Weapons/Sword.rawimg", 2, 2, b"xy".to_vec()).unwrap();
        entry.write_to(dir.path()).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"xy");
    }
}
