//! Options controlling which stages run and how failures are handled.

use std::path::{Path, PathBuf};

use crate::decompress::OutputMode;
use crate::format::DEFAULT_OUTPUT_ROOT;

/// Configuration for a [`Pipeline`](super::Pipeline) run.
///
/// # Example
///
/// ```
/// use tmod_extract::pipeline::PipelineOptions;
///
/// let options = PipelineOptions::new()
///     .output_root("extracted")
///     .decompress(true)
///     .ignore_errors(true)
///     .jobs(4);
/// assert!(options.decompress);
/// assert!(!options.convert_images);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Directory modules are extracted under (`<output_root>/<mod name>`).
    pub output_root: PathBuf,

    /// Inflate compressed entries.
    pub decompress: bool,

    /// Convert `.rawimg` entries to PNG.
    pub convert_images: bool,

    /// Where decompressed bytes go.
    pub output_mode: OutputMode,

    /// Remove the raw image once its PNG has been written.
    pub remove_converted: bool,

    /// Record per-entry failures and continue instead of aborting the batch.
    pub ignore_errors: bool,

    /// Write `entries.txt` beside the extracted files.
    pub write_manifest: bool,

    /// Worker threads for per-entry work; 1 runs sequentially.
    pub jobs: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
            decompress: false,
            convert_images: false,
            output_mode: OutputMode::Replace,
            remove_converted: false,
            ignore_errors: false,
            write_manifest: true,
            jobs: 1,
        }
    }
}

impl PipelineOptions {
    /// Creates the default options: extract only, strict, sequential.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract, decompress in place, convert images and remove the converted raw images.
    #[must_use]
    pub fn auto() -> Self {
        Self::default()
            .decompress(true)
            .convert_images(true)
            .output_mode(OutputMode::Replace)
            .remove_converted(true)
    }

    /// Sets the output root directory.
    #[must_use]
    pub fn output_root(mut self, root: impl AsRef<Path>) -> Self {
        self.output_root = root.as_ref().to_path_buf();
        self
    }

    /// Enables or disables decompression.
    #[must_use]
    pub fn decompress(mut self, enabled: bool) -> Self {
        self.decompress = enabled;
        self
    }

    /// Enables or disables raw image conversion.
    #[must_use]
    pub fn convert_images(mut self, enabled: bool) -> Self {
        self.convert_images = enabled;
        self
    }

    /// Sets where decompressed bytes are written.
    #[must_use]
    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    /// Enables or disables removing raw images after conversion.
    #[must_use]
    pub fn remove_converted(mut self, enabled: bool) -> Self {
        self.remove_converted = enabled;
        self
    }

    /// Enables or disables the ignore-errors policy.
    #[must_use]
    pub fn ignore_errors(mut self, enabled: bool) -> Self {
        self.ignore_errors = enabled;
        self
    }

    /// Enables or disables writing the manifest of the extracted files.
    #[must_use]
    pub fn write_manifest(mut self, enabled: bool) -> Self {
        self.write_manifest = enabled;
        self
    }

    /// Sets the number of worker threads (at least 1).
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}
