//! Orchestration of the extract, decompress and convert stages.
//!
//! A [`Pipeline`] runs the requested stages over every entry of an archive,
//! over the rows of a previously written manifest, or over loose files.
//! Per-entry failures either abort the batch (the default) or are recorded
//! in the [`PipelineReport`] when [`PipelineOptions::ignore_errors`] is set.
//! Archive decode errors always abort: nothing is extracted from an archive
//! that does not decode.
//!
//! # Example
//!
//! ```no_run
//! use tmod_extract::pipeline::{Pipeline, PipelineOptions};
//!
//! let pipeline = Pipeline::new(PipelineOptions::auto().output_root("out"));
//! let report = pipeline.run_archive("MyMod.tmod")?;
//! println!("{} entries done, {} failed", report.succeeded(), report.failed());
//! # Ok::<(), tmod_extract::error::ExtractError>(())
//! ```

mod options;
mod report;

pub use options::PipelineOptions;
pub use report::{EntryReport, EntryState, PipelineReport};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::{info, warn};
use rayon::prelude::*;

use crate::archive::{resolve_entry_path, Archive};
use crate::decompress::{
    append_suffix, decompress_entry, decompress_extracted, decompress_file, remove_temp,
    replace_file, DecompressOutcome, OutputMode,
};
use crate::error::{ExtractError, Result};
use crate::format::{is_rawimg, DECOMPRESSED_SUFFIX, MANIFEST_FILE_NAME, TEMP_SUFFIX};
use crate::manifest::{read_manifest, read_manifest_lenient, write_manifest, ManifestRow};
use crate::rawimg::convert_file;

/// Stages to run on entries that are already on disk.
#[derive(Debug, Clone, Copy)]
struct Stages {
    decompress: bool,
    convert: bool,
    /// Inflate raw images into a temporary file instead of in place.
    images_aside: bool,
}

impl Stages {
    fn any(self) -> bool {
        self.decompress || self.convert
    }
}

/// Reports of the items a batch processed, with their item indices.
struct Batch {
    reports: Vec<(usize, EntryReport)>,
    /// First failure in item order that the error policy did not tolerate.
    error: Option<ExtractError>,
}

impl Batch {
    fn into_result(self) -> Result<Vec<EntryReport>> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.reports.into_iter().map(|(_, report)| report).collect()),
        }
    }
}

/// Runs pipeline stages according to a set of [`PipelineOptions`].
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    options: PipelineOptions,
}

impl Pipeline {
    /// Creates a pipeline with the given options.
    #[must_use]
    pub fn new(options: PipelineOptions) -> Self {
        Self { options }
    }

    /// Returns the pipeline's options.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Decodes the archive at `path`, extracts it and runs the requested stages.
    ///
    /// Entries are written to `<output_root>/<mod name>/`. When manifest
    /// writing is enabled, `entries.txt` is written after the stages and
    /// describes the files as they are left on disk: entries inflated in
    /// place are listed with equal sizes, while entries that failed to
    /// extract and raw images removed after conversion are left out. Image conversion only runs together with
    /// decompression; asking for it alone logs a warning and leaves the
    /// images as extracted.
    ///
    /// # Errors
    ///
    /// - any decode error from [`Archive::open`], regardless of policy
    /// - `ExtractError::UnsafeEntryPath` or `ExtractError::Io` if the module
    ///   directory or manifest cannot be created
    /// - the first per-entry error in archive order, unless errors are ignored
    pub fn run_archive(&self, path: impl AsRef<Path>) -> Result<PipelineReport> {
        let path = path.as_ref();
        let archive = Archive::open(path)?;

        let module_dir = archive.module_dir(&self.options.output_root)?;
        fs::create_dir_all(&module_dir).map_err(|e| ExtractError::io(&module_dir, e))?;
        info!("Extracting {} to {}", archive.mod_name, module_dir.display());

        let total = archive.entries.len();
        let mut slots: Vec<Option<EntryReport>> = vec![None; total];
        let mut extracted: Vec<(usize, ManifestRow)> = Vec::with_capacity(total);

        for (i, entry) in archive.entries.iter().enumerate() {
            info!(
                "Writing file {} of {total}: {} (size: {}b)",
                i + 1,
                entry.filename,
                entry.comp_size
            );
            match entry.write_to(&module_dir) {
                Ok(_) => extracted.push((i, ManifestRow::from(entry))),
                Err(e) => {
                    let e = e.in_entry(&entry.filename);
                    let mut report = EntryReport::new(&entry.filename, EntryState::Pending);
                    report.fail(&e);
                    self.tolerate(e)?;
                    slots[i] = Some(report);
                }
            }
        }

        let stages = self.archive_stages();
        let rows: Vec<ManifestRow> = extracted.iter().map(|(_, row)| row.clone()).collect();
        let batch = self.run_rows(&module_dir, &rows, stages);

        let mut on_disk = Vec::with_capacity(extracted.len());
        let mut reports = batch.reports.into_iter().peekable();
        for (n, (i, row)) in extracted.into_iter().enumerate() {
            let report = reports.next_if(|(j, _)| *j == n).map(|(_, report)| report);
            if let Some(row) = self.row_on_disk(row, report.as_ref()) {
                on_disk.push(row);
            }
            slots[i] = report;
        }

        let manifest = if self.options.write_manifest {
            let manifest_path = module_dir.join(MANIFEST_FILE_NAME);
            write_manifest(&manifest_path, &on_disk)?;
            Some(manifest_path)
        } else {
            None
        };

        if let Some(e) = batch.error {
            return Err(e);
        }

        Ok(PipelineReport {
            source: Some(path.to_path_buf()),
            mod_name: Some(archive.mod_name.clone()),
            module_dir: Some(module_dir),
            manifest,
            entries: slots.into_iter().flatten().collect(),
            rejected_rows: Vec::new(),
        })
    }

    /// Runs the requested stages over the files listed in a manifest.
    ///
    /// Paths in the manifest are resolved against the manifest's directory.
    /// Under the ignore-errors policy malformed rows are skipped and listed
    /// in [`PipelineReport::rejected_rows`]. When only conversion is
    /// requested, rows that are not raw images are left out.
    ///
    /// # Errors
    ///
    /// - `ExtractError::Io` if the manifest cannot be read
    /// - `ExtractError::MalformedManifestRow` for a bad row, unless errors are ignored
    /// - the first per-entry error in manifest order, unless errors are ignored
    pub fn run_manifest(&self, manifest_path: impl AsRef<Path>) -> Result<PipelineReport> {
        let manifest_path = manifest_path.as_ref();
        let base = manifest_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        if manifest_path.file_name().and_then(|n| n.to_str()) != Some(MANIFEST_FILE_NAME) {
            warn!(
                "{} is not named {MANIFEST_FILE_NAME}; reading it as a manifest anyway",
                manifest_path.display()
            );
        }

        let (mut rows, rejected) = if self.options.ignore_errors {
            read_manifest_lenient(manifest_path)?
        } else {
            (read_manifest(manifest_path)?, Vec::new())
        };

        let stages = Stages {
            decompress: self.options.decompress,
            convert: self.options.convert_images,
            images_aside: true,
        };
        if !stages.any() {
            warn!("Neither decompression nor image conversion was requested");
        }
        if stages.convert && !stages.decompress {
            rows.retain(|row| is_rawimg(&row.filename));
        }

        info!(
            "Processing {} files listed in {}",
            rows.len(),
            manifest_path.display()
        );
        let entries = self.run_rows(&base, &rows, stages).into_result()?;

        Ok(PipelineReport {
            source: Some(manifest_path.to_path_buf()),
            mod_name: None,
            module_dir: Some(base),
            manifest: None,
            entries,
            rejected_rows: rejected.iter().map(ToString::to_string).collect(),
        })
    }

    /// Inflates each file unconditionally.
    ///
    /// The output goes to `<file>.out`, or replaces the file when the output
    /// mode is [`OutputMode::Replace`].
    ///
    /// # Errors
    ///
    /// Returns the first failure in argument order, unless errors are ignored.
    pub fn decompress_files(&self, paths: &[PathBuf]) -> Result<PipelineReport> {
        let entries = self.run_batch(
            paths,
            |path| path.display().to_string(),
            |path, report| self.decompress_loose_file(path, report),
        )
        .into_result()?;

        Ok(PipelineReport {
            entries,
            ..PipelineReport::default()
        })
    }

    /// Converts each raw image file to a PNG beside it.
    ///
    /// With decompression enabled the file is first inflated into a
    /// temporary `<file>.tmp`, which is removed afterwards.
    ///
    /// # Errors
    ///
    /// Returns the first failure in argument order, unless errors are ignored.
    pub fn convert_files(&self, paths: &[PathBuf]) -> Result<PipelineReport> {
        let entries = self.run_batch(
            paths,
            |path| path.display().to_string(),
            |path, report| self.convert_loose_file(path, report),
        )
        .into_result()?;

        Ok(PipelineReport {
            entries,
            ..PipelineReport::default()
        })
    }

    fn archive_stages(&self) -> Stages {
        let convert = if self.options.convert_images && !self.options.decompress {
            warn!("Images have not been decompressed, so they can not be converted");
            false
        } else {
            self.options.convert_images
        };

        Stages {
            decompress: self.options.decompress,
            convert,
            images_aside: false,
        }
    }

    /// Returns the manifest row describing an extracted entry after the stages ran.
    fn row_on_disk(&self, row: ManifestRow, report: Option<&EntryReport>) -> Option<ManifestRow> {
        let Some(report) = report else {
            return Some(row);
        };
        if report.png.is_some() && self.options.remove_converted {
            return None;
        }
        match &report.decompression {
            Some(DecompressOutcome::Decompressed { bytes, .. })
                if self.options.output_mode == OutputMode::Replace =>
            {
                let size = u32::try_from(*bytes).unwrap_or(u32::MAX);
                Some(ManifestRow::new(row.filename, size, size))
            }
            _ => Some(row),
        }
    }

    /// Applies the error policy: strict mode returns the error, ignore mode logs it.
    fn tolerate(&self, error: ExtractError) -> Result<()> {
        if self.options.ignore_errors {
            warn!("{error}; continuing");
            Ok(())
        } else {
            Err(error)
        }
    }

    fn run_rows(&self, base: &Path, rows: &[ManifestRow], stages: Stages) -> Batch {
        self.run_batch(
            rows,
            |row| row.filename.clone(),
            |row, report| self.process_row(base, row, stages, report),
        )
    }

    /// Runs `work` on every item with progress logging and the error policy.
    ///
    /// With more than one job the items are spread over a rayon pool; reports
    /// still come back in item order. In strict mode a failure stops workers
    /// from starting items after it, and the earliest failure in item order
    /// is kept in [`Batch::error`]. Items that were not started have no report.
    fn run_batch<T, N, W>(&self, items: &[T], name: N, work: W) -> Batch
    where
        T: Sync,
        N: Fn(&T) -> String + Sync,
        W: Fn(&T, &mut EntryReport) -> Result<()> + Sync,
    {
        type Outcome = (usize, EntryReport, Option<ExtractError>);

        let total = items.len();
        let first_failure = AtomicUsize::new(usize::MAX);

        let run_one = |(i, item): (usize, &T)| -> Option<Outcome> {
            if i > first_failure.load(Ordering::Relaxed) {
                return None;
            }

            let label = name(item);
            info!("Processing file {} of {total}: {label}", i + 1);

            let mut report = EntryReport::new(label.clone(), EntryState::Extracted);
            match work(item, &mut report) {
                Ok(()) => {
                    report.finish();
                    Some((i, report, None))
                }
                Err(e) => {
                    let e = e.in_entry(label);
                    report.fail(&e);
                    if !self.options.ignore_errors {
                        first_failure.fetch_min(i, Ordering::Relaxed);
                    }
                    Some((i, report, Some(e)))
                }
            }
        };

        let results: Vec<Option<Outcome>> = if self.options.jobs > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .build()
            {
                Ok(pool) => pool.install(|| items.par_iter().enumerate().map(&run_one).collect()),
                Err(e) => {
                    warn!("Could not start {} workers ({e}); running sequentially", self.options.jobs);
                    items.iter().enumerate().map(&run_one).collect()
                }
            }
        } else {
            items.iter().enumerate().map(&run_one).collect()
        };

        let mut batch = Batch {
            reports: Vec::with_capacity(total),
            error: None,
        };
        for (i, report, failure) in results.into_iter().flatten() {
            if let Some(e) = failure {
                if let Err(e) = self.tolerate(e) {
                    batch.error.get_or_insert(e);
                }
            }
            batch.reports.push((i, report));
        }
        batch
    }

    /// Decompresses and converts one extracted entry.
    fn process_row(
        &self,
        base: &Path,
        row: &ManifestRow,
        stages: Stages,
        report: &mut EntryReport,
    ) -> Result<()> {
        let path = resolve_entry_path(base, &row.filename)?;

        if stages.convert && stages.images_aside && is_rawimg(&row.filename) {
            let inflate = |temp: &Path| decompress_entry(&path, row.raw_size, row.comp_size, temp);
            return self.convert_image(&path, stages.decompress.then_some(inflate), report);
        }

        let mut source = path.clone();

        if stages.decompress {
            let outcome =
                decompress_extracted(&path, row.raw_size, row.comp_size, self.options.output_mode)?;
            if let DecompressOutcome::Decompressed { output, .. } = &outcome {
                source.clone_from(output);
            }
            report.decompression = Some(outcome);
            report.advance(EntryState::Decompressed);
        }

        if stages.convert && is_rawimg(&row.filename) {
            let png = path.with_extension("png");
            convert_file(&source, &png)?;
            info!("Saved image as {}", png.display());
            report.png = Some(png);
            report.advance(EntryState::Converted);

            if self.options.remove_converted {
                remove_converted(&source);
                if source != path {
                    remove_converted(&path);
                }
            }
        }

        Ok(())
    }

    fn decompress_loose_file(&self, path: &Path, report: &mut EntryReport) -> Result<()> {
        let out = append_suffix(path, DECOMPRESSED_SUFFIX);
        let bytes = decompress_file(path, &out)?;

        let output = match self.options.output_mode {
            OutputMode::Replace => {
                replace_file(&out, path)?;
                path.to_path_buf()
            }
            OutputMode::KeepBoth => out,
        };
        info!("Saved file as {}", output.display());

        report.decompression = Some(DecompressOutcome::Decompressed { output, bytes });
        report.advance(EntryState::Decompressed);
        Ok(())
    }

    fn convert_loose_file(&self, path: &Path, report: &mut EntryReport) -> Result<()> {
        let inflate = |temp: &Path| {
            decompress_file(path, temp).map(|bytes| DecompressOutcome::Decompressed {
                output: temp.to_path_buf(),
                bytes,
            })
        };
        self.convert_image(path, self.options.decompress.then_some(inflate), report)
    }

    /// Converts a raw image to `<stem>.png`, leaving the image itself untouched.
    ///
    /// `inflate` writes the decompressed image to a temporary `<file>.tmp`,
    /// which is converted instead when it was written and removed afterwards.
    fn convert_image<F>(&self, path: &Path, inflate: Option<F>, report: &mut EntryReport) -> Result<()>
    where
        F: FnOnce(&Path) -> Result<DecompressOutcome>,
    {
        let png = path.with_extension("png");

        match inflate {
            Some(inflate) => {
                let temp = append_suffix(path, TEMP_SUFFIX);
                let result = inflate(&temp).and_then(|outcome| {
                    let source = match &outcome {
                        DecompressOutcome::Decompressed { output, .. } => output.clone(),
                        DecompressOutcome::Skipped => path.to_path_buf(),
                    };
                    report.decompression = Some(outcome);
                    report.advance(EntryState::Decompressed);
                    convert_file(&source, &png)
                });
                remove_temp(&temp);
                result?;
            }
            None => convert_file(path, &png)?,
        }

        info!("Saved image as {}", png.display());
        report.png = Some(png);
        report.advance(EntryState::Converted);

        if self.options.remove_converted {
            remove_converted(path);
        }
        Ok(())
    }
}

/// Removes a raw image after a successful conversion, logging instead of failing.
fn remove_converted(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => info!("Removed {}", path.display()),
        Err(e) => warn!("Could not remove the file {}: {e}", path.display()),
    }
}
