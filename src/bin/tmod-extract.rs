//! tModLoader archive (.tmod) extraction CLI
//!
//! A command-line interface for inspecting and unpacking tmod archives.
//!
//! ## Commands
//!
//! - `info` - Display the archive header and entry table
//! - `extract` - Extract an archive, optionally decompressing and converting images
//! - `decompress` - Decompress extracted files, or every file listed in a manifest
//! - `convert` - Convert raw images to PNG

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tmod_extract::format::DEFAULT_OUTPUT_ROOT;
use tmod_extract::{
    Archive, EntryState, ManifestRow, OutputMode, Pipeline, PipelineOptions, PipelineReport,
    Result,
};

/// tModLoader archive (.tmod) extractor
#[derive(Parser)]
#[command(name = "tmod-extract")]
#[command(about = "Extract, decompress and convert tModLoader .tmod archives", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display archive information
    Info {
        /// Path to the .tmod file
        file: PathBuf,
        /// Output format: json, pretty
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
    /// Extract an archive
    Extract {
        /// Path to the .tmod file
        file: PathBuf,
        /// Directory the mod folder is created in
        #[arg(short, long, default_value = DEFAULT_OUTPUT_ROOT)]
        out_dir: PathBuf,
        /// Decompress the extracted files
        #[arg(short, long)]
        decompress: bool,
        /// Convert raw images to PNG (requires --decompress)
        #[arg(short = 'i', long)]
        convert_images: bool,
        /// Remove raw images after converting them
        #[arg(short, long)]
        replace: bool,
        /// Same as -d -i -r
        #[arg(short, long)]
        auto: bool,
        /// Keep compressed files and write decompressed ones beside them as .out
        #[arg(long)]
        keep: bool,
        /// Do not write entries.txt
        #[arg(long)]
        no_manifest: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Decompress extracted files
    Decompress {
        /// Files to decompress unconditionally
        #[arg(required_unless_present = "entries", conflicts_with = "entries")]
        files: Vec<PathBuf>,
        /// Decompress the files listed in an entries.txt manifest
        #[arg(short, long)]
        entries: Option<PathBuf>,
        /// Replace the original files instead of writing .out files
        #[arg(short, long)]
        replace: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },
    /// Convert raw images to PNG
    Convert {
        /// Raw image files to convert
        #[arg(required_unless_present = "entries", conflicts_with = "entries")]
        files: Vec<PathBuf>,
        /// Convert the raw images listed in an entries.txt manifest
        #[arg(short, long)]
        entries: Option<PathBuf>,
        /// Decompress the images before converting them
        #[arg(short, long)]
        decompress: bool,
        /// Remove the raw images after converting them
        #[arg(short, long)]
        replace: bool,
        #[command(flatten)]
        batch: BatchArgs,
    },
}

/// Options shared by every command that processes a batch.
#[derive(Args)]
struct BatchArgs {
    /// Continue past failed entries
    #[arg(long, visible_alias = "ignore-errors")]
    ignore: bool,
    /// Worker threads for decompression and conversion
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,
    /// Report format: json, pretty
    #[arg(short, long, default_value = "pretty")]
    format: OutputFormat,
}

/// Output format options
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

// ============================================================================
// Serializable Output Structures
// ============================================================================

#[derive(Serialize)]
struct InfoOutput {
    file: PathBuf,
    magic: String,
    version: String,
    hash: String,
    data_len: u32,
    mod_name: String,
    mod_version: String,
    entry_count: usize,
    compressed_entries: usize,
    entries: Vec<ManifestRow>,
}

impl InfoOutput {
    fn new(file: &Path, archive: &Archive) -> Self {
        Self {
            file: file.to_path_buf(),
            magic: String::from_utf8_lossy(&archive.magic).into_owned(),
            version: archive.version.clone(),
            hash: archive.hash_hex(),
            data_len: archive.data_len,
            mod_name: archive.mod_name.clone(),
            mod_version: archive.mod_version.clone(),
            entry_count: archive.entries.len(),
            compressed_entries: archive.entries.iter().filter(|e| e.is_compressed()).count(),
            entries: archive.entries.iter().map(ManifestRow::from).collect(),
        }
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { file, output } => cmd_info(&file, output),
        Commands::Extract {
            file,
            out_dir,
            decompress,
            convert_images,
            replace,
            auto,
            keep,
            no_manifest,
            batch,
        } => {
            let mut options = if auto {
                PipelineOptions::auto()
            } else {
                PipelineOptions::new()
                    .decompress(decompress)
                    .convert_images(convert_images)
                    .remove_converted(replace)
            };
            if keep {
                options = options.output_mode(OutputMode::KeepBoth);
            }
            let options = batch
                .apply(options.output_root(out_dir))
                .write_manifest(!no_manifest);

            let pipeline = Pipeline::new(options);
            finish(pipeline.run_archive(&file), batch.format)
        }
        Commands::Decompress {
            files,
            entries,
            replace,
            batch,
        } => {
            let mode = if replace {
                OutputMode::Replace
            } else {
                OutputMode::KeepBoth
            };
            let options = batch.apply(PipelineOptions::new().decompress(true).output_mode(mode));
            let pipeline = Pipeline::new(options);

            let result = match entries {
                Some(manifest) => pipeline.run_manifest(&manifest),
                None => pipeline.decompress_files(&files),
            };
            finish(result, batch.format)
        }
        Commands::Convert {
            files,
            entries,
            decompress,
            replace,
            batch,
        } => {
            let options = batch.apply(
                PipelineOptions::new()
                    .decompress(decompress)
                    .convert_images(true)
                    .remove_converted(replace),
            );
            let pipeline = Pipeline::new(options);

            let result = match entries {
                Some(manifest) => pipeline.run_manifest(&manifest),
                None => pipeline.convert_files(&files),
            };
            finish(result, batch.format)
        }
    }
}

impl BatchArgs {
    fn apply(&self, options: PipelineOptions) -> PipelineOptions {
        options.ignore_errors(self.ignore).jobs(self.jobs)
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };

    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

// ============================================================================
// Info Command Implementation
// ============================================================================

fn cmd_info(file: &Path, output: OutputFormat) -> ExitCode {
    let archive = match Archive::open(file) {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error decoding archive: {e}");
            return ExitCode::FAILURE;
        }
    };

    let info = InfoOutput::new(file, &archive);
    match output {
        OutputFormat::Json => match serde_json::to_string_pretty(&info) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing output: {e}");
                return ExitCode::FAILURE;
            }
        },
        OutputFormat::Pretty => print_info(&info),
    }

    ExitCode::SUCCESS
}

fn print_info(info: &InfoOutput) {
    println!("=== Archive Information ===\n");

    println!("File: {}", info.file.display());
    println!("  Magic: {}", info.magic);
    println!("  Loader Version: {}", info.version);
    println!("  Hash: {}", info.hash);
    println!("  Data Length: {} bytes", info.data_len);

    println!("\nMod:");
    println!("  Name: {}", info.mod_name);
    println!("  Version: {}", info.mod_version);

    println!(
        "\nEntries ({}, {} compressed):",
        info.entry_count, info.compressed_entries
    );
    let width = info
        .entries
        .iter()
        .map(|row| row.filename.len())
        .max()
        .unwrap_or(0);
    for row in &info.entries {
        println!(
            "  {:<width$}  {:>10}  {:>10}",
            row.filename, row.raw_size, row.comp_size
        );
    }
}

// ============================================================================
// Batch Reporting
// ============================================================================

fn finish(result: Result<PipelineReport>, format: OutputFormat) -> ExitCode {
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            eprintln!("ERROR: {e}");
            return ExitCode::FAILURE;
        }
    };

    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Error serializing report: {e}");
                return ExitCode::FAILURE;
            }
        },
        OutputFormat::Pretty => print_report(&report),
    }

    if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn print_report(report: &PipelineReport) {
    if let (Some(name), Some(dir)) = (&report.mod_name, &report.module_dir) {
        eprintln!("Extracted {name} to {}", dir.display());
    }

    for entry in &report.entries {
        match (&entry.state, &entry.error) {
            (EntryState::Failed(kind), Some(error)) => {
                eprintln!("FAILED {} ({kind:?}): {error}", entry.name);
            }
            _ => {
                if let Some(png) = &entry.png {
                    eprintln!("{} -> {}", entry.name, png.display());
                }
            }
        }
    }

    for row in &report.rejected_rows {
        eprintln!("SKIPPED {row}");
    }

    eprintln!(
        "\nProcessed: {} success, {} errors",
        report.succeeded(),
        report.failed() + report.rejected_rows.len()
    );
}
