//! Per-entry outcomes collected by the pipeline.

use std::path::PathBuf;

use serde::Serialize;

use crate::decompress::DecompressOutcome;
use crate::error::{ErrorKind, ExtractError};

/// Where an entry is in the pipeline.
///
/// Entries move `Pending -> Extracted -> Decompressed -> Converted -> Done`,
/// skipping the stages that were not requested, or end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Not processed yet.
    Pending,
    /// The stored payload is on disk.
    Extracted,
    /// The payload went through the decompression stage.
    Decompressed,
    /// A PNG was written for the entry.
    Converted,
    /// All requested stages finished.
    Done,
    /// A stage failed with the given kind of error.
    Failed(ErrorKind),
}

/// The outcome for one entry or file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryReport {
    /// Entry filename or file path.
    pub name: String,

    /// Final state: `Done` or `Failed`.
    pub state: EntryState,

    /// Last stage completed before the final state.
    pub reached: EntryState,

    /// Result of the decompression stage, if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decompression: Option<DecompressOutcome>,

    /// PNG written by the conversion stage, if it ran.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub png: Option<PathBuf>,

    /// Error message when the entry failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EntryReport {
    /// Creates a report for an entry that has reached `state`.
    #[must_use]
    pub fn new(name: impl Into<String>, state: EntryState) -> Self {
        Self {
            name: name.into(),
            state,
            reached: state,
            decompression: None,
            png: None,
            error: None,
        }
    }

    /// Records that `state` was reached.
    pub fn advance(&mut self, state: EntryState) {
        self.state = state;
        self.reached = state;
    }

    /// Marks the entry finished.
    pub fn finish(&mut self) {
        self.state = EntryState::Done;
    }

    /// Marks the entry failed with `error`.
    pub fn fail(&mut self, error: &ExtractError) {
        self.state = EntryState::Failed(error.kind());
        self.error = Some(error.to_string());
    }

    /// Returns whether the entry failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.state, EntryState::Failed(_))
    }
}

/// Everything a pipeline run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// The archive or manifest that was processed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,

    /// Name of the extracted mod.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mod_name: Option<String>,

    /// Directory holding the extracted files.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_dir: Option<PathBuf>,

    /// Manifest written by this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,

    /// Per-entry outcomes in archive or manifest order.
    pub entries: Vec<EntryReport>,

    /// Manifest lines skipped under the ignore-errors policy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected_rows: Vec<String>,
}

impl PipelineReport {
    /// Number of entries that finished.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_failed()).count()
    }

    /// Number of entries that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| e.is_failed()).count()
    }

    /// Returns whether any entry failed or any manifest row was rejected.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed() > 0 || !self.rejected_rows.is_empty()
    }

    /// Looks up the report for an entry.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&EntryReport> {
        self.entries.iter().find(|e| e.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_report_transitions() {
        let mut report = EntryReport::new("a.rawimg", EntryState::Extracted);
        report.advance(EntryState::Decompressed);
        report.finish();
        assert_eq!(report.state, EntryState::Done);
        assert_eq!(report.reached, EntryState::Decompressed);

        let mut report = EntryReport::new("b.rawimg", EntryState::Extracted);
        report.fail(&ExtractError::RawImageTooShort { len: 0 });
        assert_eq!(
            report.state,
            EntryState::Failed(ErrorKind::RawImageTooShort)
        );
        assert_eq!(report.reached, EntryState::Extracted);
        assert!(report.is_failed());
    }

    #[test]
    fn test_counts() {
        let mut failed = EntryReport::new("b", EntryState::Extracted);
        failed.fail(&ExtractError::InvalidEntryCount { count: -1 });
        let report = PipelineReport {
            entries: vec![EntryReport::new("a", EntryState::Done), failed],
            ..PipelineReport::default()
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(report.has_failures());
        assert!(report.entry("a").is_some());
    }

    #[test]
    fn test_serializes_to_json() {
        let mut entry = EntryReport::new("a.raw", EntryState::Extracted);
        entry.decompression = Some(DecompressOutcome::Skipped);
        entry.finish();

        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["state"], "done");
        assert_eq!(json["reached"], "extracted");
        assert_eq!(json["decompression"]["status"], "skipped");
        assert!(json.get("error").is_none());
    }
}
