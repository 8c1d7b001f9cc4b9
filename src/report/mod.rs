//! Report Assembler
//!
//! - **CSV** (`csv_report.rs`) - one row per matched server
//! - **JSON** (`json_report.rs`) - UUID lists and merged results
//!
//! [`ReportWriter`] owns the output directory and the file names of each
//! artifact.

pub mod csv_report;
pub mod json_report;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, info};

use crate::domain::ReconciledRecord;
use crate::error::Result;

pub use csv_report::{render_csv, REPORT_HEADER};
pub use json_report::{parse_uuid_list, render_merged, render_uuid_list, UuidList};

// =============================================================================
// Configuration
// =============================================================================

/// Where each artifact is written
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory every file is placed in
    pub directory: PathBuf,

    /// Matched-server CSV
    pub report: String,

    /// Discovered UUIDs, written by a device run and read by a hardware run
    pub matched: String,

    /// UUIDs no server matched
    pub unmatched: String,

    /// Merged results JSON
    pub merged: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            report: "output.csv".to_string(),
            matched: "matcheduuid.json".to_string(),
            unmatched: "unmatcheduuid.json".to_string(),
            merged: "merged-results.json".to_string(),
        }
    }
}

// =============================================================================
// Writer
// =============================================================================

/// Single writer for every output artifact.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    config: OutputConfig,
}

impl ReportWriter {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &OutputConfig {
        &self.config
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.config.directory.join(name)
    }

    /// Write `contents` to `name` inside the output directory.
    pub async fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.config.directory).await?;
        let path = self.path(name);
        tokio::fs::write(&path, contents).await?;
        debug!(path = %path.display(), bytes = contents.len(), "Wrote file");
        Ok(path)
    }

    /// Matched-server CSV.
    pub async fn write_report(&self, records: &[ReconciledRecord]) -> Result<PathBuf> {
        let csv = render_csv(records)?;
        let path = self.write_file(&self.config.report, &csv).await?;
        info!(path = %path.display(), "Wrote server report");
        Ok(path)
    }

    /// Discovered-UUID file consumed by a later hardware run.
    pub async fn write_discovered(&self, uuids: &[String]) -> Result<PathBuf> {
        let path = self
            .write_file(&self.config.matched, &render_uuid_list(uuids)?)
            .await?;
        info!(path = %path.display(), uuids = uuids.len(), "Wrote discovered UUIDs");
        Ok(path)
    }

    /// Read the discovered-UUID file of an earlier device run.
    pub async fn read_discovered(&self) -> Result<Vec<String>> {
        read_uuid_list(&self.path(&self.config.matched)).await
    }

    /// Unmatched UUIDs. Nothing is written when the list is empty.
    pub async fn write_unmatched(&self, uuids: &[String]) -> Result<Option<PathBuf>> {
        if uuids.is_empty() {
            debug!("Every discovered UUID matched, no unmatched file");
            return Ok(None);
        }
        let path = self
            .write_file(&self.config.unmatched, &render_uuid_list(uuids)?)
            .await?;
        info!(path = %path.display(), uuids = uuids.len(), "Wrote unmatched UUIDs");
        Ok(Some(path))
    }

    pub async fn write_merged(&self, records: &[ReconciledRecord]) -> Result<PathBuf> {
        let path = self
            .write_file(&self.config.merged, &render_merged(records)?)
            .await?;
        info!(path = %path.display(), records = records.len(), "Wrote merged results");
        Ok(path)
    }
}

/// Read a `{"uuids": [...]}` file.
pub async fn read_uuid_list(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_uuid_list(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn writer(dir: &TempDir) -> ReportWriter {
        ReportWriter::new(OutputConfig {
            directory: dir.path().join("out"),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_discovered_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir);

        writer
            .write_discovered(&["A".to_string(), "C".to_string()])
            .await
            .unwrap();
        assert_eq!(writer.read_discovered().await.unwrap(), vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_unmatched_written_only_when_present() {
        let dir = TempDir::new().unwrap();
        let writer = writer(&dir);

        assert!(writer.write_unmatched(&[]).await.unwrap().is_none());
        assert!(!writer.path("unmatcheduuid.json").exists());

        let path = writer
            .write_unmatched(&["C".to_string()])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read_uuid_list(&path).await.unwrap(), vec!["C"]);
    }

    #[tokio::test]
    async fn test_missing_discovered_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = writer(&dir).read_discovered().await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }

    #[test]
    fn test_output_defaults() {
        let config: OutputConfig = serde_yaml::from_str("directory: /tmp/run").unwrap();
        assert_eq!(config.directory, PathBuf::from("/tmp/run"));
        assert_eq!(config.report, "output.csv");
        assert_eq!(config.matched, "matcheduuid.json");
        assert_eq!(config.unmatched, "unmatcheduuid.json");
        assert_eq!(config.merged, "merged-results.json");
    }
}
