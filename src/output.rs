//! CSV persistence for probe results.
//!
//! One row per run is appended to a single growing file. The column list is
//! fixed when the writer is built and never depends on which metrics a run
//! happened to collect.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use csv::WriterBuilder;
use tracing::debug;

use crate::error::OutputError;
use crate::metrics::{Generation, RadioMetrics, SpeedTestResult};

/// Throughput columns, always first.
pub const THROUGHPUT_COLUMNS: [&str; 4] = ["timestamp", "ping", "download", "upload"];

/// Ordered CSV header: throughput columns, then 4G fields, then 5G fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogColumns(Vec<String>);

impl LogColumns {
    pub fn standard() -> Self {
        let mut columns: Vec<String> = THROUGHPUT_COLUMNS.iter().map(|c| c.to_string()).collect();
        for generation in [Generation::Lte, Generation::Nr5g] {
            columns.extend(
                RadioMetrics::FIELD_NAMES
                    .iter()
                    .map(|field| format!("{}_{}", generation.column_tag(), field)),
            );
        }
        Self(columns)
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for LogColumns {
    fn default() -> Self {
        Self::standard()
    }
}

/// Appends one row per run to a CSV file, writing the header when the file
/// is empty.
pub struct MetricsLogWriter {
    path: PathBuf,
    columns: LogColumns,
}

impl MetricsLogWriter {
    pub fn new(path: impl Into<PathBuf>, columns: LogColumns) -> Self {
        Self {
            path: path.into(),
            columns,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn columns(&self) -> &LogColumns {
        &self.columns
    }

    /// Appends a row built from `result`, the 4G metrics and the 5G metrics.
    ///
    /// Creates the file if needed. The header is written only when the file is
    /// empty before this call.
    pub fn append_row(
        &self,
        result: &SpeedTestResult,
        lte: &RadioMetrics,
        nr: &RadioMetrics,
    ) -> Result<(), OutputError> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        let needs_header = file.metadata()?.len() == 0;
        debug!(path = %self.path.display(), needs_header, "Appending CSV row");

        let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);

        if needs_header {
            writer.write_record(self.columns.names())?;
        }
        writer.write_record(log_row(result, lte, nr))?;
        writer.flush()?;

        Ok(())
    }
}

/// Row values in [`LogColumns::standard`] order.
pub fn log_row(result: &SpeedTestResult, lte: &RadioMetrics, nr: &RadioMetrics) -> Vec<String> {
    let mut row = Vec::with_capacity(4 + 2 * RadioMetrics::FIELD_NAMES.len());
    row.push(result.timestamp.clone());
    row.push(format_measurement(result.ping_ms));
    row.push(format_measurement(result.download_mbps));
    row.push(format_measurement(result.upload_mbps));
    row.extend(lte.values().iter().map(|v| v.to_string()));
    row.extend(nr.values().iter().map(|v| v.to_string()));
    row
}

/// Empty when not measured; otherwise the shortest form that keeps a decimal
/// point (`8.0`, `1.9`).
fn format_measurement(value: Option<f64>) -> String {
    value.map(|v| format!("{v:?}")).unwrap_or_default()
}
