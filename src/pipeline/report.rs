//! Per-file and batch reports.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::metrics::{MetricKind, MetricResult};
use crate::select::{Candidate, reduction_percent};
use crate::stats::{Summary, mean};

/// Winner label when the original was kept.
pub const NO_CHANGE: &str = "no_change";

const MB: f64 = 1024.0 * 1024.0;

/// One candidate as it appears in a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSummary {
    /// Strategy that produced it.
    pub method: String,
    /// Size in bytes.
    pub size: u64,
    /// Gate verdict; `None` when the candidate was never evaluated.
    pub gate_passed: Option<bool>,
}

impl From<&Candidate> for CandidateSummary {
    fn from(candidate: &Candidate) -> Self {
        Self {
            method: candidate.method.clone(),
            size: candidate.size,
            gate_passed: candidate.gate.as_ref().map(|g| g.passed),
        }
    }
}

/// Outcome of compressing one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSummary {
    /// Input PDF.
    pub original_file: PathBuf,
    /// Output PDF.
    pub final_file: PathBuf,
    /// Input size in bytes.
    pub original_size: u64,
    /// Output size in bytes.
    pub final_size: u64,
    /// Size reduction in percent (0 when the original was kept).
    pub reduction_percent: f64,
    /// Winning strategy, or [`NO_CHANGE`].
    pub winner: String,
    /// Quality metrics of the winner, if it was evaluated.
    pub metrics: MetricResult,
    /// Gates the winner passed.
    pub gates_passed: Vec<MetricKind>,
    /// Gates the winner failed.
    pub gates_failed: Vec<MetricKind>,
    /// Every candidate that was produced.
    pub candidates: Vec<CandidateSummary>,
    /// Wall-clock processing time.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl FileSummary {
    /// Whether the original was kept unchanged.
    #[must_use]
    pub fn is_unchanged(&self) -> bool {
        self.winner == NO_CHANGE
    }

    /// File name of the input, for display.
    #[must_use]
    pub fn display_name(&self) -> String {
        display_name(&self.original_file)
    }
}

/// Result for one input in a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    /// The file was processed (possibly keeping the original).
    Compressed(FileSummary),
    /// Processing failed before an output could be written.
    Failed {
        /// Input PDF.
        file: PathBuf,
        /// Error message.
        error: String,
    },
}

impl FileOutcome {
    /// Summary of a processed file.
    #[must_use]
    pub fn summary(&self) -> Option<&FileSummary> {
        match self {
            Self::Compressed(summary) => Some(summary),
            Self::Failed { .. } => None,
        }
    }

    /// Input file this outcome is about.
    #[must_use]
    pub fn file(&self) -> &Path {
        match self {
            Self::Compressed(summary) => &summary.original_file,
            Self::Failed { file, .. } => file,
        }
    }
}

/// Results of a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Report name, used for output file names.
    pub name: String,
    /// When the batch finished.
    #[serde(with = "chrono_serde")]
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Per-file outcomes, in input order.
    pub files: Vec<FileOutcome>,
}

impl BatchReport {
    /// Create a report from per-file outcomes.
    #[must_use]
    pub fn new(name: impl Into<String>, files: Vec<FileOutcome>) -> Self {
        Self {
            name: name.into(),
            timestamp: chrono::Utc::now(),
            files,
        }
    }

    fn summaries(&self) -> impl Iterator<Item = &FileSummary> {
        self.files.iter().filter_map(FileOutcome::summary)
    }

    /// Number of files processed successfully.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.summaries().count()
    }

    /// Number of files that failed.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.files.len() - self.succeeded()
    }

    /// Total input bytes of successful files.
    #[must_use]
    pub fn total_original(&self) -> u64 {
        self.summaries().map(|s| s.original_size).sum()
    }

    /// Total output bytes of successful files.
    #[must_use]
    pub fn total_final(&self) -> u64 {
        self.summaries().map(|s| s.final_size).sum()
    }

    /// Bytes saved across the batch.
    #[must_use]
    pub fn saved_bytes(&self) -> u64 {
        self.total_original().saturating_sub(self.total_final())
    }

    /// Aggregate reduction over all successful files, in percent.
    #[must_use]
    pub fn reduction_percent(&self) -> f64 {
        reduction_percent(self.total_original(), self.total_final())
    }

    /// How often each strategy won, including [`NO_CHANGE`].
    #[must_use]
    pub fn winner_frequency(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for summary in self.summaries() {
            *counts.entry(summary.winner.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Statistics of per-file reductions.
    #[must_use]
    pub fn reduction_summary(&self) -> Option<Summary> {
        let values: Vec<f64> = self.summaries().map(|s| s.reduction_percent).collect();
        Summary::compute(&values)
    }

    /// Mean value of a metric over files where it was measured.
    #[must_use]
    pub fn mean_metric(&self, kind: MetricKind) -> Option<f64> {
        let values: Vec<f64> = self.summaries().filter_map(|s| s.metrics.get(kind)).collect();
        mean(&values)
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Write one CSV row per input file.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut wtr = csv::Writer::from_path(path)?;

        wtr.write_record([
            "file",
            "status",
            "original_size",
            "final_size",
            "reduction_percent",
            "winner",
            "psnr",
            "ssim",
            "lpips",
            "gates_passed",
            "gates_failed",
            "elapsed_ms",
            "error",
        ])?;

        let join = |kinds: &[MetricKind]| kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(";");

        for outcome in &self.files {
            let row: [String; 13] = match outcome {
                FileOutcome::Compressed(s) => [
                    s.original_file.display().to_string(),
                    "ok".to_string(),
                    s.original_size.to_string(),
                    s.final_size.to_string(),
                    format!("{:.2}", s.reduction_percent),
                    s.winner.clone(),
                    s.metrics.psnr.map_or(String::new(), |p| format!("{p:.2}")),
                    s.metrics.ssim.map_or(String::new(), |v| format!("{v:.4}")),
                    s.metrics.lpips.map_or(String::new(), |v| format!("{v:.4}")),
                    join(&s.gates_passed),
                    join(&s.gates_failed),
                    s.elapsed.as_millis().to_string(),
                    String::new(),
                ],
                FileOutcome::Failed { file, error } => {
                    let mut row: [String; 13] = Default::default();
                    row[0] = file.display().to_string();
                    row[1] = "error".to_string();
                    row[12] = error.clone();
                    row
                }
            };
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    }

    /// Write `<name>.json` and `<name>.csv` into `dir`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let json_path = dir.join(format!("{}.json", self.name));
        let csv_path = dir.join(format!("{}.csv", self.name));
        self.write_json(&json_path)?;
        self.write_csv(&csv_path)?;
        Ok((json_path, csv_path))
    }

    /// Final summary table for the terminal.
    #[must_use]
    pub fn render_table(&self) -> String {
        let mut out = String::new();
        let rule = "=".repeat(70);
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "FINAL SUMMARY");
        let _ = writeln!(out, "{rule}");

        for outcome in &self.files {
            match outcome {
                FileOutcome::Compressed(s) => {
                    let _ = writeln!(out, "OK    {}", s.display_name());
                    let _ = writeln!(
                        out,
                        "      {:.2} MB -> {:.2} MB ({:.1}%)",
                        s.original_size as f64 / MB,
                        s.final_size as f64 / MB,
                        s.reduction_percent
                    );
                    let psnr = s.metrics.psnr.map_or_else(|| "n/a".to_string(), |p| format!("{p:.1} dB"));
                    let _ = writeln!(out, "      winner: {} (PSNR {psnr})", s.winner);
                }
                FileOutcome::Failed { file, error } => {
                    let _ = writeln!(out, "FAIL  {}: {error}", display_name(file));
                }
            }
        }

        if self.succeeded() > 0 && self.total_original() > 0 {
            let _ = writeln!(out);
            let _ = writeln!(out, "Processed: {}/{}", self.succeeded(), self.files.len());
            let _ = writeln!(
                out,
                "Total: {:.2} MB -> {:.2} MB ({:.1}%)",
                self.total_original() as f64 / MB,
                self.total_final() as f64 / MB,
                self.reduction_percent()
            );
            let _ = writeln!(out, "Saved: {:.2} MB", self.saved_bytes() as f64 / MB);

            let frequency = self
                .winner_frequency()
                .into_iter()
                .map(|(method, n)| format!("{method}={n}"))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "Winners: {frequency}");
        }

        out
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

mod chrono_serde {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        dt.to_rfc3339().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
