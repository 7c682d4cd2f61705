//! Compression pipeline: strategies, quality gates and selection per file,
//! batched over a directory.
//!
//! ```rust,ignore
//! use pdf_squeeze::{Compressor, CompressorConfig, Tools};
//!
//! let settings = CompressorConfig::builder()
//!     .input_dir("input")
//!     .output_dir("output")
//!     .jobs(4)
//!     .build();
//!
//! let compressor = Compressor::new(settings, Tools::detect());
//! let report = compressor.compress_dir()?;
//! println!("{}", report.render_table());
//! ```

pub mod compressor;
pub mod report;

pub use compressor::Compressor;
pub use report::{BatchReport, CandidateSummary, FileOutcome, FileSummary, NO_CHANGE};

use std::path::PathBuf;

use crate::config::Config;

/// Suffix appended to output file stems.
pub const OUTPUT_SUFFIX: &str = "_optimized";

/// Settings for a [`Compressor`].
#[derive(Debug, Clone)]
pub struct CompressorConfig {
    /// Directory scanned for input PDFs.
    pub input_dir: PathBuf,
    /// Directory receiving `<stem>_optimized.pdf` files.
    pub output_dir: PathBuf,
    /// Move successfully processed inputs into `<input_dir>/processed`.
    pub move_processed: bool,
    /// Files processed in parallel.
    pub jobs: usize,
    /// Gate, rasterization and tool settings.
    pub config: Config,
    /// Run quality gates on candidates.
    pub gates_enabled: bool,
    /// Appended to the input stem to form the output name.
    pub suffix: String,
}

impl CompressorConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> CompressorConfigBuilder {
        CompressorConfigBuilder::default()
    }
}

/// Builder for [`CompressorConfig`].
#[derive(Debug, Default)]
pub struct CompressorConfigBuilder {
    input_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    move_processed: Option<bool>,
    jobs: Option<usize>,
    config: Option<Config>,
    gates_enabled: Option<bool>,
    suffix: Option<String>,
}

impl CompressorConfigBuilder {
    /// Set the input directory (default `input`).
    #[must_use]
    pub fn input_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_dir = Some(path.into());
        self
    }

    /// Set the output directory (default `output`).
    #[must_use]
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    /// Whether processed inputs are moved aside (default true).
    #[must_use]
    pub fn move_processed(mut self, enabled: bool) -> Self {
        self.move_processed = Some(enabled);
        self
    }

    /// Number of files processed in parallel (default 1).
    #[must_use]
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Set gate and tool configuration.
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Whether quality gates run (default true).
    #[must_use]
    pub fn gates_enabled(mut self, enabled: bool) -> Self {
        self.gates_enabled = Some(enabled);
        self
    }

    /// Output name suffix (default [`OUTPUT_SUFFIX`]).
    #[must_use]
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> CompressorConfig {
        CompressorConfig {
            input_dir: self.input_dir.unwrap_or_else(|| PathBuf::from("input")),
            output_dir: self.output_dir.unwrap_or_else(|| PathBuf::from("output")),
            move_processed: self.move_processed.unwrap_or(true),
            jobs: self.jobs.unwrap_or(1).max(1),
            config: self.config.unwrap_or_default(),
            gates_enabled: self.gates_enabled.unwrap_or(true),
            suffix: self.suffix.unwrap_or_else(|| OUTPUT_SUFFIX.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let settings = CompressorConfig::builder().build();
        assert_eq!(settings.input_dir, PathBuf::from("input"));
        assert_eq!(settings.output_dir, PathBuf::from("output"));
        assert!(settings.move_processed);
        assert!(settings.gates_enabled);
        assert_eq!(settings.jobs, 1);
        assert_eq!(settings.suffix, "_optimized");
    }

    #[test]
    fn test_builder_zero_jobs_clamped() {
        let settings = CompressorConfig::builder().jobs(0).move_processed(false).build();
        assert_eq!(settings.jobs, 1);
        assert!(!settings.move_processed);
    }
}
