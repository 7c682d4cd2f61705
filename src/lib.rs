//! # pdf-squeeze
//!
//! Quality-gated PDF compression.
//!
//! Every input PDF is rewritten by several external tools (qpdf,
//! Ghostscript presets, PDFtk, OCRmyPDF for scans). Each result is a
//! candidate; candidates are rasterized and compared with the original
//! using PSNR, SSIM and optionally LPIPS. The smallest candidate that is strictly smaller than
//! the original and passes the quality gates is kept. If none qualifies,
//! the original is copied through unchanged, so the output is never larger
//! than the input.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pdf_squeeze::{Compressor, CompressorConfig, Config, Tools};
//!
//! let config = Config::from_file("gates.json".as_ref())?;
//! let tools = Tools::detect_with(&config);
//! let settings = CompressorConfig::builder()
//!     .input_dir("input")
//!     .output_dir("output")
//!     .config(config)
//!     .build();
//!
//! let report = Compressor::new(settings, tools).compress_dir()?;
//! println!("{}", report.render_table());
//! ```
//!
//! ## Modules
//!
//! - [`select`]: Candidate selection and the never-worse fallback
//! - [`gate`]: Quality gates and aggregation modes
//! - [`metrics`]: PSNR, SSIM and LPIPS
//! - [`raster`]: Page sampling and Ghostscript rasterization
//! - [`strategy`]: Compression strategies
//! - [`scan`]: Recognizing scanned documents for the OCR strategies
//! - [`tools`]: External tool detection
//! - [`pipeline`]: Per-file and batch processing, reports
//! - [`config`]: Configuration file and defaults
//! - [`stats`]: Descriptive statistics for reports
//! - [`error`]: Error types for the library

pub mod config;
pub mod error;
mod exec;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod raster;
pub mod scan;
pub mod select;
pub mod stats;
pub mod strategy;
pub mod tools;

// Re-export commonly used types
pub use config::Config;
pub use error::{Error, Result};
pub use gate::{AggregationMode, GateCheck, QualityEvaluator, QualityGateChecker, QualityGateResult};
pub use metrics::{MetricConfig, MetricKind, MetricResult, PageMetrics};
pub use pipeline::{BatchReport, Compressor, CompressorConfig, FileOutcome, FileSummary};
pub use raster::{PageSelection, Rasterizer};
pub use select::{Candidate, Selection, select, select_lazy};
pub use stats::Summary;
pub use strategy::{Strategy, builtin_strategies};
pub use tools::{ToolKind, Tools};
