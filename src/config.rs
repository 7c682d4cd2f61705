//! Run configuration: gate thresholds, rasterization and tool settings.
//!
//! Loaded from a JSON file and then overridden by CLI flags. Older config
//! files that describe aggregation with the `fail_on_any_gate` /
//! `require_majority` booleans are still accepted; an explicit
//! `aggregation` key wins over both.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::gate::AggregationMode;
use crate::metrics::{MetricConfig, MetricKind};
use crate::raster::PageSelection;

/// Configuration for quality gates and external tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ConfigFile")]
pub struct Config {
    /// Minimum mean PSNR in dB.
    pub psnr_threshold: f64,
    /// Evaluate the PSNR gate.
    pub psnr_enabled: bool,
    /// Minimum mean SSIM.
    pub ssim_threshold: f64,
    /// Evaluate the SSIM gate.
    pub ssim_enabled: bool,
    /// Maximum mean LPIPS distance.
    pub lpips_threshold: f64,
    /// Evaluate the LPIPS gate (needs an external scorer).
    pub lpips_enabled: bool,
    /// How gate results combine.
    pub aggregation: AggregationMode,
    /// Rasterization resolution for comparisons.
    pub raster_dpi: u32,
    /// Upper bound on pages compared per document.
    pub max_pages_to_check: usize,
    /// Which pages are sampled.
    pub page_selection: PageSelection,
    /// Seed for [`PageSelection::Random`].
    pub page_seed: u64,
    /// LPIPS scorer program.
    pub lpips_command: Option<PathBuf>,
    /// Ghostscript override.
    pub gs_path: Option<PathBuf>,
    /// qpdf override.
    pub qpdf_path: Option<PathBuf>,
    /// PDFtk override.
    pub pdftk_path: Option<PathBuf>,
    /// OCRmyPDF override.
    pub ocrmypdf_path: Option<PathBuf>,
    /// Try the OCR and scan strategies on documents without a text layer.
    pub ocr_enabled: bool,
    /// Tesseract language code passed to OCRmyPDF (e.g., "eng", "eng+spa").
    pub ocr_language: String,
    /// Time limit for one compression tool run.
    pub tool_timeout_secs: u64,
    /// Time limit for one rasterization or scoring call.
    pub raster_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            psnr_threshold: 35.0,
            psnr_enabled: true,
            ssim_threshold: 0.85,
            ssim_enabled: true,
            lpips_threshold: 0.15,
            lpips_enabled: false,
            aggregation: AggregationMode::Majority,
            raster_dpi: 150,
            max_pages_to_check: 5,
            page_selection: PageSelection::Distributed,
            page_seed: 0,
            lpips_command: None,
            gs_path: None,
            qpdf_path: None,
            pdftk_path: None,
            ocrmypdf_path: None,
            ocr_enabled: true,
            ocr_language: "eng".to_string(),
            tool_timeout_secs: 300,
            raster_timeout_secs: 180,
        }
    }
}

impl Config {
    /// Load a JSON config file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.raster_dpi == 0 {
            return Err(Error::config("raster_dpi", "must be positive"));
        }
        if self.max_pages_to_check == 0 {
            return Err(Error::config("max_pages_to_check", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.ssim_threshold) {
            return Err(Error::config("ssim_threshold", "must be within 0.0..=1.0"));
        }
        if !self.psnr_threshold.is_finite() {
            return Err(Error::config("psnr_threshold", "must be finite"));
        }
        if !self.lpips_threshold.is_finite() || self.lpips_threshold < 0.0 {
            return Err(Error::config("lpips_threshold", "must be a non-negative number"));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(Error::config("ocr_language", "must not be empty"));
        }
        if self.tool_timeout_secs == 0 || self.raster_timeout_secs == 0 {
            return Err(Error::config("timeout", "must be at least one second"));
        }
        Ok(())
    }

    /// Metrics switched on by configuration (before availability checks).
    #[must_use]
    pub fn metric_config(&self) -> MetricConfig {
        MetricConfig {
            psnr: self.psnr_enabled,
            ssim: self.ssim_enabled,
            lpips: self.lpips_enabled,
        }
    }

    /// Threshold for a metric's gate.
    #[must_use]
    pub fn threshold(&self, kind: MetricKind) -> f64 {
        match kind {
            MetricKind::Psnr => self.psnr_threshold,
            MetricKind::Ssim => self.ssim_threshold,
            MetricKind::Lpips => self.lpips_threshold,
        }
    }

    /// Keep only the PSNR gate.
    #[must_use]
    pub fn psnr_only(mut self) -> Self {
        self.ssim_enabled = false;
        self.lpips_enabled = false;
        self
    }

    /// Set the aggregation mode.
    #[must_use]
    pub fn with_aggregation(mut self, mode: AggregationMode) -> Self {
        self.aggregation = mode;
        self
    }

    /// Compression tool time limit.
    #[must_use]
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Rasterization/scoring time limit.
    #[must_use]
    pub fn raster_timeout(&self) -> Duration {
        Duration::from_secs(self.raster_timeout_secs)
    }
}

/// On-disk shape, including the legacy aggregation booleans.
#[derive(Deserialize)]
#[serde(default)]
struct ConfigFile {
    psnr_threshold: f64,
    psnr_enabled: bool,
    ssim_threshold: f64,
    ssim_enabled: bool,
    lpips_threshold: f64,
    lpips_enabled: bool,
    aggregation: Option<AggregationMode>,
    fail_on_any_gate: Option<bool>,
    require_majority: Option<bool>,
    raster_dpi: u32,
    max_pages_to_check: usize,
    page_selection: PageSelection,
    page_seed: u64,
    lpips_command: Option<PathBuf>,
    gs_path: Option<PathBuf>,
    qpdf_path: Option<PathBuf>,
    pdftk_path: Option<PathBuf>,
    ocrmypdf_path: Option<PathBuf>,
    ocr_enabled: bool,
    ocr_language: String,
    tool_timeout_secs: u64,
    raster_timeout_secs: u64,
}

impl Default for ConfigFile {
    fn default() -> Self {
        let d = Config::default();
        Self {
            psnr_threshold: d.psnr_threshold,
            psnr_enabled: d.psnr_enabled,
            ssim_threshold: d.ssim_threshold,
            ssim_enabled: d.ssim_enabled,
            lpips_threshold: d.lpips_threshold,
            lpips_enabled: d.lpips_enabled,
            aggregation: None,
            fail_on_any_gate: None,
            require_majority: None,
            raster_dpi: d.raster_dpi,
            max_pages_to_check: d.max_pages_to_check,
            page_selection: d.page_selection,
            page_seed: d.page_seed,
            lpips_command: d.lpips_command,
            gs_path: d.gs_path,
            qpdf_path: d.qpdf_path,
            pdftk_path: d.pdftk_path,
            ocrmypdf_path: d.ocrmypdf_path,
            ocr_enabled: d.ocr_enabled,
            ocr_language: d.ocr_language,
            tool_timeout_secs: d.tool_timeout_secs,
            raster_timeout_secs: d.raster_timeout_secs,
        }
    }
}

impl From<ConfigFile> for Config {
    fn from(file: ConfigFile) -> Self {
        let aggregation = match (file.aggregation, file.fail_on_any_gate, file.require_majority) {
            (Some(mode), _, _) => mode,
            (None, None, None) => AggregationMode::default(),
            (None, fail_on_any, majority) => AggregationMode::from_legacy_flags(
                fail_on_any.unwrap_or(false),
                majority.unwrap_or(true),
            ),
        };

        Self {
            psnr_threshold: file.psnr_threshold,
            psnr_enabled: file.psnr_enabled,
            ssim_threshold: file.ssim_threshold,
            ssim_enabled: file.ssim_enabled,
            lpips_threshold: file.lpips_threshold,
            lpips_enabled: file.lpips_enabled,
            aggregation,
            raster_dpi: file.raster_dpi,
            max_pages_to_check: file.max_pages_to_check,
            page_selection: file.page_selection,
            page_seed: file.page_seed,
            lpips_command: file.lpips_command,
            gs_path: file.gs_path,
            qpdf_path: file.qpdf_path,
            pdftk_path: file.pdftk_path,
            ocrmypdf_path: file.ocrmypdf_path,
            ocr_enabled: file.ocr_enabled,
            ocr_language: file.ocr_language,
            tool_timeout_secs: file.tool_timeout_secs,
            raster_timeout_secs: file.raster_timeout_secs,
        }
    }
}
