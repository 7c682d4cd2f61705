//! Subcommands and the gate options they share.

pub mod bench;
pub mod check;
pub mod run;
pub mod tools;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use pdf_squeeze::{AggregationMode, Config, PageSelection, Tools};

/// Quality gate, rasterization and tool options.
#[derive(Args, Debug, Clone, Default)]
pub struct GateArgs {
    /// JSON configuration file
    #[arg(short, long, env = "PDF_SQUEEZE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable SSIM and LPIPS gates in addition to PSNR
    #[arg(long)]
    pub advanced_gates: bool,

    /// Gate aggregation: majority, strict or permissive
    #[arg(long)]
    pub mode: Option<AggregationMode>,

    /// Minimum mean PSNR (dB)
    #[arg(long)]
    pub psnr_threshold: Option<f64>,

    /// Minimum mean SSIM
    #[arg(long)]
    pub ssim_threshold: Option<f64>,

    /// Maximum mean LPIPS distance
    #[arg(long)]
    pub lpips_threshold: Option<f64>,

    /// LPIPS scorer program (called with two PNG paths)
    #[arg(long)]
    pub lpips_command: Option<PathBuf>,

    /// Pages compared per document
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Rasterization resolution
    #[arg(long)]
    pub dpi: Option<u32>,

    /// Page sampling: first, distributed or random
    #[arg(long)]
    pub page_selection: Option<PageSelection>,

    /// Seed for random page sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Ghostscript binary
    #[arg(long, env = "PDF_SQUEEZE_GS")]
    pub gs: Option<PathBuf>,

    /// qpdf binary
    #[arg(long)]
    pub qpdf: Option<PathBuf>,

    /// PDFtk binary
    #[arg(long)]
    pub pdftk: Option<PathBuf>,

    /// Time limit per tool run, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl GateArgs {
    /// Build the effective configuration: file (or defaults), then flags.
    ///
    /// Without a config file only the PSNR gate is on unless
    /// `--advanced-gates` is given.
    pub fn load(&self) -> Result<Config> {
        let mut config = match self.config {
            Some(ref path) => Config::from_file(path)
                .with_context(|| format!("Failed to load config: {}", path.display()))?,
            None => Config::default().psnr_only(),
        };

        if self.advanced_gates {
            config.ssim_enabled = true;
            config.lpips_enabled = true;
        }
        if let Some(mode) = self.mode {
            config.aggregation = mode;
        }
        if let Some(v) = self.psnr_threshold {
            config.psnr_threshold = v;
        }
        if let Some(v) = self.ssim_threshold {
            config.ssim_threshold = v;
        }
        if let Some(v) = self.lpips_threshold {
            config.lpips_threshold = v;
        }
        if let Some(ref path) = self.lpips_command {
            config.lpips_command = Some(path.clone());
        }
        if let Some(v) = self.max_pages {
            config.max_pages_to_check = v;
        }
        if let Some(v) = self.dpi {
            config.raster_dpi = v;
        }
        if let Some(v) = self.page_selection {
            config.page_selection = v;
        }
        if let Some(v) = self.seed {
            config.page_seed = v;
        }
        if let Some(ref path) = self.gs {
            config.gs_path = Some(path.clone());
        }
        if let Some(ref path) = self.qpdf {
            config.qpdf_path = Some(path.clone());
        }
        if let Some(ref path) = self.pdftk {
            config.pdftk_path = Some(path.clone());
        }
        if let Some(v) = self.timeout {
            config.tool_timeout_secs = v;
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Detect tools and log what was found.
    pub fn tools(&self, config: &Config) -> Tools {
        let tools = Tools::detect_with(config);
        for kind in pdf_squeeze::ToolKind::ALL {
            match tools.path(kind) {
                Some(path) => log::info!("{kind}: {}", path.display()),
                None => log::info!("{kind}: not found"),
            }
        }
        tools
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_psnr_only() {
        let config = GateArgs::default().load().unwrap();
        assert!(config.psnr_enabled);
        assert!(!config.ssim_enabled);
        assert!(!config.lpips_enabled);
    }

    #[test]
    fn test_flags_override() {
        let args = GateArgs {
            advanced_gates: true,
            mode: Some(AggregationMode::Strict),
            psnr_threshold: Some(40.0),
            max_pages: Some(2),
            ..GateArgs::default()
        };
        let config = args.load().unwrap();
        assert!(config.ssim_enabled && config.lpips_enabled);
        assert_eq!(config.aggregation, AggregationMode::Strict);
        assert_eq!(config.psnr_threshold, 40.0);
        assert_eq!(config.max_pages_to_check, 2);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = GateArgs {
            dpi: Some(0),
            ..GateArgs::default()
        };
        assert!(args.load().is_err());
    }

    #[test]
    fn test_config_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gates.json");
        std::fs::write(&path, r#"{"ssim_threshold": 0.9, "fail_on_any_gate": true}"#).unwrap();

        let args = GateArgs {
            config: Some(path),
            ssim_threshold: Some(0.95),
            ..GateArgs::default()
        };
        let config = args.load().unwrap();
        assert!(config.ssim_enabled);
        assert_eq!(config.ssim_threshold, 0.95);
        assert_eq!(config.aggregation, AggregationMode::Strict);
    }
}
