//! Quality metrics for comparing rasterized PDF pages.
//!
//! Supported metrics:
//!
//! - **PSNR**: Peak Signal-to-Noise Ratio in dB (higher is better)
//! - **SSIM**: Structural similarity derived from `dssim-core` (higher is better, 1 = identical)
//! - **LPIPS**: Learned perceptual distance from an external scorer (lower is better)
//!
//! ## Typical thresholds
//!
//! | Metric | Default gate | Meaning |
//! |--------|--------------|---------|
//! | PSNR   | >= 35 dB     | Differences hard to see at normal zoom |
//! | SSIM   | >= 0.85      | Structure preserved |
//! | LPIPS  | <= 0.15      | Perceptually close |

pub mod lpips;
pub mod ssim;

use imgref::ImgVec;
use rgb::RGB8;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// PSNR reported for pixel-identical pages.
///
/// Kept finite so per-page scores can be averaged.
pub const IDENTICAL_PSNR: f64 = 100.0;

/// A quality metric that can back a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Peak signal-to-noise ratio.
    Psnr,
    /// Structural similarity.
    Ssim,
    /// Learned perceptual image patch similarity.
    Lpips,
}

impl MetricKind {
    /// All metrics in evaluation order.
    pub const ALL: [MetricKind; 3] = [Self::Psnr, Self::Ssim, Self::Lpips];

    /// Lowercase identifier used in reports and config keys.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Psnr => "psnr",
            Self::Ssim => "ssim",
            Self::Lpips => "lpips",
        }
    }

    /// Whether larger values mean better quality.
    #[must_use]
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Self::Lpips)
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Psnr => write!(f, "PSNR"),
            Self::Ssim => write!(f, "SSIM"),
            Self::Lpips => write!(f, "LPIPS"),
        }
    }
}

/// Configuration for which metrics to calculate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Calculate PSNR.
    pub psnr: bool,
    /// Calculate SSIM.
    pub ssim: bool,
    /// Calculate LPIPS.
    pub lpips: bool,
}

impl MetricConfig {
    /// PSNR only.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            psnr: true,
            ssim: false,
            lpips: false,
        }
    }

    /// Whether a given metric is switched on.
    #[must_use]
    pub fn is_enabled(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Psnr => self.psnr,
            MetricKind::Ssim => self.ssim,
            MetricKind::Lpips => self.lpips,
        }
    }

    /// Switch a metric off.
    pub fn disable(&mut self, kind: MetricKind) {
        match kind {
            MetricKind::Psnr => self.psnr = false,
            MetricKind::Ssim => self.ssim = false,
            MetricKind::Lpips => self.lpips = false,
        }
    }

    /// True when no metric is enabled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !(self.psnr || self.ssim || self.lpips)
    }

    /// Enabled metrics in evaluation order.
    pub fn enabled(&self) -> impl Iterator<Item = MetricKind> + '_ {
        MetricKind::ALL.into_iter().filter(move |k| self.is_enabled(*k))
    }
}

/// Metric values for one sampled page (0-based index).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageMetrics {
    /// Page index in the original document.
    pub page: usize,
    /// PSNR in dB.
    pub psnr: Option<f64>,
    /// SSIM in 0..=1.
    pub ssim: Option<f64>,
    /// LPIPS distance.
    pub lpips: Option<f64>,
}

impl PageMetrics {
    /// Create an empty record for `page`.
    #[must_use]
    pub fn new(page: usize) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    /// Value of one metric on this page.
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Psnr => self.psnr,
            MetricKind::Ssim => self.ssim,
            MetricKind::Lpips => self.lpips,
        }
    }

    /// Store one metric value.
    pub fn set(&mut self, kind: MetricKind, value: f64) {
        match kind {
            MetricKind::Psnr => self.psnr = Some(value),
            MetricKind::Ssim => self.ssim = Some(value),
            MetricKind::Lpips => self.lpips = Some(value),
        }
    }
}

/// Document-level metric values, averaged over sampled pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricResult {
    /// Mean PSNR in dB (higher is better).
    pub psnr: Option<f64>,
    /// Mean SSIM (higher is better).
    pub ssim: Option<f64>,
    /// Mean LPIPS (lower is better).
    pub lpips: Option<f64>,
}

impl MetricResult {
    /// Average each metric over the pages that report it.
    #[must_use]
    pub fn average(pages: &[PageMetrics]) -> Self {
        let mean_of = |kind: MetricKind| {
            let values: Vec<f64> = pages.iter().filter_map(|p| p.get(kind)).collect();
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        Self {
            psnr: mean_of(MetricKind::Psnr),
            ssim: mean_of(MetricKind::Ssim),
            lpips: mean_of(MetricKind::Lpips),
        }
    }

    /// Value of one metric.
    #[must_use]
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        match kind {
            MetricKind::Psnr => self.psnr,
            MetricKind::Ssim => self.ssim,
            MetricKind::Lpips => self.lpips,
        }
    }
}

/// Calculate PSNR between two RGB8 images of equal size.
///
/// Returns [`IDENTICAL_PSNR`] when the images are identical.
///
/// # Errors
///
/// Returns an error if the dimensions differ or the images are empty.
pub fn calculate_psnr(reference: &ImgVec<RGB8>, test: &ImgVec<RGB8>) -> Result<f64> {
    ensure_same_size("PSNR", reference, test)?;

    let mut mse_sum: f64 = 0.0;
    let sample_count = (reference.width() * reference.height() * 3) as f64;

    for (r, t) in reference.pixels().zip(test.pixels()) {
        for (a, b) in [(r.r, t.r), (r.g, t.g), (r.b, t.b)] {
            let diff = f64::from(a) - f64::from(b);
            mse_sum += diff * diff;
        }
    }

    let mse = mse_sum / sample_count;

    if mse == 0.0 {
        Ok(IDENTICAL_PSNR)
    } else {
        Ok(10.0 * (255.0_f64 * 255.0 / mse).log10())
    }
}

/// Crop both images to their common top-left region.
///
/// Rasterized pages can differ by a pixel or two when a compressor rewrites
/// the media box; metrics are computed on the overlap.
#[must_use]
pub fn crop_to_common(a: &ImgVec<RGB8>, b: &ImgVec<RGB8>) -> (ImgVec<RGB8>, ImgVec<RGB8>) {
    let width = a.width().min(b.width());
    let height = a.height().min(b.height());

    let crop = |img: &ImgVec<RGB8>| {
        let pixels: Vec<RGB8> = img.sub_image(0, 0, width, height).pixels().collect();
        ImgVec::new(pixels, width, height)
    };

    (crop(a), crop(b))
}

pub(crate) fn ensure_same_size(metric: &str, reference: &ImgVec<RGB8>, test: &ImgVec<RGB8>) -> Result<()> {
    if reference.width() != test.width() || reference.height() != test.height() {
        return Err(Error::MetricCalculation {
            metric: metric.to_string(),
            reason: format!(
                "dimension mismatch: {}x{} vs {}x{}",
                reference.width(),
                reference.height(),
                test.width(),
                test.height()
            ),
        });
    }
    if reference.width() == 0 || reference.height() == 0 {
        return Err(Error::MetricCalculation {
            metric: metric.to_string(),
            reason: "empty image".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn solid(width: usize, height: usize, value: u8) -> ImgVec<RGB8> {
    ImgVec::new(vec![RGB8::new(value, value, value); width * height], width, height)
}
