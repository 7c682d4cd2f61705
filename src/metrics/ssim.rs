//! SSIM calculation via `dssim-core`.
//!
//! `dssim-core` reports structural *dis*similarity, `DSSIM = 1/SSIM - 1`
//! (0 = identical). Gates are configured in SSIM terms, so the value is
//! converted back before it is returned.

use dssim_core::Dssim;
use imgref::ImgVec;
use rgb::{RGB8, RGBA};

use crate::error::{Error, Result};
use crate::metrics::ensure_same_size;

/// Calculate SSIM between two RGB8 images of equal size.
///
/// # Returns
///
/// SSIM in `0.0..=1.0`, where 1 means identical.
///
/// # Errors
///
/// Returns an error if the images have different dimensions or if DSSIM
/// calculation fails.
pub fn calculate_ssim(reference: &ImgVec<RGB8>, test: &ImgVec<RGB8>) -> Result<f64> {
    ensure_same_size("SSIM", reference, test)?;

    let dssim = Dssim::new();

    let ref_image = dssim
        .create_image(&rgb8_to_linear_rgba(reference))
        .ok_or_else(|| Error::MetricCalculation {
            metric: "SSIM".to_string(),
            reason: "Failed to create reference image".to_string(),
        })?;

    let test_image = dssim
        .create_image(&rgb8_to_linear_rgba(test))
        .ok_or_else(|| Error::MetricCalculation {
            metric: "SSIM".to_string(),
            reason: "Failed to create test image".to_string(),
        })?;

    let (dssim_val, _ssim_maps) = dssim.compare(&ref_image, test_image);

    Ok(ssim_from_dssim(f64::from(dssim_val)))
}

/// Convert a DSSIM value to SSIM.
#[must_use]
pub fn ssim_from_dssim(dssim: f64) -> f64 {
    1.0 / (1.0 + dssim.max(0.0))
}

/// Convert an sRGB image to linear-light RGBA, the input `dssim-core` expects.
fn rgb8_to_linear_rgba(img: &ImgVec<RGB8>) -> ImgVec<RGBA<f32>> {
    let pixels: Vec<RGBA<f32>> = img
        .pixels()
        .map(|p| RGBA::new(srgb_to_linear(p.r), srgb_to_linear(p.g), srgb_to_linear(p.b), 1.0))
        .collect();
    ImgVec::new(pixels, img.width(), img.height())
}

#[inline]
fn srgb_to_linear(srgb: u8) -> f32 {
    let s = f32::from(srgb) / 255.0;
    if s <= 0.04045 {
        s / 12.92
    } else {
        ((s + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::solid;

    fn gradient(width: usize, height: usize, offset: u8) -> ImgVec<RGB8> {
        let pixels = (0..width * height)
            .map(|i| {
                let v = ((i % width) * 255 / width) as u8;
                let v = v.saturating_add(offset);
                RGB8::new(v, v / 2, 255 - v)
            })
            .collect();
        ImgVec::new(pixels, width, height)
    }

    #[test]
    fn test_identical_images() {
        let img = gradient(64, 64, 0);
        let ssim = calculate_ssim(&img, &img).unwrap();
        assert!(ssim > 0.9999, "Identical images should have SSIM ~1, got {ssim}");
    }

    #[test]
    fn test_different_images() {
        let a = solid(64, 64, 60);
        let b = gradient(64, 64, 40);
        let ssim = calculate_ssim(&a, &b).unwrap();
        assert!(ssim < 1.0);
        assert!(ssim > 0.0);
    }

    #[test]
    fn test_dimension_mismatch() {
        let result = calculate_ssim(&solid(32, 32, 0), &solid(64, 64, 0));
        assert!(matches!(result, Err(Error::MetricCalculation { .. })));
    }

    #[test]
    fn test_ssim_from_dssim() {
        assert_eq!(ssim_from_dssim(0.0), 1.0);
        assert!((ssim_from_dssim(1.0) - 0.5).abs() < 1e-12);
        assert_eq!(ssim_from_dssim(-0.1), 1.0);
    }

    #[test]
    fn test_srgb_to_linear_endpoints() {
        assert_eq!(srgb_to_linear(0), 0.0);
        assert!((srgb_to_linear(255) - 1.0).abs() < 1e-6);
    }
}
