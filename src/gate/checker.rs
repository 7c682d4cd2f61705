//! Evaluating a compressed PDF against its original.

use std::path::Path;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::gate::{AggregationMode, GateCheck, QualityGateResult};
use crate::metrics::lpips::LpipsScorer;
use crate::metrics::{
    MetricConfig, MetricKind, MetricResult, PageMetrics, calculate_psnr, crop_to_common, ssim,
};
use crate::raster::{RasterPage, Rasterizer, save_png, select_pages};
use crate::tools::{ToolKind, Tools};

/// Something that can judge a candidate against the original.
///
/// Implementations must not fail: problems evaluating a candidate are
/// reported as a failing [`QualityGateResult`].
pub trait QualityEvaluator: Send + Sync {
    /// Judge `candidate` against `original`.
    fn evaluate(&self, original: &Path, candidate: &Path) -> QualityGateResult;
}

/// Rasterizes both documents and applies the configured metric gates.
pub struct QualityGateChecker {
    config: Config,
    metrics: MetricConfig,
    rasterizer: Option<Rasterizer>,
    lpips: Option<LpipsScorer>,
}

impl QualityGateChecker {
    /// Build a checker, disabling gates whose dependencies are missing.
    #[must_use]
    pub fn new(config: &Config, tools: &Tools) -> Self {
        let mut metrics = config.metric_config();

        let rasterizer = tools
            .path(ToolKind::Ghostscript)
            .map(|gs| {
                Rasterizer::new(gs, config.raster_dpi, config.raster_timeout())
                    .with_qpdf(tools.path(ToolKind::Qpdf))
            });

        let lpips = if metrics.lpips {
            LpipsScorer::locate(config.lpips_command.as_deref(), config.raster_timeout())
        } else {
            None
        };
        if metrics.lpips && lpips.is_none() {
            log::warn!("LPIPS gate disabled: no scorer found (set lpips_command)");
            metrics.disable(MetricKind::Lpips);
        }

        if rasterizer.is_none() && !metrics.is_empty() {
            log::warn!("quality gates disabled: Ghostscript is needed to rasterize pages");
            metrics = MetricConfig::default();
        }

        Self {
            config: config.clone(),
            metrics,
            rasterizer,
            lpips,
        }
    }

    /// Metrics that will actually be evaluated.
    #[must_use]
    pub fn enabled_metrics(&self) -> MetricConfig {
        self.metrics
    }

    /// Aggregation mode in use.
    #[must_use]
    pub fn mode(&self) -> AggregationMode {
        self.config.aggregation
    }

    fn try_evaluate(&self, original: &Path, candidate: &Path) -> Result<QualityGateResult> {
        let Some(ref rasterizer) = self.rasterizer else {
            return Ok(QualityGateResult::from_checks(Vec::new(), Vec::new(), self.mode()));
        };
        if self.metrics.is_empty() {
            return Ok(QualityGateResult::from_checks(Vec::new(), Vec::new(), self.mode()));
        }

        let original_count = rasterizer.page_count(original);
        if let Ok(expected) = original_count {
            match rasterizer.page_count(candidate) {
                Ok(found) if found != expected => {
                    return Err(Error::Rasterize {
                        path: candidate.to_path_buf(),
                        reason: format!("has {found} pages, the original has {expected}"),
                    });
                }
                Ok(_) => {}
                Err(e) => log::debug!("page count unavailable for {}: {e}", candidate.display()),
            }
        }

        let pages = match original_count {
            Ok(total) => select_pages(
                total,
                self.config.max_pages_to_check,
                self.config.page_selection,
                self.config.page_seed,
            ),
            Err(e) => {
                log::debug!("page count unavailable for {}: {e}", original.display());
                (0..self.config.max_pages_to_check).collect()
            }
        };

        let original_pages = rasterizer.rasterize(original, &pages)?;
        let candidate_pages = rasterizer.rasterize(candidate, &pages)?;

        // Every page the original renders must render in the candidate too.
        let mut page_metrics = Vec::with_capacity(original_pages.pages.len());
        for reference in &original_pages.pages {
            let test = candidate_pages.page(reference.index).ok_or_else(|| Error::Rasterize {
                path: candidate.to_path_buf(),
                reason: format!("page {} did not render", reference.index + 1),
            })?;
            page_metrics.push(self.compare_page(reference, test)?);
        }

        let averages = MetricResult::average(&page_metrics);
        let checks = self
            .metrics
            .enabled()
            .filter_map(|kind| {
                averages
                    .get(kind)
                    .map(|value| GateCheck::evaluate(kind, value, self.config.threshold(kind)))
            })
            .collect();

        Ok(QualityGateResult::from_checks(checks, page_metrics, self.mode()))
    }

    fn compare_page(&self, reference: &RasterPage, test: &RasterPage) -> Result<PageMetrics> {
        let (a, b) = crop_to_common(&reference.image, &test.image);
        let mut metrics = PageMetrics::new(reference.index);

        if self.metrics.psnr {
            metrics.set(MetricKind::Psnr, calculate_psnr(&a, &b)?);
        }
        if self.metrics.ssim {
            metrics.set(MetricKind::Ssim, ssim::calculate_ssim(&a, &b)?);
        }
        if let (true, Some(scorer)) = (self.metrics.lpips, &self.lpips) {
            let cropped = a.width() != reference.image.width()
                || a.height() != reference.image.height()
                || b.width() != test.image.width()
                || b.height() != test.image.height();
            let score = if cropped {
                // The scorer sees the same region as PSNR and SSIM.
                let dir = tempfile::Builder::new().prefix("pdf-squeeze-lpips-").tempdir()?;
                let reference_png = dir.path().join("reference.png");
                let test_png = dir.path().join("test.png");
                save_png(&a, &reference_png)?;
                save_png(&b, &test_png)?;
                scorer.score(&reference_png, &test_png)?
            } else {
                scorer.score(&reference.path, &test.path)?
            };
            metrics.set(MetricKind::Lpips, score);
        }

        Ok(metrics)
    }
}

impl QualityEvaluator for QualityGateChecker {
    fn evaluate(&self, original: &Path, candidate: &Path) -> QualityGateResult {
        match self.try_evaluate(original, candidate) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("quality evaluation of {} failed: {e}", candidate.display());
                QualityGateResult::evaluation_failed(e.to_string(), self.mode())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_ghostscript_disables_all_gates() {
        let checker = QualityGateChecker::new(&Config::default(), &Tools::none());
        assert!(checker.enabled_metrics().is_empty());

        let result = checker.evaluate(Path::new("a.pdf"), Path::new("b.pdf"));
        assert!(result.passed);
        assert!(result.checks.is_empty());
    }

    #[test]
    fn test_lpips_without_scorer_is_disabled() {
        let mut config = Config::default();
        config.lpips_enabled = true;
        config.lpips_command = Some("/nonexistent/lpips-xyz".into());
        let tools = Tools::none().with_path(ToolKind::Ghostscript, "/usr/bin/gs");

        let checker = QualityGateChecker::new(&config, &tools);
        let metrics = checker.enabled_metrics();
        assert!(metrics.psnr);
        assert!(metrics.ssim);
        assert!(!metrics.lpips);
    }

    #[test]
    fn test_rasterization_failure_rejects_candidate() {
        let tools = Tools::none().with_path(ToolKind::Ghostscript, "/nonexistent/bin/gs-xyz");
        let checker = QualityGateChecker::new(&Config::default(), &tools);

        let result = checker.evaluate(Path::new("a.pdf"), Path::new("b.pdf"));
        assert!(!result.passed);
        assert!(result.error.is_some());
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Stand-in for Ghostscript. Page count queries run the `count` case arms
    /// against the whole command line; page renders run the `render` arms
    /// against `<file>:<page>` and are expected to copy a PNG to `$out`.
    #[cfg(unix)]
    fn fake_gs(dir: &Path, count: &str, render: &str) -> std::path::PathBuf {
        let body = format!(
            r#"out=""; page=""; file=""
for a; do
  case "$a" in
    -sOutputFile=*) out="${{a#-sOutputFile=}}" ;;
    -dFirstPage=*) page="${{a#-dFirstPage=}}" ;;
    -*) ;;
    *) file="$a" ;;
  esac
done
if [ -z "$out" ]; then
  case "$*" in {count} esac
  exit 0
fi
case "$file:$page" in {render} esac
"#
        );
        script(dir, "gs", &body)
    }

    #[cfg(unix)]
    fn write_page(dir: &Path, name: &str, width: u32, height: u32) -> std::path::PathBuf {
        let path = dir.join(name);
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x * 12) as u8, (y * 18) as u8, 128])
        });
        img.save(&path).unwrap();
        path
    }

    #[cfg(unix)]
    fn strict_psnr() -> Config {
        let mut config = Config::default()
            .psnr_only()
            .with_aggregation(AggregationMode::Strict);
        config.raster_timeout_secs = 10;
        config
    }

    #[cfg(unix)]
    #[test]
    fn test_identical_pages_pass() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_page(dir.path(), "page.png", 16, 12);
        let gs = fake_gs(
            dir.path(),
            "*) echo 5 ;;",
            &format!(r#"*) cp "{}" "$out" ;;"#, png.display()),
        );
        let tools = Tools::none().with_path(ToolKind::Ghostscript, &gs);
        let checker = QualityGateChecker::new(&strict_psnr(), &tools);

        let result = checker.evaluate(Path::new("/docs/orig.pdf"), Path::new("/docs/cand.pdf"));
        assert!(result.passed, "{:?}", result.error);
        assert_eq!(result.pages.len(), 5);
        assert_eq!(result.pages[0].get(MetricKind::Psnr), Some(crate::metrics::IDENTICAL_PSNR));
    }

    #[cfg(unix)]
    #[test]
    fn test_candidate_missing_pages_fails() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_page(dir.path(), "page.png", 16, 12);
        // The candidate only renders its first page
        let gs = fake_gs(
            dir.path(),
            "*) echo 5 ;;",
            &format!(
                r#"*cand.pdf:1) cp "{png}" "$out" ;; *cand.pdf:*) ;; *) cp "{png}" "$out" ;;"#,
                png = png.display()
            ),
        );
        let tools = Tools::none().with_path(ToolKind::Ghostscript, &gs);
        let checker = QualityGateChecker::new(&strict_psnr(), &tools);

        let result = checker.evaluate(Path::new("/docs/orig.pdf"), Path::new("/docs/cand.pdf"));
        assert!(!result.passed);
        let error = result.error.unwrap();
        assert!(error.contains("page 2 did not render"), "{error}");
    }

    #[cfg(unix)]
    #[test]
    fn test_page_count_mismatch_fails() {
        let dir = tempfile::tempdir().unwrap();
        let png = write_page(dir.path(), "page.png", 16, 12);
        let gs = fake_gs(
            dir.path(),
            "*cand.pdf*) echo 3 ;; *) echo 5 ;;",
            &format!(r#"*) cp "{}" "$out" ;;"#, png.display()),
        );
        let tools = Tools::none().with_path(ToolKind::Ghostscript, &gs);
        let checker = QualityGateChecker::new(&strict_psnr(), &tools);

        let result = checker.evaluate(Path::new("/docs/orig.pdf"), Path::new("/docs/cand.pdf"));
        assert!(!result.passed);
        let error = result.error.unwrap();
        assert!(error.contains("has 3 pages, the original has 5"), "{error}");
    }

    #[cfg(unix)]
    #[test]
    fn test_lpips_scores_cropped_pages() {
        let dir = tempfile::tempdir().unwrap();
        let small = write_page(dir.path(), "small.png", 16, 12);
        let large = write_page(dir.path(), "large.png", 20, 14);
        let gs = fake_gs(
            dir.path(),
            "*) echo 1 ;;",
            &format!(
                r#"*cand.pdf:*) cp "{}" "$out" ;; *) cp "{}" "$out" ;;"#,
                large.display(),
                small.display()
            ),
        );
        // Zero distance only for byte-identical PNGs
        let scorer = script(
            dir.path(),
            "lpips-fake",
            "if cmp -s \"$1\" \"$2\"; then echo 0.0; else echo 0.9; fi\n",
        );

        let mut config = strict_psnr();
        config.lpips_enabled = true;
        config.lpips_command = Some(scorer);
        let tools = Tools::none().with_path(ToolKind::Ghostscript, &gs);
        let checker = QualityGateChecker::new(&config, &tools);
        assert!(checker.enabled_metrics().lpips);

        let result = checker.evaluate(Path::new("/docs/orig.pdf"), Path::new("/docs/cand.pdf"));
        assert!(result.passed, "{:?}", result.error);
        assert_eq!(result.pages[0].get(MetricKind::Lpips), Some(0.0));
    }

    #[test]
    fn test_mode_comes_from_config() {
        let config = Config::default().with_aggregation(AggregationMode::Strict);
        let checker = QualityGateChecker::new(&config, &Tools::none());
        assert_eq!(checker.mode(), AggregationMode::Strict);
    }
}
