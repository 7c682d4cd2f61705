//! Quality gates: threshold checks on metric scores and their aggregation.
//!
//! - [`AggregationMode`]: how per-gate results combine into pass/fail
//! - [`GateCheck`]: one metric compared against its threshold
//! - [`QualityGateResult`]: everything known about one candidate's quality
//! - [`checker`]: rasterizes PDFs and produces results

pub mod checker;

pub use checker::{QualityEvaluator, QualityGateChecker};

use std::fmt::Write as _;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::metrics::{MetricKind, MetricResult, PageMetrics};

/// Rule for combining individual gate results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationMode {
    /// More than half of the evaluated gates must pass.
    #[default]
    Majority,
    /// Every evaluated gate must pass.
    Strict,
    /// At least one evaluated gate must pass.
    Permissive,
}

impl AggregationMode {
    /// Combine gate counts into an overall decision.
    ///
    /// With no evaluated gates there is nothing to object, so the result is a pass.
    #[must_use]
    pub fn aggregate(self, passed: usize, evaluated: usize) -> bool {
        if evaluated == 0 {
            return true;
        }
        match self {
            Self::Majority => passed * 2 > evaluated,
            Self::Strict => passed == evaluated,
            Self::Permissive => passed > 0,
        }
    }

    /// Map the two legacy booleans onto a mode.
    ///
    /// `fail_on_any_gate` takes precedence over `require_majority`.
    #[must_use]
    pub fn from_legacy_flags(fail_on_any_gate: bool, require_majority: bool) -> Self {
        if fail_on_any_gate {
            Self::Strict
        } else if require_majority {
            Self::Majority
        } else {
            Self::Permissive
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Majority => write!(f, "majority"),
            Self::Strict => write!(f, "strict"),
            Self::Permissive => write!(f, "permissive"),
        }
    }
}

impl FromStr for AggregationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "majority" => Ok(Self::Majority),
            "strict" | "all" => Ok(Self::Strict),
            "permissive" | "any" => Ok(Self::Permissive),
            other => Err(Error::config(
                "aggregation",
                format!("unknown mode '{other}' (expected majority, strict or permissive)"),
            )),
        }
    }
}

/// One metric compared against its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateCheck {
    /// Metric behind this gate.
    pub metric: MetricKind,
    /// Measured value (averaged over sampled pages).
    pub value: f64,
    /// Configured threshold.
    pub threshold: f64,
    /// Whether the value is on the good side of the threshold.
    pub passed: bool,
}

impl GateCheck {
    /// Compare `value` with `threshold` in the metric's direction.
    ///
    /// Thresholds are inclusive: PSNR/SSIM pass at `>=`, LPIPS at `<=`.
    #[must_use]
    pub fn evaluate(metric: MetricKind, value: f64, threshold: f64) -> Self {
        let passed = if metric.higher_is_better() {
            value >= threshold
        } else {
            value <= threshold
        };
        Self {
            metric,
            value,
            threshold,
            passed,
        }
    }
}

/// Quality verdict for one candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityGateResult {
    /// Gates that produced a value.
    pub checks: Vec<GateCheck>,
    /// Per-page metric values.
    pub pages: Vec<PageMetrics>,
    /// Aggregation rule applied.
    pub mode: AggregationMode,
    /// Overall decision.
    pub passed: bool,
    /// Set when evaluation itself failed; the candidate is then rejected.
    pub error: Option<String>,
}

impl QualityGateResult {
    /// Aggregate completed checks under `mode`.
    #[must_use]
    pub fn from_checks(checks: Vec<GateCheck>, pages: Vec<PageMetrics>, mode: AggregationMode) -> Self {
        let passed_count = checks.iter().filter(|c| c.passed).count();
        let passed = mode.aggregate(passed_count, checks.len());
        Self {
            checks,
            pages,
            mode,
            passed,
            error: None,
        }
    }

    /// Result for a candidate whose evaluation could not complete.
    #[must_use]
    pub fn evaluation_failed(reason: impl Into<String>, mode: AggregationMode) -> Self {
        Self {
            checks: Vec::new(),
            pages: Vec::new(),
            mode,
            passed: false,
            error: Some(reason.into()),
        }
    }

    /// Metrics that were evaluated.
    #[must_use]
    pub fn gates_evaluated(&self) -> Vec<MetricKind> {
        self.checks.iter().map(|c| c.metric).collect()
    }

    /// Metrics whose gate passed.
    #[must_use]
    pub fn gates_passed(&self) -> Vec<MetricKind> {
        self.checks.iter().filter(|c| c.passed).map(|c| c.metric).collect()
    }

    /// Metrics whose gate failed.
    #[must_use]
    pub fn gates_failed(&self) -> Vec<MetricKind> {
        self.checks.iter().filter(|c| !c.passed).map(|c| c.metric).collect()
    }

    /// Check for a specific metric, if it was evaluated.
    #[must_use]
    pub fn check(&self, metric: MetricKind) -> Option<&GateCheck> {
        self.checks.iter().find(|c| c.metric == metric)
    }

    /// Averaged metric values.
    #[must_use]
    pub fn metrics(&self) -> MetricResult {
        let value = |kind| self.check(kind).map(|c| c.value);
        MetricResult {
            psnr: value(MetricKind::Psnr),
            ssim: value(MetricKind::Ssim),
            lpips: value(MetricKind::Lpips),
        }
    }

    /// Human-readable assessment report.
    #[must_use]
    pub fn render_report(&self) -> String {
        let mut out = String::new();
        let verdict = if self.passed { "PASS" } else { "FAIL" };

        let _ = writeln!(out, "PDF Quality Assessment Report");
        let _ = writeln!(out, "{}", "=".repeat(40));
        let _ = writeln!(out, "Overall Result: {verdict} ({} mode)", self.mode);
        if let Some(ref error) = self.error {
            let _ = writeln!(out, "Evaluation error: {error}");
        }
        let _ = writeln!(out);

        for check in &self.checks {
            let status = if check.passed { "PASS" } else { "FAIL" };
            let _ = match check.metric {
                MetricKind::Psnr => writeln!(
                    out,
                    "PSNR: {:.2} dB (threshold: {}) - {status}",
                    check.value, check.threshold
                ),
                metric => writeln!(
                    out,
                    "{metric}: {:.3} (threshold: {}) - {status}",
                    check.value, check.threshold
                ),
            };
        }

        let join = |kinds: Vec<MetricKind>| {
            kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(", ")
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "Gates evaluated: {}", join(self.gates_evaluated()));
        let _ = writeln!(out, "Gates passed: {}", join(self.gates_passed()));
        let _ = writeln!(out, "Gates failed: {}", join(self.gates_failed()));

        if !self.pages.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Per-page metrics:");
            for page in &self.pages {
                let mut line = format!("  Page {}:", page.page + 1);
                if let Some(psnr) = page.psnr {
                    let _ = write!(line, " PSNR={psnr:.1}");
                }
                if let Some(ssim) = page.ssim {
                    let _ = write!(line, " SSIM={ssim:.3}");
                }
                if let Some(lpips) = page.lpips {
                    let _ = write!(line, " LPIPS={lpips:.3}");
                }
                let _ = writeln!(out, "{line}");
            }
        }

        out
    }
}
