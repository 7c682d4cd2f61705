//! Choosing which compressed candidate to keep.
//!
//! A candidate is eligible when it is strictly smaller than the original and
//! its quality gate passed (or no gate was run). The smallest eligible
//! candidate wins; ties go to the earlier candidate. When nothing is
//! eligible the original is kept, so the output is never larger than the
//! input.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::gate::QualityGateResult;

/// One compression attempt's output.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    /// Strategy that produced it.
    pub method: String,
    /// Location of the candidate file.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
    /// Quality verdict, if gates were evaluated.
    pub gate: Option<QualityGateResult>,
}

impl Candidate {
    /// Candidate with a known size and no gate result yet.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            size,
            gate: None,
        }
    }

    /// Candidate for a file on disk, sized from its metadata.
    pub fn from_file(method: impl Into<String>, path: &Path) -> Result<Self> {
        let size = std::fs::metadata(path)?.len();
        Ok(Self::new(method, path, size))
    }

    /// Attach a gate result.
    #[must_use]
    pub fn with_gate(mut self, gate: QualityGateResult) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Whether the quality gate allows this candidate. Ungated candidates pass.
    #[must_use]
    pub fn passes_gate(&self) -> bool {
        self.gate.as_ref().is_none_or(|g| g.passed)
    }

    /// Size reduction relative to `original_size`, in percent.
    #[must_use]
    pub fn reduction_percent(&self, original_size: u64) -> f64 {
        reduction_percent(original_size, self.size)
    }

    fn is_eligible(&self, original_size: u64) -> bool {
        self.size < original_size && self.passes_gate()
    }
}

/// Result of a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The candidate at this index is kept.
    Chosen(usize),
    /// No candidate qualified; the original is kept unchanged.
    OriginalRetained,
}

impl Selection {
    /// Index of the chosen candidate.
    #[must_use]
    pub fn chosen(self) -> Option<usize> {
        match self {
            Self::Chosen(i) => Some(i),
            Self::OriginalRetained => None,
        }
    }

    /// True for the never-worse fallback.
    #[must_use]
    pub fn is_original_retained(self) -> bool {
        self == Self::OriginalRetained
    }
}

/// Pick the smallest eligible candidate from already-gated candidates.
#[must_use]
pub fn select(original_size: u64, candidates: &[Candidate]) -> Selection {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_eligible(original_size))
        .min_by_key(|&(i, c)| (c.size, i))
        .map_or(Selection::OriginalRetained, |(i, _)| Selection::Chosen(i))
}

/// Pick a candidate, evaluating quality gates only as far as needed.
///
/// Candidates not smaller than the original are never evaluated. The rest
/// are evaluated smallest first and the first one that passes is chosen.
/// Gate results are stored on the candidates that were evaluated, so the
/// outcome always agrees with [`select`] on the same slice.
pub fn select_lazy<F>(original_size: u64, candidates: &mut [Candidate], mut evaluate: F) -> Selection
where
    F: FnMut(&Candidate) -> QualityGateResult,
{
    let mut order: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].size < original_size)
        .collect();
    order.sort_by_key(|&i| (candidates[i].size, i));

    for i in order {
        let candidate = &mut candidates[i];
        if candidate.gate.is_none() {
            let gate = evaluate(candidate);
            log::debug!(
                "{}: {} bytes, gate {}",
                candidate.method,
                candidate.size,
                if gate.passed { "passed" } else { "failed" }
            );
            candidate.gate = Some(gate);
        }
        if candidate.passes_gate() {
            return Selection::Chosen(i);
        }
    }

    Selection::OriginalRetained
}

/// Percentage by which `final_size` is smaller than `original_size`.
///
/// Zero for an empty original.
#[must_use]
pub fn reduction_percent(original_size: u64, final_size: u64) -> f64 {
    if original_size == 0 {
        return 0.0;
    }
    (original_size as f64 - final_size as f64) / original_size as f64 * 100.0
}
