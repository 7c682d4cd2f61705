//! LPIPS scoring through an external command.
//!
//! LPIPS needs a trained network (AlexNet/VGG weights), so it is delegated to
//! a scorer program. The program is called as `<command> <reference.png>
//! <test.png>` and must print the distance as the last non-empty line of
//! standard output.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::exec::run_with_timeout;

/// Name looked up on PATH when no scorer is configured.
pub const DEFAULT_SCORER: &str = "lpips-score";

/// External LPIPS scorer.
#[derive(Debug, Clone)]
pub struct LpipsScorer {
    command: PathBuf,
    timeout: Duration,
}

impl LpipsScorer {
    /// Use the given scorer program.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }

    /// Find a scorer: the configured path if it exists, otherwise
    /// [`DEFAULT_SCORER`] on PATH.
    #[must_use]
    pub fn locate(configured: Option<&Path>, timeout: Duration) -> Option<Self> {
        let command = match configured {
            Some(path) if path.is_file() => path.to_path_buf(),
            Some(path) => which::which(path).ok()?,
            None => which::which(DEFAULT_SCORER).ok()?,
        };
        Some(Self::new(command, timeout))
    }

    /// Path of the scorer program.
    #[must_use]
    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Score one page pair. Lower is better.
    pub fn score(&self, reference_png: &Path, test_png: &Path) -> Result<f64> {
        let mut cmd = Command::new(&self.command);
        cmd.arg(reference_png).arg(test_png);
        let output = run_with_timeout("lpips", &mut cmd, self.timeout)?;
        parse_score(&output.stdout)
    }
}

/// Parse the last non-empty line of scorer output as a distance.
pub fn parse_score(stdout: &str) -> Result<f64> {
    let line = stdout
        .lines()
        .map(str::trim)
        .rev()
        .find(|l| !l.is_empty())
        .ok_or_else(|| Error::MetricCalculation {
            metric: "LPIPS".to_string(),
            reason: "scorer printed nothing".to_string(),
        })?;

    let value: f64 = line.parse().map_err(|_| Error::MetricCalculation {
        metric: "LPIPS".to_string(),
        reason: format!("unparseable scorer output: {line:?}"),
    })?;

    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(Error::MetricCalculation {
            metric: "LPIPS".to_string(),
            reason: format!("distance out of range: {value}"),
        })
    }
}
