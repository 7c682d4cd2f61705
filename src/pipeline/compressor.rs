//! Per-file compression and directory batches.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::gate::{QualityEvaluator, QualityGateChecker};
use crate::pipeline::report::{BatchReport, CandidateSummary, FileOutcome, FileSummary, NO_CHANGE};
use crate::pipeline::CompressorConfig;
use crate::scan;
use crate::select::{Candidate, Selection, reduction_percent, select, select_lazy};
use crate::strategy::{Strategy, builtin_strategies};
use crate::tools::Tools;

/// Name of the directory receiving processed inputs.
pub const PROCESSED_DIR: &str = "processed";

/// Runs every available strategy on a file and keeps the best safe result.
pub struct Compressor {
    settings: CompressorConfig,
    tools: Tools,
    strategies: Vec<Box<dyn Strategy>>,
    evaluator: Option<Box<dyn QualityEvaluator>>,
}

impl Compressor {
    /// Create a compressor with the built-in strategies and, when gates are
    /// enabled, a [`QualityGateChecker`].
    #[must_use]
    pub fn new(settings: CompressorConfig, tools: Tools) -> Self {
        let evaluator: Option<Box<dyn QualityEvaluator>> = if settings.gates_enabled {
            Some(Box::new(QualityGateChecker::new(&settings.config, &tools)))
        } else {
            None
        };
        let strategies = builtin_strategies(&settings.config);
        Self {
            settings,
            tools,
            strategies,
            evaluator,
        }
    }

    /// Replace the strategy list.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Replace the quality evaluator. Has no effect when gates are disabled.
    #[must_use]
    pub fn with_evaluator(mut self, evaluator: Box<dyn QualityEvaluator>) -> Self {
        if self.settings.gates_enabled {
            self.evaluator = Some(evaluator);
        }
        self
    }

    /// Settings in use.
    #[must_use]
    pub fn settings(&self) -> &CompressorConfig {
        &self.settings
    }

    /// Identifiers of the strategies that can run with the detected tools.
    #[must_use]
    pub fn strategy_ids(&self) -> Vec<&str> {
        self.available().map(|s| s.id()).collect()
    }

    fn available(&self) -> impl Iterator<Item = &Box<dyn Strategy>> {
        self.strategies
            .iter()
            .filter(|s| s.is_available(&self.tools))
    }

    /// Where the output for `input` is written when it is compressed alone.
    #[must_use]
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        self.settings
            .output_dir
            .join(output_name(input, &self.settings.suffix, 1))
    }

    /// Output paths for a batch, one per input and pairwise distinct.
    ///
    /// Inputs whose stems clash (`scan.pdf` and `scan.PDF`) get a numeric
    /// tag, compared case-insensitively so case-folding filesystems are
    /// safe too. The first input in order keeps the plain name.
    #[must_use]
    pub fn plan_outputs(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut taken = HashSet::new();
        inputs
            .iter()
            .map(|input| {
                let name = (1..)
                    .map(|n| output_name(input, &self.settings.suffix, n))
                    .find(|name| taken.insert(name.to_lowercase()))
                    .unwrap_or_default();
                self.settings.output_dir.join(name)
            })
            .collect()
    }

    /// Compress one PDF into [`Self::output_path_for`].
    ///
    /// The output is always written: either the winning candidate or an
    /// unchanged copy of the input. Strategy failures only remove that
    /// candidate from consideration.
    pub fn compress_file(&self, input: &Path) -> Result<FileSummary> {
        self.compress_file_to(input, &self.output_path_for(input))
    }

    /// Compress one PDF into `output`.
    pub fn compress_file_to(&self, input: &Path, output: &Path) -> Result<FileSummary> {
        let start = Instant::now();
        if !input.is_file() {
            return Err(Error::InvalidInput(format!("{} is not a file", input.display())));
        }
        let original_size = fs::metadata(input)?.len();
        log::info!("compressing {} ({original_size} bytes)", input.display());

        let workdir = tempfile::Builder::new().prefix("pdf-squeeze-").tempdir()?;
        let mut candidates = self.run_strategies(input, workdir.path());

        let selection = match self.evaluator {
            Some(ref evaluator) => select_lazy(original_size, &mut candidates, |c| {
                evaluator.evaluate(input, &c.path)
            }),
            None => select(original_size, &candidates),
        };

        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let winner = selection.chosen().map(|i| &candidates[i]);
        let source = winner.map_or(input, |c| c.path.as_path());
        fs::copy(source, output)?;
        let final_size = fs::metadata(output)?.len();

        let gate = winner.and_then(|c| c.gate.as_ref());
        let summary = FileSummary {
            original_file: input.to_path_buf(),
            final_file: output.to_path_buf(),
            original_size,
            final_size,
            reduction_percent: reduction_percent(original_size, final_size),
            winner: winner.map_or_else(|| NO_CHANGE.to_string(), |c| c.method.clone()),
            metrics: gate.map(|g| g.metrics()).unwrap_or_default(),
            gates_passed: gate.map(|g| g.gates_passed()).unwrap_or_default(),
            gates_failed: gate.map(|g| g.gates_failed()).unwrap_or_default(),
            candidates: candidates.iter().map(CandidateSummary::from).collect(),
            elapsed: start.elapsed(),
        };

        match selection {
            Selection::Chosen(_) => log::info!(
                "{}: {} won, {:.1}% smaller",
                input.display(),
                summary.winner,
                summary.reduction_percent
            ),
            Selection::OriginalRetained => {
                log::info!("{}: no candidate qualified, original kept", input.display());
            }
        }

        Ok(summary)
    }

    fn run_strategies(&self, input: &Path, workdir: &Path) -> Vec<Candidate> {
        let mut candidates = Vec::new();
        let timeout = self.settings.config.tool_timeout();
        let mut scanned = None;

        for strategy in self.available() {
            if strategy.scanned_only() {
                let is_scanned =
                    *scanned.get_or_insert_with(|| scan::is_scanned(&self.tools, input, timeout));
                if !is_scanned {
                    log::debug!("{}: skipped, {} is not a scan", strategy.id(), input.display());
                    continue;
                }
            }
            let output = workdir.join(format!("{}.pdf", strategy.id()));
            if let Err(e) = strategy.run(&self.tools, input, &output, timeout) {
                log::warn!("{} failed on {}: {e}", strategy.id(), input.display());
                continue;
            }
            match Candidate::from_file(strategy.id(), &output) {
                Ok(candidate) if candidate.size > 0 => {
                    log::debug!("{}: {} bytes", strategy.id(), candidate.size);
                    candidates.push(candidate);
                }
                Ok(_) => log::warn!("{} produced an empty file", strategy.id()),
                Err(e) => log::warn!("{} produced no output: {e}", strategy.id()),
            }
        }

        if candidates.is_empty() {
            log::warn!("no candidates produced for {}", input.display());
        }
        candidates
    }

    /// Compress every PDF in the input directory.
    pub fn compress_dir(&self) -> Result<BatchReport> {
        let inputs = discover_inputs(&self.settings.input_dir)?;
        let name = format!("pdf-squeeze-{}", chrono::Utc::now().format("%Y%m%d-%H%M%S"));

        if inputs.is_empty() {
            log::info!("no PDF files found in {}", self.settings.input_dir.display());
            return Ok(BatchReport::new(name, Vec::new()));
        }
        log::info!("found {} PDF file(s)", inputs.len());

        let outputs = self.plan_outputs(&inputs);
        let work: Vec<(&PathBuf, &PathBuf)> = inputs.iter().zip(&outputs).collect();

        let outcomes: Vec<FileOutcome> = if self.settings.jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.settings.jobs)
                .build()
                .map_err(|e| Error::config("jobs", e.to_string()))?;
            pool.install(|| {
                work.par_iter()
                    .map(|(path, output)| self.process(path, output))
                    .collect()
            })
        } else {
            work.iter().map(|(path, output)| self.process(path, output)).collect()
        };

        Ok(BatchReport::new(name, outcomes))
    }

    fn process(&self, path: &Path, output: &Path) -> FileOutcome {
        match self.compress_file_to(path, output) {
            Ok(summary) => {
                if self.settings.move_processed {
                    if let Err(e) = move_to_processed(&self.settings.input_dir, path) {
                        log::warn!("could not move {}: {e}", path.display());
                    }
                }
                FileOutcome::Compressed(summary)
            }
            Err(e) => {
                log::error!("{}: {e}", path.display());
                FileOutcome::Failed {
                    file: path.to_path_buf(),
                    error: e.to_string(),
                }
            }
        }
    }
}

/// `<stem><suffix>.pdf`, with `-<n>` after the stem for `n > 1`.
fn output_name(input: &Path, suffix: &str, n: usize) -> String {
    let stem = input
        .file_stem()
        .map_or_else(|| "document".into(), |s| s.to_string_lossy());
    if n == 1 {
        format!("{stem}{suffix}.pdf")
    } else {
        format!("{stem}-{n}{suffix}.pdf")
    }
}

/// PDF files directly inside `dir` (extension matched case-insensitively),
/// sorted by path.
pub fn discover_inputs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::InvalidInput(format!(
            "input directory {} does not exist",
            dir.display()
        )));
    }

    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Move `file` into `<input_dir>/processed/`, copying when a rename is not
/// possible (e.g., across filesystems).
fn move_to_processed(input_dir: &Path, file: &Path) -> Result<PathBuf> {
    let dir = input_dir.join(PROCESSED_DIR);
    fs::create_dir_all(&dir)?;
    let name = file
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("{} has no file name", file.display())))?;
    let dest = dir.join(name);

    if fs::rename(file, &dest).is_err() {
        fs::copy(file, &dest)?;
        fs::remove_file(file)?;
    }
    log::debug!("moved {} to {}", file.display(), dest.display());
    Ok(dest)
}
