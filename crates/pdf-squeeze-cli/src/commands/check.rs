//! Quality check for a single original/compressed pair.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use pdf_squeeze::select::reduction_percent;
use pdf_squeeze::{QualityEvaluator, QualityGateChecker, ToolKind};

use super::GateArgs;

pub fn run(original: &Path, compressed: &Path, json: bool, gates: &GateArgs) -> Result<ExitCode> {
    for path in [original, compressed] {
        if !path.is_file() {
            bail!("{} is not a file", path.display());
        }
    }

    let config = gates.load()?;
    let tools = gates.tools(&config);
    tools
        .require(ToolKind::Ghostscript)
        .context("Ghostscript is needed to rasterize pages for comparison")?;

    let checker = QualityGateChecker::new(&config, &tools);
    let result = checker.evaluate(original, compressed);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let original_size = std::fs::metadata(original)?.len();
        let compressed_size = std::fs::metadata(compressed)?.len();
        println!(
            "{} -> {}: {original_size} -> {compressed_size} bytes ({:.1}%)",
            original.display(),
            compressed.display(),
            reduction_percent(original_size, compressed_size)
        );
        println!();
        print!("{}", result.render_report());
    }

    Ok(if result.passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
