//! Batch compression command.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use pdf_squeeze::{Compressor, CompressorConfig};

use super::GateArgs;

pub fn run(
    input: PathBuf,
    output: PathBuf,
    keep_input: bool,
    jobs: usize,
    report_dir: Option<PathBuf>,
    no_gates: bool,
    gates: &GateArgs,
) -> Result<ExitCode> {
    let config = gates.load()?;
    let tools = gates.tools(&config);

    let settings = CompressorConfig::builder()
        .input_dir(&input)
        .output_dir(&output)
        .move_processed(!keep_input)
        .jobs(jobs)
        .gates_enabled(!no_gates)
        .config(config)
        .build();

    let compressor = Compressor::new(settings, tools);
    let strategies = compressor.strategy_ids();
    if strategies.is_empty() {
        log::warn!("no compression tools found; every file will be copied unchanged");
    } else {
        log::info!("strategies: {}", strategies.join(", "));
    }

    let report = compressor
        .compress_dir()
        .with_context(|| format!("Failed to process {}", input.display()))?;

    if report.files.is_empty() {
        println!("No PDF files found in {}", input.display());
        return Ok(ExitCode::SUCCESS);
    }

    print!("{}", report.render_table());

    if let Some(dir) = report_dir {
        let (json, csv) = report
            .write_to_dir(&dir)
            .with_context(|| format!("Failed to write reports to {}", dir.display()))?;
        println!("Reports: {} and {}", json.display(), csv.display());
    }

    Ok(if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
