//! Benchmark command: run the pipeline over a dataset and summarize.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use pdf_squeeze::{BatchReport, Compressor, CompressorConfig, MetricKind};

use super::GateArgs;

pub fn run(
    dataset: PathBuf,
    output: Option<PathBuf>,
    report: Option<PathBuf>,
    jobs: usize,
    no_gates: bool,
    gates: &GateArgs,
) -> Result<ExitCode> {
    let config = gates.load()?;
    let tools = gates.tools(&config);

    // Outputs go to a scratch directory unless one is given.
    let scratch = tempfile::Builder::new().prefix("pdf-squeeze-bench-").tempdir()?;
    let output_dir = output.unwrap_or_else(|| scratch.path().to_path_buf());

    let settings = CompressorConfig::builder()
        .input_dir(&dataset)
        .output_dir(&output_dir)
        .move_processed(false)
        .jobs(jobs)
        .gates_enabled(!no_gates)
        .config(config)
        .build();

    let batch = Compressor::new(settings, tools)
        .compress_dir()
        .with_context(|| format!("Failed to benchmark {}", dataset.display()))?;

    if batch.files.is_empty() {
        println!("No PDF files found in {}", dataset.display());
        return Ok(ExitCode::SUCCESS);
    }

    print_benchmark(&batch);

    if let Some(path) = report {
        batch
            .write_json(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Report: {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

fn print_benchmark(batch: &BatchReport) {
    println!("Benchmark Results:");
    println!("{:-<60}", "");
    println!(
        "Files: {} ({} ok, {} failed)",
        batch.files.len(),
        batch.succeeded(),
        batch.failed()
    );
    println!(
        "Total: {} -> {} bytes ({:.1}%)",
        batch.total_original(),
        batch.total_final(),
        batch.reduction_percent()
    );

    if let Some(summary) = batch.reduction_summary() {
        println!("Reduction (%):");
        println!("  Mean: {:.1}, Median: {:.1}", summary.mean, summary.median);
        println!("  Min: {:.1}, Max: {:.1}", summary.min, summary.max);
        println!("  StdDev: {:.1}", summary.std_dev);
    }

    if let Some(psnr) = batch.mean_metric(MetricKind::Psnr) {
        println!("Mean PSNR: {psnr:.2} dB");
    }
    if let Some(ssim) = batch.mean_metric(MetricKind::Ssim) {
        println!("Mean SSIM: {ssim:.4}");
    }
    if let Some(lpips) = batch.mean_metric(MetricKind::Lpips) {
        println!("Mean LPIPS: {lpips:.4}");
    }

    let elapsed: Vec<f64> = batch
        .files
        .iter()
        .filter_map(pdf_squeeze::FileOutcome::summary)
        .map(|s| s.elapsed.as_secs_f64())
        .collect();
    if let Some(summary) = pdf_squeeze::Summary::compute(&elapsed) {
        println!("Time per file (s): mean {:.2}, max {:.2}", summary.mean, summary.max);
    }

    println!();
    println!("Winning strategies:");
    for (method, count) in batch.winner_frequency() {
        println!("  {method:<18} {count}");
    }
}
