//! Tool detection report.

use std::process::ExitCode;

use anyhow::Result;
use pdf_squeeze::metrics::lpips::LpipsScorer;
use pdf_squeeze::{Compressor, CompressorConfig, ToolKind};

use super::GateArgs;

pub fn run(gates: &GateArgs) -> Result<ExitCode> {
    let config = gates.load()?;
    let tools = gates.tools(&config);

    println!("External tools:");
    println!("{:-<60}", "");
    for status in tools.describe() {
        match status.path {
            Some(ref path) => println!(
                "  {:<12} {} ({})",
                status.kind.to_string(),
                path.display(),
                status.version.as_deref().unwrap_or("unknown version")
            ),
            None => println!("  {:<12} not found", status.kind.to_string()),
        }
    }

    match LpipsScorer::locate(config.lpips_command.as_deref(), config.raster_timeout()) {
        Some(scorer) => println!("  {:<12} {}", "LPIPS", scorer.command().display()),
        None => println!("  {:<12} not found (LPIPS gate unavailable)", "LPIPS"),
    }

    let settings = CompressorConfig::builder()
        .config(config)
        .gates_enabled(false)
        .build();
    let compressor = Compressor::new(settings, tools.clone());
    let strategies = compressor.strategy_ids();
    println!();
    if strategies.is_empty() {
        println!("Strategies: none available");
    } else {
        println!("Strategies: {}", strategies.join(", "));
    }
    if !tools.has(ToolKind::Ghostscript) {
        println!("Quality gates: disabled (Ghostscript missing)");
    }

    Ok(ExitCode::SUCCESS)
}
