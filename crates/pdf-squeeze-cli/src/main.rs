//! pdf-squeeze CLI - quality-gated PDF compression

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;

use commands::GateArgs;

/// Compress PDFs with Ghostscript, qpdf and PDFtk, keeping only results
/// that pass perceptual quality gates.
#[derive(Parser)]
#[command(name = "pdf-squeeze")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress every PDF in a directory
    Run {
        /// Input directory containing PDFs
        #[arg(short, long, default_value = "input")]
        input: PathBuf,

        /// Output directory for compressed PDFs
        #[arg(short, long, default_value = "output")]
        output: PathBuf,

        /// Leave inputs in place instead of moving them to <input>/processed
        #[arg(long)]
        keep_input: bool,

        /// Files processed in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Write JSON and CSV reports into this directory
        #[arg(long)]
        report_dir: Option<PathBuf>,

        /// Skip quality gates and select by size alone
        #[arg(long, conflicts_with = "advanced_gates")]
        no_gates: bool,

        #[command(flatten)]
        gates: GateArgs,
    },

    /// Compare a compressed PDF with its original (exit 1 when gates fail)
    Check {
        /// Original PDF
        original: PathBuf,

        /// Compressed PDF
        compressed: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        #[command(flatten)]
        gates: GateArgs,
    },

    /// Run the pipeline over a dataset without touching the inputs
    Bench {
        /// Directory of PDFs
        dataset: PathBuf,

        /// Output directory (default: a temporary directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// JSON report file
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Files processed in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,

        /// Skip quality gates and select by size alone
        #[arg(long, conflicts_with = "advanced_gates")]
        no_gates: bool,

        #[command(flatten)]
        gates: GateArgs,
    },

    /// Show detected external tools and usable strategies
    Tools {
        #[command(flatten)]
        gates: GateArgs,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .parse_default_env()
        .init();

    match cli.command {
        Commands::Run {
            input,
            output,
            keep_input,
            jobs,
            report_dir,
            no_gates,
            gates,
        } => commands::run::run(input, output, keep_input, jobs, report_dir, no_gates, &gates),
        Commands::Check {
            original,
            compressed,
            json,
            gates,
        } => commands::check::run(&original, &compressed, json, &gates),
        Commands::Bench {
            dataset,
            output,
            report,
            jobs,
            no_gates,
            gates,
        } => commands::bench::run(dataset, output, report, jobs, no_gates, &gates),
        Commands::Tools { gates } => commands::tools::run(&gates),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_gates_only_where_it_applies() {
        assert!(Cli::try_parse_from(["pdf-squeeze", "run", "--no-gates"]).is_ok());
        assert!(Cli::try_parse_from(["pdf-squeeze", "bench", "data", "--no-gates"]).is_ok());
        assert!(Cli::try_parse_from(["pdf-squeeze", "check", "a.pdf", "b.pdf", "--no-gates"]).is_err());
        assert!(Cli::try_parse_from(["pdf-squeeze", "tools", "--no-gates"]).is_err());
    }

    #[test]
    fn test_no_gates_conflicts_with_advanced() {
        let result = Cli::try_parse_from(["pdf-squeeze", "run", "--no-gates", "--advanced-gates"]);
        assert!(result.is_err());
    }
}
