//! Dyncpr CLI - Command-line interface for simulating and inspecting CPR games.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Dyncpr - A dynamic common-pool-resource extraction game
#[derive(Parser, Debug)]
#[command(name = "dyncpr")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate one part with random players
    Run {
        #[command(flatten)]
        setup: cli::Setup,

        /// Random seed (default: random)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of simulated players
        #[arg(short, long, default_value = "2")]
        players: u32,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Write tick records to a JSON-lines file
        #[arg(long)]
        records: Option<PathBuf>,

        /// Pace continuous ticks on the wall clock
        #[arg(long)]
        realtime: bool,
    },

    /// Simulate many seeds in parallel and aggregate payoffs
    Batch {
        #[command(flatten)]
        setup: cli::Setup,

        /// Number of runs (default: 100)
        #[arg(short, long, default_value = "100")]
        runs: u64,

        /// Starting seed (increments for each run)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Number of simulated players per run
        #[arg(short, long, default_value = "2")]
        players: u32,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Output format: text, json, or csv
        #[arg(short, long, default_value = "text")]
        format: cli::BatchFormat,

        /// Show progress bar
        #[arg(long)]
        progress: bool,
    },

    /// Infinite-horizon projection for frozen extraction levels
    Project {
        #[command(flatten)]
        setup: cli::Setup,

        /// Own extraction
        #[arg(short, long)]
        own: f64,

        /// Group extraction
        #[arg(short, long)]
        group: f64,

        /// Current stock
        #[arg(long)]
        stock: f64,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },

    /// Print the default configuration, or validate a configuration file
    Config {
        /// Configuration file to validate
        file: Option<PathBuf>,
    },

    /// Print per-player history tables from a JSON-lines record file
    Summary {
        /// Record file written by `run --records`
        #[arg(required = true)]
        records: PathBuf,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            setup,
            seed,
            players,
            format,
            records,
            realtime,
        } => cli::run::execute(&setup, seed, players, format, records, realtime),

        Commands::Batch {
            setup,
            runs,
            seed,
            players,
            threads,
            format,
            progress,
        } => cli::batch::execute(&setup, runs, seed, players, threads, format, progress),

        Commands::Project {
            setup,
            own,
            group,
            stock,
            format,
        } => cli::project::execute(&setup, own, group, stock, format),

        Commands::Config { file } => cli::config::execute(file),

        Commands::Summary { records, format } => cli::summary::execute(&records, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
