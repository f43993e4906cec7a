//! Reading Log Analyzer CLI Application
//!
//! This is the command-line interface for the reading log analyzer.
//! It uses the reading-log-core library and adds:
//! - TOML configuration loading and validation
//! - JSON event and boundary file decoding (files parsed in parallel)
//! - Filter replay over every dataset
//! - Bin descriptor, annotated dataset and run summary output

use anyhow::{bail, Context, Result};
use clap::Parser;
use reading_log_core::{replay_filters, BinTable, ReadingAnalyzer};
use std::fs;
use std::path::{Path, PathBuf};

mod config;
mod input;
mod report;

/// Reading Log Analyzer - annotate eye-tracking logs and classify fixations
#[derive(Parser, Debug)]
#[command(name = "reading-log-cli")]
#[command(about = "Annotate reading eye-tracking logs and build fixation bins", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Event file(s) in JSON (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    events: Vec<PathBuf>,

    /// Boundary table file(s) in JSON (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    boundaries: Vec<PathBuf>,

    /// Output directory (overrides the configuration)
    #[arg(short, long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Reading Log Analyzer CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using analyzer library v{}", reading_log_core::VERSION);

    let Some(config_path) = &args.config else {
        println!("Reading Log Analyzer - No configuration specified");
        println!("\nQuick Start:");
        println!("  reading-log-cli --config experiment.toml");
        println!("  reading-log-cli --config experiment.toml --events p01.json --events p02.json");
        println!("\nUse --help for more options");
        return Ok(());
    };

    run(config_path, &args)
}

/// Load, annotate, filter and write everything for one configuration
fn run(config_path: &Path, args: &Args) -> Result<()> {
    log::info!("Loading configuration from: {:?}", config_path);
    let mut config = config::load_config(config_path)?;
    config.merge_args(&args.events, &args.boundaries, args.output_dir.as_deref());
    config
        .validate()
        .with_context(|| format!("Invalid configuration: {:?}", config_path))?;

    let analyzer = ReadingAnalyzer::new(config.engine.clone())?;
    let boundaries = input::load_boundaries(&config.input.boundaries, &config.layout, &config.stimuli)?;
    let loaded = input::load_datasets(&config.input.events, &analyzer);
    if loaded.datasets.is_empty() {
        bail!("None of the {} event files could be decoded", loaded.skipped.len());
    }
    let mut datasets = loaded.datasets;
    log::info!(
        "Decoded {} event files ({} skipped)",
        datasets.len(),
        loaded.skipped.len()
    );

    for dataset in &mut datasets {
        analyzer
            .annotate(dataset, &boundaries)
            .with_context(|| format!("Failed to annotate {}", dataset.name()))?;
    }

    let batch = replay_filters(&mut datasets, &config.filters);
    let bins = BinTable::collect(&datasets);

    let output = &config.output;
    fs::create_dir_all(&output.output_dir)
        .with_context(|| format!("Failed to create output directory: {:?}", output.output_dir))?;

    report::write_bins(&output.output_dir.join(&output.bins_file), &bins)?;
    if output.write_datasets {
        report::write_datasets(&output.output_dir, &datasets)?;
    }

    let summary = report::RunSummary::new(&datasets, loaded.skipped, batch, &bins);
    summary.write(&output.output_dir.join("summary.json"))?;
    if !args.quiet {
        summary.print();
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
