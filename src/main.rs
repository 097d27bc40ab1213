use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

mod config;
use config::SampleConfig;

mod core;
use crate::core::sampling::SelectionPolicy;

mod logging;
use logging::{setup_logging, LogOptions};

mod pipeline;
use pipeline::run_sampling;

#[derive(Parser, Debug)]
#[command(name = "typhoon-subset", version, about = "Sample a typhoon image dataset into a smaller subset")]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log warnings and errors, and hide the progress bar
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Don't write a log file under ./logs
    #[arg(long, global = true)]
    no_log_file: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Select typhoons, copy their images and filter the metadata
    Sample(SampleArgs),
    /// Concatenate the cells of several Jupyter notebooks into one
    MergeNotebooks {
        /// Where to write the merged notebook
        #[arg(short, long)]
        output: PathBuf,

        /// Notebooks to merge, in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

/// Command-line overrides; anything left unset comes from the config file or defaults
#[derive(Args, Debug, Default)]
struct SampleArgs {
    /// JSON config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Source dataset directory containing aux_data.csv and image/
    #[arg(long)]
    root: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Number of typhoons to select
    #[arg(long)]
    total_typhoons: Option<usize>,

    /// Drop typhoons with fewer images than this (0 disables)
    #[arg(long)]
    min_images_per_typhoon: Option<usize>,

    #[arg(long)]
    random_seed: Option<u64>,

    #[arg(long, value_enum)]
    selection_policy: Option<SelectionPolicy>,

    /// Keep at most this many images per typhoon
    #[arg(long)]
    images_per_typhoon: Option<usize>,

    /// Also write sample_summary.json and sample_config.json to the output directory
    #[arg(long)]
    summary: bool,
}

impl SampleArgs {
    fn apply(&self, mut config: SampleConfig) -> SampleConfig {
        if let Some(root) = &self.root {
            config.root = root.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if let Some(total) = self.total_typhoons {
            config.total_typhoons = total;
        }
        if let Some(min_images) = self.min_images_per_typhoon {
            config.min_images_per_typhoon = min_images;
        }
        if let Some(seed) = self.random_seed {
            config.random_seed = seed;
        }
        if let Some(policy) = self.selection_policy {
            config.selection_policy = policy;
        }
        if self.images_per_typhoon.is_some() {
            config.images_per_typhoon = self.images_per_typhoon;
        }
        if self.summary {
            config.write_summary = true;
        }
        config
    }
}

fn run_sample(args: &SampleArgs, quiet: bool) -> Result<()> {
    let config = args.apply(SampleConfig::load_or_default(args.config.as_deref())?);
    info!("Configuration: {:?}", config);

    let summary = run_sampling(&config, !quiet)?;

    info!(
        "Done: {} of {} typhoons, {} images ({} copied)",
        summary.typhoons_kept, summary.typhoons_available, summary.images_kept, summary.images_copied
    );
    if !summary.images_not_found.is_empty() {
        warn!("{} images could not be found", summary.images_not_found.len());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_options = LogOptions {
        verbose: cli.verbose,
        quiet: cli.quiet,
        log_dir: (!cli.no_log_file).then(|| PathBuf::from("logs")),
    };
    setup_logging(&log_options)?;

    info!("Starting typhoon-subset {}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Sample(args) => run_sample(args, cli.quiet),
        Command::MergeNotebooks { output, inputs } => {
            crate::core::notebook::merge_notebooks(inputs, output)?;
            Ok(())
        }
    }
}
