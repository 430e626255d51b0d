use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use hotspot_mapper::cache::SelectionCache;
use hotspot_mapper::config::ConfigLoader;
use hotspot_mapper::error::HotspotError;
use hotspot_mapper::output::JsonOutput;
use hotspot_mapper::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "hotspot-map")]
#[command(about = "Species-richness hotspot analysis over geographic survey data")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Run the full richness/rarity/hotspot pipeline")]
    Run(RunArgs),
    #[command(about = "Remove the cached grid selection so the next run resamples")]
    ClearCache(ClearCacheArgs),
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    config: Option<String>,

    /// Drop the cached selection and resample before running.
    #[arg(long)]
    resample: bool,

    /// Seed for the grid sampler; overrides the config value.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct ClearCacheArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HotspotError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HotspotError) -> u8 {
    match error {
        HotspotError::ConfigRead(_)
        | HotspotError::ConfigParse(_)
        | HotspotError::InvalidParameter(_) => 2,
        HotspotError::FileNotFound(_)
        | HotspotError::MissingColumn { .. }
        | HotspotError::CsvRead { .. }
        | HotspotError::CsvParse { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => {
            let mut config = ConfigLoader::resolve(args.config.as_deref())?;
            if let Some(seed) = args.seed {
                config.seed = Some(seed);
            }
            if args.resample {
                SelectionCache::new(config.inputs.selection_cache.clone()).clear()?;
            }
            let pipeline = Pipeline::new(config);
            let summary = pipeline.run(&JsonOutput)?;
            JsonOutput::print_summary(&summary).into_diagnostic()?;
            Ok(())
        }
        Commands::ClearCache(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref())?;
            let removed = SelectionCache::new(config.inputs.selection_cache).clear()?;
            if removed {
                tracing::info!("removed cached selection");
            } else {
                tracing::info!("no cached selection to remove");
            }
            Ok(())
        }
    }
}
