use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::{error, info};
use ndvi_phenology::config::PipelineConfig;
use ndvi_phenology::core::ExtractionStatus;
use ndvi_phenology::{compute_forecast, compute_phenology, extract_all, load_report, load_summary};
use serde::Serialize;
use std::path::PathBuf;

/// NDVI tile extraction, phenology and peak-date forecast
#[derive(Parser, Debug)]
#[command(name = "ndvi-pipeline", version)]
struct Cli {
    /// JSON pipeline configuration; defaults apply to missing keys
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory containing the raster tiles
    #[arg(long, global = true)]
    tile_dir: Option<PathBuf>,

    /// Directory for the summary table, chart series and frames
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the NDVI series from every tile and write the artifacts
    Extract,
    /// Season start, peak and end from the summary table
    Phenology {
        /// Fraction of the seasonal amplitude used as threshold
        #[arg(long)]
        threshold_fraction: Option<f64>,
    },
    /// Predict next season's peak date from yearly peaks
    Forecast,
    /// Phenology, forecast and rendered frames of a finished run
    Report,
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = &cli.tile_dir {
        config.tile_dir = dir.clone();
    }
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = load_config(&cli)?;

    match cli.command {
        Command::Extract => {
            let summary = extract_all(&config)?;
            if summary.status != ExtractionStatus::Ok {
                error!("{}", summary.message);
            }
            info!("{} rows, {} frames", summary.rows.len(), summary.frames.len());
            print_json(&summary)?;
        }
        Command::Phenology { threshold_fraction } => {
            if let Some(fraction) = threshold_fraction {
                config.phenology.threshold_fraction = fraction;
                config.validate()?;
            }
            let rows = load_summary(&config.summary_path())?;
            print_json(&compute_phenology(&rows, &config.phenology)?)?;
        }
        Command::Forecast => {
            let rows = load_summary(&config.summary_path())?;
            print_json(&compute_forecast(&rows))?;
        }
        Command::Report => {
            print_json(&load_report(&config)?)?;
        }
    }

    Ok(())
}
