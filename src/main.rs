use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use spread_model::CalibrationConfig;

mod charts;
mod pipeline;
mod report;

use pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "agile_forecast")]
#[command(about = "Forecast GB Agile tariff spreads from battery storage growth")]
struct Args {
    /// Directory holding the processed input CSVs; outputs are written here too
    #[arg(long, global = true, default_value = "data/processed")]
    data_dir: PathBuf,

    /// JSON calibration config (defaults to the built-in GB constants)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip PNG chart rendering
    #[arg(long, global = true)]
    no_charts: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build monthly historic and FES scenario capacity tables
    Capacity,
    /// Fit the reference regression and calibrate the power-law model
    Calibrate,
    /// Fit the wholesale -> tariff pass-through
    PassThrough,
    /// Compose the monthly forecast from saved parameters
    Forecast,
    /// Run every stage in order
    Run,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => {
            info!("Loading calibration config from {}", path.display());
            CalibrationConfig::from_json_file(path)?
        }
        None => CalibrationConfig::default(),
    };
    info!("Calibration config version {}", config.version);

    let pipeline = Pipeline::new(&args.data_dir, config, !args.no_charts);
    match args.command {
        Command::Capacity => {
            pipeline.build_capacity()?;
        }
        Command::Calibrate => {
            pipeline.calibrate()?;
        }
        Command::PassThrough => {
            pipeline.pass_through()?;
        }
        Command::Forecast => {
            pipeline.forecast()?;
        }
        Command::Run => {
            pipeline.run_all()?;
        }
    }

    println!("\n✅ Done");
    Ok(())
}
