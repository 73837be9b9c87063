mod cli;
mod run;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use engine_logging::{engine_info, engine_warn, LogDestination};
use roomscout_engine::{EngineConfig, PipelineHandle};

use crate::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dotenv = dotenvy::dotenv();

    let run_dir = cli.run_dir(Local::now());
    let log_path = engine_logging::initialize(LogDestination::Both(run_dir.clone()), cli.log_level());
    if let Some(path) = &log_path {
        engine_info!("logging to {}", path.display());
    }
    if let Err(err) = dotenv {
        engine_info!("no .env loaded: {err}");
    }

    let config = EngineConfig::from_env().context("reading configuration")?;
    if config.locationiq_api_key.is_none() {
        engine_warn!("LOCATIONIQ_API_KEY not set, listings without map coordinates stay unlocated");
    }
    let pipeline = run::build_pipeline(&cli, &config, &run_dir)?;

    let result = run::follow(PipelineHandle::spawn(pipeline));
    engine_logging::flush();
    let summary = result?;
    if summary.is_partial() {
        engine_warn!("results are partial, see screenshots in {}", run_dir.display());
    }
    Ok(())
}
