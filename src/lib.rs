pub mod catalogue;
pub mod cli;
pub mod config;
pub mod data;
pub mod derive;
pub mod error;
pub mod export;
pub mod frequency;
pub mod io_utils;
pub mod pipeline;
pub mod profile;
pub mod reader;
pub mod rules;
pub mod schema;
pub mod source;
pub mod spreadsheet;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands},
    config::PipelineConfig,
    pipeline::Pipeline,
    rules::RuleRegistry,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging(verbose: bool) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            let level = if verbose {
                LevelFilter::Debug
            } else {
                LevelFilter::Info
            };
            builder.filter_module("od_catalogue", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let started = Local::now();
    info!("Start process: {}", started.format("%Y-%m-%d %H:%M:%S"));

    let config = PipelineConfig::load(&cli.config)
        .with_context(|| format!("Loading configuration from {:?}", cli.config))?;
    debug!("Configuration: {config:?}");
    let rules = RuleRegistry::load(&config.rules).context("Loading rule documents")?;
    let pipeline = Pipeline::new(&config, &rules)?;

    match &cli.command {
        Commands::Profile => {
            pipeline.profile()?;
        }
        Commands::Sql(args) => {
            pipeline.synthesize(config.sample_limit(args.full_scan))?;
        }
        Commands::Export => {
            pipeline.export()?;
        }
        Commands::LoadScript(args) => {
            pipeline.load_script(args.input_dir.as_deref(), args.output.as_deref())?;
        }
        Commands::All => {
            pipeline.profile()?;
            pipeline.synthesize(config.sample_limit(false))?;
            pipeline.export()?;
            pipeline.load_script(None, None)?;
        }
    }

    let elapsed = Local::now() - started;
    info!(
        "Time to finish: {}.{:03}s",
        elapsed.num_seconds(),
        elapsed.num_milliseconds() % 1000
    );
    Ok(())
}
