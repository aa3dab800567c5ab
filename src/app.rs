//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main:
//! - initialises logging and loads settings
//! - parses CLI arguments
//! - reads and writes sessions in the configuration store
//! - runs simulations and prints reports
//! - writes optional exports

use clap::Parser;
use log::info;

use crate::cli::{Cli, Command, InitArgs, PlaneArgs, RunArgs, SessionArgs};
use crate::config::{ConfigStore, Settings};
use crate::domain::SimConfig;
use crate::error::AppError;
use crate::market::{InterestRatePlane, Market};

pub mod pipeline;

/// Entry point for the `cmsim` binary.
pub fn run() -> Result<(), AppError> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Command::Init(args) => handle_init(&settings, args),
        Command::Show(args) => handle_show(&settings, args),
        Command::Run(args) => handle_run(&settings, args),
        Command::Plane(args) => handle_plane(&settings, args),
    }
}

fn handle_init(settings: &Settings, args: InitArgs) -> Result<(), AppError> {
    let mut store = settings.store();
    let session = args.session.session;
    if store.read(&session)?.is_some() && !args.force {
        return Err(AppError::config(format!(
            "Session '{session}' already exists. Use --force to overwrite it."
        )));
    }
    store.write(&session, &SimConfig::default())?;
    println!("Created session '{session}' in {}", store.path_for(&session).display());
    Ok(())
}

fn handle_show(settings: &Settings, args: SessionArgs) -> Result<(), AppError> {
    let config = pipeline::load_session(&settings.store(), &args.session)?;
    println!("{}", crate::report::format_config(&args.session, &config));
    Ok(())
}

fn handle_run(settings: &Settings, args: RunArgs) -> Result<(), AppError> {
    let config = pipeline::load_session(&settings.store(), &args.session.session)?;
    let stats = pipeline::load_statistics(settings, args.seed)?;
    let request = pipeline::RunRequest {
        steps: args.steps,
        seed: args.seed,
        policy: args.policy,
        histogram_bins: args.bins,
    };
    let result = pipeline::run_session(&config, &stats, &request)?;

    println!("{}", crate::report::format_run_summary(&result.output, &result.market));
    if args.chart {
        println!(
            "{}",
            crate::report::format_mean_score_chart(&result.output, args.width, args.height)
        );
    }

    if let Some(path) = &args.export_json {
        crate::io::write_run_json(path, &result.output)?;
        info!("wrote {}", path.display());
    }
    if let Some(path) = &args.export_csv {
        crate::io::write_series_csv(path, &result.output)?;
        info!("wrote {}", path.display());
    }

    Ok(())
}

fn handle_plane(settings: &Settings, args: PlaneArgs) -> Result<(), AppError> {
    let config = pipeline::load_session(&settings.store(), &args.session.session)?;
    let market = Market::new(&config.market)?;
    let plane = InterestRatePlane::for_market(&market)?;
    println!("{}", crate::report::format_plane(&plane, &market, args.tightness));
    Ok(())
}
