//! Command-line parsing for the credit market simulator.
//!
//! Argument parsing and command dispatch stay separate from the simulation
//! code; `app` turns these structs into calls on the library.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::DEFAULT_SESSION;
use crate::domain::Policy;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "cmsim", version, about = "Credit market simulation with fairness policies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a session with the default market, banks and groups.
    Init(InitArgs),
    /// Print a stored session.
    Show(SessionArgs),
    /// Run the simulation for a number of steps and print a summary.
    Run(RunArgs),
    /// Print the interest-rate plane of a session's market.
    Plane(PlaneArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SessionArgs {
    /// Session identifier (letters, digits, '-' or '_').
    #[arg(short = 's', long, default_value = DEFAULT_SESSION)]
    pub session: String,
}

#[derive(Debug, Args, Clone)]
pub struct InitArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Overwrite an existing session.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Number of steps to simulate.
    #[arg(short = 'n', long, default_value_t = 10)]
    pub steps: u64,

    /// Random seed (population seeding, policy draws and loan outcomes).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Override the session's selection-rate policy for this run.
    #[arg(long, value_enum)]
    pub policy: Option<Policy>,

    /// Histogram bins for per-step score histograms.
    #[arg(long, default_value_t = 10)]
    pub bins: usize,

    /// Render the mean score change chart.
    #[arg(long)]
    pub chart: bool,

    /// Chart width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Chart height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// Export the full run to JSON.
    #[arg(long = "export-json", value_name = "PATH")]
    pub export_json: Option<PathBuf>,

    /// Export per-step series to CSV.
    #[arg(long = "export-csv", value_name = "PATH")]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct PlaneArgs {
    #[command(flatten)]
    pub session: SessionArgs,

    /// Print the rate table of the slice nearest this tightness.
    #[arg(short = 't', long)]
    pub tightness: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_defaults() {
        let cli = Cli::parse_from(["cmsim", "run"]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.session.session, "default");
        assert_eq!(args.steps, 10);
        assert_eq!(args.seed, 42);
        assert_eq!(args.policy, None);
        assert!(args.export_json.is_none());
    }

    #[test]
    fn run_with_policy_and_exports() {
        let cli = Cli::parse_from([
            "cmsim",
            "run",
            "--session",
            "trial",
            "--steps",
            "25",
            "--policy",
            "equal-opportunity",
            "--export-csv",
            "out.csv",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.session.session, "trial");
        assert_eq!(args.steps, 25);
        assert_eq!(args.policy, Some(Policy::EqualOpportunity));
        assert_eq!(args.export_csv, Some(PathBuf::from("out.csv")));
    }

    #[test]
    fn init_force_and_plane_tightness() {
        let cli = Cli::parse_from(["cmsim", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init(InitArgs { force: true, .. })));

        let cli = Cli::parse_from(["cmsim", "plane", "-t", "0.25"]);
        let Command::Plane(args) = cli.command else {
            panic!("expected plane");
        };
        assert_eq!(args.tightness, Some(0.25));
    }
}
