//! Shared session pipeline used by the `run` and `plane` commands.
//!
//! store -> validated config -> statistics -> simulation -> run output

use log::info;

use crate::config::{ConfigStore, Settings};
use crate::data::{CsvStatistics, GroupStatistics, StatisticsSource, SyntheticStatistics};
use crate::domain::{Policy, SimConfig};
use crate::error::AppError;
use crate::market::Market;
use crate::sim::{RunOutput, Simulation};

/// What to run, independent of where the session came from.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub steps: u64,
    pub seed: u64,
    pub policy: Option<Policy>,
    pub histogram_bins: usize,
}

/// All computed outputs of a single `cmsim run`.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub output: RunOutput,
    pub market: Market,
}

/// Read and validate a stored session.
pub fn load_session(store: &dyn ConfigStore, session: &str) -> Result<SimConfig, AppError> {
    let config = store.read(session)?.ok_or_else(|| {
        AppError::config(format!(
            "Unknown session '{session}'. Create it with `cmsim init --session {session}`."
        ))
    })?;
    config.validate()?;
    Ok(config)
}

/// CSV statistics from the data directory when configured, synthetic otherwise.
pub fn load_statistics(settings: &Settings, seed: u64) -> Result<GroupStatistics, AppError> {
    match &settings.data_dir {
        Some(dir) => {
            info!("loading group statistics from {}", dir.display());
            CsvStatistics::new(dir).load_group_statistics()
        }
        None => {
            info!("no data directory configured; using synthetic statistics (seed {seed})");
            SyntheticStatistics::standard(seed).load_group_statistics()
        }
    }
}

/// Build a simulation for `config` and run it.
pub fn run_session(config: &SimConfig, stats: &GroupStatistics, request: &RunRequest) -> Result<RunResult, AppError> {
    let mut config = config.clone();
    if let Some(policy) = request.policy {
        config.set_policy(policy);
    }

    let mut sim = Simulation::from_seed(&config, stats, request.seed)?.with_histogram_bins(request.histogram_bins);
    let output = sim.run(request.steps)?;
    Ok(RunResult {
        output,
        market: sim.market().clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryStore;

    fn request(policy: Option<Policy>) -> RunRequest {
        RunRequest {
            steps: 2,
            seed: 11,
            policy,
            histogram_bins: 5,
        }
    }

    #[test]
    fn unknown_session_points_at_init() {
        let store = MemoryStore::new();
        let err = load_session(&store, "missing").unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("cmsim init --session missing"));
    }

    #[test]
    fn invalid_stored_config_is_rejected() {
        let mut store = MemoryStore::new();
        let mut config = SimConfig::default();
        config.groups.clear();
        store.write("broken", &config).unwrap();
        assert_eq!(load_session(&store, "broken").unwrap_err().exit_code(), 2);
    }

    #[test]
    fn policy_override_reaches_the_market() {
        let mut store = MemoryStore::new();
        store.write("default", &SimConfig::default()).unwrap();
        let config = load_session(&store, "default").unwrap();
        let stats = SyntheticStatistics::standard(11).load_group_statistics().unwrap();

        let result = run_session(&config, &stats, &request(Some(Policy::DemographicParity))).unwrap();
        assert_eq!(result.market.policy, Policy::DemographicParity);
        assert_eq!(result.output.market.policy, Policy::DemographicParity);
        assert_eq!(result.output.steps.len(), 2);
        assert_eq!(result.output.steps[0].groups[0].score_histogram.counts.len(), 5);
        // The stored session is untouched.
        assert_eq!(config.market.policy, Policy::MaxUtility);
    }

    #[test]
    fn synthetic_statistics_without_data_dir() {
        let settings = Settings {
            config_dir: ".cmsim".into(),
            data_dir: None,
        };
        let stats = load_statistics(&settings, 1).unwrap();
        assert!(stats.group_names().contains(&"White".to_string()));
    }
}
