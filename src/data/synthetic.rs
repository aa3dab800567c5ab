//! Synthetic group statistics.
//!
//! Used when no statistics directory is configured, and by tests. Each group's
//! score distribution is the empirical CDF of seeded normal draws on a fixed
//! score grid; its repay curve is a logistic in score.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

use crate::data::{GroupStatistics, ScoreCurve, StatisticsSource};
use crate::domain::ScoreRange;
use crate::error::AppError;

/// Number of draws used to estimate each synthetic CDF.
const CDF_DRAWS: usize = 20_000;

/// Shape of one synthetic group.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticGroup {
    pub name: String,
    pub score_mean: f64,
    pub score_sd: f64,
    /// Score at which repay probability is 1/2.
    pub repay_midpoint: f64,
    /// Logistic scale (score points per e-fold).
    pub repay_scale: f64,
    pub population: usize,
}

impl SyntheticGroup {
    pub fn new(name: impl Into<String>, score_mean: f64, score_sd: f64, population: usize) -> Self {
        Self {
            name: name.into(),
            score_mean,
            score_sd,
            repay_midpoint: 560.0,
            repay_scale: 45.0,
            population,
        }
    }
}

/// Seeded generator of [`GroupStatistics`].
#[derive(Debug, Clone)]
pub struct SyntheticStatistics {
    pub seed: u64,
    pub score_range: ScoreRange,
    /// Distance between support points.
    pub grid_step: i32,
    pub groups: Vec<SyntheticGroup>,
}

impl SyntheticStatistics {
    /// Four groups whose names match the default session configuration.
    pub fn standard(seed: u64) -> Self {
        Self {
            seed,
            score_range: ScoreRange { min: 300, max: 850 },
            grid_step: 10,
            groups: vec![
                SyntheticGroup::new("White", 720.0, 85.0, 880),
                SyntheticGroup::new("Black", 600.0, 100.0, 120),
                SyntheticGroup::new("Hispanic", 650.0, 95.0, 150),
                SyntheticGroup::new("Asian", 725.0, 80.0, 50),
            ],
        }
    }

    fn support(&self) -> Vec<f64> {
        let step = self.grid_step.max(1) as usize;
        let mut out: Vec<f64> = self.score_range.scores().step_by(step).map(f64::from).collect();
        let max = self.score_range.max as f64;
        if out.last().copied() != Some(max) {
            out.push(max);
        }
        out
    }
}

impl StatisticsSource for SyntheticStatistics {
    fn load_group_statistics(&self) -> Result<GroupStatistics, AppError> {
        let support = self.support();
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut stats = GroupStatistics::default();

        for group in &self.groups {
            if !(group.score_sd.is_finite() && group.score_sd > 0.0 && group.repay_scale > 0.0) {
                return Err(AppError::data(format!("Invalid synthetic shape for group '{}'.", group.name)));
            }
            let normal = Normal::new(group.score_mean, group.score_sd)
                .map_err(|e| AppError::data(format!("Score distribution error: {e}")))?;

            let mut draws: Vec<f64> = (0..CDF_DRAWS)
                .map(|_| {
                    normal
                        .sample(&mut rng)
                        .clamp(self.score_range.min as f64, self.score_range.max as f64)
                })
                .collect();
            draws.sort_by(|a, b| a.total_cmp(b));

            let mut cdf: Vec<f64> = support
                .iter()
                .map(|&s| draws.partition_point(|&d| d <= s) as f64 / CDF_DRAWS as f64)
                .collect();
            if let Some(last) = cdf.last_mut() {
                *last = 1.0;
            }

            let repay: Vec<f64> = support
                .iter()
                .map(|&s| 1.0 / (1.0 + (-(s - group.repay_midpoint) / group.repay_scale).exp()))
                .collect();

            stats.insert_group(
                group.name.clone(),
                ScoreCurve::new(support.clone(), cdf),
                ScoreCurve::new(support.clone(), repay),
                group.population,
            );
        }

        Ok(stats)
    }
}
