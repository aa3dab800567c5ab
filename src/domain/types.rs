//! Shared value types.
//!
//! These are kept small, `Copy` where possible, and serializable so they can be
//! stored in session configuration and exported with run results.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::SimError;

/// Closed integer interval `[min, max]` of valid credit scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: i32,
    pub max: i32,
}

impl ScoreRange {
    pub fn new(min: i32, max: i32) -> Result<Self, SimError> {
        if min >= max {
            return Err(SimError::invalid(format!(
                "score range min ({min}) must be below max ({max})"
            )));
        }
        Ok(Self { min, max })
    }

    /// Clamp any (possibly out-of-range) score into the interval.
    pub fn clamp(&self, score: i64) -> i32 {
        score.clamp(self.min as i64, self.max as i64) as i32
    }

    pub fn contains(&self, score: i32) -> bool {
        score >= self.min && score <= self.max
    }

    /// Number of integer scores in the interval.
    pub fn len(&self) -> usize {
        (self.max - self.min) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Offset of `score` into a per-score table. Callers pass in-range scores.
    pub fn index_of(&self, score: i32) -> usize {
        (self.clamp(score as i64) - self.min) as usize
    }

    /// Every integer score, ascending.
    pub fn scores(&self) -> impl Iterator<Item = i32> {
        self.min..=self.max
    }
}

/// An interest-rate pair anchored at the two ends of the score range.
///
/// `low_score` is the rate quoted at `ScoreRange::min`, `high_score` the rate at
/// `ScoreRange::max`. Rates in between are linearly interpolated.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRange {
    pub low_score: f64,
    pub high_score: f64,
}

impl RateRange {
    pub fn new(low_score: f64, high_score: f64) -> Self {
        Self {
            low_score,
            high_score,
        }
    }

    /// A flat range (same rate at both ends).
    pub fn flat(rate: f64) -> Self {
        Self::new(rate, rate)
    }

    pub fn shifted(&self, delta: f64) -> Self {
        Self::new(self.low_score + delta, self.high_score + delta)
    }

    pub fn is_finite(&self) -> bool {
        self.low_score.is_finite() && self.high_score.is_finite()
    }

    /// True when both endpoints lie within `[min, max]` endpoint-wise.
    pub fn within(&self, min: &RateRange, max: &RateRange) -> bool {
        self.low_score >= min.low_score
            && self.high_score >= min.high_score
            && self.low_score <= max.low_score
            && self.high_score <= max.high_score
    }
}

/// Selection-rate policy active for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// Each bank maximizes expected utility per group independently.
    MaxUtility,
    /// One selection rate shared by every group.
    DemographicParity,
    /// Equal true positive rate across groups.
    EqualOpportunity,
}

impl Policy {
    pub fn display_name(self) -> &'static str {
        match self {
            Policy::MaxUtility => "Max. utility",
            Policy::DemographicParity => "Dem. parity",
            Policy::EqualOpportunity => "Equal opportunity",
        }
    }
}

/// Result of a repay draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Repaid,
    Defaulted,
}

impl Outcome {
    pub fn is_repaid(self) -> bool {
        matches!(self, Outcome::Repaid)
    }
}

/// Equal-width histogram over a closed score interval.
///
/// Bins are half-open except the last, which also includes the upper edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    /// `counts.len() + 1` bin edges, ascending.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn from_scores(scores: impl IntoIterator<Item = i32>, range: ScoreRange, bins: usize) -> Self {
        let bins = bins.max(1);
        let lo = range.min as f64;
        let hi = range.max as f64;
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + width * i as f64).collect();

        let mut counts = vec![0usize; bins];
        for score in scores {
            let x = score as f64;
            if x < lo || x > hi {
                continue;
            }
            let idx = (((x - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Self { edges, counts }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}
