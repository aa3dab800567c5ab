//! Market state, selection-rate policies and the interest-rate plane.
//!
//! - [`Market`]: score range, outcome deltas, pricing bounds, step counter and
//!   the append-only aggregate series
//! - `policy`: MaxUtility / DemographicParity / EqualOpportunity
//! - `plane`: precomputed pricing curves by market tightness (what-if queries)

pub mod plane;
pub mod policy;

pub use plane::*;
pub use policy::*;

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agents::{ApplicantGroup, Bank};
use crate::domain::{MarketParams, Outcome, Policy, RateRange, ScoreRange};
use crate::error::SimError;

/// What happens to a score after a loan resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreDynamics {
    pub range: ScoreRange,
    pub repay_score: i32,
    pub default_score: i32,
}

impl ScoreDynamics {
    pub fn delta(&self, outcome: Outcome) -> i32 {
        match outcome {
            Outcome::Repaid => self.repay_score,
            Outcome::Defaulted => self.default_score,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub policy: Policy,
    pub policy_color: String,
    pub score_range: ScoreRange,
    pub repay_score: i32,
    pub default_score: i32,
    pub max_interest_rate_range: RateRange,
    pub min_interest_rate_range: RateRange,
    pub plane_range: [f64; 2],
    pub plane_slice_step: f64,

    /// Completed steps.
    pub step: u64,
    /// Running loan total per group, one entry per step.
    pub loans: HashMap<String, Vec<usize>>,
    /// Running realized utility per group, one entry per step.
    pub utility: HashMap<String, Vec<f64>>,
    /// Per bank: the low-score anchor after each step's pricing move.
    pub max_irates: HashMap<String, Vec<f64>>,
    /// Per bank: the high-score anchor after each step's pricing move.
    pub min_irates: HashMap<String, Vec<f64>>,
}

impl Market {
    pub fn new(params: &MarketParams) -> Result<Self, SimError> {
        params.validate()?;
        Ok(Self {
            policy: params.policy,
            policy_color: params.policy_color.clone(),
            score_range: params.score_range,
            repay_score: params.repay_score,
            default_score: params.default_score,
            max_interest_rate_range: params.max_interest_rate_range,
            min_interest_rate_range: params.min_interest_rate_range,
            plane_range: params.plane_range,
            plane_slice_step: params.plane_slice_step,
            step: 0,
            loans: HashMap::new(),
            utility: HashMap::new(),
            max_irates: HashMap::new(),
            min_irates: HashMap::new(),
        })
    }

    pub fn dynamics(&self) -> ScoreDynamics {
        ScoreDynamics {
            range: self.score_range,
            repay_score: self.repay_score,
            default_score: self.default_score,
        }
    }

    /// Compute this step's selection rates under the active policy.
    ///
    /// Under [`Policy::EqualOpportunity`] this resolves a repay draw for every
    /// applicant and keeps the resulting score changes.
    pub fn selection_rates<R: Rng + ?Sized>(
        &self,
        banks: &mut [Bank],
        groups: &mut [ApplicantGroup],
        rng: &mut R,
    ) -> Result<SelectionRates, SimError> {
        if let Some(g) = groups.iter().find(|g| g.size() == 0) {
            return Err(SimError::empty(format!("group '{}' has no applicants", g.name)));
        }
        match self.policy {
            Policy::MaxUtility => max_utility(self, banks, groups),
            Policy::DemographicParity => demographic_parity(self, banks, groups),
            Policy::EqualOpportunity => equal_opportunity(self, banks, groups, rng),
        }
    }

    /// Seed every series with its step-0 value.
    pub fn init_series(&mut self, banks: &[Bank], groups: &[ApplicantGroup]) {
        for g in groups {
            self.loans.entry(g.name.clone()).or_insert_with(|| vec![0]);
            self.utility.entry(g.name.clone()).or_insert_with(|| vec![0.0]);
        }
        for b in banks {
            let anchors = b.interest_rate_range();
            self.max_irates.entry(b.name.clone()).or_insert_with(|| vec![anchors.low_score]);
            self.min_irates.entry(b.name.clone()).or_insert_with(|| vec![anchors.high_score]);
        }
    }

    pub fn record_rates(&mut self, bank: &Bank) {
        let anchors = bank.interest_rate_range();
        self.max_irates.entry(bank.name.clone()).or_default().push(anchors.low_score);
        self.min_irates.entry(bank.name.clone()).or_default().push(anchors.high_score);
    }

    /// Add this step's totals for one group to its running series.
    pub fn record_group(&mut self, group: &str, loans: usize, utility: f64) {
        let series = self.loans.entry(group.to_string()).or_default();
        let prev = series.last().copied().unwrap_or(0);
        series.push(prev + loans);

        let series = self.utility.entry(group.to_string()).or_default();
        let prev = series.last().copied().unwrap_or(0.0);
        series.push(prev + utility);
    }

    pub fn total_loans(&self, group: &str) -> usize {
        self.loans.get(group).and_then(|s| s.last().copied()).unwrap_or(0)
    }

    pub fn total_utility(&self, group: &str) -> f64 {
        self.utility.get(group).and_then(|s| s.last().copied()).unwrap_or(0.0)
    }
}
