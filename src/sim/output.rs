//! Run results and per-step records.

use std::collections::HashMap;

use serde::Serialize;

use crate::agents::{ApplicantGroup, Bank, RateAdjustment};
use crate::domain::{Histogram, Policy, RateRange};

/// One group's view of a finished step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupStepRecord {
    pub name: String,
    pub loan_seekers: usize,
    pub loans: usize,
    pub utility: f64,
    pub mean_score_change: f64,
    pub score_histogram: Histogram,
    pub real_score_histogram: Histogram,
}

/// One bank's view of a finished step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankStepRecord {
    pub name: String,
    pub selection_rates: HashMap<String, f64>,
    pub loans: usize,
    pub market_share: f64,
    pub realized_utility: f64,
    pub max_expected_utility: f64,
    /// Attempted pricing move, if any.
    pub adjustment: Option<RateAdjustment>,
    /// Anchors after the move.
    pub interest_rate_range: RateRange,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    /// Market step after this step completed (first step is 1).
    pub step: u64,
    pub groups: Vec<GroupStepRecord>,
    pub banks: Vec<BankStepRecord>,
}

impl StepRecord {
    pub fn total_loans(&self) -> usize {
        self.groups.iter().map(|g| g.loans).sum()
    }
}

/// Aggregate series kept by the market, indexed by step (entry 0 is the
/// initial state).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSeries {
    pub policy: Policy,
    pub step: u64,
    pub loans: HashMap<String, Vec<usize>>,
    pub utility: HashMap<String, Vec<f64>>,
    pub max_irates: HashMap<String, Vec<f64>>,
    pub min_irates: HashMap<String, Vec<f64>>,
}

/// Everything a run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub banks: Vec<Bank>,
    pub groups: Vec<ApplicantGroup>,
    pub mean_score_change: HashMap<String, Vec<f64>>,
    pub steps: Vec<StepRecord>,
    pub market: MarketSeries,
}

impl RunOutput {
    pub fn group_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    pub fn bank_names(&self) -> Vec<&str> {
        self.banks.iter().map(|b| b.name.as_str()).collect()
    }

    pub fn total_loans(&self) -> usize {
        self.market.loans.values().filter_map(|s| s.last()).sum()
    }

    pub fn total_utility(&self) -> f64 {
        self.market.utility.values().filter_map(|s| s.last()).sum()
    }

    /// Running realized utility per loan for a group; `None` before any loan.
    pub fn utility_per_loan(&self, group: &str) -> Option<f64> {
        let loans = *self.market.loans.get(group)?.last()?;
        let utility = *self.market.utility.get(group)?.last()?;
        (loans > 0).then(|| utility / loans as f64)
    }
}
