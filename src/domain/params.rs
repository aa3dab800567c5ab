//! Parameter records exchanged with the configuration store.
//!
//! A session's configuration is one [`SimConfig`]: a market record, a list of
//! bank records and a list of applicant-group records. Records are plain data;
//! [`SimConfig::validate`] is the single gate that turns bad parameters into
//! `SimError::InvalidConfiguration` before a simulation is built.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{Policy, RateRange, ScoreRange};
use crate::error::SimError;

/// Market-wide parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketParams {
    pub policy: Policy,
    /// Opaque presentation attribute.
    #[serde(default)]
    pub policy_color: String,
    pub score_range: ScoreRange,
    /// Score delta applied after a repaid loan (> 0).
    pub repay_score: i32,
    /// Score delta applied after a default (< 0).
    pub default_score: i32,
    /// Upper pricing bound every bank's anchor range must stay under.
    pub max_interest_rate_range: RateRange,
    /// Lower pricing bound every bank's anchor range must stay above.
    pub min_interest_rate_range: RateRange,
    /// Tightness interval for the interest-rate plane.
    pub plane_range: [f64; 2],
    pub plane_slice_step: f64,
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            policy: Policy::MaxUtility,
            policy_color: "#B80F0A".to_string(),
            score_range: ScoreRange { min: 300, max: 850 },
            repay_score: 75,
            default_score: -150,
            max_interest_rate_range: RateRange::flat(0.5),
            min_interest_rate_range: RateRange::flat(0.001),
            plane_range: [0.0, 1.0],
            plane_slice_step: 0.01,
        }
    }
}

impl MarketParams {
    /// Market-level checks: score range, score deltas, rate bounds, plane.
    pub fn validate(&self) -> Result<(), SimError> {
        ScoreRange::new(self.score_range.min, self.score_range.max)?;
        if self.repay_score <= 0 {
            return Err(SimError::invalid("repay_score must be > 0"));
        }
        if self.default_score >= 0 {
            return Err(SimError::invalid("default_score must be < 0"));
        }
        if !(self.max_interest_rate_range.is_finite() && self.min_interest_rate_range.is_finite()) {
            return Err(SimError::invalid("interest rate bounds must be finite"));
        }
        if self.min_interest_rate_range.low_score > self.max_interest_rate_range.low_score
            || self.min_interest_rate_range.high_score > self.max_interest_rate_range.high_score
        {
            return Err(SimError::invalid(
                "min interest rate bound exceeds max interest rate bound",
            ));
        }
        let [plane_min, plane_max] = self.plane_range;
        if !(plane_min.is_finite() && plane_max.is_finite() && plane_max > plane_min) {
            return Err(SimError::invalid(format!(
                "invalid plane range [{plane_min}, {plane_max}]"
            )));
        }
        if !(self.plane_slice_step.is_finite() && self.plane_slice_step > 0.0) {
            return Err(SimError::invalid("plane_slice_step must be > 0"));
        }
        Ok(())
    }
}

/// One lender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankParams {
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub line_style: String,
    pub interest_rate_range: RateRange,
    pub interest_change_up: f64,
    pub interest_change_down: f64,
    /// Bias added to an applicant's score before this bank evaluates it.
    #[serde(default)]
    pub score_shift: i32,
    pub utility_repaid: f64,
    pub utility_default: f64,
}

impl BankParams {
    pub fn new(name: impl Into<String>, interest_rate_range: RateRange) -> Self {
        Self {
            name: name.into(),
            color: String::new(),
            line_style: "-".to_string(),
            interest_rate_range,
            interest_change_up: 0.01,
            interest_change_down: -0.01,
            score_shift: 0,
            utility_repaid: 1.0,
            utility_default: -4.0,
        }
    }
}

/// One demographic applicant group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupParams {
    /// Must match a group column in the statistics input.
    pub name: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub line_style: String,
    /// Reconstruction target. `None` uses the statistics' reference population.
    pub size: Option<usize>,
    pub loan_demand: f64,
    pub error_rate: f64,
    pub score_error: i32,
    /// Highest interest rate a member will accept.
    pub interest_rate_limit: f64,
}

impl GroupParams {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            color: String::new(),
            line_style: "-".to_string(),
            size: Some(size),
            loan_demand: 0.1,
            error_rate: 0.1,
            score_error: 150,
            interest_rate_limit: 0.3,
        }
    }
}

/// Full configuration of one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub market: MarketParams,
    pub banks: Vec<BankParams>,
    pub groups: Vec<GroupParams>,
}

impl Default for SimConfig {
    /// The configuration a fresh session starts with.
    fn default() -> Self {
        let reference = BankParams {
            color: "red".to_string(),
            ..BankParams::new("reference", RateRange::new(0.15, 0.06))
        };
        let conservative = BankParams {
            color: "blue".to_string(),
            line_style: "--".to_string(),
            score_shift: -25,
            ..BankParams::new("conservative", RateRange::new(0.18, 0.04))
        };
        let risk_taking = BankParams {
            color: "green".to_string(),
            line_style: ":".to_string(),
            score_shift: 50,
            ..BankParams::new("risk taking", RateRange::new(0.10, 0.08))
        };

        let white = GroupParams {
            color: "grey".to_string(),
            score_error: -150,
            ..GroupParams::new("White", 880)
        };
        let black = GroupParams {
            color: "black".to_string(),
            line_style: ":".to_string(),
            score_error: 150,
            ..GroupParams::new("Black", 120)
        };

        Self {
            market: MarketParams::default(),
            banks: vec![reference, conservative, risk_taking],
            groups: vec![white, black],
        }
    }
}

impl SimConfig {
    /// Check every parameter. Nothing is built from an unvalidated config.
    pub fn validate(&self) -> Result<(), SimError> {
        let m = &self.market;
        m.validate()?;

        if self.banks.is_empty() {
            return Err(SimError::invalid("at least one bank is required"));
        }
        if self.groups.is_empty() {
            return Err(SimError::invalid("at least one applicant group is required"));
        }

        let mut names = HashSet::new();
        for bank in &self.banks {
            if !names.insert(bank.name.as_str()) {
                return Err(SimError::invalid(format!("duplicate bank name '{}'", bank.name)));
            }
            validate_bank(bank, m)?;
        }

        let mut names = HashSet::new();
        for group in &self.groups {
            if !names.insert(group.name.as_str()) {
                return Err(SimError::invalid(format!("duplicate group name '{}'", group.name)));
            }
            validate_group(group)?;
        }

        Ok(())
    }

    pub fn set_policy(&mut self, policy: Policy) {
        self.market.policy = policy;
    }

    /// Insert a bank, replacing any bank with the same name in place.
    pub fn upsert_bank(&mut self, bank: BankParams) {
        match self.banks.iter_mut().find(|b| b.name == bank.name) {
            Some(existing) => *existing = bank,
            None => self.banks.push(bank),
        }
    }

    pub fn remove_bank(&mut self, name: &str) -> Option<BankParams> {
        let idx = self.banks.iter().position(|b| b.name == name)?;
        Some(self.banks.remove(idx))
    }

    /// Insert a group, replacing any group with the same name in place.
    pub fn upsert_group(&mut self, group: GroupParams) {
        match self.groups.iter_mut().find(|g| g.name == group.name) {
            Some(existing) => *existing = group,
            None => self.groups.push(group),
        }
    }

    pub fn remove_group(&mut self, name: &str) -> Option<GroupParams> {
        let idx = self.groups.iter().position(|g| g.name == name)?;
        Some(self.groups.remove(idx))
    }
}

fn validate_bank(bank: &BankParams, market: &MarketParams) -> Result<(), SimError> {
    let name = &bank.name;
    if !bank.interest_rate_range.is_finite() {
        return Err(SimError::invalid(format!("bank '{name}': non-finite interest rate range")));
    }
    if !bank
        .interest_rate_range
        .within(&market.min_interest_rate_range, &market.max_interest_rate_range)
    {
        return Err(SimError::invalid(format!(
            "bank '{name}': interest rate range {:?} is outside the market bounds",
            bank.interest_rate_range
        )));
    }
    if !(bank.utility_repaid.is_finite() && bank.utility_repaid >= 0.0) {
        return Err(SimError::invalid(format!("bank '{name}': utility_repaid must be >= 0")));
    }
    if !(bank.utility_default.is_finite() && bank.utility_default <= 0.0) {
        return Err(SimError::invalid(format!("bank '{name}': utility_default must be <= 0")));
    }
    if !(bank.interest_change_up.is_finite() && bank.interest_change_up >= 0.0) {
        return Err(SimError::invalid(format!("bank '{name}': interest_change_up must be >= 0")));
    }
    if !(bank.interest_change_down.is_finite() && bank.interest_change_down <= 0.0) {
        return Err(SimError::invalid(format!("bank '{name}': interest_change_down must be <= 0")));
    }
    Ok(())
}

fn validate_group(group: &GroupParams) -> Result<(), SimError> {
    let name = &group.name;
    if group.size == Some(0) {
        return Err(SimError::invalid(format!("group '{name}': size must be > 0")));
    }
    if !(0.0..=1.0).contains(&group.loan_demand) {
        return Err(SimError::invalid(format!("group '{name}': loan_demand must be in [0, 1]")));
    }
    if !(0.0..=1.0).contains(&group.error_rate) {
        return Err(SimError::invalid(format!("group '{name}': error_rate must be in [0, 1]")));
    }
    // NaN fails this comparison too.
    if !(group.interest_rate_limit >= 0.0) {
        return Err(SimError::invalid(format!(
            "group '{name}': interest_rate_limit must be >= 0"
        )));
    }
    Ok(())
}
