//! Lenders: score-to-rate pricing, utility evaluation, adaptive pricing.

use std::collections::HashMap;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::agents::ApplicantGroup;
use crate::domain::{BankParams, Outcome, RateRange, ScoreRange};
use crate::market::{Market, PlaneSlice};
use crate::math::{cumulative, interp, round_to};

/// Decimals kept in a bank's per-score rate table.
pub const RATE_DECIMALS: i32 = 4;
/// Decimals kept when shifting a bank's anchor range.
pub const ADJUST_DECIMALS: i32 = 5;

/// Interest rate for every integer score, linear between two anchors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestRateMapping {
    range: ScoreRange,
    rates: Vec<f64>,
}

impl InterestRateMapping {
    pub fn new(range: ScoreRange, anchors: RateRange, decimals: i32) -> Self {
        let xp = [range.min as f64, range.max as f64];
        let fp = [anchors.low_score, anchors.high_score];
        let rates = range
            .scores()
            .map(|s| round_to(interp(s as f64, &xp, &fp), decimals))
            .collect();
        Self { range, rates }
    }

    pub fn rate(&self, score: i32) -> f64 {
        self.rates[self.range.index_of(score)]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.rates
    }
}

/// Result of a pricing move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateAdjustment {
    /// The anchors moved to the carried range.
    Applied(RateRange),
    /// The move would have left the legal band; nothing changed.
    Blocked,
}

impl RateAdjustment {
    pub fn is_applied(&self) -> bool {
        matches!(self, RateAdjustment::Applied(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    pub name: String,
    pub color: String,
    pub line_style: String,
    interest_rate_range: RateRange,
    mapping: InterestRateMapping,
    pub score_shift: i32,
    pub utility_repaid: f64,
    pub utility_default: f64,
    pub interest_change_up: f64,
    pub interest_change_down: f64,

    // Recomputed every step.
    pub expected_group_utility_curve: HashMap<String, Vec<f64>>,
    pub group_selection_rate: HashMap<String, f64>,
    pub real_group_utility_curve: HashMap<String, Vec<f64>>,
    pub market_share: f64,

    // Running totals, one entry per step.
    pub n_loan_curves: HashMap<String, Vec<usize>>,
    pub total_utility_curves: HashMap<String, Vec<f64>>,
}

impl Bank {
    pub fn new(params: &BankParams, range: ScoreRange) -> Self {
        Self {
            name: params.name.clone(),
            color: params.color.clone(),
            line_style: params.line_style.clone(),
            interest_rate_range: params.interest_rate_range,
            mapping: InterestRateMapping::new(range, params.interest_rate_range, RATE_DECIMALS),
            score_shift: params.score_shift,
            utility_repaid: params.utility_repaid,
            utility_default: params.utility_default,
            interest_change_up: params.interest_change_up,
            interest_change_down: params.interest_change_down,
            expected_group_utility_curve: HashMap::new(),
            group_selection_rate: HashMap::new(),
            real_group_utility_curve: HashMap::new(),
            market_share: 0.0,
            n_loan_curves: HashMap::new(),
            total_utility_curves: HashMap::new(),
        }
    }

    pub fn interest_rate_range(&self) -> RateRange {
        self.interest_rate_range
    }

    pub fn mapping(&self) -> &InterestRateMapping {
        &self.mapping
    }

    pub fn score_to_rate(&self, score: i32) -> f64 {
        self.mapping.rate(score)
    }

    /// The bank's biased belief about an applicant's score.
    pub fn expected_score(&self, range: ScoreRange, applicant_score: i32) -> i32 {
        range.clamp(applicant_score as i64 + self.score_shift as i64)
    }

    /// Ex-ante expected utility of lending at a believed score.
    pub fn evaluation_utility(&self, expected_score: i32, group: &ApplicantGroup) -> f64 {
        let p = group.repay_prob(expected_score);
        self.utility_default * (1.0 - p) + (self.utility_repaid + self.score_to_rate(expected_score)) * p
    }

    pub fn realized_utility(&self, rate: f64, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Repaid => self.utility_repaid + rate,
            Outcome::Defaulted => self.utility_default,
        }
    }

    /// Cumulative evaluation utility over the group, best score first.
    pub fn cumulative_utility(&self, range: ScoreRange, group: &ApplicantGroup) -> Vec<f64> {
        cumulative(
            group
                .applicants()
                .iter()
                .map(|a| self.evaluation_utility(self.expected_score(range, a.score()), group)),
        )
    }

    /// Shift both anchors by `delta` if the result stays inside the market's
    /// rate bounds. Blocked moves leave the bank untouched.
    pub fn adjust_interest_rate(&mut self, delta: f64, market: &Market) -> RateAdjustment {
        let next = RateRange::new(
            round_to(self.interest_rate_range.low_score + delta, ADJUST_DECIMALS),
            round_to(self.interest_rate_range.high_score + delta, ADJUST_DECIMALS),
        );
        if !next.within(&market.min_interest_rate_range, &market.max_interest_rate_range) {
            debug!("bank {}: rate move {delta:+} blocked at {:?}", self.name, self.interest_rate_range);
            return RateAdjustment::Blocked;
        }
        self.set_interest_rate_range(next, market.score_range);
        RateAdjustment::Applied(next)
    }

    /// Adopt a precomputed plane slice as the bank's pricing.
    pub fn apply_rate_slice(&mut self, slice: &PlaneSlice) {
        self.interest_rate_range = slice.anchors;
        self.mapping = slice.mapping.clone();
    }

    fn set_interest_rate_range(&mut self, anchors: RateRange, range: ScoreRange) {
        self.interest_rate_range = anchors;
        self.mapping = InterestRateMapping::new(range, anchors, RATE_DECIMALS);
    }

    pub fn selection_rate(&self, group: &str) -> Option<f64> {
        self.group_selection_rate.get(group).copied()
    }

    pub fn set_selection_rates(&mut self, rates: &HashMap<String, f64>) {
        self.group_selection_rate = rates.clone();
    }

    /// Append this step's loans and utility to the running totals for `group`.
    pub fn accumulate(&mut self, group: &str, loans: usize, utility: f64) {
        let loans_curve = self.n_loan_curves.entry(group.to_string()).or_default();
        let prev = loans_curve.last().copied().unwrap_or(0);
        loans_curve.push(prev + loans);

        let utility_curve = self.total_utility_curves.entry(group.to_string()).or_default();
        let prev = utility_curve.last().copied().unwrap_or(0.0);
        utility_curve.push(prev + utility);
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::agents::RepayCurve;
    use crate::data::ScoreCurve;
    use crate::domain::{GroupParams, MarketParams};

    fn market() -> Market {
        Market::new(&MarketParams::default()).unwrap()
    }

    fn bank(low: f64, high: f64) -> Bank {
        Bank::new(&BankParams::new("b", RateRange::new(low, high)), market().score_range)
    }

    fn group() -> ApplicantGroup {
        let range = market().score_range;
        let curve = RepayCurve::from_curve(range, &ScoreCurve::new(vec![300.0, 850.0], vec![0.0, 1.0])).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        ApplicantGroup::new(&GroupParams::new("g", 3), &[400, 575, 800], curve, &mut rng).unwrap()
    }

    #[test]
    fn mapping_interpolates_and_rounds() {
        let b = bank(0.15, 0.06);
        assert_eq!(b.score_to_rate(300), 0.15);
        assert_eq!(b.score_to_rate(850), 0.06);
        // 0.15 - 0.09 * 275 / 550 = 0.105
        assert!((b.score_to_rate(575) - 0.105).abs() < 1e-12);
        assert!(b.mapping().as_slice().iter().all(|r| (r * 1e4).round() / 1e4 == *r));
    }

    #[test]
    fn expected_score_is_shifted_and_clamped() {
        let mut b = bank(0.15, 0.06);
        b.score_shift = 50;
        let range = market().score_range;
        assert_eq!(b.expected_score(range, 700), 750);
        assert_eq!(b.expected_score(range, 840), 850);
        b.score_shift = -25;
        assert_eq!(b.expected_score(range, 310), 300);
    }

    #[test]
    fn evaluation_utility_mixes_outcomes() {
        let b = bank(0.1, 0.1);
        let g = group();
        // p = 0.5 at 575: -4 * 0.5 + (1 + 0.1) * 0.5
        assert!((b.evaluation_utility(575, &g) - (-1.45)).abs() < 1e-9);
        assert_eq!(b.evaluation_utility(300, &g), -4.0);
        assert!((b.evaluation_utility(850, &g) - 1.1).abs() < 1e-12);
    }

    #[test]
    fn realized_utility_by_outcome() {
        let b = bank(0.1, 0.1);
        assert!((b.realized_utility(0.07, Outcome::Repaid) - 1.07).abs() < 1e-12);
        assert_eq!(b.realized_utility(0.07, Outcome::Defaulted), -4.0);
    }

    #[test]
    fn cumulative_utility_walks_best_first() {
        let b = bank(0.1, 0.1);
        let g = group();
        let c = b.cumulative_utility(market().score_range, &g);
        assert_eq!(c.len(), 3);
        assert!((c[0] - b.evaluation_utility(800, &g)).abs() < 1e-12);
        assert!(c[2] < c[1]);
    }

    #[test]
    fn adjustment_moves_both_anchors() {
        let m = market();
        let mut b = bank(0.15, 0.06);
        let moved = b.adjust_interest_rate(0.01, &m);
        assert_eq!(moved, RateAdjustment::Applied(RateRange::new(0.16, 0.07)));
        assert_eq!(b.score_to_rate(300), 0.16);
    }

    #[test]
    fn pricing_never_leaves_the_band() {
        let m = market();
        let mut b = bank(0.45, 0.30);
        for _ in 0..100 {
            b.adjust_interest_rate(0.01, &m);
        }
        assert_eq!(b.interest_rate_range(), RateRange::new(0.5, 0.35));
        assert_eq!(b.adjust_interest_rate(0.01, &m), RateAdjustment::Blocked);

        for _ in 0..100 {
            b.adjust_interest_rate(-0.01, &m);
        }
        let r = b.interest_rate_range();
        assert!(r.within(&m.min_interest_rate_range, &m.max_interest_rate_range));
        assert!(r.high_score < 0.011);
    }

    #[test]
    fn at_max_bound_increase_is_noop() {
        let m = market();
        let mut b = bank(0.5, 0.5);
        assert_eq!(b.adjust_interest_rate(0.01, &m), RateAdjustment::Blocked);
        assert_eq!(b.interest_rate_range(), RateRange::flat(0.5));
    }

    #[test]
    fn totals_accumulate_per_step() {
        let mut b = bank(0.1, 0.1);
        b.accumulate("g", 3, 1.5);
        b.accumulate("g", 2, -4.0);
        assert_eq!(b.n_loan_curves["g"], vec![3, 5]);
        assert_eq!(b.total_utility_curves["g"], vec![1.5, -2.5]);
    }
}
