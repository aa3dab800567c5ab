//! Applicant groups and their repay-probability curves.

use log::debug;
use rand::Rng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use crate::agents::Applicant;
use crate::data::{GroupStatistics, ScoreCurve, reconstruct_scores};
use crate::domain::{GroupParams, Histogram, Outcome, ScoreRange};
use crate::error::SimError;
use crate::market::ScoreDynamics;
use crate::math::interp;

/// Repay probability for every integer score in a [`ScoreRange`].
///
/// Built once per group by linear interpolation of the empirical curve onto the
/// integer grid. Scores outside the empirical support take the nearest end value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepayCurve {
    range: ScoreRange,
    probs: Vec<f64>,
}

impl RepayCurve {
    pub fn from_curve(range: ScoreRange, curve: &ScoreCurve) -> Result<Self, SimError> {
        curve.validate_probability("repay curve")?;
        let probs = range
            .scores()
            .map(|s| interp(s as f64, &curve.scores, &curve.values))
            .collect();
        Ok(Self { range, probs })
    }

    pub fn range(&self) -> ScoreRange {
        self.range
    }

    pub fn prob(&self, score: i32) -> f64 {
        self.probs[self.range.index_of(score)]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.probs
    }
}

/// An ordered population of applicants.
///
/// `applicants` is kept sorted by reported score, descending. Every selection
/// policy walks the group best-first and relies on that order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicantGroup {
    pub name: String,
    pub color: String,
    pub line_style: String,
    loan_demand: f64,
    error_rate: f64,
    score_error: i32,
    repay_curve: RepayCurve,
    applicants: Vec<Applicant>,
    initial_mean_score: f64,
}

impl ApplicantGroup {
    /// Build a group from reconstructed (ascending) scores.
    ///
    /// Real scores start as a copy of the reported ones; then
    /// `round(size * error_rate)` distinct applicants drawn from `rng` have
    /// their real score shifted by `score_error`.
    pub fn new<R: Rng + ?Sized>(
        params: &GroupParams,
        scores: &[i32],
        repay_curve: RepayCurve,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        if scores.is_empty() {
            return Err(SimError::empty(format!("group '{}' has no applicants", params.name)));
        }
        let range = repay_curve.range();
        let mut real_scores = scores.to_vec();
        let mismeasured = ((scores.len() as f64) * params.error_rate).round_ties_even() as usize;
        let mismeasured = mismeasured.min(scores.len());
        for i in index::sample(rng, scores.len(), mismeasured).into_iter() {
            real_scores[i] = range.clamp(real_scores[i] as i64 + params.score_error as i64);
        }

        let applicants = scores
            .iter()
            .zip(&real_scores)
            .map(|(&s, &r)| Applicant::new(s, r, params.interest_rate_limit, &repay_curve))
            .collect();

        let mut group = Self {
            name: params.name.clone(),
            color: params.color.clone(),
            line_style: params.line_style.clone(),
            loan_demand: params.loan_demand,
            error_rate: params.error_rate,
            score_error: params.score_error,
            repay_curve,
            applicants,
            initial_mean_score: 0.0,
        };
        group.sort_by_score();
        group.initial_mean_score = group.mean_score();
        debug!(
            "group {}: {} applicants, {} mismeasured, mean score {:.1}",
            group.name,
            group.size(),
            mismeasured,
            group.initial_mean_score
        );
        Ok(group)
    }

    /// Reconstruct the initial population from provider statistics.
    ///
    /// The configured size wins; a group without one uses the reference
    /// population from the statistics.
    pub fn from_statistics<R: Rng + ?Sized>(
        params: &GroupParams,
        stats: &GroupStatistics,
        range: ScoreRange,
        rng: &mut R,
    ) -> Result<Self, SimError> {
        let (cdf, repay, population) = stats.group(&params.name)?;
        let size = params.size.or(population).ok_or_else(|| {
            SimError::invalid(format!("group '{}' has no size and no reference population", params.name))
        })?;
        let scores = reconstruct_scores(cdf, size)?;
        let repay_curve = RepayCurve::from_curve(range, repay)?;
        Self::new(params, &scores, repay_curve, rng)
    }

    pub fn size(&self) -> usize {
        self.applicants.len()
    }

    pub fn loan_demand(&self) -> f64 {
        self.loan_demand
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    pub fn score_error(&self) -> i32 {
        self.score_error
    }

    pub fn repay_curve(&self) -> &RepayCurve {
        &self.repay_curve
    }

    pub fn repay_prob(&self, score: i32) -> f64 {
        self.repay_curve.prob(score)
    }

    /// Applicants, best score first.
    pub fn applicants(&self) -> &[Applicant] {
        &self.applicants
    }

    pub fn initial_mean_score(&self) -> f64 {
        self.initial_mean_score
    }

    /// Restore descending score order. Stable, so equal scores keep their order.
    pub fn sort_by_score(&mut self) {
        self.applicants.sort_by(|a, b| b.score().cmp(&a.score()));
    }

    /// Draw and apply a repay outcome for the applicant at `idx`.
    ///
    /// Leaves the group unsorted; callers re-sort once they are done mutating.
    pub fn resolve_loan<R: Rng + ?Sized>(&mut self, idx: usize, dynamics: ScoreDynamics, rng: &mut R) -> Outcome {
        self.applicants[idx].resolve_loan(dynamics, &self.repay_curve, rng)
    }

    /// This step's loan seekers: `round(size * loan_demand)` distinct indices,
    /// ascending.
    pub fn sample_loan_seekers<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let size = self.size();
        let n = ((size as f64) * self.loan_demand).round_ties_even() as usize;
        let mut picked = index::sample(rng, size, n.min(size)).into_vec();
        picked.sort_unstable();
        picked
    }

    pub fn scores(&self) -> Vec<i32> {
        self.applicants.iter().map(Applicant::score).collect()
    }

    pub fn real_scores(&self) -> Vec<i32> {
        self.applicants.iter().map(Applicant::real_score).collect()
    }

    pub fn mean_score(&self) -> f64 {
        if self.applicants.is_empty() {
            return 0.0;
        }
        let sum: i64 = self.applicants.iter().map(|a| a.score() as i64).sum();
        sum as f64 / self.applicants.len() as f64
    }

    /// Mean reported score relative to the population at construction.
    pub fn mean_score_change(&self) -> f64 {
        self.mean_score() - self.initial_mean_score
    }

    pub fn score_histogram(&self, bins: usize) -> Histogram {
        Histogram::from_scores(self.applicants.iter().map(Applicant::score), self.repay_curve.range(), bins)
    }

    pub fn real_score_histogram(&self, bins: usize) -> Histogram {
        Histogram::from_scores(
            self.applicants.iter().map(Applicant::real_score),
            self.repay_curve.range(),
            bins,
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn range() -> ScoreRange {
        ScoreRange::new(300, 850).unwrap()
    }

    fn linear_curve() -> RepayCurve {
        RepayCurve::from_curve(range(), &ScoreCurve::new(vec![300.0, 850.0], vec![0.0, 1.0])).unwrap()
    }

    fn params(error_rate: f64, score_error: i32) -> GroupParams {
        let mut p = GroupParams::new("G", 10);
        p.error_rate = error_rate;
        p.score_error = score_error;
        p
    }

    #[test]
    fn repay_curve_covers_every_score() {
        let curve = RepayCurve::from_curve(range(), &ScoreCurve::new(vec![400.0, 800.0], vec![0.2, 0.6])).unwrap();
        assert_eq!(curve.as_slice().len(), 551);
        assert_eq!(curve.prob(300), 0.2);
        assert_eq!(curve.prob(850), 0.6);
        assert!((curve.prob(600) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn population_is_sorted_descending() {
        let mut rng = StdRng::seed_from_u64(1);
        let scores: Vec<i32> = (0..10).map(|i| 400 + 30 * i).collect();
        let g = ApplicantGroup::new(&params(0.0, 0), &scores, linear_curve(), &mut rng).unwrap();
        assert_eq!(g.size(), 10);
        assert!(g.scores().windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(g.scores(), g.real_scores());
        assert_eq!(g.mean_score_change(), 0.0);
    }

    #[test]
    fn mismeasured_count_matches_error_rate() {
        let mut rng = StdRng::seed_from_u64(2);
        let scores = vec![500; 10];
        let g = ApplicantGroup::new(&params(0.3, 40), &scores, linear_curve(), &mut rng).unwrap();
        let shifted = g.real_scores().iter().filter(|&&r| r == 540).count();
        assert_eq!(shifted, 3);
        assert!(g.scores().iter().all(|&s| s == 500));
    }

    #[test]
    fn real_score_shift_is_clamped() {
        let mut rng = StdRng::seed_from_u64(3);
        let scores = vec![320, 330];
        let g = ApplicantGroup::new(&params(1.0, -150), &scores, linear_curve(), &mut rng).unwrap();
        assert!(g.real_scores().iter().all(|&r| r == 300));
        assert!(g.applicants().iter().all(|a| a.real_repay_prob() == 0.0));
    }

    #[test]
    fn seekers_are_distinct_and_sized() {
        let mut rng = StdRng::seed_from_u64(4);
        let scores: Vec<i32> = (0..100).map(|i| 300 + 5 * i).collect();
        let mut p = params(0.0, 0);
        p.loan_demand = 0.25;
        let g = ApplicantGroup::new(&p, &scores, linear_curve(), &mut rng).unwrap();
        let seekers = g.sample_loan_seekers(&mut rng);
        assert_eq!(seekers.len(), 25);
        assert!(seekers.windows(2).all(|w| w[0] < w[1]));
        assert!(seekers.iter().all(|&i| i < 100));
    }

    #[test]
    fn empty_population_is_rejected() {
        let mut rng = StdRng::seed_from_u64(5);
        let err = ApplicantGroup::new(&params(0.0, 0), &[], linear_curve(), &mut rng).unwrap_err();
        assert!(matches!(err, SimError::EmptyPopulation(_)));
    }

    #[test]
    fn histograms_count_everyone() {
        let mut rng = StdRng::seed_from_u64(6);
        let scores: Vec<i32> = (0..50).map(|i| 300 + 11 * i).collect();
        let g = ApplicantGroup::new(&params(0.2, 100), &scores, linear_curve(), &mut rng).unwrap();
        assert_eq!(g.score_histogram(10).total(), 50);
        assert_eq!(g.real_score_histogram(10).total(), 50);
    }
}
