//! A single credit-seeking applicant.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agents::RepayCurve;
use crate::domain::Outcome;
use crate::market::ScoreDynamics;

/// One applicant: a reported score, a ground-truth score and a rate ceiling.
///
/// Repay probabilities are re-derived from the owning group's curve whenever a
/// score changes, so `repay_prob == curve[score]` and
/// `real_repay_prob == curve[real_score]` always hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    score: i32,
    real_score: i32,
    repay_prob: f64,
    real_repay_prob: f64,
    ir_limit: f64,
}

impl Applicant {
    pub fn new(score: i32, real_score: i32, ir_limit: f64, curve: &RepayCurve) -> Self {
        let score = curve.range().clamp(score as i64);
        let real_score = curve.range().clamp(real_score as i64);
        Self {
            score,
            real_score,
            repay_prob: curve.prob(score),
            real_repay_prob: curve.prob(real_score),
            ir_limit,
        }
    }

    pub fn score(&self) -> i32 {
        self.score
    }

    pub fn real_score(&self) -> i32 {
        self.real_score
    }

    pub fn repay_prob(&self) -> f64 {
        self.repay_prob
    }

    pub fn real_repay_prob(&self) -> f64 {
        self.real_repay_prob
    }

    /// Highest interest rate this applicant accepts.
    pub fn ir_limit(&self) -> f64 {
        self.ir_limit
    }

    /// Draw a repay outcome from the real repay probability. Does not mutate.
    pub fn draw_outcome<R: Rng + ?Sized>(&self, rng: &mut R) -> Outcome {
        let u: f64 = rng.r#gen();
        if u < 1.0 - self.real_repay_prob {
            Outcome::Defaulted
        } else {
            Outcome::Repaid
        }
    }

    /// Shift both scores by the outcome's delta, clamped to the score range.
    pub fn apply_outcome(&mut self, outcome: Outcome, dynamics: ScoreDynamics, curve: &RepayCurve) {
        let delta = dynamics.delta(outcome) as i64;
        self.score = dynamics.range.clamp(self.score as i64 + delta);
        self.real_score = dynamics.range.clamp(self.real_score as i64 + delta);
        self.repay_prob = curve.prob(self.score);
        self.real_repay_prob = curve.prob(self.real_score);
    }

    /// Draw an outcome and apply it.
    pub fn resolve_loan<R: Rng + ?Sized>(
        &mut self,
        dynamics: ScoreDynamics,
        curve: &RepayCurve,
        rng: &mut R,
    ) -> Outcome {
        let outcome = self.draw_outcome(rng);
        self.apply_outcome(outcome, dynamics, curve);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::data::ScoreCurve;
    use crate::domain::ScoreRange;

    fn setup() -> (RepayCurve, ScoreDynamics) {
        let range = ScoreRange::new(300, 850).unwrap();
        let curve = RepayCurve::from_curve(range, &ScoreCurve::new(vec![300.0, 850.0], vec![0.0, 1.0])).unwrap();
        let dynamics = ScoreDynamics {
            range,
            repay_score: 75,
            default_score: -150,
        };
        (curve, dynamics)
    }

    #[test]
    fn scores_clamp_at_both_ends() {
        let (curve, dynamics) = setup();
        let mut a = Applicant::new(800, 820, 0.3, &curve);
        a.apply_outcome(Outcome::Repaid, dynamics, &curve);
        assert_eq!(a.score(), 850);
        assert_eq!(a.real_score(), 850);
        assert_eq!(a.repay_prob(), 1.0);

        let mut b = Applicant::new(400, 350, 0.3, &curve);
        b.apply_outcome(Outcome::Defaulted, dynamics, &curve);
        assert_eq!(b.score(), 300);
        assert_eq!(b.real_score(), 300);
        assert_eq!(b.real_repay_prob(), 0.0);
    }

    #[test]
    fn certain_probabilities_give_certain_outcomes() {
        let (curve, dynamics) = setup();
        let mut rng = StdRng::seed_from_u64(5);
        let mut top = Applicant::new(850, 850, 0.3, &curve);
        let bottom = Applicant::new(300, 300, 0.3, &curve);
        for _ in 0..100 {
            assert_eq!(bottom.draw_outcome(&mut rng), Outcome::Defaulted);
        }
        assert_eq!(top.resolve_loan(dynamics, &curve, &mut rng), Outcome::Repaid);
        assert_eq!(top.score(), 850);
    }

    #[test]
    fn probabilities_follow_real_score() {
        let (curve, _) = setup();
        let a = Applicant::new(575, 300, 0.3, &curve);
        assert!((a.repay_prob() - 0.5).abs() < 1e-12);
        assert_eq!(a.real_repay_prob(), 0.0);
    }
}
