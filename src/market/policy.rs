//! Selection-rate policies.
//!
//! Every policy walks each group best score first, builds a bank's cumulative
//! expected-utility curve and picks the peak selection index (the last index
//! attaining the maximum). They differ in how groups are combined:
//!
//! - MaxUtility: groups are independent
//! - DemographicParity: curves are resampled to the largest group's length and
//!   summed; every group gets the same rate
//! - EqualOpportunity: like DemographicParity, but over each group's
//!   true-positive subsequence, found by drawing a real repay outcome for every
//!   applicant. Those draws mutate scores and are kept.

use std::collections::HashMap;

use log::{debug, trace};
use rand::Rng;

use crate::agents::{ApplicantGroup, Bank};
use crate::error::SimError;
use crate::market::Market;
use crate::math::{curve_max, peak_index, resample};

/// Polynomial degree used to resample DemographicParity curves.
pub const PARITY_FIT_DEGREE: usize = 3;
/// Polynomial degree used to resample EqualOpportunity curves.
pub const OPPORTUNITY_FIT_DEGREE: usize = 5;

/// Output of one policy evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectionRates {
    /// bank -> group -> fraction of the group (best first) the bank lends to
    pub rates: HashMap<String, HashMap<String, f64>>,
    /// bank -> maximum achievable expected utility this step
    pub max_utility: HashMap<String, f64>,
}

impl SelectionRates {
    pub fn rate(&self, bank: &str, group: &str) -> Option<f64> {
        self.rates.get(bank)?.get(group).copied()
    }
}

pub(crate) fn max_utility(
    market: &Market,
    banks: &mut [Bank],
    groups: &[ApplicantGroup],
) -> Result<SelectionRates, SimError> {
    let mut out = SelectionRates::default();
    for bank in banks.iter_mut() {
        let mut rates = HashMap::new();
        let mut best = 0.0;
        for group in groups {
            let curve = bank.cumulative_utility(market.score_range, group);
            let peak = peak_index(&curve)?;
            rates.insert(group.name.clone(), peak as f64 / group.size() as f64);
            best += curve[peak];
            bank.expected_group_utility_curve.insert(group.name.clone(), curve);
        }
        debug!("bank {}: max-utility rates {rates:?}", bank.name);
        out.rates.insert(bank.name.clone(), rates);
        out.max_utility.insert(bank.name.clone(), best);
    }
    Ok(out)
}

/// Sum curves after stretching each to `target_len` points. Curves already of
/// that length are used as-is; empty curves contribute nothing.
fn merge_curves(curves: &[&[f64]], target_len: usize, degree: usize) -> Result<Vec<f64>, SimError> {
    if target_len == 0 {
        return Err(SimError::empty("merged utility curve has no points"));
    }
    let mut merged = vec![0.0; target_len];
    for curve in curves.iter().filter(|c| !c.is_empty()) {
        let stretched = resample(curve, target_len, degree)?;
        for (m, v) in merged.iter_mut().zip(&stretched) {
            *m += v;
        }
    }
    Ok(merged)
}

pub(crate) fn demographic_parity(
    market: &Market,
    banks: &mut [Bank],
    groups: &[ApplicantGroup],
) -> Result<SelectionRates, SimError> {
    let max_size = groups.iter().map(ApplicantGroup::size).max().unwrap_or(0);
    let mut out = SelectionRates::default();

    for bank in banks.iter_mut() {
        let curves: Vec<Vec<f64>> = groups
            .iter()
            .map(|g| bank.cumulative_utility(market.score_range, g))
            .collect();
        let refs: Vec<&[f64]> = curves.iter().map(Vec::as_slice).collect();
        let merged = merge_curves(&refs, max_size, PARITY_FIT_DEGREE)?;

        let rate = peak_index(&merged)? as f64 / max_size as f64;
        let best = curve_max(&merged).unwrap_or(0.0);

        let mut rates = HashMap::new();
        for group in groups {
            rates.insert(group.name.clone(), rate);
            bank.expected_group_utility_curve.insert(group.name.clone(), merged.clone());
        }
        debug!("bank {}: parity rate {rate:.4}", bank.name);
        out.rates.insert(bank.name.clone(), rates);
        out.max_utility.insert(bank.name.clone(), best);
    }
    Ok(out)
}

/// Full-population rate for a group whose true-positive subsequence has
/// `tp_len` members, given the rate chosen over the merged curve.
///
/// Picks the first true-positive position `i` with `i / tp_len < rate <=
/// (i + 1) / tp_len` and returns `(i + 1) / size`. When no position crosses,
/// the merged rate is returned unchanged.
pub fn translate_tp_rate(rate: f64, tp_len: usize, size: usize) -> f64 {
    if tp_len == 0 {
        return 0.0;
    }
    let n = tp_len as f64;
    (0..tp_len)
        .find(|&i| (i as f64) / n < rate && ((i + 1) as f64) / n >= rate)
        .map(|i| (i + 1) as f64 / size as f64)
        .unwrap_or(rate)
}

pub(crate) fn equal_opportunity<R: Rng + ?Sized>(
    market: &Market,
    banks: &mut [Bank],
    groups: &mut [ApplicantGroup],
    rng: &mut R,
) -> Result<SelectionRates, SimError> {
    let dynamics = market.dynamics();
    let mut out = SelectionRates::default();

    for bank in banks.iter_mut() {
        let mut tp_curves: Vec<Vec<f64>> = Vec::with_capacity(groups.len());
        for group in groups.iter_mut() {
            let mut utility = 0.0;
            let mut curve = Vec::new();
            for i in 0..group.size() {
                let expected = bank.expected_score(market.score_range, group.applicants()[i].score());
                let outcome = group.resolve_loan(i, dynamics, rng);
                if outcome.is_repaid() {
                    utility += bank.evaluation_utility(expected, group);
                    curve.push(utility);
                }
            }
            trace!("bank {}: {} true positives in {}", bank.name, curve.len(), group.name);
            tp_curves.push(curve);
        }

        let max_len = tp_curves.iter().map(Vec::len).max().unwrap_or(0);
        let refs: Vec<&[f64]> = tp_curves.iter().map(Vec::as_slice).collect();
        let merged = merge_curves(&refs, max_len, OPPORTUNITY_FIT_DEGREE)?;

        let merged_rate = peak_index(&merged)? as f64 / max_len as f64;
        let best = curve_max(&merged).unwrap_or(0.0);

        let mut rates = HashMap::new();
        for (group, tp) in groups.iter().zip(&tp_curves) {
            let rate = translate_tp_rate(merged_rate, tp.len(), group.size());
            rates.insert(group.name.clone(), rate);
            bank.expected_group_utility_curve.insert(group.name.clone(), merged.clone());
        }
        debug!("bank {}: opportunity rates {rates:?}", bank.name);
        out.rates.insert(bank.name.clone(), rates);
        out.max_utility.insert(bank.name.clone(), best);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::agents::RepayCurve;
    use crate::data::ScoreCurve;
    use crate::domain::{BankParams, GroupParams, MarketParams, Policy, RateRange, ScoreRange};

    fn market(policy: Policy) -> Market {
        Market::new(&MarketParams {
            policy,
            ..MarketParams::default()
        })
        .unwrap()
    }

    fn curve(range: ScoreRange) -> RepayCurve {
        RepayCurve::from_curve(range, &ScoreCurve::new(vec![300.0, 850.0], vec![0.0, 1.0])).unwrap()
    }

    fn group(name: &str, size: usize, rng: &mut StdRng) -> ApplicantGroup {
        let range = ScoreRange::new(300, 850).unwrap();
        let scores: Vec<i32> = (0..size).map(|i| 300 + (550 * i / size.max(1)) as i32).collect();
        let mut p = GroupParams::new(name, size);
        p.error_rate = 0.0;
        ApplicantGroup::new(&p, &scores, curve(range), rng).unwrap()
    }

    fn banks(m: &Market) -> Vec<Bank> {
        vec![
            Bank::new(&BankParams::new("a", RateRange::new(0.15, 0.06)), m.score_range),
            Bank::new(
                &BankParams {
                    score_shift: 50,
                    ..BankParams::new("b", RateRange::new(0.10, 0.08))
                },
                m.score_range,
            ),
        ]
    }

    #[test]
    fn max_utility_peak_attains_maximum() {
        let mut rng = StdRng::seed_from_u64(1);
        let m = market(Policy::MaxUtility);
        let mut bs = banks(&m);
        let mut gs = vec![group("x", 200, &mut rng), group("y", 80, &mut rng)];
        let out = m.selection_rates(&mut bs, &mut gs, &mut rng).unwrap();

        for bank in &bs {
            for g in &gs {
                let c = &bank.expected_group_utility_curve[&g.name];
                let rate = out.rate(&bank.name, &g.name).unwrap();
                let idx = (rate * g.size() as f64).round() as usize;
                let max = curve_max(c).unwrap();
                assert_eq!(c[idx], max);
                assert!(c[idx + 1..].iter().all(|&v| v < max));
            }
        }
    }

    #[test]
    fn max_utility_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(2);
        let m = market(Policy::MaxUtility);
        let mut bs = banks(&m);
        let mut gs = vec![group("x", 150, &mut rng), group("y", 40, &mut rng)];
        let first = m.selection_rates(&mut bs, &mut gs, &mut rng).unwrap();
        let second = m.selection_rates(&mut bs, &mut gs, &mut rng).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn demographic_parity_rates_are_equal() {
        let mut rng = StdRng::seed_from_u64(3);
        let m = market(Policy::DemographicParity);
        let mut bs = banks(&m);
        let mut gs = vec![group("x", 1000, &mut rng), group("y", 100, &mut rng), group("z", 37, &mut rng)];
        let out = m.selection_rates(&mut bs, &mut gs, &mut rng).unwrap();
        for bank in &bs {
            let r: Vec<f64> = gs.iter().map(|g| out.rate(&bank.name, &g.name).unwrap()).collect();
            assert!(r.iter().all(|&x| x == r[0]));
            assert!((0.0..=1.0).contains(&r[0]));
            assert_eq!(bank.expected_group_utility_curve["y"].len(), 1000);
        }
    }

    #[test]
    fn equal_opportunity_draws_mutate_scores() {
        let mut rng = StdRng::seed_from_u64(4);
        let m = market(Policy::EqualOpportunity);
        let mut bs = banks(&m);
        let mut gs = vec![group("x", 120, &mut rng), group("y", 60, &mut rng)];
        let before: Vec<Vec<i32>> = gs.iter().map(|g| g.scores()).collect();

        let out = m.selection_rates(&mut bs, &mut gs, &mut rng).unwrap();

        // Two banks, so every applicant took two draws. The group is left unsorted,
        // so positions still identify the same applicants.
        let after: Vec<Vec<i32>> = gs.iter().map(|g| g.scores()).collect();
        assert_ne!(before, after);
        for (b, a) in before.iter().zip(&after) {
            for (&s0, &s1) in b.iter().zip(a) {
                assert!((300..=850).contains(&s1));
                if (600..=700).contains(&s0) {
                    assert!([-300, -75, 150].contains(&(s1 - s0)), "{s0} -> {s1}");
                }
            }
        }
        for bank in &bs {
            for g in &gs {
                let r = out.rate(&bank.name, &g.name).unwrap();
                assert!((0.0..=1.0).contains(&r));
            }
        }
    }

    #[test]
    fn tp_rate_translation() {
        // 10 true positives in a group of 40; merged rate 0.25 crosses at i = 2.
        assert_eq!(translate_tp_rate(0.25, 10, 40), 3.0 / 40.0);
        assert_eq!(translate_tp_rate(0.5, 0, 40), 0.0);
        // Rate 0 never crosses.
        assert_eq!(translate_tp_rate(0.0, 10, 40), 0.0);
    }

    #[test]
    fn merge_rejects_empty_target() {
        assert!(matches!(merge_curves(&[&[]], 0, 3), Err(SimError::EmptyPopulation(_))));
    }

    #[test]
    fn merge_keeps_full_length_curves_unchanged() {
        let a = [1.0, 2.0, 3.0];
        let merged = merge_curves(&[&a, &a], 3, 3).unwrap();
        assert_eq!(merged, vec![2.0, 4.0, 6.0]);
    }
}
