//! Distribution reconstruction.
//!
//! Turns an empirical CDF over a discrete score support plus a target population
//! size into a concrete, ascending list of integer scores. This seeds the whole
//! run, so it is fully deterministic: same CDF, same support, same total, same
//! output.
//!
//! Steps:
//! 1. CDF -> probability mass per support point (forward difference).
//! 2. Mass * total -> integer count per point (ties to even). Rounding drift is
//!    reconciled so the counts add up to the requested total.
//! 3. Each point's count is spread evenly over the half-interval reaching to
//!    the midpoints of its neighbours, and every value is rounded to an integer.

use log::warn;

use crate::data::ScoreCurve;
use crate::error::SimError;

/// Probability mass per support point.
///
/// The first bucket is the CDF value at the first point; subsequent buckets are
/// forward differences.
pub fn pmf_from_cdf(cdf: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(cdf.len());
    let mut prev = 0.0;
    for &c in cdf {
        out.push(c - prev);
        prev = c;
    }
    out
}

/// Integer applicant count per support point, summing to exactly `total`.
pub fn bucket_counts(pmf: &[f64], total: usize) -> Vec<usize> {
    let mass: f64 = pmf.iter().sum();
    if pmf.is_empty() || mass <= 0.0 {
        return vec![0; pmf.len()];
    }
    if (mass - 1.0).abs() > 1e-9 {
        warn!("score distribution mass is {mass:.6}; normalizing to 1");
    }

    let exact: Vec<f64> = pmf.iter().map(|p| p.max(0.0) / mass * total as f64).collect();
    let mut counts: Vec<usize> = exact.iter().map(|x| x.round_ties_even() as usize).collect();

    let assigned: usize = counts.iter().sum();
    if assigned != total {
        warn!("reconciling reconstruction rounding drift: {assigned} assigned, {total} requested");
        reconcile(&mut counts, &exact, total);
    }
    counts
}

// Add to the buckets that were rounded down the most, or take from the ones
// rounded up the most, until the sum matches. Ties go to the lower index.
fn reconcile(counts: &mut [usize], exact: &[f64], total: usize) {
    let mut assigned: usize = counts.iter().sum();
    while assigned != total {
        let grow = assigned < total;
        let mut pick: Option<(usize, f64)> = None;
        for (i, (&c, &x)) in counts.iter().zip(exact).enumerate() {
            if !grow && c == 0 {
                continue;
            }
            let residual = if grow { x - c as f64 } else { c as f64 - x };
            match pick {
                Some((_, best)) if residual <= best => {}
                _ => pick = Some((i, residual)),
            }
        }
        let Some((i, _)) = pick else { break };
        if grow {
            counts[i] += 1;
            assigned += 1;
        } else {
            counts[i] -= 1;
            assigned -= 1;
        }
    }
}

/// Spread `counts[j]` values evenly around each support point.
///
/// Interior points cover `[s_j - d_down, s_j + d_up)`; the first point covers
/// `[s_0, s_0 + d_up)` and the last `[s_n - d_down, s_n)`, where `d_*` is half
/// the distance to the neighbour. The output is ascending.
pub fn spread_scores(support: &[f64], counts: &[usize]) -> Vec<i32> {
    let total: usize = counts.iter().sum();
    let mut out = Vec::with_capacity(total);
    let last = support.len().saturating_sub(1);

    for (j, (&s, &c)) in support.iter().zip(counts).enumerate() {
        if c == 0 {
            continue;
        }
        let (start, width) = if support.len() == 1 {
            (s, 0.0)
        } else if j == 0 {
            (s, (support[1] - s) / 2.0)
        } else if j == last {
            let down = (s - support[j - 1]) / 2.0;
            (s - down, down)
        } else {
            let down = (s - support[j - 1]) / 2.0;
            let up = (support[j + 1] - s) / 2.0;
            (s - down, down + up)
        };
        let step = width / c as f64;
        for k in 0..c {
            out.push((start + k as f64 * step).round_ties_even() as i32);
        }
    }
    out
}

/// Reconstruct `total` ascending integer scores from an empirical CDF.
pub fn reconstruct_scores(cdf: &ScoreCurve, total: usize) -> Result<Vec<i32>, SimError> {
    cdf.validate_cdf("score distribution")?;
    if total == 0 {
        return Err(SimError::empty("reconstruction target population is zero"));
    }

    let pmf = pmf_from_cdf(&cdf.values);
    if pmf.iter().sum::<f64>() <= 0.0 {
        return Err(SimError::invalid("score distribution has no probability mass"));
    }
    let counts = bucket_counts(&pmf, total);
    Ok(spread_scores(&cdf.scores, &counts))
}
