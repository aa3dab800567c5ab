//! Interpolation, rounding and curve-search helpers.

use crate::error::SimError;

/// Piecewise-linear interpolation of `(xp, fp)` at `x`.
///
/// `xp` must be ascending. Values outside `[xp[0], xp[last]]` take the nearest
/// endpoint value (flat extrapolation).
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    debug_assert_eq!(xp.len(), fp.len());
    let n = xp.len().min(fp.len());
    if n == 0 {
        return f64::NAN;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }

    // First knot strictly greater than x; guaranteed in 1..n here.
    let hi = xp[..n].partition_point(|&k| k <= x);
    let lo = hi - 1;
    linear_interp((xp[lo], fp[lo]), (xp[hi], fp[hi]), x)
}

fn linear_interp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    let (x0, y0) = a;
    let (x1, y1) = b;
    if (x1 - x0).abs() < 1e-12 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}

/// Round to `decimals` places, ties to even.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Largest index attaining the maximum of `curve`.
///
/// Ties resolve toward the later index, i.e. toward extending credit to more
/// applicants.
pub fn peak_index(curve: &[f64]) -> Result<usize, SimError> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in curve.iter().enumerate() {
        match best {
            Some((_, b)) if v < b => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i)
        .ok_or_else(|| SimError::empty("cannot select from an empty utility curve"))
}

/// Maximum value of a non-empty curve.
pub fn curve_max(curve: &[f64]) -> Option<f64> {
    curve.iter().copied().reduce(f64::max)
}

/// Running sum.
pub fn cumulative(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut acc = 0.0;
    values
        .into_iter()
        .map(|v| {
            acc += v;
            acc
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_matches_knots_and_extrapolates_flat() {
        let xp = [300.0, 500.0, 850.0];
        let fp = [0.1, 0.5, 0.9];
        assert_eq!(interp(300.0, &xp, &fp), 0.1);
        assert_eq!(interp(200.0, &xp, &fp), 0.1);
        assert_eq!(interp(900.0, &xp, &fp), 0.9);
        assert!((interp(400.0, &xp, &fp) - 0.3).abs() < 1e-12);
        assert!((interp(500.0, &xp, &fp) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn peak_index_prefers_last_tie() {
        assert_eq!(peak_index(&[1.0, 3.0, 2.0, 3.0, 0.0]).unwrap(), 3);
        assert_eq!(peak_index(&[-1.0, -2.0]).unwrap(), 0);
        assert!(matches!(peak_index(&[]), Err(SimError::EmptyPopulation(_))));
    }

    #[test]
    fn rounding_is_half_even() {
        assert_eq!(round_to(2.5, 0), 2.0);
        assert_eq!(round_to(3.5, 0), 4.0);
        assert!((round_to(0.123456, 4) - 0.1235).abs() < 1e-12);
    }

    #[test]
    fn cumulative_runs() {
        assert_eq!(cumulative([1.0, -2.0, 4.0]), vec![1.0, -1.0, 3.0]);
        assert_eq!(curve_max(&[1.0, 5.0, 2.0]), Some(5.0));
        assert_eq!(curve_max(&[]), None);
    }
}
