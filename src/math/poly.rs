//! Polynomial least-squares fitting and resampling.
//!
//! Used to put cumulative-utility curves of unequal length onto a common grid
//! before they are summed. Everything here is pure: series in, series out.
//!
//! Numerical notes:
//! - Abscissae are divided by their largest value before building the
//!   Vandermonde matrix, and each column is scaled to unit norm. Raw positions
//!   reach the thousands and `x^5` would otherwise swamp the lower columns.
//! - The scaling is undone when the coefficients are returned, so callers see
//!   an ordinary polynomial in the original `x`.

use nalgebra::{DMatrix, DVector};

use crate::error::SimError;
use crate::math::solve_least_squares;

/// Polynomial coefficients, lowest power first: `c[0] + c[1] x + c[2] x^2 + ...`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    pub coeffs: Vec<f64>,
}

impl Polynomial {
    /// Evaluate with Horner's scheme.
    pub fn eval(&self, x: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, &c| acc * x + c)
    }

    pub fn degree(&self) -> usize {
        self.coeffs.len().saturating_sub(1)
    }
}

/// Least-squares fit of a degree-`degree` polynomial through `(xs[i], ys[i])`.
pub fn polyfit(xs: &[f64], ys: &[f64], degree: usize) -> Result<Polynomial, SimError> {
    if xs.is_empty() {
        return Err(SimError::empty("cannot fit a polynomial to an empty series"));
    }
    if xs.len() != ys.len() {
        return Err(SimError::Numerical(format!(
            "polyfit length mismatch: {} x values, {} y values",
            xs.len(),
            ys.len()
        )));
    }

    let n = xs.len();
    let cols = degree + 1;
    let x_scale = xs.iter().fold(0.0_f64, |m, &x| m.max(x.abs()));
    let x_scale = if x_scale > 0.0 { x_scale } else { 1.0 };

    let mut design = DMatrix::<f64>::zeros(n, cols);
    for (i, &x) in xs.iter().enumerate() {
        let u = x / x_scale;
        let mut pow = 1.0;
        for j in 0..cols {
            design[(i, j)] = pow;
            pow *= u;
        }
    }

    let mut col_norms = vec![1.0; cols];
    for (j, norm) in col_norms.iter_mut().enumerate() {
        let value = design.column(j).norm();
        if value > 0.0 {
            *norm = value;
            design.column_mut(j).unscale_mut(value);
        }
    }

    let y = DVector::from_column_slice(ys);
    let beta = solve_least_squares(&design, &y).ok_or_else(|| {
        SimError::Numerical(format!("degree-{degree} polynomial fit over {n} points did not converge"))
    })?;

    // Undo column scaling, then the abscissa scaling.
    let coeffs = beta
        .iter()
        .zip(&col_norms)
        .enumerate()
        .map(|(j, (&b, &norm))| b / norm / x_scale.powi(j as i32))
        .collect();

    Ok(Polynomial { coeffs })
}

/// Stretch `series` onto `target_len` integer positions.
///
/// Sample `i` of the input is placed at `i * target_len / series.len()`, a
/// polynomial of the given degree is fitted through the placed samples, and it
/// is evaluated at `0, 1, ..., target_len - 1`. A series that already has the
/// target length is returned unchanged.
pub fn resample(series: &[f64], target_len: usize, degree: usize) -> Result<Vec<f64>, SimError> {
    if series.is_empty() || target_len == 0 {
        return Err(SimError::empty("cannot resample an empty utility curve"));
    }
    if series.len() == target_len {
        return Ok(series.to_vec());
    }

    let ratio = target_len as f64 / series.len() as f64;
    let xs: Vec<f64> = (0..series.len()).map(|i| i as f64 * ratio).collect();
    let poly = polyfit(&xs, series, degree)?;

    Ok((0..target_len).map(|i| poly.eval(i as f64)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_cubic() {
        let xs: Vec<f64> = (0..50).map(|i| i as f64 * 3.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 1.0 - 0.5 * x + 0.01 * x * x - 1e-5 * x * x * x).collect();
        let p = polyfit(&xs, &ys, 3).unwrap();
        assert_eq!(p.degree(), 3);
        for (&x, &y) in xs.iter().zip(&ys) {
            assert!((p.eval(x) - y).abs() < 1e-6, "at {x}: {} vs {y}", p.eval(x));
        }
    }

    #[test]
    fn degree_five_on_large_abscissa_is_stable() {
        let xs: Vec<f64> = (0..200).map(|i| i as f64 * 5.0).collect();
        let ys: Vec<f64> = xs.iter().map(|&x| 2.0 + 0.001 * x).collect();
        let p = polyfit(&xs, &ys, 5).unwrap();
        assert!((p.eval(500.0) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn resample_stretches_linear_series() {
        // y = i over 50 samples, stretched to 100 positions -> y ≈ x / 2.
        let series: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let out = resample(&series, 100, 3).unwrap();
        assert_eq!(out.len(), 100);
        assert!((out[0] - 0.0).abs() < 1e-8);
        assert!((out[98] - 49.0).abs() < 1e-6);
    }

    #[test]
    fn resample_same_length_is_identity() {
        let series = vec![1.0, 3.0, 2.0];
        assert_eq!(resample(&series, 3, 5).unwrap(), series);
    }

    #[test]
    fn resample_rejects_empty() {
        assert!(matches!(resample(&[], 10, 3), Err(SimError::EmptyPopulation(_))));
        assert!(matches!(resample(&[1.0], 0, 3), Err(SimError::EmptyPopulation(_))));
    }

    #[test]
    fn single_sample_resamples_to_constant() {
        let out = resample(&[7.0], 4, 3).unwrap();
        assert!(out.iter().all(|v| (v - 7.0).abs() < 1e-9), "{out:?}");
    }
}
