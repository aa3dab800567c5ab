//! Least squares solver.
//!
//! Curve normalization repeatedly solves small problems of the form:
//!
//! ```text
//! minimize Σ (y_i - x_i^T β)^2
//! ```
//!
//! where the rows are polynomial (Vandermonde) rows and the column count is the
//! fit degree + 1 (4 or 6 in practice).
//!
//! Implementation choices:
//! - SVD rather than QR, so tall and rank-deficient systems both solve. A
//!   rank-deficient system (fewer points than coefficients) yields the
//!   minimum-norm solution.
//! - Progressively looser singular-value tolerances before giving up.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if no tolerance produces finite coefficients.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    if x.nrows() == 0 || x.nrows() != y.len() {
        return None;
    }
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn least_squares_solves_simple_system() {
        // y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);

        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-10);
        assert!((beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn underdetermined_system_still_solves() {
        // One observation, two unknowns.
        let x = DMatrix::from_row_slice(1, 2, &[1.0, 0.0]);
        let y = DVector::from_row_slice(&[4.0]);
        let beta = solve_least_squares(&x, &y).unwrap();
        assert!((beta[0] - 4.0).abs() < 1e-10);
        assert!(beta[1].abs() < 1e-10);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        let x = DMatrix::from_row_slice(2, 1, &[1.0, 1.0]);
        let y = DVector::from_row_slice(&[1.0]);
        assert!(solve_least_squares(&x, &y).is_none());
    }
}
