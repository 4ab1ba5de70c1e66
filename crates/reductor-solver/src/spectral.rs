//! Small dense eigenvalue helpers for reduced pencils.
//!
//! IRKA extracts new shifts from the eigenvalues of the reduced pencil
//! (Ar, Er); the MIMO variant additionally needs right and left eigenvectors
//! to update the tangential directions. The reduced order is small, so a
//! Schur-based eigenvalue sweep plus shifted inverse iteration per
//! eigenvalue is sufficient.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex;

use crate::error::{Error, Result};

/// One eigenvalue of the pencil with its right and left eigenvectors:
/// Ar·x = λ·Er·x and yᵀ·Ar = λ·yᵀ·Er.
pub struct PencilEigen {
    pub value: Complex<f64>,
    pub right: DVector<Complex<f64>>,
    pub left: DVector<Complex<f64>>,
}

/// Eigenvalues of the pencil (A, E); E = None means the standard problem.
pub fn pencil_eigenvalues(
    a: &DMatrix<f64>,
    e: Option<&DMatrix<f64>>,
) -> Result<Vec<Complex<f64>>> {
    let m = reduce_to_standard(a, e)?;
    Ok(m.complex_eigenvalues().iter().copied().collect())
}

/// Eigenvalues with right and left eigenvectors, via shifted inverse
/// iteration on the small equivalent standard problem.
pub fn pencil_eigen(a: &DMatrix<f64>, e: Option<&DMatrix<f64>>) -> Result<Vec<PencilEigen>> {
    let m = reduce_to_standard(a, e)?;
    let mc = m.map(|x| Complex::new(x, 0.0));
    let mtc = mc.transpose();
    let et_lu = e.map(|e| e.transpose().map(|x| Complex::new(x, 0.0)).lu());

    let mut out = Vec::new();
    for lambda in m.complex_eigenvalues().iter() {
        let right = inverse_iteration(&mc, *lambda)?;
        let z = inverse_iteration(&mtc, *lambda)?;
        // Left eigenvector of the pencil: y = E⁻ᵀ·z.
        let left = match &et_lu {
            Some(lu) => lu
                .solve(&z)
                .ok_or(Error::Eigen("E is singular in the left eigenvector solve"))?,
            None => z,
        };
        out.push(PencilEigen {
            value: *lambda,
            right,
            left,
        });
    }
    Ok(out)
}

fn reduce_to_standard(a: &DMatrix<f64>, e: Option<&DMatrix<f64>>) -> Result<DMatrix<f64>> {
    match e {
        Some(e) => e
            .clone()
            .lu()
            .solve(a)
            .ok_or(Error::Eigen("E is singular; pencil has infinite eigenvalues")),
        None => Ok(a.clone()),
    }
}

/// Shifted inverse iteration for the eigenvector of `m` at `lambda`. The
/// shift is perturbed off the exact eigenvalue so the factorization stays
/// usable; repeated failures widen the perturbation.
fn inverse_iteration(
    m: &DMatrix<Complex<f64>>,
    lambda: Complex<f64>,
) -> Result<DVector<Complex<f64>>> {
    let n = m.nrows();
    let scale = 1.0 + lambda.norm();
    // Deterministic asymmetric start to avoid orthogonal initial guesses.
    let start = DVector::from_fn(n, |i, _| {
        Complex::new(1.0 + 0.1 * i as f64, 0.05 * (i as f64 + 1.0))
    });
    for attempt in 1..=4 {
        let eps = 1e-10 * scale * 10f64.powi(attempt - 1);
        let shift = lambda + Complex::new(eps, eps);
        let t = DMatrix::from_fn(n, n, |i, j| {
            m[(i, j)] - if i == j { shift } else { Complex::new(0.0, 0.0) }
        });
        let lu = t.lu();
        let mut x = start.clone().unscale(start.norm());
        let mut ok = true;
        for _ in 0..3 {
            match lu.solve(&x) {
                Some(y) => {
                    let nrm = y.norm();
                    if !nrm.is_finite() || nrm == 0.0 {
                        ok = false;
                        break;
                    }
                    x = y.unscale(nrm);
                }
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if ok {
            let residual = (m * &x - &x * lambda).norm();
            if residual <= 1e-6 * scale {
                return Ok(x);
            }
        }
    }
    Err(Error::Eigen("inverse iteration did not converge"))
}
