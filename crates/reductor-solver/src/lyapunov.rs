//! Dense Lyapunov solves and the H2 norm.
//!
//! The reduction algorithms only ever solve Lyapunov equations at the
//! reduced order q, so the vectorized Kronecker formulation (a dense q²×q²
//! linear solve) is adequate and keeps the dependency surface small.

use nalgebra::{DMatrix, DVector};
use reductor_core::LinearSystem;

use crate::error::{Error, Result};

/// Solve A·X + X·Aᵀ + Q = 0.
pub fn solve_lyapunov(a: &DMatrix<f64>, q: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(Error::Dimension {
            what: "Lyapunov A columns",
            expected: n,
            actual: a.ncols(),
        });
    }
    if q.nrows() != n || q.ncols() != n {
        return Err(Error::Dimension {
            what: "Lyapunov Q shape",
            expected: n,
            actual: q.nrows().max(q.ncols()),
        });
    }
    let id = DMatrix::identity(n, n);
    // vec(AX) = (I ⊗ A)·vec(X), vec(XAᵀ) = (A ⊗ I)·vec(X)
    let k = id.kronecker(a) + a.kronecker(&id);
    solve_vectorized(&k, q, n)
}

/// Solve the generalized equation A·X·Eᵀ + E·X·Aᵀ + Q = 0.
pub fn solve_generalized_lyapunov(
    a: &DMatrix<f64>,
    e: &DMatrix<f64>,
    q: &DMatrix<f64>,
) -> Result<DMatrix<f64>> {
    let n = a.nrows();
    if e.nrows() != n || e.ncols() != n {
        return Err(Error::Dimension {
            what: "Lyapunov E shape",
            expected: n,
            actual: e.nrows().max(e.ncols()),
        });
    }
    if q.nrows() != n || q.ncols() != n {
        return Err(Error::Dimension {
            what: "Lyapunov Q shape",
            expected: n,
            actual: q.nrows().max(q.ncols()),
        });
    }
    // vec(AXEᵀ) = (E ⊗ A)·vec(X), vec(EXAᵀ) = (A ⊗ E)·vec(X)
    let k = e.kronecker(a) + a.kronecker(e);
    solve_vectorized(&k, q, n)
}

fn solve_vectorized(k: &DMatrix<f64>, q: &DMatrix<f64>, n: usize) -> Result<DMatrix<f64>> {
    let rhs = -DVector::from_column_slice(q.as_slice());
    let x = k
        .clone()
        .lu()
        .solve(&rhs)
        .ok_or(Error::Lyapunov("Kronecker system is singular"))?;
    Ok(DMatrix::from_column_slice(n, n, x.as_slice()))
}

/// H2 norm √trace(C·P·Cᵀ) with P the controllability Gramian, solving
/// A·P·Eᵀ + E·P·Aᵀ + B·Bᵀ = 0.
///
/// Only defined for stable systems without feedthrough.
pub fn h2_norm(sys: &LinearSystem) -> Result<f64> {
    if sys.d().amax() > 0.0 {
        return Err(Error::H2Undefined);
    }
    if !sys.is_stable()? {
        return Err(Error::H2Undefined);
    }
    let bbt = sys.b() * sys.b().transpose();
    let p = match sys.e() {
        Some(e) => solve_generalized_lyapunov(sys.a(), e, &bbt)?,
        None => solve_lyapunov(sys.a(), &bbt)?,
    };
    let cpc = sys.c() * p * sys.c().transpose();
    Ok(cpc.trace().max(0.0).sqrt())
}
