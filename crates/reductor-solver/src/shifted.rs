//! Shifted linear-system solves (A − sE)·x = r with cached factorizations.
//!
//! Every rational Krylov step solves against a shifted pencil matrix. A
//! [`ShiftedSolver`] owns the (A, E) pair — or their transposes for the
//! output side — and caches one factorization per distinct shift value, so
//! repeated shifts and incremental basis growth never refactor. Conjugate
//! shifts are never factored at all: for Im(s) < 0 the solver solves at
//! conj(s) and conjugates the result, since the data is real.
//!
//! Small systems use a dense complex LU; larger ones go through faer's
//! sparse LU with a single symbolic factorization shared by all shifts (the
//! sparsity pattern of A − sE does not depend on s). Shifts at infinity
//! request Markov-parameter columns and solve against E instead, via
//! Cholesky when E is symmetric positive definite and LU otherwise.

use faer::prelude::*;
use faer::sparse::linalg::solvers::{Lu, SymbolicLu};
use faer::sparse::{SparseColMat, Triplet};
use indexmap::IndexMap;
use nalgebra::linalg::{Cholesky, LU};
use nalgebra::{DMatrix, DVector, Dyn};
use num_complex::Complex;

use crate::error::{Error, Result};

/// Systems with this many or more states use the sparse solver path.
pub const SPARSE_THRESHOLD: usize = 50;

/// Entries below this magnitude are dropped when assembling the shared
/// sparsity pattern.
const PATTERN_EPS: f64 = 1e-15;

/// Bit-pattern key for a shift value. Shift values recur exactly (repeated
/// entries of the same vector, accumulation in the model function), so exact
/// comparison is the right cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ShiftKey {
    re: u64,
    im: u64,
}

impl ShiftKey {
    pub(crate) fn of(s: Complex<f64>) -> Self {
        Self {
            re: s.re.to_bits(),
            im: s.im.to_bits(),
        }
    }
}

enum Factor {
    Dense(LU<Complex<f64>, Dyn, Dyn>),
    Sparse(Lu<usize, c64>),
    /// Cholesky of a symmetric positive definite E, for shifts at infinity.
    CholE(Cholesky<f64, Dyn>),
}

/// Cached shifted-pencil factorizations for one Arnoldi or basis-growth call.
pub struct ShiftedSolver {
    a: DMatrix<f64>,
    e: Option<DMatrix<f64>>,
    /// Union sparsity pattern of A and E (sparse path only); shift-independent.
    pattern: Option<Vec<(usize, usize)>>,
    symbolic: Option<SymbolicLu<usize>>,
    factors: IndexMap<ShiftKey, Factor>,
}

impl ShiftedSolver {
    /// Solver for the input side: (A − sE)·x = r.
    pub fn new(a: DMatrix<f64>, e: Option<DMatrix<f64>>) -> Self {
        Self {
            a,
            e,
            pattern: None,
            symbolic: None,
            factors: IndexMap::new(),
        }
    }

    /// Solver for the output (dual) side: (A − sE)ᵀ·x = r.
    pub fn new_dual(a: &DMatrix<f64>, e: Option<&DMatrix<f64>>) -> Self {
        Self::new(a.transpose(), e.map(|e| e.transpose()))
    }

    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// Number of factorizations currently cached.
    pub fn cached_factors(&self) -> usize {
        self.factors.len()
    }

    /// E·x (complex x, real E).
    pub fn apply_e(&self, x: &DVector<Complex<f64>>) -> DVector<Complex<f64>> {
        match &self.e {
            Some(e) => {
                let xr = e * x.map(|z| z.re);
                let xi = e * x.map(|z| z.im);
                DVector::from_fn(x.len(), |i, _| Complex::new(xr[i], xi[i]))
            }
            None => x.clone(),
        }
    }

    /// A·x (complex x, real A).
    pub fn apply_a(&self, x: &DVector<Complex<f64>>) -> DVector<Complex<f64>> {
        let xr = &self.a * x.map(|z| z.re);
        let xi = &self.a * x.map(|z| z.im);
        DVector::from_fn(x.len(), |i, _| Complex::new(xr[i], xi[i]))
    }

    /// Solve (A − sE)·x = rhs, or E·x = rhs when s is infinite.
    pub fn solve(
        &mut self,
        s: Complex<f64>,
        rhs: &DVector<Complex<f64>>,
    ) -> Result<DVector<Complex<f64>>> {
        if rhs.len() != self.order() {
            return Err(Error::Dimension {
                what: "shifted solve rhs",
                expected: self.order(),
                actual: rhs.len(),
            });
        }
        if s.im < 0.0 {
            // (A − s̄E)·x = r  ⇔  x = conj((A − sE)⁻¹ · conj(r)) for real A, E.
            let y = self.solve(s.conj(), &rhs.map(|z| z.conj()))?;
            return Ok(y.map(|z| z.conj()));
        }
        let key = ShiftKey::of(s);
        if !self.factors.contains_key(&key) {
            let factor = self.build_factor(s)?;
            self.factors.insert(key, factor);
        }
        Self::solve_factor(&self.factors[&key], rhs, s)
    }

    fn build_factor(&mut self, s: Complex<f64>) -> Result<Factor> {
        let n = self.order();
        if s.re.is_infinite() {
            // Markov parameters: factor E itself.
            let e = match &self.e {
                Some(e) => e.clone(),
                None => DMatrix::identity(n, n),
            };
            if n < SPARSE_THRESHOLD {
                if is_symmetric(&e) {
                    if let Some(chol) = e.clone().cholesky() {
                        return Ok(Factor::CholE(chol));
                    }
                }
                return Ok(Factor::Dense(e.map(|x| Complex::new(x, 0.0)).lu()));
            }
            return self.build_sparse(s, true);
        }
        if n < SPARSE_THRESHOLD {
            let mat = DMatrix::from_fn(n, n, |i, j| {
                Complex::new(self.a[(i, j)], 0.0) - s * self.e_entry(i, j)
            });
            return Ok(Factor::Dense(mat.lu()));
        }
        self.build_sparse(s, false)
    }

    fn e_entry(&self, i: usize, j: usize) -> f64 {
        match &self.e {
            Some(e) => e[(i, j)],
            None => {
                if i == j {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }

    fn ensure_pattern(&mut self) -> &[(usize, usize)] {
        if self.pattern.is_none() {
            let n = self.order();
            let mut pattern = Vec::new();
            for j in 0..n {
                for i in 0..n {
                    let in_a = self.a[(i, j)].abs() > PATTERN_EPS;
                    let in_e = match &self.e {
                        Some(e) => e[(i, j)].abs() > PATTERN_EPS,
                        None => i == j,
                    };
                    if in_a || in_e {
                        pattern.push((i, j));
                    }
                }
            }
            self.pattern = Some(pattern);
        }
        self.pattern.as_deref().unwrap()
    }

    /// Numeric sparse factorization of A − sE (or of E alone for Markov
    /// columns), reusing the shared symbolic factorization.
    fn build_sparse(&mut self, s: Complex<f64>, markov: bool) -> Result<Factor> {
        let n = self.order();
        self.ensure_pattern();
        let pattern = self.pattern.as_deref().unwrap();
        let triplets: Vec<Triplet<usize, usize, c64>> = pattern
            .iter()
            .map(|&(i, j)| {
                let v = if markov {
                    Complex::new(self.e_entry(i, j), 0.0)
                } else {
                    Complex::new(self.a[(i, j)], 0.0) - s * self.e_entry(i, j)
                };
                Triplet::new(i, j, c64::new(v.re, v.im))
            })
            .collect();
        let mat = SparseColMat::<usize, c64>::try_new_from_triplets(n, n, &triplets)
            .map_err(|e| Error::Factorization(format!("sparse assembly failed: {e:?}")))?;
        if self.symbolic.is_none() {
            let symbolic = SymbolicLu::try_new(mat.symbolic()).map_err(|e| {
                Error::Factorization(format!("symbolic factorization failed: {e:?}"))
            })?;
            self.symbolic = Some(symbolic);
        }
        let symbolic = self.symbolic.as_ref().unwrap();
        let lu = Lu::try_new_with_symbolic(symbolic.clone(), mat.as_ref())
            .map_err(|_| Error::SingularShiftedMatrix { shift: s })?;
        Ok(Factor::Sparse(lu))
    }

    fn solve_factor(
        factor: &Factor,
        rhs: &DVector<Complex<f64>>,
        s: Complex<f64>,
    ) -> Result<DVector<Complex<f64>>> {
        let n = rhs.len();
        match factor {
            Factor::Dense(lu) => lu
                .solve(rhs)
                .ok_or(Error::SingularShiftedMatrix { shift: s }),
            Factor::CholE(chol) => {
                let xr = chol.solve(&rhs.map(|z| z.re));
                let xi = chol.solve(&rhs.map(|z| z.im));
                Ok(DVector::from_fn(n, |i, _| Complex::new(xr[i], xi[i])))
            }
            Factor::Sparse(lu) => {
                let b = Col::<c64>::from_fn(n, |i| c64::new(rhs[i].re, rhs[i].im));
                let x = lu.solve(&b);
                for i in 0..n {
                    if !x[i].re.is_finite() || !x[i].im.is_finite() {
                        return Err(Error::SingularShiftedMatrix { shift: s });
                    }
                }
                Ok(DVector::from_fn(n, |i, _| Complex::new(x[i].re, x[i].im)))
            }
        }
    }
}

pub(crate) fn is_symmetric(m: &DMatrix<f64>) -> bool {
    let scale = m.amax().max(1.0);
    let n = m.nrows();
    for j in 0..n {
        for i in (j + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > 1e-10 * scale {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiag(n: usize) -> DMatrix<f64> {
        DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                -2.0 - i as f64 * 0.1
            } else if i.abs_diff(j) == 1 {
                1.0
            } else {
                0.0
            }
        })
    }

    fn residual(
        a: &DMatrix<f64>,
        e: Option<&DMatrix<f64>>,
        s: Complex<f64>,
        x: &DVector<Complex<f64>>,
        rhs: &DVector<Complex<f64>>,
    ) -> f64 {
        let n = a.nrows();
        let mat = DMatrix::from_fn(n, n, |i, j| {
            let e_ij = match e {
                Some(e) => e[(i, j)],
                None => if i == j { 1.0 } else { 0.0 },
            };
            Complex::new(a[(i, j)], 0.0) - s * e_ij
        });
        (mat * x - rhs).norm()
    }

    #[test]
    fn dense_solve_matches_direct_residual() {
        let a = tridiag(8);
        let mut solver = ShiftedSolver::new(a.clone(), None);
        let s = Complex::new(0.5, 1.5);
        let rhs = DVector::from_fn(8, |i, _| Complex::new((i + 1) as f64, 0.0));
        let x = solver.solve(s, &rhs).unwrap();
        assert!(residual(&a, None, s, &x, &rhs) < 1e-10);
    }

    #[test]
    fn sparse_solve_matches_dense() {
        let n = 60; // above SPARSE_THRESHOLD
        let a = tridiag(n);
        let rhs = DVector::from_fn(n, |i, _| Complex::new(1.0 + i as f64 * 0.01, 0.2));
        let s = Complex::new(0.3, 0.9);

        let mut sparse = ShiftedSolver::new(a.clone(), None);
        let x_sparse = sparse.solve(s, &rhs).unwrap();
        assert!(residual(&a, None, s, &x_sparse, &rhs) < 1e-8);
    }

    #[test]
    fn conjugate_shift_solution_is_conjugated() {
        let a = tridiag(8);
        let mut solver = ShiftedSolver::new(a.clone(), None);
        let s = Complex::new(0.5, 1.5);
        let rhs = DVector::from_fn(8, |i, _| Complex::new((i + 1) as f64, 0.0));
        let x_pos = solver.solve(s, &rhs).unwrap();
        let x_neg = solver.solve(s.conj(), &rhs).unwrap();
        for i in 0..8 {
            assert!((x_neg[i] - x_pos[i].conj()).norm() < 1e-12);
        }
        // The conjugate solve reuses the factorization of the positive member.
        assert_eq!(solver.cached_factors(), 1);
    }

    #[test]
    fn repeated_shift_reuses_cached_factorization() {
        let a = tridiag(8);
        let mut solver = ShiftedSolver::new(a, None);
        let s = Complex::new(1.0, 0.0);
        let rhs = DVector::from_element(8, Complex::new(1.0, 0.0));
        solver.solve(s, &rhs).unwrap();
        solver.solve(s, &rhs).unwrap();
        assert_eq!(solver.cached_factors(), 1);
    }

    #[test]
    fn infinite_shift_solves_against_e() {
        let a = tridiag(4);
        let e = DMatrix::from_diagonal(&nalgebra::dvector![2.0, 4.0, 8.0, 16.0]);
        let mut solver = ShiftedSolver::new(a, Some(e));
        let rhs = DVector::from_element(4, Complex::new(16.0, 0.0));
        let x = solver
            .solve(Complex::new(f64::INFINITY, 0.0), &rhs)
            .unwrap();
        for (i, expected) in [8.0, 4.0, 2.0, 1.0].iter().enumerate() {
            assert!((x[i].re - expected).abs() < 1e-12, "x[{i}] = {}", x[i]);
        }
    }

    #[test]
    fn singular_shifted_matrix_is_reported() {
        // A = I, E = I, s = 1 makes A − sE = 0.
        let a = DMatrix::identity(4, 4);
        let mut solver = ShiftedSolver::new(a, None);
        let rhs = DVector::from_element(4, Complex::new(1.0, 0.0));
        let result = solver.solve(Complex::new(1.0, 0.0), &rhs);
        assert!(matches!(
            result,
            Err(Error::SingularShiftedMatrix { .. })
        ));
    }

    #[test]
    fn dual_solver_solves_transposed_system() {
        let n = 6;
        let a = DMatrix::from_fn(n, n, |i, j| {
            if i == j {
                -3.0
            } else if j == i + 1 {
                2.0 // strictly upper band makes A clearly nonsymmetric
            } else {
                0.0
            }
        });
        let mut dual = ShiftedSolver::new_dual(&a, None);
        let s = Complex::new(0.7, 0.0);
        let rhs = DVector::from_fn(n, |i, _| Complex::new(i as f64 + 1.0, 0.0));
        let x = dual.solve(s, &rhs).unwrap();
        assert!(residual(&a.transpose(), None, s, &x, &rhs) < 1e-10);
    }
}
