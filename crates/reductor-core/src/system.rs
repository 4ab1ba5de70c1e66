//! Descriptor state-space representation of LTI systems.
//!
//! A [`LinearSystem`] holds the matrices of E·x' = A·x + B·u, y = C·x + D·u.
//! E = None encodes the standard (non-descriptor) case E = I without storing
//! an identity matrix. Instances are immutable: projections and
//! interconnections produce new systems.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex;

use crate::error::{CoreError, Result};

/// Linear time-invariant system in descriptor state-space form.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSystem {
    a: DMatrix<f64>,
    b: DMatrix<f64>,
    c: DMatrix<f64>,
    d: DMatrix<f64>,
    /// None encodes E = identity.
    e: Option<DMatrix<f64>>,
}

impl LinearSystem {
    /// Build a system from raw matrices, validating dimension consistency.
    pub fn new(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        d: DMatrix<f64>,
        e: Option<DMatrix<f64>>,
    ) -> Result<Self> {
        let n = a.nrows();
        if a.ncols() != n {
            return Err(CoreError::DimensionMismatch {
                what: "A columns",
                expected: n,
                actual: a.ncols(),
            });
        }
        if b.nrows() != n {
            return Err(CoreError::DimensionMismatch {
                what: "B rows",
                expected: n,
                actual: b.nrows(),
            });
        }
        if c.ncols() != n {
            return Err(CoreError::DimensionMismatch {
                what: "C columns",
                expected: n,
                actual: c.ncols(),
            });
        }
        if d.nrows() != c.nrows() {
            return Err(CoreError::DimensionMismatch {
                what: "D rows",
                expected: c.nrows(),
                actual: d.nrows(),
            });
        }
        if d.ncols() != b.ncols() {
            return Err(CoreError::DimensionMismatch {
                what: "D columns",
                expected: b.ncols(),
                actual: d.ncols(),
            });
        }
        if let Some(ref e) = e {
            if e.nrows() != n || e.ncols() != n {
                return Err(CoreError::DimensionMismatch {
                    what: "E shape",
                    expected: n,
                    actual: e.nrows().max(e.ncols()),
                });
            }
        }
        Ok(Self { a, b, c, d, e })
    }

    /// Standard state space (E = I, D = 0).
    pub fn standard(a: DMatrix<f64>, b: DMatrix<f64>, c: DMatrix<f64>) -> Result<Self> {
        let d = DMatrix::zeros(c.nrows(), b.ncols());
        Self::new(a, b, c, d, None)
    }

    /// Descriptor system (D = 0).
    pub fn descriptor(
        a: DMatrix<f64>,
        b: DMatrix<f64>,
        c: DMatrix<f64>,
        e: DMatrix<f64>,
    ) -> Result<Self> {
        let d = DMatrix::zeros(c.nrows(), b.ncols());
        Self::new(a, b, c, d, Some(e))
    }

    /// State count n.
    pub fn order(&self) -> usize {
        self.a.nrows()
    }

    /// Input count m.
    pub fn num_inputs(&self) -> usize {
        self.b.ncols()
    }

    /// Output count p.
    pub fn num_outputs(&self) -> usize {
        self.c.nrows()
    }

    /// True when E is present (and thus possibly different from identity).
    pub fn is_descriptor(&self) -> bool {
        self.e.is_some()
    }

    pub fn is_siso(&self) -> bool {
        self.num_inputs() == 1 && self.num_outputs() == 1
    }

    pub fn is_mimo(&self) -> bool {
        !self.is_siso()
    }

    pub fn a(&self) -> &DMatrix<f64> {
        &self.a
    }

    pub fn b(&self) -> &DMatrix<f64> {
        &self.b
    }

    pub fn c(&self) -> &DMatrix<f64> {
        &self.c
    }

    pub fn d(&self) -> &DMatrix<f64> {
        &self.d
    }

    /// The descriptor matrix, None when E = identity.
    pub fn e(&self) -> Option<&DMatrix<f64>> {
        self.e.as_ref()
    }

    /// Materialize E (identity when absent).
    pub fn e_or_identity(&self) -> DMatrix<f64> {
        match &self.e {
            Some(e) => e.clone(),
            None => DMatrix::identity(self.order(), self.order()),
        }
    }

    /// E·x without materializing an identity E.
    pub fn apply_e(&self, x: &DVector<f64>) -> DVector<f64> {
        match &self.e {
            Some(e) => e * x,
            None => x.clone(),
        }
    }

    /// Evaluate the transfer function H(s) = C·(sE − A)⁻¹·B + D.
    pub fn transfer_at(&self, s: Complex<f64>) -> Result<DMatrix<Complex<f64>>> {
        let n = self.order();
        let se_minus_a = DMatrix::from_fn(n, n, |i, j| {
            let e_ij = match &self.e {
                Some(e) => e[(i, j)],
                None => if i == j { 1.0 } else { 0.0 },
            };
            s * e_ij - Complex::new(self.a[(i, j)], 0.0)
        });
        let bc = self.b.map(|x| Complex::new(x, 0.0));
        let x = se_minus_a
            .lu()
            .solve(&bc)
            .ok_or(CoreError::SingularE("evaluate the transfer function"))?;
        let cc = self.c.map(|x| Complex::new(x, 0.0));
        let dc = self.d.map(|x| Complex::new(x, 0.0));
        Ok(cc * x + dc)
    }

    /// k-th moment of H about the finite shift s:
    /// H⁽ᵏ⁾(s)/k! = −C·((A − sE)⁻¹E)ᵏ·(A − sE)⁻¹·B (+ D for k = 0).
    pub fn moment(&self, s: Complex<f64>, k: usize) -> Result<DMatrix<Complex<f64>>> {
        let n = self.order();
        let a_minus_se = DMatrix::from_fn(n, n, |i, j| {
            let e_ij = match &self.e {
                Some(e) => e[(i, j)],
                None => if i == j { 1.0 } else { 0.0 },
            };
            Complex::new(self.a[(i, j)], 0.0) - s * e_ij
        });
        let lu = a_minus_se.lu();
        let ec = self.e_or_identity().map(|x| Complex::new(x, 0.0));
        let bc = self.b.map(|x| Complex::new(x, 0.0));
        let mut x = lu
            .solve(&bc)
            .ok_or(CoreError::SingularE("evaluate moments"))?;
        for _ in 0..k {
            x = lu
                .solve(&(&ec * x))
                .ok_or(CoreError::SingularE("evaluate moments"))?;
        }
        let cc = self.c.map(|x| Complex::new(x, 0.0));
        let mut m = -(cc * x);
        if k == 0 {
            m += self.d.map(|x| Complex::new(x, 0.0));
        }
        Ok(m)
    }

    /// Eigenvalues of the pencil (A, E), i.e. the system poles.
    pub fn poles(&self) -> Result<Vec<Complex<f64>>> {
        let m = match &self.e {
            Some(e) => e
                .clone()
                .lu()
                .solve(&self.a)
                .ok_or(CoreError::SingularE("compute poles"))?,
            None => self.a.clone(),
        };
        Ok(m.complex_eigenvalues().iter().copied().collect())
    }

    /// True when every pole lies strictly in the open left half plane.
    pub fn is_stable(&self) -> Result<bool> {
        Ok(self.poles()?.iter().all(|p| p.re < 0.0))
    }

    /// Difference system G₁ − G₂ as a parallel interconnection of order
    /// n₁ + n₂ with the second output map negated.
    pub fn minus(&self, other: &LinearSystem) -> Result<LinearSystem> {
        if other.num_inputs() != self.num_inputs() {
            return Err(CoreError::DimensionMismatch {
                what: "input count",
                expected: self.num_inputs(),
                actual: other.num_inputs(),
            });
        }
        if other.num_outputs() != self.num_outputs() {
            return Err(CoreError::DimensionMismatch {
                what: "output count",
                expected: self.num_outputs(),
                actual: other.num_outputs(),
            });
        }
        let (n1, n2) = (self.order(), other.order());
        let n = n1 + n2;
        let mut a = DMatrix::zeros(n, n);
        a.view_mut((0, 0), (n1, n1)).copy_from(&self.a);
        a.view_mut((n1, n1), (n2, n2)).copy_from(&other.a);
        let mut b = DMatrix::zeros(n, self.num_inputs());
        b.view_mut((0, 0), (n1, self.num_inputs())).copy_from(&self.b);
        b.view_mut((n1, 0), (n2, self.num_inputs())).copy_from(&other.b);
        let mut c = DMatrix::zeros(self.num_outputs(), n);
        c.view_mut((0, 0), (self.num_outputs(), n1)).copy_from(&self.c);
        c.view_mut((0, n1), (self.num_outputs(), n2))
            .copy_from(&(-&other.c));
        let d = &self.d - &other.d;
        let e = if self.e.is_some() || other.e.is_some() {
            let mut e = DMatrix::zeros(n, n);
            e.view_mut((0, 0), (n1, n1)).copy_from(&self.e_or_identity());
            e.view_mut((n1, n1), (n2, n2))
                .copy_from(&other.e_or_identity());
            Some(e)
        } else {
            None
        };
        LinearSystem::new(a, b, c, d, e)
    }

    /// Petrov-Galerkin projection: (WᵀAV, WᵀB, CV, D, WᵀEV).
    ///
    /// Pass W = V for a one-sided (Galerkin) projection. The projected E is
    /// kept explicitly even when the original system has E = I, since WᵀV is
    /// generally not the identity.
    pub fn project(&self, w: &DMatrix<f64>, v: &DMatrix<f64>) -> Result<LinearSystem> {
        let n = self.order();
        if v.nrows() != n {
            return Err(CoreError::DimensionMismatch {
                what: "V rows",
                expected: n,
                actual: v.nrows(),
            });
        }
        if w.nrows() != n {
            return Err(CoreError::DimensionMismatch {
                what: "W rows",
                expected: n,
                actual: w.nrows(),
            });
        }
        if w.ncols() != v.ncols() {
            return Err(CoreError::DimensionMismatch {
                what: "W columns",
                expected: v.ncols(),
                actual: w.ncols(),
            });
        }
        let wt = w.transpose();
        let ar = &wt * &self.a * v;
        let br = &wt * &self.b;
        let cr = &self.c * v;
        let er = match &self.e {
            Some(e) => &wt * e * v,
            None => &wt * v,
        };
        LinearSystem::new(ar, br, cr, self.d.clone(), Some(er))
    }
}
