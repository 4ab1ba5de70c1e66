//! Inner products and Gram-Schmidt orthogonalization for Krylov bases.
//!
//! Basis columns carry shadow Sylvester columns alongside them; every
//! orthogonalization step applies the identical linear combination to the
//! shadow so the bookkeeping V = Vraw·M stays consistent.

use nalgebra::{DMatrix, DVector};
use reductor_core::LinearSystem;

use crate::error::{Error, Result};

/// Relative norm drop treated as a linearly dependent direction.
const BREAKDOWN_TOL: f64 = 1e-13;

/// Inner product used for orthonormalization.
#[derive(Debug, Clone)]
pub enum InnerProduct {
    Euclidean,
    /// ⟨x, y⟩ = xᵀ·M·y with M symmetric positive definite.
    Weighted(DMatrix<f64>),
}

impl InnerProduct {
    /// Derive the inner product from the system: the E-weighted product when
    /// E is symmetric positive definite, Euclidean otherwise.
    pub fn for_system(sys: &LinearSystem) -> Self {
        match sys.e() {
            Some(e) if crate::shifted::is_symmetric(e) && e.clone().cholesky().is_some() => {
                InnerProduct::Weighted(e.clone())
            }
            _ => InnerProduct::Euclidean,
        }
    }

    pub fn dot(&self, x: &DVector<f64>, y: &DVector<f64>) -> f64 {
        match self {
            InnerProduct::Euclidean => x.dot(y),
            InnerProduct::Weighted(m) => x.dot(&(m * y)),
        }
    }

    pub fn norm(&self, x: &DVector<f64>) -> f64 {
        self.dot(x, x).max(0.0).sqrt()
    }
}

/// A growing set of basis columns with their shadow Sylvester columns.
pub(crate) struct Basis {
    pub cols: Vec<DVector<f64>>,
    /// One shadow column per basis column (length m on the input side, p on
    /// the output side).
    pub shadow: Vec<DVector<f64>>,
}

impl Basis {
    pub fn new() -> Self {
        Self {
            cols: Vec::new(),
            shadow: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.cols.len()
    }

    /// One pass of modified Gram-Schmidt against all existing columns,
    /// followed by normalization; the same combination is applied to the
    /// shadow column. Fails when the direction is numerically dependent.
    pub fn insert(
        &mut self,
        ip: &InnerProduct,
        mut v: DVector<f64>,
        mut shadow: DVector<f64>,
    ) -> Result<usize> {
        let pre = ip.norm(&v).max(f64::MIN_POSITIVE);
        for (col, sh) in self.cols.iter().zip(self.shadow.iter()) {
            let h = ip.dot(col, &v);
            v.axpy(-h, col, 1.0);
            shadow.axpy(-h, sh, 1.0);
        }
        let post = ip.norm(&v);
        if post <= BREAKDOWN_TOL * pre {
            return Err(Error::DependentDirection { column: self.len() });
        }
        v /= post;
        shadow /= post;
        self.cols.push(v);
        self.shadow.push(shadow);
        Ok(self.len() - 1)
    }

    /// Re-run the orthogonalization/normalization pass for one existing
    /// column against its predecessors.
    pub fn repass(&mut self, ip: &InnerProduct, idx: usize) -> Result<()> {
        let mut v = self.cols[idx].clone();
        let mut shadow = self.shadow[idx].clone();
        for j in 0..idx {
            let h = ip.dot(&self.cols[j], &v);
            v.axpy(-h, &self.cols[j], 1.0);
            shadow.axpy(-h, &self.shadow[j], 1.0);
        }
        let post = ip.norm(&v);
        if post <= BREAKDOWN_TOL {
            return Err(Error::DependentDirection { column: idx });
        }
        v /= post;
        shadow /= post;
        self.cols[idx] = v;
        self.shadow[idx] = shadow;
        Ok(())
    }

    /// Repeated Gram-Schmidt over the whole basis, countering floating-point
    /// loss of orthogonality for large column counts.
    pub fn reorthogonalize(&mut self, ip: &InnerProduct) -> Result<()> {
        for idx in 0..self.len() {
            self.repass(ip, idx)?;
        }
        Ok(())
    }

    pub fn as_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_columns(&self.cols)
    }

    pub fn shadow_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_columns(&self.shadow)
    }
}
