//! RK driver: rational interpolation (moment matching) reduction.
//!
//! Orchestrates the Arnoldi builder for one-sided, Hermite two-sided, and
//! genuinely two-sided (distinct shift sets) requests, then projects the
//! system onto the computed bases: Ar = WᵀAV, Er = WᵀEV, Br = WᵀB, Cr = CV,
//! Dr = D (W = V when one-sided).

use nalgebra::DMatrix;
use num_complex::Complex;
use reductor_core::LinearSystem;

use crate::arnoldi::{ArnoldiOptions, ArnoldiRequest, arnoldi};
use crate::error::{Error, Result};

/// A reduction request: which shifts on which side, with optional tangential
/// directions. Built through the constructors; the field combination decides
/// the projection type.
#[derive(Debug, Clone)]
pub struct RkRequest {
    /// Input-side shifts.
    pub s0_in: Vec<Complex<f64>>,
    /// Output-side shifts for two-sided reduction with distinct sets.
    pub s0_out: Option<Vec<Complex<f64>>>,
    /// Input tangential directions (m×q). None selects block Krylov.
    pub rt: Option<DMatrix<Complex<f64>>>,
    /// Output tangential directions (p×q).
    pub lt: Option<DMatrix<Complex<f64>>>,
    /// Reuse the input shifts on the output side (Hermite interpolation,
    /// matching both value and derivative per shift).
    pub hermite: bool,
}

impl RkRequest {
    /// One-sided (Galerkin) reduction: W = V.
    pub fn one_sided(s0: Vec<Complex<f64>>) -> Self {
        Self {
            s0_in: s0,
            s0_out: None,
            rt: None,
            lt: None,
            hermite: false,
        }
    }

    /// Hermite two-sided reduction: same shifts on both sides, built in one
    /// combined Arnoldi pass sharing factorizations.
    pub fn hermite(s0: Vec<Complex<f64>>) -> Self {
        Self {
            s0_in: s0,
            s0_out: None,
            rt: None,
            lt: None,
            hermite: true,
        }
    }

    /// Two-sided reduction with distinct input and output shift sets.
    pub fn two_sided(s0_in: Vec<Complex<f64>>, s0_out: Vec<Complex<f64>>) -> Self {
        Self {
            s0_in,
            s0_out: Some(s0_out),
            rt: None,
            lt: None,
            hermite: false,
        }
    }

    pub fn with_input_directions(mut self, rt: DMatrix<Complex<f64>>) -> Self {
        self.rt = Some(rt);
        self
    }

    pub fn with_output_directions(mut self, lt: DMatrix<Complex<f64>>) -> Self {
        self.lt = Some(lt);
        self
    }
}

/// Result of an RK reduction.
#[derive(Debug, Clone)]
pub struct RkResult {
    pub sysr: LinearSystem,
    pub v: DMatrix<f64>,
    /// Output-side basis; None for one-sided reduction.
    pub w: Option<DMatrix<f64>>,
    /// Sylvester right-hand data of the input side.
    pub rsylv: Option<DMatrix<f64>>,
    /// Sylvester right-hand data of the output side.
    pub lsylv: Option<DMatrix<f64>>,
}

/// Reduce with default Arnoldi options.
pub fn rk(sys: &LinearSystem, req: &RkRequest) -> Result<RkResult> {
    rk_with(sys, req, &ArnoldiOptions::default())
}

/// Reduce with explicit Arnoldi options.
pub fn rk_with(sys: &LinearSystem, req: &RkRequest, opts: &ArnoldiOptions) -> Result<RkResult> {
    if let Some(s0_out) = &req.s0_out {
        // Two independent one-sided bases: V from (E, A, B), W from the dual
        // system (Eᵀ, Aᵀ, Cᵀ).
        let input = ArnoldiRequest {
            shifts: req.s0_in.clone(),
            rt: req.rt.clone(),
            lt: None,
            hermite: false,
        };
        let in_res = arnoldi(sys, &input, opts)?;
        let dual = dual_system(sys)?;
        let output = ArnoldiRequest {
            shifts: s0_out.clone(),
            rt: req.lt.clone(),
            lt: None,
            hermite: false,
        };
        let out_res = arnoldi(&dual, &output, opts)?;
        let (v, w) = (in_res.v, out_res.v);
        if w.ncols() != v.ncols() {
            return Err(Error::Dimension {
                what: "output basis columns",
                expected: v.ncols(),
                actual: w.ncols(),
            });
        }
        let sysr = sys.project(&w, &v)?;
        return Ok(RkResult {
            sysr,
            v,
            w: Some(w),
            rsylv: in_res.rsylv,
            lsylv: out_res.rsylv,
        });
    }

    let areq = ArnoldiRequest {
        shifts: req.s0_in.clone(),
        rt: req.rt.clone(),
        lt: req.lt.clone(),
        hermite: req.hermite,
    };
    let res = arnoldi(sys, &areq, opts)?;
    let sysr = match &res.w {
        Some(w) => sys.project(w, &res.v)?,
        None => sys.project(&res.v, &res.v)?,
    };
    Ok(RkResult {
        sysr,
        v: res.v,
        w: res.w,
        rsylv: res.rsylv,
        lsylv: res.lsylv,
    })
}

/// The dual (transposed) system (Eᵀ, Aᵀ, Cᵀ, Bᵀ, Dᵀ).
pub(crate) fn dual_system(sys: &LinearSystem) -> Result<LinearSystem> {
    Ok(LinearSystem::new(
        sys.a().transpose(),
        sys.c().transpose(),
        sys.b().transpose(),
        sys.d().transpose(),
        sys.e().map(|e| e.transpose()),
    )?)
}
