//! Model-function accelerated reduction (modelFctMor / CIRKA).
//!
//! An IRKA run repeatedly factors and reduces the full system, which is the
//! dominant cost for large orders. The model-function scheme wraps the shift
//! search in an outer loop that operates on a cheap surrogate — itself a
//! Hermite Krylov reduction of the full system, built from the union of all
//! shifts seen so far. Each outer iteration runs the inner reduction on the
//! surrogate only; the full system is touched just to grow the surrogate
//! basis by the newly proposed shifts (with cached factorizations).
//!
//! The surrogate's shift set grows monotonically: columns are appended,
//! never discarded, until the search converges or the surrogate would reach
//! the full order, in which case one final reduction runs directly on the
//! true system.

use num_complex::Complex;
use reductor_core::{LinearSystem, shifts};

use crate::arnoldi::{ArnoldiOptions, KrylovBasis};
use crate::error::Result;
use crate::irka::{IrkaOptions, irka};

/// Options for the generic model-function outer loop.
#[derive(Debug, Clone)]
pub struct ModelFctOptions {
    /// Initial surrogate order (shift count); default is two above the
    /// requested reduced order, padded with zero shifts.
    pub qm0: Option<usize>,
    /// Outer iteration budget.
    pub max_iter: usize,
    /// Relative tolerance on the shift-set change between outer iterations.
    pub tol: f64,
    /// Options for the surrogate's Arnoldi construction.
    pub arnoldi: ArnoldiOptions,
}

impl Default for ModelFctOptions {
    fn default() -> Self {
        Self {
            qm0: None,
            max_iter: 8,
            tol: 1e-3,
            arnoldi: ArnoldiOptions::default(),
        }
    }
}

/// Options for [`cirka`], the IRKA-driven variant.
#[derive(Debug, Clone)]
pub struct CirkaOptions {
    pub qm0: Option<usize>,
    /// Outer iteration budget.
    pub max_iter: usize,
    /// Relative tolerance on the shift-set change between outer iterations.
    pub tol: f64,
    /// Options for the inner IRKA runs on the surrogate.
    pub irka: IrkaOptions,
    pub arnoldi: ArnoldiOptions,
}

impl Default for CirkaOptions {
    fn default() -> Self {
        Self {
            qm0: None,
            max_iter: 20,
            tol: 1e-6,
            // The inner search must resolve the fixed point tighter than the
            // outer tolerance, otherwise its fluctuation masks convergence.
            irka: IrkaOptions {
                tol: 1e-8,
                stop_crit: crate::irka::StopCriterion::S0,
                ..IrkaOptions::default()
            },
            arnoldi: ArnoldiOptions::default(),
        }
    }
}

/// Result of a model-function reduction.
#[derive(Debug, Clone)]
pub struct ModelFctResult {
    /// The reduced system produced by the last inner reduction.
    pub sysr: LinearSystem,
    /// The final shift set.
    pub s0: Vec<Complex<f64>>,
    /// The final surrogate (model function).
    pub sysm: LinearSystem,
    pub converged: bool,
    pub iterations: usize,
}

/// Run a shift-search reduction `reduce` through the model-function outer
/// loop: `reduce` is handed the current surrogate and shift set and returns
/// a reduced system together with its new shift proposal.
pub fn model_fct_mor<F>(
    sys: &LinearSystem,
    mut reduce: F,
    s0: &[Complex<f64>],
    opts: &ModelFctOptions,
) -> Result<ModelFctResult>
where
    F: FnMut(&LinearSystem, &[Complex<f64>]) -> Result<(LinearSystem, Vec<Complex<f64>>)>,
{
    let s0 = shifts::canonicalize(s0, opts.arnoldi.cplxpair_tol)?;
    let q0 = s0.len();
    let qm0 = opts.qm0.unwrap_or(q0 + 2).max(q0);

    // Seed the surrogate: the requested shifts padded with zero shifts.
    let mut seed = s0.clone();
    seed.extend(std::iter::repeat_n(Complex::new(0.0, 0.0), qm0 - q0));
    let mut basis = KrylovBasis::new(sys, true, &opts.arnoldi);
    basis.extend(&seed, None, None)?;
    let mut sysm = basis.project(sys)?;

    let n = sys.order();
    let per_shift = sys.num_inputs();
    let mut s0_cur = s0;
    let mut best: Option<(LinearSystem, Vec<Complex<f64>>)> = None;

    for iter in 1..=opts.max_iter.max(1) {
        let (sysr, s0_new) = reduce(&sysm, &s0_cur)?;

        let dist = shifts::set_distance(&s0_new, &s0_cur);
        let denom = shifts::norm(&s0_cur);
        let crit = if denom > 0.0 { dist / denom } else { dist };
        log::debug!(
            "model function iteration {iter}: shift change {crit:.3e}, surrogate order {}",
            basis.len()
        );
        if crit <= opts.tol {
            return Ok(ModelFctResult {
                sysr,
                s0: s0_new,
                sysm,
                converged: true,
                iterations: iter,
            });
        }

        // Safety valve: growing further would reach the full order, so one
        // final reduction runs on the true system instead.
        if basis.len() + s0_new.len() * per_shift >= n {
            log::warn!(
                "model function would reach the full order {n}; reducing the true system directly"
            );
            let (sysr, s0_fin) = reduce(sys, &s0_new)?;
            return Ok(ModelFctResult {
                sysr,
                s0: s0_fin,
                sysm,
                converged: true,
                iterations: iter,
            });
        }

        basis.extend(&s0_new, None, None)?;
        sysm = basis.project(sys)?;
        best = Some((sysr, s0_new.clone()));
        s0_cur = s0_new;
    }

    log::warn!(
        "model function reduction did not converge in {} iterations",
        opts.max_iter
    );
    let (sysr, s0_fin) = best.expect("the outer loop ran at least once");
    Ok(ModelFctResult {
        sysr,
        s0: s0_fin,
        sysm,
        converged: false,
        iterations: opts.max_iter,
    })
}

/// CIRKA: IRKA wrapped in the model-function outer loop. The inner IRKA runs
/// entirely on the surrogate; its fixed-point shifts drive the surrogate's
/// growth.
pub fn cirka(
    sys: &LinearSystem,
    s0: &[Complex<f64>],
    opts: &CirkaOptions,
) -> Result<ModelFctResult> {
    let mf_opts = ModelFctOptions {
        qm0: opts.qm0,
        max_iter: opts.max_iter,
        tol: opts.tol,
        arnoldi: opts.arnoldi.clone(),
    };
    let irka_opts = opts.irka.clone();
    model_fct_mor(
        sys,
        |sysm, s0m| {
            let res = irka(sysm, s0m, &irka_opts)?;
            Ok((res.sysr, res.s0))
        },
        s0,
        &mf_opts,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DMatrix;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    fn siso_sys(n: usize) -> LinearSystem {
        let a = DMatrix::from_fn(n, n, |i, j| if i == j { -(i as f64 + 1.0) } else { 0.0 });
        LinearSystem::standard(
            a,
            DMatrix::from_element(n, 1, 1.0),
            DMatrix::from_element(1, n, 1.0),
        )
        .unwrap()
    }

    #[test]
    fn cirka_converges_on_benign_siso_system() {
        let sys = siso_sys(30);
        let opts = CirkaOptions {
            tol: 1e-4,
            irka: IrkaOptions {
                tol: 1e-10,
                stop_crit: crate::irka::StopCriterion::S0,
                max_iter: 300,
                ..IrkaOptions::default()
            },
            ..Default::default()
        };
        let result = cirka(&sys, &[c(1.0, 0.0), c(2.0, 0.0)], &opts).unwrap();
        assert!(result.converged, "CIRKA did not converge");
        assert_eq!(result.sysr.order(), 2);
        assert!(result.sysm.order() >= 4, "surrogate below its seed order");
    }

    #[test]
    fn surrogate_grows_monotonically() {
        let sys = siso_sys(30);
        let mut orders = Vec::new();
        let result = model_fct_mor(
            &sys,
            |sysm, s0m| {
                orders.push(sysm.order());
                let res = irka(sysm, s0m, &IrkaOptions::default())?;
                Ok((res.sysr, res.s0))
            },
            &[c(1.0, 0.0), c(2.0, 0.0)],
            &ModelFctOptions::default(),
        )
        .unwrap();
        assert!(result.iterations >= 1);
        for pair in orders.windows(2) {
            assert!(pair[1] >= pair[0], "surrogate shrank: {orders:?}");
        }
    }

    #[test]
    fn safety_valve_reduces_true_system_when_surrogate_saturates() {
        // Tiny system: the seed surrogate already nearly spans the state
        // space, so the first growth request trips the safety valve.
        let sys = siso_sys(5);
        let opts = CirkaOptions {
            qm0: Some(3),
            // force at least one growth attempt
            tol: 1e-14,
            max_iter: 4,
            ..Default::default()
        };
        let result = cirka(&sys, &[c(1.0, 0.0)], &opts).unwrap();
        assert!(result.converged);
        assert_eq!(result.sysr.order(), 1);
    }

    #[test]
    fn nonconvergence_is_flagged_not_fatal() {
        let sys = siso_sys(30);
        let opts = CirkaOptions {
            tol: 1e-16,
            max_iter: 2,
            ..Default::default()
        };
        let result = cirka(&sys, &[c(1.0, 0.0), c(2.0, 0.0)], &opts).unwrap();
        assert!(!result.converged);
        assert_eq!(result.iterations, 2);
        assert_eq!(result.sysr.order(), 2);
    }
}
