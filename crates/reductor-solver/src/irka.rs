//! IRKA: iterative rational Krylov search for locally H2-optimal shifts.
//!
//! Starting from a user-supplied shift vector, each iteration reduces with
//! Hermite two-sided RK at the current shifts and proposes new shifts as the
//! mirror images (negations) of the reduced pencil's eigenvalues, until the
//! shifts reach a fixed point or the iteration budget runs out. At a fixed
//! point the reduced model satisfies the H2 interpolation-based first-order
//! optimality conditions.
//!
//! Non-convergence is not an error: the last iterate is still returned with
//! `converged = false` and a warning, since a non-converged model is often
//! still usable — just not a verified fixed point.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use reductor_core::{LinearSystem, shifts};

use crate::arnoldi::ArnoldiOptions;
use crate::error::Result;
use crate::lyapunov::h2_norm;
use crate::rk::{RkRequest, rk_with};
use crate::spectral::pencil_eigen;

/// Convergence test for the fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCriterion {
    /// Relative L1 change of the shift vector, normalized by the reduced
    /// order.
    S0,
    /// Relative H2 norm of the difference of consecutive reduced systems;
    /// treated as failing unless both iterates are stable.
    Sysr,
    /// Both criteria must hold.
    CombAll,
    /// Either criterion suffices.
    CombAny,
}

/// IRKA configuration.
#[derive(Debug, Clone)]
pub struct IrkaOptions {
    /// Iteration budget.
    pub max_iter: usize,
    /// Convergence tolerance.
    pub tol: f64,
    /// Which stopping criterion to apply.
    pub stop_crit: StopCriterion,
    /// Reflect shifts into the closed right half plane each iteration, so
    /// the implied reduced model is forced stable.
    pub force_stable: bool,
    /// Tolerance for canonical conjugate pairing of the mirrored eigenvalues.
    pub cplxpair_tol: f64,
    /// Log per-iteration progress at info instead of debug level.
    pub verbose: bool,
    /// Initial input tangential directions for MIMO systems (default: ones).
    pub rt: Option<DMatrix<Complex<f64>>>,
    /// Initial output tangential directions for MIMO systems (default: ones).
    pub lt: Option<DMatrix<Complex<f64>>>,
}

impl Default for IrkaOptions {
    fn default() -> Self {
        Self {
            max_iter: 50,
            tol: 1e-3,
            stop_crit: StopCriterion::CombAny,
            force_stable: false,
            cplxpair_tol: 1e-6,
            verbose: false,
            rt: None,
            lt: None,
        }
    }
}

/// Result of an IRKA run.
#[derive(Debug, Clone)]
pub struct IrkaResult {
    pub sysr: LinearSystem,
    pub v: DMatrix<f64>,
    pub w: DMatrix<f64>,
    /// The shifts that produced `sysr` — the vector before the update that
    /// triggered convergence, i.e. the fixed point itself.
    pub s0: Vec<Complex<f64>>,
    /// Every shift vector across the iteration, starting with the
    /// canonicalized input and ending with the last proposal.
    pub s0_traj: Vec<Vec<Complex<f64>>>,
    pub converged: bool,
    pub iterations: usize,
}

/// Run IRKA on `sys` starting from the shift vector `s0`.
pub fn irka(sys: &LinearSystem, s0: &[Complex<f64>], opts: &IrkaOptions) -> Result<IrkaResult> {
    let mut s0 = shifts::canonicalize(s0, opts.cplxpair_tol)?;
    let q = s0.len();
    let mimo = sys.is_mimo();
    let mut rt = mimo.then(|| {
        opts.rt.clone().unwrap_or_else(|| {
            DMatrix::from_element(sys.num_inputs(), q, Complex::new(1.0, 0.0))
        })
    });
    let mut lt = mimo.then(|| {
        opts.lt.clone().unwrap_or_else(|| {
            DMatrix::from_element(sys.num_outputs(), q, Complex::new(1.0, 0.0))
        })
    });

    let aopts = ArnoldiOptions {
        cplxpair_tol: opts.cplxpair_tol,
        ..Default::default()
    };
    let max_iter = opts.max_iter.max(1);
    let mut traj = vec![s0.clone()];
    let mut prev_sysr: Option<LinearSystem> = None;
    let mut last = None;

    for iter in 1..=max_iter {
        let mut req = RkRequest::hermite(s0.clone());
        req.rt = rt.clone();
        req.lt = lt.clone();
        let res = rk_with(sys, &req, &aopts)?;

        let (mut proposal, dirs) = propose(&res.sysr, mimo)?;
        if opts.force_stable {
            for s in proposal.iter_mut() {
                *s = Complex::new(s.re.abs(), s.im);
            }
        }
        let (canon, perm) = shifts::canonicalize_indexed(&proposal, opts.cplxpair_tol)?;
        let (new_rt, new_lt) = match &dirs {
            Some((rdirs, ldirs)) => (
                Some(permuted_directions(rdirs, &perm, &canon)),
                Some(permuted_directions(ldirs, &perm, &canon)),
            ),
            None => (None, None),
        };

        let crit_s0 = shift_change(&canon, &s0);
        let crit_sysr = match opts.stop_crit {
            StopCriterion::S0 => f64::INFINITY,
            _ => sysr_change(&res.sysr, prev_sysr.as_ref()),
        };
        let stop = match opts.stop_crit {
            StopCriterion::S0 => crit_s0 <= opts.tol,
            StopCriterion::Sysr => crit_sysr <= opts.tol,
            StopCriterion::CombAll => crit_s0 <= opts.tol && crit_sysr <= opts.tol,
            StopCriterion::CombAny => crit_s0 <= opts.tol || crit_sysr <= opts.tol,
        };
        if opts.verbose {
            log::info!("IRKA iteration {iter}: shift change {crit_s0:.3e}");
        } else {
            log::debug!("IRKA iteration {iter}: shift change {crit_s0:.3e}");
        }

        traj.push(canon.clone());
        if stop {
            let w = res.w.unwrap_or_else(|| res.v.clone());
            return Ok(IrkaResult {
                sysr: res.sysr,
                v: res.v,
                w,
                s0,
                s0_traj: traj,
                converged: true,
                iterations: iter,
            });
        }
        prev_sysr = Some(res.sysr.clone());
        last = Some((res, s0.clone()));
        s0 = canon;
        rt = new_rt.or(rt);
        lt = new_lt.or(lt);
    }

    log::warn!("IRKA did not converge in {max_iter} iterations");
    let (res, s0_used) = last.expect("the iteration ran at least once");
    let w = res.w.unwrap_or_else(|| res.v.clone());
    Ok(IrkaResult {
        sysr: res.sysr,
        v: res.v,
        w,
        s0: s0_used,
        s0_traj: traj,
        converged: false,
        iterations: max_iter,
    })
}

type Directions = (Vec<DVector<Complex<f64>>>, Vec<DVector<Complex<f64>>>);

/// Mirrored eigenvalues of the reduced pencil, with updated tangential
/// directions (Brᵀ·y, Cr·x per eigentriple) for MIMO systems.
fn propose(sysr: &LinearSystem, mimo: bool) -> Result<(Vec<Complex<f64>>, Option<Directions>)> {
    if !mimo {
        let proposal = sysr.poles()?.iter().map(|l| mirror(*l)).collect();
        return Ok((proposal, None));
    }
    let eigen = pencil_eigen(sysr.a(), sysr.e())?;
    let brt = sysr.b().map(|x| Complex::new(x, 0.0)).transpose();
    let cr = sysr.c().map(|x| Complex::new(x, 0.0));
    let mut proposal = Vec::with_capacity(eigen.len());
    let mut rdirs = Vec::with_capacity(eigen.len());
    let mut ldirs = Vec::with_capacity(eigen.len());
    for pe in &eigen {
        proposal.push(mirror(pe.value));
        rdirs.push(normalized(&brt * &pe.left));
        ldirs.push(normalized(&cr * &pe.right));
    }
    Ok((proposal, Some((rdirs, ldirs))))
}

fn mirror(l: Complex<f64>) -> Complex<f64> {
    if l.re.is_nan() || l.im.is_nan() {
        Complex::new(0.0, 0.0)
    } else {
        -l
    }
}

fn normalized(v: DVector<Complex<f64>>) -> DVector<Complex<f64>> {
    let n = v.norm();
    if n > 1e-300 {
        v.unscale(n)
    } else {
        DVector::from_element(v.len(), Complex::new(1.0, 0.0))
    }
}

/// Reorder per-eigenvalue direction columns to match the canonical shift
/// order; columns at real shifts are rotated onto the real axis.
fn permuted_directions(
    dirs: &[DVector<Complex<f64>>],
    perm: &[usize],
    canon: &[Complex<f64>],
) -> DMatrix<Complex<f64>> {
    let cols: Vec<DVector<Complex<f64>>> = perm
        .iter()
        .zip(canon.iter())
        .map(|(&src, s)| {
            if s.im == 0.0 {
                realify(&dirs[src])
            } else {
                dirs[src].clone()
            }
        })
        .collect();
    DMatrix::from_columns(&cols)
}

/// Rotate a complex direction by the phase of its largest entry and keep the
/// real part, producing an exactly real direction vector.
fn realify(v: &DVector<Complex<f64>>) -> DVector<Complex<f64>> {
    let mut phase = Complex::new(1.0, 0.0);
    let mut best = 0.0;
    for z in v.iter() {
        let n = z.norm();
        if n > best {
            best = n;
            phase = z / n;
        }
    }
    if best == 0.0 {
        return DVector::from_element(v.len(), Complex::new(1.0, 0.0));
    }
    v.map(|z| Complex::new((z * phase.conj()).re, 0.0))
}

/// Relative L1 change of the shift vector, normalized by the reduced order.
fn shift_change(new: &[Complex<f64>], old: &[Complex<f64>]) -> f64 {
    if new.len() != old.len() {
        return f64::INFINITY;
    }
    let q = new.len() as f64;
    new.iter()
        .zip(old.iter())
        .map(|(a, b)| {
            let d = (a - b).norm();
            let s = b.norm();
            if s > 1e-30 { d / s } else { d }
        })
        .sum::<f64>()
        / q
}

/// Relative H2 distance of consecutive reduced systems; infinite unless both
/// are stable and the norms are computable.
fn sysr_change(new: &LinearSystem, old: Option<&LinearSystem>) -> f64 {
    let Some(old) = old else {
        return f64::INFINITY;
    };
    if !new.is_stable().unwrap_or(false) || !old.is_stable().unwrap_or(false) {
        return f64::INFINITY;
    }
    let Ok(diff) = new.minus(old) else {
        return f64::INFINITY;
    };
    match (h2_norm(&diff), h2_norm(new)) {
        (Ok(num), Ok(den)) if den > 0.0 => num / den,
        (Ok(num), Ok(_)) => num,
        _ => f64::INFINITY,
    }
}
