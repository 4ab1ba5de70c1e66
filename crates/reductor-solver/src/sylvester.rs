//! Sylvester-equation bookkeeping and pseudo-optimal realizations (PORK).
//!
//! A rational Krylov basis V satisfies A·V − E·V·S − B·R = 0, where the
//! eigenvalues of the shift matrix S are exactly the interpolation points.
//! [`get_sylvester`] reconstructs (R, S) — and the perpendicular input
//! matrix — from an already-computed projection, solving a small linear
//! system instead of re-running the Arnoldi recurrence. The residual of the
//! reconstruction is expected around 1e-4 relative; the intermediate solves
//! eat up a lot of digits, which is an acknowledged limitation rather than a
//! bug.
//!
//! [`pork_v`] / [`pork_w`] build pseudo-optimal reduced realizations
//! directly from Sylvester data via a small Lyapunov solve; the resulting
//! models interpolate at the shifts and place their poles at the mirror
//! images, giving a computable H2 error bound.

use nalgebra::DMatrix;
use reductor_core::LinearSystem;

use crate::error::{Error, Result};
use crate::lyapunov::solve_lyapunov;
use crate::rk::dual_system;

/// Which side of the projection the Sylvester data describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SylvesterMode {
    /// Input side: A·V − E·V·S − B·R = 0.
    V,
    /// Output side: Aᵀ·W − Eᵀ·W·S − Cᵀ·L = 0.
    W,
}

/// Reconstructed Sylvester data for a projection.
#[derive(Debug, Clone)]
pub struct SylvesterData {
    /// R (m×q) in V mode, L (p×q) in W mode.
    pub rhs: DMatrix<f64>,
    /// The perpendicular input matrix B⊥ = B − E·V·Er⁻¹·Br (n×m) in V mode,
    /// its dual (n×p) in W mode.
    pub perp: DMatrix<f64>,
    /// Shift matrix S (q×q); its eigenvalues are the interpolation points.
    pub s: DMatrix<f64>,
}

/// Reconstruct the Sylvester data of a reduced system `sysr` obtained by
/// projecting `sys` onto the given basis (V in V mode, W in W mode).
///
/// The reduced matrices must come from a projection that used this basis on
/// the corresponding side, otherwise no consistent (R, S) pair exists.
pub fn get_sylvester(
    sys: &LinearSystem,
    sysr: &LinearSystem,
    basis: &DMatrix<f64>,
    mode: SylvesterMode,
) -> Result<SylvesterData> {
    match mode {
        SylvesterMode::V => get_sylvester_v(sys, sysr, basis),
        SylvesterMode::W => {
            let dual = dual_system(sys)?;
            let dual_r = dual_system(sysr)?;
            get_sylvester_v(&dual, &dual_r, basis)
        }
    }
}

fn get_sylvester_v(
    sys: &LinearSystem,
    sysr: &LinearSystem,
    v: &DMatrix<f64>,
) -> Result<SylvesterData> {
    let n = sys.order();
    let q = sysr.order();
    if v.nrows() != n || v.ncols() != q {
        return Err(Error::Dimension {
            what: "projection basis shape",
            expected: n * q,
            actual: v.nrows() * v.ncols(),
        });
    }
    let er_lu = sysr.e_or_identity().lu();
    let er_inv_ar = er_lu
        .solve(sysr.a())
        .ok_or(Error::Factorization("reduced E is singular".into()))?;
    let er_inv_br = er_lu
        .solve(sysr.b())
        .ok_or(Error::Factorization("reduced E is singular".into()))?;

    let ev = match sys.e() {
        Some(e) => e * v,
        None => v.clone(),
    };
    let perp = sys.b() - &ev * &er_inv_br;
    let residual = sys.a() * v - &ev * &er_inv_ar;
    let gram = perp.transpose() * &perp;
    let rhs = gram
        .lu()
        .solve(&(perp.transpose() * &residual))
        .ok_or(Error::Factorization(
            "perpendicular input matrix is rank deficient".into(),
        ))?;
    let s = er_inv_ar - &er_inv_br * &rhs;
    Ok(SylvesterData { rhs, perp, s })
}

/// Pseudo-optimal rational Krylov from input-side Sylvester data: given V,
/// S_V and Rv with A·V − E·V·S_V − B·Rv = 0, build the reduced realization
///
/// Ar = S_V + Br·Rv,  Br = −P⁻¹·Rvᵀ,  Cr = C·V,  Er = I,
///
/// where P solves the Lyapunov equation S_Vᵀ·P + P·S_V = Rvᵀ·Rv. The poles
/// of the result are the mirror images of the shifts.
pub fn pork_v(
    v: &DMatrix<f64>,
    s_v: &DMatrix<f64>,
    rv: &DMatrix<f64>,
    c: &DMatrix<f64>,
) -> Result<LinearSystem> {
    let q = s_v.nrows();
    if s_v.ncols() != q {
        return Err(Error::Dimension {
            what: "S_V columns",
            expected: q,
            actual: s_v.ncols(),
        });
    }
    if rv.ncols() != q || v.ncols() != q {
        return Err(Error::Dimension {
            what: "Sylvester data columns",
            expected: q,
            actual: rv.ncols().min(v.ncols()),
        });
    }
    if c.ncols() != v.nrows() {
        return Err(Error::Dimension {
            what: "C columns",
            expected: v.nrows(),
            actual: c.ncols(),
        });
    }
    let p = solve_lyapunov(&s_v.transpose(), &-(rv.transpose() * rv))?;
    let chol = p
        .clone()
        .cholesky()
        .ok_or(Error::Lyapunov("pseudo-optimality Gramian is not positive definite"))?;
    let br = -chol.solve(&rv.transpose());
    let ar = s_v + &br * rv;
    let cr = c * v;
    let d = DMatrix::zeros(cr.nrows(), br.ncols());
    Ok(LinearSystem::new(ar, br, cr, d, None)?)
}

/// Pseudo-optimal rational Krylov from output-side Sylvester data: given W,
/// the transposed W-side shift matrix S_Wᵀ and Brt = Lᵀ (q×p) with
/// Aᵀ·W − Eᵀ·W·S_W − Cᵀ·L = 0, build
///
/// Ar = S_Wᵀ + Brt·Cr,  Cr = −Brtᵀ·P⁻¹,  Br = Wᵀ·B,  Er = I,
///
/// where P solves S_Wᵀ·P + P·S_W = Brt·Brtᵀ.
pub fn pork_w(
    w: &DMatrix<f64>,
    s_w_t: &DMatrix<f64>,
    brt: &DMatrix<f64>,
    b: &DMatrix<f64>,
) -> Result<LinearSystem> {
    let q = s_w_t.nrows();
    if s_w_t.ncols() != q {
        return Err(Error::Dimension {
            what: "S_W columns",
            expected: q,
            actual: s_w_t.ncols(),
        });
    }
    if brt.nrows() != q || w.ncols() != q {
        return Err(Error::Dimension {
            what: "Sylvester data rows",
            expected: q,
            actual: brt.nrows().min(w.ncols()),
        });
    }
    if b.nrows() != w.nrows() {
        return Err(Error::Dimension {
            what: "B rows",
            expected: w.nrows(),
            actual: b.nrows(),
        });
    }
    let p = solve_lyapunov(s_w_t, &-(brt * brt.transpose()))?;
    let chol = p
        .clone()
        .cholesky()
        .ok_or(Error::Lyapunov("pseudo-optimality Gramian is not positive definite"))?;
    // Cr = −Brtᵀ·P⁻¹, computed as −(P⁻¹·Brt)ᵀ since P is symmetric.
    let cr = -chol.solve(brt).transpose();
    let ar = s_w_t + brt * &cr;
    let br = w.transpose() * b;
    let d = DMatrix::zeros(cr.nrows(), br.ncols());
    Ok(LinearSystem::new(ar, br, cr, d, None)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rk::{RkRequest, rk};
    use crate::spectral::pencil_eigenvalues;
    use nalgebra::{DMatrix, dvector};
    use num_complex::Complex;
    use reductor_core::shifts;

    fn c(re: f64, im: f64) -> Complex<f64> {
        Complex::new(re, im)
    }

    fn siso_sys() -> LinearSystem {
        LinearSystem::standard(
            DMatrix::from_diagonal(&dvector![-1.0, -2.0, -3.0, -4.0, -5.0, -6.0]),
            DMatrix::from_element(6, 1, 1.0),
            DMatrix::from_element(1, 6, 1.0),
        )
        .unwrap()
    }

    fn v_residual(sys: &LinearSystem, v: &DMatrix<f64>, data: &SylvesterData) -> f64 {
        let ev = match sys.e() {
            Some(e) => e * v,
            None => v.clone(),
        };
        (sys.a() * v - ev * &data.s - sys.b() * &data.rhs).norm()
    }

    #[test]
    fn sylvester_residual_vanishes_for_one_sided_rk() {
        let sys = siso_sys();
        let shifts_in = vec![c(0.0, 0.0), c(1.0, 0.0), c(2.0, 0.0)];
        let result = rk(&sys, &RkRequest::one_sided(shifts_in)).unwrap();
        let data = get_sylvester(&sys, &result.sysr, &result.v, SylvesterMode::V).unwrap();
        let res = v_residual(&sys, &result.v, &data);
        assert!(res < 1e-8, "residual = {res}");
    }

    #[test]
    fn shift_matrix_eigenvalues_are_the_shifts() {
        let sys = siso_sys();
        let used = vec![c(0.5, 0.0), c(1.5, 0.0), c(0.3, 1.0), c(0.3, -1.0)];
        let result = rk(&sys, &RkRequest::one_sided(used.clone())).unwrap();
        let data = get_sylvester(&sys, &result.sysr, &result.v, SylvesterMode::V).unwrap();
        let eigs = pencil_eigenvalues(&data.s, None).unwrap();
        let canonical = shifts::canonicalize(&used, 1e-6).unwrap();
        let dist = shifts::set_distance(
            &shifts::canonicalize(&eigs, 1e-6).unwrap(),
            &canonical,
        );
        assert!(dist < 1e-4, "eig(S) distance to shifts = {dist}");
    }

    #[test]
    fn reconstructed_rhs_matches_arnoldi_bookkeeping() {
        let sys = siso_sys();
        let result = rk(
            &sys,
            &RkRequest::one_sided(vec![c(0.0, 0.0), c(1.0, 0.0)]),
        )
        .unwrap();
        let tracked = result.rsylv.clone().unwrap();
        let data = get_sylvester(&sys, &result.sysr, &result.v, SylvesterMode::V).unwrap();
        assert!(
            (&tracked - &data.rhs).norm() < 1e-6 * tracked.norm().max(1.0),
            "tracked {tracked} vs reconstructed {}",
            data.rhs
        );
    }

    #[test]
    fn w_mode_residual_vanishes_for_hermite_rk() {
        let sys = siso_sys();
        let result = rk(
            &sys,
            &RkRequest::hermite(vec![c(0.5, 0.0), c(2.5, 0.0)]),
        )
        .unwrap();
        let w = result.w.clone().unwrap();
        let data = get_sylvester(&sys, &result.sysr, &w, SylvesterMode::W).unwrap();
        // Dual residual: Aᵀ·W − Eᵀ·W·S − Cᵀ·L
        let res = (sys.a().transpose() * &w
            - &w * &data.s
            - sys.c().transpose() * &data.rhs)
            .norm();
        assert!(res < 1e-6, "dual residual = {res}");
    }

    #[test]
    fn pork_v_places_mirrored_poles_and_interpolates() {
        let sys = siso_sys();
        let used = vec![c(1.0, 0.0), c(2.0, 0.0)];
        let result = rk(&sys, &RkRequest::one_sided(used.clone())).unwrap();
        let data = get_sylvester(&sys, &result.sysr, &result.v, SylvesterMode::V).unwrap();
        let sysp = pork_v(&result.v, &data.s, &data.rhs, sys.c()).unwrap();

        let mut poles: Vec<f64> = sysp.poles().unwrap().iter().map(|p| p.re).collect();
        poles.sort_by(f64::total_cmp);
        assert!((poles[0] + 2.0).abs() < 1e-6, "poles = {poles:?}");
        assert!((poles[1] + 1.0).abs() < 1e-6);

        for s in used {
            let h_full = sys.transfer_at(s).unwrap()[(0, 0)];
            let h_pork = sysp.transfer_at(s).unwrap()[(0, 0)];
            assert!(
                (h_full - h_pork).norm() < 1e-6 * h_full.norm(),
                "H({s}): {h_pork} vs {h_full}"
            );
        }
    }

    #[test]
    fn pork_w_places_mirrored_poles_and_interpolates() {
        let sys = siso_sys();
        let used = vec![c(1.0, 0.0), c(3.0, 0.0)];
        let result = rk(&sys, &RkRequest::hermite(used.clone())).unwrap();
        let w = result.w.clone().unwrap();
        let data = get_sylvester(&sys, &result.sysr, &w, SylvesterMode::W).unwrap();
        let sysp = pork_w(&w, &data.s.transpose(), &data.rhs.transpose(), sys.b()).unwrap();

        let mut poles: Vec<f64> = sysp.poles().unwrap().iter().map(|p| p.re).collect();
        poles.sort_by(f64::total_cmp);
        assert!((poles[0] + 3.0).abs() < 1e-6, "poles = {poles:?}");
        assert!((poles[1] + 1.0).abs() < 1e-6);

        for s in used {
            let h_full = sys.transfer_at(s).unwrap()[(0, 0)];
            let h_pork = sysp.transfer_at(s).unwrap()[(0, 0)];
            assert!((h_full - h_pork).norm() < 1e-6 * h_full.norm());
        }
    }

    #[test]
    fn pork_v_scalar_realization() {
        // Scalar case: S = [s], Rv = [r] gives P = r²/(2s), Br = −2s/r,
        // Ar = −s.
        let v = DMatrix::from_element(1, 1, 1.0);
        let s_v = DMatrix::from_element(1, 1, 2.0);
        let rv = DMatrix::from_element(1, 1, 0.5);
        let c_mat = DMatrix::from_element(1, 1, 1.0);
        let sysp = pork_v(&v, &s_v, &rv, &c_mat).unwrap();
        assert!((sysp.a()[(0, 0)] + 2.0).abs() < 1e-12);
        assert!((sysp.b()[(0, 0)] + 8.0).abs() < 1e-12); // −2s/r = −8
    }
}
