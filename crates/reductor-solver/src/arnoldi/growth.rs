//! Incremental Krylov basis growth with cached shifted factorizations.
//!
//! [`KrylovBasis`] is the column-at-a-time engine behind [`super::arnoldi`]
//! and behind the model function's monotonically growing surrogate basis:
//! new shifts append columns, factorizations are cached per shift value, and
//! existing columns are never discarded.

use indexmap::IndexMap;
use nalgebra::{DMatrix, DVector};
use num_complex::Complex;
use num_traits::{One, Zero};
use reductor_core::{LinearSystem, shifts};

use super::ortho::{Basis, InnerProduct};
use super::{ArnoldiOptions, ArnoldiResult, Reorth};
use crate::error::{Error, Result};
use crate::shifted::{ShiftKey, ShiftedSolver};

/// Continuation state of a moment chain at one shift: the indices of the
/// chain's latest basis column(s). The imaginary slot is set for complex
/// conjugate pairs.
struct Chain {
    dir: DVector<Complex<f64>>,
    col_re: usize,
    col_im: Option<usize>,
}

/// A growing rational Krylov basis (V, and W for Hermite construction),
/// together with its Sylvester bookkeeping and factorization caches.
pub struct KrylovBasis {
    ip: InnerProduct,
    hermite: bool,
    cplxpair_tol: f64,
    n: usize,
    m: usize,
    p: usize,
    /// Complexified B, and Cᵀ for the dual side.
    bc: DMatrix<Complex<f64>>,
    ctc: Option<DMatrix<Complex<f64>>>,
    solver: ShiftedSolver,
    dual: Option<ShiftedSolver>,
    v: Basis,
    w: Option<Basis>,
    chains: IndexMap<(ShiftKey, usize), Chain>,
    w_chains: IndexMap<(ShiftKey, usize), Chain>,
    shifts: Vec<Complex<f64>>,
}

impl KrylovBasis {
    pub fn new(sys: &LinearSystem, hermite: bool, opts: &ArnoldiOptions) -> Self {
        let ip = opts
            .inner_product
            .clone()
            .unwrap_or_else(|| InnerProduct::for_system(sys));
        let complexify = |m: &DMatrix<f64>| m.map(|x| Complex::new(x, 0.0));
        Self {
            ip,
            hermite,
            cplxpair_tol: opts.cplxpair_tol,
            n: sys.order(),
            m: sys.num_inputs(),
            p: sys.num_outputs(),
            bc: complexify(sys.b()),
            ctc: hermite.then(|| complexify(&sys.c().transpose())),
            solver: ShiftedSolver::new(sys.a().clone(), sys.e().cloned()),
            dual: hermite.then(|| ShiftedSolver::new_dual(sys.a(), sys.e())),
            v: Basis::new(),
            w: hermite.then(Basis::new),
            chains: IndexMap::new(),
            w_chains: IndexMap::new(),
            shifts: Vec::new(),
        }
    }

    /// Number of basis columns built so far.
    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.len() == 0
    }

    /// The canonical shifts processed so far, in processing order (block
    /// Krylov contributes several columns per listed shift).
    pub fn shifts(&self) -> &[Complex<f64>] {
        &self.shifts
    }

    pub fn v_matrix(&self) -> DMatrix<f64> {
        self.v.as_matrix()
    }

    pub fn w_matrix(&self) -> Option<DMatrix<f64>> {
        self.w.as_ref().map(Basis::as_matrix)
    }

    /// Project a system onto the current basis (W = V when one-sided).
    pub fn project(&self, sys: &LinearSystem) -> Result<LinearSystem> {
        if self.is_empty() {
            return Err(Error::Dimension {
                what: "Krylov basis size",
                expected: 1,
                actual: 0,
            });
        }
        let v = self.v.as_matrix();
        let w = match &self.w {
            Some(w) => w.as_matrix(),
            None => v.clone(),
        };
        Ok(sys.project(&w, &v)?)
    }

    /// Append columns for a batch of shifts (with optional tangential
    /// directions), reusing cached factorizations and orthogonalizing the
    /// new columns against all existing ones.
    pub fn extend(
        &mut self,
        new_shifts: &[Complex<f64>],
        rt: Option<&DMatrix<Complex<f64>>>,
        lt: Option<&DMatrix<Complex<f64>>>,
    ) -> Result<()> {
        let (canonical, perm) = shifts::canonicalize_indexed(new_shifts, self.cplxpair_tol)?;

        if let Some(rt) = rt {
            if rt.nrows() != self.m {
                return Err(Error::Dimension {
                    what: "Rt rows",
                    expected: self.m,
                    actual: rt.nrows(),
                });
            }
            if rt.ncols() != new_shifts.len() {
                return Err(Error::Dimension {
                    what: "Rt columns",
                    expected: new_shifts.len(),
                    actual: rt.ncols(),
                });
            }
        }
        if self.hermite {
            match (rt, lt) {
                (Some(_), None) => {
                    return Err(Error::Dimension {
                        what: "Lt columns",
                        expected: new_shifts.len(),
                        actual: 0,
                    });
                }
                (None, Some(_)) => {
                    return Err(Error::Dimension {
                        what: "Rt columns",
                        expected: new_shifts.len(),
                        actual: 0,
                    });
                }
                (None, None) if self.m != self.p => {
                    return Err(Error::Dimension {
                        what: "block Hermite output count",
                        expected: self.m,
                        actual: self.p,
                    });
                }
                _ => {}
            }
            if let Some(lt) = lt {
                if lt.nrows() != self.p {
                    return Err(Error::Dimension {
                        what: "Lt rows",
                        expected: self.p,
                        actual: lt.nrows(),
                    });
                }
                if lt.ncols() != new_shifts.len() {
                    return Err(Error::Dimension {
                        what: "Lt columns",
                        expected: new_shifts.len(),
                        actual: lt.ncols(),
                    });
                }
            }
        }

        let block = rt.is_none();
        let per_shift = if block { self.m } else { 1 };
        let mut added = 0;
        let mut i = 0;
        while i < canonical.len() {
            let width = if canonical[i].im > 0.0 { 2 } else { 1 };
            added += width * per_shift;
            i += width;
        }
        if self.len() + added > self.n {
            return Err(Error::Dimension {
                what: "Krylov basis size",
                expected: self.n,
                actual: self.len() + added,
            });
        }

        let mut pending: Vec<usize> = Vec::new();
        let mut i = 0;
        while i < canonical.len() {
            let s = canonical[i];
            let pair = s.im > 0.0;
            let src = perm[i];
            let tasks: Vec<(usize, DVector<Complex<f64>>, Option<DVector<Complex<f64>>>)> =
                match rt {
                    Some(rt) => {
                        let dir = rt.column(src).into_owned();
                        let ldir = lt.map(|lt| lt.column(src).into_owned());
                        vec![(0, dir, ldir)]
                    }
                    None => (0..self.m)
                        .map(|k| {
                            let dir = unit_complex(self.m, k);
                            let ldir = self.hermite.then(|| unit_complex(self.p, k));
                            (k, dir, ldir)
                        })
                        .collect(),
                };
            for (chain_id, dir, ldir) in tasks {
                self.process(s, pair, chain_id, dir, ldir, &mut pending)?;
            }
            self.shifts.push(s);
            if pair {
                self.shifts.push(s.conj());
                i += 2;
            } else {
                i += 1;
            }
        }

        // Second orthogonalization pass over the columns that came from
        // splitting complex solutions into real and imaginary parts.
        for &idx in &pending {
            self.v.repass(&self.ip, idx)?;
            if let Some(w) = &mut self.w {
                w.repass(&self.ip, idx)?;
            }
        }
        Ok(())
    }

    /// Build one column (or a real/imaginary pair) for shift `s`.
    fn process(
        &mut self,
        s: Complex<f64>,
        pair: bool,
        chain_id: usize,
        dir: DVector<Complex<f64>>,
        ldir: Option<DVector<Complex<f64>>>,
        pending: &mut Vec<usize>,
    ) -> Result<()> {
        if !pair && imag_norm(&dir) > 1e-12 * dir.norm().max(1.0) {
            return Err(Error::ComplexDirection { shift: s });
        }
        let key = (ShiftKey::of(s), chain_id);
        let continued = match self.chains.get(&key) {
            Some(chain) => dirs_match(&chain.dir, &dir),
            None => false,
        };

        // Input side.
        let rhs = if continued {
            let cont = chain_vector(&self.v, &self.chains[&key]);
            if s.re.is_infinite() {
                self.solver.apply_a(&cont)
            } else {
                self.solver.apply_e(&cont)
            }
        } else {
            &self.bc * &dir
        };
        let y = self.solver.solve(s, &rhs)?;
        // Repeated-shift columns contribute nothing new to the right-hand
        // Sylvester data.
        let rdir = if continued {
            DVector::from_element(self.m, Complex::new(0.0, 0.0))
        } else {
            dir.clone()
        };
        let re_idx = self.v.insert(&self.ip, y.map(|z| z.re), rdir.map(|z| z.re))?;
        let im_idx = if pair {
            let idx = self.v.insert(&self.ip, y.map(|z| z.im), rdir.map(|z| z.im))?;
            pending.push(idx);
            Some(idx)
        } else {
            None
        };
        self.chains.insert(
            key,
            Chain {
                dir,
                col_re: re_idx,
                col_im: im_idx,
            },
        );

        // Output (dual) side, Hermite only.
        if self.hermite {
            let ldir = ldir.ok_or(Error::Dimension {
                what: "Lt columns",
                expected: 1,
                actual: 0,
            })?;
            if !pair && imag_norm(&ldir) > 1e-12 * ldir.norm().max(1.0) {
                return Err(Error::ComplexDirection { shift: s });
            }
            let dual = self.dual.as_mut().expect("hermite basis has a dual solver");
            let w = self.w.as_mut().expect("hermite basis has a W side");
            let w_continued = continued && self.w_chains.contains_key(&key);
            let rhs_w = if w_continued {
                let cont = chain_vector(w, &self.w_chains[&key]);
                if s.re.is_infinite() {
                    dual.apply_a(&cont)
                } else {
                    dual.apply_e(&cont)
                }
            } else {
                self.ctc.as_ref().expect("hermite basis has Cᵀ") * &ldir
            };
            let y_w = dual.solve(s, &rhs_w)?;
            let ldir_shadow = if w_continued {
                DVector::from_element(self.p, Complex::new(0.0, 0.0))
            } else {
                ldir.clone()
            };
            let re_w = w.insert(&self.ip, y_w.map(|z| z.re), ldir_shadow.map(|z| z.re))?;
            let im_w = if pair {
                Some(w.insert(&self.ip, y_w.map(|z| z.im), ldir_shadow.map(|z| z.im))?)
            } else {
                None
            };
            self.w_chains.insert(
                key,
                Chain {
                    dir: ldir,
                    col_re: re_w,
                    col_im: im_w,
                },
            );
        }
        Ok(())
    }

    /// Final re-orthogonalization pass and assembly. Consumes the basis; the
    /// QR variant produces a cleaner basis but invalidates the Sylvester
    /// bookkeeping, which is therefore omitted from its result.
    pub fn finish(mut self, reorth: Reorth) -> Result<ArnoldiResult> {
        if self.is_empty() {
            return Err(Error::Dimension {
                what: "Krylov basis size",
                expected: 1,
                actual: 0,
            });
        }
        match reorth {
            Reorth::None => {}
            Reorth::Gs => {
                self.v.reorthogonalize(&self.ip)?;
                if let Some(w) = &mut self.w {
                    w.reorthogonalize(&self.ip)?;
                }
            }
            Reorth::Qr => {
                let v = self.v.as_matrix().qr().q();
                let w = self.w.as_ref().map(|w| w.as_matrix().qr().q());
                return Ok(ArnoldiResult {
                    v,
                    w,
                    rsylv: None,
                    lsylv: None,
                });
            }
        }
        Ok(ArnoldiResult {
            v: self.v.as_matrix(),
            w: self.w.as_ref().map(Basis::as_matrix),
            rsylv: Some(self.v.shadow_matrix()),
            lsylv: self.w.as_ref().map(Basis::shadow_matrix),
        })
    }
}

fn unit_complex(len: usize, k: usize) -> DVector<Complex<f64>> {
    DVector::from_fn(len, |i, _| {
        if i == k {
            Complex::one()
        } else {
            Complex::zero()
        }
    })
}

fn imag_norm(v: &DVector<Complex<f64>>) -> f64 {
    v.iter().map(|z| z.im * z.im).sum::<f64>().sqrt()
}

fn dirs_match(a: &DVector<Complex<f64>>, b: &DVector<Complex<f64>>) -> bool {
    if a.len() != b.len() {
        return false;
    }
    (a - b).norm() <= 1e-12 * a.norm().max(1.0)
}

fn chain_vector(basis: &Basis, chain: &Chain) -> DVector<Complex<f64>> {
    let re = &basis.cols[chain.col_re];
    match chain.col_im {
        Some(i) => {
            let im = &basis.cols[i];
            DVector::from_fn(re.len(), |k, _| Complex::new(re[k], im[k]))
        }
        None => re.map(|x| Complex::new(x, 0.0)),
    }
}
