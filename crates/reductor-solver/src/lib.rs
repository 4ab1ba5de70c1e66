//! Krylov-subspace model order reduction for large LTI descriptor systems.
//!
//! Given a system E·x' = A·x + B·u, y = C·x + D·u, this crate produces a
//! much smaller system of order q whose transfer function interpolates the
//! original at chosen complex frequencies (moment matching). The pieces
//! compose bottom-up:
//!
//! - [`shifted`] — shifted-pencil solves (A − sE)·x = r with per-shift
//!   factorization caching (dense below a size threshold, sparse LU above).
//! - [`arnoldi`] — the rational Krylov basis builder, including the
//!   incremental column-at-a-time growth used by the model function.
//! - [`rk`] — one-sided, Hermite, and two-sided projection driver.
//! - [`irka`] — fixed-point search for locally H2-optimal shifts.
//! - [`modelfct`] — model-function acceleration (CIRKA): runs the shift
//!   search on a cheap growing surrogate instead of the full system.
//! - [`sylvester`] — Sylvester-equation bookkeeping and pseudo-optimal
//!   realizations (PORK).
//! - [`lyapunov`] / [`spectral`] — small dense Lyapunov, H2 norm, and pencil
//!   eigenvalue helpers shared by the above.
//!
//! The pipeline is single-threaded and synchronous; every call owns its
//! factorization caches and no state is shared between calls. Convergence
//! failures are flagged results with warnings, not errors.

pub mod arnoldi;
pub mod error;
pub mod irka;
pub mod lyapunov;
pub mod modelfct;
pub mod rk;
pub mod shifted;
pub mod spectral;
pub mod sylvester;

pub use arnoldi::{
    ArnoldiOptions, ArnoldiRequest, ArnoldiResult, InnerProduct, KrylovBasis, Reorth, arnoldi,
};
pub use error::{Error, Result};
pub use irka::{IrkaOptions, IrkaResult, StopCriterion, irka};
pub use lyapunov::{h2_norm, solve_generalized_lyapunov, solve_lyapunov};
pub use modelfct::{CirkaOptions, ModelFctOptions, ModelFctResult, cirka, model_fct_mor};
pub use rk::{RkRequest, RkResult, rk, rk_with};
pub use sylvester::{SylvesterData, SylvesterMode, get_sylvester, pork_v, pork_w};
