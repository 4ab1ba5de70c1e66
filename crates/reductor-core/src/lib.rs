//! Core data model for Krylov-based model order reduction.
//!
//! This crate holds the descriptor state-space representation
//! ([`LinearSystem`]) and the shift-vector handling shared by every
//! reduction algorithm in `reductor-solver`: canonical complex-conjugate
//! pairing, multiplicity expansion, and reordering-tolerant comparison.
//!
//! The model is deliberately free of solver state: systems are immutable
//! value objects, and every derived quantity (transfer function values,
//! moments, poles) is computed on demand.

pub mod error;
pub mod shifts;
pub mod system;

pub use error::{CoreError, Result};
pub use system::LinearSystem;
