//! Iterative potential solver.
//!
//! The grid holds a potential at every point and a permittivity for every
//! cell between points. Points flagged as fixed are Dirichlet conditions;
//! every other point is relaxed towards the permittivity-weighted average of
//! its six neighbours:
//!
//! ```text
//! V' = (1 - w) * V + w * sum(k_i * V_i) / sum(k_i)
//! ```
//!
//! where `k_i` is the conductance through the face of the control volume
//! shared with neighbour `i`. For `w = 1` this is Gauss-Seidel; values
//! between 1 and 2 over-relax and usually converge much faster.

mod kernels;
mod sor;

pub use kernels::SweepStats;
pub use sor::Sor;

/// Default relaxation factor (plain Gauss-Seidel).
pub const DEFAULT_OMEGA: f64 = 1.0;

/// Largest relaxation factor for which SOR converges.
pub const MAX_OMEGA: f64 = 2.0;
