//! Capacitance extraction.
//!
//! Each net is driven to 1 V in turn while every other net is held at 0 V.
//! Once the potential has relaxed, the charge on each net follows from
//! Gauss's law: the flux of `e * grad(phi)` through a closed surface
//! wrapped one cell around the net's conductors. Row `n` of the resulting
//! matrix holds those charges for drive net `n`, which are the capacitance
//! coefficients `C[n][m]` in farads.
//!
//! With the sign convention used here the self terms come out negative and
//! the mutual terms positive. Reported pair values are the mean of
//! `C[n][m]` and `C[m][n]`.
//!
//! ```no_run
//! use capfield_core::capacitance::{CancelToken, Extraction, ExtractionConfig, Silent};
//! # fn run(design: &mut capfield_core::design::Design) -> capfield_core::Result<()> {
//! let mut extraction = Extraction::new(design, ExtractionConfig::new().with_omega(1.8))?;
//! let mut matrix = extraction.matrix();
//! extraction.run(&mut matrix, &CancelToken::new(), &mut Silent)?;
//! for pair in matrix.pairs() {
//!     println!("{} {} {:e}", pair.first_name, pair.second_name, pair.value);
//! }
//! # Ok(())
//! # }
//! ```

mod driver;
mod envelope;
mod flux;
mod results;

pub use driver::{CancelToken, Extraction, ExtractionConfig, RunOutcome, Silent, SolveObserver};
pub use envelope::{net_faces, object_faces};
pub use flux::{face_flux, flux_sum};
pub use results::{CapacitanceMatrix, CapacitancePair};
