//! Blocked finite-difference grid.
//!
//! The grid stores a scalar potential per point and a permittivity per
//! cell. Storage is split into [`Block`]s that each collapse independently:
//!
//! | Field | Material | Memory |
//! |-------|----------|--------|
//! | constant | homogeneous | O(1) |
//! | constant | heterogeneous | O(x*y) |
//! | variable | homogeneous | O(x*y*z) |
//! | variable | heterogeneous | O(x*y*z) |
//!
//! Blocks are promoted lazily by the first write that changes their state
//! and demoted again by [`Space::optimize`]. They form a lattice in an arena
//! owned by the [`Space`]; neighbour links are arena indices.
//!
//! A grid point at `(x, y, z)` sits at the lower corner of the material cell
//! with the same index, so the eight cells around a point are
//! `(x-1..=x, y-1..=y, z-1..=z)`.

mod block;
mod dump;
mod space;
mod stamp;

pub use block::{Block, BlockId, Direction, FieldRepr, MaterialRepr};
pub use dump::{cross_section, field_magnitude, CrossSection, SectionSample};
pub use space::{OptimizeStats, Space};

pub(crate) use space::normalize_in;
