//! # Capfield Core
//!
//! A finite-difference capacitance calculator for layered geometries such
//! as printed circuit boards.
//!
//! This library provides:
//! - A sectioned configuration language for materials, objects, layers and nets
//! - A blocked 3D grid whose blocks collapse to constants where they can
//! - Successive over-relaxation (SOR) of the Laplace equation
//! - Net-to-net capacitance extraction through Gauss's law
//!
//! ## Architecture
//!
//! - [`config`] - Lexer and parser for the configuration language
//! - [`design`] - Materials, layers, nets and the name-resolved [`design::Design`]
//! - [`geometry`] - Vectors, bitmaps and 2D objects
//! - [`mesh`] - Blocks, the [`mesh::Space`] grid and object stamping
//! - [`solver`] - SOR relaxation kernels
//! - [`capacitance`] - Flux integration and the per-net extraction driver
//! - `report` - Text output and cross-section dumps (CLI only)
//!
//! ## Usage
//!
//! ```bash
//! capfield -w 1.8 -e 0.01 board.cfg
//! ```
//!
//! ## Method
//!
//! For each net in turn:
//!
//! 1. Drive the net to 1 V and every other net to 0 V
//! 2. Load the grid around the net with a standoff margin, zero on its border
//! 3. Relax the potential in batches of SOR sweeps
//! 4. After each batch, integrate the flux around every net; stop when no
//!    flux changes by more than the error threshold
//!
//! The flux around net `m` with net `n` driven is the capacitance
//! coefficient `C[n][m]`.

pub mod capacitance;
pub mod config;
pub mod design;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod solver;

#[cfg(feature = "cli")]
pub mod report;

// Re-export main types for convenience
pub use capacitance::{CapacitanceMatrix, Extraction, ExtractionConfig};
pub use design::Design;
pub use error::{CapError, Result};
pub use mesh::Space;

/// Default distance in grid units between a net and the edge of its grid
pub const DEFAULT_STANDOFF: i32 = 50;

/// Default number of SOR sweeps between two flux evaluations
pub const DEFAULT_BATCH_ITERATIONS: usize = 100;

/// Default convergence threshold (relative flux change)
pub const DEFAULT_MAX_ERROR: f64 = 0.10;

/// Permittivity of free space in F/m
pub const VACUUM_PERMITTIVITY: f64 = 8.85e-12;

/// Edge length of grid blocks in x and y
pub const TILE_SIZE: i32 = 64;

/// Distance of the flux surface from the conductors of a net
pub const PROBE_STANDOFF: i32 = 1;
