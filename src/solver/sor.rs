//! Successive over-relaxation over a blocked grid.

use tracing::trace;

use super::kernels::{relax_heterogeneous, relax_homogeneous, relax_shell, Geometry, SweepStats};
use super::MAX_OMEGA;
use crate::error::{CapError, Result};
use crate::mesh::{BlockId, FieldRepr, MaterialRepr, Space};

/// In-place SOR solver for the Laplace equation with variable
/// permittivity.
///
/// Points are updated Gauss-Seidel style: a point sees the values its
/// neighbours already received earlier in the same sweep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sor {
    omega: f64,
}

impl Default for Sor {
    fn default() -> Self {
        Self {
            omega: super::DEFAULT_OMEGA,
        }
    }
}

impl Sor {
    /// Create a solver with relaxation factor `omega`, which must lie in
    /// `[0, 2]`.
    pub fn new(omega: f64) -> Result<Self> {
        if !(0.0..=MAX_OMEGA).contains(&omega) {
            return Err(CapError::solver_param(format!(
                "relaxation factor {} outside [0, {}]",
                omega, MAX_OMEGA
            )));
        }
        Ok(Self { omega })
    }

    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// One pass over every non-fixed point of the loaded grid.
    ///
    /// Blocks are visited in lattice order. Within a block the interior
    /// goes first, through the homogeneous fast path when the block has a
    /// single permittivity, then the six boundary shells, whose neighbours
    /// may live in adjacent blocks. Constant-field blocks are skipped.
    pub fn sweep(&self, space: &mut Space) -> Result<SweepStats> {
        if !space.is_loaded() {
            return Err(CapError::SpaceNotLoaded {
                space: space.name().to_string(),
            });
        }
        let geo = Geometry::new(space.step());
        let blocks = space.blocks_mut();
        let mut stats = SweepStats::default();

        for id in 0..blocks.len() {
            let block = &mut blocks[id];
            if matches!(block.field, FieldRepr::Constant(_)) {
                continue;
            }
            let interior = match block.material {
                MaterialRepr::Homogeneous(_) => relax_homogeneous(block, geo, self.omega),
                MaterialRepr::Heterogeneous(_) => relax_heterogeneous(block, geo, self.omega),
            };
            stats.merge(interior);
            stats.merge(relax_shell(blocks, BlockId(id), geo, self.omega)?);
        }
        Ok(stats)
    }

    /// Run `iterations` sweeps.
    pub fn relax(&self, space: &mut Space, iterations: usize) -> Result<SweepStats> {
        let mut total = SweepStats::default();
        for i in 0..iterations {
            let stats = self.sweep(space)?;
            trace!(sweep = i, updated = stats.updated, max_delta = stats.max_delta, "sor sweep");
            total.merge(stats);
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Layer, Material, MaterialId};
    use crate::geometry::{V2i, V3f, V3i};
    use approx::assert_relative_eq;

    fn cube(tile: i32, n: i32, e: f64) -> Space {
        let mut sp = Space::new("cube", V3f::new(1e-3, 1e-3, 1e-3)).with_tile_size(tile);
        sp.attach_layer(Layer::new("bulk", n, 0, MaterialId(0))).unwrap();
        sp.load(V2i::ZERO, V2i::new(n, n), &[Material::dielectric("d", e)])
            .unwrap();
        sp
    }

    /// Grid with potential 1 on z = 0, 0 on every other border plane and a
    /// free interior.
    fn boxed(tile: i32, n: i32) -> Space {
        let mut sp = cube(tile, n, 2.0);
        for z in 1..n - 1 {
            for y in 1..n - 1 {
                for x in 1..n - 1 {
                    sp.set_field(V3i::new(x, y, z), 0.0, false).unwrap();
                }
            }
        }
        sp.apply_border(0.0).unwrap();
        for y in 0..n {
            for x in 0..n {
                sp.set_field(V3i::new(x, y, 0), 1.0, true).unwrap();
            }
        }
        sp
    }

    #[test]
    fn test_omega_range() {
        assert!(Sor::new(0.0).is_ok());
        assert!(Sor::new(2.0).is_ok());
        assert!(Sor::new(1.95).is_ok());
        assert!(matches!(Sor::new(-0.1), Err(CapError::InvalidSolverParam { .. })));
        assert!(matches!(Sor::new(2.01), Err(CapError::InvalidSolverParam { .. })));
        assert!(Sor::new(f64::NAN).is_err());
        assert_eq!(Sor::default().omega(), 1.0);
    }

    #[test]
    fn test_unloaded_space_rejected() {
        let mut sp = Space::new("empty", V3f::new(1.0, 1.0, 1.0));
        assert!(matches!(
            Sor::default().sweep(&mut sp),
            Err(CapError::SpaceNotLoaded { .. })
        ));
    }

    #[test]
    fn test_uniform_boundary_is_fixed_point() {
        // 3x3 tiles so the interior spans block shells
        let mut sp = cube(2, 5, 1.0);
        for z in 1..4 {
            for y in 1..4 {
                for x in 1..4 {
                    sp.set_field(V3i::new(x, y, z), 0.0, false).unwrap();
                }
            }
        }
        sp.apply_border(3.0).unwrap();

        let sor = Sor::new(1.0).unwrap();
        let first = sor.sweep(&mut sp).unwrap();
        assert_eq!(first.updated, 27);
        assert!(first.max_delta > 1.0);

        sor.relax(&mut sp, 200).unwrap();
        let last = sor.sweep(&mut sp).unwrap();
        assert!(last.max_delta < 1e-12, "residual {}", last.max_delta);
        for z in 1..4 {
            for y in 1..4 {
                for x in 1..4 {
                    let p = V3i::new(x, y, z);
                    assert_relative_eq!(sp.field(p).unwrap(), 3.0, epsilon = 1e-9);
                    assert!(!sp.is_fixed(p).unwrap());
                }
            }
        }
    }

    #[test]
    fn test_zero_omega_changes_nothing() {
        let mut sp = boxed(3, 6);
        let stats = Sor::new(0.0).unwrap().relax(&mut sp, 3).unwrap();
        assert_eq!(stats.max_delta, 0.0);
        assert_eq!(sp.field(V3i::new(2, 2, 1)).unwrap(), 0.0);
    }

    #[test]
    fn test_potential_decreases_away_from_driven_plane() {
        let mut sp = boxed(64, 7);
        Sor::new(1.5).unwrap().relax(&mut sp, 200).unwrap();
        let near = sp.field(V3i::new(3, 3, 1)).unwrap();
        let mid = sp.field(V3i::new(3, 3, 3)).unwrap();
        let far = sp.field(V3i::new(3, 3, 5)).unwrap();
        assert!(near > mid && mid > far && far > 0.0);
        assert!(near < 1.0);
        // symmetric about the x = 3 and y = 3 planes
        assert_relative_eq!(
            sp.field(V3i::new(2, 3, 2)).unwrap(),
            sp.field(V3i::new(4, 3, 2)).unwrap(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            sp.field(V3i::new(3, 2, 2)).unwrap(),
            sp.field(V3i::new(3, 4, 2)).unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_tiling_does_not_change_solution() {
        let mut whole = boxed(64, 8);
        let mut tiled = boxed(3, 8);
        for sp in [&mut whole, &mut tiled] {
            // a dielectric slab on one side makes some blocks heterogeneous
            for y in 0..7 {
                for x in 0..4 {
                    sp.set_material(V3i::new(x, y, 2), 6.0).unwrap();
                }
            }
        }
        assert!(whole.blocks().iter().any(|b| !b.is_homogeneous()));
        assert_eq!(
            tiled.blocks()[0].material_repr(),
            &MaterialRepr::Heterogeneous(vec![6.0; 9])
        );
        // collapsing changes storage only
        tiled.optimize();
        assert_eq!(tiled.blocks()[0].material_repr(), &MaterialRepr::Homogeneous(6.0));

        let sor = Sor::new(1.6).unwrap();
        sor.relax(&mut whole, 400).unwrap();
        sor.relax(&mut tiled, 400).unwrap();

        for z in 1..7 {
            for y in 1..7 {
                for x in 1..7 {
                    let p = V3i::new(x, y, z);
                    assert_relative_eq!(
                        whole.field(p).unwrap(),
                        tiled.field(p).unwrap(),
                        epsilon = 1e-6
                    );
                }
            }
        }
    }

    #[test]
    fn test_constant_blocks_are_skipped() {
        let mut sp = cube(3, 6, 1.0);
        let stats = Sor::default().sweep(&mut sp).unwrap();
        assert_eq!(stats.updated, 0);
    }
}
