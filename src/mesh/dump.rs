//! Read-only cross-section sampling of a loaded grid.

use super::space::Space;
use crate::error::Result;
use crate::geometry::{Axis, V3i};

/// One grid point of a cross-section.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionSample {
    /// First in-plane coordinate (absolute)
    pub u: i32,
    /// Second in-plane coordinate (absolute)
    pub v: i32,
    /// Magnitude of the electric field in V/m
    pub field: f64,
    pub potential: f64,
    pub material: f64,
    pub fixed: bool,
}

/// A plane of the grid orthogonal to `axis` through `probe`.
#[derive(Debug, Clone)]
pub struct CrossSection {
    pub axis: Axis,
    pub probe: V3i,
    /// Samples grouped by the second in-plane coordinate
    pub rows: Vec<Vec<SectionSample>>,
}

/// Magnitude of the central-difference gradient at `pos`. Zero on the
/// border planes and the planes next to them.
pub fn field_magnitude(space: &Space, pos: V3i) -> Result<f64> {
    let (p, s) = (space.pos(), space.size());
    for axis in Axis::ALL {
        let c = pos.get(axis);
        if c <= p.get(axis) || c > p.get(axis) + s.get(axis) - 2 {
            return Ok(0.0);
        }
    }

    let step = space.step();
    let mut sum = 0.0;
    for axis in Axis::ALL {
        let d = V3i::unit(axis);
        let e = (space.field(pos - d)? - space.field(pos + d)?) / (2.0 * step.get(axis));
        sum += e * e;
    }
    Ok(sum.sqrt())
}

/// Sample every grid point of the plane orthogonal to `axis` that passes
/// through `probe`.
pub fn cross_section(space: &Space, axis: Axis, probe: V3i) -> Result<CrossSection> {
    let (p, s) = (space.pos(), space.size());
    let (u_axis, v_axis) = axis.tangents();

    let mut rows = Vec::with_capacity(s.get(v_axis).max(0) as usize);
    for v in p.get(v_axis)..p.get(v_axis) + s.get(v_axis) {
        let mut row = Vec::with_capacity(s.get(u_axis).max(0) as usize);
        for u in p.get(u_axis)..p.get(u_axis) + s.get(u_axis) {
            let mut pos = probe;
            pos.set(u_axis, u);
            pos.set(v_axis, v);
            row.push(SectionSample {
                u,
                v,
                field: field_magnitude(space, pos)?,
                potential: space.field(pos)?,
                material: space.material(pos)?,
                fixed: space.is_fixed(pos)?,
            });
        }
        rows.push(row);
    }

    Ok(CrossSection { axis, probe, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Layer, Material, MaterialId};
    use crate::geometry::{V2i, V3f};
    use approx::assert_relative_eq;

    fn linear_space() -> Space {
        let mut sp = Space::new("dump", V3f::new(0.5, 0.5, 0.5)).with_tile_size(3);
        sp.attach_layer(Layer::new("l", 6, 0, MaterialId(0))).unwrap();
        sp.load(V2i::new(0, 0), V2i::new(5, 4), &[Material::dielectric("air", 2.0)])
            .unwrap();
        for z in 0..6 {
            for y in 0..4 {
                for x in 0..5 {
                    sp.set_field(V3i::new(x, y, z), z as f64, false).unwrap();
                }
            }
        }
        sp
    }

    #[test]
    fn test_field_magnitude_linear() {
        let sp = linear_space();
        // dV/dz = 1 per 0.5 m
        assert_relative_eq!(field_magnitude(&sp, V3i::new(2, 1, 2)).unwrap(), 2.0);
        assert_eq!(field_magnitude(&sp, V3i::new(0, 1, 2)).unwrap(), 0.0);
        assert_eq!(field_magnitude(&sp, V3i::new(2, 3, 2)).unwrap(), 0.0);
        assert_eq!(field_magnitude(&sp, V3i::new(2, 1, 5)).unwrap(), 0.0);
    }

    #[test]
    fn test_cross_section_shape() {
        let sp = linear_space();
        let xs = cross_section(&sp, Axis::X, V3i::new(2, 0, 0)).unwrap();
        assert_eq!(xs.rows.len(), 6);
        assert_eq!(xs.rows[0].len(), 4);
        let s = xs.rows[3][1];
        assert_eq!((s.u, s.v), (1, 3));
        assert_eq!(s.potential, 3.0);
        assert_eq!(s.material, 2.0);
        assert!(!s.fixed);

        let zs = cross_section(&sp, Axis::Z, V3i::new(0, 0, 4)).unwrap();
        assert_eq!(zs.rows.len(), 4);
        assert_eq!(zs.rows[0].len(), 5);
        assert!(zs.rows.iter().flatten().all(|s| s.potential == 4.0));
    }
}
