//! Per-block relaxation kernels.
//!
//! All three kernels discretise `div(e * grad(V)) = 0` with the same
//! finite-volume weights: the conductance through each face of the control
//! volume around a point is the sum of the permittivities of the four cells
//! sharing that face, times the face area over the distance to the
//! neighbour, divided by four. They differ only in how they reach the
//! neighbours.

use crate::error::Result;
use crate::geometry::{V3f, V3i};
use crate::mesh::{normalize_in, Block, BlockId, FieldRepr, MaterialRepr};

/// Points updated and the largest change seen.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SweepStats {
    pub updated: usize,
    pub max_delta: f64,
}

impl SweepStats {
    #[inline]
    fn record(&mut self, old: f64, new: f64) {
        self.updated += 1;
        let d = (new - old).abs();
        if d > self.max_delta {
            self.max_delta = d;
        }
    }

    pub fn merge(&mut self, other: SweepStats) {
        self.updated += other.updated;
        self.max_delta = self.max_delta.max(other.max_delta);
    }
}

/// Face area over neighbour distance for each axis.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Geometry {
    pub bx: f64,
    pub by: f64,
    pub bz: f64,
}

impl Geometry {
    pub fn new(step: V3f) -> Self {
        Self {
            bx: step.z * step.y / step.x,
            by: step.z * step.x / step.y,
            bz: step.x * step.y / step.z,
        }
    }
}

#[inline]
fn blend(omega: f64, old: f64, target: f64) -> f64 {
    (1.0 - omega) * old + omega * target
}

/// Interior of a homogeneous block.
///
/// Conductances are constant, so they are normalised once and the row loop
/// walks the flat field array with fixed strides to the six neighbours.
pub(crate) fn relax_homogeneous(block: &mut Block, geo: Geometry, omega: f64) -> SweepStats {
    let mut stats = SweepStats::default();
    let size = block.size();
    let e = match block.material {
        MaterialRepr::Homogeneous(e) => e,
        MaterialRepr::Heterogeneous(_) => return stats,
    };
    let (values, fixed) = match &mut block.field {
        FieldRepr::Variable { values, fixed } => (values, fixed),
        FieldRepr::Constant(_) => return stats,
    };

    let total = 2.0 * e * (geo.bx + geo.by + geo.bz);
    if total == 0.0 {
        return stats;
    }
    let kx = e * geo.bx / total;
    let ky = e * geo.by / total;
    let kz = e * geo.bz / total;

    let sx = size.x as usize;
    let sxy = sx * size.y as usize;

    for z in 1..(size.z - 1).max(1) as usize {
        for y in 1..(size.y - 1).max(1) as usize {
            let row = z * sxy + y * sx;
            for i in row + 1..row + sx - 1 {
                if fixed[i] {
                    continue;
                }
                let target = kx * (values[i - 1] + values[i + 1])
                    + ky * (values[i - sx] + values[i + sx])
                    + kz * (values[i - sxy] + values[i + sxy]);
                let old = values[i];
                let new = blend(omega, old, target);
                values[i] = new;
                stats.record(old, new);
            }
        }
    }
    stats
}

/// Interior of a heterogeneous block. Material only varies in x and y, so
/// the four cells below and above a point are the same four cells.
pub(crate) fn relax_heterogeneous(block: &mut Block, geo: Geometry, omega: f64) -> SweepStats {
    let mut stats = SweepStats::default();
    let size = block.size();
    let (values, fixed) = match &mut block.field {
        FieldRepr::Variable { values, fixed } => (values, fixed),
        FieldRepr::Constant(_) => return stats,
    };
    let cells = match &block.material {
        MaterialRepr::Heterogeneous(cells) => cells,
        MaterialRepr::Homogeneous(_) => return stats,
    };

    let ax = geo.bx / 2.0;
    let ay = geo.by / 2.0;
    let az = geo.bz / 4.0;

    let sx = size.x as usize;
    let sxy = sx * size.y as usize;

    for z in 1..(size.z - 1).max(1) as usize {
        for y in 1..(size.y - 1).max(1) as usize {
            for x in 1..(size.x - 1).max(1) as usize {
                let i = z * sxy + y * sx + x;
                if fixed[i] {
                    continue;
                }
                let c = y * sx + x;
                let e11 = cells[c - sx - 1];
                let e12 = cells[c - 1];
                let e21 = cells[c - sx];
                let e22 = cells[c];

                let kx1 = (e11 + e12) * ax;
                let kx2 = (e21 + e22) * ax;
                let ky1 = (e11 + e21) * ay;
                let ky2 = (e12 + e22) * ay;
                let kz = (e11 + e12 + e21 + e22) * az;

                let total = kx1 + kx2 + ky1 + ky2 + 2.0 * kz;
                if total == 0.0 {
                    continue;
                }
                let target = (kx1 * values[i - 1]
                    + kx2 * values[i + 1]
                    + ky1 * values[i - sx]
                    + ky2 * values[i + sx]
                    + kz * (values[i - sxy] + values[i + sxy]))
                    / total;
                let old = values[i];
                let new = blend(omega, old, target);
                values[i] = new;
                stats.record(old, new);
            }
        }
    }
    stats
}

/// Points on the six faces of a block, each exactly once: bottom, top, the
/// two x faces without their z edges, then the two y faces without any
/// edges.
pub(crate) fn shell_points(size: V3i) -> Vec<V3i> {
    let mut points = Vec::new();
    let (sx, sy, sz) = (size.x, size.y, size.z);

    let plane = |z: i32, points: &mut Vec<V3i>| {
        for y in 0..sy {
            for x in 0..sx {
                points.push(V3i::new(x, y, z));
            }
        }
    };
    plane(0, &mut points);
    if sz > 1 {
        plane(sz - 1, &mut points);
    }

    let mut xs = vec![0];
    if sx > 1 {
        xs.push(sx - 1);
    }
    for &x in &xs {
        for z in 1..sz - 1 {
            for y in 0..sy {
                points.push(V3i::new(x, y, z));
            }
        }
    }

    let mut ys = vec![0];
    if sy > 1 {
        ys.push(sy - 1);
    }
    for &y in &ys {
        for z in 1..sz - 1 {
            for x in 1..sx - 1 {
                points.push(V3i::new(x, y, z));
            }
        }
    }
    points
}

/// Offsets from a point to the eight cells around it.
const CELLS: [V3i; 8] = [
    V3i::new(1, 1, 1),
    V3i::new(1, 0, 1),
    V3i::new(0, 1, 1),
    V3i::new(0, 0, 1),
    V3i::new(1, 1, 0),
    V3i::new(1, 0, 0),
    V3i::new(0, 1, 0),
    V3i::new(0, 0, 0),
];

fn field_at(blocks: &[Block], id: BlockId, local: V3i) -> Result<f64> {
    let (b, l) = normalize_in(blocks, id, local)?;
    blocks[b.0].field(l)
}

fn material_at(blocks: &[Block], id: BlockId, local: V3i) -> Result<f64> {
    let (b, l) = normalize_in(blocks, id, local)?;
    blocks[b.0].material(l)
}

/// Relaxation target of one point, fetching across block boundaries.
fn shell_target(blocks: &[Block], id: BlockId, p: V3i, geo: Geometry) -> Result<Option<f64>> {
    let mut e = [0.0; 8];
    for (slot, d) in e.iter_mut().zip(CELLS) {
        *slot = material_at(blocks, id, p - d)?;
    }
    // 1 is the cell below the point on that axis, 2 the cell above
    let [x1y1z1, x1y2z1, x2y1z1, x2y2z1, x1y1z2, x1y2z2, x2y1z2, x2y2z2] = e;

    let ax = geo.bx / 4.0;
    let ay = geo.by / 4.0;
    let az = geo.bz / 4.0;

    let kx1 = (x1y1z1 + x1y1z2 + x1y2z1 + x1y2z2) * ax;
    let kx2 = (x2y1z1 + x2y1z2 + x2y2z1 + x2y2z2) * ax;
    let ky1 = (x1y1z1 + x1y1z2 + x2y1z1 + x2y1z2) * ay;
    let ky2 = (x1y2z1 + x1y2z2 + x2y2z1 + x2y2z2) * ay;
    let kz1 = (x1y1z1 + x1y2z1 + x2y1z1 + x2y2z1) * az;
    let kz2 = (x1y1z2 + x1y2z2 + x2y1z2 + x2y2z2) * az;

    let total = kx1 + kx2 + ky1 + ky2 + kz1 + kz2;
    if total == 0.0 {
        return Ok(None);
    }

    let sum = kx1 * field_at(blocks, id, p - V3i::X)?
        + kx2 * field_at(blocks, id, p + V3i::X)?
        + ky1 * field_at(blocks, id, p - V3i::Y)?
        + ky2 * field_at(blocks, id, p + V3i::Y)?
        + kz1 * field_at(blocks, id, p - V3i::Z)?
        + kz2 * field_at(blocks, id, p + V3i::Z)?;
    Ok(Some(sum / total))
}

/// The six boundary shells of block `id`.
pub(crate) fn relax_shell(
    blocks: &mut [Block],
    id: BlockId,
    geo: Geometry,
    omega: f64,
) -> Result<SweepStats> {
    let mut stats = SweepStats::default();
    let size = blocks[id.0].size();

    for p in shell_points(size) {
        let off = blocks[id.0].offset3(p);
        let old = match &blocks[id.0].field {
            FieldRepr::Variable { values, fixed } => {
                if fixed[off] {
                    continue;
                }
                values[off]
            }
            FieldRepr::Constant(_) => return Ok(stats),
        };

        let target = match shell_target(blocks, id, p, geo)? {
            Some(t) => t,
            None => continue,
        };
        let new = blend(omega, old, target);
        if let FieldRepr::Variable { values, .. } = &mut blocks[id.0].field {
            values[off] = new;
        }
        stats.record(old, new);
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_shell_points_cover_boundary_once() {
        for size in [
            V3i::new(4, 5, 6),
            V3i::new(1, 3, 4),
            V3i::new(3, 1, 2),
            V3i::new(2, 2, 1),
            V3i::new(1, 1, 1),
        ] {
            let points = shell_points(size);
            let unique: HashSet<_> = points.iter().copied().collect();
            assert_eq!(unique.len(), points.len(), "duplicates for {}", size);

            let mut expected = 0;
            for z in 0..size.z {
                for y in 0..size.y {
                    for x in 0..size.x {
                        let on_shell = x == 0
                            || y == 0
                            || z == 0
                            || x == size.x - 1
                            || y == size.y - 1
                            || z == size.z - 1;
                        if on_shell {
                            expected += 1;
                            assert!(unique.contains(&V3i::new(x, y, z)));
                        }
                    }
                }
            }
            assert_eq!(points.len(), expected, "count for {}", size);
        }
    }

    #[test]
    fn test_geometry_weights() {
        let g = Geometry::new(V3f::new(1.0, 2.0, 4.0));
        assert_eq!(g.bx, 8.0);
        assert_eq!(g.by, 2.0);
        assert_eq!(g.bz, 0.5);
    }
}
