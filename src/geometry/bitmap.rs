//! 2D occupancy maps.

use super::vector::V2i;
use crate::error::{try_filled, CapError, Result};

/// Structuring element used when dilating a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrowKernel {
    /// `(2r+1)^2` box; keeps sharp corners.
    Square,
    /// Disc of radius `r`; rounds corners.
    Round,
}

/// Row-major boolean occupancy map. Cell `(x, y)` covers the unit square
/// between grid points `(x, y)` and `(x+1, y+1)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    size: V2i,
    cells: Vec<bool>,
}

impl Bitmap {
    /// Create an empty bitmap.
    pub fn new(size: V2i) -> Result<Self> {
        Ok(Self {
            size,
            cells: try_filled("bitmap", size.area(), false)?,
        })
    }

    /// Create a bitmap with every cell set.
    pub fn filled(size: V2i) -> Result<Self> {
        Ok(Self {
            size,
            cells: try_filled("bitmap", size.area(), true)?,
        })
    }

    pub fn size(&self) -> V2i {
        self.size
    }

    pub fn contains(&self, pos: V2i) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.size.x && pos.y < self.size.y
    }

    fn offset(&self, pos: V2i) -> Option<usize> {
        self.contains(pos)
            .then(|| pos.y as usize * self.size.x as usize + pos.x as usize)
    }

    /// Cell state; cells outside the map read as empty.
    pub fn get(&self, pos: V2i) -> bool {
        self.offset(pos).map_or(false, |off| self.cells[off])
    }

    /// Set one cell. Fails with [`CapError::OutOfBounds`] outside the map.
    pub fn set(&mut self, pos: V2i, value: bool) -> Result<()> {
        let off = self
            .offset(pos)
            .ok_or(CapError::OutOfBounds { pos: pos.with_z(0) })?;
        self.cells[off] = value;
        Ok(())
    }

    /// Number of occupied cells.
    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// Occupied cells in row-major order.
    pub fn occupied(&self) -> impl Iterator<Item = V2i> + '_ {
        let sx = self.size.x.max(1) as usize;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(move |(i, _)| V2i::new((i % sx) as i32, (i / sx) as i32))
    }

    /// Flip every cell.
    pub fn invert(&mut self) {
        for c in &mut self.cells {
            *c = !*c;
        }
    }

    /// Dilate by `r` cells. The result is `2r` larger on each axis and cell
    /// `p` of `self` maps to `p + (r, r)`.
    pub fn grown(&self, r: i32, kernel: GrowKernel) -> Result<Bitmap> {
        debug_assert!(r >= 0);
        let mut out = Bitmap::new(self.size + V2i::splat(2 * r))?;
        for cell in self.occupied() {
            let center = cell + V2i::splat(r);
            for dy in -r..=r {
                for dx in -r..=r {
                    if kernel == GrowKernel::Round && dx * dx + dy * dy > r * r {
                        continue;
                    }
                    out.set(center + V2i::new(dx, dy), true)?;
                }
            }
        }
        Ok(out)
    }

    /// Smallest box containing every occupied cell, as `(min, size)`.
    pub fn tight_bounds(&self) -> Option<(V2i, V2i)> {
        let mut cells = self.occupied();
        let first = cells.next()?;
        let (min, max) = cells.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some((min, max - min + V2i::splat(1)))
    }

    /// Copy of the `size` window starting at `min`.
    pub fn cropped(&self, min: V2i, size: V2i) -> Result<Bitmap> {
        let mut out = Bitmap::new(size)?;
        for y in 0..size.y {
            for x in 0..size.x {
                let p = V2i::new(x, y);
                if self.get(min + p) {
                    out.set(p, true)?;
                }
            }
        }
        Ok(out)
    }

    /// OR `other` into `self`, with `other`'s origin placed at `offset`.
    pub fn paint(&mut self, other: &Bitmap, offset: V2i) {
        for cell in other.occupied() {
            if let Some(off) = self.offset(cell + offset) {
                self.cells[off] = true;
            }
        }
    }
}

/// True if the rectangles `[pos1, pos1+size1)` and `[pos2, pos2+size2)`
/// overlap or the first one ends exactly where the second one starts.
///
/// Objects stamp the grid points on the far edge of their last cell, so a
/// rectangle ending at `pos2` still touches the region.
pub fn rect_overlap(pos1: V2i, size1: V2i, pos2: V2i, size2: V2i) -> bool {
    !(pos1.x >= pos2.x + size2.x
        || pos1.x + size1.x < pos2.x
        || pos1.y >= pos2.y + size2.y
        || pos1.y + size1.y < pos2.y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::V3i;

    #[test]
    fn test_grow_square() {
        let mut map = Bitmap::new(V2i::new(1, 1)).unwrap();
        map.set(V2i::ZERO, true).unwrap();
        let grown = map.grown(2, GrowKernel::Square).unwrap();
        assert_eq!(grown.size(), V2i::new(5, 5));
        assert_eq!(grown.count(), 25);
    }

    #[test]
    fn test_grow_round() {
        let mut map = Bitmap::new(V2i::new(1, 1)).unwrap();
        map.set(V2i::ZERO, true).unwrap();
        let grown = map.grown(2, GrowKernel::Round).unwrap();
        // disc of radius 2: 13 lattice points with dx^2+dy^2 <= 4
        assert_eq!(grown.count(), 13);
        assert!(grown.get(V2i::new(2, 0)));
        assert!(!grown.get(V2i::new(0, 0)));
    }

    #[test]
    fn test_tight_bounds_and_crop() {
        let mut map = Bitmap::new(V2i::new(6, 4)).unwrap();
        map.set(V2i::new(2, 1), true).unwrap();
        map.set(V2i::new(4, 2), true).unwrap();
        let (min, size) = map.tight_bounds().unwrap();
        assert_eq!(min, V2i::new(2, 1));
        assert_eq!(size, V2i::new(3, 2));

        let crop = map.cropped(min, size).unwrap();
        assert!(crop.get(V2i::new(0, 0)));
        assert!(crop.get(V2i::new(2, 1)));
        assert_eq!(crop.count(), 2);

        assert!(Bitmap::new(V2i::new(2, 2)).unwrap().tight_bounds().is_none());
    }

    #[test]
    fn test_invert() {
        let mut map = Bitmap::filled(V2i::new(3, 2)).unwrap();
        map.set(V2i::new(1, 1), false).unwrap();
        map.invert();
        assert_eq!(map.count(), 1);
        assert!(map.get(V2i::new(1, 1)));
    }

    #[test]
    fn test_get_outside_reads_empty() {
        let map = Bitmap::filled(V2i::new(2, 2)).unwrap();
        assert!(!map.get(V2i::new(-1, 0)));
        assert!(!map.get(V2i::new(0, 2)));
    }

    #[test]
    fn test_set_outside_rejected() {
        let mut map = Bitmap::new(V2i::new(3, 2)).unwrap();
        // (3, 0) would alias row 1 in the flat layout
        assert!(matches!(
            map.set(V2i::new(3, 0), true),
            Err(CapError::OutOfBounds { pos }) if pos == V3i::new(3, 0, 0)
        ));
        assert!(map.set(V2i::new(0, -1), true).is_err());
        assert_eq!(map.count(), 0);

        // painting clips instead of failing
        let src = Bitmap::filled(V2i::new(2, 2)).unwrap();
        map.paint(&src, V2i::new(2, 1));
        assert_eq!(map.count(), 1);
        assert!(map.get(V2i::new(2, 1)));
    }

    #[test]
    fn test_rect_overlap_touching() {
        let a = V2i::new(0, 0);
        let s = V2i::new(4, 4);
        assert!(rect_overlap(a, s, V2i::new(2, 2), s));
        // ends exactly where the other starts
        assert!(rect_overlap(a, s, V2i::new(4, 0), s));
        // starts exactly where the other ends
        assert!(!rect_overlap(V2i::new(4, 0), s, a, s));
        assert!(!rect_overlap(a, s, V2i::new(10, 0), s));
    }
}
