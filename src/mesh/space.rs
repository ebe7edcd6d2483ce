//! The grid: a lattice of blocks over the currently loaded region.

use std::cell::Cell;

use tracing::{debug, info};

use super::block::{Block, BlockId, Direction};
use crate::design::{Layer, Material};
use crate::error::{CapError, Result};
use crate::geometry::{Axis, V2i, V3f, V3i};
use crate::TILE_SIZE;

/// Finite-difference grid.
///
/// A space owns its layer stack permanently and a block lattice only while
/// a region is loaded. Blocks are tiled `tile x tile` horizontally (the last
/// tile on each axis is clipped to the region) with one block layer per
/// design layer, so vertical block boundaries coincide with layer
/// boundaries.
#[derive(Debug)]
pub struct Space {
    name: String,
    /// Physical grid step in metres
    step: V3f,
    /// Layers sorted by z-order
    layers: Vec<Layer>,
    tile: i32,
    pos: V3i,
    size: V3i,
    /// Block counts per axis of the loaded lattice
    dims: V3i,
    blocks: Vec<Block>,
    /// Last block returned by `find_block`
    cache: Cell<Option<BlockId>>,
}

impl Space {
    /// Create an empty, unloaded space.
    pub fn new(name: impl Into<String>, step: V3f) -> Self {
        Self {
            name: name.into(),
            step,
            layers: Vec::new(),
            tile: TILE_SIZE,
            pos: V3i::ZERO,
            size: V3i::ZERO,
            dims: V3i::ZERO,
            blocks: Vec::new(),
            cache: Cell::new(None),
        }
    }

    /// Use a different horizontal tile size for future loads.
    pub fn with_tile_size(mut self, tile: i32) -> Self {
        self.tile = tile.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn step(&self) -> V3f {
        self.step
    }

    pub fn tile_size(&self) -> i32 {
        self.tile
    }

    /// Layers in stacking order.
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Origin of the loaded region (z is always 0).
    pub fn pos(&self) -> V3i {
        self.pos
    }

    /// Extent of the loaded region; `z` spans the whole layer stack.
    pub fn size(&self) -> V3i {
        self.size
    }

    pub fn is_loaded(&self) -> bool {
        !self.blocks.is_empty()
    }

    /// Add a layer, re-sort the stack by z-order and recompute every
    /// layer's base plane.
    pub fn attach_layer(&mut self, layer: Layer) -> Result<()> {
        if self.is_loaded() {
            return Err(CapError::SpaceLoaded {
                space: self.name.clone(),
            });
        }
        if let Some(other) = self.layers.iter().find(|l| l.z_order == layer.z_order) {
            return Err(CapError::DuplicateZOrder {
                first: other.name.clone(),
                second: layer.name,
                z_order: layer.z_order,
            });
        }

        self.layers.push(layer);
        self.layers.sort_by_key(|l| l.z_order);

        let mut z = 0;
        for l in &mut self.layers {
            l.z = z;
            z += l.height;
        }
        self.size.z = z;
        Ok(())
    }

    /// Layer containing grid plane `z`.
    pub fn layer_at(&self, z: i32) -> Option<&Layer> {
        self.layers.iter().find(|l| l.contains_z(z))
    }

    /// Allocate blocks for the region `[pos, pos + size)` over the full
    /// layer stack. Any previously loaded region is dropped first.
    pub fn load(&mut self, pos: V2i, size: V2i, materials: &[Material]) -> Result<()> {
        if size.x <= 0 || size.y <= 0 {
            return Err(CapError::invalid_geometry(
                &self.name,
                format!("region size {} must be positive", size),
            ));
        }
        if self.layers.is_empty() {
            return Err(CapError::NoLayers {
                space: self.name.clone(),
            });
        }
        self.unload();

        let tiles = |extent: i32| (extent + self.tile - 1) / self.tile;
        let dims = V3i::new(tiles(size.x), tiles(size.y), self.layers.len() as i32);
        let count = dims.volume();

        let mut blocks = Vec::new();
        blocks
            .try_reserve_exact(count)
            .map_err(|_| CapError::Allocation {
                what: "block lattice",
                elements: count,
            })?;

        for (iz, layer) in self.layers.iter().enumerate() {
            let permittivity = materials
                .get(layer.material.0)
                .map(|m| m.permittivity)
                .ok_or_else(|| CapError::UnknownMaterial {
                    material: layer.material.to_string(),
                    owner: layer.name.clone(),
                })?;
            for iy in 0..dims.y {
                for ix in 0..dims.x {
                    let origin = V3i::new(
                        pos.x + ix * self.tile,
                        pos.y + iy * self.tile,
                        layer.z,
                    );
                    let extent = V3i::new(
                        self.tile.min(size.x - ix * self.tile),
                        self.tile.min(size.y - iy * self.tile),
                        layer.height,
                    );
                    let mut block = Block::new(origin, extent);
                    block.seed_material(permittivity);
                    let lattice = V3i::new(ix, iy, iz as i32);
                    for dir in Direction::ALL {
                        block.set_link(dir, neighbour_index(lattice, dims, dir));
                    }
                    blocks.push(block);
                }
            }
        }

        self.pos = pos.with_z(0);
        self.size = size.with_z(self.size.z);
        self.dims = dims;
        self.blocks = blocks;
        self.cache.set(None);

        info!(
            space = %self.name,
            pos = %self.pos,
            size = %self.size,
            blocks = count,
            "loaded grid region"
        );
        Ok(())
    }

    /// Drop the block lattice and invalidate the lookup cache.
    pub fn unload(&mut self) {
        if !self.is_loaded() {
            return;
        }
        let bytes: usize = self.blocks.iter_mut().map(Block::release).sum();
        self.blocks = Vec::new();
        self.dims = V3i::ZERO;
        self.cache.set(None);
        debug!(space = %self.name, bytes, "unloaded grid region");
    }

    /// Block counts per lattice axis.
    pub fn lattice_dims(&self) -> V3i {
        self.dims
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub(crate) fn blocks_mut(&mut self) -> &mut [Block] {
        &mut self.blocks
    }

    /// Block `id` of the arena, `None` if the id is stale or out of range.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    /// True if `pos` lies in the loaded region.
    pub fn contains(&self, pos: V3i) -> bool {
        self.is_loaded() && pos.within(self.pos, self.size)
    }

    /// Block containing the absolute position `pos`.
    ///
    /// Checks the block found by the previous call first, then walks the
    /// links from the lattice head along z, y and x.
    pub fn find_block(&self, pos: V3i) -> Option<BlockId> {
        if let Some(id) = self.cache.get() {
            if self.blocks[id.0].contains(pos) {
                return Some(id);
            }
        }

        let mut cur = if self.is_loaded() { Some(BlockId(0)) } else { None };
        for axis in [Axis::Z, Axis::Y, Axis::X] {
            while let Some(id) = cur {
                let b = &self.blocks[id.0];
                let lo = b.pos().get(axis);
                let p = pos.get(axis);
                if lo <= p && p < lo + b.size().get(axis) {
                    break;
                }
                cur = b.link(Direction::along(axis, true));
            }
        }

        // the walk only checks one axis at a time
        let found = cur.filter(|id| self.blocks[id.0].contains(pos));
        if found.is_some() {
            self.cache.set(found);
        }
        found
    }

    fn locate(&self, pos: V3i) -> Result<(BlockId, V3i)> {
        if !self.is_loaded() {
            return Err(CapError::SpaceNotLoaded {
                space: self.name.clone(),
            });
        }
        let id = self.find_block(pos).ok_or(CapError::OutOfBounds { pos })?;
        Ok((id, pos - self.blocks[id.0].pos()))
    }

    /// Rebase a block-local position that may be one step outside the
    /// block on any axis into the neighbour that holds it.
    pub fn normalize(&self, id: BlockId, local: V3i) -> Result<(BlockId, V3i)> {
        normalize_in(&self.blocks, id, local)
    }

    /// Potential at `pos`.
    pub fn field(&self, pos: V3i) -> Result<f64> {
        let (id, local) = self.locate(pos)?;
        self.blocks[id.0].field(local)
    }

    /// Whether the point at `pos` is held fixed.
    pub fn is_fixed(&self, pos: V3i) -> Result<bool> {
        let (id, local) = self.locate(pos)?;
        self.blocks[id.0].is_fixed(local)
    }

    /// Permittivity of the cell whose lower corner is `pos`.
    pub fn material(&self, pos: V3i) -> Result<f64> {
        let (id, local) = self.locate(pos)?;
        self.blocks[id.0].material(local)
    }

    /// Write a potential and its fixed flag.
    pub fn set_field(&mut self, pos: V3i, value: f64, fixed: bool) -> Result<()> {
        let (id, local) = self.locate(pos)?;
        self.blocks[id.0].set_field(local, value, fixed)
    }

    /// Write a permittivity. Applies to the whole z-extent of the block.
    pub fn set_material(&mut self, pos: V3i, value: f64) -> Result<()> {
        let (id, local) = self.locate(pos)?;
        self.blocks[id.0].set_material(local, value)
    }

    /// Hold every point on the six faces of the region at `value`.
    pub fn apply_border(&mut self, value: f64) -> Result<()> {
        let (p, s) = (self.pos, self.size);
        for x in 0..s.x {
            for y in 0..s.y {
                self.set_field(p + V3i::new(x, y, 0), value, true)?;
                self.set_field(p + V3i::new(x, y, s.z - 1), value, true)?;
            }
        }
        for x in 0..s.x {
            for z in 0..s.z {
                self.set_field(p + V3i::new(x, 0, z), value, true)?;
                self.set_field(p + V3i::new(x, s.y - 1, z), value, true)?;
            }
        }
        for y in 0..s.y {
            for z in 0..s.z {
                self.set_field(p + V3i::new(0, y, z), value, true)?;
                self.set_field(p + V3i::new(s.x - 1, y, z), value, true)?;
            }
        }
        Ok(())
    }

    /// Collapse every block that can be represented without arrays.
    pub fn optimize(&mut self) -> OptimizeStats {
        let mut stats = OptimizeStats {
            blocks: self.blocks.len(),
            ..Default::default()
        };
        for block in &mut self.blocks {
            if block.convert_to_constant_field() {
                stats.collapsed_fields += 1;
            }
            if block.convert_to_homogeneous_material() {
                stats.collapsed_materials += 1;
            }
            if !block.is_constant() {
                stats.variable += 1;
            }
            if block.is_homogeneous() {
                stats.homogeneous += 1;
            }
        }

        info!(
            space = %self.name,
            variable = stats.variable,
            variable_pct = stats.percent(stats.variable),
            homogeneous = stats.homogeneous,
            homogeneous_pct = stats.percent(stats.homogeneous),
            bytes = self.allocated_bytes(),
            "optimized grid"
        );
        stats
    }

    /// Bytes held by block arrays.
    pub fn allocated_bytes(&self) -> usize {
        self.blocks.iter().map(Block::allocated_bytes).sum()
    }
}

/// Block counts reported by [`Space::optimize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeStats {
    /// Blocks in the lattice
    pub blocks: usize,
    /// Blocks that still hold a field array
    pub variable: usize,
    /// Blocks without a material array
    pub homogeneous: usize,
    /// Field arrays dropped by this pass
    pub collapsed_fields: usize,
    /// Material arrays dropped by this pass
    pub collapsed_materials: usize,
}

impl OptimizeStats {
    fn percent(&self, n: usize) -> f64 {
        if self.blocks == 0 {
            0.0
        } else {
            100.0 * n as f64 / self.blocks as f64
        }
    }
}

fn neighbour_index(lattice: V3i, dims: V3i, dir: Direction) -> Option<BlockId> {
    let n = match dir {
        Direction::XPrev => lattice - V3i::X,
        Direction::XNext => lattice + V3i::X,
        Direction::YPrev => lattice - V3i::Y,
        Direction::YNext => lattice + V3i::Y,
        Direction::ZPrev => lattice - V3i::Z,
        Direction::ZNext => lattice + V3i::Z,
    };
    if !n.within(V3i::ZERO, dims) {
        return None;
    }
    Some(BlockId(
        ((n.z as usize * dims.y as usize) + n.y as usize) * dims.x as usize + n.x as usize,
    ))
}

/// Follow at most one link per axis to rebase `local` into the block that
/// holds it.
pub(crate) fn normalize_in(blocks: &[Block], id: BlockId, local: V3i) -> Result<(BlockId, V3i)> {
    let mut id = id;
    let mut local = local;
    for axis in Axis::ALL {
        let block = &blocks[id.0];
        let p = local.get(axis);
        let dir = if p < 0 {
            Direction::along(axis, false)
        } else if p >= block.size().get(axis) {
            Direction::along(axis, true)
        } else {
            continue;
        };
        let next = block.link(dir).ok_or(CapError::MissingNeighbour {
            block: block.pos(),
            direction: dir.name(),
        })?;
        let rebased = match dir {
            Direction::XPrev | Direction::YPrev | Direction::ZPrev => {
                p + blocks[next.0].size().get(axis)
            }
            _ => p - block.size().get(axis),
        };
        local.set(axis, rebased);
        id = next;
    }
    Ok((id, local))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::MaterialId;
    use crate::mesh::FieldRepr;

    fn materials() -> Vec<Material> {
        vec![
            Material::dielectric("air", 1.0),
            Material::dielectric("fr4", 4.5),
        ]
    }

    fn space(tile: i32) -> Space {
        let mut sp = Space::new("test", V3f::new(1.0, 1.0, 1.0)).with_tile_size(tile);
        sp.attach_layer(Layer::new("top", 3, 2, MaterialId(0))).unwrap();
        sp.attach_layer(Layer::new("sub", 2, 1, MaterialId(1))).unwrap();
        sp
    }

    #[test]
    fn test_attach_sorts_and_stacks() {
        let sp = space(4);
        let names: Vec<_> = sp.layers().iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["sub", "top"]);
        assert_eq!(sp.layers()[1].z, 2);
        assert_eq!(sp.size().z, 5);
        assert_eq!(sp.layer_at(4).unwrap().name, "top");
        assert_eq!(sp.layer_at(1).unwrap().name, "sub");
        assert!(sp.layer_at(5).is_none());
    }

    #[test]
    fn test_duplicate_z_order() {
        let mut sp = space(4);
        let err = sp.attach_layer(Layer::new("x", 1, 2, MaterialId(0))).unwrap_err();
        assert!(matches!(err, CapError::DuplicateZOrder { z_order: 2, .. }));
    }

    #[test]
    fn test_load_tiles_and_seeds_material() {
        let mut sp = space(4);
        sp.load(V2i::new(10, 20), V2i::new(10, 5), &materials()).unwrap();
        assert_eq!(sp.lattice_dims(), V3i::new(3, 2, 2));
        assert_eq!(sp.blocks().len(), 12);

        let last = sp.find_block(V3i::new(19, 24, 4)).unwrap();
        assert_eq!(sp.block(last).unwrap().size(), V3i::new(2, 1, 3));
        assert_eq!(sp.material(V3i::new(12, 21, 0)).unwrap(), 4.5);
        assert_eq!(sp.material(V3i::new(12, 21, 2)).unwrap(), 1.0);
        assert!(sp.blocks().iter().all(|b| b.is_constant()));
    }

    #[test]
    fn test_neighbour_symmetry() {
        let mut sp = space(3);
        sp.load(V2i::new(0, 0), V2i::new(8, 7), &materials()).unwrap();
        for (i, block) in sp.blocks().iter().enumerate() {
            for dir in Direction::ALL {
                if let Some(n) = block.link(dir) {
                    assert_eq!(sp.block(n).unwrap().link(dir.opposite()), Some(BlockId(i)));
                }
            }
        }
        // edges have no links outward
        assert!(sp.block(BlockId(0)).unwrap().link(Direction::XPrev).is_none());
        assert!(sp.block(BlockId(0)).unwrap().link(Direction::ZPrev).is_none());
        assert!(sp.block(BlockId(sp.blocks().len())).is_none());
    }

    #[test]
    fn test_find_block_covers_region() {
        let mut sp = space(3);
        sp.load(V2i::new(-4, 2), V2i::new(8, 7), &materials()).unwrap();
        for z in 0..5 {
            for y in 2..9 {
                for x in -4..4 {
                    let p = V3i::new(x, y, z);
                    let id = sp.find_block(p).unwrap();
                    assert!(sp.block(id).unwrap().contains(p));
                }
            }
        }
        assert!(sp.find_block(V3i::new(4, 2, 0)).is_none());
        assert!(matches!(
            sp.field(V3i::new(0, 0, 0)),
            Err(CapError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_normalize_crosses_blocks() {
        let mut sp = space(3);
        sp.load(V2i::new(0, 0), V2i::new(6, 6), &materials()).unwrap();
        let id = sp.find_block(V3i::new(3, 3, 2)).unwrap();
        let (n, local) = sp.normalize(id, V3i::new(-1, -1, -1)).unwrap();
        assert_eq!(sp.block(n).unwrap().pos() + local, V3i::new(2, 2, 1));

        let origin = sp.find_block(V3i::ZERO).unwrap();
        let (n, local) = sp.normalize(origin, V3i::new(3, 0, 2)).unwrap();
        assert_eq!(local, V3i::ZERO);
        assert_eq!(sp.block(n).unwrap().pos(), V3i::new(3, 0, 2));

        assert!(sp.normalize(id, V3i::new(3, 0, 0)).is_err());

        let corner = sp.find_block(V3i::ZERO).unwrap();
        assert!(matches!(
            sp.normalize(corner, V3i::new(-1, 0, 0)),
            Err(CapError::MissingNeighbour { direction: "x-prev", .. })
        ));
    }

    #[test]
    fn test_unload_resets_cache() {
        let mut sp = space(4);
        sp.load(V2i::new(0, 0), V2i::new(8, 8), &materials()).unwrap();
        assert!(sp.find_block(V3i::new(7, 7, 4)).is_some());
        sp.unload();
        assert!(!sp.is_loaded());
        assert!(matches!(sp.field(V3i::ZERO), Err(CapError::SpaceNotLoaded { .. })));

        sp.load(V2i::new(0, 0), V2i::new(2, 2), &materials()).unwrap();
        assert!(sp.find_block(V3i::new(7, 7, 4)).is_none());
        assert!(sp.find_block(V3i::new(1, 1, 4)).is_some());
    }

    #[test]
    fn test_border_enforced() {
        let mut sp = space(3);
        sp.load(V2i::new(0, 0), V2i::new(5, 4), &materials()).unwrap();
        for z in 0..5 {
            for y in 0..4 {
                for x in 0..5 {
                    sp.set_field(V3i::new(x, y, z), 2.0, false).unwrap();
                }
            }
        }
        sp.apply_border(0.0).unwrap();
        for z in 0..5 {
            for y in 0..4 {
                for x in 0..5 {
                    let p = V3i::new(x, y, z);
                    let on_face = x == 0 || y == 0 || z == 0 || x == 4 || y == 3 || z == 4;
                    if on_face {
                        assert_eq!(sp.field(p).unwrap(), 0.0);
                        assert!(sp.is_fixed(p).unwrap());
                    } else {
                        assert_eq!(sp.field(p).unwrap(), 2.0);
                        assert!(!sp.is_fixed(p).unwrap());
                    }
                }
            }
        }
    }

    #[test]
    fn test_optimize_preserves_values() {
        let mut sp = space(4);
        sp.load(V2i::new(0, 0), V2i::new(12, 12), &materials()).unwrap();
        for z in 0..5 {
            for y in 0..12 {
                for x in 0..12 {
                    sp.set_field(V3i::new(x, y, z), 0.0, false).unwrap();
                    sp.set_material(V3i::new(x, y, z), 7.0).unwrap();
                }
            }
        }
        sp.set_field(V3i::new(1, 1, 1), 0.5, false).unwrap();
        // drop every constancy flag except around (1, 1, 1)
        for z in 0..5 {
            for y in 0..12 {
                for x in 0..12 {
                    if (x, y) != (1, 1) {
                        sp.set_field(V3i::new(x, y, z), 0.0, true).unwrap();
                    }
                }
            }
        }

        let snapshot = |sp: &Space| {
            let mut v = Vec::new();
            for z in 0..5 {
                for y in 0..12 {
                    for x in 0..12 {
                        let p = V3i::new(x, y, z);
                        v.push((
                            sp.field(p).unwrap(),
                            sp.is_fixed(p).unwrap(),
                            sp.material(p).unwrap(),
                        ));
                    }
                }
            }
            v
        };

        let before = snapshot(&sp);
        let variable_before = sp.blocks().iter().filter(|b| !b.is_constant()).count();
        let stats = sp.optimize();
        assert!(stats.variable < variable_before);
        assert_eq!(stats.variable, 2);
        assert_eq!(stats.homogeneous, stats.blocks);
        assert_eq!(snapshot(&sp), before);

        let again = sp.optimize();
        assert_eq!(again.collapsed_fields, 0);
        assert_eq!(again.variable, stats.variable);
        assert_eq!(snapshot(&sp), before);
        assert!(matches!(sp.block(BlockId(0)).unwrap().field_repr(), FieldRepr::Variable { .. }));
    }
}
