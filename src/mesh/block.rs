//! Mesh blocks: boxes of grid points with collapsible storage.

use std::fmt;

use crate::error::{try_filled, CapError, Result};
use crate::geometry::{Axis, V3i};

/// Index of a block in its space's lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// One of the six lattice neighbours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    XPrev,
    XNext,
    YPrev,
    YNext,
    ZPrev,
    ZNext,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::XPrev,
        Direction::XNext,
        Direction::YPrev,
        Direction::YNext,
        Direction::ZPrev,
        Direction::ZNext,
    ];

    /// Step towards lower or higher coordinates along `axis`.
    pub fn along(axis: Axis, forward: bool) -> Self {
        match (axis, forward) {
            (Axis::X, false) => Direction::XPrev,
            (Axis::X, true) => Direction::XNext,
            (Axis::Y, false) => Direction::YPrev,
            (Axis::Y, true) => Direction::YNext,
            (Axis::Z, false) => Direction::ZPrev,
            (Axis::Z, true) => Direction::ZNext,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::XPrev => Direction::XNext,
            Direction::XNext => Direction::XPrev,
            Direction::YPrev => Direction::YNext,
            Direction::YNext => Direction::YPrev,
            Direction::ZPrev => Direction::ZNext,
            Direction::ZNext => Direction::ZPrev,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::XPrev => "x-prev",
            Direction::XNext => "x-next",
            Direction::YPrev => "y-prev",
            Direction::YNext => "y-next",
            Direction::ZPrev => "z-prev",
            Direction::ZNext => "z-next",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Potential storage of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldRepr {
    /// Every point holds this value and is fixed.
    Constant(f64),
    /// Per-point values and fixed flags, indexed `((z*sy)+y)*sx+x`.
    Variable { values: Vec<f64>, fixed: Vec<bool> },
}

/// Permittivity storage of a block. Material only varies in x and y.
#[derive(Debug, Clone, PartialEq)]
pub enum MaterialRepr {
    /// Every cell holds this value.
    Homogeneous(f64),
    /// Per-cell values, indexed `y*sx+x`.
    Heterogeneous(Vec<f64>),
}

/// A box of grid points `[pos, pos + size)`.
#[derive(Debug, Clone)]
pub struct Block {
    pos: V3i,
    size: V3i,
    pub(crate) field: FieldRepr,
    pub(crate) material: MaterialRepr,
    links: [Option<BlockId>; 6],
}

impl Block {
    /// A block with no arrays: constant field 0 and homogeneous material 0.
    pub fn new(pos: V3i, size: V3i) -> Self {
        Self {
            pos,
            size,
            field: FieldRepr::Constant(0.0),
            material: MaterialRepr::Homogeneous(0.0),
            links: [None; 6],
        }
    }

    /// Absolute position of the block's first point.
    pub fn pos(&self) -> V3i {
        self.pos
    }

    pub fn size(&self) -> V3i {
        self.size
    }

    pub fn field_repr(&self) -> &FieldRepr {
        &self.field
    }

    pub fn material_repr(&self) -> &MaterialRepr {
        &self.material
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.field, FieldRepr::Constant(_))
    }

    pub fn is_homogeneous(&self) -> bool {
        matches!(self.material, MaterialRepr::Homogeneous(_))
    }

    pub fn link(&self, dir: Direction) -> Option<BlockId> {
        self.links[dir.index()]
    }

    pub(crate) fn set_link(&mut self, dir: Direction, id: Option<BlockId>) {
        self.links[dir.index()] = id;
    }

    /// True if the absolute position `pos` lies in this block.
    pub fn contains(&self, pos: V3i) -> bool {
        pos.within(self.pos, self.size)
    }

    /// True if the block-local position lies in `[0, size)`.
    pub fn contains_local(&self, local: V3i) -> bool {
        local.within(V3i::ZERO, self.size)
    }

    fn check(&self, local: V3i) -> Result<()> {
        if self.contains_local(local) {
            Ok(())
        } else {
            Err(CapError::OutOfBounds {
                pos: self.pos + local,
            })
        }
    }

    #[inline]
    pub(crate) fn offset3(&self, local: V3i) -> usize {
        ((local.z as usize * self.size.y as usize) + local.y as usize) * self.size.x as usize
            + local.x as usize
    }

    #[inline]
    pub(crate) fn offset2(&self, local: V3i) -> usize {
        local.y as usize * self.size.x as usize + local.x as usize
    }

    /// Potential at a block-local position.
    pub fn field(&self, local: V3i) -> Result<f64> {
        self.check(local)?;
        Ok(match &self.field {
            FieldRepr::Constant(c) => *c,
            FieldRepr::Variable { values, .. } => values[self.offset3(local)],
        })
    }

    /// Whether the point at a block-local position is held fixed.
    pub fn is_fixed(&self, local: V3i) -> Result<bool> {
        self.check(local)?;
        Ok(match &self.field {
            FieldRepr::Constant(_) => true,
            FieldRepr::Variable { fixed, .. } => fixed[self.offset3(local)],
        })
    }

    /// Permittivity of the cell at a block-local position.
    pub fn material(&self, local: V3i) -> Result<f64> {
        self.check(local)?;
        Ok(match &self.material {
            MaterialRepr::Homogeneous(c) => *c,
            MaterialRepr::Heterogeneous(values) => values[self.offset2(local)],
        })
    }

    /// Write a potential. Promotes the block to a variable field unless the
    /// write would leave a constant block unchanged.
    pub fn set_field(&mut self, local: V3i, value: f64, fixed: bool) -> Result<()> {
        self.check(local)?;
        if let FieldRepr::Constant(c) = self.field {
            if fixed && c == value {
                return Ok(());
            }
        }
        self.convert_to_variable_field()?;
        let off = self.offset3(local);
        if let FieldRepr::Variable { values, fixed: flags } = &mut self.field {
            values[off] = value;
            flags[off] = fixed;
        }
        Ok(())
    }

    /// Write a permittivity. Promotes the block to heterogeneous material
    /// unless the value matches the homogeneous constant.
    pub fn set_material(&mut self, local: V3i, value: f64) -> Result<()> {
        self.check(local)?;
        if let MaterialRepr::Homogeneous(c) = self.material {
            if c == value {
                return Ok(());
            }
        }
        self.convert_to_heterogeneous_material()?;
        let off = self.offset2(local);
        if let MaterialRepr::Heterogeneous(values) = &mut self.material {
            values[off] = value;
        }
        Ok(())
    }

    /// Set the homogeneous material constant. Only meaningful before any
    /// cell has been written individually.
    pub(crate) fn seed_material(&mut self, value: f64) {
        self.material = MaterialRepr::Homogeneous(value);
    }

    /// Allocate the per-cell material array, filled with the constant.
    pub fn convert_to_heterogeneous_material(&mut self) -> Result<()> {
        if let MaterialRepr::Homogeneous(c) = self.material {
            let area = (self.size.x as usize) * (self.size.y as usize);
            self.material = MaterialRepr::Heterogeneous(try_filled("block material", area, c)?);
        }
        Ok(())
    }

    /// Collapse the material array if every cell holds the same value.
    /// Returns true if the block was converted.
    pub fn convert_to_homogeneous_material(&mut self) -> bool {
        let common = match &self.material {
            MaterialRepr::Homogeneous(_) => return false,
            MaterialRepr::Heterogeneous(values) => uniform(values),
        };
        match common {
            Some(c) => {
                self.material = MaterialRepr::Homogeneous(c);
                true
            }
            None => false,
        }
    }

    /// Allocate the field and fixed arrays, filled with the constant and
    /// marked fixed.
    pub fn convert_to_variable_field(&mut self) -> Result<()> {
        if let FieldRepr::Constant(c) = self.field {
            let volume = self.size.volume();
            let values = try_filled("block field", volume, c)?;
            let fixed = try_filled("block constancy", volume, true)?;
            self.field = FieldRepr::Variable { values, fixed };
        }
        Ok(())
    }

    /// Collapse the field arrays if every point is fixed and holds the same
    /// value. Returns true if the block was converted.
    pub fn convert_to_constant_field(&mut self) -> bool {
        let common = match &self.field {
            FieldRepr::Constant(_) => return false,
            FieldRepr::Variable { values, fixed } => {
                if fixed.iter().all(|&f| f) {
                    uniform(values)
                } else {
                    None
                }
            }
        };
        match common {
            Some(c) => {
                self.field = FieldRepr::Constant(c);
                true
            }
            None => false,
        }
    }

    /// Bytes held by dense arrays.
    pub fn allocated_bytes(&self) -> usize {
        let field = match &self.field {
            FieldRepr::Constant(_) => 0,
            FieldRepr::Variable { values, fixed } => {
                values.len() * std::mem::size_of::<f64>() + fixed.len()
            }
        };
        let material = match &self.material {
            MaterialRepr::Homogeneous(_) => 0,
            MaterialRepr::Heterogeneous(values) => values.len() * std::mem::size_of::<f64>(),
        };
        field + material
    }

    /// Drop any dense arrays, returning the number of bytes released. The
    /// block reverts to its initial constant state.
    pub fn release(&mut self) -> usize {
        let bytes = self.allocated_bytes();
        self.field = FieldRepr::Constant(0.0);
        self.material = MaterialRepr::Homogeneous(0.0);
        bytes
    }
}

fn uniform(values: &[f64]) -> Option<f64> {
    let (&first, rest) = values.split_first()?;
    rest.iter().all(|&v| v == first).then_some(first)
}
