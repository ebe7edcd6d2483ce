//! Core types of a design: materials, layers, nets and their ids.

use std::fmt;

/// Index of a material in [`Design::materials`](super::Design::materials).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub usize);

impl fmt::Display for MaterialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Index of an object in [`Design::objects`](super::Design::objects).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub usize);

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

/// Index of a net in [`Design::nets`](super::Design::nets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NetId(pub usize);

impl fmt::Display for NetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N{}", self.0)
    }
}

/// Electrical class of a material.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialKind {
    Metal,
    Dielectric,
}

impl MaterialKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "metal" => Some(Self::Metal),
            "dielectric" => Some(Self::Dielectric),
            _ => None,
        }
    }
}

/// A material and its electromagnetic constants.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub kind: MaterialKind,
    /// Permittivity in F/m
    pub permittivity: f64,
    /// Conductivity in S/m
    pub conductivity: f64,
    /// Permeability in H/m
    pub permeability: f64,
}

impl Material {
    /// A dielectric with the given permittivity and no losses.
    pub fn dielectric(name: impl Into<String>, permittivity: f64) -> Self {
        Self {
            name: name.into(),
            kind: MaterialKind::Dielectric,
            permittivity,
            conductivity: 0.0,
            permeability: 0.0,
        }
    }
}

/// A horizontal slab of the stack-up.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    /// Thickness in grid points
    pub height: i32,
    /// Stacking key; lower values lie lower
    pub z_order: i32,
    /// Base plane, derived from the heights of the layers below
    pub z: i32,
    /// Material filling the layer where no object overrides it
    pub material: MaterialId,
    /// Objects placed on this layer
    pub objects: Vec<ObjectId>,
}

impl Layer {
    pub fn new(name: impl Into<String>, height: i32, z_order: i32, material: MaterialId) -> Self {
        Self {
            name: name.into(),
            height,
            z_order,
            z: 0,
            material,
            objects: Vec::new(),
        }
    }

    /// True if grid plane `z` lies inside `[self.z, self.z + height)`.
    pub fn contains_z(&self, z: i32) -> bool {
        z >= self.z && z < self.z + self.height
    }
}

/// An electrically connected group of objects.
#[derive(Debug, Clone, PartialEq)]
pub struct Net {
    pub name: String,
    pub objects: Vec<ObjectId>,
}
