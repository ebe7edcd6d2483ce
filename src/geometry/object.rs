//! Conductor and dielectric objects: 2D shapes rasterised on demand.

use std::path::PathBuf;

use tracing::debug;

use super::bitmap::{Bitmap, GrowKernel};
use super::raster::Raster;
use super::vector::V2i;
use crate::design::MaterialId;
use crate::error::{CapError, Result};

/// Geometry source of an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Axis-aligned rectangle of `size` cells.
    Rectangle { size: V2i },
    /// Disc of `radius` cells.
    Circle { radius: i32 },
    /// Regions of a PNG file, selected by seed pixels.
    Image { path: PathBuf, seeds: Vec<V2i> },
    /// Bitmap produced by merging other objects. Cannot be reloaded
    /// once unloaded.
    Composite,
}

impl Shape {
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Rectangle { .. } => "rectangle",
            Shape::Circle { .. } => "circle",
            Shape::Image { .. } => "image",
            Shape::Composite => "composite",
        }
    }
}

/// Electrical role of an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Constant voltage source for current-field analysis; stamped after
    /// everything else.
    Pin,
    /// Part of a conductor net.
    Net,
    /// No active role; held at 0 V.
    Passive,
}

/// A 2D region placed on one or more layers.
#[derive(Debug, Clone)]
pub struct Object {
    /// Object name (from the configuration)
    pub name: String,
    /// How the bitmap is produced
    pub shape: Shape,
    /// Position given in the configuration
    pub orig_pos: V2i,
    /// Material stamped at the base plane of the layer, if any
    pub material: Option<MaterialId>,
    /// Electrical role
    pub role: Role,
    /// Whether stamped grid points are held fixed
    pub constant: bool,
    /// Potential written to stamped grid points
    pub value: f64,
    pos: V2i,
    size: V2i,
    map: Option<Bitmap>,
}

impl Object {
    /// Create an unloaded object. Constant at 0 V until told otherwise.
    pub fn new(
        name: impl Into<String>,
        shape: Shape,
        orig_pos: V2i,
        material: Option<MaterialId>,
        role: Role,
    ) -> Self {
        let size = match &shape {
            Shape::Rectangle { size } => *size,
            Shape::Circle { radius } => V2i::splat(radius * 2),
            _ => V2i::ZERO,
        };
        Self {
            name: name.into(),
            shape,
            orig_pos,
            material,
            role,
            constant: true,
            value: 0.0,
            pos: orig_pos,
            size,
            map: None,
        }
    }

    /// Wrap an already rasterised bitmap.
    pub fn from_bitmap(name: impl Into<String>, pos: V2i, map: Bitmap) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Composite,
            orig_pos: pos,
            material: None,
            role: Role::Passive,
            constant: true,
            value: 0.0,
            pos,
            size: map.size(),
            map: Some(map),
        }
    }

    /// Lower-left corner of the bitmap in grid units.
    pub fn pos(&self) -> V2i {
        self.pos
    }

    /// Bitmap extent in cells.
    pub fn size(&self) -> V2i {
        self.size
    }

    pub fn is_loaded(&self) -> bool {
        self.map.is_some()
    }

    pub fn map(&self) -> Result<&Bitmap> {
        self.map.as_ref().ok_or_else(|| CapError::ObjectNotLoaded {
            object: self.name.clone(),
        })
    }

    fn map_mut(&mut self) -> Result<&mut Bitmap> {
        let name = &self.name;
        self.map
            .as_mut()
            .ok_or_else(|| CapError::ObjectNotLoaded { object: name.clone() })
    }

    /// Rasterise the shape. No-op if already loaded.
    pub fn load(&mut self) -> Result<()> {
        if self.map.is_some() {
            return Ok(());
        }

        let (pos, map, tighten) = match &self.shape {
            Shape::Rectangle { size } => {
                if size.x <= 0 || size.y <= 0 {
                    return Err(CapError::invalid_geometry(&self.name, "size must be positive"));
                }
                (self.orig_pos, Bitmap::filled(*size)?, false)
            }
            Shape::Circle { radius } => {
                let r = *radius;
                if r <= 0 {
                    return Err(CapError::invalid_geometry(&self.name, "radius must be positive"));
                }
                let size = V2i::splat(2 * r);
                let mut map = Bitmap::new(size)?;
                let center = r as f64;
                for y in 0..size.y {
                    for x in 0..size.x {
                        let dx = x as f64 + 0.5 - center;
                        let dy = y as f64 + 0.5 - center;
                        if dx * dx + dy * dy < center * center {
                            map.set(V2i::new(x, y), true)?;
                        }
                    }
                }
                (self.orig_pos + V2i::splat(r), map, false)
            }
            Shape::Image { path, seeds } => {
                let raster = Raster::open(path)?;
                let mut map = Bitmap::new(raster.size())?;
                for &seed in seeds {
                    if !raster.contains(seed) {
                        return Err(CapError::invalid_geometry(
                            &self.name,
                            format!(
                                "seed {} outside image '{}' of size {}",
                                seed,
                                path.display(),
                                raster.size()
                            ),
                        ));
                    }
                    raster.fill_region(seed, &mut map)?;
                }
                (self.orig_pos, map, true)
            }
            Shape::Composite => {
                return Err(CapError::invalid_geometry(
                    &self.name,
                    "composite objects cannot be reloaded",
                ));
            }
        };

        self.pos = pos;
        self.size = map.size();
        self.map = Some(map);
        if tighten {
            self.shrink_tight()?;
        }

        debug!(object = %self.name, pos = %self.pos, size = %self.size, "loaded object");
        Ok(())
    }

    /// Drop the bitmap; position and size are kept.
    pub fn unload(&mut self) {
        self.map = None;
    }

    /// Dilate the bitmap by `r` cells.
    pub fn grow(&mut self, r: i32, kernel: GrowKernel) -> Result<()> {
        if r <= 0 {
            return Ok(());
        }
        let grown = self.map()?.grown(r, kernel)?;
        self.pos = self.pos - V2i::splat(r);
        self.size = grown.size();
        self.map = Some(grown);
        Ok(())
    }

    /// Trim empty border rows and columns.
    pub fn shrink_tight(&mut self) -> Result<()> {
        let map = self.map()?;
        let (min, size) = map.tight_bounds().ok_or_else(|| CapError::EmptyBitmap {
            object: self.name.clone(),
        })?;
        let cropped = map.cropped(min, size)?;
        self.pos = self.pos + min;
        self.size = size;
        self.map = Some(cropped);
        Ok(())
    }

    /// Flip every cell of the bitmap.
    pub fn invert(&mut self) -> Result<()> {
        self.map_mut()?.invert();
        Ok(())
    }

    /// Union of two loaded objects over their common bounding box. The
    /// result carries the material of `a`.
    pub fn merge(a: &Object, b: &Object) -> Result<Object> {
        let (map_a, map_b) = (a.map()?, b.map()?);
        let pos = a.pos.min(b.pos);
        let end = (a.pos + a.size).max(b.pos + b.size);
        let mut map = Bitmap::new(end - pos)?;
        map.paint(map_a, a.pos - pos);
        map.paint(map_b, b.pos - pos);

        let mut merged = Object::from_bitmap(format!("{}+{}", a.name, b.name), pos, map);
        merged.material = a.material;
        Ok(merged)
    }

    /// Union of any number of loaded objects.
    pub fn composite<'a>(
        name: &str,
        objects: impl IntoIterator<Item = &'a Object>,
    ) -> Result<Option<Object>> {
        let mut acc: Option<Object> = None;
        for obj in objects {
            acc = Some(match acc {
                None => {
                    let map = obj.map()?.clone();
                    let mut first = Object::from_bitmap(name, obj.pos, map);
                    first.material = obj.material;
                    first
                }
                Some(prev) => {
                    let mut merged = Object::merge(&prev, obj)?;
                    merged.name = name.to_string();
                    merged
                }
            });
        }
        Ok(acc)
    }
}
