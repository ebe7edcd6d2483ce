//! Rasterising objects into the grid.

use tracing::debug;

use super::space::Space;
use crate::design::Material;
use crate::error::{CapError, Result};
use crate::geometry::{rect_overlap, Object, Role, V2i};

/// Corners of a bitmap cell, relative to the cell.
const CELL_CORNERS: [V2i; 4] = [
    V2i::new(0, 0),
    V2i::new(1, 0),
    V2i::new(0, 1),
    V2i::new(1, 1),
];

impl Space {
    /// True if the object's bounding box touches the loaded region.
    pub fn overlaps(&self, object: &Object) -> bool {
        self.is_loaded()
            && rect_overlap(self.pos().xy(), self.size().xy(), object.pos(), object.size())
    }

    /// Write a loaded object into the grid on the layer at `layer` (index
    /// into [`Space::layers`]).
    ///
    /// Every occupied cell sets the potential of its four corner points on
    /// every plane from the layer's base to the plane above its top. If the
    /// object has a material, its permittivity is written at the base plane.
    /// Points outside the loaded region are skipped.
    pub fn stamp_object(
        &mut self,
        object: &Object,
        layer: usize,
        materials: &[Material],
    ) -> Result<()> {
        let (z0, height, layer_name) = {
            let l = self.layers().get(layer).ok_or_else(|| CapError::UnknownLayer {
                layer: layer.to_string(),
                owner: object.name.clone(),
            })?;
            (l.z, l.height, l.name.clone())
        };

        if !self.overlaps(object) {
            debug!(object = %object.name, layer = %layer_name, "object outside region, skipped");
            return Ok(());
        }
        debug!(
            object = %object.name,
            layer = %layer_name,
            pos = %object.pos(),
            "stamping object"
        );

        let map = object.map()?;
        let cells: Vec<V2i> = map.occupied().map(|c| c + object.pos()).collect();

        for z in z0..=z0 + height {
            for &cell in &cells {
                for corner in CELL_CORNERS {
                    let p = (cell + corner).with_z(z);
                    if self.contains(p) {
                        self.set_field(p, object.value, object.constant)?;
                    }
                }
            }
        }

        if let Some(id) = object.material {
            let permittivity = materials
                .get(id.0)
                .ok_or_else(|| CapError::UnknownMaterial {
                    material: id.to_string(),
                    owner: object.name.clone(),
                })?
                .permittivity;
            for &cell in &cells {
                let p = cell.with_z(z0);
                if self.contains(p) {
                    self.set_material(p, permittivity)?;
                }
            }
        }
        Ok(())
    }

    /// Stamp every object of every layer, loading bitmaps of objects that
    /// touch the region. Pins go last so their potentials win.
    pub fn stamp_all_objects(
        &mut self,
        objects: &mut [Object],
        materials: &[Material],
    ) -> Result<()> {
        for pins in [false, true] {
            for layer in 0..self.layers().len() {
                for k in 0..self.layers()[layer].objects.len() {
                    let id = self.layers()[layer].objects[k];
                    let object = objects.get_mut(id.0).ok_or_else(|| CapError::UnknownObject {
                        object: id.to_string(),
                        owner: self.layers()[layer].name.clone(),
                    })?;
                    if (object.role == Role::Pin) != pins {
                        continue;
                    }
                    if !self.overlaps(object) {
                        debug!(object = %object.name, "object outside region, skipped");
                        continue;
                    }
                    object.load()?;
                    self.stamp_object(object, layer, materials)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Layer, MaterialId, ObjectId};
    use crate::geometry::{Shape, V3f, V3i};

    fn setup() -> (Space, Vec<Material>) {
        let materials = vec![
            Material::dielectric("air", 1.0),
            Material::dielectric("copper", 9.0),
        ];
        let mut sp = Space::new("s", V3f::new(1.0, 1.0, 1.0)).with_tile_size(4);
        let mut bottom = Layer::new("bottom", 2, 0, MaterialId(0));
        bottom.objects.push(ObjectId(0));
        bottom.objects.push(ObjectId(1));
        sp.attach_layer(bottom).unwrap();
        sp.attach_layer(Layer::new("top", 3, 1, MaterialId(0))).unwrap();
        sp.load(V2i::new(0, 0), V2i::new(10, 10), &materials).unwrap();
        (sp, materials)
    }

    fn rect(name: &str, pos: V2i, size: V2i, role: Role) -> Object {
        Object::new(name, Shape::Rectangle { size }, pos, Some(MaterialId(1)), role)
    }

    #[test]
    fn test_stamp_touches_cell_corners() {
        let (mut sp, materials) = setup();
        let mut obj = rect("pad", V2i::new(2, 3), V2i::new(2, 1), Role::Net);
        obj.value = 1.0;
        obj.load().unwrap();
        sp.stamp_object(&obj, 0, &materials).unwrap();

        for z in 0..=2 {
            for (x, y) in [(2, 3), (3, 3), (4, 3), (2, 4), (4, 4)] {
                let p = V3i::new(x, y, z);
                assert_eq!(sp.field(p).unwrap(), 1.0, "at {}", p);
                assert!(sp.is_fixed(p).unwrap());
            }
        }
        assert_eq!(sp.field(V3i::new(5, 3, 0)).unwrap(), 0.0);
        assert_eq!(sp.field(V3i::new(2, 3, 3)).unwrap(), 0.0);

        assert_eq!(sp.material(V3i::new(2, 3, 0)).unwrap(), 9.0);
        assert_eq!(sp.material(V3i::new(3, 3, 1)).unwrap(), 9.0);
        assert_eq!(sp.material(V3i::new(4, 3, 0)).unwrap(), 1.0);
        assert_eq!(sp.material(V3i::new(2, 3, 2)).unwrap(), 1.0);
    }

    #[test]
    fn test_stamp_clips_to_region() {
        let (mut sp, materials) = setup();
        let mut obj = rect("edge", V2i::new(8, 8), V2i::new(5, 5), Role::Net);
        obj.value = 2.0;
        obj.load().unwrap();
        sp.stamp_object(&obj, 1, &materials).unwrap();
        assert_eq!(sp.field(V3i::new(9, 9, 2)).unwrap(), 2.0);
        assert_eq!(sp.field(V3i::new(9, 9, 4)).unwrap(), 2.0);
    }

    #[test]
    fn test_pins_stamped_last() {
        let (mut sp, materials) = setup();
        let mut net = rect("net", V2i::new(1, 1), V2i::new(4, 4), Role::Net);
        net.value = 1.0;
        let mut pin = rect("pin", V2i::new(2, 2), V2i::new(1, 1), Role::Pin);
        pin.value = 5.0;
        // pin listed first on the layer, still wins
        let mut objects = vec![pin, net];
        sp.stamp_all_objects(&mut objects, &materials).unwrap();
        assert_eq!(sp.field(V3i::new(2, 2, 1)).unwrap(), 5.0);
        assert_eq!(sp.field(V3i::new(1, 1, 1)).unwrap(), 1.0);
        assert!(objects.iter().all(Object::is_loaded));
    }

    #[test]
    fn test_far_object_not_loaded() {
        let (mut sp, materials) = setup();
        let far = rect("far", V2i::new(50, 50), V2i::new(2, 2), Role::Net);
        let near = rect("near", V2i::new(1, 1), V2i::new(1, 1), Role::Passive);
        let mut objects = vec![far, near];
        sp.stamp_all_objects(&mut objects, &materials).unwrap();
        assert!(!objects[0].is_loaded());
        assert!(objects[1].is_loaded());
    }

    #[test]
    fn test_variable_stamp_unfixes_points() {
        let (mut sp, materials) = setup();
        let mut region = rect("region", V2i::new(0, 0), V2i::new(3, 3), Role::Passive);
        region.material = None;
        region.constant = false;
        region.load().unwrap();
        sp.stamp_object(&region, 0, &materials).unwrap();
        assert!(!sp.is_fixed(V3i::new(1, 1, 1)).unwrap());
        assert!(sp.is_fixed(V3i::new(5, 5, 1)).unwrap());
        assert_eq!(sp.material(V3i::new(1, 1, 0)).unwrap(), 1.0);
    }
}
