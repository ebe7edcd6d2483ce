//! Design validation.

use tracing::warn;

use super::types::MaterialKind;
use super::Design;
use crate::error::{CapError, Result};

/// Validate a design for extraction.
///
/// Checks:
/// - The space has at least one layer
/// - There is at least one net, and every net has objects
/// - Every object reference resolves
///
/// Net objects that sit on no layer of the space, or that are not made
/// of metal, are reported but accepted.
pub fn validate_design(design: &Design) -> Result<()> {
    if design.space.layers().is_empty() {
        return Err(CapError::NoLayers {
            space: design.space.name().to_string(),
        });
    }

    if design.nets.is_empty() {
        return Err(CapError::invalid_geometry(
            design.space.name(),
            "no nets to evaluate",
        ));
    }

    for net in &design.nets {
        if net.objects.is_empty() {
            return Err(CapError::EmptyNet {
                net: net.name.clone(),
            });
        }
        for id in &net.objects {
            let object = design.objects.get(id.0).ok_or_else(|| CapError::UnknownObject {
                object: id.to_string(),
                owner: net.name.clone(),
            })?;

            let placed = design
                .space
                .layers()
                .iter()
                .any(|l| l.objects.contains(id));
            if !placed {
                warn!(net = %net.name, object = %object.name, "net object is not on any layer");
            }

            let metal = object
                .material
                .and_then(|m| design.materials.get(m.0))
                .map_or(false, |m| m.kind == MaterialKind::Metal);
            if !metal {
                warn!(net = %net.name, object = %object.name, "net object is not metal");
            }
        }
    }

    for layer in design.space.layers() {
        if let Some(id) = layer.objects.iter().find(|id| id.0 >= design.objects.len()) {
            return Err(CapError::UnknownObject {
                object: id.to_string(),
                owner: layer.name.clone(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::{Layer, Material, MaterialId, Net, ObjectId};
    use crate::geometry::{Object, Role, Shape, V2i, V3f};
    use crate::mesh::Space;

    fn design() -> Design {
        let mut space = Space::new("s", V3f::new(1.0, 1.0, 1.0));
        let mut layer = Layer::new("l", 2, 0, MaterialId(0));
        layer.objects.push(ObjectId(0));
        space.attach_layer(layer).unwrap();

        let mut d = Design::new(space);
        d.add_material(Material::dielectric("air", 1.0)).unwrap();
        let size = V2i::new(2, 2);
        let shape = Shape::Rectangle { size };
        let plate = Object::new("a", shape, V2i::ZERO, Some(MaterialId(0)), Role::Net);
        d.add_object(plate).unwrap();
        d.add_net(Net {
            name: "n".into(),
            objects: vec![ObjectId(0)],
        })
        .unwrap();
        d
    }

    #[test]
    fn test_valid_design() {
        assert!(validate_design(&design()).is_ok());
    }

    #[test]
    fn test_no_nets() {
        let mut d = design();
        d.nets.clear();
        assert!(matches!(validate_design(&d), Err(CapError::InvalidGeometry { .. })));
    }

    #[test]
    fn test_dangling_object() {
        let mut d = design();
        d.nets[0].objects.push(ObjectId(7));
        assert!(matches!(validate_design(&d), Err(CapError::UnknownObject { .. })));
    }

    #[test]
    fn test_no_layers() {
        let mut d = design();
        d.space = Space::new("bare", V3f::new(1.0, 1.0, 1.0));
        assert!(matches!(validate_design(&d), Err(CapError::NoLayers { .. })));
    }
}
