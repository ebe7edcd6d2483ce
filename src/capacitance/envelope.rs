//! Closed probe surfaces around nets.

use tracing::debug;

use crate::design::{Layer, Net};
use crate::error::Result;
use crate::geometry::{face_line, rect_overlap, Face, GrowKernel, Object, V2i, V3i};
use crate::mesh::Space;

/// Faces enclosing the occupied cells of `object` on `layer`.
///
/// Every occupied cell gets a side column on each side that borders an
/// empty cell or the edge of the bitmap, reaching from one plane below the
/// layer to one plane above it, plus a bottom and a top face. Faces shared
/// between adjacent cells are left out, so the result is the outer surface
/// of the extruded bitmap.
pub fn object_faces(object: &Object, layer: &Layer, faces: &mut Vec<Face>) -> Result<()> {
    let map = object.map()?;
    let below = layer.z - 1;
    let above = layer.z + layer.height + 1;
    let column = layer.height + 2;

    for cell in map.occupied() {
        let l = cell + object.pos();
        let base = l.with_z(below);

        if !map.get(cell - V2i::new(1, 0)) {
            face_line(faces, base, V3i::Z, V3i::Y, V3i::Z, column);
        }
        if !map.get(cell + V2i::new(1, 0)) {
            face_line(faces, base + V3i::X, V3i::Y, V3i::Z, V3i::Z, column);
        }
        if !map.get(cell - V2i::new(0, 1)) {
            face_line(faces, base, V3i::X, V3i::Z, V3i::Z, column);
        }
        if !map.get(cell + V2i::new(0, 1)) {
            face_line(faces, base + V3i::Y, V3i::Z, V3i::X, V3i::Z, column);
        }

        faces.push(Face::new(base, V3i::Y, V3i::X));
        faces.push(Face::new(l.with_z(above), V3i::X, V3i::Y));
    }
    Ok(())
}

/// Probe surface of `net` in the loaded region.
///
/// On each layer the net's loaded objects are merged, grown by `standoff`
/// with the square kernel and wrapped in faces. Layers where the net has
/// no loaded object, or where the grown shape misses the region, add
/// nothing.
pub fn net_faces(space: &Space, net: &Net, objects: &[Object], standoff: i32) -> Result<Vec<Face>> {
    let mut faces = Vec::new();
    for layer in space.layers() {
        let members = layer
            .objects
            .iter()
            .filter(|id| net.objects.contains(*id))
            .filter_map(|id| objects.get(id.0))
            .filter(|obj| obj.is_loaded());

        let mut shape = match Object::composite(&net.name, members)? {
            Some(shape) => shape,
            None => continue,
        };
        shape.grow(standoff, GrowKernel::Square)?;

        let (pos, size) = (space.pos().xy(), space.size().xy());
        if !rect_overlap(shape.pos(), shape.size(), pos, size) {
            debug!(net = %net.name, layer = %layer.name, "probe surface outside region");
            continue;
        }
        object_faces(&shape, layer, &mut faces)?;
    }
    Ok(faces)
}
