//! Electric flux through probe faces.

use crate::error::Result;
use crate::geometry::{Axis, Face, V3f, V3i};
use crate::mesh::Space;

/// Physical length of a grid vector.
fn span(v: V3i, step: V3f) -> f64 {
    (v.x as f64 * step.x + v.y as f64 * step.y + v.z as f64 * step.z).abs()
}

/// Permittivity-weighted normal derivative of the potential through one
/// face, integrated over the face area.
///
/// The derivative is the central difference along the normal, averaged
/// over the four corners. A face whose origin lies on or beyond the first
/// or last plane of the loaded region on any axis contributes nothing.
pub fn face_flux(space: &Space, face: &Face) -> Result<f64> {
    let (p, s) = (space.pos(), space.size());
    for axis in Axis::ALL {
        let c = face.pos.get(axis);
        if c <= p.get(axis) || c >= p.get(axis) + s.get(axis) - 1 {
            return Ok(0.0);
        }
    }

    let step = space.step();
    let h = span(face.normal, step);
    let area = span(face.e1, step) * span(face.e2, step);

    let mut gradient = 0.0;
    for corner in face.corners() {
        gradient +=
            (space.field(corner + face.normal)? - space.field(corner - face.normal)?) / (2.0 * h);
    }
    gradient /= 4.0;

    Ok(gradient * space.material(face.pos)? * area)
}

/// Total flux through a closed surface.
pub fn flux_sum(space: &Space, faces: &[Face]) -> Result<f64> {
    faces.iter().try_fold(0.0, |acc, f| Ok(acc + face_flux(space, f)?))
}
