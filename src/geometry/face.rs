//! Unit faces of flux integration surfaces.

use super::vector::V3i;

/// A unit grid-aligned square spanned by `e1` and `e2` from `pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Face {
    pub pos: V3i,
    pub e1: V3i,
    pub e2: V3i,
    /// `e1 x e2`; points out of the enclosed volume.
    pub normal: V3i,
}

impl Face {
    pub fn new(pos: V3i, e1: V3i, e2: V3i) -> Self {
        Self {
            pos,
            e1,
            e2,
            normal: e1.cross(e2),
        }
    }

    /// The four grid points at the corners of the face.
    pub fn corners(&self) -> [V3i; 4] {
        [
            self.pos,
            self.pos + self.e1,
            self.pos + self.e2,
            self.pos + self.e1 + self.e2,
        ]
    }
}

/// Append `count` faces starting at `pos`, each shifted by `step`.
pub fn face_line(faces: &mut Vec<Face>, pos: V3i, e1: V3i, e2: V3i, step: V3i, count: i32) {
    faces.extend((0..count).map(|i| Face::new(pos + step * i, e1, e2)));
}
