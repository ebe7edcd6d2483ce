//! 2D geometry model feeding the grid.
//!
//! Objects are described by shapes (rectangles, circles or flood-filled
//! regions of PNG images) and rasterised into [`Bitmap`]s on demand. A
//! bitmap cell `(x, y)` sits between grid points `(x, y)` and
//! `(x+1, y+1)`, so stamping an occupied cell touches four grid points.
//!
//! Bitmaps can be dilated ([`Object::grow`]), merged ([`Object::merge`]),
//! trimmed ([`Object::shrink_tight`]) and dropped again
//! ([`Object::unload`]) to keep memory proportional to the working set.

mod bitmap;
mod face;
mod object;
mod raster;
mod vector;

pub use bitmap::{rect_overlap, Bitmap, GrowKernel};
pub use face::{face_line, Face};
pub use object::{Object, Role, Shape};
pub use raster::Raster;
pub use vector::{Axis, V2i, V3f, V3i};
