//! Pixel rasters for image-defined objects.

use std::path::Path;

use super::bitmap::Bitmap;
use super::vector::V2i;
use crate::error::{CapError, Result};

/// A decoded image as packed RGBA colours, row `y` at `pixels[y * width..]`.
#[derive(Debug, Clone)]
pub struct Raster {
    size: V2i,
    pixels: Vec<u32>,
}

impl Raster {
    /// Build a raster from packed colours.
    pub fn from_pixels(size: V2i, pixels: Vec<u32>) -> Result<Self> {
        if pixels.len() != size.area() {
            return Err(CapError::invalid_geometry(
                "raster",
                format!("{} pixels do not fill {}", pixels.len(), size),
            ));
        }
        Ok(Self { size, pixels })
    }

    /// Decode a PNG file.
    pub fn open(path: &Path) -> Result<Self> {
        let img = image::open(path).map_err(|e| CapError::ImageError {
            path: path.display().to_string(),
            source: e,
        })?;
        let rgba = img.to_rgba8();
        let size = V2i::new(rgba.width() as i32, rgba.height() as i32);
        let pixels = rgba.pixels().map(|p| u32::from_be_bytes(p.0)).collect();
        Self::from_pixels(size, pixels)
    }

    pub fn size(&self) -> V2i {
        self.size
    }

    pub fn contains(&self, pos: V2i) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.size.x && pos.y < self.size.y
    }

    /// Packed colour at `pos`, `None` outside the image.
    pub fn pixel(&self, pos: V2i) -> Option<u32> {
        self.contains(pos)
            .then(|| self.pixels[pos.y as usize * self.size.x as usize + pos.x as usize])
    }

    /// Mark every pixel 4-connected to `seed` with the seed's colour.
    ///
    /// Scanline fill driven by an explicit stack of row spans, so large
    /// regions cannot exhaust the call stack.
    pub fn fill_region(&self, seed: V2i, map: &mut Bitmap) -> Result<()> {
        if map.size() != self.size {
            return Err(CapError::invalid_geometry(
                "raster",
                format!("fill target {} does not match image {}", map.size(), self.size),
            ));
        }
        let Some(colour) = self.pixel(seed) else {
            return Ok(());
        };
        let matches = |map: &Bitmap, p: V2i| self.pixel(p) == Some(colour) && !map.get(p);

        let mut stack = vec![seed];
        while let Some(start) = stack.pop() {
            if !matches(map, start) {
                continue;
            }

            let mut west = start.x;
            while west > 0 && matches(map, V2i::new(west - 1, start.y)) {
                west -= 1;
            }
            let mut east = start.x;
            while east + 1 < self.size.x && matches(map, V2i::new(east + 1, start.y)) {
                east += 1;
            }

            for x in west..=east {
                map.set(V2i::new(x, start.y), true)?;
            }

            for y in [start.y - 1, start.y + 1] {
                if y < 0 || y >= self.size.y {
                    continue;
                }
                // push one seed per run of matching pixels
                let mut in_run = false;
                for x in west..=east {
                    let p = V2i::new(x, y);
                    if matches(map, p) {
                        if !in_run {
                            stack.push(p);
                            in_run = true;
                        }
                    } else {
                        in_run = false;
                    }
                }
            }
        }
        Ok(())
    }
}
