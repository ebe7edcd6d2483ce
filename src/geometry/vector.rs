//! Integer grid coordinates and physical step vectors.

use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in x, y, z order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// The two axes spanning the plane orthogonal to this one.
    pub fn tangents(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }

    /// Lower-case axis name.
    pub fn name(self) -> &'static str {
        match self {
            Axis::X => "x",
            Axis::Y => "y",
            Axis::Z => "z",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 2D integer vector (bitmap cells, horizontal grid positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct V2i {
    pub x: i32,
    pub y: i32,
}

impl V2i {
    pub const ZERO: V2i = V2i { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Same value in both components.
    pub const fn splat(v: i32) -> Self {
        Self { x: v, y: v }
    }

    /// Number of cells covered by a size vector.
    pub fn area(self) -> usize {
        if self.x <= 0 || self.y <= 0 {
            0
        } else {
            self.x as usize * self.y as usize
        }
    }

    /// Lift into 3D at height `z`.
    pub const fn with_z(self, z: i32) -> V3i {
        V3i {
            x: self.x,
            y: self.y,
            z,
        }
    }

    /// Component-wise minimum.
    pub fn min(self, other: V2i) -> V2i {
        V2i::new(self.x.min(other.x), self.y.min(other.y))
    }

    /// Component-wise maximum.
    pub fn max(self, other: V2i) -> V2i {
        V2i::new(self.x.max(other.x), self.y.max(other.y))
    }
}

impl Add for V2i {
    type Output = V2i;
    fn add(self, rhs: V2i) -> V2i {
        V2i::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for V2i {
    type Output = V2i;
    fn sub(self, rhs: V2i) -> V2i {
        V2i::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl fmt::Display for V2i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 3D integer vector (grid points, block extents, face edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct V3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl V3i {
    pub const ZERO: V3i = V3i { x: 0, y: 0, z: 0 };
    pub const X: V3i = V3i { x: 1, y: 0, z: 0 };
    pub const Y: V3i = V3i { x: 0, y: 1, z: 0 };
    pub const Z: V3i = V3i { x: 0, y: 0, z: 1 };

    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Unit vector along `axis`.
    pub const fn unit(axis: Axis) -> Self {
        match axis {
            Axis::X => V3i::X,
            Axis::Y => V3i::Y,
            Axis::Z => V3i::Z,
        }
    }

    /// Horizontal part.
    pub const fn xy(self) -> V2i {
        V2i {
            x: self.x,
            y: self.y,
        }
    }

    pub fn get(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    pub fn set(&mut self, axis: Axis, value: i32) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
        }
    }

    /// Cross product.
    pub fn cross(self, rhs: V3i) -> V3i {
        V3i::new(
            self.y * rhs.z - self.z * rhs.y,
            self.z * rhs.x - self.x * rhs.z,
            self.x * rhs.y - self.y * rhs.x,
        )
    }

    /// Number of points covered by a size vector.
    pub fn volume(self) -> usize {
        if self.x <= 0 || self.y <= 0 || self.z <= 0 {
            0
        } else {
            self.x as usize * self.y as usize * self.z as usize
        }
    }

    /// True if `self` lies in the box `[origin, origin + size)`.
    pub fn within(self, origin: V3i, size: V3i) -> bool {
        self.x >= origin.x
            && self.y >= origin.y
            && self.z >= origin.z
            && self.x < origin.x + size.x
            && self.y < origin.y + size.y
            && self.z < origin.z + size.z
    }

    /// Scale each component by a physical step, giving a length vector.
    pub fn scale(self, step: V3f) -> V3f {
        V3f::new(
            self.x as f64 * step.x,
            self.y as f64 * step.y,
            self.z as f64 * step.z,
        )
    }
}

impl Add for V3i {
    type Output = V3i;
    fn add(self, rhs: V3i) -> V3i {
        V3i::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for V3i {
    type Output = V3i;
    fn sub(self, rhs: V3i) -> V3i {
        V3i::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Neg for V3i {
    type Output = V3i;
    fn neg(self) -> V3i {
        V3i::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<i32> for V3i {
    type Output = V3i;
    fn mul(self, rhs: i32) -> V3i {
        V3i::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl fmt::Display for V3i {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// 3D float vector, used for physical grid steps in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct V3f {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl V3f {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn get(self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

impl fmt::Display for V3f {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:e}, {:e}, {:e})", self.x, self.y, self.z)
    }
}
