//! # Game Mathematics
//!
//! Small vector types shared by the navigation grid and the level generator.
//!
//! World space uses [`Vec3`]; the voxel occupancy grid is addressed with
//! [`Vec3i`]; the level generator's tile grid uses [`Vec2i`].

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

/// A point or direction in world space.
///
/// # Examples
///
/// ```
/// use raidcore::Vec3;
///
/// let a = Vec3::new(1.0, 2.0, 2.0);
/// assert_eq!(a.length(), 3.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// Creates a new vector from its components.
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Returns the zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub fn dot(self, other: Vec3) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }

    /// Returns a unit vector in the same direction, or zero for a zero vector.
    pub fn normalized(self) -> Vec3 {
        let length = self.length();
        if length <= f32::EPSILON {
            Vec3::zero()
        } else {
            self * (1.0 / length)
        }
    }

    /// Rounds every component to the nearest whole number.
    pub fn round(self) -> Vec3 {
        Vec3::new(self.x.round(), self.y.round(), self.z.round())
    }

    /// Component-wise minimum.
    pub fn min(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    pub fn max(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

impl Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f32> for Vec3 {
    type Output = Self;

    fn mul(self, scale: f32) -> Self {
        Self::new(self.x * scale, self.y * scale, self.z * scale)
    }
}

impl Neg for Vec3 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

/// Integer cell coordinate in the voxel occupancy grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec3i {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl Vec3i {
    /// Creates a new cell coordinate.
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Calculates the Manhattan distance to another cell.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidcore::Vec3i;
    ///
    /// let a = Vec3i::new(0, 0, 0);
    /// assert_eq!(a.manhattan_distance(Vec3i::new(1, -2, 3)), 6);
    /// ```
    pub fn manhattan_distance(self, other: Vec3i) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs() + (self.z - other.z).abs()) as u32
    }

    /// Returns the 6 face-adjacent cells (no edge or corner neighbours).
    pub fn face_neighbors(self) -> [Vec3i; 6] {
        [
            Vec3i::new(self.x - 1, self.y, self.z),
            Vec3i::new(self.x + 1, self.y, self.z),
            Vec3i::new(self.x, self.y - 1, self.z),
            Vec3i::new(self.x, self.y + 1, self.z),
            Vec3i::new(self.x, self.y, self.z - 1),
            Vec3i::new(self.x, self.y, self.z + 1),
        ]
    }
}

impl Add for Vec3i {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3i {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

/// Integer tile coordinate on the level generator's 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

impl Vec2i {
    /// Creates a new tile coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn zero() -> Self {
        Self::new(0, 0)
    }

    /// Rotates the coordinate 90 degrees clockwise about the origin.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidcore::Vec2i;
    ///
    /// assert_eq!(Vec2i::new(0, 1).rotated_clockwise(), Vec2i::new(1, 0));
    /// assert_eq!(Vec2i::new(2, 3).rotated_clockwise(), Vec2i::new(3, -2));
    /// ```
    pub fn rotated_clockwise(self) -> Vec2i {
        Vec2i::new(self.y, -self.x)
    }
}

impl Add for Vec2i {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl Sub for Vec2i {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl Mul<i32> for Vec2i {
    type Output = Self;

    fn mul(self, scale: i32) -> Self {
        Self::new(self.x * scale, self.y * scale)
    }
}
