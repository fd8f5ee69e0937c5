//! # Collision Queries
//!
//! The navigation code never talks to a physics engine directly. Occupancy
//! sampling and line-of-sight checks go through [`CollisionWorld`], which a
//! host implements over its own environment layer. Two implementations ship
//! with the crate: [`EmptyWorld`] and the box-based [`BoxWorld`].

use crate::Vec3;
use serde::{Deserialize, Serialize};

/// Environment collision queries against the static level geometry.
///
/// Implementations only report environment hits; triggers and dynamic
/// actors are expected to be filtered out by the host.
pub trait CollisionWorld {
    /// Returns true if a sphere at `center` with `radius` touches any environment geometry.
    fn overlap_sphere(&self, center: Vec3, radius: f32) -> bool;

    /// Returns true if a ray from `origin` along `direction` hits environment
    /// geometry within `max_distance`.
    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool;
}

/// A world with no geometry at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyWorld;

impl CollisionWorld for EmptyWorld {
    fn overlap_sphere(&self, _center: Vec3, _radius: f32) -> bool {
        false
    }

    fn raycast(&self, _origin: Vec3, _direction: Vec3, _max_distance: f32) -> bool {
        false
    }
}

/// Axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Creates a box from two opposite corners in any order.
    pub fn new(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Checks if a point lies inside or on the surface of the box.
    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.y >= self.min.y
            && point.z >= self.min.z
            && point.x <= self.max.x
            && point.y <= self.max.y
            && point.z <= self.max.z
    }

    /// Squared distance from a point to the closest point of the box.
    pub fn distance_squared(&self, point: Vec3) -> f32 {
        let closest = point.max(self.min).min(self.max);
        let delta = point - closest;
        delta.dot(delta)
    }

    /// Slab test for the segment `origin + t * direction`, `t` in `[0, max_t]`.
    pub fn intersects_ray(&self, origin: Vec3, direction: Vec3, max_t: f32) -> bool {
        let mut t_min = 0.0_f32;
        let mut t_max = max_t;

        let axes = [
            (origin.x, direction.x, self.min.x, self.max.x),
            (origin.y, direction.y, self.min.y, self.max.y),
            (origin.z, direction.z, self.min.z, self.max.z),
        ];

        for (o, d, lo, hi) in axes {
            if d.abs() <= f32::EPSILON {
                if o < lo || o > hi {
                    return false;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t0 = (lo - o) * inv;
            let mut t1 = (hi - o) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }

            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }

        true
    }
}

/// Static environment made of axis-aligned boxes.
///
/// # Examples
///
/// ```
/// use raidcore::{Aabb, BoxWorld, CollisionWorld, Vec3};
///
/// let world = BoxWorld::new().with_box(Aabb::new(Vec3::new(2.0, 0.0, 0.0), Vec3::new(3.0, 5.0, 5.0)));
/// assert!(world.overlap_sphere(Vec3::new(2.5, 1.0, 1.0), 0.5));
/// assert!(!world.overlap_sphere(Vec3::new(0.0, 1.0, 1.0), 0.5));
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoxWorld {
    pub boxes: Vec<Aabb>,
}

impl BoxWorld {
    /// Creates an empty box world.
    pub fn new() -> Self {
        Self { boxes: Vec::new() }
    }

    /// Adds a box and returns the world, for chained construction.
    pub fn with_box(mut self, aabb: Aabb) -> Self {
        self.boxes.push(aabb);
        self
    }

    pub fn add_box(&mut self, aabb: Aabb) {
        self.boxes.push(aabb);
    }
}

impl CollisionWorld for BoxWorld {
    fn overlap_sphere(&self, center: Vec3, radius: f32) -> bool {
        let radius_sq = radius * radius;
        self.boxes
            .iter()
            .any(|aabb| aabb.distance_squared(center) < radius_sq || aabb.contains(center))
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> bool {
        let direction = direction.normalized();
        if direction == Vec3::zero() {
            return false;
        }
        self.boxes
            .iter()
            .any(|aabb| aabb.intersects_ray(origin, direction, max_distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wall() -> Aabb {
        Aabb::new(Vec3::new(4.0, 0.0, -10.0), Vec3::new(5.0, 10.0, 10.0))
    }

    #[test]
    fn test_aabb_orders_corners() {
        let aabb = Aabb::new(Vec3::new(1.0, 5.0, 3.0), Vec3::new(0.0, 2.0, 4.0));
        assert_eq!(aabb.min, Vec3::new(0.0, 2.0, 3.0));
        assert_eq!(aabb.max, Vec3::new(1.0, 5.0, 4.0));
    }

    #[test]
    fn test_sphere_overlap_distance() {
        let world = BoxWorld::new().with_box(wall());
        assert!(world.overlap_sphere(Vec3::new(3.8, 1.0, 0.0), 0.5));
        assert!(!world.overlap_sphere(Vec3::new(3.0, 1.0, 0.0), 0.5));
        assert!(world.overlap_sphere(Vec3::new(4.5, 1.0, 0.0), 0.0));
    }

    #[test]
    fn test_raycast_blocked_by_wall() {
        let world = BoxWorld::new().with_box(wall());
        let origin = Vec3::new(0.0, 1.0, 0.0);
        assert!(world.raycast(origin, Vec3::new(1.0, 0.0, 0.0), 10.0));
        // Stops short of the wall
        assert!(!world.raycast(origin, Vec3::new(1.0, 0.0, 0.0), 3.0));
        // Pointing away
        assert!(!world.raycast(origin, Vec3::new(-1.0, 0.0, 0.0), 10.0));
    }

    #[test]
    fn test_empty_world_never_hits() {
        let world = EmptyWorld;
        assert!(!world.overlap_sphere(Vec3::zero(), 100.0));
        assert!(!world.raycast(Vec3::zero(), Vec3::new(1.0, 0.0, 0.0), 100.0));
    }
}
