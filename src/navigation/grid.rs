//! # Occupancy Grid
//!
//! Voxel discretisation of a room volume.
//!
//! The grid covers the room's bounding box at a fixed integer resolution and
//! stores one "obstructed" flag per cell. It is sampled once from a
//! [`CollisionWorld`] and is read-only afterwards, so any number of searches
//! can run against it at the same time.

use crate::{config, CollisionWorld, Vec3, Vec3i};
use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Dense 3D obstruction map with world/cell coordinate conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccupancyGrid {
    /// World coordinate of cell (0, 0, 0)
    lower: Vec3i,
    /// Number of cells along each axis (always at least 1)
    range: Vec3i,
    /// World units per cell edge (always at least 1)
    resolution: i32,
    /// Obstruction flags, x-major
    cells: Vec<bool>,
}

impl OccupancyGrid {
    /// Creates an all-free grid with its first cell at `lower`.
    ///
    /// Ranges and resolution are clamped to at least 1, so a degenerate
    /// request still yields a single usable cell per axis. Ranges are also
    /// trimmed, Z first, so the grid never exceeds
    /// [`config::GRID_CELL_LIMIT`] cells.
    pub fn new(lower: Vec3i, range: Vec3i, resolution: i32) -> Self {
        let limit = config::GRID_CELL_LIMIT as i64;
        let x = i64::from(range.x).clamp(1, limit);
        let y = i64::from(range.y).clamp(1, limit / x);
        let z = i64::from(range.z).clamp(1, limit / (x * y));
        let clamped = Vec3i::new(x as i32, y as i32, z as i32);
        if clamped != range && range.x >= 1 && range.y >= 1 && range.z >= 1 {
            warn!("Occupancy grid {range:?} exceeds the cell limit; trimmed to {clamped:?}");
        }
        let range = clamped;
        let cell_count = (x * y * z) as usize;
        Self {
            lower,
            range,
            resolution: resolution.max(1),
            cells: vec![false; cell_count],
        }
    }

    /// Creates an all-free grid covering a room volume.
    ///
    /// `origin` is the room's bottom-centre: the volume spans `width` along X
    /// and `depth` along Z centred on it, and `height` upward along Y.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidcore::{OccupancyGrid, Vec3, Vec3i};
    ///
    /// let grid = OccupancyGrid::for_room(Vec3::zero(), 30.0, 20.0, 30.0, 2);
    /// assert_eq!(grid.range(), Vec3i::new(15, 10, 15));
    /// ```
    pub fn for_room(origin: Vec3, width: f32, height: f32, depth: f32, resolution: i32) -> Self {
        let resolution = resolution.max(1);
        let lower = Vec3i::new(
            (origin.x - width / 2.0) as i32,
            origin.y as i32,
            (origin.z - depth / 2.0) as i32,
        );
        let upper = Vec3i::new(
            (origin.x + width / 2.0) as i32,
            (origin.y + height) as i32,
            (origin.z + depth / 2.0) as i32,
        );
        let range = Vec3i::new(
            upper.x.saturating_sub(lower.x) / resolution,
            upper.y.saturating_sub(lower.y) / resolution,
            upper.z.saturating_sub(lower.z) / resolution,
        );

        if range.x < 1 || range.y < 1 || range.z < 1 {
            debug!("Degenerate room volume {width}x{height}x{depth}; clamping ranges to 1");
        }

        Self::new(lower, range, resolution)
    }

    /// Marks every cell whose centre sphere (radius `resolution / 2`) touches
    /// environment geometry.
    pub fn sample<W: CollisionWorld + ?Sized>(&mut self, world: &W) {
        let radius = self.resolution as f32 / 2.0;
        let mut obstructed = 0usize;

        for z in 0..self.range.z {
            for y in 0..self.range.y {
                for x in 0..self.range.x {
                    let cell = Vec3i::new(x, y, z);
                    let hit = world.overlap_sphere(self.map_to_world(cell), radius);
                    if hit {
                        obstructed += 1;
                    }
                    self.set_obstructed(cell, hit);
                }
            }
        }

        debug!(
            "Sampled occupancy grid {:?}: {} of {} cells obstructed",
            self.range,
            obstructed,
            self.cells.len()
        );
    }

    /// Number of cells along each axis.
    pub fn range(&self) -> Vec3i {
        self.range
    }

    pub fn resolution(&self) -> i32 {
        self.resolution
    }

    /// World coordinate of cell (0, 0, 0).
    pub fn lower(&self) -> Vec3i {
        self.lower
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Counts the unobstructed cells.
    pub fn free_cell_count(&self) -> usize {
        self.cells.iter().filter(|obstructed| !**obstructed).count()
    }

    fn index(&self, cell: Vec3i) -> Option<usize> {
        if !self.is_in_bounds(cell) {
            return None;
        }
        Some((cell.x + self.range.x * (cell.y + self.range.y * cell.z)) as usize)
    }

    /// Checks if a cell lies inside the grid.
    pub fn is_in_bounds(&self, cell: Vec3i) -> bool {
        cell.x >= 0
            && cell.y >= 0
            && cell.z >= 0
            && cell.x < self.range.x
            && cell.y < self.range.y
            && cell.z < self.range.z
    }

    /// Checks if a cell is blocked. Cells outside the grid count as blocked.
    pub fn is_obstructed(&self, cell: Vec3i) -> bool {
        self.index(cell).map_or(true, |index| self.cells[index])
    }

    /// Sets the obstruction flag of an in-bounds cell; out-of-bounds cells are ignored.
    pub fn set_obstructed(&mut self, cell: Vec3i, obstructed: bool) {
        if let Some(index) = self.index(cell) {
            self.cells[index] = obstructed;
        }
    }

    /// Converts a cell to the world position of its lower corner.
    pub fn map_to_world(&self, cell: Vec3i) -> Vec3 {
        Vec3::new(
            self.axis_to_world(cell.x, self.lower.x),
            self.axis_to_world(cell.y, self.lower.y),
            self.axis_to_world(cell.z, self.lower.z),
        )
    }

    fn axis_to_world(&self, cell: i32, lower: i32) -> f32 {
        (i64::from(cell) * i64::from(self.resolution) + i64::from(lower)) as f32
    }

    /// Converts a world position to the cell containing it.
    ///
    /// Positions outside the grid are clamped onto the nearest boundary cell
    /// rather than rejected.
    pub fn world_to_map(&self, world: Vec3) -> Vec3i {
        let axis = |value: f32, lower: i32, range: i32| {
            (((value.floor() as i32).saturating_sub(lower)).div_euclid(self.resolution)).clamp(0, range - 1)
        };
        Vec3i::new(
            axis(world.x, self.lower.x, self.range.x),
            axis(world.y, self.lower.y, self.range.y),
            axis(world.z, self.lower.z, self.range.z),
        )
    }

    /// Breadth-first search outward from `start` for the nearest free cell.
    ///
    /// Expands at most [`config::CLOSEST_FREE_EXPANSION_LIMIT`] cells and
    /// returns `None` once that bound is hit or the reachable region is
    /// exhausted.
    pub fn find_closest_free_cell(&self, start: Vec3i) -> Option<Vec3i> {
        let start = Vec3i::new(
            start.x.clamp(0, self.range.x - 1),
            start.y.clamp(0, self.range.y - 1),
            start.z.clamp(0, self.range.z - 1),
        );

        let mut visited = vec![false; self.cells.len()];
        let mut queue = VecDeque::new();

        if let Some(index) = self.index(start) {
            visited[index] = true;
        }
        queue.push_back(start);

        let mut expanded = 0usize;
        while let Some(current) = queue.pop_front() {
            if expanded >= config::CLOSEST_FREE_EXPANSION_LIMIT {
                debug!("Closest-free search from {start:?} hit its expansion limit");
                return None;
            }
            expanded += 1;

            if !self.is_obstructed(current) {
                return Some(current);
            }

            for neighbor in current.face_neighbors() {
                let Some(index) = self.index(neighbor) else {
                    continue;
                };
                if !visited[index] {
                    visited[index] = true;
                    queue.push_back(neighbor);
                }
            }
        }

        debug!("No free cell reachable from {start:?}");
        None
    }

    /// Picks a uniformly random free (`open = true`) or obstructed cell.
    ///
    /// Returns `None` when the grid holds no cell of the requested kind.
    pub fn random_cell<R: Rng + ?Sized>(&self, rng: &mut R, open: bool) -> Option<Vec3i> {
        let wanted_obstructed = !open;
        let matching = self.cells.iter().filter(|c| **c == wanted_obstructed).count();
        if matching == 0 {
            return None;
        }

        let target = rng.gen_range(0..matching);
        let index = self
            .cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == wanted_obstructed)
            .nth(target)
            .map(|(index, _)| index)?;

        let index = index as i32;
        let x = index % self.range.x;
        let y = (index / self.range.x) % self.range.y;
        let z = index / (self.range.x * self.range.y);
        Some(Vec3i::new(x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{utils, Aabb, BoxWorld};

    fn small_grid() -> OccupancyGrid {
        OccupancyGrid::new(Vec3i::new(-5, 0, -5), Vec3i::new(10, 4, 10), 1)
    }

    #[test]
    fn test_for_room_extents() {
        let grid = OccupancyGrid::for_room(Vec3::new(10.0, 2.0, -4.0), 30.0, 20.0, 30.0, 1);
        assert_eq!(grid.lower(), Vec3i::new(-5, 2, -19));
        assert_eq!(grid.range(), Vec3i::new(30, 20, 30));
        assert_eq!(grid.cell_count(), 30 * 20 * 30);
    }

    #[test]
    fn test_degenerate_room_clamps_to_one_cell() {
        let grid = OccupancyGrid::for_room(Vec3::zero(), 0.0, -3.0, 0.5, 4);
        assert_eq!(grid.range(), Vec3i::new(1, 1, 1));
        assert_eq!(grid.free_cell_count(), 1);
    }

    #[test]
    fn test_resolution_is_clamped() {
        let grid = OccupancyGrid::new(Vec3i::new(0, 0, 0), Vec3i::new(2, 2, 2), 0);
        assert_eq!(grid.resolution(), 1);
    }

    #[test]
    fn test_world_to_map_round_trip() {
        let grid = OccupancyGrid::for_room(Vec3::zero(), 12.0, 6.0, 12.0, 2);
        for x in 0..grid.range().x {
            for y in 0..grid.range().y {
                for z in 0..grid.range().z {
                    let cell = Vec3i::new(x, y, z);
                    assert_eq!(grid.world_to_map(grid.map_to_world(cell)), cell);
                }
            }
        }
    }

    #[test]
    fn test_world_to_map_clamps_out_of_bounds() {
        let grid = small_grid();
        assert_eq!(grid.world_to_map(Vec3::new(-100.0, -100.0, -100.0)), Vec3i::new(0, 0, 0));
        assert_eq!(grid.world_to_map(Vec3::new(100.0, 100.0, 100.0)), Vec3i::new(9, 3, 9));
    }

    #[test]
    fn test_out_of_bounds_is_obstructed() {
        let grid = small_grid();
        assert!(grid.is_obstructed(Vec3i::new(-1, 0, 0)));
        assert!(grid.is_obstructed(Vec3i::new(0, 4, 0)));
        assert!(!grid.is_obstructed(Vec3i::new(0, 0, 0)));
    }

    #[test]
    fn test_sample_marks_box_cells() {
        let world = BoxWorld::new().with_box(Aabb::new(Vec3::new(-0.2, -1.0, -5.0), Vec3::new(0.2, 10.0, 5.0)));
        let mut grid = small_grid();
        grid.sample(&world);

        // Column at world x = 0 is cell x = 5
        assert!(grid.is_obstructed(Vec3i::new(5, 0, 0)));
        assert!(grid.is_obstructed(Vec3i::new(5, 3, 9)));
        assert!(!grid.is_obstructed(Vec3i::new(4, 0, 0)));
        assert!(!grid.is_obstructed(Vec3i::new(6, 0, 0)));
    }

    #[test]
    fn test_closest_free_of_free_cell_is_itself() {
        let grid = small_grid();
        let cell = Vec3i::new(3, 2, 1);
        assert_eq!(grid.find_closest_free_cell(cell), Some(cell));
    }

    #[test]
    fn test_closest_free_leaves_obstructed_block() {
        let mut grid = small_grid();
        for x in 0..3 {
            for y in 0..4 {
                for z in 0..10 {
                    grid.set_obstructed(Vec3i::new(x, y, z), true);
                }
            }
        }
        let found = grid.find_closest_free_cell(Vec3i::new(1, 1, 5)).unwrap();
        assert_eq!(found, Vec3i::new(3, 1, 5));
    }

    #[test]
    fn test_closest_free_none_when_full() {
        let mut grid = OccupancyGrid::new(Vec3i::new(0, 0, 0), Vec3i::new(3, 3, 3), 1);
        for x in 0..3 {
            for y in 0..3 {
                for z in 0..3 {
                    grid.set_obstructed(Vec3i::new(x, y, z), true);
                }
            }
        }
        assert_eq!(grid.find_closest_free_cell(Vec3i::new(1, 1, 1)), None);
    }

    #[test]
    fn test_closest_free_gives_up_at_expansion_limit() {
        let mut grid = OccupancyGrid::for_room(Vec3::zero(), 30.0, 20.0, 30.0, 1);
        let far_corner = Vec3i::new(29, 19, 29);
        for x in 0..30 {
            for y in 0..20 {
                for z in 0..30 {
                    grid.set_obstructed(Vec3i::new(x, y, z), Vec3i::new(x, y, z) != far_corner);
                }
            }
        }
        assert!(grid.cell_count() > config::CLOSEST_FREE_EXPANSION_LIMIT);

        assert_eq!(grid.find_closest_free_cell(Vec3i::new(0, 0, 0)), None);
        assert_eq!(grid.find_closest_free_cell(Vec3i::new(27, 19, 29)), Some(far_corner));
    }

    #[test]
    fn test_oversized_grid_is_trimmed_to_cell_limit() {
        let grid = OccupancyGrid::new(Vec3i::new(0, 0, 0), Vec3i::new(1300, 1300, 1300), 1);
        assert!(grid.cell_count() <= config::GRID_CELL_LIMIT);
        assert_eq!(grid.range().x, 1300);
        assert_eq!(grid.range().y, 1300);

        let grid = OccupancyGrid::for_room(Vec3::zero(), 1e10, 1.0, 1.0, 1);
        assert!(grid.cell_count() <= config::GRID_CELL_LIMIT);
        assert!(grid.is_in_bounds(grid.world_to_map(Vec3::new(1e12, 0.0, 0.0))));
    }

    #[test]
    fn test_random_cell_respects_kind() {
        let mut grid = small_grid();
        grid.set_obstructed(Vec3i::new(2, 2, 2), true);
        let mut rng = utils::create_rng(9);

        assert_eq!(grid.random_cell(&mut rng, false), Some(Vec3i::new(2, 2, 2)));
        for _ in 0..50 {
            let cell = grid.random_cell(&mut rng, true).unwrap();
            assert!(!grid.is_obstructed(cell));
        }
    }

    #[test]
    fn test_random_cell_none_when_no_match() {
        let grid = small_grid();
        let mut rng = utils::create_rng(10);
        assert_eq!(grid.random_cell(&mut rng, false), None);
    }
}
