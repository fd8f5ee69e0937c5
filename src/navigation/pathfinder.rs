//! # Pathfinder
//!
//! Owns one room's occupancy grid and answers path and nearest-free-cell
//! queries in world space.

use crate::{
    AStarSearch, CollisionWorld, OccupancyGrid, PathfinderConfig, SearchProgress, Vec3, Vec3i,
};
use log::{debug, info};
use rand::Rng;

/// Grid-backed path planner for a single room.
///
/// The grid is read-only once built. Searches are handed out as independent
/// [`PathRequest`]s, so many agents can plan against the same pathfinder at once.
#[derive(Debug, Clone)]
pub struct Pathfinder {
    grid: OccupancyGrid,
    config: PathfinderConfig,
}

/// Outcome of polling a [`PathRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum PathPoll {
    /// Still searching
    Pending,
    /// Finished; `None` means no path was found
    Ready(Option<Vec<Vec3>>),
}

/// An in-flight path search owned by the agent that asked for it.
///
/// Dropping the request cancels the search.
#[derive(Debug, Clone)]
pub struct PathRequest {
    search: AStarSearch,
}

impl PathRequest {
    /// Advances the search by one tick's worth of expansions.
    pub fn poll<R: Rng + ?Sized>(&mut self, pathfinder: &Pathfinder, rng: &mut R) -> PathPoll {
        match self.search.step(&pathfinder.grid, rng) {
            SearchProgress::Pending => PathPoll::Pending,
            SearchProgress::Found(cells) => PathPoll::Ready(Some(pathfinder.transform_path(&cells))),
            SearchProgress::Failed(failure) => {
                debug!("Path request failed: {failure:?}");
                PathPoll::Ready(None)
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.search.is_finished()
    }

    /// Start and goal cells of the search.
    pub fn endpoints(&self) -> (Vec3i, Vec3i) {
        (self.search.start(), self.search.goal())
    }
}

impl Pathfinder {
    /// Builds a pathfinder for a room whose bottom-centre sits at `room_origin`,
    /// sampling occupancy from `world`.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidcore::{EmptyWorld, Pathfinder, PathfinderConfig, Vec3};
    ///
    /// let pathfinder = Pathfinder::initialize(Vec3::zero(), PathfinderConfig::default(), &EmptyWorld);
    /// assert_eq!(pathfinder.grid().free_cell_count(), pathfinder.grid().cell_count());
    /// ```
    pub fn initialize<W: CollisionWorld + ?Sized>(
        room_origin: Vec3,
        config: PathfinderConfig,
        world: &W,
    ) -> Self {
        let mut grid = OccupancyGrid::for_room(
            room_origin,
            config.width,
            config.height,
            config.depth,
            config.resolution,
        );
        grid.sample(world);

        info!(
            "Pathfinder ready: {:?} cells at resolution {}, {} free",
            grid.range(),
            grid.resolution(),
            grid.free_cell_count()
        );

        Self { grid, config }
    }

    /// Wraps an already prepared grid.
    pub fn from_grid(grid: OccupancyGrid, config: PathfinderConfig) -> Self {
        Self { grid, config }
    }

    pub fn grid(&self) -> &OccupancyGrid {
        &self.grid
    }

    pub fn config(&self) -> &PathfinderConfig {
        &self.config
    }

    pub fn world_to_map(&self, world: Vec3) -> Vec3i {
        self.grid.world_to_map(world)
    }

    pub fn map_to_world(&self, cell: Vec3i) -> Vec3 {
        self.grid.map_to_world(cell)
    }

    pub fn is_in_bounds(&self, cell: Vec3i) -> bool {
        self.grid.is_in_bounds(cell)
    }

    pub fn is_obstructed(&self, cell: Vec3i) -> bool {
        self.grid.is_obstructed(cell)
    }

    /// World position of the free cell nearest to `world`, by breadth-first distance.
    pub fn find_closest_free(&self, world: Vec3) -> Option<Vec3> {
        let start = self.grid.world_to_map(world);
        let found = self.grid.find_closest_free_cell(start);
        if found.is_none() {
            debug!("No closest free cell found near {world:?}");
        }
        found.map(|cell| self.grid.map_to_world(cell))
    }

    /// Random free (`open`) or obstructed cell.
    pub fn generate_map_coordinates<R: Rng + ?Sized>(&self, rng: &mut R, open: bool) -> Option<Vec3i> {
        self.grid.random_cell(rng, open)
    }

    /// World position of a random free (`open`) or obstructed cell.
    pub fn generate_world_coordinate<R: Rng + ?Sized>(&self, rng: &mut R, open: bool) -> Option<Vec3> {
        self.generate_map_coordinates(rng, open)
            .map(|cell| self.grid.map_to_world(cell))
    }

    /// Starts a path search using the configured speed.
    pub fn find_path(&self, start: Vec3, goal: Vec3) -> PathRequest {
        self.find_path_with_speed(start, goal, self.config.speed)
    }

    /// Starts a path search that expands `speed` cells per poll.
    pub fn find_path_with_speed(&self, start: Vec3, goal: Vec3, speed: u32) -> PathRequest {
        let map_start = self.grid.world_to_map(start);
        let map_goal = self.grid.world_to_map(goal);
        PathRequest {
            search: AStarSearch::new(map_start, map_goal, speed, self.config.perturbation),
        }
    }

    /// Runs a search to completion within the current call.
    pub fn find_path_blocking<R: Rng + ?Sized>(
        &self,
        start: Vec3,
        goal: Vec3,
        rng: &mut R,
    ) -> Option<Vec<Vec3>> {
        let mut request = self.find_path(start, goal);
        loop {
            if let PathPoll::Ready(path) = request.poll(self, rng) {
                return path;
            }
        }
    }

    fn transform_path(&self, cells: &[Vec3i]) -> Vec<Vec3> {
        cells.iter().map(|cell| self.grid.map_to_world(*cell)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{utils, Aabb, BoxWorld, EmptyWorld};

    fn deterministic_config() -> PathfinderConfig {
        PathfinderConfig {
            width: 10.0,
            height: 2.0,
            depth: 10.0,
            resolution: 1,
            speed: 4,
            perturbation: false,
        }
    }

    #[test]
    fn test_path_endpoints_are_world_cells() {
        let pathfinder = Pathfinder::initialize(Vec3::zero(), deterministic_config(), &EmptyWorld);
        let mut rng = utils::create_rng(11);

        let start = Vec3::new(-4.0, 0.0, -4.0);
        let goal = Vec3::new(3.0, 0.0, -4.0);
        let path = pathfinder.find_path_blocking(start, goal, &mut rng).unwrap();

        assert_eq!(path.first(), Some(&start));
        assert_eq!(path.last(), Some(&goal));
        assert_eq!(path.len(), 8);
    }

    #[test]
    fn test_polling_takes_several_ticks() {
        let pathfinder = Pathfinder::initialize(Vec3::zero(), deterministic_config(), &EmptyWorld);
        let mut rng = utils::create_rng(12);
        let mut request = pathfinder.find_path_with_speed(
            Vec3::new(-5.0, 0.0, -5.0),
            Vec3::new(4.0, 0.0, 4.0),
            2,
        );

        assert_eq!(request.poll(&pathfinder, &mut rng), PathPoll::Pending);
        let mut polls = 1;
        let path = loop {
            polls += 1;
            if let PathPoll::Ready(path) = request.poll(&pathfinder, &mut rng) {
                break path;
            }
        };
        assert!(polls > 2);
        assert!(request.is_finished());
        assert_eq!(path.map(|p| p.len()), Some(19));
    }

    #[test]
    fn test_independent_requests_do_not_interfere() {
        let pathfinder = Pathfinder::initialize(Vec3::zero(), deterministic_config(), &EmptyWorld);
        let mut rng = utils::create_rng(13);

        let mut a = pathfinder.find_path(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0));
        let mut b = pathfinder.find_path(Vec3::new(0.0, 0.0, -5.0), Vec3::new(0.0, 0.0, 4.0));

        let mut result_a = None;
        let mut result_b = None;
        while result_a.is_none() || result_b.is_none() {
            if result_a.is_none() {
                if let PathPoll::Ready(path) = a.poll(&pathfinder, &mut rng) {
                    result_a = Some(path);
                }
            }
            if result_b.is_none() {
                if let PathPoll::Ready(path) = b.poll(&pathfinder, &mut rng) {
                    result_b = Some(path);
                }
            }
        }

        let path_a = result_a.flatten().unwrap();
        let path_b = result_b.flatten().unwrap();
        assert_eq!(path_a.last(), Some(&Vec3::new(4.0, 0.0, 0.0)));
        assert_eq!(path_b.last(), Some(&Vec3::new(0.0, 0.0, 4.0)));
    }

    #[test]
    fn test_find_closest_free_inside_wall() {
        let world = BoxWorld::new().with_box(Aabb::new(
            Vec3::new(-0.2, -1.0, -6.0),
            Vec3::new(1.2, 5.0, 6.0),
        ));
        let pathfinder = Pathfinder::initialize(Vec3::zero(), deterministic_config(), &world);

        // Cells at x = 0 and x = 1 are inside the wall
        assert!(pathfinder.is_obstructed(pathfinder.world_to_map(Vec3::new(0.0, 0.0, 0.0))));
        let free = pathfinder.find_closest_free(Vec3::new(0.0, 0.0, 0.0)).unwrap();
        assert_eq!(free, Vec3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn test_generate_world_coordinate_is_free() {
        let world = BoxWorld::new().with_box(Aabb::new(
            Vec3::new(-6.0, -1.0, -6.0),
            Vec3::new(0.5, 5.0, 6.0),
        ));
        let pathfinder = Pathfinder::initialize(Vec3::zero(), deterministic_config(), &world);
        let mut rng = utils::create_rng(14);

        for _ in 0..20 {
            let point = pathfinder.generate_world_coordinate(&mut rng, true).unwrap();
            assert!(!pathfinder.is_obstructed(pathfinder.world_to_map(point)));
        }
    }
}
