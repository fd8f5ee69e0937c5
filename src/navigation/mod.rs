//! # Navigation Module
//!
//! Voxel pathfinding for agents moving through a single room.
//!
//! A [`Pathfinder`] discretises a room volume into an [`OccupancyGrid`] and
//! serves incremental A* searches over it. A [`Navigator`] owns one agent's
//! path, drives its pending search a little every tick and turns the path into
//! a steering vector. Physics is reached only through [`CollisionWorld`].

pub mod astar;
pub mod grid;
pub mod navigator;
pub mod pathfinder;
pub mod physics;

pub use astar::*;
pub use grid::*;
pub use navigator::*;
pub use pathfinder::*;
pub use physics::*;

use crate::{config, RaidError, RaidResult};
use serde::{Deserialize, Serialize};

/// Configuration for building a room's pathfinder.
///
/// # Examples
///
/// ```
/// use raidcore::PathfinderConfig;
///
/// let config = PathfinderConfig::default();
/// assert_eq!(config.resolution, 1);
/// assert!(config.perturbation);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathfinderConfig {
    /// Room extent along X, centred on the room origin
    pub width: f32,
    /// Room extent upward along Y from the room origin
    pub height: f32,
    /// Room extent along Z, centred on the room origin
    pub depth: f32,
    /// World units per grid cell
    pub resolution: i32,
    /// A* expansions performed per poll before yielding
    pub speed: u32,
    /// Whether the heuristic carries random tie-break noise
    pub perturbation: bool,
}

impl PathfinderConfig {
    /// Creates the standard raid-room configuration.
    pub fn new() -> Self {
        Self {
            width: 30.0,
            height: 20.0,
            depth: 30.0,
            resolution: 1,
            speed: 50,
            perturbation: true,
        }
    }

    /// Creates a configuration with deterministic searches, for tests and tooling.
    pub fn deterministic() -> Self {
        Self {
            perturbation: false,
            ..Self::new()
        }
    }

    /// Checks that the room extents are finite and the grid they describe
    /// stays within [`config::GRID_CELL_LIMIT`] cells.
    pub fn validate(&self) -> RaidResult<()> {
        for (name, extent) in [("width", self.width), ("height", self.height), ("depth", self.depth)] {
            if !extent.is_finite() || extent < 0.0 {
                return Err(RaidError::InvalidConfig(format!(
                    "{name} {extent} must be finite and non-negative"
                )));
            }
        }
        if self.resolution < 1 {
            return Err(RaidError::InvalidConfig(format!(
                "resolution {} must be at least 1",
                self.resolution
            )));
        }

        let resolution = f64::from(self.resolution);
        let cells = [self.width, self.height, self.depth]
            .iter()
            .map(|extent| (f64::from(*extent) / resolution).floor().max(1.0))
            .product::<f64>();
        if cells > config::GRID_CELL_LIMIT as f64 {
            return Err(RaidError::InvalidConfig(format!(
                "room of {}x{}x{} at resolution {} needs {cells} cells, more than {}",
                self.width,
                self.height,
                self.depth,
                self.resolution,
                config::GRID_CELL_LIMIT
            )));
        }
        Ok(())
    }
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Steering parameters for a [`Navigator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigatorConfig {
    /// Output speed scale; also the distance under which the agent slows
    /// while closing in on its goal
    pub inertia: f32,
    /// Index into the remaining path the agent steers toward
    pub look_ahead: usize,
    /// Distance at which the look-ahead waypoint counts as reached
    pub leeway: f32,
}

impl NavigatorConfig {
    pub fn new() -> Self {
        Self {
            inertia: 6.0,
            look_ahead: 0,
            leeway: 1.0,
        }
    }
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self::new()
    }
}
