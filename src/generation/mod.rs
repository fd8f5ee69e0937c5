//! # Generation Module
//!
//! Procedural raid-level generation.
//!
//! A level is grown as a tree of rooms joined by doors, starting from a fixed
//! entry room. Room types come from a [`TemplateSet`]; the growth itself is run
//! by [`LevelGenerator`] as a resumable [`GenerationRun`] so a scheduler can
//! spread it over several ticks. Entities are placed only through an
//! [`Instantiator`].

pub mod instantiate;
pub mod layout;
pub mod level;
pub mod templates;

pub use instantiate::*;
pub use layout::*;
pub use level::*;
pub use templates::*;

use crate::{config, RaidError, RaidResult, Vec2i, Vec3};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// World plane the tile grid is laid out in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Plane {
    /// Tiles on X/Y, rotations about Z
    XY,
    /// Tiles on X/Z, rotations about Y
    #[default]
    XZ,
}

impl Plane {
    /// Maps a 2D grid position into world space.
    pub fn to_world(self, x: f32, y: f32) -> Vec3 {
        match self {
            Plane::XY => Vec3::new(x, y, 0.0),
            Plane::XZ => Vec3::new(x, 0.0, y),
        }
    }

    /// World position of a tile's origin.
    pub fn tile_to_world(self, tile: Vec2i, scale: f32) -> Vec3 {
        self.to_world(tile.x as f32 * scale, tile.y as f32 * scale)
    }

    /// Euler rotation of a room turned `degrees` clockwise.
    pub fn room_rotation(self, degrees: f32) -> Vec3 {
        match self {
            Plane::XY => Vec3::new(0.0, 0.0, -degrees),
            Plane::XZ => Vec3::new(0.0, degrees, 0.0),
        }
    }

    /// Euler rotation of a door on a world-space face.
    pub fn door_rotation(self, face: Face) -> Vec3 {
        let quarter = face.index() as f32 * 90.0;
        match self {
            Plane::XY => Vec3::new(0.0, 0.0, quarter),
            Plane::XZ => Vec3::new(0.0, quarter + 90.0, 0.0),
        }
    }

    /// The same rotation turned half way round the plane's normal.
    pub fn flipped(self, rotation: Vec3) -> Vec3 {
        match self {
            Plane::XY => rotation + Vec3::new(0.0, 0.0, 180.0),
            Plane::XZ => rotation + Vec3::new(0.0, 180.0, 0.0),
        }
    }
}

/// Configuration for one level generation run.
///
/// # Examples
///
/// ```
/// use raidcore::GenerationConfig;
///
/// let config = GenerationConfig::new(7);
/// assert_eq!(config.cycle_probability, 0.1);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Random seed for reproducible generation
    pub seed: u64,
    /// Rooms to add after the entry room
    pub spawn_quota: u32,
    /// Chance that a cycle door is opened rather than walled (0.0 to 1.0)
    pub cycle_probability: f32,
    /// Bias of free-door selection toward shallow doors
    pub depth_weight: f64,
    /// World units per tile
    pub world_scale: f32,
    pub plane: Plane,
    /// Edge length of the square world-tile map
    pub map_size: usize,
    /// Idle ticks between room spawns
    pub spawn_interval_ticks: u32,
    /// When false a run completes immediately without placing anything
    pub enabled: bool,
    pub door_prefab: String,
    /// Prefab for the door a room was entered through
    pub path_door_prefab: String,
    pub wall_prefab: String,
}

impl GenerationConfig {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            spawn_quota: 20,
            cycle_probability: 0.1,
            depth_weight: 1.0,
            world_scale: 1.0,
            plane: Plane::XZ,
            map_size: config::DEFAULT_MAP_SIZE,
            spawn_interval_ticks: 0,
            enabled: true,
            door_prefab: "door".to_string(),
            path_door_prefab: "path_door".to_string(),
            wall_prefab: "wall".to_string(),
        }
    }

    /// Creates a configuration for testing with small levels.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            spawn_quota: 6,
            depth_weight: 0.5,
            map_size: 40,
            ..Self::new(seed)
        }
    }

    /// Checks value ranges.
    pub fn validate(&self) -> RaidResult<()> {
        if !(0.0..=1.0).contains(&self.cycle_probability) {
            return Err(RaidError::InvalidConfig(format!(
                "cycle_probability {} is outside 0..=1",
                self.cycle_probability
            )));
        }
        if !self.depth_weight.is_finite() || self.depth_weight < 0.0 {
            return Err(RaidError::InvalidConfig(format!(
                "depth_weight {} must be finite and non-negative",
                self.depth_weight
            )));
        }
        if self.world_scale.is_nan() || self.world_scale <= 0.0 {
            return Err(RaidError::InvalidConfig(format!(
                "world_scale {} must be positive",
                self.world_scale
            )));
        }
        if self.map_size == 0 || self.map_size > config::MAX_MAP_SIZE {
            return Err(RaidError::InvalidConfig(format!(
                "map_size {} must be between 1 and {}",
                self.map_size,
                config::MAX_MAP_SIZE
            )));
        }
        Ok(())
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// Trait for procedural generators.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random number generator.
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> RaidResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T, config: &GenerationConfig) -> RaidResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}
