//! # Raidcore
//!
//! Navigation and level generation for cooperative raid maps.
//!
//! ## Architecture Overview
//!
//! The crate is split into two independent systems that share a small
//! utilities layer:
//!
//! - **Navigation**: incremental A* over a voxel occupancy grid, plus a
//!   per-agent navigator that follows paths and emits steering vectors
//! - **Generation**: a door-graph level generator that grows rooms from
//!   templates, closes cycles, and seals dead ends
//! - **Utilities**: vector maths and seeded random selection
//!
//! Both systems do their work in small resumable steps, so a host game loop
//! can spread a long search or a large level over many frames. Neither system
//! talks to an engine directly: collision queries go through
//! [`CollisionWorld`] and entity placement goes through [`Instantiator`].

pub mod generation;
pub mod navigation;
pub mod utils;

pub use generation::*;
pub use navigation::*;
pub use utils::*;

/// Core error type for Raidcore.
#[derive(thiserror::Error, Debug)]
pub enum RaidError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run or layout is in a state the operation cannot handle
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the Raidcore codebase.
pub type RaidResult<T> = Result<T, RaidError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Search and generation limits.
pub mod config {
    /// Node expansions after which an A* search gives up
    pub const ASTAR_EXPANSION_LIMIT: u32 = 4000;

    /// Open-set size after which an A* search gives up
    pub const ASTAR_OPEN_SET_LIMIT: usize = 8000;

    /// Cells examined when snapping a blocked endpoint to the nearest free cell
    pub const CLOSEST_FREE_EXPANSION_LIMIT: usize = 10_000;

    /// Free-door picks per room before generation gives up
    pub const DOOR_SELECTION_LIMIT: u32 = 1000;

    /// Template picks per free door
    pub const CONFIG_SELECTION_LIMIT: u32 = 1000;

    /// Rooms the minimum-instance pass may try to add
    pub const MIN_INSTANCE_ITERATION_LIMIT: u32 = 100;

    /// Main-pass attempts allowed per room of spawn quota
    pub const MAIN_PASS_SAFETY_FACTOR: u32 = 10;

    /// Default edge length of the world-tile map
    pub const DEFAULT_MAP_SIZE: usize = 100;

    /// Largest world-tile map edge a generation run accepts
    pub const MAX_MAP_SIZE: usize = 4096;

    /// Largest number of cells an occupancy grid may hold
    pub const GRID_CELL_LIMIT: usize = 1 << 24;
}
