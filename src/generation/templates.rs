//! # Room Templates
//!
//! Immutable room and door templates as loaded from configuration data, and
//! the rotatable per-run copies the generator works with.
//!
//! Tiles are integer offsets from a room's origin tile. A door sits on one
//! face of one of its room's tiles. Rotating a room a quarter turn clockwise
//! maps every tile `(x, y)` to `(y, -x)` and every door face `F` to
//! `(F + 1) mod 4`, so four rotations always restore the original.

use crate::{RaidError, RaidResult, Vec2i};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Side of a tile a door is placed on, in clockwise order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Face {
    #[default]
    North,
    East,
    South,
    West,
}

impl Face {
    pub const ALL: [Face; 4] = [Face::North, Face::East, Face::South, Face::West];

    /// Position in the clockwise cycle, North = 0.
    pub fn index(self) -> u32 {
        match self {
            Face::North => 0,
            Face::East => 1,
            Face::South => 2,
            Face::West => 3,
        }
    }

    /// Face at `index` in the clockwise cycle, wrapping around.
    pub fn from_index(index: u32) -> Face {
        Self::ALL[(index % 4) as usize]
    }

    pub fn opposite(self) -> Face {
        Face::from_index(self.index() + 2)
    }

    pub fn rotated_clockwise(self) -> Face {
        Face::from_index(self.index() + 1)
    }

    /// Unit step from a tile to the neighbour on this face.
    pub fn to_adjacent(self) -> Vec2i {
        match self {
            Face::North => Vec2i::new(0, 1),
            Face::East => Vec2i::new(1, 0),
            Face::South => Vec2i::new(0, -1),
            Face::West => Vec2i::new(-1, 0),
        }
    }

    /// Quarter turns clockwise that bring a door on this face opposite a door on `free`.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidcore::Face;
    ///
    /// // A free door facing north needs a south-facing door on the new room
    /// assert_eq!(Face::South.rotations_to_match(Face::North), 0);
    /// assert_eq!(Face::West.rotations_to_match(Face::North), 3);
    /// ```
    pub fn rotations_to_match(self, free: Face) -> u32 {
        (free.opposite().index() + 4 - self.index()) % 4
    }
}

/// A door slot on a room template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoorTemplate {
    pub local_tile: Vec2i,
    pub face: Face,
    /// Prefab used when this door is materialised as a cycle door
    pub prefab: Option<String>,
}

/// A room type the generator can place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomTemplate {
    pub name: String,
    /// Footprint as offsets from the origin tile
    pub tiles: Vec<Vec2i>,
    pub doors: Vec<DoorTemplate>,
    /// Prefab handed to the instantiator for rooms of this type
    pub prefab: String,
    /// Whether the generator may pick this template for new rooms
    pub selectable: bool,
    pub selection_weight: f32,
    /// Shallowest tree depth this template may appear at (0 = unbounded)
    pub min_depth: u32,
    /// Deepest tree depth this template may appear at (0 = unbounded)
    pub max_depth: u32,
    /// Instances the run tries to reach after the main pass (0 = none required)
    pub min_instances: u32,
    /// Instance cap (0 = unbounded)
    pub max_instances: u32,
}

impl Default for RoomTemplate {
    fn default() -> Self {
        Self {
            name: String::new(),
            tiles: vec![Vec2i::zero()],
            doors: Vec::new(),
            prefab: String::new(),
            selectable: true,
            selection_weight: 1.0,
            min_depth: 0,
            max_depth: 0,
            min_instances: 0,
            max_instances: 0,
        }
    }
}

/// A reason a template cannot be selected.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateIssue {
    #[error("selection weight is not positive")]
    NonPositiveWeight,

    #[error("selection weight is not finite")]
    NonFiniteWeight,

    #[error("min instances exceed max instances")]
    MinInstancesAboveMax,

    #[error("min depth exceeds max depth")]
    MinDepthAboveMax,

    #[error("footprint has no tiles")]
    EmptyFootprint,
}

impl RoomTemplate {
    /// Creates a selectable template with the given footprint and no doors.
    pub fn new(name: &str, tiles: Vec<Vec2i>) -> Self {
        Self {
            name: name.to_string(),
            prefab: name.to_string(),
            tiles,
            ..Self::default()
        }
    }

    pub fn with_door(mut self, local_tile: Vec2i, face: Face) -> Self {
        self.doors.push(DoorTemplate {
            local_tile,
            face,
            prefab: None,
        });
        self
    }

    pub fn with_weight(mut self, weight: f32) -> Self {
        self.selection_weight = weight;
        self
    }

    pub fn with_depth(mut self, min_depth: u32, max_depth: u32) -> Self {
        self.min_depth = min_depth;
        self.max_depth = max_depth;
        self
    }

    pub fn with_instances(mut self, min_instances: u32, max_instances: u32) -> Self {
        self.min_instances = min_instances;
        self.max_instances = max_instances;
        self
    }

    pub fn not_selectable(mut self) -> Self {
        self.selectable = false;
        self
    }

    /// Lists everything that would make this template unusable for selection.
    pub fn issues(&self) -> Vec<TemplateIssue> {
        let mut issues = Vec::new();
        if self.selection_weight <= 0.0 || self.selection_weight.is_nan() {
            issues.push(TemplateIssue::NonPositiveWeight);
        } else if self.selection_weight.is_infinite() {
            issues.push(TemplateIssue::NonFiniteWeight);
        }
        if self.min_instances > 0 && self.max_instances > 0 && self.min_instances > self.max_instances {
            issues.push(TemplateIssue::MinInstancesAboveMax);
        }
        if self.max_depth > 0 && self.min_depth > self.max_depth {
            issues.push(TemplateIssue::MinDepthAboveMax);
        }
        if self.tiles.is_empty() {
            issues.push(TemplateIssue::EmptyFootprint);
        }
        issues
    }

    /// Checks whether a room of this type may sit at tree depth `depth`.
    pub fn allows_depth(&self, depth: u32) -> bool {
        let too_shallow = self.min_depth > 0 && depth < self.min_depth;
        let too_deep = self.max_depth > 0 && depth > self.max_depth;
        !(too_shallow || too_deep)
    }
}

/// The room templates for one level. Template 0 is the entry room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateSet {
    pub rooms: Vec<RoomTemplate>,
}

impl TemplateSet {
    /// Creates a template set, rejecting an empty one.
    pub fn new(rooms: Vec<RoomTemplate>) -> RaidResult<Self> {
        if rooms.is_empty() {
            return Err(RaidError::InvalidConfig(
                "template set has no entry room".to_string(),
            ));
        }
        Ok(Self { rooms })
    }

    /// Parses a JSON array of room templates.
    pub fn from_json_str(json: &str) -> RaidResult<Self> {
        let rooms: Vec<RoomTemplate> = serde_json::from_str(json)?;
        debug!("Parsed {} room templates", rooms.len());
        Self::new(rooms)
    }

    /// Loads a JSON array of room templates from disk.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> RaidResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let set = Self::from_json_str(&json)?;
        info!("Loaded {} room templates from {}", set.len(), path.display());
        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&RoomTemplate> {
        self.rooms.get(index)
    }

    /// Per-template selectability after validation.
    ///
    /// A template that asks to be selectable but is malformed is demoted,
    /// with a warning naming every problem found.
    pub fn selectable_mask(&self) -> Vec<bool> {
        self.rooms
            .iter()
            .map(|template| {
                if !template.selectable {
                    return false;
                }
                let issues = template.issues();
                for issue in &issues {
                    warn!("Room template {:?}: {issue}; demoting to non-selectable", template.name);
                }
                issues.is_empty()
            })
            .collect()
    }

    /// A small built-in set of raid rooms.
    ///
    /// # Examples
    ///
    /// ```
    /// use raidcore::TemplateSet;
    ///
    /// let set = TemplateSet::demo();
    /// assert!(!set.rooms[0].selectable);
    /// assert!(set.selectable_mask().iter().skip(1).all(|s| *s));
    /// ```
    pub fn demo() -> Self {
        let square = |size: i32| {
            let mut tiles = Vec::new();
            for x in 0..size {
                for y in 0..size {
                    tiles.push(Vec2i::new(x, y));
                }
            }
            tiles
        };

        let entry = RoomTemplate::new("entry", square(2))
            .with_door(Vec2i::new(0, 1), Face::North)
            .with_door(Vec2i::new(1, 1), Face::East)
            .with_door(Vec2i::new(1, 0), Face::South)
            .with_door(Vec2i::new(0, 0), Face::West)
            .not_selectable();

        let corridor = RoomTemplate::new("corridor", vec![Vec2i::new(0, 0), Vec2i::new(0, 1), Vec2i::new(0, 2)])
            .with_door(Vec2i::new(0, 0), Face::South)
            .with_door(Vec2i::new(0, 2), Face::North)
            .with_weight(3.0);

        let hall = RoomTemplate::new("hall", square(3))
            .with_door(Vec2i::new(1, 2), Face::North)
            .with_door(Vec2i::new(2, 1), Face::East)
            .with_door(Vec2i::new(1, 0), Face::South)
            .with_door(Vec2i::new(0, 1), Face::West)
            .with_weight(2.0);

        let junction = RoomTemplate::new("junction", vec![Vec2i::zero()])
            .with_door(Vec2i::zero(), Face::North)
            .with_door(Vec2i::zero(), Face::East)
            .with_door(Vec2i::zero(), Face::South)
            .with_door(Vec2i::zero(), Face::West)
            .with_weight(2.0)
            .with_instances(0, 6);

        let vault = RoomTemplate::new("vault", square(2))
            .with_door(Vec2i::new(0, 0), Face::South)
            .with_depth(3, 0)
            .with_instances(1, 2);

        let armory = RoomTemplate::new(
            "armory",
            vec![Vec2i::new(0, 0), Vec2i::new(0, 1), Vec2i::new(1, 0)],
        )
        .with_door(Vec2i::new(0, 1), Face::North)
        .with_door(Vec2i::new(1, 0), Face::East)
        .with_door(Vec2i::new(0, 0), Face::South)
        .with_weight(1.5)
        .with_depth(0, 6);

        Self {
            rooms: vec![entry, corridor, hall, junction, vault, armory],
        }
    }
}

/// A door slot on a [`RoomConfig`], in the room's current orientation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoorConfig {
    pub local_tile: Vec2i,
    pub face: Face,
    pub prefab: Option<String>,
}

impl DoorConfig {
    pub fn rotate_clockwise(&mut self) {
        self.local_tile = self.local_tile.rotated_clockwise();
        self.face = self.face.rotated_clockwise();
    }
}

/// Per-run copy of a template's geometry that can be rotated freely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomConfig {
    /// Index of the source template
    pub template: usize,
    pub tiles: Vec<Vec2i>,
    pub doors: Vec<DoorConfig>,
    /// Quarter turns applied since the copy was taken, modulo 4
    pub quarter_turns: u32,
}

impl RoomConfig {
    pub fn from_template(template: usize, source: &RoomTemplate) -> Self {
        Self {
            template,
            tiles: source.tiles.clone(),
            doors: source
                .doors
                .iter()
                .map(|door| DoorConfig {
                    local_tile: door.local_tile,
                    face: door.face,
                    prefab: door.prefab.clone(),
                })
                .collect(),
            quarter_turns: 0,
        }
    }

    /// Rotates tiles and doors 90 degrees clockwise about the origin tile.
    pub fn rotate_clockwise(&mut self) {
        for tile in &mut self.tiles {
            *tile = tile.rotated_clockwise();
        }
        for door in &mut self.doors {
            door.rotate_clockwise();
        }
        self.quarter_turns = (self.quarter_turns + 1) % 4;
    }

    /// Copy rotated `turns` quarter turns clockwise.
    pub fn rotated(&self, turns: u32) -> Self {
        let mut rotated = self.clone();
        for _ in 0..turns % 4 {
            rotated.rotate_clockwise();
        }
        rotated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn l_shape() -> RoomTemplate {
        RoomTemplate::new("l", vec![Vec2i::new(0, 0), Vec2i::new(1, 0), Vec2i::new(0, 2)])
            .with_door(Vec2i::new(1, 0), Face::East)
            .with_door(Vec2i::new(0, 2), Face::North)
    }

    #[test]
    fn test_face_cycle() {
        assert_eq!(Face::West.rotated_clockwise(), Face::North);
        assert_eq!(Face::East.opposite(), Face::West);
        assert_eq!(Face::from_index(6), Face::South);
        for face in Face::ALL {
            assert_eq!(face.to_adjacent() + face.opposite().to_adjacent(), Vec2i::zero());
        }
    }

    #[test]
    fn test_rotation_matches_doors() {
        for free in Face::ALL {
            for door in Face::ALL {
                let mut rotated = door;
                for _ in 0..door.rotations_to_match(free) {
                    rotated = rotated.rotated_clockwise();
                }
                assert_eq!(rotated, free.opposite());
            }
        }
    }

    #[test]
    fn test_single_rotation() {
        let config = RoomConfig::from_template(0, &l_shape()).rotated(1);
        assert_eq!(config.tiles, vec![Vec2i::new(0, 0), Vec2i::new(0, -1), Vec2i::new(2, 0)]);
        assert_eq!(config.doors[0].local_tile, Vec2i::new(0, -1));
        assert_eq!(config.doors[0].face, Face::South);
        assert_eq!(config.doors[1].face, Face::East);
        assert_eq!(config.quarter_turns, 1);
    }

    #[test]
    fn test_four_rotations_restore_config() {
        let original = RoomConfig::from_template(3, &l_shape());
        let mut config = original.clone();
        for _ in 0..4 {
            config.rotate_clockwise();
        }
        assert_eq!(config, original);
        assert_eq!(original.rotated(4), original);
    }

    #[test]
    fn test_template_issues() {
        assert!(l_shape().issues().is_empty());
        assert_eq!(
            l_shape().with_weight(0.0).issues(),
            vec![TemplateIssue::NonPositiveWeight]
        );
        assert_eq!(
            l_shape().with_weight(f32::INFINITY).issues(),
            vec![TemplateIssue::NonFiniteWeight]
        );
        assert_eq!(
            l_shape().with_instances(3, 2).issues(),
            vec![TemplateIssue::MinInstancesAboveMax]
        );
        assert!(l_shape().with_instances(3, 0).issues().is_empty());
        assert_eq!(
            l_shape().with_depth(5, 2).issues(),
            vec![TemplateIssue::MinDepthAboveMax]
        );
        assert!(l_shape().with_depth(5, 0).issues().is_empty());
    }

    #[test]
    fn test_selectable_mask_demotes_malformed() {
        let set = TemplateSet::new(vec![
            l_shape().not_selectable(),
            l_shape(),
            l_shape().with_weight(-1.0),
            l_shape().with_depth(4, 1),
        ])
        .unwrap();
        assert_eq!(set.selectable_mask(), vec![false, true, false, false]);
    }

    #[test]
    fn test_allows_depth() {
        let template = l_shape().with_depth(2, 4);
        assert!(!template.allows_depth(1));
        assert!(template.allows_depth(2));
        assert!(template.allows_depth(4));
        assert!(!template.allows_depth(5));
        assert!(l_shape().allows_depth(100));
    }

    #[test]
    fn test_json_defaults() {
        let set = TemplateSet::from_json_str(
            r#"[
                { "name": "entry", "tiles": [{ "x": 0, "y": 0 }],
                  "doors": [{ "local_tile": { "x": 0, "y": 0 }, "face": "North" }] },
                { "name": "side", "selection_weight": 2.5, "max_instances": 3 }
            ]"#,
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.rooms[0].selectable);
        assert_eq!(set.rooms[0].doors[0].face, Face::North);
        assert_eq!(set.rooms[1].tiles, vec![Vec2i::zero()]);
        assert_eq!(set.rooms[1].selection_weight, 2.5);
    }

    #[test]
    fn test_overflowing_json_weight_is_demoted() {
        let set = TemplateSet::from_json_str(
            r#"[
                { "name": "entry" },
                { "name": "huge", "selection_weight": 3e38 },
                { "name": "overflow", "selection_weight": 1e39 }
            ]"#,
        )
        .unwrap();
        assert!(set.rooms[2].selection_weight.is_infinite());
        assert_eq!(set.selectable_mask(), vec![true, true, false]);
    }

    #[test]
    fn test_empty_set_is_rejected() {
        assert!(matches!(
            TemplateSet::from_json_str("[]"),
            Err(RaidError::InvalidConfig(_))
        ));
        assert!(matches!(
            TemplateSet::from_json_str("{"),
            Err(RaidError::Serde(_))
        ));
    }
}
