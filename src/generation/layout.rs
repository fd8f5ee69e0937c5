//! # Level Layout
//!
//! The state one generation run builds up: the world-tile occupancy map, the
//! placed rooms, and the door graph between them.
//!
//! Doors are stored in an arena and referred to by index. The registry maps a
//! door's [`DoorKey`] to its index, so two rooms that compute a door on the
//! same shared tile edge always end up with the same door.

use crate::{config, EntityHandle, Face, Transform, Vec2i};
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type RoomId = usize;
pub type DoorId = usize;

/// Square occupancy grid over world tiles, centred on tile (0, 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileMap {
    size: usize,
    center: Vec2i,
    cells: Vec<bool>,
}

impl TileMap {
    /// Creates an empty map. The edge length is clamped to
    /// `1..=config::MAX_MAP_SIZE`.
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, config::MAX_MAP_SIZE);
        let half = (size / 2) as i32;
        Self {
            size,
            center: Vec2i::new(half, half),
            cells: vec![false; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    fn index(&self, tile: Vec2i) -> Option<usize> {
        let x = tile.x.checked_add(self.center.x)?;
        let y = tile.y.checked_add(self.center.y)?;
        let size = self.size as i32;
        if x < 0 || y < 0 || x >= size || y >= size {
            return None;
        }
        Some(y as usize * self.size + x as usize)
    }

    /// Checks a world tile. Tiles off the map count as occupied.
    pub fn is_occupied(&self, tile: Vec2i) -> bool {
        self.index(tile).map_or(true, |index| self.cells[index])
    }

    /// Marks a world tile occupied. Returns false if it lies off the map.
    pub fn occupy(&mut self, tile: Vec2i) -> bool {
        match self.index(tile) {
            Some(index) => {
                self.cells[index] = true;
                true
            }
            None => false,
        }
    }

    /// Checks whether any footprint tile, translated to `origin`, is already taken.
    pub fn is_occluded(&self, origin: Vec2i, tiles: &[Vec2i]) -> bool {
        tiles.iter().any(|tile| self.is_occupied(origin + *tile))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }

    /// Renders occupied tiles as `+`, north row first, skipping empty rows.
    pub fn ascii(&self) -> String {
        let mut out = String::new();
        for row in self.cells.chunks(self.size).rev() {
            if !row.iter().any(|cell| *cell) {
                continue;
            }
            let line: String = row.iter().map(|cell| if *cell { '+' } else { ' ' }).collect();
            out.push_str(line.trim_end());
            out.push('\n');
        }
        out
    }
}

/// Exact identity of a door position: twice the door's tile plus its face step.
///
/// Both rooms sharing an edge produce the same key, whichever side computes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DoorKey(pub Vec2i);

impl DoorKey {
    pub fn new(tile: Vec2i, face: Face) -> Self {
        DoorKey(tile * 2 + face.to_adjacent())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorState {
    /// One room attached; candidate for growth
    Free,
    /// Two rooms met here without passing through it; a cycle candidate
    Possible,
    /// Spawned as a real door
    Materialized,
    /// Replaced by walls and removed from the registry
    Sealed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub template: usize,
    pub name: String,
    pub origin: Vec2i,
    /// Clockwise rotation in degrees
    pub rotation: u32,
    /// Tree depth from the entry room
    pub depth: u32,
    /// Footprint in world tiles
    pub tiles: Vec<Vec2i>,
    pub doors: Vec<DoorId>,
    pub entity: Option<EntityHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Door {
    pub id: DoorId,
    /// Owning room first; the second slot fills when another room attaches
    pub rooms: [Option<RoomId>; 2],
    /// World tile on the owning room's side
    pub tile: Vec2i,
    /// Face on the owning room's side
    pub face: Face,
    pub key: DoorKey,
    pub prefab: Option<String>,
    pub transform: Transform,
    pub state: DoorState,
    pub entity: Option<EntityHandle>,
}

impl Door {
    pub fn is_free(&self) -> bool {
        self.rooms[1].is_none()
    }

    pub fn connects(&self, room: RoomId) -> bool {
        self.rooms.contains(&Some(room))
    }
}

/// Rooms, doors and occupancy for one generation run.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    #[serde(skip)]
    map: TileMap,
    rooms: Vec<Room>,
    doors: Vec<Door>,
    #[serde(skip)]
    registry: HashMap<DoorKey, DoorId>,
    free: Vec<DoorId>,
    possible: Vec<DoorId>,
    instances: Vec<u32>,
}

impl Layout {
    pub fn new(map_size: usize, template_count: usize) -> Self {
        Self {
            map: TileMap::new(map_size),
            rooms: Vec::new(),
            doors: Vec::new(),
            registry: HashMap::new(),
            free: Vec::new(),
            possible: Vec::new(),
            instances: vec![0; template_count],
        }
    }

    pub fn tile_map(&self) -> &TileMap {
        &self.map
    }

    pub fn rooms(&self) -> &[Room] {
        &self.rooms
    }

    pub fn room(&self, id: RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// Every door ever created, sealed ones included.
    pub fn doors(&self) -> &[Door] {
        &self.doors
    }

    pub fn door(&self, id: DoorId) -> Option<&Door> {
        self.doors.get(id)
    }

    /// Doors currently in the registry.
    pub fn registered_doors(&self) -> impl Iterator<Item = &Door> + '_ {
        self.registry.values().filter_map(|id| self.doors.get(*id))
    }

    pub fn door_at(&self, key: DoorKey) -> Option<&Door> {
        self.registry.get(&key).and_then(|id| self.doors.get(*id))
    }

    pub fn free_doors(&self) -> &[DoorId] {
        &self.free
    }

    pub fn possible_doors(&self) -> &[DoorId] {
        &self.possible
    }

    /// Rooms placed so far for template `template`.
    pub fn instances(&self, template: usize) -> u32 {
        self.instances.get(template).copied().unwrap_or(0)
    }

    pub fn ascii_map(&self) -> String {
        self.map.ascii()
    }

    pub(crate) fn add_room(&mut self, mut room: Room) -> RoomId {
        let id = self.rooms.len();
        room.id = id;
        for tile in &room.tiles {
            if !self.map.occupy(*tile) {
                warn!("Room {:?} tile {tile:?} lies off the tile map", room.name);
            }
        }
        if let Some(count) = self.instances.get_mut(room.template) {
            *count += 1;
        }
        self.rooms.push(room);
        id
    }

    /// Creates a free door owned by `room` and registers it.
    pub(crate) fn add_free_door(&mut self, mut door: Door) -> DoorId {
        let id = self.doors.len();
        door.id = id;
        door.state = DoorState::Free;
        self.registry.insert(door.key, id);
        if let Some(owner) = door.rooms[0].and_then(|room| self.rooms.get_mut(room)) {
            owner.doors.push(id);
        }
        self.free.push(id);
        self.doors.push(door);
        id
    }

    pub(crate) fn registered(&self, key: DoorKey) -> Option<DoorId> {
        self.registry.get(&key).copied()
    }

    /// Attaches `room` as the second room of a door.
    pub(crate) fn attach(&mut self, door: DoorId, room: RoomId) {
        if let Some(entry) = self.doors.get_mut(door) {
            entry.rooms[1] = Some(room);
        }
        if let Some(entry) = self.rooms.get_mut(room) {
            entry.doors.push(door);
        }
        self.free.retain(|id| *id != door);
    }

    /// Turns a free door into a cycle candidate shared with `room`.
    pub(crate) fn mark_possible(&mut self, door: DoorId, room: RoomId) {
        self.attach(door, room);
        if let Some(entry) = self.doors.get_mut(door) {
            entry.state = DoorState::Possible;
        }
        self.possible.push(door);
    }

    pub(crate) fn door_mut(&mut self, id: DoorId) -> Option<&mut Door> {
        self.doors.get_mut(id)
    }

    pub(crate) fn take_possible(&mut self) -> Vec<DoorId> {
        std::mem::take(&mut self.possible)
    }

    pub(crate) fn take_free(&mut self) -> Vec<DoorId> {
        std::mem::take(&mut self.free)
    }

    /// Seals a door: drops it from the registry and from every attached room.
    pub(crate) fn seal(&mut self, id: DoorId) {
        let Some(door) = self.doors.get_mut(id) else {
            return;
        };
        door.state = DoorState::Sealed;
        let key = door.key;
        let rooms = door.rooms;

        self.registry.remove(&key);
        for room in rooms.into_iter().flatten() {
            if let Some(room) = self.rooms.get_mut(room) {
                room.doors.retain(|door| *door != id);
            }
        }
    }
}
