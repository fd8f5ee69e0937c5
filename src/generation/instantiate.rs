//! # Instantiation
//!
//! The seam between the generator and whatever places real entities in a
//! scene. The generator only ever holds the opaque handles it gets back.

use crate::Vec3;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to a placed entity.
pub type EntityHandle = Uuid;

/// World placement: position plus Euler rotation in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
}

impl Transform {
    pub fn new(position: Vec3, rotation: Vec3) -> Self {
        Self { position, rotation }
    }
}

/// Places rooms, doors and walls on behalf of the generator.
pub trait Instantiator {
    fn spawn_room(&mut self, prefab: &str, transform: Transform) -> EntityHandle;

    fn spawn_door(&mut self, prefab: &str, transform: Transform) -> EntityHandle;

    fn spawn_wall(&mut self, prefab: &str, transform: Transform) -> EntityHandle;
}

/// What kind of entity a [`SpawnRecord`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnKind {
    Room,
    Door,
    Wall,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpawnRecord {
    pub handle: EntityHandle,
    pub kind: SpawnKind,
    pub prefab: String,
    pub transform: Transform,
}

/// Instantiator that only remembers what it was asked to spawn.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordingInstantiator {
    records: Vec<SpawnRecord>,
}

impl RecordingInstantiator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[SpawnRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<SpawnRecord> {
        self.records
    }

    /// Records of one kind, in spawn order.
    pub fn of_kind(&self, kind: SpawnKind) -> impl Iterator<Item = &SpawnRecord> + '_ {
        self.records.iter().filter(move |record| record.kind == kind)
    }

    pub fn count(&self, kind: SpawnKind) -> usize {
        self.of_kind(kind).count()
    }

    fn record(&mut self, kind: SpawnKind, prefab: &str, transform: Transform) -> EntityHandle {
        let handle = Uuid::new_v4();
        self.records.push(SpawnRecord {
            handle,
            kind,
            prefab: prefab.to_string(),
            transform,
        });
        handle
    }
}

impl Instantiator for RecordingInstantiator {
    fn spawn_room(&mut self, prefab: &str, transform: Transform) -> EntityHandle {
        self.record(SpawnKind::Room, prefab, transform)
    }

    fn spawn_door(&mut self, prefab: &str, transform: Transform) -> EntityHandle {
        self.record(SpawnKind::Door, prefab, transform)
    }

    fn spawn_wall(&mut self, prefab: &str, transform: Transform) -> EntityHandle {
        self.record(SpawnKind::Wall, prefab, transform)
    }
}
