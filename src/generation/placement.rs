//! # Placement Requests
//!
//! Generation does not spawn entities itself. Every door, staircase, key,
//! actor and item is emitted as a request the game layer turns into real
//! objects once the floor is loaded.

use crate::{DoorKind, Level, Position, Room, TerrainType};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Which way a staircase leads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StairDirection {
    Up,
    Down,
}

/// An entity the game layer should create on the generated floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementRequest {
    Door {
        position: Position,
        door: DoorKind,
        room_id: u32,
    },
    Staircase {
        position: Position,
        direction: StairDirection,
    },
    /// A key opening the locked or boss door of `unlocks_room`
    Key {
        position: Position,
        unlocks_room: u32,
    },
    Actor {
        position: Position,
        actor: String,
    },
    Item {
        position: Position,
        item_id: String,
    },
}

impl PlacementRequest {
    pub fn position(&self) -> Position {
        match self {
            PlacementRequest::Door { position, .. }
            | PlacementRequest::Staircase { position, .. }
            | PlacementRequest::Key { position, .. }
            | PlacementRequest::Actor { position, .. }
            | PlacementRequest::Item { position, .. } => *position,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PlacementRequest::Door { .. } => "door",
            PlacementRequest::Staircase { .. } => "staircase",
            PlacementRequest::Key { .. } => "key",
            PlacementRequest::Actor { .. } => "actor",
            PlacementRequest::Item { .. } => "item",
        }
    }
}

/// Ordered list of requests collected during generation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementQueue {
    requests: Vec<PlacementRequest>,
}

impl PlacementQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: PlacementRequest) {
        self.requests.push(request);
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacementRequest> {
        self.requests.iter()
    }

    /// Whether any request already targets `pos`.
    pub fn is_occupied(&self, pos: Position) -> bool {
        self.requests.iter().any(|request| request.position() == pos)
    }

    pub fn into_vec(self) -> Vec<PlacementRequest> {
        self.requests
    }
}

/// A finished floor and the entities to place on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFloor {
    pub level: Level,
    pub requests: Vec<PlacementRequest>,
}

impl GeneratedFloor {
    /// Key requests, in placement order.
    pub fn keys(&self) -> impl Iterator<Item = (Position, u32)> + '_ {
        self.requests.iter().filter_map(|request| match request {
            PlacementRequest::Key {
                position,
                unlocks_room,
            } => Some((*position, *unlocks_room)),
            _ => None,
        })
    }

    pub fn count(&self, label: &str) -> usize {
        self.requests
            .iter()
            .filter(|request| request.label() == label)
            .count()
    }

    pub fn to_json(&self) -> crate::DelveResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Draws interior tiles of `room` until one is plain floor and `is_free`.
///
/// Gives up after `attempts` draws.
pub fn random_free_tile(
    level: &Level,
    room: &Room,
    attempts: u32,
    rng: &mut StdRng,
    is_free: impl Fn(Position) -> bool,
) -> Option<Position> {
    let interior = room.floor_positions();
    for _ in 0..attempts {
        let pos = *interior.choose(rng)?;
        if level.terrain_at(pos) == Some(TerrainType::Floor) && is_free(pos) {
            return Some(pos);
        }
    }
    None
}
