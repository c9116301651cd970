//! # Generation Module
//!
//! The dungeon-floor pipeline, one stage per submodule, plus the shared
//! configuration, room model and [`Generator`] trait.
//!
//! All randomness flows through a single [`StdRng`] created from
//! [`GenerationConfig::seed`], so identical inputs yield identical floors.

pub mod assign;
pub mod biome;
pub mod bsp;
pub mod corridors;
pub mod doors;
pub mod dungeon;
pub mod features;
pub mod graph;
pub mod keys;
pub mod placement;
pub mod reservation;
pub mod templates;

pub use assign::*;
pub use biome::*;
pub use bsp::*;
pub use corridors::*;
pub use doors::*;
pub use dungeon::*;
pub use features::*;
pub use graph::*;
pub use keys::*;
pub use placement::*;
pub use reservation::*;
pub use templates::*;

use crate::{config, DelveResult, Position, Rect};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Configuration for a single floor generation run.
///
/// Together with a [`BiomeDefinition`] and a [`TemplateRegistry`] this fully
/// determines the generated floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Random seed for reproducible generation
    pub seed: u64,
    /// Floor width in tiles
    pub width: u32,
    /// Floor height in tiles
    pub height: u32,
    /// Floor number, starting at 1
    pub floor: u32,
    /// Target recursion depth of the space partition
    pub bsp_depth: u32,
    /// Minimum room footprint (walls included)
    pub min_room_size: u32,
    /// Maximum room footprint (walls included)
    pub max_room_size: u32,
    /// Share of the room count that may become special rooms
    pub special_room_ratio: f64,
    /// Lower bound on the special room cap
    pub min_special_rooms: usize,
    /// Bounded retry count for free-tile searches
    pub placement_attempts: u32,
    /// Prefer key hosts reachable from the entrance without crossing a lock
    pub verify_key_reachability: bool,
}

impl GenerationConfig {
    /// Creates a default generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(7);
    /// assert!(config.min_room_size >= 5);
    /// assert!(config.max_room_size >= config.min_room_size);
    /// ```
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            width: config::DEFAULT_FLOOR_WIDTH,
            height: config::DEFAULT_FLOOR_HEIGHT,
            floor: 1,
            bsp_depth: config::DEFAULT_BSP_DEPTH,
            min_room_size: config::MIN_ROOM_SIZE,
            max_room_size: 12,
            special_room_ratio: config::SPECIAL_ROOM_RATIO,
            min_special_rooms: config::MIN_SPECIAL_ROOMS,
            placement_attempts: config::PLACEMENT_ATTEMPTS,
            verify_key_reachability: true,
        }
    }

    /// Creates a configuration for testing with smaller, simpler floors.
    pub fn for_testing(seed: u64) -> Self {
        Self {
            width: 30,
            height: 30,
            bsp_depth: 3,
            max_room_size: 9,
            ..Self::new(seed)
        }
    }

    /// Creates a configuration for large, densely partitioned floors.
    pub fn for_detailed_generation(seed: u64) -> Self {
        Self {
            width: 80,
            height: 50,
            bsp_depth: 5,
            max_room_size: 16,
            placement_attempts: 40,
            ..Self::new(seed)
        }
    }

    pub fn with_floor(mut self, floor: u32) -> Self {
        self.floor = floor;
        self
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Maximum number of special rooms for a floor with `total_rooms` rooms.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::GenerationConfig;
    ///
    /// let config = GenerationConfig::new(1);
    /// assert_eq!(config.special_room_cap(4), 2);
    /// assert_eq!(config.special_room_cap(16), 4);
    /// ```
    pub fn special_room_cap(&self, total_rooms: usize) -> usize {
        let scaled = (total_rooms as f64 * self.special_room_ratio).floor() as usize;
        scaled.max(self.min_special_rooms)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// Purpose of a room on the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomType {
    /// Unassigned or plain room
    Basic,
    Entrance,
    Exit,
    Boss,
    Treasure,
    Library,
    Armory,
    Kitchen,
    Bedroom,
    Shop,
    Shrine,
    Storage,
    Prison,
}

impl RoomType {
    pub fn name(self) -> &'static str {
        match self {
            RoomType::Basic => "basic",
            RoomType::Entrance => "entrance",
            RoomType::Exit => "exit",
            RoomType::Boss => "boss",
            RoomType::Treasure => "treasure",
            RoomType::Library => "library",
            RoomType::Armory => "armory",
            RoomType::Kitchen => "kitchen",
            RoomType::Bedroom => "bedroom",
            RoomType::Shop => "shop",
            RoomType::Shrine => "shrine",
            RoomType::Storage => "storage",
            RoomType::Prison => "prison",
        }
    }
}

impl fmt::Display for RoomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Represents a rectangular room on the floor.
///
/// The footprint includes the surrounding wall ring; the walkable interior
/// is everything strictly inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    /// Unique identifier, in partition leaf order
    pub id: u32,
    /// Top-left corner of the footprint
    pub top_left: Position,
    /// Width of the room (including walls)
    pub width: u32,
    /// Height of the room (including walls)
    pub height: u32,
    pub room_type: RoomType,
    /// Id of the template this room was built from
    pub template: Option<String>,
    pub tags: BTreeSet<String>,
    pub is_special: bool,
    /// Ids of directly connected rooms
    pub connections: Vec<u32>,
    /// Tiles where doors guarding this room were placed
    pub entrances: Vec<Position>,
}

impl Room {
    /// Creates a new basic room.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Room, Position, RoomType};
    ///
    /// let room = Room::new(1, Position::new(5, 5), 10, 8);
    /// assert_eq!(room.id, 1);
    /// assert_eq!(room.room_type, RoomType::Basic);
    /// assert_eq!(room.center(), Position::new(10, 9));
    /// ```
    pub fn new(id: u32, top_left: Position, width: u32, height: u32) -> Self {
        Self {
            id,
            top_left,
            width,
            height,
            room_type: RoomType::Basic,
            template: None,
            tags: BTreeSet::new(),
            is_special: false,
            connections: Vec::new(),
            entrances: Vec::new(),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(self.top_left.x, self.top_left.y, self.width, self.height)
    }

    /// Gets the bottom-right corner of the room.
    pub fn bottom_right(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 - 1,
            self.top_left.y + self.height as i32 - 1,
        )
    }

    /// Gets the center position of the room.
    pub fn center(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 / 2,
            self.top_left.y + self.height as i32 / 2,
        )
    }

    /// Checks if a position lies inside the footprint, walls included.
    pub fn contains(&self, pos: Position) -> bool {
        self.bounds().contains(pos)
    }

    /// Checks if a position is strictly inside the wall ring.
    pub fn contains_interior(&self, pos: Position) -> bool {
        self.contains(pos) && !self.is_border(pos)
    }

    /// Checks if a position is on the border of this room.
    pub fn is_border(&self, pos: Position) -> bool {
        if !self.contains(pos) {
            return false;
        }
        let br = self.bottom_right();
        pos.x == self.top_left.x || pos.y == self.top_left.y || pos.x == br.x || pos.y == br.y
    }

    pub fn is_corner(&self, pos: Position) -> bool {
        let br = self.bottom_right();
        (pos.x == self.top_left.x || pos.x == br.x) && (pos.y == self.top_left.y || pos.y == br.y)
    }

    /// Checks if this room's footprint overlaps another's.
    pub fn overlaps(&self, other: &Room) -> bool {
        self.bounds().intersects(&other.bounds())
    }

    /// Gets all floor positions within this room, row by row.
    pub fn floor_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();

        for y in (self.top_left.y + 1)..(self.top_left.y + self.height as i32 - 1) {
            for x in (self.top_left.x + 1)..(self.top_left.x + self.width as i32 - 1) {
                positions.push(Position::new(x, y));
            }
        }

        positions
    }

    /// Gets all wall positions of this room.
    pub fn wall_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();

        // Top and bottom walls
        for x in self.top_left.x..(self.top_left.x + self.width as i32) {
            positions.push(Position::new(x, self.top_left.y));
            positions.push(Position::new(x, self.top_left.y + self.height as i32 - 1));
        }

        // Left and right walls (excluding corners already added)
        for y in (self.top_left.y + 1)..(self.top_left.y + self.height as i32 - 1) {
            positions.push(Position::new(self.top_left.x, y));
            positions.push(Position::new(self.top_left.x + self.width as i32 - 1, y));
        }

        positions
    }

    /// Adds a connection to another room.
    pub fn add_connection(&mut self, room_id: u32) {
        if !self.connections.contains(&room_id) {
            self.connections.push(room_id);
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    /// Leaf rooms have exactly one connection.
    pub fn is_leaf(&self) -> bool {
        self.connections.len() == 1
    }
}

/// Trait for procedural generators.
///
/// Every generation entry point takes the run configuration and the single
/// seeded RNG of the run.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random number generator.
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T, config: &GenerationConfig) -> DelveResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;
    use rand::SeedableRng;

    /// Creates a seeded random number generator from the config.
    pub fn create_rng(config: &GenerationConfig) -> StdRng {
        StdRng::seed_from_u64(config.seed)
    }

    /// Index of the room with the given id.
    pub fn room_index(rooms: &[Room], id: u32) -> Option<usize> {
        rooms.iter().position(|room| room.id == id)
    }

    /// Links two rooms in both directions.
    pub fn connect_rooms(rooms: &mut [Room], a: u32, b: u32) {
        if let (Some(ia), Some(ib)) = (room_index(rooms, a), room_index(rooms, b)) {
            rooms[ia].add_connection(b);
            rooms[ib].add_connection(a);
        }
    }
}
