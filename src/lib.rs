//! # Delve
//!
//! Procedural floor generation for a tile-based dungeon crawler.
//!
//! ## Architecture Overview
//!
//! A floor is produced by a single synchronous pass over a seeded RNG. The
//! pipeline stages each live in their own module under [`generation`]:
//!
//! - **Space Partitioner**: binary space partition of the floor into candidate rooms
//! - **Tile Reservations**: per-run claim grid that keeps carving passes apart
//! - **Room Graph**: sibling subtrees joined by corridors
//! - **Topology**: BFS distances, critical path and leaf rooms
//! - **Room Assignment**: entrance/exit, required types, specials, flavor, distribution
//! - **Corridor Carving**: multi-lane corridors with single-tile doorways
//! - **Doors, Locks and Keys**: chokepoint doors and externally reachable keys
//!
//! The finished [`Level`] is returned together with the placement requests
//! (doors, stairs, keys, bosses, items) the rest of the game consumes.

pub mod game;
pub mod generation;

pub use game::*;
pub use generation::*;

/// Core error type for the Delve generator.
#[derive(thiserror::Error, Debug)]
pub enum DelveError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Registry or biome data cannot be used
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A grid access fell outside the level
    #[error("Position out of bounds: ({}, {})", .0.x, .0.y)]
    OutOfBounds(Position),

    /// Generated content violates a level invariant
    #[error("Generation failed: {0}")]
    GenerationFailed(String),
}

/// Result type used throughout the Delve codebase.
pub type DelveResult<T> = Result<T, DelveError>;

/// Version information for the crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Generation defaults and limits.
pub mod config {
    /// Default floor width in tiles
    pub const DEFAULT_FLOOR_WIDTH: u32 = 40;

    /// Default floor height in tiles
    pub const DEFAULT_FLOOR_HEIGHT: u32 = 40;

    /// Default BSP recursion depth
    pub const DEFAULT_BSP_DEPTH: u32 = 4;

    /// Smallest room footprint, walls included
    pub const MIN_ROOM_SIZE: u32 = 5;

    /// Share of rooms that may become special rooms
    pub const SPECIAL_ROOM_RATIO: f64 = 0.3;

    /// Lower bound on the special room cap
    pub const MIN_SPECIAL_ROOMS: usize = 2;

    /// Attempts spent looking for a free tile before giving up
    pub const PLACEMENT_ATTEMPTS: u32 = 20;

    /// Item ids of the guaranteed progression items
    pub const PROGRESSION_ITEMS: [&str; 2] = ["potion_of_strength", "scroll_of_upgrade"];
}
