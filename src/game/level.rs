//! # Level
//!
//! The output aggregate of floor generation. Tiles are stored row-major, so
//! every grid access in the crate goes through `tiles[y][x]`.

use crate::generation::{Corridor, Door, Room, RoomType};
use crate::{DelveError, DelveResult, Position};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Terrain occupying a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerrainType {
    Wall,
    Floor,
    Grass,
    Snow,
    Ice,
    ShallowWater,
    Rubble,
}

impl TerrainType {
    /// Whether actors can walk over this terrain.
    pub fn is_passable(self) -> bool {
        !matches!(self, TerrainType::Wall)
    }

    /// ASCII glyph used by [`Level::render_ascii`].
    pub fn glyph(self) -> char {
        match self {
            TerrainType::Wall => '#',
            TerrainType::Floor => '.',
            TerrainType::Grass => '"',
            TerrainType::Snow => ',',
            TerrainType::Ice => '_',
            TerrainType::ShallowWater => '~',
            TerrainType::Rubble => ':',
        }
    }
}

/// Index into a level's material palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MaterialId(pub u16);

/// A single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain: TerrainType,
    pub material: MaterialId,
}

impl Tile {
    pub fn new(terrain: TerrainType, material: MaterialId) -> Self {
        Self { terrain, material }
    }

    pub fn wall(material: MaterialId) -> Self {
        Self::new(TerrainType::Wall, material)
    }

    pub fn floor(material: MaterialId) -> Self {
        Self::new(TerrainType::Floor, material)
    }
}

/// A generated dungeon floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    /// Floor number, starting at 1
    pub floor: u32,
    pub width: u32,
    pub height: u32,
    /// Tile grid indexed `[y][x]`
    pub tiles: Vec<Vec<Tile>>,
    /// Material names referenced by [`MaterialId`]
    pub materials: Vec<String>,
    pub rooms: Vec<Room>,
    pub corridors: Vec<Corridor>,
    pub doors: Vec<Door>,
    pub entrance: Option<Position>,
    pub exit: Option<Position>,
    pub spawn_points: Vec<Position>,
    /// Tiles later decoration passes must leave walkable
    pub protected: BTreeSet<Position>,
}

impl Level {
    /// Creates a level filled with walls of `base_material`.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{Level, Position, TerrainType};
    ///
    /// let level = Level::new(1, 20, 10, "granite");
    /// assert_eq!(level.tiles.len(), 10);
    /// assert_eq!(level.terrain_at(Position::new(19, 9)), Some(TerrainType::Wall));
    /// assert_eq!(level.terrain_at(Position::new(20, 9)), None);
    /// ```
    pub fn new(floor: u32, width: u32, height: u32, base_material: &str) -> Self {
        let base = MaterialId(0);
        Self {
            floor,
            width,
            height,
            tiles: vec![vec![Tile::wall(base); width as usize]; height as usize],
            materials: vec![base_material.to_string()],
            rooms: Vec::new(),
            corridors: Vec::new(),
            doors: Vec::new(),
            entrance: None,
            exit: None,
            spawn_points: Vec::new(),
            protected: BTreeSet::new(),
        }
    }

    pub fn is_valid_position(&self, pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    pub fn get_tile(&self, pos: Position) -> Option<&Tile> {
        if !self.is_valid_position(pos) {
            return None;
        }
        Some(&self.tiles[pos.y as usize][pos.x as usize])
    }

    pub fn get_tile_mut(&mut self, pos: Position) -> Option<&mut Tile> {
        if !self.is_valid_position(pos) {
            return None;
        }
        Some(&mut self.tiles[pos.y as usize][pos.x as usize])
    }

    pub fn set_tile(&mut self, pos: Position, tile: Tile) -> DelveResult<()> {
        match self.get_tile_mut(pos) {
            Some(slot) => {
                *slot = tile;
                Ok(())
            }
            None => Err(DelveError::OutOfBounds(pos)),
        }
    }

    pub fn terrain_at(&self, pos: Position) -> Option<TerrainType> {
        self.get_tile(pos).map(|tile| tile.terrain)
    }

    /// Out-of-bounds positions count as impassable.
    pub fn is_passable(&self, pos: Position) -> bool {
        self.terrain_at(pos)
            .map(TerrainType::is_passable)
            .unwrap_or(false)
    }

    /// Returns the palette id for `name`, adding it on first use.
    pub fn intern_material(&mut self, name: &str) -> MaterialId {
        if let Some(index) = self.materials.iter().position(|m| m == name) {
            return MaterialId(index as u16);
        }
        self.materials.push(name.to_string());
        MaterialId((self.materials.len() - 1) as u16)
    }

    pub fn material_name(&self, id: MaterialId) -> Option<&str> {
        self.materials.get(id.0 as usize).map(String::as_str)
    }

    pub fn material_at(&self, pos: Position) -> Option<&str> {
        self.get_tile(pos)
            .and_then(|tile| self.material_name(tile.material))
    }

    pub fn count_terrain(&self, terrain: TerrainType) -> usize {
        self.tiles
            .iter()
            .flat_map(|row| row.iter())
            .filter(|tile| tile.terrain == terrain)
            .count()
    }

    pub fn room(&self, id: u32) -> Option<&Room> {
        self.rooms.iter().find(|room| room.id == id)
    }

    /// Room whose footprint (walls included) covers `pos`.
    pub fn room_at(&self, pos: Position) -> Option<&Room> {
        self.rooms.iter().find(|room| room.contains(pos))
    }

    pub fn rooms_of_type(&self, room_type: RoomType) -> impl Iterator<Item = &Room> {
        self.rooms
            .iter()
            .filter(move |room| room.room_type == room_type)
    }

    pub fn door_at(&self, pos: Position) -> Option<&Door> {
        self.doors.iter().find(|door| door.position == pos)
    }

    /// Renders the level as text, one row per line.
    pub fn render_ascii(&self) -> String {
        let mut out = String::with_capacity(((self.width + 1) * self.height) as usize);
        for (y, row) in self.tiles.iter().enumerate() {
            for (x, tile) in row.iter().enumerate() {
                let pos = Position::new(x as i32, y as i32);
                let glyph = if Some(pos) == self.entrance {
                    '<'
                } else if Some(pos) == self.exit {
                    '>'
                } else if let Some(door) = self.door_at(pos) {
                    door.kind.glyph()
                } else {
                    tile.terrain.glyph()
                };
                out.push(glyph);
            }
            out.push('\n');
        }
        out
    }
}
