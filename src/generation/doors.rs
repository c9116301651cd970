//! # Doors and Locks
//!
//! Places one door where each corridor meets a room. Doors sit on the
//! corridor tile just outside the wall breach when that tile is a
//! chokepoint, and on the breach itself otherwise, so nothing branches off
//! between a door and the room it guards.

use crate::{
    Corridor, Direction, Level, Position, Room, RoomType, TileReservations,
};
use log::{debug, warn};
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Lock chance added per floor below the first.
const LOCK_CHANCE_PER_FLOOR: f64 = 0.02;

/// Upper bound on the depth bonus to lock chances.
const MAX_LOCK_DEPTH_BONUS: f64 = 0.2;

const TREASURE_LOCK_CHANCE: f64 = 0.7;
const SPECIAL_LOCK_CHANCE: f64 = 0.1;

/// Door variants, ordered by precedence when two doors share a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoorKind {
    Door,
    Secret,
    Locked,
    BossDoor,
}

impl DoorKind {
    /// Whether the door needs a key.
    pub fn is_locked(self) -> bool {
        matches!(self, DoorKind::Locked | DoorKind::BossDoor)
    }

    pub fn glyph(self) -> char {
        match self {
            DoorKind::Door => '+',
            DoorKind::Secret => 'S',
            DoorKind::Locked => '=',
            DoorKind::BossDoor => 'B',
        }
    }
}

/// A placed door guarding `room_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Door {
    pub position: Position,
    pub kind: DoorKind,
    pub room_id: u32,
}

/// Lock chance for `base` on `floor`, with the depth bonus applied.
///
/// # Examples
///
/// ```
/// use delve::lock_chance;
///
/// assert!((lock_chance(0.7, 1) - 0.7).abs() < 1e-9);
/// assert!((lock_chance(0.1, 6) - 0.2).abs() < 1e-9);
/// assert!((lock_chance(0.1, 40) - 0.3).abs() < 1e-9);
/// ```
pub fn lock_chance(base: f64, floor: u32) -> f64 {
    let bonus = floor.saturating_sub(1) as f64 * LOCK_CHANCE_PER_FLOOR;
    base + bonus.min(MAX_LOCK_DEPTH_BONUS)
}

/// A passable tile blocked on exactly one opposing pair of sides.
pub fn is_chokepoint(level: &Level, pos: Position) -> bool {
    if !level.is_passable(pos) {
        return false;
    }
    let blocked = |d: Direction| !level.is_passable(pos.step(d));
    let north_south = blocked(Direction::North) && blocked(Direction::South);
    let east_west = blocked(Direction::East) && blocked(Direction::West);
    north_south != east_west
}

/// Places doors for one floor.
#[derive(Debug, Clone, Copy)]
pub struct DoorPlacer {
    pub floor: u32,
    /// Exits on boss floors get a boss door
    pub boss_floor: bool,
}

impl DoorPlacer {
    pub fn new(floor: u32, boss_floor: bool) -> Self {
        Self { floor, boss_floor }
    }

    /// Rolls the door variant guarding `room`.
    pub fn roll_kind(&self, room: &Room, rng: &mut StdRng) -> DoorKind {
        match room.room_type {
            RoomType::Boss => DoorKind::Locked,
            RoomType::Exit if self.boss_floor => DoorKind::BossDoor,
            RoomType::Treasure => {
                if rng.gen_bool(lock_chance(TREASURE_LOCK_CHANCE, self.floor)) {
                    DoorKind::Locked
                } else {
                    DoorKind::Door
                }
            }
            _ if room.has_tag("library") => DoorKind::Secret,
            _ if room.is_special => {
                if rng.gen_bool(lock_chance(SPECIAL_LOCK_CHANCE, self.floor)) {
                    DoorKind::Locked
                } else {
                    DoorKind::Door
                }
            }
            _ => DoorKind::Door,
        }
    }

    /// Places a door at both ends of every corridor.
    ///
    /// Returns the ids of rooms behind a locked or boss door, which need keys.
    pub fn place(
        &self,
        level: &mut Level,
        reservations: &mut TileReservations,
        rooms: &mut [Room],
        corridors: &[Corridor],
        rng: &mut StdRng,
    ) -> BTreeSet<u32> {
        let mut kinds: BTreeMap<u32, DoorKind> = BTreeMap::new();

        for corridor in corridors {
            for room_id in [corridor.from, corridor.to] {
                let Some(index) = rooms.iter().position(|room| room.id == room_id) else {
                    continue;
                };
                let Some(breach) = corridor.breach_for(room_id) else {
                    warn!(
                        "Corridor {}-{} never breached room {}",
                        corridor.from, corridor.to, room_id
                    );
                    continue;
                };
                let Some(position) = find_door_tile(level, rooms, &rooms[index], breach) else {
                    warn!("No chokepoint for a door into room {}", room_id);
                    continue;
                };

                let kind = *kinds
                    .entry(room_id)
                    .or_insert_with(|| self.roll_kind(&rooms[index], rng));
                record_door(
                    level,
                    Door {
                        position,
                        kind,
                        room_id,
                    },
                );
                protect_doorway(level, reservations, position);

                let room = &mut rooms[index];
                if !room.entrances.contains(&position) {
                    room.entrances.push(position);
                }
            }
        }

        let locked = locked_rooms(level);
        debug!(
            "Placed {} doors, {} rooms locked",
            level.doors.len(),
            locked.len()
        );
        locked
    }
}

/// Rooms guarded by at least one locked or boss door.
pub fn locked_rooms(level: &Level) -> BTreeSet<u32> {
    level
        .doors
        .iter()
        .filter(|door| door.kind.is_locked())
        .map(|door| door.room_id)
        .collect()
}

/// Door tile for a wall breach of `room`.
fn find_door_tile(level: &Level, rooms: &[Room], room: &Room, breach: Position) -> Option<Position> {
    let inward = Direction::cardinal()
        .into_iter()
        .find(|&d| room.contains_interior(breach.step(d)));

    if let Some(inward) = inward {
        let outside = breach.step(inward.opposite());
        if !rooms.iter().any(|r| r.contains(outside)) && is_chokepoint(level, outside) {
            return Some(outside);
        }
    }

    is_chokepoint(level, breach).then_some(breach)
}

/// Adds a door for its room.
///
/// Every room whose door shares a tile keeps its own record, and all of them
/// take the strongest kind on that tile.
fn record_door(level: &mut Level, door: Door) {
    let kind = level
        .doors
        .iter()
        .filter(|d| d.position == door.position)
        .map(|d| d.kind)
        .fold(door.kind, Ord::max);
    for existing in level.doors.iter_mut().filter(|d| d.position == door.position) {
        existing.kind = kind;
    }
    let known = level
        .doors
        .iter()
        .any(|d| d.position == door.position && d.room_id == door.room_id);
    if !known {
        level.doors.push(Door { kind, ..door });
    }
}

/// Marks a doorway and its walkable surroundings as off limits.
fn protect_doorway(level: &mut Level, reservations: &mut TileReservations, door: Position) {
    let mut tiles = vec![door];
    tiles.extend(
        door.adjacent_positions()
            .into_iter()
            .filter(|&pos| level.is_passable(pos)),
    );
    for pos in tiles {
        reservations.lock(pos);
        level.protected.insert(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CorridorCarver, MaterialId, Tile};
    use rand::SeedableRng;

    fn carved(rooms: &[Room], width: u32) -> (Level, TileReservations, Vec<Corridor>) {
        let mut level = Level::new(3, 40, 30, "rock");
        let mut reservations = TileReservations::with_locked_border(40, 30);
        let carver = CorridorCarver::new(width, MaterialId(0));
        for room in rooms {
            carver.carve_room(&mut level, &mut reservations, room, MaterialId(0));
        }
        let mut corridor = Corridor::planned(0, 1, true);
        carver.carve(&mut level, &mut reservations, rooms, &mut corridor);
        (level, reservations, vec![corridor])
    }

    fn side_by_side() -> Vec<Room> {
        vec![
            Room::new(0, Position::new(2, 10), 7, 7),
            Room::new(1, Position::new(20, 10), 7, 7),
        ]
    }

    #[test]
    fn test_chokepoint_detection() {
        let mut level = Level::new(1, 7, 7, "rock");
        for x in 1..6 {
            level.set_tile(Position::new(x, 3), Tile::floor(MaterialId(0))).unwrap();
        }
        assert!(is_chokepoint(&level, Position::new(3, 3)));
        assert!(!is_chokepoint(&level, Position::new(3, 2)));

        // A crossing is open on both axes
        level.set_tile(Position::new(3, 2), Tile::floor(MaterialId(0))).unwrap();
        level.set_tile(Position::new(3, 4), Tile::floor(MaterialId(0))).unwrap();
        assert!(!is_chokepoint(&level, Position::new(3, 3)));
    }

    #[test]
    fn test_doors_sit_just_outside_rooms() {
        let mut rooms = side_by_side();
        let (mut level, mut reservations, corridors) = carved(&rooms, 1);
        let mut rng = StdRng::seed_from_u64(1);
        let locked = DoorPlacer::new(1, false).place(
            &mut level,
            &mut reservations,
            &mut rooms,
            &corridors,
            &mut rng,
        );

        assert!(locked.is_empty());
        let positions: Vec<Position> = level.doors.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![Position::new(9, 13), Position::new(19, 13)]);
        assert!(level.doors.iter().all(|d| d.kind == DoorKind::Door));
        assert_eq!(rooms[0].entrances, vec![Position::new(9, 13)]);
        for door in &level.doors {
            assert!(is_chokepoint(&level, door.position));
            assert!(rooms.iter().all(|r| !r.contains(door.position)));
        }
    }

    #[test]
    fn test_wide_corridor_doors_use_the_breach() {
        let mut rooms = side_by_side();
        let (mut level, mut reservations, corridors) = carved(&rooms, 3);
        let mut rng = StdRng::seed_from_u64(1);
        DoorPlacer::new(1, false).place(&mut level, &mut reservations, &mut rooms, &corridors, &mut rng);

        let positions: Vec<Position> = level.doors.iter().map(|d| d.position).collect();
        assert_eq!(positions, vec![Position::new(8, 13), Position::new(20, 13)]);
        assert!(positions.iter().all(|&p| is_chokepoint(&level, p)));
    }

    #[test]
    fn test_doorways_are_protected() {
        let mut rooms = side_by_side();
        let (mut level, mut reservations, corridors) = carved(&rooms, 1);
        let mut rng = StdRng::seed_from_u64(1);
        DoorPlacer::new(1, false).place(&mut level, &mut reservations, &mut rooms, &corridors, &mut rng);

        let door = Position::new(9, 13);
        assert!(level.protected.contains(&door));
        assert!(level.protected.contains(&Position::new(10, 13)));
        assert!(level.protected.contains(&Position::new(8, 13)));
        assert!(!level.protected.contains(&Position::new(9, 12)));
        assert!(!reservations.is_writable(door));
    }

    #[test]
    fn test_boss_and_exit_doors() {
        let mut rooms = side_by_side();
        rooms[0].room_type = RoomType::Boss;
        rooms[1].room_type = RoomType::Exit;
        let (mut level, mut reservations, corridors) = carved(&rooms, 1);
        let mut rng = StdRng::seed_from_u64(7);
        let locked = DoorPlacer::new(5, true).place(
            &mut level,
            &mut reservations,
            &mut rooms,
            &corridors,
            &mut rng,
        );

        assert_eq!(locked, BTreeSet::from([0, 1]));
        assert_eq!(level.doors[0].kind, DoorKind::Locked);
        assert_eq!(level.doors[1].kind, DoorKind::BossDoor);
    }

    #[test]
    fn test_roll_kind_by_room() {
        let placer = DoorPlacer::new(1, false);
        let mut rng = StdRng::seed_from_u64(3);

        let mut library = Room::new(0, Position::new(0, 0), 8, 8);
        library.room_type = RoomType::Library;
        library.is_special = true;
        library.tags.insert("library".to_string());
        assert_eq!(placer.roll_kind(&library, &mut rng), DoorKind::Secret);

        let exit = {
            let mut room = Room::new(1, Position::new(0, 0), 8, 8);
            room.room_type = RoomType::Exit;
            room
        };
        assert_eq!(placer.roll_kind(&exit, &mut rng), DoorKind::Door);

        let plain = Room::new(2, Position::new(0, 0), 8, 8);
        for _ in 0..20 {
            assert_eq!(placer.roll_kind(&plain, &mut rng), DoorKind::Door);
        }
    }

    #[test]
    fn test_treasure_rooms_are_usually_locked() {
        let placer = DoorPlacer::new(10, false);
        let mut rng = StdRng::seed_from_u64(11);
        let mut vault = Room::new(0, Position::new(0, 0), 7, 7);
        vault.room_type = RoomType::Treasure;
        vault.is_special = true;

        let locked = (0..200)
            .filter(|_| placer.roll_kind(&vault, &mut rng) == DoorKind::Locked)
            .count();
        assert!(locked > 130, "only {locked} of 200 treasure doors locked");
    }

    #[test]
    fn test_shared_tile_locks_every_room_behind_it() {
        let mut level = Level::new(1, 10, 10, "rock");
        let position = Position::new(4, 4);
        record_door(&mut level, Door { position, kind: DoorKind::Secret, room_id: 1 });
        record_door(&mut level, Door { position, kind: DoorKind::Locked, room_id: 2 });
        record_door(&mut level, Door { position, kind: DoorKind::Door, room_id: 3 });
        record_door(&mut level, Door { position, kind: DoorKind::Door, room_id: 3 });

        assert_eq!(level.doors.len(), 3);
        assert!(level.doors.iter().all(|d| d.kind == DoorKind::Locked));
        assert_eq!(locked_rooms(&level), BTreeSet::from([1, 2, 3]));
    }

    #[test]
    fn test_door_next_to_a_branch_moves_onto_the_breach() {
        let mut rooms = side_by_side();
        let (mut level, mut reservations, corridors) = carved(&rooms, 1);
        // A side passage joining right outside room 0
        for y in 5..13 {
            level.set_tile(Position::new(9, y), Tile::floor(MaterialId(0))).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(1);
        DoorPlacer::new(1, false).place(&mut level, &mut reservations, &mut rooms, &corridors, &mut rng);

        let door = level.doors.iter().find(|d| d.room_id == 0).unwrap();
        assert_eq!(door.position, Position::new(8, 13));
        assert!(is_chokepoint(&level, door.position));
    }
}
