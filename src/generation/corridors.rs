//! # Corridor Carving
//!
//! Paints rooms and the corridors between connected rooms.
//!
//! Corridors may be several lanes wide, but only the centre lane is allowed
//! to break through a room's wall ring. Side lanes stop at the wall face, so
//! every doorway is a single-tile chokepoint whatever the corridor width.
//!
//! The centre line crosses each joined room's wall exactly once and never
//! passes through a third room. When neither L orientation manages that, the
//! line is routed around the obstacles with A*.

use crate::{Direction, Level, MaterialId, Position, Room, Tile, TerrainType, TileReservations};
use log::{debug, warn};
use pathfinding::prelude::astar;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A corridor joining two rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corridor {
    pub from: u32,
    pub to: u32,
    /// Horizontal leg first, then vertical
    pub horizontal_first: bool,
    /// Carved tiles outside every room footprint
    pub tiles: Vec<Position>,
    /// Wall tile where the corridor leaves `from`
    pub from_breach: Option<Position>,
    /// Wall tile where the corridor enters `to`
    pub to_breach: Option<Position>,
}

impl Corridor {
    /// A connection that has not been carved yet.
    pub fn planned(from: u32, to: u32, horizontal_first: bool) -> Self {
        Self {
            from,
            to,
            horizontal_first,
            tiles: Vec::new(),
            from_breach: None,
            to_breach: None,
        }
    }

    /// Breach tile on the wall of `room_id`, if this corridor serves it.
    pub fn breach_for(&self, room_id: u32) -> Option<Position> {
        if room_id == self.from {
            self.from_breach
        } else if room_id == self.to {
            self.to_breach
        } else {
            None
        }
    }
}

/// Travel axis of a centre-line step, which decides how lanes fan out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Horizontal,
    Vertical,
    Corner,
}

/// Extra cost of each turn when a corridor has to be routed around rooms.
const TURN_COST: u32 = 4;

/// Offsets of each lane from the centre line; the centre lane is 0.
///
/// # Examples
///
/// ```
/// use delve::lane_offsets;
///
/// assert_eq!(lane_offsets(1), vec![0]);
/// assert_eq!(lane_offsets(3), vec![-1, 0, 1]);
/// assert_eq!(lane_offsets(4), vec![-1, 0, 1, 2]);
/// ```
pub fn lane_offsets(width: u32) -> Vec<i32> {
    let width = width.max(1) as i32;
    (0..width).map(|i| i - (width - 1) / 2).collect()
}

/// Centre line of an L-shaped corridor, from `start` to `end` inclusive.
fn l_route(start: Position, end: Position, horizontal_first: bool) -> Vec<Position> {
    let corner = if horizontal_first {
        Position::new(end.x, start.y)
    } else {
        Position::new(start.x, end.y)
    };

    let mut path = vec![start];
    let mut pos = start;
    for target in [corner, end] {
        while pos != target {
            pos = Position::new(
                pos.x + (target.x - pos.x).signum(),
                pos.y + (target.y - pos.y).signum(),
            );
            path.push(pos);
        }
    }
    path
}

/// Tags every tile of a centre line with the axis it travels along.
fn legs(path: &[Position]) -> Vec<(Position, Leg)> {
    path.iter()
        .enumerate()
        .map(|(i, &pos)| {
            let before = i.checked_sub(1).map(|j| pos - path[j]);
            let after = path.get(i + 1).map(|&next| next - pos);
            let leg = match (before, after) {
                (Some(a), Some(b)) if a != b => Leg::Corner,
                (Some(delta), _) | (None, Some(delta)) => {
                    if delta.y == 0 {
                        Leg::Horizontal
                    } else {
                        Leg::Vertical
                    }
                }
                (None, None) => Leg::Corner,
            };
            (pos, leg)
        })
        .collect()
}

/// Where a tile sits relative to the two rooms a corridor joins.
#[derive(Debug, Clone, Copy)]
enum Cell<'r> {
    Outside,
    Interior,
    Wall(&'r Room),
    /// Footprint of a room the corridor does not serve
    Foreign,
}

/// Routing rules for the centre line of one corridor.
///
/// The line leaves `from` and enters `to` through exactly one wall tile
/// each, crossing the wall straight on. It never touches any other room and
/// never opens a wall tile beside an existing opening.
struct Router<'a> {
    level: &'a Level,
    reservations: &'a TileReservations,
    rooms: &'a [Room],
    from: &'a Room,
    to: &'a Room,
}

impl<'a> Router<'a> {
    fn cell(&self, pos: Position) -> Cell<'a> {
        for room in [self.from, self.to] {
            if room.contains(pos) {
                return if room.is_border(pos) {
                    Cell::Wall(room)
                } else {
                    Cell::Interior
                };
            }
        }
        if self.rooms.iter().any(|room| room.contains(pos)) {
            Cell::Foreign
        } else {
            Cell::Outside
        }
    }

    fn can_step(&self, pos: Position, heading: Option<Direction>, direction: Direction) -> bool {
        // Walls are crossed in a straight line
        if matches!(self.cell(pos), Cell::Wall(_)) && heading != Some(direction) {
            return false;
        }

        let next = pos.step(direction);
        match self.cell(next) {
            Cell::Foreign => false,
            Cell::Interior => true,
            Cell::Outside => self.reservations.is_writable(next),
            Cell::Wall(room) => {
                let beyond = next.step(direction);
                let crossing = if room.id == self.from.id {
                    room.contains_interior(pos) && !room.contains(beyond)
                } else {
                    !room.contains(pos) && room.contains_interior(beyond)
                };
                crossing
                    && self.reservations.is_writable(next)
                    && (self.level.is_passable(next) || !self.opens_beside(room, next))
            }
        }
    }

    /// Whether a wall tile cardinally next to `wall` is already open.
    fn opens_beside(&self, room: &Room, wall: Position) -> bool {
        wall.cardinal_adjacent_positions()
            .into_iter()
            .any(|pos| room.is_border(pos) && self.level.is_passable(pos))
    }

    fn follows(&self, path: &[Position]) -> bool {
        let mut heading = None;
        for pair in path.windows(2) {
            let Some(direction) = Direction::from_delta(pair[1] - pair[0]) else {
                return false;
            };
            if !self.can_step(pair[0], heading, direction) {
                return false;
            }
            heading = Some(direction);
        }
        true
    }

    /// Cheapest legal centre line, with turns penalised.
    fn search(&self) -> Option<Vec<Position>> {
        let goal = self.to.center();
        let (nodes, _) = astar(
            &(self.from.center(), None),
            |&(pos, heading): &(Position, Option<Direction>)| {
                Direction::cardinal()
                    .into_iter()
                    .filter(|&direction| self.can_step(pos, heading, direction))
                    .map(|direction| {
                        let cost = if heading.map_or(true, |h| h == direction) {
                            1
                        } else {
                            1 + TURN_COST
                        };
                        ((pos.step(direction), Some(direction)), cost)
                    })
                    .collect::<Vec<_>>()
            },
            |&(pos, _)| pos.manhattan_distance(goal),
            |&(pos, _)| pos == goal,
        )?;
        Some(nodes.into_iter().map(|(pos, _)| pos).collect())
    }
}

/// Carves rooms and corridors into a level.
#[derive(Debug, Clone, Copy)]
pub struct CorridorCarver {
    /// Number of lanes per corridor
    pub width: u32,
    /// Material of corridor floors and the walls lining them
    pub material: MaterialId,
}

impl CorridorCarver {
    pub fn new(width: u32, material: MaterialId) -> Self {
        Self {
            width: width.max(1),
            material,
        }
    }

    /// Paints a room's wall ring and floor in `material`.
    pub fn carve_room(
        &self,
        level: &mut Level,
        reservations: &mut TileReservations,
        room: &Room,
        material: MaterialId,
    ) {
        for y in room.top_left.y..room.top_left.y + room.height as i32 {
            for x in room.top_left.x..room.top_left.x + room.width as i32 {
                let pos = Position::new(x, y);
                if !reservations.claim(pos) {
                    continue;
                }
                let tile = if room.is_border(pos) {
                    Tile::wall(material)
                } else {
                    Tile::floor(material)
                };
                if let Some(slot) = level.get_tile_mut(pos) {
                    *slot = tile;
                }
            }
        }
    }

    /// Carves `corridor` between its two room centres.
    ///
    /// Tries the planned L first, then the other orientation, then routes
    /// around whatever is in the way. Fills in the corridor's carved tiles
    /// and breach points. Locked tiles are never written.
    pub fn carve(
        &self,
        level: &mut Level,
        reservations: &mut TileReservations,
        rooms: &[Room],
        corridor: &mut Corridor,
    ) {
        let (Some(from), Some(to)) = (
            rooms.iter().find(|r| r.id == corridor.from),
            rooms.iter().find(|r| r.id == corridor.to),
        ) else {
            return;
        };

        corridor.tiles.clear();
        corridor.from_breach = None;
        corridor.to_breach = None;

        let router = Router {
            level: &*level,
            reservations: &*reservations,
            rooms,
            from,
            to,
        };
        let planned = [corridor.horizontal_first, !corridor.horizontal_first]
            .into_iter()
            .map(|horizontal_first| {
                (
                    horizontal_first,
                    l_route(from.center(), to.center(), horizontal_first),
                )
            })
            .find(|(_, path)| router.follows(path));
        let path = match planned {
            Some((horizontal_first, path)) => {
                corridor.horizontal_first = horizontal_first;
                path
            }
            None => match router.search() {
                Some(path) => {
                    debug!(
                        "Corridor {}-{} routed around obstacles",
                        corridor.from, corridor.to
                    );
                    path
                }
                None => {
                    warn!("No route for corridor {}-{}", corridor.from, corridor.to);
                    return;
                }
            },
        };

        let offsets = lane_offsets(self.width);
        let mut carved = BTreeSet::new();
        for (center, leg) in legs(&path) {
            if from.is_border(center) {
                corridor.from_breach = Some(center);
            }
            if to.is_border(center) {
                corridor.to_breach = Some(center);
            }

            let lanes: Vec<(i32, i32)> = match leg {
                Leg::Horizontal => offsets.iter().map(|&o| (0, o)).collect(),
                Leg::Vertical => offsets.iter().map(|&o| (o, 0)).collect(),
                Leg::Corner => offsets
                    .iter()
                    .flat_map(|&oy| offsets.iter().map(move |&ox| (ox, oy)))
                    .collect(),
            };

            for (ox, oy) in lanes {
                let pos = Position::new(center.x + ox, center.y + oy);
                let on_center = ox == 0 && oy == 0;
                if self.carve_tile(level, reservations, rooms, pos, on_center) && carved.insert(pos) {
                    corridor.tiles.push(pos);
                }
            }
        }

        self.line_walls(level, reservations, rooms, &corridor.tiles);
    }

    /// Carves one lane tile; returns true for new corridor floor outside rooms.
    fn carve_tile(
        &self,
        level: &mut Level,
        reservations: &mut TileReservations,
        rooms: &[Room],
        pos: Position,
        on_center: bool,
    ) -> bool {
        if !level.is_valid_position(pos) || !reservations.is_writable(pos) {
            return false;
        }

        if let Some(room) = rooms.iter().find(|room| room.contains(pos)) {
            // Only the centre lane may open a room's wall; rooms keep their material.
            if on_center && room.is_border(pos) && reservations.claim(pos) {
                if let Some(tile) = level.get_tile_mut(pos) {
                    tile.terrain = TerrainType::Floor;
                }
            }
            return false;
        }

        if !reservations.claim(pos) {
            return false;
        }
        level
            .set_tile(pos, Tile::floor(self.material))
            .is_ok()
    }

    /// Repaints rock walls bordering the corridor in the corridor material.
    fn line_walls(
        &self,
        level: &mut Level,
        reservations: &TileReservations,
        rooms: &[Room],
        tiles: &[Position],
    ) {
        for &pos in tiles {
            for neighbor in pos.adjacent_positions() {
                if !reservations.is_writable(neighbor)
                    || rooms.iter().any(|room| room.contains(neighbor))
                {
                    continue;
                }
                if let Some(tile) = level.get_tile_mut(neighbor) {
                    if tile.terrain == TerrainType::Wall {
                        tile.material = self.material;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(rooms: &[Room]) -> (Level, TileReservations) {
        let mut level = Level::new(1, 40, 30, "rock");
        let mut reservations = TileReservations::with_locked_border(40, 30);
        let room_material = level.intern_material("brick");
        let carver = CorridorCarver::new(1, MaterialId(0));
        for room in rooms {
            carver.carve_room(&mut level, &mut reservations, room, room_material);
        }
        (level, reservations)
    }

    fn side_by_side() -> Vec<Room> {
        vec![
            Room::new(0, Position::new(2, 10), 7, 7),
            Room::new(1, Position::new(20, 10), 7, 7),
        ]
    }

    fn floor_count_in_column(level: &Level, x: i32, rows: std::ops::Range<i32>) -> usize {
        rows.filter(|&y| level.terrain_at(Position::new(x, y)) == Some(TerrainType::Floor))
            .count()
    }

    fn openings(level: &Level, room: &Room) -> Vec<Position> {
        room.wall_positions()
            .into_iter()
            .filter(|&pos| level.is_passable(pos))
            .collect()
    }

    fn walkable(level: &Level, start: Position) -> BTreeSet<Position> {
        pathfinding::prelude::bfs_reach(start, |&pos: &Position| {
            pos.cardinal_adjacent_positions()
                .into_iter()
                .filter(|&next| level.is_passable(next))
                .collect::<Vec<_>>()
        })
        .collect()
    }

    #[test]
    fn test_l_route_is_connected() {
        let line = l_route(Position::new(2, 3), Position::new(8, 9), true);
        assert_eq!(line.first(), Some(&Position::new(2, 3)));
        assert_eq!(line.last(), Some(&Position::new(8, 9)));
        for pair in line.windows(2) {
            assert_eq!(pair[0].manhattan_distance(pair[1]), 1);
        }
        assert!(legs(&line).contains(&(Position::new(8, 3), Leg::Corner)));
        assert_eq!(legs(&line)[0].1, Leg::Horizontal);
    }

    #[test]
    fn test_single_lane_corridor_joins_rooms() {
        let rooms = side_by_side();
        let (mut level, mut reservations) = setup(&rooms);
        let mut corridor = Corridor::planned(0, 1, true);
        let material = level.intern_material("gravel");
        CorridorCarver::new(1, material).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        assert_eq!(corridor.from_breach, Some(Position::new(8, 13)));
        assert_eq!(corridor.to_breach, Some(Position::new(20, 13)));
        assert_eq!(corridor.tiles.len(), 11);
        for x in 9..20 {
            assert_eq!(level.material_at(Position::new(x, 13)), Some("gravel"));
        }
    }

    #[test]
    fn test_wide_corridor_breaches_wall_with_one_tile() {
        let rooms = side_by_side();
        let (mut level, mut reservations) = setup(&rooms);
        let mut corridor = Corridor::planned(0, 1, true);
        CorridorCarver::new(3, MaterialId(0)).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        // East wall of room 0 and west wall of room 1
        assert_eq!(floor_count_in_column(&level, 8, 10..17), 1);
        assert_eq!(floor_count_in_column(&level, 20, 10..17), 1);
        // The corridor itself is three lanes wide
        assert_eq!(floor_count_in_column(&level, 14, 0..30), 3);
    }

    #[test]
    fn test_rooms_keep_their_material() {
        let rooms = side_by_side();
        let (mut level, mut reservations) = setup(&rooms);
        let mut corridor = Corridor::planned(0, 1, false);
        let material = level.intern_material("gravel");
        CorridorCarver::new(2, material).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        for room in &rooms {
            for pos in room.wall_positions() {
                assert_eq!(level.material_at(pos), Some("brick"));
            }
        }
        // Rock lining the corridor takes the corridor material
        assert_eq!(level.material_at(Position::new(14, 12)), Some("gravel"));
    }

    #[test]
    fn test_carving_skips_locked_tiles() {
        let rooms = side_by_side();
        let (mut level, mut reservations) = setup(&rooms);
        let locked = Position::new(14, 13);
        reservations.lock(locked);
        let mut corridor = Corridor::planned(0, 1, true);
        CorridorCarver::new(1, MaterialId(0)).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        assert_eq!(level.terrain_at(locked), Some(TerrainType::Wall));
        assert!(!corridor.tiles.contains(&locked));
    }

    #[test]
    fn test_l_shaped_corridor_turns_once() {
        let rooms = vec![
            Room::new(0, Position::new(2, 2), 7, 7),
            Room::new(1, Position::new(20, 18), 7, 7),
        ];
        let (mut level, mut reservations) = setup(&rooms);
        let mut corridor = Corridor::planned(0, 1, true);
        CorridorCarver::new(1, MaterialId(0)).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        // Leaves room 0 east, enters room 1 from the north
        assert_eq!(corridor.from_breach, Some(Position::new(8, 5)));
        assert_eq!(corridor.to_breach, Some(Position::new(23, 18)));
        assert!(corridor.tiles.contains(&Position::new(23, 5)));
    }

    #[test]
    fn test_leg_along_a_wall_is_rerouted() {
        // Room 1's centre column is room 0's east wall
        let rooms = vec![
            Room::new(0, Position::new(2, 2), 7, 7),
            Room::new(1, Position::new(5, 20), 7, 7),
        ];
        let (mut level, mut reservations) = setup(&rooms);
        let mut corridor = Corridor::planned(0, 1, true);
        CorridorCarver::new(1, MaterialId(0)).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        for room in &rooms {
            let open = openings(&level, room);
            assert_eq!(open.len(), 1, "room {} openings: {:?}", room.id, open);
            assert!(!room.is_corner(open[0]));
        }
        assert_eq!(corridor.from_breach, Some(openings(&level, &rooms[0])[0]));
        assert_eq!(corridor.to_breach, Some(openings(&level, &rooms[1])[0]));
        assert!(walkable(&level, rooms[0].center()).contains(&rooms[1].center()));
    }

    #[test]
    fn test_corridor_goes_around_a_third_room() {
        let rooms = vec![
            Room::new(0, Position::new(2, 10), 7, 7),
            Room::new(1, Position::new(30, 10), 7, 7),
            Room::new(2, Position::new(15, 9), 9, 9),
        ];
        let (mut level, mut reservations) = setup(&rooms);
        let mut corridor = Corridor::planned(0, 1, false);
        CorridorCarver::new(3, MaterialId(0)).carve(&mut level, &mut reservations, &rooms, &mut corridor);

        let reached = walkable(&level, rooms[0].center());
        assert!(openings(&level, &rooms[2]).is_empty());
        assert!(rooms[2].floor_positions().iter().all(|p| !reached.contains(p)));
        assert!(reached.contains(&rooms[1].center()));
        assert_eq!(openings(&level, &rooms[0]).len(), 1);
        assert_eq!(openings(&level, &rooms[1]).len(), 1);
    }

    #[test]
    fn test_second_corridor_does_not_widen_a_doorway() {
        let rooms = vec![
            Room::new(0, Position::new(2, 10), 7, 7),
            Room::new(1, Position::new(20, 10), 7, 7),
            Room::new(2, Position::new(20, 2), 5, 5),
        ];
        let (mut level, mut reservations) = setup(&rooms);
        let carver = CorridorCarver::new(1, MaterialId(0));
        let mut first = Corridor::planned(0, 1, true);
        carver.carve(&mut level, &mut reservations, &rooms, &mut first);
        let mut second = Corridor::planned(0, 2, true);
        carver.carve(&mut level, &mut reservations, &rooms, &mut second);

        let open = openings(&level, &rooms[0]);
        for pos in &open {
            assert!(pos
                .cardinal_adjacent_positions()
                .iter()
                .all(|next| !open.contains(next)));
        }
        assert!(second.from_breach.is_some());
        assert!(second.to_breach.is_some());
    }
}
