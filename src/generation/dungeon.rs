//! # Dungeon Generation
//!
//! The floor pipeline end to end. [`DungeonGenerator`] sequences every stage
//! over one seeded RNG and one tile reservation grid:
//!
//! 1. Partition the floor and place one room per leaf
//! 2. Join sibling subtrees into a room graph
//! 3. Analyse the graph from the start room
//! 4. Assign room types and templates
//! 5. Carve rooms, then corridors
//! 6. Place doors and record locked rooms
//! 7. Paint biome terrain features
//! 8. Queue stairs, bosses, keys, spawn points and the progression item

use crate::generation::utils::create_rng;
use crate::{
    apply_features, choose_room_materials, is_chokepoint, locked_rooms, place_progression_item,
    random_free_tile, reachable_rooms, BiomeDefinition, CorridorCarver, DelveError, DelveResult,
    DoorPlacer, GeneratedFloor, GenerationConfig, Generator, KeyPlacer, Level, PlacementQueue,
    PlacementRequest, Position, Reservation, Room, RoomAssignor, RoomGraph, RoomType,
    SpacePartitioner, StairDirection, TemplateRegistry, TileReservations, Topology,
};
use log::{debug, info, warn};
use pathfinding::prelude::bfs_reach;
use rand::rngs::StdRng;
use std::collections::BTreeSet;

/// Actor id requested at the centre of every boss room.
pub const BOSS_ACTOR: &str = "floor_boss";

/// Tiles reachable on foot from `start`, never stepping on `blocked`.
fn walkable_from(level: &Level, start: Position, blocked: &BTreeSet<Position>) -> BTreeSet<Position> {
    bfs_reach(start, |&pos: &Position| {
        pos.cardinal_adjacent_positions()
            .into_iter()
            .filter(|next| level.is_passable(*next) && !blocked.contains(next))
            .collect::<Vec<_>>()
    })
    .collect()
}

/// Generates complete dungeon floors.
///
/// The generator only borrows its data; one registry and biome can serve
/// any number of floors.
///
/// # Examples
///
/// ```
/// use delve::{BiomeDefinition, DungeonGenerator, GenerationConfig, TemplateRegistry};
///
/// let registry = TemplateRegistry::builtin();
/// let biome = BiomeDefinition::snowy_village();
/// let generator = DungeonGenerator::new(&registry, &biome);
///
/// let floor = generator.generate_floor(&GenerationConfig::new(7)).unwrap();
/// assert!(!floor.level.rooms.is_empty());
/// assert!(floor.level.entrance.is_some());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DungeonGenerator<'a> {
    pub templates: &'a TemplateRegistry,
    pub biome: &'a BiomeDefinition,
}

impl<'a> DungeonGenerator<'a> {
    pub fn new(templates: &'a TemplateRegistry, biome: &'a BiomeDefinition) -> Self {
        Self { templates, biome }
    }

    /// Generates a floor with an RNG seeded from `config.seed`.
    pub fn generate_floor(&self, config: &GenerationConfig) -> DelveResult<GeneratedFloor> {
        let mut rng = create_rng(config);
        self.generate(config, &mut rng)
    }

    /// Carves every room in its chosen material.
    fn carve_rooms(
        &self,
        level: &mut Level,
        reservations: &mut TileReservations,
        carver: &CorridorCarver,
        rooms: &[Room],
        rng: &mut StdRng,
    ) {
        let materials = choose_room_materials(rooms, self.templates, self.biome, rng);
        for room in rooms {
            let name = materials
                .get(&room.id)
                .map_or(self.biome.default_material.as_str(), String::as_str);
            let material = level.intern_material(name);
            carver.carve_room(level, reservations, room, material);
        }
    }

    /// Sets the stair points and queues staircases and bosses.
    fn place_landmarks(&self, level: &mut Level, rooms: &[Room], queue: &mut PlacementQueue) {
        for room in rooms {
            let position = room.center();
            match room.room_type {
                RoomType::Entrance => {
                    level.entrance = Some(position);
                    queue.push(PlacementRequest::Staircase {
                        position,
                        direction: StairDirection::Up,
                    });
                }
                RoomType::Exit => {
                    level.exit = Some(position);
                    queue.push(PlacementRequest::Staircase {
                        position,
                        direction: StairDirection::Down,
                    });
                }
                RoomType::Boss => queue.push(PlacementRequest::Actor {
                    position,
                    actor: BOSS_ACTOR.to_string(),
                }),
                _ => {}
            }
        }
    }

    /// One spawn point per room other than the entrance.
    fn place_spawn_points(
        &self,
        level: &mut Level,
        rooms: &[Room],
        queue: &PlacementQueue,
        attempts: u32,
        rng: &mut StdRng,
    ) {
        for room in rooms.iter().filter(|r| r.room_type != RoomType::Entrance) {
            let taken = &level.spawn_points;
            let free = |pos: Position| !queue.is_occupied(pos) && !taken.contains(&pos);
            match random_free_tile(level, room, attempts, rng, free) {
                Some(pos) => level.spawn_points.push(pos),
                None => warn!("No free spawn tile in room {}", room.id),
            }
        }
    }
}

impl Generator<GeneratedFloor> for DungeonGenerator<'_> {
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> DelveResult<GeneratedFloor> {
        let mut level = Level::new(
            config.floor,
            config.width,
            config.height,
            &self.biome.default_material,
        );
        let mut reservations = TileReservations::with_locked_border(config.width, config.height);
        let mut queue = PlacementQueue::new();

        let tree = SpacePartitioner::from_config(config).partition(config.width, config.height, rng);
        let RoomGraph {
            mut rooms,
            mut corridors,
        } = RoomGraph::build(&tree, rng);

        if rooms.is_empty() {
            warn!(
                "A {}x{} floor has no room for any rooms",
                config.width, config.height
            );
            return Ok(GeneratedFloor {
                level,
                requests: Vec::new(),
            });
        }

        let start = rooms[0].id;
        let topology = Topology::analyze(&rooms, start);
        RoomAssignor::new(self.templates, &self.biome.id, config.floor).assign(
            &mut rooms,
            &topology,
            config,
            rng,
        );

        let corridor_material = level.intern_material(self.biome.corridor_material());
        let carver = CorridorCarver::new(self.biome.corridor_width, corridor_material);
        self.carve_rooms(&mut level, &mut reservations, &carver, &rooms, rng);
        for corridor in corridors.iter_mut() {
            carver.carve(&mut level, &mut reservations, &rooms, corridor);
        }

        let rules = self.templates.floor_rules(config.floor);
        let locked = DoorPlacer::new(config.floor, rules.boss_floor).place(
            &mut level,
            &mut reservations,
            &mut rooms,
            &corridors,
            rng,
        );

        apply_features(&mut level, &mut reservations, &self.biome.features, rng);

        for door in &level.doors {
            if queue.is_occupied(door.position) {
                continue;
            }
            queue.push(PlacementRequest::Door {
                position: door.position,
                door: door.kind,
                room_id: door.room_id,
            });
        }
        self.place_landmarks(&mut level, &rooms, &mut queue);
        let keys = KeyPlacer::new(config.verify_key_reachability).place(
            &rooms,
            &locked,
            start,
            &mut queue,
            rng,
        );
        self.place_spawn_points(&mut level, &rooms, &queue, config.placement_attempts, rng);
        place_progression_item(&level, &rooms, config.placement_attempts, &mut queue, rng);

        debug!(
            "Reservations: {} structure tiles, {} locked",
            reservations.count(Reservation::Structure),
            reservations.count(Reservation::Locked)
        );
        info!(
            "Generated floor {} ({}): {} rooms, {} corridors, {} doors, {} keys",
            config.floor,
            self.biome.id,
            rooms.len(),
            corridors.len(),
            level.doors.len(),
            keys.len()
        );

        level.rooms = rooms;
        level.corridors = corridors;
        Ok(GeneratedFloor {
            level,
            requests: queue.into_vec(),
        })
    }

    fn validate(&self, floor: &GeneratedFloor, config: &GenerationConfig) -> DelveResult<()> {
        let level = &floor.level;
        let rooms = &level.rooms;
        let fail = |message: String| Err(DelveError::GenerationFailed(message));

        if rooms.is_empty() {
            return Ok(());
        }

        // Single entrance and exit
        let entrances = level.rooms_of_type(RoomType::Entrance).count();
        let exits = level.rooms_of_type(RoomType::Exit).count();
        if entrances != 1 {
            return fail(format!("expected one entrance room, found {}", entrances));
        }
        if rooms.len() >= 2 && exits != 1 {
            return fail(format!("expected one exit room, found {}", exits));
        }

        // Footprints
        for (i, a) in rooms.iter().enumerate() {
            if let Some(b) = rooms[i + 1..].iter().find(|b| a.overlaps(b)) {
                return fail(format!("rooms {} and {} overlap", a.id, b.id));
            }
        }

        // Room graph connectivity
        let Some(entrance) = level.rooms_of_type(RoomType::Entrance).next() else {
            return fail("missing entrance room".to_string());
        };
        let reached = reachable_rooms(rooms, entrance.id, &BTreeSet::new());
        if let Some(room) = rooms.iter().find(|r| !reached.contains(&r.id)) {
            return fail(format!("room {} is not connected to the entrance", room.id));
        }

        // Walkable connectivity between room centres
        let walkable = walkable_from(level, entrance.center(), &BTreeSet::new());
        if let Some(room) = rooms.iter().find(|r| !walkable.contains(&r.center())) {
            return fail(format!("room {} cannot be walked to", room.id));
        }

        // Special cap
        let specials = rooms.iter().filter(|r| r.is_special).count();
        let cap = config.special_room_cap(rooms.len());
        if specials > cap {
            return fail(format!("{} special rooms exceed the cap of {}", specials, cap));
        }

        // Doors
        if let Some(door) = level.doors.iter().find(|d| !is_chokepoint(level, d.position)) {
            return fail(format!(
                "door at ({}, {}) is not a chokepoint",
                door.position.x, door.position.y
            ));
        }

        // Doorways are single tiles, each guarded by a door of its room
        for room in rooms {
            let openings: Vec<Position> = room
                .wall_positions()
                .into_iter()
                .filter(|&pos| level.is_passable(pos))
                .collect();
            for &opening in &openings {
                let widened = room.is_corner(opening)
                    || opening
                        .cardinal_adjacent_positions()
                        .iter()
                        .any(|next| openings.contains(next));
                if widened {
                    return fail(format!(
                        "room {} has a doorway wider than one tile at ({}, {})",
                        room.id, opening.x, opening.y
                    ));
                }
                let guarded = level.doors.iter().any(|d| {
                    d.room_id == room.id
                        && (d.position == opening
                            || (d.position.manhattan_distance(opening) == 1
                                && !room.contains(d.position)))
                });
                if !guarded {
                    return fail(format!(
                        "doorway ({}, {}) into room {} has no door",
                        opening.x, opening.y, room.id
                    ));
                }
            }
        }

        // Locked rooms stay shut while their doors are closed
        let locked = locked_rooms(level);
        let locked_doors: BTreeSet<Position> = level
            .doors
            .iter()
            .filter(|d| d.kind.is_locked())
            .map(|d| d.position)
            .collect();
        let outside = walkable_from(level, entrance.center(), &locked_doors);
        if let Some(room) = rooms.iter().find(|r| {
            locked.contains(&r.id)
                && !r.contains(entrance.center())
                && outside.contains(&r.center())
        }) {
            return fail(format!(
                "locked room {} can be entered without its key",
                room.id
            ));
        }

        // Keys
        let eligible: Vec<&Room> = rooms
            .iter()
            .filter(|r| !locked.contains(&r.id))
            .filter(|r| !matches!(r.room_type, RoomType::Entrance | RoomType::Exit))
            .collect();
        let mut keyed = BTreeSet::new();
        for (position, unlocks_room) in floor.keys() {
            if !locked.contains(&unlocks_room) {
                return fail(format!("key for room {} opens no lock", unlocks_room));
            }
            if !eligible.iter().any(|r| r.contains_interior(position)) {
                return fail(format!(
                    "key for room {} is not in an eligible host room",
                    unlocks_room
                ));
            }
            keyed.insert(unlocks_room);
        }
        let expected = locked.len().min(eligible.len());
        if keyed.len() < expected {
            return fail(format!(
                "only {} of {} locked rooms have keys",
                keyed.len(),
                expected
            ));
        }

        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "DungeonGenerator"
    }
}

/// Generates a floor with the built-in templates and the default biome.
pub fn generate_floor(width: u32, height: u32, floor: u32, seed: u64) -> DelveResult<GeneratedFloor> {
    let templates = TemplateRegistry::builtin();
    let biome = BiomeDefinition::default();
    let config = GenerationConfig::new(seed)
        .with_size(width, height)
        .with_floor(floor);
    DungeonGenerator::new(&templates, &biome).generate_floor(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Door, DoorKind, MaterialId, TerrainType, Tile};

    fn failure(result: DelveResult<()>) -> String {
        match result {
            Err(DelveError::GenerationFailed(message)) => message,
            other => panic!("expected a generation failure, got {:?}", other),
        }
    }

    fn generate(config: &GenerationConfig) -> GeneratedFloor {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::crypt();
        DungeonGenerator::new(&registry, &biome)
            .generate_floor(config)
            .unwrap()
    }

    #[test]
    fn test_generator_type() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::default();
        let generator = DungeonGenerator::new(&registry, &biome);
        assert_eq!(generator.generator_type(), "DungeonGenerator");
    }

    #[test]
    fn test_generation_with_small_level() {
        let config = GenerationConfig::for_testing(12345);
        let floor = generate(&config);

        assert_eq!(floor.level.width, 30);
        assert_eq!(floor.level.height, 30);
        assert!(!floor.level.rooms.is_empty());
        assert!(floor.level.count_terrain(TerrainType::Wall) < 900);
    }

    #[test]
    fn test_generated_floor_validates() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::caverns();
        let generator = DungeonGenerator::new(&registry, &biome);
        for seed in 0..10 {
            let config = GenerationConfig::new(seed).with_floor(5);
            let floor = generator.generate_floor(&config).unwrap();
            generator.validate(&floor, &config).unwrap();
        }
    }

    #[test]
    fn test_same_seed_same_floor() {
        let config = GenerationConfig::new(99).with_floor(3);
        assert_eq!(generate(&config), generate(&config));
    }

    #[test]
    fn test_stairs_match_entrance_and_exit() {
        let floor = generate(&GenerationConfig::new(8));
        let level = &floor.level;
        let entrance = level.rooms_of_type(RoomType::Entrance).next().unwrap();
        assert_eq!(level.entrance, Some(entrance.center()));
        assert!(floor.requests.contains(&PlacementRequest::Staircase {
            position: entrance.center(),
            direction: StairDirection::Up,
        }));
        assert_eq!(floor.count("staircase"), 2);
    }

    #[test]
    fn test_spawn_points_skip_entrance() {
        let floor = generate(&GenerationConfig::new(21));
        let level = &floor.level;
        let entrance = level.rooms_of_type(RoomType::Entrance).next().unwrap();
        assert!(level.spawn_points.iter().all(|&p| !entrance.contains(p)));
        assert!(level.spawn_points.len() < level.rooms.len());
    }

    #[test]
    fn test_tiny_floor_has_no_rooms() {
        let config = GenerationConfig::new(1).with_size(6, 6);
        let floor = generate(&config);
        assert!(floor.level.rooms.is_empty());
        assert!(floor.requests.is_empty());
        assert_eq!(floor.level.count_terrain(TerrainType::Wall), 36);
    }

    #[test]
    fn test_validation_rejects_second_entrance() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::crypt();
        let generator = DungeonGenerator::new(&registry, &biome);
        let config = GenerationConfig::new(5);
        let mut floor = generator.generate_floor(&config).unwrap();

        let last = floor.level.rooms.len() - 1;
        floor.level.rooms[last].room_type = RoomType::Entrance;
        assert!(matches!(
            generator.validate(&floor, &config),
            Err(DelveError::GenerationFailed(_))
        ));
    }

    #[test]
    fn test_validation_rejects_door_in_open_floor() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::crypt();
        let generator = DungeonGenerator::new(&registry, &biome);
        let config = GenerationConfig::new(5);
        let mut floor = generator.generate_floor(&config).unwrap();

        let center = floor.level.rooms[0].center();
        floor.level.doors.push(crate::Door {
            position: center,
            kind: DoorKind::Door,
            room_id: 0,
        });
        assert!(generator.validate(&floor, &config).is_err());
    }

    #[test]
    fn test_convenience_generation() {
        let floor = generate_floor(
            crate::config::DEFAULT_FLOOR_WIDTH,
            crate::config::DEFAULT_FLOOR_HEIGHT,
            1,
            77,
        )
        .unwrap();
        assert_eq!(floor.level.floor, 1);
        assert_eq!(floor.count("item"), 1);
    }

    #[test]
    fn test_validation_rejects_wide_doorway() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::crypt();
        let generator = DungeonGenerator::new(&registry, &biome);
        let config = GenerationConfig::new(5);
        let mut floor = generator.generate_floor(&config).unwrap();
        generator.validate(&floor, &config).unwrap();

        let room = floor.level.rooms[0].clone();
        let opening = room
            .wall_positions()
            .into_iter()
            .find(|&pos| floor.level.is_passable(pos))
            .unwrap();
        let beside = opening
            .cardinal_adjacent_positions()
            .into_iter()
            .find(|&pos| room.is_border(pos))
            .unwrap();
        floor.level.set_tile(beside, Tile::floor(MaterialId(0))).unwrap();
        assert!(generator.validate(&floor, &config).is_err());
    }

    #[test]
    fn test_validation_rejects_unguarded_doorway() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::crypt();
        let generator = DungeonGenerator::new(&registry, &biome);
        let config = GenerationConfig::new(6);
        let mut floor = generator.generate_floor(&config).unwrap();

        let room = floor
            .level
            .rooms
            .iter()
            .find(|r| r.room_type != RoomType::Entrance)
            .map(|r| r.id)
            .unwrap();
        floor.level.doors.retain(|d| d.room_id != room);
        assert!(failure(generator.validate(&floor, &config)).contains("has no door"));
    }

    #[test]
    fn test_validation_rejects_lock_bypass() {
        let registry = TemplateRegistry::builtin();
        let biome = BiomeDefinition::crypt();
        let generator = DungeonGenerator::new(&registry, &biome);
        let config = GenerationConfig::new(7);
        let mut floor = generator.generate_floor(&config).unwrap();
        for door in floor.level.doors.iter_mut() {
            door.kind = DoorKind::Door;
        }

        // Lock a neighbour of the entrance with a door that is not on its way
        let level = &floor.level;
        let entrance = level.rooms_of_type(RoomType::Entrance).next().unwrap();
        let target = entrance.connections[0];
        let elsewhere = level
            .doors
            .iter()
            .find(|d| d.room_id != entrance.id && d.room_id != target)
            .map(|d| d.position)
            .unwrap();
        floor.level.doors.push(Door {
            position: elsewhere,
            kind: DoorKind::Locked,
            room_id: target,
        });

        assert!(failure(generator.validate(&floor, &config)).contains("without its key"));
    }
}
