//! # Room Assignment
//!
//! Gives every room a type and, where possible, a template. Passes run in a
//! fixed order and each only touches rooms no earlier pass has claimed:
//!
//! 1. entrance (start room) and exit (critical-path terminus)
//! 2. the floor's required room types
//! 3. special templates on leaf rooms, capped per floor
//! 4. flavor templates on the remaining leaves
//! 5. everything else from the floor's room-type distribution

use crate::{
    pick_weighted, BiomeDefinition, GenerationConfig, Room, RoomTemplate, RoomType,
    TemplateCategory, TemplateRegistry, Topology,
};
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};

/// What the assignment passes achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    /// Required types no room could host
    pub missing_required: Vec<RoomType>,
    pub specials: usize,
    pub flavors: usize,
}

/// Stamps a template onto a room.
pub fn apply_template(room: &mut Room, template: &RoomTemplate) {
    room.room_type = template.room_type;
    room.template = Some(template.id.clone());
    room.tags.extend(template.tags.iter().cloned());
    room.is_special = template.category == TemplateCategory::Special;
}

/// A room no pass has claimed yet.
fn is_unassigned(room: &Room) -> bool {
    room.room_type == RoomType::Basic && room.template.is_none()
}

/// Assigns room types and templates for one floor.
#[derive(Debug, Clone, Copy)]
pub struct RoomAssignor<'a> {
    pub registry: &'a TemplateRegistry,
    pub biome: &'a str,
    pub floor: u32,
}

impl<'a> RoomAssignor<'a> {
    pub fn new(registry: &'a TemplateRegistry, biome: &'a str, floor: u32) -> Self {
        Self {
            registry,
            biome,
            floor,
        }
    }

    /// Runs every pass in order.
    pub fn assign(
        &self,
        rooms: &mut [Room],
        topology: &Topology,
        config: &GenerationConfig,
        rng: &mut StdRng,
    ) -> AssignmentReport {
        let mut report = AssignmentReport::default();
        if rooms.is_empty() {
            return report;
        }

        self.assign_endpoints(rooms, topology);
        report.missing_required = self.assign_required(rooms, topology, rng);
        report.specials = self.assign_specials(rooms, topology, config, rng);
        report.flavors = self.assign_flavor(rooms, topology, rng);
        self.assign_remaining(rooms, rng);

        debug!(
            "Floor {}: {} specials, {} flavor rooms, {} required types missing",
            self.floor,
            report.specials,
            report.flavors,
            report.missing_required.len()
        );
        report
    }

    fn assign_endpoints(&self, rooms: &mut [Room], topology: &Topology) {
        let mut mark = |id: u32, room_type: RoomType| {
            let Some(room) = rooms.iter_mut().find(|room| room.id == id) else {
                return;
            };
            match self.registry.by_room_type(room_type, self.floor).next() {
                Some(template) => apply_template(room, template),
                None => room.room_type = room_type,
            }
            room.is_special = false;
        };

        mark(topology.start, RoomType::Entrance);
        if topology.terminus != topology.start {
            mark(topology.terminus, RoomType::Exit);
        }
    }

    /// Returns the required types that could not be placed.
    fn assign_required(
        &self,
        rooms: &mut [Room],
        topology: &Topology,
        rng: &mut StdRng,
    ) -> Vec<RoomType> {
        let rules = self.registry.floor_rules(self.floor);
        let leaves: BTreeSet<u32> = topology.leaves.iter().copied().collect();
        let mut missing = Vec::new();

        for required in rules.required {
            let templates: Vec<&RoomTemplate> = self
                .registry
                .by_room_type(required, self.floor)
                .collect();
            if templates.is_empty() {
                warn!(
                    "No template for required room type {} on floor {}",
                    required, self.floor
                );
                missing.push(required);
                continue;
            }

            let mut candidates: Vec<usize> = (0..rooms.len())
                .filter(|&i| is_unassigned(&rooms[i]))
                .collect();
            candidates.shuffle(rng);
            // Dead ends first, so gated rooms do not cut the floor in two
            candidates.sort_by_key(|&i| !leaves.contains(&rooms[i].id));

            let choice = candidates.iter().find_map(|&i| {
                templates
                    .iter()
                    .find(|template| template.fits(&rooms[i]))
                    .map(|template| (i, *template))
            });

            match choice {
                Some((i, template)) => {
                    apply_template(&mut rooms[i], template);
                    debug!("Room {} hosts required {}", rooms[i].id, required);
                }
                None => {
                    warn!(
                        "No room fits required room type {} on floor {}",
                        required, self.floor
                    );
                    missing.push(required);
                }
            }
        }
        missing
    }

    /// Places special templates on leaf rooms; returns how many were placed.
    fn assign_specials(
        &self,
        rooms: &mut [Room],
        topology: &Topology,
        config: &GenerationConfig,
        rng: &mut StdRng,
    ) -> usize {
        let cap = config.special_room_cap(rooms.len());
        let mut special_count = rooms.iter().filter(|room| room.is_special).count();
        let mut used: BTreeSet<String> = rooms
            .iter()
            .filter(|room| room.is_special)
            .filter_map(|room| room.template.clone())
            .collect();

        let mut leaves = self.open_leaves(rooms, topology);
        leaves.shuffle(rng);

        let mut placed = 0;
        for i in leaves {
            if special_count >= cap {
                break;
            }
            let candidates: Vec<&RoomTemplate> = self
                .registry
                .by_category(TemplateCategory::Special, self.floor)
                .filter(|template| !used.contains(&template.id) && template.fits(&rooms[i]))
                .collect();
            let Some(template) = pick_weighted(&candidates, self.floor, self.biome, rng) else {
                continue;
            };
            apply_template(&mut rooms[i], template);
            used.insert(template.id.clone());
            special_count += 1;
            placed += 1;
        }
        placed
    }

    /// Gives every leaf still open a flavor template; returns how many were placed.
    fn assign_flavor(&self, rooms: &mut [Room], topology: &Topology, rng: &mut StdRng) -> usize {
        let mut placed = 0;
        for i in self.open_leaves(rooms, topology) {
            let candidates: Vec<&RoomTemplate> = self
                .registry
                .by_category(TemplateCategory::Flavor, self.floor)
                .filter(|template| template.fits(&rooms[i]))
                .collect();
            match pick_weighted(&candidates, self.floor, self.biome, rng) {
                Some(template) => {
                    apply_template(&mut rooms[i], template);
                    placed += 1;
                }
                None => debug!("No flavor template fits leaf room {}", rooms[i].id),
            }
        }
        placed
    }

    /// Rolls the distribution table for every room still unassigned.
    fn assign_remaining(&self, rooms: &mut [Room], rng: &mut StdRng) {
        let rules = self.registry.floor_rules(self.floor);

        for room in rooms.iter_mut().filter(|room| is_unassigned(room)) {
            let rolled = rules.roll_room_type(rng);
            let matching: Vec<&RoomTemplate> = self
                .registry
                .by_room_type(rolled, self.floor)
                .filter(|t| t.category != TemplateCategory::Special && t.fits(room))
                .collect();

            let template = match pick_weighted(&matching, self.floor, self.biome, rng) {
                Some(template) => Some(template),
                None => {
                    let fallback: Vec<&RoomTemplate> = self
                        .registry
                        .by_category(TemplateCategory::Basic, self.floor)
                        .filter(|t| t.room_type == RoomType::Basic && t.fits(room))
                        .collect();
                    pick_weighted(&fallback, self.floor, self.biome, rng)
                }
            };

            match template {
                Some(template) => apply_template(room, template),
                None => warn!(
                    "No template for room {} (rolled {}) on floor {}",
                    room.id, rolled, self.floor
                ),
            }
        }
    }

    /// Indices of leaf rooms no pass has claimed, in leaf order.
    fn open_leaves(&self, rooms: &[Room], topology: &Topology) -> Vec<usize> {
        topology
            .leaves
            .iter()
            .filter_map(|&id| rooms.iter().position(|room| room.id == id))
            .filter(|&i| is_unassigned(&rooms[i]))
            .collect()
    }
}

/// Picks the material each room is painted with.
///
/// Rooms use one of their template's preferred materials, otherwise the
/// biome default.
pub fn choose_room_materials(
    rooms: &[Room],
    registry: &TemplateRegistry,
    biome: &BiomeDefinition,
    rng: &mut StdRng,
) -> BTreeMap<u32, String> {
    rooms
        .iter()
        .map(|room| {
            let preferred = room
                .template
                .as_deref()
                .and_then(|id| registry.get(id))
                .and_then(|template| template.materials.choose(rng))
                .cloned()
                .unwrap_or_else(|| biome.default_material.clone());
            (room.id, preferred)
        })
        .collect()
}
