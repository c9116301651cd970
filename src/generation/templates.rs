//! # Room Templates
//!
//! Read-only room archetype data and per-floor rules. The registry is built
//! once by the application and passed by reference into every generator.

use crate::{DelveError, DelveResult, Room, RoomType};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Which assignment pass a template belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateCategory {
    Basic,
    Special,
    Flavor,
}

/// Linear weight ramp between two floors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthScaling {
    pub start_floor: u32,
    pub end_floor: u32,
    /// Weight factor reached at `end_floor`
    pub multiplier: f64,
}

impl DepthScaling {
    /// `1 + (multiplier - 1) * clamp01((floor - start) / (end - start))`
    pub fn factor(&self, floor: u32) -> f64 {
        let progress = if self.end_floor <= self.start_floor {
            if floor >= self.start_floor {
                1.0
            } else {
                0.0
            }
        } else {
            (floor as f64 - self.start_floor as f64)
                / (self.end_floor as f64 - self.start_floor as f64)
        };
        1.0 + (self.multiplier - 1.0) * progress.clamp(0.0, 1.0)
    }
}

fn default_weight() -> f64 {
    1.0
}

/// A room archetype.
///
/// Size bounds are measured on the room footprint, walls included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomTemplate {
    pub id: String,
    pub category: TemplateCategory,
    pub room_type: RoomType,
    #[serde(default)]
    pub min_width: u32,
    #[serde(default)]
    pub min_height: u32,
    #[serde(default)]
    pub max_width: Option<u32>,
    #[serde(default)]
    pub max_height: Option<u32>,
    #[serde(default)]
    pub min_floor: Option<u32>,
    #[serde(default)]
    pub max_floor: Option<u32>,
    #[serde(default = "default_weight")]
    pub base_weight: f64,
    #[serde(default)]
    pub depth_scaling: Option<DepthScaling>,
    /// Weight multipliers keyed by biome id
    #[serde(default)]
    pub biome_weights: BTreeMap<String, f64>,
    /// Preferred wall/floor materials, first choice first
    #[serde(default)]
    pub materials: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RoomTemplate {
    pub fn new(id: &str, category: TemplateCategory, room_type: RoomType) -> Self {
        Self {
            id: id.to_string(),
            category,
            room_type,
            min_width: 0,
            min_height: 0,
            max_width: None,
            max_height: None,
            min_floor: None,
            max_floor: None,
            base_weight: 1.0,
            depth_scaling: None,
            biome_weights: BTreeMap::new(),
            materials: Vec::new(),
            tags: Vec::new(),
        }
    }

    pub fn with_size(mut self, min: (u32, u32), max: Option<(u32, u32)>) -> Self {
        self.min_width = min.0;
        self.min_height = min.1;
        self.max_width = max.map(|m| m.0);
        self.max_height = max.map(|m| m.1);
        self
    }

    pub fn with_floors(mut self, min_floor: Option<u32>, max_floor: Option<u32>) -> Self {
        self.min_floor = min_floor;
        self.max_floor = max_floor;
        self
    }

    pub fn with_weight(mut self, base_weight: f64) -> Self {
        self.base_weight = base_weight;
        self
    }

    pub fn with_depth_scaling(mut self, start_floor: u32, end_floor: u32, multiplier: f64) -> Self {
        self.depth_scaling = Some(DepthScaling {
            start_floor,
            end_floor,
            multiplier,
        });
        self
    }

    pub fn with_biome_weight(mut self, biome: &str, weight: f64) -> Self {
        self.biome_weights.insert(biome.to_string(), weight);
        self
    }

    pub fn with_materials(mut self, materials: &[&str]) -> Self {
        self.materials = materials.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// Whether the room footprint lies within this template's size bounds.
    pub fn fits(&self, room: &Room) -> bool {
        room.width >= self.min_width
            && room.height >= self.min_height
            && self.max_width.map_or(true, |max| room.width <= max)
            && self.max_height.map_or(true, |max| room.height <= max)
    }

    pub fn allowed_on_floor(&self, floor: u32) -> bool {
        self.min_floor.map_or(true, |min| floor >= min)
            && self.max_floor.map_or(true, |max| floor <= max)
    }

    /// Selection weight on `floor` in `biome`.
    ///
    /// # Examples
    ///
    /// ```
    /// use delve::{RoomTemplate, RoomType, TemplateCategory};
    ///
    /// let template = RoomTemplate::new("vault", TemplateCategory::Special, RoomType::Treasure)
    ///     .with_weight(2.0)
    ///     .with_depth_scaling(1, 11, 3.0)
    ///     .with_biome_weight("crypt", 0.5);
    ///
    /// assert_eq!(template.weight(1, "caverns"), 2.0);
    /// assert_eq!(template.weight(6, "caverns"), 4.0);
    /// assert_eq!(template.weight(20, "crypt"), 3.0);
    /// ```
    pub fn weight(&self, floor: u32, biome: &str) -> f64 {
        let depth = self.depth_scaling.map_or(1.0, |d| d.factor(floor));
        let biome = self.biome_weights.get(biome).copied().unwrap_or(1.0);
        self.base_weight * depth * biome
    }
}

/// One row of a floor's room-type distribution table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionEntry {
    pub room_type: RoomType,
    /// Percentage share; a table's weights sum to 100
    pub weight: f64,
}

/// Room rules for a range of floors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FloorRules {
    pub min_floor: u32,
    #[serde(default)]
    pub max_floor: Option<u32>,
    /// Room types that must appear on the floor
    #[serde(default)]
    pub required: Vec<RoomType>,
    #[serde(default)]
    pub distribution: Vec<DistributionEntry>,
    /// The exit of a boss floor is sealed with a boss door
    #[serde(default)]
    pub boss_floor: bool,
}

impl FloorRules {
    pub fn covers(&self, floor: u32) -> bool {
        floor >= self.min_floor && self.max_floor.map_or(true, |max| floor <= max)
    }

    /// Single roulette-wheel draw over the distribution table.
    ///
    /// An empty or all-zero table always yields [`RoomType::Basic`].
    pub fn roll_room_type(&self, rng: &mut StdRng) -> RoomType {
        let weights = self.distribution.iter().map(|entry| entry.weight.max(0.0));
        match WeightedIndex::new(weights) {
            Ok(dist) => self.distribution[dist.sample(rng)].room_type,
            Err(_) => RoomType::Basic,
        }
    }
}

impl Default for FloorRules {
    fn default() -> Self {
        Self {
            min_floor: 1,
            max_floor: None,
            required: Vec::new(),
            distribution: vec![DistributionEntry {
                room_type: RoomType::Basic,
                weight: 100.0,
            }],
            boss_floor: false,
        }
    }
}

/// Read-only store of room templates and floor rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateRegistry {
    pub templates: Vec<RoomTemplate>,
    #[serde(default)]
    pub floors: Vec<FloorRules>,
}

impl TemplateRegistry {
    /// Creates a registry after checking the data is usable.
    pub fn new(templates: Vec<RoomTemplate>, floors: Vec<FloorRules>) -> DelveResult<Self> {
        let registry = Self { templates, floors };
        registry.check()?;
        Ok(registry)
    }

    pub fn from_json(json: &str) -> DelveResult<Self> {
        let registry: Self = serde_json::from_str(json)?;
        registry.check()?;
        Ok(registry)
    }

    pub fn load(path: impl AsRef<Path>) -> DelveResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> DelveResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn check(&self) -> DelveResult<()> {
        let mut ids = BTreeSet::new();
        for template in &self.templates {
            if !ids.insert(template.id.as_str()) {
                return Err(DelveError::InvalidData(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
            let negative_biome = template.biome_weights.values().any(|&w| w < 0.0);
            if template.base_weight < 0.0 || negative_biome {
                return Err(DelveError::InvalidData(format!(
                    "template '{}' has a negative weight",
                    template.id
                )));
            }
            let inverted = template.max_width.map_or(false, |m| m < template.min_width)
                || template.max_height.map_or(false, |m| m < template.min_height)
                || matches!((template.min_floor, template.max_floor), (Some(a), Some(b)) if b < a);
            if inverted {
                return Err(DelveError::InvalidData(format!(
                    "template '{}' has inverted bounds",
                    template.id
                )));
            }
        }
        for rules in &self.floors {
            if rules.distribution.iter().any(|entry| entry.weight < 0.0) {
                return Err(DelveError::InvalidData(format!(
                    "floor rules starting at {} have a negative weight",
                    rules.min_floor
                )));
            }
        }
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&RoomTemplate> {
        self.templates.iter().find(|template| template.id == id)
    }

    /// Rules covering `floor`; the first matching entry wins.
    pub fn floor_rules(&self, floor: u32) -> FloorRules {
        self.floors
            .iter()
            .find(|rules| rules.covers(floor))
            .cloned()
            .unwrap_or_default()
    }

    /// Templates of `category` usable on `floor`.
    pub fn by_category(
        &self,
        category: TemplateCategory,
        floor: u32,
    ) -> impl Iterator<Item = &RoomTemplate> {
        self.templates
            .iter()
            .filter(move |t| t.category == category && t.allowed_on_floor(floor))
    }

    /// Templates producing `room_type` usable on `floor`.
    pub fn by_room_type(&self, room_type: RoomType, floor: u32) -> impl Iterator<Item = &RoomTemplate> {
        self.templates
            .iter()
            .filter(move |t| t.room_type == room_type && t.allowed_on_floor(floor))
    }

    /// The stock data set shipped with the crate.
    pub fn builtin() -> Self {
        use RoomType::*;
        use TemplateCategory as C;

        let templates = vec![
            RoomTemplate::new("entrance_hall", C::Basic, Entrance)
                .with_weight(0.0)
                .with_tags(&["entrance"]),
            RoomTemplate::new("exit_stairwell", C::Basic, Exit)
                .with_weight(0.0)
                .with_tags(&["exit"]),
            RoomTemplate::new("plain_room", C::Basic, Basic).with_weight(10.0),
            RoomTemplate::new("kitchen", C::Basic, Kitchen)
                .with_size((6, 6), None)
                .with_materials(&["tile"])
                .with_tags(&["kitchen"]),
            RoomTemplate::new("bedroom", C::Basic, Bedroom)
                .with_size((5, 5), Some((10, 10)))
                .with_materials(&["wood"])
                .with_tags(&["bedroom"]),
            RoomTemplate::new("storeroom", C::Basic, Storage).with_tags(&["storage"]),
            RoomTemplate::new("boss_lair", C::Special, Boss)
                .with_size((8, 8), None)
                .with_floors(Some(5), None)
                .with_weight(0.0)
                .with_materials(&["obsidian"])
                .with_tags(&["boss"]),
            RoomTemplate::new("treasure_vault", C::Special, Treasure)
                .with_size((5, 5), Some((9, 9)))
                .with_weight(3.0)
                .with_depth_scaling(1, 10, 2.0)
                .with_materials(&["gilded_stone"])
                .with_tags(&["treasure"]),
            RoomTemplate::new("grand_library", C::Special, Library)
                .with_size((7, 7), None)
                .with_weight(2.0)
                .with_biome_weight("crypt", 1.5)
                .with_biome_weight("snowy_village", 0.5)
                .with_materials(&["oak"])
                .with_tags(&["library"]),
            RoomTemplate::new("armory", C::Special, Armory)
                .with_size((8, 8), None)
                .with_weight(2.0)
                .with_materials(&["iron"])
                .with_tags(&["armory"]),
            RoomTemplate::new("merchant_shop", C::Special, Shop)
                .with_size((6, 6), None)
                .with_floors(Some(2), None)
                .with_weight(1.5)
                .with_tags(&["shop"]),
            RoomTemplate::new("shrine", C::Special, Shrine)
                .with_size((5, 5), Some((9, 9)))
                .with_weight(1.0)
                .with_depth_scaling(3, 12, 2.5)
                .with_biome_weight("caverns", 1.5)
                .with_materials(&["marble"])
                .with_tags(&["shrine"]),
            RoomTemplate::new("storage_nook", C::Flavor, Storage)
                .with_size((5, 5), Some((8, 8)))
                .with_weight(2.0)
                .with_tags(&["storage", "nook"]),
            RoomTemplate::new("prison_cell", C::Flavor, Prison)
                .with_size((5, 5), Some((8, 8)))
                .with_floors(Some(3), None)
                .with_materials(&["iron"])
                .with_tags(&["prison"]),
            RoomTemplate::new("overgrown_nook", C::Flavor, Basic)
                .with_biome_weight("caverns", 3.0)
                .with_biome_weight("snowy_village", 0.5)
                .with_materials(&["mossy_stone"])
                .with_tags(&["overgrown"]),
        ];

        let distribution = |entries: &[(RoomType, f64)]| {
            entries
                .iter()
                .map(|&(room_type, weight)| DistributionEntry { room_type, weight })
                .collect::<Vec<_>>()
        };

        let floors = vec![
            FloorRules {
                min_floor: 1,
                max_floor: Some(1),
                required: Vec::new(),
                distribution: distribution(&[
                    (Basic, 60.0),
                    (Kitchen, 15.0),
                    (Bedroom, 15.0),
                    (Storage, 10.0),
                ]),
                boss_floor: false,
            },
            FloorRules {
                min_floor: 2,
                max_floor: Some(4),
                required: vec![Armory],
                distribution: distribution(&[
                    (Basic, 50.0),
                    (Kitchen, 15.0),
                    (Bedroom, 15.0),
                    (Storage, 20.0),
                ]),
                boss_floor: false,
            },
            FloorRules {
                min_floor: 5,
                max_floor: Some(5),
                required: vec![Boss],
                distribution: distribution(&[(Basic, 70.0), (Storage, 30.0)]),
                boss_floor: true,
            },
            FloorRules {
                min_floor: 6,
                max_floor: Some(9),
                required: vec![Armory, Treasure],
                distribution: distribution(&[
                    (Basic, 40.0),
                    (Kitchen, 20.0),
                    (Bedroom, 20.0),
                    (Storage, 20.0),
                ]),
                boss_floor: false,
            },
            FloorRules {
                min_floor: 10,
                max_floor: Some(10),
                required: vec![Boss],
                distribution: distribution(&[(Basic, 60.0), (Storage, 40.0)]),
                boss_floor: true,
            },
            FloorRules {
                min_floor: 11,
                max_floor: None,
                required: vec![Treasure],
                distribution: distribution(&[(Basic, 50.0), (Storage, 50.0)]),
                boss_floor: false,
            },
        ];

        Self { templates, floors }
    }
}

/// Draws one template by weight.
///
/// Templates with a non-positive weight are never drawn; returns `None` when
/// nothing is left to draw from.
pub fn pick_weighted<'a>(
    candidates: &[&'a RoomTemplate],
    floor: u32,
    biome: &str,
    rng: &mut StdRng,
) -> Option<&'a RoomTemplate> {
    let weights: Vec<f64> = candidates
        .iter()
        .map(|template| template.weight(floor, biome).max(0.0))
        .collect();
    let dist = WeightedIndex::new(&weights).ok()?;
    Some(candidates[dist.sample(rng)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;
    use rand::SeedableRng;

    #[test]
    fn test_depth_scaling_factor() {
        let scaling = DepthScaling {
            start_floor: 2,
            end_floor: 6,
            multiplier: 3.0,
        };
        assert_eq!(scaling.factor(1), 1.0);
        assert_eq!(scaling.factor(2), 1.0);
        assert_eq!(scaling.factor(4), 2.0);
        assert_eq!(scaling.factor(6), 3.0);
        assert_eq!(scaling.factor(30), 3.0);
    }

    #[test]
    fn test_degenerate_depth_scaling_is_a_step() {
        let scaling = DepthScaling {
            start_floor: 4,
            end_floor: 4,
            multiplier: 2.0,
        };
        assert_eq!(scaling.factor(3), 1.0);
        assert_eq!(scaling.factor(4), 2.0);
    }

    #[test]
    fn test_template_fit_and_floor_range() {
        let template = RoomTemplate::new("hall", TemplateCategory::Basic, RoomType::Basic)
            .with_size((6, 6), Some((10, 10)))
            .with_floors(Some(2), Some(4));

        assert!(template.fits(&Room::new(0, Position::new(0, 0), 6, 10)));
        assert!(!template.fits(&Room::new(0, Position::new(0, 0), 5, 8)));
        assert!(!template.fits(&Room::new(0, Position::new(0, 0), 11, 8)));
        assert!(!template.allowed_on_floor(1));
        assert!(template.allowed_on_floor(3));
        assert!(!template.allowed_on_floor(5));
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = TemplateRegistry::builtin();
        assert!(registry.check().is_ok());
        assert!(registry.get("armory").is_some());
        assert!(registry.floor_rules(5).boss_floor);
        assert_eq!(registry.floor_rules(3).required, vec![RoomType::Armory]);
        assert!(registry.floor_rules(42).covers(42));
    }

    #[test]
    fn test_registry_rejects_duplicates() {
        let t = RoomTemplate::new("a", TemplateCategory::Basic, RoomType::Basic);
        let result = TemplateRegistry::new(vec![t.clone(), t], Vec::new());
        assert!(matches!(result, Err(DelveError::InvalidData(_))));
    }

    #[test]
    fn test_registry_rejects_inverted_bounds() {
        let t = RoomTemplate::new("a", TemplateCategory::Basic, RoomType::Basic)
            .with_size((8, 8), Some((6, 6)));
        assert!(TemplateRegistry::new(vec![t], Vec::new()).is_err());
    }

    #[test]
    fn test_registry_json_round_trip() {
        let registry = TemplateRegistry::builtin();
        let json = registry.to_json().unwrap();
        let back = TemplateRegistry::from_json(&json).unwrap();
        assert_eq!(back, registry);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let json = r#"{ "templates": [
            { "id": "cell", "category": "flavor", "room_type": "prison" }
        ] }"#;
        let registry = TemplateRegistry::from_json(json).unwrap();
        let cell = registry.get("cell").unwrap();
        assert_eq!(cell.base_weight, 1.0);
        assert!(cell.materials.is_empty());
        assert_eq!(registry.floor_rules(1), FloorRules::default());
    }

    #[test]
    fn test_pick_weighted_skips_zero_weights() {
        let a = RoomTemplate::new("a", TemplateCategory::Special, RoomType::Shop).with_weight(0.0);
        let b = RoomTemplate::new("b", TemplateCategory::Special, RoomType::Shrine);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..20 {
            let picked = pick_weighted(&[&a, &b], 1, "crypt", &mut rng).unwrap();
            assert_eq!(picked.id, "b");
        }
        assert!(pick_weighted(&[&a], 1, "crypt", &mut rng).is_none());
        assert!(pick_weighted(&[], 1, "crypt", &mut rng).is_none());
    }

    #[test]
    fn test_roll_room_type_follows_table() {
        let rules = FloorRules {
            distribution: vec![
                DistributionEntry {
                    room_type: RoomType::Kitchen,
                    weight: 100.0,
                },
                DistributionEntry {
                    room_type: RoomType::Basic,
                    weight: 0.0,
                },
            ],
            ..FloorRules::default()
        };
        let mut rng = StdRng::seed_from_u64(8);
        assert_eq!(rules.roll_room_type(&mut rng), RoomType::Kitchen);

        let empty = FloorRules {
            distribution: Vec::new(),
            ..FloorRules::default()
        };
        assert_eq!(empty.roll_room_type(&mut rng), RoomType::Basic);
    }
}
