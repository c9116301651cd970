//! # Terrain Features
//!
//! Decorative terrain painted over the carved floor after doors are placed.
//! Features only ever replace plain floor with other passable terrain and
//! never touch locked tiles, so doorways and connectivity survive them.

use crate::{Direction, Level, MaterialId, Position, TerrainType, TileReservations};
use log::debug;
use noise::{NoiseFn, Perlin};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, Rng};
use serde::{Deserialize, Serialize};

/// Scale applied to tile coordinates before sampling patch noise.
const PATCH_NOISE_SCALE: f64 = 0.3;

/// A terrain feature generator configured by a biome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureConfig {
    /// Meandering one-tile-wide strips, such as streams
    Linear {
        terrain: TerrainType,
        #[serde(default)]
        material: Option<String>,
        count: u32,
        length: u32,
    },
    /// Noise-shaped blobs around random centres
    Patch {
        terrain: TerrainType,
        #[serde(default)]
        material: Option<String>,
        count: u32,
        radius: u32,
        threshold: f64,
    },
}

impl FeatureConfig {
    pub fn terrain(&self) -> TerrainType {
        match self {
            FeatureConfig::Linear { terrain, .. } | FeatureConfig::Patch { terrain, .. } => {
                *terrain
            }
        }
    }

    fn material(&self) -> Option<&str> {
        match self {
            FeatureConfig::Linear { material, .. } | FeatureConfig::Patch { material, .. } => {
                material.as_deref()
            }
        }
    }
}

/// Applies every feature in order and returns the number of repainted tiles.
pub fn apply_features(
    level: &mut Level,
    reservations: &mut TileReservations,
    features: &[FeatureConfig],
    rng: &mut StdRng,
) -> usize {
    let mut painted = 0;
    for feature in features {
        let material = feature.material().map(|name| level.intern_material(name));
        let mut painter = Painter {
            level: &mut *level,
            reservations: &mut *reservations,
            terrain: feature.terrain(),
            material,
            painted: 0,
        };
        match feature {
            FeatureConfig::Linear { count, length, .. } => {
                for _ in 0..*count {
                    painter.linear(*length, rng);
                }
            }
            FeatureConfig::Patch {
                count,
                radius,
                threshold,
                ..
            } => {
                for _ in 0..*count {
                    painter.patch(*radius as i32, *threshold, rng);
                }
            }
        }
        painted += painter.painted;
    }
    debug!("Terrain features repainted {} tiles", painted);
    painted
}

struct Painter<'a> {
    level: &'a mut Level,
    reservations: &'a mut TileReservations,
    terrain: TerrainType,
    material: Option<MaterialId>,
    painted: usize,
}

impl Painter<'_> {
    fn paint(&mut self, pos: Position) {
        let is_floor = self.level.terrain_at(pos) == Some(TerrainType::Floor);
        if !is_floor || !self.reservations.claim(pos) {
            return;
        }
        if let Some(tile) = self.level.get_tile_mut(pos) {
            tile.terrain = self.terrain;
            if let Some(material) = self.material {
                tile.material = material;
            }
            self.painted += 1;
        }
    }

    fn random_floor(&self, rng: &mut StdRng) -> Option<Position> {
        let floors: Vec<Position> = self
            .level
            .tiles
            .iter()
            .enumerate()
            .flat_map(|(y, row)| {
                row.iter()
                    .enumerate()
                    .filter(|(_, tile)| tile.terrain == TerrainType::Floor)
                    .map(move |(x, _)| Position::new(x as i32, y as i32))
            })
            .collect();
        floors.choose(rng).copied()
    }

    fn linear(&mut self, length: u32, rng: &mut StdRng) {
        let Some(mut pos) = self.random_floor(rng) else {
            return;
        };
        let mut direction = *Direction::cardinal().choose(rng).unwrap_or(&Direction::East);

        for _ in 0..length {
            self.paint(pos);

            if rng.gen_bool(0.25) {
                direction = *Direction::cardinal().choose(rng).unwrap_or(&direction);
            }
            if !self.level.is_passable(pos.step(direction)) {
                let open: Vec<Direction> = Direction::cardinal()
                    .into_iter()
                    .filter(|d| self.level.is_passable(pos.step(*d)))
                    .collect();
                match open.choose(rng) {
                    Some(&d) => direction = d,
                    None => return,
                }
            }
            pos = pos.step(direction);
        }
    }

    fn patch(&mut self, radius: i32, threshold: f64, rng: &mut StdRng) {
        let Some(center) = self.random_floor(rng) else {
            return;
        };
        let perlin = Perlin::new(rng.gen());
        let radius = radius.max(1);

        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let distance = ((dx * dx + dy * dy) as f64).sqrt();
                if distance > radius as f64 {
                    continue;
                }
                let pos = Position::new(center.x + dx, center.y + dy);
                let sample = perlin.get([
                    pos.x as f64 * PATCH_NOISE_SCALE,
                    pos.y as f64 * PATCH_NOISE_SCALE,
                ]);
                // Denser towards the centre
                let falloff = 1.0 - distance / radius as f64;
                if sample + falloff * 0.5 >= threshold {
                    self.paint(pos);
                }
            }
        }
    }
}
