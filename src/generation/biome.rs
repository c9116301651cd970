//! # Biomes
//!
//! Per-biome carving parameters: corridor width, materials and the terrain
//! features sprinkled over the finished floor.

use crate::{DelveError, DelveResult, FeatureConfig, TerrainType};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Visual and structural flavour of a floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomeDefinition {
    pub id: String,
    /// Lane count of every corridor
    pub corridor_width: u32,
    /// Material for the bulk rock and plain rooms
    pub default_material: String,
    /// Material for corridors and the walls around them
    #[serde(default)]
    pub alternate_material: Option<String>,
    #[serde(default)]
    pub features: Vec<FeatureConfig>,
}

impl BiomeDefinition {
    pub fn new(id: &str, corridor_width: u32, default_material: &str) -> Self {
        Self {
            id: id.to_string(),
            corridor_width,
            default_material: default_material.to_string(),
            alternate_material: None,
            features: Vec::new(),
        }
    }

    pub fn with_alternate_material(mut self, material: &str) -> Self {
        self.alternate_material = Some(material.to_string());
        self
    }

    pub fn with_feature(mut self, feature: FeatureConfig) -> Self {
        self.features.push(feature);
        self
    }

    pub fn corridor_material(&self) -> &str {
        self.alternate_material
            .as_deref()
            .unwrap_or(&self.default_material)
    }

    pub fn from_json(json: &str) -> DelveResult<Self> {
        let biome: Self = serde_json::from_str(json)?;
        biome.check()?;
        Ok(biome)
    }

    pub fn load(path: impl AsRef<Path>) -> DelveResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    fn check(&self) -> DelveResult<()> {
        if self.corridor_width == 0 {
            return Err(DelveError::InvalidData(format!(
                "biome '{}' has zero corridor width",
                self.id
            )));
        }
        if self
            .features
            .iter()
            .any(|feature| !feature.terrain().is_passable())
        {
            return Err(DelveError::InvalidData(format!(
                "biome '{}' has a feature painting impassable terrain",
                self.id
            )));
        }
        Ok(())
    }

    /// Ids accepted by [`BiomeDefinition::builtin`].
    pub const BUILTIN_IDS: [&'static str; 3] = ["snowy_village", "crypt", "caverns"];

    pub fn builtin(id: &str) -> Option<Self> {
        match id {
            "snowy_village" => Some(Self::snowy_village()),
            "crypt" => Some(Self::crypt()),
            "caverns" => Some(Self::caverns()),
            _ => None,
        }
    }

    pub fn snowy_village() -> Self {
        Self::new("snowy_village", 1, "timber")
            .with_alternate_material("packed_snow")
            .with_feature(FeatureConfig::Patch {
                terrain: TerrainType::Snow,
                material: Some("snow".to_string()),
                count: 4,
                radius: 4,
                threshold: 0.35,
            })
            .with_feature(FeatureConfig::Linear {
                terrain: TerrainType::Ice,
                material: Some("ice".to_string()),
                count: 2,
                length: 14,
            })
    }

    pub fn crypt() -> Self {
        Self::new("crypt", 1, "granite")
            .with_alternate_material("old_brick")
            .with_feature(FeatureConfig::Patch {
                terrain: TerrainType::Rubble,
                material: None,
                count: 3,
                radius: 3,
                threshold: 0.45,
            })
    }

    pub fn caverns() -> Self {
        Self::new("caverns", 3, "limestone")
            .with_alternate_material("rough_rock")
            .with_feature(FeatureConfig::Patch {
                terrain: TerrainType::Grass,
                material: Some("moss".to_string()),
                count: 5,
                radius: 5,
                threshold: 0.3,
            })
            .with_feature(FeatureConfig::Linear {
                terrain: TerrainType::ShallowWater,
                material: Some("water".to_string()),
                count: 1,
                length: 30,
            })
    }
}

impl Default for BiomeDefinition {
    fn default() -> Self {
        Self::crypt()
    }
}
