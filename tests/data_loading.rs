//! Loading templates and biomes from JSON files.

use delve::{
    BiomeDefinition, DelveError, DelveResult, DungeonGenerator, FeatureConfig, GenerationConfig,
    Generator, RoomType, TemplateRegistry, TerrainType,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_temp(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_builtin_registry_survives_a_file_round_trip() -> DelveResult<()> {
    let registry = TemplateRegistry::builtin();
    let file = write_temp(&registry.to_json()?);
    let loaded = TemplateRegistry::load(file.path())?;
    assert_eq!(loaded, registry);
    Ok(())
}

#[test]
fn test_custom_registry_drives_generation() -> DelveResult<()> {
    let file = write_temp(
        r#"{
            "templates": [
                { "id": "hall", "category": "basic", "room_type": "basic", "base_weight": 5.0 },
                { "id": "larder", "category": "basic", "room_type": "storage" },
                { "id": "reliquary", "category": "special", "room_type": "shrine",
                  "materials": ["marble"], "tags": ["holy"] }
            ],
            "floors": [
                { "min_floor": 1, "distribution": [
                    { "room_type": "storage", "weight": 100.0 }
                ] }
            ]
        }"#,
    );
    let registry = TemplateRegistry::load(file.path())?;
    let biome = BiomeDefinition::crypt();
    let generator = DungeonGenerator::new(&registry, &biome);
    let config = GenerationConfig::for_detailed_generation(8);
    let floor = generator.generate_floor(&config)?;

    let rooms = &floor.level.rooms;
    assert!(rooms.iter().all(|r| matches!(
        r.room_type,
        RoomType::Entrance | RoomType::Exit | RoomType::Storage | RoomType::Shrine
    )));
    for shrine in rooms.iter().filter(|r| r.room_type == RoomType::Shrine) {
        assert!(shrine.is_special);
        assert!(shrine.has_tag("holy"));
    }
    generator.validate(&floor, &config)
}

#[test]
fn test_biome_file_loads() -> DelveResult<()> {
    let file = write_temp(
        r#"{
            "id": "flooded_mine",
            "corridor_width": 2,
            "default_material": "shale",
            "alternate_material": "timber",
            "features": [
                { "kind": "linear", "terrain": "shallow_water", "count": 2, "length": 20 }
            ]
        }"#,
    );
    let biome = BiomeDefinition::load(file.path())?;
    assert_eq!(biome.corridor_width, 2);
    assert_eq!(biome.corridor_material(), "timber");
    assert!(matches!(
        biome.features[0],
        FeatureConfig::Linear {
            terrain: TerrainType::ShallowWater,
            ..
        }
    ));

    let registry = TemplateRegistry::builtin();
    let floor = DungeonGenerator::new(&registry, &biome).generate_floor(&GenerationConfig::new(4))?;
    assert!(floor.level.materials.iter().any(|m| m == "timber"));
    Ok(())
}

#[test]
fn test_bad_files_are_rejected() {
    let broken = write_temp("{ not json");
    assert!(matches!(
        TemplateRegistry::load(broken.path()),
        Err(DelveError::Serde(_))
    ));

    let negative = write_temp(
        r#"{ "templates": [
            { "id": "a", "category": "basic", "room_type": "basic", "base_weight": -1.0 }
        ] }"#,
    );
    assert!(matches!(
        TemplateRegistry::load(negative.path()),
        Err(DelveError::InvalidData(_))
    ));

    assert!(matches!(
        BiomeDefinition::load("/definitely/not/here.json"),
        Err(DelveError::Io(_))
    ));
}
