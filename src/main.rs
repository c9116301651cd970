//! # Delve Entry Point
//!
//! Generates a single dungeon floor and prints it as an ASCII map followed by
//! its placement requests, or as JSON.

use clap::Parser;
use delve::{
    config, BiomeDefinition, DelveError, DelveResult, DungeonGenerator, GeneratedFloor,
    GenerationConfig, Generator, PlacementRequest, TemplateRegistry,
};
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

/// Command line arguments for the Delve floor generator.
#[derive(Parser, Debug)]
#[command(name = "delve")]
#[command(about = "Procedural dungeon floor generator")]
#[command(version)]
struct Args {
    /// Random seed for floor generation
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Floor width in tiles
    #[arg(long, default_value_t = config::DEFAULT_FLOOR_WIDTH)]
    width: u32,

    /// Floor height in tiles
    #[arg(long, default_value_t = config::DEFAULT_FLOOR_HEIGHT)]
    height: u32,

    /// Floor number, starting at 1
    #[arg(short, long, default_value_t = 1)]
    floor: u32,

    /// Built-in biome (snowy_village, crypt, caverns)
    #[arg(short, long, default_value = "crypt")]
    biome: String,

    /// Load the biome from a JSON file instead
    #[arg(long)]
    biome_file: Option<PathBuf>,

    /// Load room templates and floor rules from a JSON file
    #[arg(long)]
    templates: Option<PathBuf>,

    /// Print the generated floor as JSON
    #[arg(long)]
    json: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    initialize_logging(args.log_level.as_deref());

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initializes `env_logger`, preferring the flag over `RUST_LOG`.
fn initialize_logging(log_level: Option<&str>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"));
    if let Some(level) = log_level {
        builder.parse_filters(level);
    }
    builder.format_target(false).init();
}

fn run(args: &Args) -> DelveResult<()> {
    info!("Starting Delve v{}", delve::VERSION);

    let templates = match &args.templates {
        Some(path) => TemplateRegistry::load(path)?,
        None => TemplateRegistry::builtin(),
    };
    let biome = match &args.biome_file {
        Some(path) => BiomeDefinition::load(path)?,
        None => BiomeDefinition::builtin(&args.biome).ok_or_else(|| {
            DelveError::InvalidData(format!(
                "unknown biome '{}', expected one of {}",
                args.biome,
                BiomeDefinition::BUILTIN_IDS.join(", ")
            ))
        })?,
    };

    let config = GenerationConfig::new(args.seed)
        .with_size(args.width, args.height)
        .with_floor(args.floor);
    let generator = DungeonGenerator::new(&templates, &biome);
    let floor = generator.generate_floor(&config)?;

    if args.json {
        println!("{}", floor.to_json()?);
    } else {
        print_floor(&floor);
    }

    generator.validate(&floor, &config)?;
    info!("Floor {} passed validation", config.floor);
    Ok(())
}

fn print_floor(floor: &GeneratedFloor) {
    let level = &floor.level;
    print!("{}", level.render_ascii());
    println!();
    println!(
        "Floor {}: {} rooms, {} corridors, {} doors",
        level.floor,
        level.rooms.len(),
        level.corridors.len(),
        level.doors.len()
    );
    for room in &level.rooms {
        println!(
            "  room {:>2} {:<9} {:>2}x{:<2} at ({}, {}){}",
            room.id,
            room.room_type.to_string(),
            room.width,
            room.height,
            room.top_left.x,
            room.top_left.y,
            room.template
                .as_deref()
                .map(|t| format!(" [{}]", t))
                .unwrap_or_default()
        );
    }

    println!("Placement requests:");
    for request in &floor.requests {
        let pos = request.position();
        let detail = match request {
            PlacementRequest::Door { door, room_id, .. } => format!("{:?} for room {}", door, room_id),
            PlacementRequest::Staircase { direction, .. } => format!("{:?}", direction),
            PlacementRequest::Key { unlocks_room, .. } => format!("opens room {}", unlocks_room),
            PlacementRequest::Actor { actor, .. } => actor.clone(),
            PlacementRequest::Item { item_id, .. } => item_id.clone(),
        };
        println!("  {:<9} ({:>2}, {:>2}) {}", request.label(), pos.x, pos.y, detail);
    }
}
