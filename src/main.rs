//! # Raidcore Command Line Entry Point
//!
//! Generates levels and runs path searches from the terminal, for inspecting
//! template sets and seeds without a game engine attached.

use clap::{Parser, Subcommand};
use raidcore::{
    utils, BoxWorld, EmptyWorld, GenerationConfig, Generator, LevelGenerator, Pathfinder,
    PathfinderConfig, Plane, RaidError, RaidResult, TemplateSet, Vec3,
};
use std::path::PathBuf;
#[cfg(feature = "dev-tools")]
use tracing::{info, warn, Level};

#[cfg(not(feature = "dev-tools"))]
use log::{info, warn};

/// Command line arguments for Raidcore.
#[derive(Parser, Debug)]
#[command(name = "raidcore")]
#[command(about = "Raid level generation and voxel pathfinding")]
#[command(version)]
struct Args {
    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a level and print its tile map and report
    Generate {
        /// Random seed for level generation
        #[arg(short, long)]
        seed: Option<u64>,

        /// JSON file with room templates; the built-in set is used otherwise
        #[arg(short, long)]
        templates: Option<PathBuf>,

        /// JSON file with a generation config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the spawn quota
        #[arg(short, long)]
        quota: Option<u32>,

        /// Override the chance of opening a cycle door
        #[arg(long)]
        cycle_probability: Option<f32>,

        /// Lay tiles out on the X/Y plane instead of X/Z
        #[arg(long)]
        xy: bool,

        /// Print the whole level as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search a path through a room
    Path {
        /// Start position as x,y,z
        #[arg(long, value_parser = parse_vec3)]
        from: Vec3,

        /// Goal position as x,y,z
        #[arg(long, value_parser = parse_vec3)]
        to: Vec3,

        /// JSON file with the room's obstacle boxes
        #[arg(long)]
        obstacles: Option<PathBuf>,

        /// JSON file with a pathfinder config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Random seed for heuristic perturbation
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> RaidResult<()> {
    let args = Args::parse();

    initialize_logging(&args.log_level)?;

    info!("Starting Raidcore v{}", raidcore::VERSION);

    match args.command {
        Command::Generate {
            seed,
            templates,
            config,
            quota,
            cycle_probability,
            xy,
            json,
        } => {
            let mut generation = match config {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => GenerationConfig::default(),
            };
            if let Some(seed) = seed {
                generation.seed = seed;
            }
            if let Some(quota) = quota {
                generation.spawn_quota = quota;
            }
            if let Some(probability) = cycle_probability {
                generation.cycle_probability = probability;
            }
            if xy {
                generation.plane = Plane::XY;
            }

            let templates = match templates {
                Some(path) => TemplateSet::from_json_file(path)?,
                None => TemplateSet::demo(),
            };
            run_generate(templates, &generation, json)
        }
        Command::Path {
            from,
            to,
            obstacles,
            config,
            seed,
        } => {
            let pathfinder_config = match config {
                Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
                None => PathfinderConfig::default(),
            };
            pathfinder_config.validate()?;
            run_path(from, to, obstacles, pathfinder_config, seed)
        }
    }
}

/// Maps a `--log-level` value onto a level filter.
fn parse_log_level(log_level: &str) -> RaidResult<log::LevelFilter> {
    match log_level.to_lowercase().as_str() {
        "error" => Ok(log::LevelFilter::Error),
        "warn" => Ok(log::LevelFilter::Warn),
        "info" => Ok(log::LevelFilter::Info),
        "debug" => Ok(log::LevelFilter::Debug),
        "trace" => Ok(log::LevelFilter::Trace),
        other => Err(RaidError::InvalidConfig(format!(
            "unknown log level {other:?}"
        ))),
    }
}

/// Initializes the logging system based on the specified log level.
fn initialize_logging(log_level: &str) -> RaidResult<()> {
    let filter = parse_log_level(log_level)?;

    #[cfg(feature = "dev-tools")]
    {
        let level = match filter {
            log::LevelFilter::Off | log::LevelFilter::Error => Level::ERROR,
            log::LevelFilter::Warn => Level::WARN,
            log::LevelFilter::Info => Level::INFO,
            log::LevelFilter::Debug => Level::DEBUG,
            log::LevelFilter::Trace => Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_target(false)
            .init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        env_logger::Builder::new()
            .filter_level(filter)
            .format_target(false)
            .init();
    }

    Ok(())
}

fn run_generate(templates: TemplateSet, config: &GenerationConfig, json: bool) -> RaidResult<()> {
    info!(
        "Generating level with seed {} and quota {}",
        config.seed, config.spawn_quota
    );

    let generator = LevelGenerator::new(templates);
    let mut rng = utils::create_rng(config.seed);
    let level = generator.generate(config, &mut rng)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&level)?);
        return Ok(());
    }

    print!("{}", level.layout.ascii_map());
    let report = &level.report;
    println!(
        "rooms: {} (quota {}/{}, min-instance {})",
        report.total_rooms, report.rooms_spawned, report.spawn_quota, report.min_instance_rooms
    );
    println!(
        "cycle doors: {} opened, {} sealed; dead doors sealed: {}; walls: {}",
        report.cycle_doors_opened,
        report.cycle_doors_sealed,
        report.dead_doors_sealed,
        report.walls_spawned
    );
    for quota in &report.templates {
        println!(
            "  {:<12} {:>3} (min {}, max {}){}",
            quota.name,
            quota.instances,
            quota.min_instances,
            quota.max_instances,
            if quota.satisfied { "" } else { "  UNMET" }
        );
    }
    if !report.quota_met {
        warn!("Spawn quota not met: {:?}", report.exhaustion);
    }
    Ok(())
}

fn run_path(
    from: Vec3,
    to: Vec3,
    obstacles: Option<PathBuf>,
    config: PathfinderConfig,
    seed: u64,
) -> RaidResult<()> {
    let pathfinder = match obstacles {
        Some(path) => {
            let world: BoxWorld = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            info!("Loaded {} obstacle boxes", world.boxes.len());
            Pathfinder::initialize(Vec3::zero(), config, &world)
        }
        None => Pathfinder::initialize(Vec3::zero(), config, &EmptyWorld),
    };

    let mut rng = utils::create_rng(seed);
    match pathfinder.find_path_blocking(from, to, &mut rng) {
        Some(path) => {
            println!("{} waypoints", path.len());
            for point in path {
                println!("  {:.2}, {:.2}, {:.2}", point.x, point.y, point.z);
            }
            Ok(())
        }
        None => Err(RaidError::InvalidState(format!(
            "no path from {from:?} to {to:?}"
        ))),
    }
}

fn parse_vec3(text: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = text
        .split(',')
        .map(|part| part.trim().parse::<f32>().map_err(|e| format!("{part:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected x,y,z but got {text:?}")),
    }
}
