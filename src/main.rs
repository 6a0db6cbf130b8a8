//! Demo driver: run an objective against the in-memory sim world and log the
//! task tree's phase transitions. Useful for eyeballing controller behavior
//! without a live game connection.

use clap::{Parser, ValueEnum};
use glam::{IVec2, IVec3, Vec3};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voxel_agent::facade::{BlockBounds, BlockSnapshot, SimWorld};
use voxel_agent::tasks::{collect_food, mine_and_collect, BeatGameTask, LocateStrongholdTask};
use voxel_agent::types::{ItemStack, ItemTarget};
use voxel_agent::{handle, AgentSettings, TaskRunner, WorldView};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Objective {
    /// Mine a few coal ores scattered nearby.
    Mine,
    /// Hunt and cook food up to the configured potential.
    Food,
    /// Triangulate the scripted stronghold.
    Stronghold,
    /// Run the full beat-the-game orchestrator.
    BeatGame,
}

#[derive(Parser, Debug)]
#[command(name = "voxel-agent", about = "Task-tree agent demo over a sim world")]
struct Args {
    /// Objective to drive.
    #[arg(long, value_enum, default_value = "mine")]
    objective: Objective,

    /// Ticks to simulate before giving up.
    #[arg(long, default_value_t = 6000)]
    ticks: u64,

    /// RON settings file.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Sim world seed.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn build_world(objective: Objective, seed: u64) -> SimWorld {
    let mut world = SimWorld::flat(seed);
    world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
    match objective {
        Objective::Mine => {
            for x in 0..4 {
                world.set_block(
                    IVec3::new(8 + x * 2, 64, 4),
                    BlockSnapshot::new("coal_ore", BlockBounds::Solid),
                );
            }
        }
        Objective::Food => {
            world.give("furnace", 1);
            for i in 0..4 {
                world.spawn_entity_with_loot(
                    "cow",
                    Vec3::new(10.0 + i as f32 * 6.0, 64.0, 6.0),
                    10.0,
                    vec![ItemStack::new("beef", 2)],
                );
            }
        }
        Objective::Stronghold => {
            world.set_stronghold(IVec2::new(300, -150));
            world.give("ender_eye", 8);
        }
        Objective::BeatGame => {
            world.set_stronghold(IVec2::new(200, 120));
            // Seed a small starter world: trees, stone, animals.
            for i in 0..6 {
                world.set_block(
                    IVec3::new(6 + i * 3, 64, -6),
                    BlockSnapshot::new("oak_log", BlockBounds::Solid),
                );
                world.set_block(
                    IVec3::new(-6 - i * 2, 64, 4),
                    BlockSnapshot::new("stone", BlockBounds::Solid),
                );
            }
            for i in 0..6 {
                world.spawn_entity_with_loot(
                    "sheep",
                    Vec3::new(12.0, 64.0, 10.0 + i as f32 * 4.0),
                    8.0,
                    vec![ItemStack::new("white_wool", 1), ItemStack::new("mutton", 1)],
                );
                world.spawn_entity_with_loot(
                    "cow",
                    Vec3::new(-12.0, 64.0, 10.0 + i as f32 * 4.0),
                    10.0,
                    vec![ItemStack::new("beef", 2)],
                );
            }
        }
    }
    world
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let settings = match AgentSettings::load_or_default(args.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    info!("🚀 voxel-agent demo: {:?} for up to {} ticks", args.objective, args.ticks);
    let mut world = build_world(args.objective, args.seed);

    let root = match args.objective {
        Objective::Mine => handle(mine_and_collect(
            vec![ItemTarget::new("coal", 3)],
            vec!["coal_ore".to_string()],
        )),
        Objective::Food => handle(collect_food(settings.food.clone())),
        Objective::Stronghold => handle(LocateStrongholdTask::new()),
        Objective::BeatGame => handle(BeatGameTask::new(settings.beat_game.clone())),
    };

    let mut runner = TaskRunner::new(root);
    let mut last_name = String::new();
    for tick in 0..args.ticks {
        runner.tick(&mut world);
        world.step();

        if let Some(name) = runner.root_display_name() {
            if name != last_name {
                info!("🎯 Tick {}: {}", tick, name);
                last_name = name;
            }
        }
        if runner.is_halted() {
            info!("🏁 Root halted after {} ticks", tick + 1);
            break;
        }
    }

    let inventory = world.inventory();
    let held: Vec<String> = inventory
        .stacks()
        .map(|s| format!("{} x{}", s.name, s.count))
        .collect();
    info!("🎒 Final inventory: [{}]", held.join(", "));
    info!("🌍 Final dimension: {}", world.dimension());
}
