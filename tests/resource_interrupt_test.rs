//! Safety interrupts inside gathering tasks: incoming projectiles and lava
//! take over the tick, then gathering resumes and completes.

use glam::{IVec3, Vec3};
use voxel_agent::facade::sim::Command;
use voxel_agent::facade::{BlockBounds, BlockSnapshot, Control, SimWorld, WorldView};
use voxel_agent::task::{handle, TaskRunner};
use voxel_agent::tasks::mine_and_collect;
use voxel_agent::types::ItemTarget;

fn coal_world(seed: u64) -> SimWorld {
    let mut world = SimWorld::flat(seed);
    world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
    world.set_block(
        IVec3::new(6, 64, 2),
        BlockSnapshot::new("coal_ore", BlockBounds::Solid),
    );
    world
}

#[test]
fn test_projectile_interrupts_mining_then_mining_resumes() {
    let mut world = coal_world(7);
    let task = mine_and_collect(
        vec![ItemTarget::new("coal", 1)],
        vec!["coal_ore".to_string()],
    );
    let mut runner = TaskRunner::new(handle(task));

    // Let the miner get going.
    for _ in 0..5 {
        runner.tick(&mut world);
        world.step();
    }

    // An arrow on a hit course appears.
    let arrow = world.spawn_entity("arrow", Vec3::new(20.0, 64.0, 0.5), 1.0);
    world.set_entity_velocity(arrow, Vec3::new(-0.8, 0.0, 0.0));
    world.take_commands();
    runner.tick(&mut world);
    let commands = world.take_commands();
    assert!(
        commands
            .iter()
            .any(|c| matches!(c, Command::SetControl(Control::Sprint, true))),
        "dodge should sprint sideways, got {:?}",
        commands
    );

    // Threat gone: mining completes.
    world.set_entity_velocity(arrow, Vec3::ZERO);
    for _ in 0..600 {
        runner.tick(&mut world);
        world.step();
        if runner.is_halted() {
            break;
        }
    }
    assert!(runner.is_halted(), "mining should finish after the dodge");
    assert!(world.inventory().count_of("coal") >= 1);
}

#[test]
fn test_lava_interrupts_gathering() {
    let mut world = coal_world(8);
    // Drop the agent into lava at its feet.
    world.set_block(
        IVec3::new(0, 64, 0),
        BlockSnapshot::new("lava", BlockBounds::Liquid),
    );

    let task = mine_and_collect(
        vec![ItemTarget::new("coal", 1)],
        vec!["coal_ore".to_string()],
    );
    let mut runner = TaskRunner::new(handle(task));
    world.take_commands();
    runner.tick(&mut world);
    let commands = world.take_commands();
    assert!(
        commands
            .iter()
            .any(|c| matches!(c, Command::SetControl(Control::Jump, true))),
        "lava escape should jump-swim, got {:?}",
        commands
    );
}
