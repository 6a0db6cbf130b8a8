//! Orchestrator phase routing: the dimension and the inventory decide which
//! sub-pipeline runs.

use glam::Vec3;
use voxel_agent::facade::SimWorld;
use voxel_agent::task::{handle, Task, TaskRunner};
use voxel_agent::tasks::{BeatGameConfig, BeatGameTask};

#[test]
fn test_nether_routes_to_blaze_rods_first() {
    let mut world = SimWorld::flat(120);
    world.set_dimension("the_nether");
    world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));

    let mut runner = TaskRunner::new(handle(BeatGameTask::new(BeatGameConfig::default())));
    runner.tick(&mut world);
    let name = runner.root_display_name().unwrap();
    assert!(
        name.contains("GettingBlazeRods"),
        "no rods and no powder means the rod run comes first, got {}",
        name
    );
}

#[test]
fn test_nether_routes_to_pearls_once_rods_cover_powder() {
    let mut world = SimWorld::flat(121);
    world.set_dimension("the_nether");
    // 7 rods = 14 powder, enough for 14 eyes; pearls still missing.
    world.give("blaze_rod", 7);

    let mut runner = TaskRunner::new(handle(BeatGameTask::new(BeatGameConfig::default())));
    runner.tick(&mut world);
    let name = runner.root_display_name().unwrap();
    assert!(
        name.contains("GettingEnderPearls"),
        "rods covered, pearls next, got {}",
        name
    );
}

#[test]
fn test_nether_leaves_when_stocked() {
    let mut world = SimWorld::flat(122);
    world.set_dimension("the_nether");
    world.give("blaze_rod", 7);
    world.give("ender_pearl", 14);

    let mut runner = TaskRunner::new(handle(BeatGameTask::new(BeatGameConfig::default())));
    runner.tick(&mut world);
    let name = runner.root_display_name().unwrap();
    assert!(
        name.contains("LeavingNether"),
        "everything gathered means heading home, got {}",
        name
    );
}

#[test]
fn test_overworld_ladder_starts_with_beds() {
    let mut world = SimWorld::flat(123);
    let mut runner = TaskRunner::new(handle(BeatGameTask::new(BeatGameConfig::default())));
    runner.tick(&mut world);
    let name = runner.root_display_name().unwrap();
    assert!(
        name.contains("GettingBeds"),
        "empty-handed overworld start walks the bed ladder first, got {}",
        name
    );
}

#[test]
fn test_display_name_carries_phase() {
    let world = SimWorld::flat(124);
    let _ = world;
    let task = BeatGameTask::new(BeatGameConfig::default());
    assert!(task.display_name().starts_with("BeatGame(state: "));
}
