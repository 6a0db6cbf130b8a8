/// Combat and safety primitives: projectile dodging, hostile flight, lava
/// escape. Resource tasks consult these each tick and return them as
/// interrupting children; all of them release control states in `on_stop`.
use crate::facade::{AgentControl, Control, EntitySnapshot, WorldView};
use crate::task::{handle, Task, TaskHandle, TaskIntent};
use crate::types::{block_of, seconds_to_ticks};
use glam::{Vec2, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use tracing::{debug, warn};

/// Entity names treated as dodgeable projectiles.
pub const PROJECTILE_NAMES: &[&str] = &[
    "arrow",
    "spectral_arrow",
    "trident",
    "fireball",
    "small_fireball",
    "dragon_fireball",
    "wither_skull",
    "shulker_bullet",
];

/// A projectile slower than this is ignored.
const VELOCITY_EPSILON: f32 = 0.01;
/// Heading-toward-us threshold on the direction dot product.
const HEADING_DOT_THRESHOLD: f32 = 0.5;
/// Closest-approach distance that counts as a hit course, in blocks.
const HIT_COURSE_DISTANCE: f32 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileDodgeConfig {
    pub dodge_h: f32,
    pub dodge_v: f32,
    pub detection_range: f32,
    pub reaction_time_s: f32,
}

impl Default for ProjectileDodgeConfig {
    fn default() -> Self {
        Self {
            dodge_h: 2.0,
            dodge_v: 1.0,
            detection_range: 32.0,
            reaction_time_s: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleeConfig {
    pub flee_distance: f32,
    pub include_skeletons: bool,
    pub sprint: bool,
    pub hostile_types: Vec<String>,
}

impl Default for FleeConfig {
    fn default() -> Self {
        Self {
            flee_distance: 20.0,
            include_skeletons: false,
            sprint: true,
            hostile_types: vec![
                "zombie".to_string(),
                "husk".to_string(),
                "drowned".to_string(),
                "creeper".to_string(),
                "spider".to_string(),
                "witch".to_string(),
                "pillager".to_string(),
                "vindicator".to_string(),
                "blaze".to_string(),
                "wither_skeleton".to_string(),
            ],
        }
    }
}

/// Distance along the velocity ray at which `point` is closest, clamped to
/// the forward half-line.
fn closest_approach_distance(origin: Vec3, velocity: Vec3, point: Vec3) -> f32 {
    let dir = velocity.normalize();
    let t = (point - origin).dot(dir).max(0.0);
    let closest = origin + dir * t;
    point.distance(closest)
}

/// First projectile on a hit course with the agent, if any.
pub fn find_incoming_projectile(
    view: &dyn WorldView,
    config: &ProjectileDodgeConfig,
) -> Option<EntitySnapshot> {
    let player = view.player_pos();
    view.entities().into_iter().find(|e| {
        if !e.valid || !PROJECTILE_NAMES.iter().any(|n| e.name == *n) {
            return false;
        }
        if e.position.distance(player) > config.detection_range {
            return false;
        }
        let speed_sq = e.velocity.length_squared();
        if speed_sq < VELOCITY_EPSILON * VELOCITY_EPSILON {
            return false;
        }
        let to_player = player - e.position;
        if to_player.length_squared() < 1e-6 {
            return true;
        }
        let heading = e.velocity.normalize().dot(to_player.normalize());
        if heading <= HEADING_DOT_THRESHOLD {
            return false;
        }
        closest_approach_distance(e.position, e.velocity, player) <= HIT_COURSE_DISTANCE
    })
}

/// All valid hostile entities within range of the agent.
pub fn hostiles_in_range(view: &dyn WorldView, config: &FleeConfig, range: f32) -> Vec<EntitySnapshot> {
    let player = view.player_pos();
    view.entities()
        .into_iter()
        .filter(|e| {
            e.valid
                && e.position.distance(player) <= range
                && (config.hostile_types.iter().any(|t| e.name == *t)
                    || (config.include_skeletons && e.name == "skeleton"))
        })
        .collect()
}

/// Sidestep projectiles heading for the agent. Finishes once nothing has
/// been on a hit course for the reaction window.
pub struct DodgeProjectilesTask {
    config: ProjectileDodgeConfig,
    last_threat_tick: Option<u64>,
    done: Cell<bool>,
}

impl DodgeProjectilesTask {
    pub fn new(config: ProjectileDodgeConfig) -> Self {
        Self {
            config,
            last_threat_tick: None,
            done: Cell::new(false),
        }
    }
}

impl Task for DodgeProjectilesTask {
    fn display_name(&self) -> String {
        "DodgeProjectiles".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::DodgeProjectiles
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.last_threat_tick = None;
        self.done.set(false);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let tick = agent.game_tick();
        let threat = find_incoming_projectile(&*agent, &self.config);
        match threat {
            Some(projectile) => {
                self.last_threat_tick = Some(tick);
                let player = agent.player_pos();
                // Dodge perpendicular to the projectile's horizontal path,
                // picking the sign that increases separation.
                let vel = Vec2::new(projectile.velocity.x, projectile.velocity.z);
                let perp = Vec2::new(-vel.y, vel.x).normalize_or_zero();
                let offset = Vec2::new(
                    player.x - projectile.position.x,
                    player.z - projectile.position.z,
                );
                let sign = if perp.dot(offset) >= 0.0 { 1.0 } else { -1.0 };
                let dodge = perp * sign * self.config.dodge_h;
                let goal = player + Vec3::new(dodge.x, self.config.dodge_v, dodge.y);
                agent.look_at(goal);
                agent.set_control(Control::Forward, true);
                agent.set_control(Control::Sprint, true);
            }
            None => {
                let calm_ticks = seconds_to_ticks(self.config.reaction_time_s);
                let quiet = self
                    .last_threat_tick
                    .map(|t| tick.saturating_sub(t) >= calm_ticks)
                    .unwrap_or(true);
                if quiet {
                    self.done.set(true);
                }
            }
        }
        None
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.clear_controls();
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.done.get()
    }
}

/// Run from the centroid of nearby hostiles to a point `flee_distance` away
/// in the opposite direction.
pub struct FleeHostilesTask {
    config: FleeConfig,
    walk: Option<TaskHandle>,
    done: Cell<bool>,
}

impl FleeHostilesTask {
    pub fn new(config: FleeConfig) -> Self {
        Self {
            config,
            walk: None,
            done: Cell::new(false),
        }
    }

    fn flee_target(&self, view: &dyn WorldView) -> Option<Vec3> {
        let hostiles = hostiles_in_range(view, &self.config, self.config.flee_distance * 1.5);
        if hostiles.is_empty() {
            return None;
        }
        let player = view.player_pos();
        let centroid = hostiles
            .iter()
            .fold(Vec3::ZERO, |acc, e| acc + e.position)
            / hostiles.len() as f32;
        let away = player - centroid;
        let away_xz = Vec2::new(away.x, away.z);
        // Degenerate centroid: fewer than two hostiles stacked on us, or we
        // sit exactly on the centroid. Pick a random compass direction.
        let dir = if hostiles.len() < 2 || away_xz.length_squared() < 0.25 {
            let mut rng = rand::thread_rng();
            let angle = rng.gen::<f32>() * std::f32::consts::TAU;
            Vec2::new(angle.cos(), angle.sin())
        } else {
            away_xz.normalize()
        };
        Some(player + Vec3::new(dir.x, 0.0, dir.y) * self.config.flee_distance)
    }
}

impl Task for FleeHostilesTask {
    fn display_name(&self) -> String {
        format!("FleeHostiles({:.0})", self.config.flee_distance)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::FleeHostiles {
            distance: self.config.flee_distance,
        }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.walk = None;
        self.done.set(false);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let Some(goal) = self.flee_target(&*agent) else {
            self.done.set(true);
            return None;
        };
        if self.config.sprint {
            agent.set_control(Control::Sprint, true);
        }
        // Re-aim the leg only when no walk is active or the previous one
        // stalled; otherwise keep the current escape route.
        let stale = self
            .walk
            .as_ref()
            .map(|w| w.borrow().is_failed())
            .unwrap_or(true);
        if stale {
            warn!("🏃 Fleeing {} hostiles", hostiles_in_range(&*agent, &self.config, self.config.flee_distance * 1.5).len());
            self.walk = Some(handle(super::movement::GetToPositionTask::new(block_of(
                goal,
            ))));
        }
        self.walk.clone()
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.clear_controls();
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.done.get()
    }
}

/// Safety-critical leaf: get out of lava onto the nearest solid ground.
pub struct EscapeLavaTask {
    done: Cell<bool>,
}

impl EscapeLavaTask {
    pub fn new() -> Self {
        Self {
            done: Cell::new(false),
        }
    }

    fn in_lava(view: &dyn WorldView) -> bool {
        view.standing_in("lava")
    }

    fn nearest_safe_column(view: &dyn WorldView) -> Option<Vec3> {
        let feet = block_of(view.player_pos());
        for radius in 1..=8i32 {
            for dx in -radius..=radius {
                for dz in -radius..=radius {
                    if dx.abs().max(dz.abs()) != radius {
                        continue;
                    }
                    let col = feet + glam::IVec3::new(dx, 0, dz);
                    let feet_block = view.block_at(col);
                    let ground = view.block_at(col - glam::IVec3::Y);
                    let feet_ok = matches!(&feet_block, Some(b) if !b.name.contains("lava") && b.bounds != crate::facade::BlockBounds::Solid);
                    let ground_ok = matches!(&ground, Some(g) if g.bounds == crate::facade::BlockBounds::Solid && !g.name.contains("lava"));
                    if feet_ok && ground_ok {
                        return Some(crate::types::block_center(col));
                    }
                }
            }
        }
        None
    }
}

impl Default for EscapeLavaTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for EscapeLavaTask {
    fn display_name(&self) -> String {
        "EscapeLava".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::EscapeLava
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.done.set(false);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if !Self::in_lava(&*agent) {
            self.done.set(true);
            return None;
        }
        if let Some(goal) = Self::nearest_safe_column(&*agent) {
            agent.look_at(goal);
        }
        agent.set_control(Control::Jump, true);
        agent.set_control(Control::Forward, true);
        agent.set_control(Control::Sprint, true);
        debug!("🔥 In lava, swimming out");
        None
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.clear_controls();
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.done.get() || !Self::in_lava(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::SimWorld;

    fn projectile(world: &mut SimWorld, pos: Vec3, vel: Vec3) -> crate::facade::EntityId {
        let id = world.spawn_entity("arrow", pos, 1.0);
        world.set_entity_velocity(id, vel);
        id
    }

    #[test]
    fn test_closest_approach_math() {
        // Ray along +X from origin; point at (10, 0, 3) is 3 blocks off axis.
        let d = closest_approach_distance(Vec3::ZERO, Vec3::X, Vec3::new(10.0, 0.0, 3.0));
        assert!((d - 3.0).abs() < 1e-4);
        // Point behind the ray start: distance from origin itself.
        let d = closest_approach_distance(Vec3::ZERO, Vec3::X, Vec3::new(-5.0, 0.0, 0.0));
        assert!((d - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_projectile_detection_requires_hit_course() {
        let mut world = SimWorld::flat(3);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        let config = ProjectileDodgeConfig::default();

        // An arrow at rest never qualifies.
        let still = projectile(&mut world, Vec3::new(10.0, 64.0, 0.5), Vec3::ZERO);
        assert!(find_incoming_projectile(&world, &config).is_none());

        // Heading at the player on a hit course: qualifies.
        world.set_entity_velocity(still, Vec3::new(-1.0, 0.0, 0.0));
        assert!(find_incoming_projectile(&world, &config).is_some());

        // Heading away: ignored again.
        world.set_entity_velocity(still, Vec3::new(1.0, 0.0, 0.0));
        assert!(find_incoming_projectile(&world, &config).is_none());
    }

    #[test]
    fn test_flee_target_points_away_from_centroid() {
        let mut world = SimWorld::flat(4);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        world.spawn_entity("zombie", Vec3::new(5.0, 64.0, 0.5), 20.0);
        world.spawn_entity("zombie", Vec3::new(6.0, 64.0, 1.5), 20.0);
        let task = FleeHostilesTask::new(FleeConfig::default());
        let goal = task.flee_target(&world).expect("hostiles present");
        // Away from +X hostiles means a goal on the -X side of the player.
        assert!(goal.x < 0.5);
    }

    #[test]
    fn test_flee_finishes_without_hostiles() {
        let mut world = SimWorld::flat(5);
        let mut task = FleeHostilesTask::new(FleeConfig::default());
        assert!(task.on_tick(&mut world).is_none());
        assert!(task.is_finished(&world));
    }
}
