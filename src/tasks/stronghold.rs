/// Stronghold triangulation: throw two eyes of ender from vantage points a
/// sideways leg apart, track each projectile's flight, and intersect the two
/// observed XZ rays. Height is irrelevant; strongholds sit at a known Y band.
use crate::facade::{AgentControl, EntityId, WorldView};
use crate::task::{handle, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::dimension::GoToDimensionTask;
use crate::tasks::movement::GetToPositionTask;
use crate::types::{block_of, Dimension};
use glam::{IVec2, Vec2, Vec3};
use tracing::{debug, info, warn};

/// Sideways leg between the two throws.
const SECOND_THROW_DISTANCE: f32 = 30.0;
/// Within this range of the estimate, re-triangulate for a sharper fix.
const CLOSE_RETHROW_DISTANCE: f32 = 10.0;
/// Parallel-ray cutoff for the 2x2 solve.
const INTERSECT_EPSILON: f32 = 1e-4;
/// Geometry retries before the task gives up.
const MAX_GEOMETRY_RETRIES: u32 = 8;
/// Pause between equipping and throwing.
const THROW_COOLDOWN_TICKS: u64 = 10;

/// One observed eye flight: where it spawned and where it was last seen.
#[derive(Debug, Clone, PartialEq)]
pub struct EyeDirectionSample {
    pub origin: Vec3,
    pub last_pos: Option<Vec3>,
}

impl EyeDirectionSample {
    pub fn delta_xz(&self) -> Option<Vec2> {
        let last = self.last_pos?;
        let delta = Vec2::new(last.x - self.origin.x, last.z - self.origin.z);
        if delta.length_squared() < 1e-6 {
            None
        } else {
            Some(delta)
        }
    }

    pub fn angle(&self) -> Option<f32> {
        self.delta_xz().map(|d| d.y.atan2(d.x))
    }
}

/// Intersection of two XZ rays (z carried in `Vec2::y`). `None` when the
/// rays are near-parallel.
pub fn intersect_rays_xz(o1: Vec2, d1: Vec2, o2: Vec2, d2: Vec2) -> Option<Vec2> {
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() < INTERSECT_EPSILON {
        return None;
    }
    let t2 = (d1.y * (o2.x - o1.x) - d1.x * (o2.y - o1.y)) / denom;
    Some(o2 + d2 * t2)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum LocateState {
    GoingToOverworld,
    Throwing,
    WaitingForEye,
    MovingForNextThrow,
    Calculating,
}

/// Two-throw eye-of-ender stronghold locator.
pub struct LocateStrongholdTask {
    state: LocateState,
    samples: Vec<EyeDirectionSample>,
    pending: Option<EyeDirectionSample>,
    tracked_eye: Option<EntityId>,
    estimate: Option<IVec2>,
    walk: Option<TaskHandle>,
    dimension_child: Option<TaskHandle>,
    throw_cooldown: TickTimer,
    perp_sign: f32,
    retries: u32,
    failed: bool,
}

impl LocateStrongholdTask {
    pub fn new() -> Self {
        Self {
            state: LocateState::GoingToOverworld,
            samples: Vec::new(),
            pending: None,
            tracked_eye: None,
            estimate: None,
            walk: None,
            dimension_child: None,
            throw_cooldown: TickTimer::new(THROW_COOLDOWN_TICKS),
            perp_sign: 1.0,
            retries: 0,
            failed: false,
        }
    }

    /// The computed stronghold XZ, once triangulation has converged.
    pub fn stronghold_estimate(&self) -> Option<IVec2> {
        self.estimate
    }

    fn flying_eye(view: &dyn WorldView) -> Option<crate::facade::EntitySnapshot> {
        view.entities()
            .into_iter()
            .find(|e| e.valid && e.name == "eye_of_ender")
    }

    fn finish_calculation(&mut self, view: &dyn WorldView) {
        let (first, second) = match (self.samples.first(), self.samples.get(1)) {
            (Some(a), Some(b)) => (a.clone(), b.clone()),
            _ => {
                self.state = LocateState::Throwing;
                return;
            }
        };
        let (Some(a1), Some(a2)) = (first.angle(), second.angle()) else {
            self.samples.clear();
            self.state = LocateState::Throwing;
            return;
        };

        // The geometry only produces a forward intersection when the second
        // angle closed in on the first. Otherwise promote the second sample
        // and try the other side.
        if a2 >= a1 {
            self.retries += 1;
            if self.retries > MAX_GEOMETRY_RETRIES {
                warn!("👁️ Triangulation geometry never converged");
                self.failed = true;
                return;
            }
            debug!("👁️ Parallel-ish throws; promoting second sample");
            self.samples = vec![second];
            self.perp_sign = -self.perp_sign;
            self.walk = None;
            self.state = LocateState::MovingForNextThrow;
            return;
        }

        let o1 = Vec2::new(first.origin.x, first.origin.z);
        let o2 = Vec2::new(second.origin.x, second.origin.z);
        let d1 = first.delta_xz().unwrap_or(Vec2::X);
        let d2 = second.delta_xz().unwrap_or(Vec2::X);
        let point = intersect_rays_xz(o1, d1, o2, d2).unwrap_or_else(|| (o1 + o2) * 0.5);
        let estimate = IVec2::new(point.x.round() as i32, point.y.round() as i32);

        // Already standing next to the estimate: the fix is too coarse to
        // trust, discard both samples and refine from here.
        let player = view.player_pos();
        let dist = Vec2::new(player.x - point.x, player.z - point.y).length();
        if dist < CLOSE_RETHROW_DISTANCE {
            debug!("👁️ Estimate {}/{} too close; re-triangulating", estimate.x, estimate.y);
            self.samples.clear();
            self.state = LocateState::Throwing;
            return;
        }

        info!("👁️ Stronghold estimated near ({}, {})", estimate.x, estimate.y);
        self.estimate = Some(estimate);
    }
}

impl Default for LocateStrongholdTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for LocateStrongholdTask {
    fn display_name(&self) -> String {
        format!(
            "LocateStronghold(state: {:?}, samples: {})",
            self.state,
            self.samples.len()
        )
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::LocateStronghold
    }

    fn on_start(&mut self, agent: &mut dyn AgentControl) {
        self.state = LocateState::GoingToOverworld;
        self.samples.clear();
        self.pending = None;
        self.tracked_eye = None;
        self.retries = 0;
        self.failed = false;
        self.throw_cooldown.reset(agent.game_tick());
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.estimate.is_some() {
            return None;
        }

        if agent.dimension() != Dimension::Overworld {
            self.state = LocateState::GoingToOverworld;
            let hop = self
                .dimension_child
                .get_or_insert_with(|| handle(GoToDimensionTask::new(Dimension::Overworld)))
                .clone();
            return Some(hop);
        }
        if self.state == LocateState::GoingToOverworld {
            self.state = LocateState::Throwing;
        }

        match self.state {
            LocateState::GoingToOverworld => None,
            LocateState::Throwing => {
                if agent.inventory().count_of("ender_eye") == 0 {
                    warn!("👁️ No eyes of ender to throw");
                    self.failed = true;
                    return None;
                }
                if !matches!(agent.held_item(), Some(s) if s.name == "ender_eye") {
                    agent.equip("ender_eye", crate::facade::EquipDestination::Hand);
                    return None;
                }
                let now = agent.game_tick();
                if self.throw_cooldown.tick(now) {
                    agent.use_held_item();
                    self.pending = Some(EyeDirectionSample {
                        origin: agent.player_pos(),
                        last_pos: None,
                    });
                    self.tracked_eye = None;
                    self.state = LocateState::WaitingForEye;
                }
                None
            }
            LocateState::WaitingForEye => {
                match Self::flying_eye(&*agent) {
                    Some(eye) => {
                        if let Some(sample) = &mut self.pending {
                            if self.tracked_eye.is_none() {
                                self.tracked_eye = Some(eye.id);
                                sample.origin = eye.position;
                            }
                            sample.last_pos = Some(eye.position);
                        }
                    }
                    None => {
                        if self.tracked_eye.is_some() {
                            // Flight over; the sample is complete.
                            if let Some(sample) = self.pending.take() {
                                self.samples.push(sample);
                            }
                            self.tracked_eye = None;
                            self.walk = None;
                            self.state = if self.samples.len() >= 2 {
                                LocateState::Calculating
                            } else {
                                LocateState::MovingForNextThrow
                            };
                        }
                    }
                }
                None
            }
            LocateState::MovingForNextThrow => {
                let Some(delta) = self.samples.last().and_then(|s| s.delta_xz()) else {
                    self.samples.clear();
                    self.state = LocateState::Throwing;
                    return None;
                };
                let perp = Vec2::new(-delta.y, delta.x).normalize() * self.perp_sign;
                let here = agent.player_pos();
                let target = block_of(
                    here + Vec3::new(perp.x, 0.0, perp.y) * SECOND_THROW_DISTANCE,
                );
                let walk = self
                    .walk
                    .get_or_insert_with(|| handle(GetToPositionTask::new(target)))
                    .clone();
                let (arrived, stuck) = {
                    let w = walk.borrow();
                    (w.is_finished(&*agent), w.is_failed())
                };
                if arrived || stuck {
                    self.walk = None;
                    self.state = LocateState::Throwing;
                    return None;
                }
                Some(walk)
            }
            LocateState::Calculating => {
                self.finish_calculation(&*agent);
                None
            }
        }
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.estimate.is_some()
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::SimWorld;
    use crate::task::TaskRunner;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_ray_intersection_crossing() {
        let hit = intersect_rays_xz(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(100.0, 0.0),
            Vec2::new(-1.0, 1.0),
        )
        .expect("rays cross");
        assert!((hit.x - 50.0).abs() < 1e-3);
        assert!((hit.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_ray_intersection_parallel_falls_back_to_midpoint() {
        let miss = intersect_rays_xz(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(0.0, 100.0),
            Vec2::new(1.0, 0.0),
        );
        assert!(miss.is_none());
        // Caller fallback: midpoint of the two origins.
        let midpoint = (Vec2::new(0.0, 0.0) + Vec2::new(0.0, 100.0)) * 0.5;
        assert_eq!(midpoint, Vec2::new(0.0, 50.0));
    }

    #[test]
    fn test_intersection_lies_on_both_rays() {
        let o1 = Vec2::new(3.0, -2.0);
        let d1 = Vec2::new(2.0, 1.0);
        let o2 = Vec2::new(40.0, 30.0);
        let d2 = Vec2::new(-1.0, 2.0);
        let hit = intersect_rays_xz(o1, d1, o2, d2).expect("not parallel");
        // Solve for each ray's parameter and verify both land on the point.
        let t1 = (hit.x - o1.x) / d1.x;
        let t2 = (hit.x - o2.x) / d2.x;
        assert!((o1 + d1 * t1 - hit).length() < 1e-3);
        assert!((o2 + d2 * t2 - hit).length() < 1e-3);
    }

    #[test]
    fn test_locate_stronghold_in_sim() {
        let mut world = SimWorld::flat(51);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        world.set_stronghold(IVec2::new(150, 90));
        world.give("ender_eye", 6);

        let task = Rc::new(RefCell::new(LocateStrongholdTask::new()));
        let root: TaskHandle = task.clone();
        let mut runner = TaskRunner::new(root);
        for _ in 0..3000 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        let estimate = task.borrow().stronghold_estimate();
        let estimate = estimate.expect("triangulation should converge");
        assert!(
            (estimate.x - 150).abs() <= 12 && (estimate.y - 90).abs() <= 12,
            "estimate {:?} should be near (150, 90)",
            estimate
        );
    }
}
