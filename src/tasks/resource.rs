/// Resource-acquisition base: "collect N of item X" semantics shared by the
/// concrete gathering tactics.
///
/// The base wraps a tactic with (a) a top-level already-done check against
/// the inventory, (b) a re-evaluation timer that periodically forces the
/// tactic to re-assess strategy, and (c) the safety interrupts every
/// gathering task carries (lava escape, projectile dodging).
use crate::facade::{AgentControl, EntitySnapshot, WorldView};
use crate::task::{handle, ProgressChecker, Task, TaskHandle, TaskIntent};
use crate::tasks::safety::{
    find_incoming_projectile, DodgeProjectilesTask, EscapeLavaTask, ProjectileDodgeConfig,
};
use crate::types::ItemTarget;
use crate::task::TickTimer;
use crate::facade::Control;
use std::cell::Cell;
use tracing::{debug, info};

/// Default strategy re-evaluation interval.
const REEVALUATE_SECONDS: f32 = 10.0;
/// Range within which dropped matching items draw attention.
pub const DROP_NOTICE_RANGE: f32 = 16.0;

/// The hooks a concrete gathering strategy provides; the base drives them.
pub trait ResourceTactic {
    fn name(&self) -> String;
    fn intent(&self) -> TaskIntent;

    fn on_resource_start(&mut self, agent: &mut dyn AgentControl) {
        let _ = agent;
    }

    /// One strategy step; same contract as `Task::on_tick`.
    fn on_resource_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle>;

    fn on_resource_stop(&mut self, agent: &mut dyn AgentControl, interrupter: Option<&dyn Task>) {
        let _ = (agent, interrupter);
    }

    /// Clear held sub-tasks and cached targets; called on the re-evaluation
    /// timer so a stale plan cannot run forever.
    fn on_reevaluate(&mut self) {}

    fn tactic_failed(&self) -> bool {
        false
    }

    /// Termination check. Defaults to the item targets being met; tactics
    /// with a richer notion of "enough" (food potential) override this.
    fn is_complete(&self, view: &dyn WorldView, targets: &[ItemTarget]) -> bool {
        view.inventory().satisfies(targets)
    }
}

/// Task wrapper tying a tactic to a set of item targets.
pub struct ResourceTask<T: ResourceTactic> {
    targets: Vec<ItemTarget>,
    tactic: T,
    reevaluate: TickTimer,
    satisfied: Cell<bool>,
    escape_lava: Option<TaskHandle>,
    dodge: Option<TaskHandle>,
    dodge_config: ProjectileDodgeConfig,
}

impl<T: ResourceTactic> ResourceTask<T> {
    pub fn new(targets: Vec<ItemTarget>, tactic: T) -> Self {
        Self {
            targets,
            tactic,
            reevaluate: TickTimer::from_seconds(REEVALUATE_SECONDS),
            satisfied: Cell::new(false),
            escape_lava: None,
            dodge: None,
            dodge_config: ProjectileDodgeConfig::default(),
        }
    }

    pub fn with_reevaluate_seconds(mut self, seconds: f32) -> Self {
        self.reevaluate = TickTimer::from_seconds(seconds);
        self
    }

    pub fn targets(&self) -> &[ItemTarget] {
        &self.targets
    }

    pub fn tactic(&self) -> &T {
        &self.tactic
    }
}

impl<T: ResourceTactic> Task for ResourceTask<T> {
    fn display_name(&self) -> String {
        let targets: Vec<String> = self.targets.iter().map(|t| t.to_string()).collect();
        format!("Collect[{}] via {}", targets.join(", "), self.tactic.name())
    }

    fn intent(&self) -> TaskIntent {
        self.tactic.intent()
    }

    fn on_start(&mut self, agent: &mut dyn AgentControl) {
        let now = agent.game_tick();
        self.reevaluate.reset(now);
        self.satisfied.set(false);
        self.tactic.on_resource_start(agent);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        // Safety interrupts come before any gathering.
        if agent.standing_in("lava") {
            let escape = self
                .escape_lava
                .get_or_insert_with(|| handle(EscapeLavaTask::new()))
                .clone();
            return Some(escape);
        }
        if find_incoming_projectile(&*agent, &self.dodge_config).is_some() {
            let dodge = self
                .dodge
                .get_or_insert_with(|| handle(DodgeProjectilesTask::new(self.dodge_config.clone())))
                .clone();
            return Some(dodge);
        }

        if self.tactic.is_complete(&*agent, &self.targets) {
            self.satisfied.set(true);
            return None;
        }

        let now = agent.game_tick();
        if self.reevaluate.tick(now) {
            debug!("🔄 {}: re-evaluating strategy", self.tactic.name());
            self.tactic.on_reevaluate();
        }
        self.tactic.on_resource_tick(agent)
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, interrupter: Option<&dyn Task>) {
        self.tactic.on_resource_stop(agent, interrupter);
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        if self.satisfied.get() {
            return true;
        }
        if self.tactic.is_complete(view, &self.targets) {
            info!("✅ Resource targets satisfied: {}", self.display_name());
            self.satisfied.set(true);
            return true;
        }
        false
    }

    fn is_failed(&self) -> bool {
        self.tactic.tactic_failed()
    }
}

/// Closest dropped-item entity matching any target, within range.
pub fn closest_matching_drop(
    view: &dyn WorldView,
    targets: &[ItemTarget],
    range: f32,
) -> Option<EntitySnapshot> {
    let player = view.player_pos();
    view.entities()
        .into_iter()
        .filter(|e| {
            e.valid
                && e.position.distance(player) <= range
                && e.dropped_stack()
                    .map(|s| targets.iter().any(|t| t.matches(&s.name)))
                    .unwrap_or(false)
        })
        .min_by(|a, b| {
            a.distance_sq_to(player)
                .total_cmp(&b.distance_sq_to(player))
        })
}

/// Walk over matching dropped items until none remain nearby.
pub struct PickupDropsTask {
    targets: Vec<ItemTarget>,
    progress: ProgressChecker,
    failed: bool,
}

impl PickupDropsTask {
    pub fn new(targets: Vec<ItemTarget>) -> Self {
        Self {
            targets,
            progress: ProgressChecker::from_seconds(6.0),
            failed: false,
        }
    }
}

impl Task for PickupDropsTask {
    fn display_name(&self) -> String {
        "PickupDrops".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::PickupDrops {
            targets: self.targets.clone(),
        }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.progress.reset();
        self.failed = false;
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let Some(drop) = closest_matching_drop(&*agent, &self.targets, DROP_NOTICE_RANGE) else {
            return None;
        };
        agent.look_at(drop.position);
        agent.set_control(Control::Forward, true);
        agent.set_control(Control::Sprint, true);
        let tick = agent.game_tick();
        self.progress
            .observe_distance(tick, agent.player_pos(), drop.position);
        if self.progress.failed(tick) {
            self.failed = true;
        }
        None
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.set_control(Control::Forward, false);
        agent.set_control(Control::Sprint, false);
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        closest_matching_drop(view, &self.targets, DROP_NOTICE_RANGE).is_none()
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}
