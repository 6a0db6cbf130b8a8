/// Kill-and-loot: hunt entities of a kind for their drops. Target selection
/// runs through the closest-object engine keyed by entity id; entities that
/// stay out of reach for too long are blacklisted for the run.
use crate::facade::{AgentControl, Control, EntityId, WorldView};
use crate::pursuit::{ClosestObjectPursuit, PursuitSource};
use crate::task::{handle, ProgressChecker, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::movement::TimeoutWanderTask;
use crate::tasks::resource::{
    closest_matching_drop, PickupDropsTask, ResourceTactic, ResourceTask, DROP_NOTICE_RANGE,
};
use crate::types::ItemTarget;
use glam::Vec3;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

/// Melee reach in blocks.
const ATTACK_REACH: f32 = 3.5;
/// Swing cooldown in ticks.
const ATTACK_COOLDOWN_TICKS: u64 = 12;
/// How long a target may evade before it is blacklisted.
const TARGET_PATIENCE_SECONDS: f32 = 15.0;

/// Leaf: chase one entity and swing until it dies.
pub struct KillEntityTask {
    id: EntityId,
    cooldown: TickTimer,
    progress: ProgressChecker,
    failed: bool,
}

impl KillEntityTask {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            cooldown: TickTimer::new(ATTACK_COOLDOWN_TICKS),
            progress: ProgressChecker::from_seconds(TARGET_PATIENCE_SECONDS),
            failed: false,
        }
    }

    fn dead(&self, view: &dyn WorldView) -> bool {
        view.entity(self.id).map(|e| !e.valid).unwrap_or(true)
    }
}

impl Task for KillEntityTask {
    fn display_name(&self) -> String {
        format!("KillEntity({})", self.id)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::KillEntity { id: self.id }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.progress.reset();
        self.failed = false;
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let Some(target) = agent.entity(self.id) else {
            return None;
        };
        if !target.valid {
            return None;
        }

        let pos = agent.player_pos();
        let dist = pos.distance(target.position);
        agent.look_at(target.position + Vec3::new(0.0, 0.5, 0.0));
        if dist > ATTACK_REACH {
            agent.set_control(Control::Forward, true);
            agent.set_control(Control::Sprint, true);
        } else {
            agent.set_control(Control::Forward, false);
            agent.set_control(Control::Sprint, false);
            let now = agent.game_tick();
            if self.cooldown.tick(now) {
                agent.attack_entity(self.id);
            }
        }

        let tick = agent.game_tick();
        self.progress.observe_distance(tick, pos, target.position);
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
        self.dead(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

struct EntitySource<'a> {
    entity_name: &'a str,
    blacklist: &'a HashSet<EntityId>,
}

impl PursuitSource<EntityId> for EntitySource<'_> {
    fn position_of(&self, view: &dyn WorldView, target: &EntityId) -> Option<Vec3> {
        view.entity(*target).filter(|e| e.valid).map(|e| e.position)
    }

    fn closest_to(&self, view: &dyn WorldView, origin: Vec3) -> Option<EntityId> {
        view.entities()
            .into_iter()
            .filter(|e| {
                e.valid
                    && crate::types::item_matches(&e.name, self.entity_name)
                    && !self.blacklist.contains(&e.id)
            })
            .min_by(|a, b| {
                a.distance_sq_to(origin).total_cmp(&b.distance_sq_to(origin))
            })
            .map(|e| e.id)
    }

    fn is_valid(&self, view: &dyn WorldView, target: &EntityId) -> bool {
        !self.blacklist.contains(target)
            && view.entity(*target).map(|e| e.valid).unwrap_or(false)
    }
}

/// Gathering tactic: kill entities of a kind, loot their drops.
pub struct KillAndLoot {
    entity_name: String,
    targets: Vec<ItemTarget>,
    pursuit: ClosestObjectPursuit<EntityId>,
    blacklist: HashSet<EntityId>,
    goal: Option<(EntityId, Rc<RefCell<KillEntityTask>>)>,
    pickup: Option<TaskHandle>,
    wander: Option<TaskHandle>,
}

impl KillAndLoot {
    pub fn new(entity_name: &str, targets: Vec<ItemTarget>) -> Self {
        Self {
            entity_name: entity_name.to_string(),
            targets,
            pursuit: ClosestObjectPursuit::new(),
            blacklist: HashSet::new(),
            goal: None,
            pickup: None,
            wander: None,
        }
    }
}

impl ResourceTactic for KillAndLoot {
    fn name(&self) -> String {
        format!("Hunt[{}]", self.entity_name)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::KillAndLoot {
            entity: self.entity_name.clone(),
            targets: self.targets.clone(),
        }
    }

    fn on_resource_start(&mut self, _agent: &mut dyn AgentControl) {
        self.pursuit.reset();
        self.blacklist.clear();
        self.goal = None;
    }

    fn on_resource_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if closest_matching_drop(&*agent, &self.targets, DROP_NOTICE_RANGE).is_some() {
            let targets = self.targets.clone();
            let pickup = self
                .pickup
                .get_or_insert_with(|| handle(PickupDropsTask::new(targets)))
                .clone();
            return Some(pickup);
        }

        if let Some((id, goal)) = &self.goal {
            if goal.borrow().is_failed() {
                debug!("🗡️ Entity {} kept evading; blacklisting", id);
                self.blacklist.insert(*id);
                self.pursuit.purge(id);
                self.goal = None;
            } else if goal.borrow().dead(&*agent) {
                self.goal = None;
            }
        }

        let source = EntitySource {
            entity_name: &self.entity_name,
            blacklist: &self.blacklist,
        };
        match self.pursuit.select(&*agent, &source) {
            Some(id) => {
                self.pursuit.set_pursuing(true);
                match &self.goal {
                    Some((held, goal)) if *held == id => {
                        let current: TaskHandle = goal.clone();
                        Some(current)
                    }
                    _ => {
                        let goal = Rc::new(RefCell::new(KillEntityTask::new(id)));
                        self.goal = Some((id, goal.clone()));
                        let current: TaskHandle = goal;
                        Some(current)
                    }
                }
            }
            None => {
                self.pursuit.set_pursuing(false);
                let wander = self
                    .wander
                    .get_or_insert_with(|| handle(TimeoutWanderTask::new()))
                    .clone();
                Some(wander)
            }
        }
    }

    fn on_reevaluate(&mut self) {
        self.goal = None;
        self.pursuit.clear_current();
    }
}

/// Collect items by hunting the entities that drop them.
pub fn kill_and_loot(entity_name: &str, targets: Vec<ItemTarget>) -> ResourceTask<KillAndLoot> {
    let tactic = KillAndLoot::new(entity_name, targets.clone());
    ResourceTask::new(targets, tactic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::SimWorld;
    use crate::task::TaskRunner;
    use crate::types::ItemStack;

    #[test]
    fn test_kill_and_loot_collects_drops() {
        let mut world = SimWorld::flat(21);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        world.spawn_entity_with_loot(
            "cow",
            Vec3::new(6.0, 64.0, 0.5),
            10.0,
            vec![ItemStack::new("beef", 2)],
        );

        let task = kill_and_loot("cow", vec![ItemTarget::new("beef", 2)]);
        let mut runner = TaskRunner::new(handle(task));
        for _ in 0..1500 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "hunt should finish");
        assert!(world.inventory().count_of("beef") >= 2);
    }

    #[test]
    fn test_kill_entity_finishes_on_dead_target() {
        let mut world = SimWorld::flat(22);
        let id = world.spawn_entity("cow", Vec3::new(2.0, 64.0, 0.5), 4.0);
        let task = KillEntityTask::new(id);
        assert!(!task.is_finished(&world));

        // One swing at 4 hp kills it.
        world.attack_entity(id);
        assert!(task.is_finished(&world));
    }
}
