/// Mine-and-collect: break blocks that drop the wanted items, then walk the
/// drops down. Target blocks are chosen by the closest-object engine so the
/// agent does not ping-pong between near-equidistant ore veins, and blocks
/// that prove unreachable are blacklisted for the run.
use crate::facade::{AgentControl, WorldView};
use crate::pursuit::{ClosestObjectPursuit, PursuitSource};
use crate::task::{handle, ProgressChecker, Task, TaskHandle, TaskIntent};
use crate::tasks::movement::{GetToPositionTask, TimeoutWanderTask};
use crate::tasks::resource::{
    closest_matching_drop, PickupDropsTask, ResourceTactic, ResourceTask, DROP_NOTICE_RANGE,
};
use crate::types::{block_center, block_of, ItemTarget};
use glam::{IVec3, Vec3};
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;
use tracing::debug;

/// Reach for digging, in blocks.
const DIG_REACH: f32 = 4.5;
/// Cube radius of the block query around the agent.
const BLOCK_SEARCH_RADIUS: i32 = 64;

/// Leaf: break one block, approaching it first if out of reach.
pub struct MineBlockTask {
    pos: IVec3,
    matchers: Vec<String>,
    walk: Option<TaskHandle>,
    progress: ProgressChecker,
    failed: bool,
}

impl MineBlockTask {
    pub fn new(pos: IVec3, matchers: Vec<String>) -> Self {
        Self {
            pos,
            matchers,
            walk: None,
            progress: ProgressChecker::from_seconds(12.0),
            failed: false,
        }
    }

    fn block_gone(&self, view: &dyn WorldView) -> bool {
        match view.block_at(self.pos) {
            // Unloaded chunk: assume the block is still there.
            None => false,
            Some(block) => !self
                .matchers
                .iter()
                .any(|m| crate::types::item_matches(&block.name, m)),
        }
    }
}

impl Task for MineBlockTask {
    fn display_name(&self) -> String {
        format!("MineBlock({}, {}, {})", self.pos.x, self.pos.y, self.pos.z)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::MineBlock { pos: self.pos }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.progress.reset();
        self.failed = false;
        self.walk = None;
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.block_gone(&*agent) {
            return None;
        }
        let center = block_center(self.pos);
        let pos = agent.player_pos();
        if pos.distance(center) > DIG_REACH {
            let walk_failed = self
                .walk
                .as_ref()
                .map(|w| w.borrow().is_failed())
                .unwrap_or(false);
            if walk_failed {
                self.failed = true;
                return None;
            }
            let target = self.pos;
            let walk = self
                .walk
                .get_or_insert_with(|| handle(GetToPositionTask::new(target)))
                .clone();
            return Some(walk);
        }

        agent.look_at(center);
        agent.start_dig(self.pos);

        let tick = agent.game_tick();
        // Progress here is "the block is taking damage"; without a damage
        // observable we bound the whole dig with the patience window.
        self.progress.observe(tick, 1.0);
        if self.progress.failed(tick) {
            self.failed = true;
        }
        None
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.cancel_dig();
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.block_gone(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

struct BlockSource<'a> {
    names: &'a [String],
    blacklist: &'a HashSet<IVec3>,
}

impl PursuitSource<IVec3> for BlockSource<'_> {
    fn position_of(&self, _view: &dyn WorldView, target: &IVec3) -> Option<Vec3> {
        Some(block_center(*target))
    }

    fn closest_to(&self, view: &dyn WorldView, origin: Vec3) -> Option<IVec3> {
        view.find_blocks(self.names, block_of(origin), BLOCK_SEARCH_RADIUS)
            .into_iter()
            .filter(|p| !self.blacklist.contains(p))
            .min_by(|a, b| {
                block_center(*a)
                    .distance_squared(origin)
                    .total_cmp(&block_center(*b).distance_squared(origin))
            })
    }

    fn is_valid(&self, view: &dyn WorldView, target: &IVec3) -> bool {
        if self.blacklist.contains(target) {
            return false;
        }
        match view.block_at(*target) {
            None => true,
            Some(block) => self
                .names
                .iter()
                .any(|n| crate::types::item_matches(&block.name, n)),
        }
    }
}

/// Gathering tactic: mine matching blocks, pick up matching drops.
pub struct MineAndCollect {
    targets: Vec<ItemTarget>,
    block_names: Vec<String>,
    pursuit: ClosestObjectPursuit<IVec3>,
    blacklist: HashSet<IVec3>,
    goal: Option<(IVec3, Rc<RefCell<MineBlockTask>>)>,
    pickup: Option<TaskHandle>,
    wander: Option<TaskHandle>,
}

impl MineAndCollect {
    pub fn new(targets: Vec<ItemTarget>, block_names: Vec<String>) -> Self {
        Self {
            targets,
            block_names,
            pursuit: ClosestObjectPursuit::new(),
            blacklist: HashSet::new(),
            goal: None,
            pickup: None,
            wander: None,
        }
    }
}

impl ResourceTactic for MineAndCollect {
    fn name(&self) -> String {
        format!("Mine[{}]", self.block_names.join("|"))
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::MineAndCollect {
            targets: self.targets.clone(),
            blocks: self.block_names.clone(),
        }
    }

    fn on_resource_start(&mut self, _agent: &mut dyn AgentControl) {
        self.pursuit.reset();
        self.blacklist.clear();
        self.goal = None;
    }

    fn on_resource_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        // Drops on the ground beat more digging.
        if closest_matching_drop(&*agent, &self.targets, DROP_NOTICE_RANGE).is_some() {
            let targets = self.targets.clone();
            let pickup = self
                .pickup
                .get_or_insert_with(|| handle(PickupDropsTask::new(targets)))
                .clone();
            return Some(pickup);
        }

        // A goal that gave up poisons its block for this run.
        if let Some((pos, goal)) = &self.goal {
            if goal.borrow().is_failed() {
                debug!("⛏️ Block {:?} unreachable; blacklisting", pos);
                self.blacklist.insert(*pos);
                self.pursuit.purge(pos);
                self.goal = None;
            } else if goal.borrow().block_gone(&*agent) {
                self.goal = None;
            }
        }

        let source = BlockSource {
            names: &self.block_names,
            blacklist: &self.blacklist,
        };
        match self.pursuit.select(&*agent, &source) {
            Some(pos) => {
                self.pursuit.set_pursuing(true);
                match &self.goal {
                    Some((held, goal)) if *held == pos => {
                        let current: TaskHandle = goal.clone();
                        Some(current)
                    }
                    _ => {
                        let goal = Rc::new(RefCell::new(MineBlockTask::new(
                            pos,
                            self.block_names.clone(),
                        )));
                        self.goal = Some((pos, goal.clone()));
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

/// Collect items by mining the blocks that drop them.
pub fn mine_and_collect(
    targets: Vec<ItemTarget>,
    block_names: Vec<String>,
) -> ResourceTask<MineAndCollect> {
    let tactic = MineAndCollect::new(targets.clone(), block_names);
    ResourceTask::new(targets, tactic)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{BlockBounds, BlockSnapshot, SimWorld};
    use crate::task::TaskRunner;

    #[test]
    fn test_mine_and_collect_gathers_target_items() {
        let mut world = SimWorld::flat(11);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        for x in 0..3 {
            world.set_block(
                IVec3::new(6 + x, 64, 2),
                BlockSnapshot::new("coal_ore", BlockBounds::Solid),
            );
        }

        let task = mine_and_collect(
            vec![ItemTarget::new("coal", 2)],
            vec!["coal_ore".to_string()],
        );
        let mut runner = TaskRunner::new(handle(task));

        for _ in 0..2000 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "mining task should finish");
        assert!(
            world.inventory().count_of("coal") >= 2,
            "expected at least 2 coal, inventory: {:?}",
            world.inventory().slots
        );
    }

    #[test]
    fn test_mine_block_finishes_when_block_disappears() {
        let mut world = SimWorld::flat(12);
        world.set_block(
            IVec3::new(2, 64, 0),
            BlockSnapshot::new("coal_ore", BlockBounds::Solid),
        );
        let task = MineBlockTask::new(IVec3::new(2, 64, 0), vec!["coal_ore".to_string()]);
        assert!(!task.is_finished(&world));
        world.set_block(
            IVec3::new(2, 64, 0),
            BlockSnapshot::new("air", BlockBounds::Empty),
        );
        assert!(task.is_finished(&world));
    }
}
