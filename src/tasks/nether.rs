/// Nether resource pipelines: blaze rods from a spawner (with a fortress
/// chunk-search fallback) and ender pearls bartered from piglins.
use crate::facade::{AgentControl, EquipDestination, WorldView};
use crate::task::{handle, Stopwatch, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::chunk_search::{search_chunks_for_block, ChunkSearchConfig};
use crate::tasks::dimension::GoToDimensionTask;
use crate::tasks::hunt::kill_and_loot;
use crate::tasks::movement::{GetToPositionTask, TimeoutWanderTask};
use crate::tasks::resource::{
    closest_matching_drop, PickupDropsTask, ResourceTactic, ResourceTask, DROP_NOTICE_RANGE,
};
use crate::tasks::safety::{FleeConfig, FleeHostilesTask};
use crate::types::{block_of, seconds_to_ticks, Dimension, ItemTarget};
use glam::IVec3;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectBlazeRodsConfig {
    pub count: u32,
    pub spawner_blaze_radius: f32,
    pub flee_health_threshold: f32,
    pub max_blaze_count: usize,
}

impl Default for CollectBlazeRodsConfig {
    fn default() -> Self {
        Self {
            count: 7,
            spawner_blaze_radius: 32.0,
            flee_health_threshold: 10.0,
            max_blaze_count: 5,
        }
    }
}

/// Gathering tactic: camp a blaze spawner and farm rods, finding a fortress
/// by chunk search when no spawner is known.
pub struct CollectBlazeRods {
    config: CollectBlazeRodsConfig,
    dimension_child: Option<TaskHandle>,
    flee: Option<TaskHandle>,
    hunt: Option<TaskHandle>,
    pickup: Option<TaskHandle>,
    search: Option<Rc<RefCell<crate::tasks::chunk_search::SearchChunksForBlockTask>>>,
    walk: Option<TaskHandle>,
    wander: Option<TaskHandle>,
}

impl CollectBlazeRods {
    pub fn new(config: CollectBlazeRodsConfig) -> Self {
        Self {
            config,
            dimension_child: None,
            flee: None,
            hunt: None,
            pickup: None,
            search: None,
            walk: None,
            wander: None,
        }
    }

    fn nearest_spawner(&self, view: &dyn WorldView) -> Option<IVec3> {
        view.find_blocks(&["spawner".to_string()], block_of(view.player_pos()), 64)
            .into_iter()
            .next()
    }

    fn blazes_near(&self, view: &dyn WorldView, around: IVec3) -> Vec<crate::facade::EntityId> {
        let center = crate::types::block_center(around);
        view.entities()
            .into_iter()
            .filter(|e| {
                e.valid
                    && e.name == "blaze"
                    && e.position.distance(center) <= self.config.spawner_blaze_radius
            })
            .map(|e| e.id)
            .collect()
    }
}

impl ResourceTactic for CollectBlazeRods {
    fn name(&self) -> String {
        format!("BlazeRods(x{})", self.config.count)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::CollectBlazeRods {
            count: self.config.count,
        }
    }

    fn on_resource_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if agent.dimension() != Dimension::Nether {
            let hop = self
                .dimension_child
                .get_or_insert_with(|| handle(GoToDimensionTask::new(Dimension::Nether)))
                .clone();
            return Some(hop);
        }

        // Blazes hit hard; low health means leave now.
        if agent.health() < self.config.flee_health_threshold {
            warn!("🔥 Health low while farming blazes; fleeing");
            let flee = self
                .flee
                .get_or_insert_with(|| handle(FleeHostilesTask::new(FleeConfig::default())))
                .clone();
            return Some(flee);
        }

        let rod_targets = vec![ItemTarget::new("blaze_rod", self.config.count)];
        if closest_matching_drop(&*agent, &rod_targets, DROP_NOTICE_RANGE).is_some() {
            let pickup = self
                .pickup
                .get_or_insert_with(|| handle(PickupDropsTask::new(rod_targets.clone())))
                .clone();
            return Some(pickup);
        }

        match self.nearest_spawner(&*agent) {
            Some(spawner) => {
                let blazes = self.blazes_near(&*agent, spawner);
                if blazes.len() > self.config.max_blaze_count {
                    // Too many awake at once; back off instead of feeding.
                    let flee = self
                        .flee
                        .get_or_insert_with(|| handle(FleeHostilesTask::new(FleeConfig::default())))
                        .clone();
                    return Some(flee);
                }
                if !blazes.is_empty() {
                    let want = agent.item_count(&ItemTarget::new("blaze_rod", 0)) + 1;
                    let stale = self
                        .hunt
                        .as_ref()
                        .map(|h| {
                            let h = h.borrow();
                            h.is_finished(&*agent) || h.is_failed()
                        })
                        .unwrap_or(true);
                    if stale {
                        self.hunt = Some(handle(kill_and_loot(
                            "blaze",
                            vec![ItemTarget::new("blaze_rod", want)],
                        )));
                    }
                    return self.hunt.clone();
                }
                // Wait by the spawner for the next spawn wave.
                let walk = self
                    .walk
                    .get_or_insert_with(|| {
                        handle(GetToPositionTask::new(spawner + IVec3::new(2, 0, 2)))
                    })
                    .clone();
                let there = {
                    let w = walk.borrow();
                    w.is_finished(&*agent) || w.is_failed()
                };
                if there {
                    return None;
                }
                Some(walk)
            }
            None => {
                // No spawner known: hunt fortress blocks by chunk search.
                let search = self
                    .search
                    .get_or_insert_with(|| {
                        Rc::new(RefCell::new(search_chunks_for_block(
                            vec!["nether_bricks".to_string()],
                            ChunkSearchConfig::default(),
                        )))
                    })
                    .clone();
                let (complete, found, stuck) = {
                    let s = search.borrow();
                    (
                        s.is_finished(&*agent),
                        s.found_block(),
                        s.is_failed(),
                    )
                };
                if stuck {
                    debug!("🔥 Fortress search exhausted; wandering on");
                    self.search = None;
                    let wander = self
                        .wander
                        .get_or_insert_with(|| handle(TimeoutWanderTask::new()))
                        .clone();
                    return Some(wander);
                }
                if complete {
                    if let Some(bricks) = found {
                        let walk = self
                            .walk
                            .get_or_insert_with(|| handle(GetToPositionTask::new(bricks)))
                            .clone();
                        return Some(walk);
                    }
                }
                let search_handle: TaskHandle = search;
                Some(search_handle)
            }
        }
    }

    fn on_reevaluate(&mut self) {
        self.hunt = None;
        self.walk = None;
    }
}

/// Collect blaze rods from fortress blazes.
pub fn collect_blaze_rods(config: CollectBlazeRodsConfig) -> ResourceTask<CollectBlazeRods> {
    let targets = vec![ItemTarget::new("blaze_rod", config.count)];
    ResourceTask::new(targets, CollectBlazeRods::new(config))
}

/// Seconds a piglin gets to finish admiring before we re-offer.
const BARTER_TIMEOUT_SECONDS: f32 = 30.0;
/// Offer reach.
const OFFER_REACH: f32 = 3.0;

/// Barter gold to piglins for ender pearls.
pub struct TradeWithPiglinsTask {
    pearls_wanted: u32,
    walk: Option<TaskHandle>,
    pickup: Option<TaskHandle>,
    wander: Option<TaskHandle>,
    barter_clock: Stopwatch,
    offer_cooldown: TickTimer,
    done: Cell<bool>,
    failed: bool,
}

impl TradeWithPiglinsTask {
    pub fn new(pearls_wanted: u32) -> Self {
        Self {
            pearls_wanted,
            walk: None,
            pickup: None,
            wander: None,
            barter_clock: Stopwatch::default(),
            offer_cooldown: TickTimer::new(20),
            done: Cell::new(false),
            failed: false,
        }
    }

    fn satisfied(&self, view: &dyn WorldView) -> bool {
        if self.done.get() {
            return true;
        }
        if view.inventory().count_of("ender_pearl") >= self.pearls_wanted {
            self.done.set(true);
            return true;
        }
        false
    }

    /// An adult piglin not already mid-barter.
    fn tradeable_piglin(view: &dyn WorldView) -> Option<crate::facade::EntitySnapshot> {
        let player = view.player_pos();
        view.entities()
            .into_iter()
            .filter(|e| {
                e.valid && e.name == "piglin" && !e.piglin_is_baby() && !e.piglin_is_trading()
            })
            .min_by(|a, b| a.distance_sq_to(player).total_cmp(&b.distance_sq_to(player)))
    }
}

impl Task for TradeWithPiglinsTask {
    fn display_name(&self) -> String {
        format!("TradeWithPiglins(x{})", self.pearls_wanted)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::TradeWithPiglins {
            pearls: self.pearls_wanted,
        }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.barter_clock.clear();
        self.failed = false;
        self.done.set(false);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.satisfied(&*agent) {
            return None;
        }
        if agent.dimension() != Dimension::Nether {
            self.failed = true;
            return None;
        }

        // Pearls on the ground settle the trade.
        let pearl_targets = vec![ItemTarget::new("ender_pearl", self.pearls_wanted)];
        if closest_matching_drop(&*agent, &pearl_targets, DROP_NOTICE_RANGE).is_some() {
            let pickup = self
                .pickup
                .get_or_insert_with(|| handle(PickupDropsTask::new(pearl_targets.clone())))
                .clone();
            return Some(pickup);
        }

        if agent.inventory().count_of("gold_ingot") == 0 {
            warn!("🐷 No gold left to barter");
            self.failed = true;
            return None;
        }

        // A barter in flight: give the piglin its admiring window.
        let now = agent.game_tick();
        if self.barter_clock.running() {
            let trading = agent
                .entities()
                .iter()
                .any(|e| e.valid && e.name == "piglin" && e.piglin_is_trading());
            if trading {
                if self.barter_clock.elapsed_ticks(now)
                    <= seconds_to_ticks(BARTER_TIMEOUT_SECONDS)
                {
                    return None;
                }
                debug!("🐷 Barter timed out; re-offering");
            }
            self.barter_clock.clear();
        }

        match Self::tradeable_piglin(&*agent) {
            Some(piglin) => {
                if agent.player_pos().distance(piglin.position) > OFFER_REACH {
                    let stale = self
                        .walk
                        .as_ref()
                        .map(|w| {
                            let w = w.borrow();
                            w.is_failed() || w.is_finished(&*agent)
                        })
                        .unwrap_or(true);
                    if stale {
                        self.walk = Some(handle(GetToPositionTask::new(block_of(
                            piglin.position,
                        ))));
                    }
                    return self.walk.clone();
                }
                if !matches!(agent.held_item(), Some(s) if s.name == "gold_ingot") {
                    agent.equip("gold_ingot", EquipDestination::Hand);
                    return None;
                }
                if self.offer_cooldown.tick(now) {
                    info!("🐷 Offering gold to piglin {}", piglin.id);
                    agent.use_on_entity(piglin.id);
                    self.barter_clock.start(now);
                }
                None
            }
            None => {
                let wander = self
                    .wander
                    .get_or_insert_with(|| handle(TimeoutWanderTask::new()))
                    .clone();
                Some(wander)
            }
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.satisfied(view)
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
    use glam::Vec3;

    #[test]
    fn test_barter_produces_pearls_in_sim() {
        let mut world = SimWorld::flat(91);
        world.set_dimension("the_nether");
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        world.give("gold_ingot", 4);
        world.spawn_entity("piglin", Vec3::new(2.5, 64.0, 0.5), 16.0);

        let mut runner = TaskRunner::new(handle(TradeWithPiglinsTask::new(1)));
        for _ in 0..1200 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "barter should complete");
        assert!(world.inventory().count_of("ender_pearl") >= 1);
    }

    #[test]
    fn test_barter_requires_nether() {
        let mut world = SimWorld::flat(92);
        world.give("gold_ingot", 1);
        let mut task = TradeWithPiglinsTask::new(1);
        task.on_tick(&mut world);
        assert!(task.is_failed(), "bartering outside the nether is a precondition failure");
    }

    #[test]
    fn test_trading_piglin_is_skipped() {
        let mut world = SimWorld::flat(93);
        world.set_dimension("the_nether");
        let id = world.spawn_entity("piglin", Vec3::new(2.5, 64.0, 0.5), 16.0);
        world.set_entity_offhand(id, Some(crate::types::ItemStack::new("gold_ingot", 1)));
        assert!(TradeWithPiglinsTask::tradeable_piglin(&world).is_none());
    }
}
