/// Food: the hunger-unit table, the food-potential calculation, the
/// collect-food tactic, and the eat-to-refill leaf.
///
/// Food potential values every stack once at its best processed form: raw
/// cookable meat counts at its cooked value, wheat only through the bread it
/// bakes into (3:1), hay blocks as three loaves each. Raw and processed
/// values are never summed for the same stack.
use crate::facade::{AgentControl, EquipDestination, Inventory, WorldView};
use crate::task::{handle, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::container::SmeltInFurnaceTask;
use crate::tasks::hunt::kill_and_loot;
use crate::tasks::movement::TimeoutWanderTask;
use crate::tasks::resource::{
    closest_matching_drop, PickupDropsTask, ResourceTactic, ResourceTask, DROP_NOTICE_RANGE,
};
use crate::types::{ItemTarget, TICKS_PER_SECOND};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Hunger units restored by one item.
pub fn food_value(name: &str) -> u32 {
    match name {
        "cooked_beef" | "cooked_porkchop" => 8,
        "cooked_mutton" | "cooked_chicken" | "cooked_salmon" | "golden_carrot" => 6,
        "cooked_rabbit" | "cooked_cod" | "bread" | "baked_potato" => 5,
        "apple" => 4,
        "carrot" => 3,
        "melon_slice" | "sweet_berries" => 2,
        "potato" | "beetroot" => 1,
        _ => 0,
    }
}

/// The cooked form of a raw food, when one exists.
pub fn cooked_form(name: &str) -> Option<&'static str> {
    match name {
        "beef" => Some("cooked_beef"),
        "porkchop" => Some("cooked_porkchop"),
        "mutton" => Some("cooked_mutton"),
        "chicken" => Some("cooked_chicken"),
        "rabbit" => Some("cooked_rabbit"),
        "cod" => Some("cooked_cod"),
        "salmon" => Some("cooked_salmon"),
        "potato" => Some("baked_potato"),
        _ => None,
    }
}

/// Wheat per loaf of bread.
const WHEAT_PER_BREAD: u32 = 3;
/// Wheat in a hay block.
const WHEAT_PER_HAY: u32 = 9;

/// Total hunger units the inventory can become, counting each stack once at
/// its best processed value.
pub fn calculate_food_potential(inventory: &Inventory) -> u32 {
    let mut total = 0;
    for stack in inventory.stacks() {
        total += match stack.name.as_str() {
            "wheat" => (stack.count / WHEAT_PER_BREAD) * food_value("bread"),
            "hay_block" => stack.count * (WHEAT_PER_HAY / WHEAT_PER_BREAD) * food_value("bread"),
            name => match cooked_form(name) {
                Some(cooked) => stack.count * food_value(cooked),
                None => stack.count * food_value(name),
            },
        };
    }
    total
}

/// Animals worth hunting for food, with their raw drop.
const FOOD_ANIMALS: &[(&str, &str)] = &[
    ("cow", "beef"),
    ("pig", "porkchop"),
    ("sheep", "mutton"),
    ("chicken", "chicken"),
    ("rabbit", "rabbit"),
];

/// Anything the food tactic considers edible loot on the ground.
fn food_drop_targets() -> Vec<ItemTarget> {
    let mut names: Vec<&str> = FOOD_ANIMALS.iter().map(|(_, drop)| *drop).collect();
    names.extend_from_slice(&["bread", "wheat", "apple", "carrot", "potato"]);
    vec![ItemTarget::any_of(&names, u32::MAX)]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectFoodConfig {
    pub units_needed: u32,
    pub max_search_radius: f32,
    pub cook_food: bool,
    pub craft_bread: bool,
    pub reevaluate_interval_s: f32,
}

impl Default for CollectFoodConfig {
    fn default() -> Self {
        Self {
            units_needed: 20,
            max_search_radius: 64.0,
            cook_food: true,
            craft_bread: true,
            reevaluate_interval_s: 10.0,
        }
    }
}

/// Gathering tactic: hunt animals, bake bread, cook what was looted, until
/// the inventory's food potential covers the configured units.
pub struct CollectFood {
    config: CollectFoodConfig,
    hunt: Option<TaskHandle>,
    smelt: Option<TaskHandle>,
    bake: Option<TaskHandle>,
    pickup: Option<TaskHandle>,
    wander: Option<TaskHandle>,
}

impl CollectFood {
    pub fn new(config: CollectFoodConfig) -> Self {
        Self {
            config,
            hunt: None,
            smelt: None,
            bake: None,
            pickup: None,
            wander: None,
        }
    }

    fn most_plentiful_raw(&self, inventory: &Inventory) -> Option<(String, u32)> {
        FOOD_ANIMALS
            .iter()
            .map(|(_, drop)| (*drop, inventory.count_exact(drop)))
            .filter(|(_, count)| *count > 0)
            .max_by_key(|(_, count)| *count)
            .map(|(name, count)| (name.to_string(), count))
    }

    fn closest_food_animal(&self, view: &dyn WorldView) -> Option<(String, String)> {
        let player = view.player_pos();
        view.entities()
            .into_iter()
            .filter(|e| e.valid && e.position.distance(player) <= self.config.max_search_radius)
            .filter_map(|e| {
                FOOD_ANIMALS
                    .iter()
                    .find(|(animal, _)| e.name == *animal)
                    .map(|(animal, drop)| (e.distance_sq_to(player), *animal, *drop))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, animal, drop)| (animal.to_string(), drop.to_string()))
    }
}

impl ResourceTactic for CollectFood {
    fn name(&self) -> String {
        format!("Food({} units)", self.config.units_needed)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::CollectFood {
            units: self.config.units_needed,
        }
    }

    fn on_resource_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let inventory = agent.inventory();

        // Edible loot on the ground first.
        if closest_matching_drop(&*agent, &food_drop_targets(), DROP_NOTICE_RANGE).is_some() {
            let pickup = self
                .pickup
                .get_or_insert_with(|| handle(PickupDropsTask::new(food_drop_targets())))
                .clone();
            return Some(pickup);
        }

        // Cook a raw batch once it is worth the furnace trip.
        if self.config.cook_food {
            if let Some((raw, count)) = self.most_plentiful_raw(&inventory) {
                let has_furnace = inventory.has("furnace")
                    || !agent
                        .find_blocks(
                            &["furnace".to_string()],
                            crate::types::block_of(agent.player_pos()),
                            16,
                        )
                        .is_empty();
                if count >= 3 && has_furnace {
                    if let Some(cooked) = cooked_form(&raw) {
                        let want = inventory.count_of(cooked) + count;
                        let smelt = self
                            .smelt
                            .get_or_insert_with(|| {
                                handle(SmeltInFurnaceTask::new(&raw, cooked, want))
                            })
                            .clone();
                        let over = {
                            let s = smelt.borrow();
                            s.is_finished(&*agent) || s.is_failed()
                        };
                        if !over {
                            return Some(smelt);
                        }
                        self.smelt = None;
                    }
                }
            }
        }

        // Bake carried wheat into bread. Bread is a table recipe, so only
        // bother when a table is on hand or in sight.
        let table_available = inventory.has("crafting_table")
            || !agent
                .find_blocks(
                    &["crafting_table".to_string()],
                    crate::types::block_of(agent.player_pos()),
                    16,
                )
                .is_empty();
        if self.config.craft_bread
            && table_available
            && inventory.count_of("wheat") >= WHEAT_PER_BREAD
        {
            match crate::tasks::container::craft("bread", inventory.count_of("bread") + 1) {
                Ok(task) => {
                    let bake = self.bake.get_or_insert_with(|| handle(task)).clone();
                    let over = {
                        let b = bake.borrow();
                        b.is_finished(&*agent) || b.is_failed()
                    };
                    if !over {
                        return Some(bake);
                    }
                    self.bake = None;
                }
                Err(e) => debug!("🍞 {}", e),
            }
        }

        // Hunt the closest edible animal for one more piece.
        if let Some((animal, drop)) = self.closest_food_animal(&*agent) {
            let want = inventory.count_of(&drop) + 1;
            let hunt_stale = self
                .hunt
                .as_ref()
                .map(|h| {
                    let h = h.borrow();
                    h.is_finished(&*agent) || h.is_failed()
                })
                .unwrap_or(true);
            if hunt_stale {
                debug!("🍖 Hunting a {} for {}", animal, drop);
                self.hunt = Some(handle(kill_and_loot(
                    &animal,
                    vec![ItemTarget::new(&drop, want)],
                )));
            }
            return self.hunt.clone();
        }

        let wander = self
            .wander
            .get_or_insert_with(|| handle(TimeoutWanderTask::new()))
            .clone();
        Some(wander)
    }

    fn on_reevaluate(&mut self) {
        self.hunt = None;
        self.smelt = None;
        self.bake = None;
    }

    fn is_complete(&self, view: &dyn WorldView, _targets: &[ItemTarget]) -> bool {
        calculate_food_potential(&view.inventory()) >= self.config.units_needed
    }
}

/// Collect food until the inventory's potential covers `units`.
pub fn collect_food(config: CollectFoodConfig) -> ResourceTask<CollectFood> {
    let reevaluate = config.reevaluate_interval_s;
    let tactic = CollectFood::new(config);
    ResourceTask::new(Vec::new(), tactic).with_reevaluate_seconds(reevaluate)
}

/// Seconds between bites.
const EAT_INTERVAL_TICKS: u64 = 2 * TICKS_PER_SECOND;

/// Leaf: equip the best food and eat until the food bar recovers.
pub struct EatFoodTask {
    target_level: u32,
    bite: TickTimer,
    failed: bool,
}

impl EatFoodTask {
    pub fn new(target_level: u32) -> Self {
        Self {
            target_level,
            bite: TickTimer::new(EAT_INTERVAL_TICKS),
            failed: false,
        }
    }

    fn best_food_slot(inventory: &Inventory) -> Option<&crate::types::ItemStack> {
        inventory
            .stacks()
            .filter(|s| food_value(&s.name) > 0)
            .max_by_key(|s| food_value(&s.name))
    }
}

impl Task for EatFoodTask {
    fn display_name(&self) -> String {
        format!("EatFood(to {})", self.target_level)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::EatFood
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if agent.food_level() >= self.target_level {
            return None;
        }
        let inventory = agent.inventory();
        let Some(food) = Self::best_food_slot(&inventory) else {
            warn!("🍖 Hungry with nothing edible");
            self.failed = true;
            return None;
        };
        let food_name = food.name.clone();
        if !matches!(agent.held_item(), Some(s) if s.name == food_name) {
            agent.equip(&food_name, EquipDestination::Hand);
            return None;
        }
        let now = agent.game_tick();
        if self.bite.tick(now) {
            agent.use_held_item();
        }
        None
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        view.food_level() >= self.target_level
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemStack;

    fn inv_with(stacks: &[(&str, u32)]) -> Inventory {
        let mut inv = Inventory::empty();
        for (i, (name, count)) in stacks.iter().enumerate() {
            inv.slots[i] = Some(ItemStack::new(name, *count));
        }
        inv
    }

    #[test]
    fn test_cooked_meat_counts_at_face_value() {
        let inv = inv_with(&[("cooked_beef", 5)]);
        assert_eq!(calculate_food_potential(&inv), 40);
    }

    #[test]
    fn test_raw_cookable_counts_at_cooked_value_once() {
        let inv = inv_with(&[("beef", 5)]);
        assert_eq!(calculate_food_potential(&inv), 40, "raw beef counts as cooked");
    }

    #[test]
    fn test_wheat_counts_only_through_bread() {
        let inv = inv_with(&[("wheat", 9)]);
        assert_eq!(calculate_food_potential(&inv), 15, "9 wheat = 3 bread = 15");
    }

    #[test]
    fn test_hay_block_counts_as_three_loaves() {
        let inv = inv_with(&[("hay_block", 1)]);
        assert_eq!(calculate_food_potential(&inv), 15);
    }

    #[test]
    fn test_mixed_inventory_sums_each_stack_once() {
        let inv = inv_with(&[("beef", 2), ("wheat", 3), ("bread", 1)]);
        assert_eq!(calculate_food_potential(&inv), 16 + 5 + 5);
    }

    #[test]
    fn test_eat_food_refills_in_sim() {
        use crate::facade::SimWorld;
        use crate::task::TaskRunner;
        let mut world = SimWorld::flat(81);
        world.set_food(10);
        world.give("cooked_beef", 3);
        let mut runner = TaskRunner::new(handle(EatFoodTask::new(18)));
        for _ in 0..300 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted());
        assert!(world.food_level() >= 18);
    }
}
