/// Bed collection: wool from sheep, planks from logs, beds from a table.
/// A bed needs three wool of the same color, so wool counting is per color.
use crate::facade::{AgentControl, Inventory, WorldView};
use crate::task::{handle, TaskHandle, TaskIntent};
use crate::tasks::container::craft;
use crate::tasks::hunt::kill_and_loot;
use crate::tasks::mine::mine_and_collect;
use crate::tasks::resource::{ResourceTactic, ResourceTask};
use crate::types::ItemTarget;
use std::collections::HashMap;
use tracing::debug;

/// Wool per bed.
const WOOL_PER_BED: u32 = 3;
/// Planks per bed.
const PLANKS_PER_BED: u32 = 3;

/// Largest single-color wool count in the inventory.
fn max_same_color_wool(inventory: &Inventory) -> u32 {
    let mut by_color: HashMap<&str, u32> = HashMap::new();
    for stack in inventory.stacks() {
        if stack.name.contains("wool") {
            *by_color.entry(stack.name.as_str()).or_insert(0) += stack.count;
        }
    }
    by_color.values().copied().max().unwrap_or(0)
}

/// Gathering tactic for "collect N beds".
pub struct CollectBeds {
    count: u32,
    hunt: Option<TaskHandle>,
    logs: Option<TaskHandle>,
    craft_planks: Option<TaskHandle>,
    craft_table: Option<TaskHandle>,
    craft_bed: Option<TaskHandle>,
}

impl CollectBeds {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            hunt: None,
            logs: None,
            craft_planks: None,
            craft_table: None,
            craft_bed: None,
        }
    }

    fn child_live(handle: &Option<TaskHandle>, view: &dyn WorldView) -> bool {
        handle
            .as_ref()
            .map(|h| {
                let h = h.borrow();
                !h.is_finished(view) && !h.is_failed()
            })
            .unwrap_or(false)
    }
}

impl ResourceTactic for CollectBeds {
    fn name(&self) -> String {
        format!("Beds(x{})", self.count)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::CollectBeds { count: self.count }
    }

    fn on_resource_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let inventory = agent.inventory();
        let beds = inventory.count_of("_bed");
        if beds >= self.count {
            return None;
        }

        // Wool first: three of one color per bed.
        if max_same_color_wool(&inventory) < WOOL_PER_BED {
            if !Self::child_live(&self.hunt, &*agent) {
                let want = inventory.count_of("wool") + WOOL_PER_BED;
                debug!("🛏️ Need wool; hunting sheep");
                self.hunt = Some(handle(kill_and_loot(
                    "sheep",
                    vec![ItemTarget::new("wool", want)],
                )));
            }
            return self.hunt.clone();
        }

        // Then planks, via logs. Beds are a table recipe, so without a table
        // nearby we also need four planks for one.
        let table_nearby = !agent
            .find_blocks(
                &["crafting_table".to_string()],
                crate::types::block_of(agent.player_pos()),
                16,
            )
            .is_empty();
        let has_table = inventory.has("crafting_table") || table_nearby;
        let planks_needed = PLANKS_PER_BED + if has_table { 0 } else { 4 };
        if inventory.count_of("planks") < planks_needed {
            if inventory.count_of("_log") == 0 {
                if !Self::child_live(&self.logs, &*agent) {
                    self.logs = Some(handle(mine_and_collect(
                        vec![ItemTarget::new("_log", 2)],
                        vec!["_log".to_string()],
                    )));
                }
                return self.logs.clone();
            }
            match craft("planks", planks_needed) {
                Ok(task) => {
                    if !Self::child_live(&self.craft_planks, &*agent) {
                        self.craft_planks = Some(handle(task));
                    }
                    return self.craft_planks.clone();
                }
                Err(e) => {
                    debug!("🛏️ {}", e);
                    return None;
                }
            }
        }

        if !has_table {
            match craft("crafting_table", 1) {
                Ok(task) => {
                    if !Self::child_live(&self.craft_table, &*agent) {
                        self.craft_table = Some(handle(task));
                    }
                    return self.craft_table.clone();
                }
                Err(e) => {
                    debug!("🛏️ {}", e);
                    return None;
                }
            }
        }

        // Everything on hand: craft the next bed.
        match craft("white_bed", beds + 1) {
            Ok(task) => {
                if !Self::child_live(&self.craft_bed, &*agent) {
                    self.craft_bed = Some(handle(task));
                }
                self.craft_bed.clone()
            }
            Err(e) => {
                debug!("🛏️ {}", e);
                None
            }
        }
    }

    fn on_reevaluate(&mut self) {
        self.hunt = None;
        self.logs = None;
        self.craft_planks = None;
        self.craft_table = None;
        self.craft_bed = None;
    }
}

/// Collect `count` beds (any color family).
pub fn collect_beds(count: u32) -> ResourceTask<CollectBeds> {
    let targets = vec![ItemTarget::new("_bed", count)];
    ResourceTask::new(targets, CollectBeds::new(count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemStack;

    #[test]
    fn test_same_color_wool_counting() {
        let mut inv = Inventory::empty();
        inv.slots[0] = Some(ItemStack::new("white_wool", 2));
        inv.slots[1] = Some(ItemStack::new("black_wool", 1));
        assert_eq!(max_same_color_wool(&inv), 2, "colors do not pool");
        inv.slots[2] = Some(ItemStack::new("white_wool", 2));
        assert_eq!(max_same_color_wool(&inv), 4, "same color pools across stacks");
    }
}
