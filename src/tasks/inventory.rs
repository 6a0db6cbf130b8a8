/// Inventory/slot kernel: semantic slot constants, atomic click sequencing,
/// and the free-cursor / free-slot / clear-grid housekeeping every container
/// protocol leans on.
use crate::facade::{
    AgentControl, Inventory, MouseButton, SlotAction, WindowKind, WorldView, SLOT_CURSOR,
};
use crate::task::{Task, TaskHandle, TaskIntent, TickTimer};
use crate::types::ItemStack;
use tracing::debug;

/// Crafting output slot of the open grid.
pub const SLOT_CRAFT_OUTPUT: i32 = 0;
/// First inventory crafting grid slot (1..=4).
pub const SLOT_CRAFT_INPUT_FIRST: i32 = 1;
/// First main-inventory slot of the survival window.
pub const SLOT_MAIN_FIRST: i32 = 9;
/// First hotbar slot of the survival window.
pub const SLOT_HOTBAR_FIRST: i32 = 36;
/// Offhand slot of the survival window.
pub const SLOT_OFFHAND: i32 = 45;

/// Ticks between window clicks; servers drop faster click streams.
pub const CLICK_COOLDOWN_TICKS: u64 = 2;

/// Items never chosen by the garbage policy.
const PROTECTED_ITEMS: &[&str] = &[
    "pickaxe",
    "sword",
    "axe",
    "shovel",
    "helmet",
    "chestplate",
    "leggings",
    "boots",
    "shield",
    "flint_and_steel",
    "ender_eye",
    "ender_pearl",
    "blaze_rod",
    "blaze_powder",
    "obsidian",
    "_bed",
    "gold_ingot",
    "iron_ingot",
    "diamond",
    "bucket",
];

/// Preferred throwaways, best first.
const GARBAGE_PREFERENCE: &[&str] = &[
    "dirt",
    "gravel",
    "netherrack",
    "cobblestone",
    "sand",
    "rotten_flesh",
    "seeds",
];

/// Window slot index of an inventory-snapshot slot, accounting for an open
/// container shifting the player section.
pub fn window_slot_of_inventory_index(view: &dyn WorldView, index: usize) -> i32 {
    match view.open_window() {
        Some(window) => {
            let container_len = window.slots.len().saturating_sub(36);
            (container_len + index) as i32
        }
        None => SLOT_MAIN_FIRST + index as i32,
    }
}

/// The crafting grid slot range of the active window: inventory 2x2 or an
/// open table's 3x3. `None` when another container is open.
pub fn active_grid_slots(view: &dyn WorldView) -> Option<(i32, i32)> {
    match view.open_window() {
        None => Some((SLOT_CRAFT_INPUT_FIRST, 4)),
        Some(w) if w.kind == WindowKind::CraftingTable => Some((SLOT_CRAFT_INPUT_FIRST, 9)),
        Some(_) => None,
    }
}

/// Garbage-selection policy: a slot whose stack is safe to throw, avoiding
/// the caller's preserve list and anything protected.
pub fn pick_garbage_slot(inventory: &Inventory, preserve: &[String]) -> Option<usize> {
    let throwable = |stack: &ItemStack| {
        !preserve.iter().any(|p| crate::types::item_matches(&stack.name, p))
            && !PROTECTED_ITEMS
                .iter()
                .any(|p| crate::types::item_matches(&stack.name, p))
    };

    // Known garbage first, in preference order.
    for garbage in GARBAGE_PREFERENCE {
        if let Some(index) = inventory.slots.iter().position(
            |s| matches!(s, Some(stack) if crate::types::item_matches(&stack.name, garbage) && throwable(stack)),
        ) {
            return Some(index);
        }
    }
    // Otherwise the largest unprotected stack.
    inventory
        .slots
        .iter()
        .enumerate()
        .filter_map(|(i, s)| s.as_ref().map(|stack| (i, stack)))
        .filter(|(_, stack)| throwable(stack))
        .max_by_key(|(_, stack)| stack.count)
        .map(|(i, _)| i)
}

/// Park whatever the cursor holds: merge into a partial stack, else the first
/// empty slot, else (configurably) throw it. Idempotent: with a free cursor
/// it finishes immediately.
pub struct EnsureFreeCursorTask {
    throw_if_stuck: bool,
    click: TickTimer,
}

impl EnsureFreeCursorTask {
    pub fn new() -> Self {
        Self {
            throw_if_stuck: true,
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
        }
    }

    pub fn keep_items(mut self) -> Self {
        self.throw_if_stuck = false;
        self
    }

    fn cursor_stack(view: &dyn WorldView) -> Option<ItemStack> {
        match view.open_window() {
            Some(w) => w.cursor,
            None => view.inventory().cursor,
        }
    }
}

impl Default for EnsureFreeCursorTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for EnsureFreeCursorTask {
    fn display_name(&self) -> String {
        "EnsureFreeCursor".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::EnsureFreeCursor
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let Some(held) = Self::cursor_stack(&*agent) else {
            return None;
        };
        let now = agent.game_tick();
        if !self.click.tick(now) {
            return None;
        }

        let inventory = agent.inventory();
        if let Some(index) = inventory.partial_stack_slot(&held.name, 64) {
            let slot = window_slot_of_inventory_index(&*agent, index);
            agent.click_slot(slot, MouseButton::Left, SlotAction::Pickup);
        } else if let Some(index) = inventory.first_empty_slot() {
            let slot = window_slot_of_inventory_index(&*agent, index);
            agent.click_slot(slot, MouseButton::Left, SlotAction::Pickup);
        } else if self.throw_if_stuck {
            debug!("🗑️ Cursor stuck with {}; throwing", held.name);
            agent.click_slot(SLOT_CURSOR, MouseButton::Left, SlotAction::Throw);
        }
        None
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        Self::cursor_stack(view).is_none()
    }
}

/// Guarantee at least one empty main-inventory slot, clearing the cursor
/// first and then throwing a garbage stack if needed.
pub struct EnsureFreeInventorySlotTask {
    preserve: Vec<String>,
    click: TickTimer,
    cursor: Option<TaskHandle>,
    failed: bool,
}

impl EnsureFreeInventorySlotTask {
    pub fn new(preserve: Vec<String>) -> Self {
        Self {
            preserve,
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
            cursor: None,
            failed: false,
        }
    }
}

impl Task for EnsureFreeInventorySlotTask {
    fn display_name(&self) -> String {
        "EnsureFreeInventorySlot".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::EnsureFreeInventorySlot
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let inventory = agent.inventory();
        if inventory.first_empty_slot().is_some() {
            return None;
        }
        if inventory.cursor.is_some() {
            let cursor = self
                .cursor
                .get_or_insert_with(|| crate::task::handle(EnsureFreeCursorTask::new()))
                .clone();
            return Some(cursor);
        }
        let now = agent.game_tick();
        if !self.click.tick(now) {
            return None;
        }
        match pick_garbage_slot(&inventory, &self.preserve) {
            Some(index) => {
                let slot = window_slot_of_inventory_index(&*agent, index);
                agent.click_slot(slot, MouseButton::Left, SlotAction::Throw);
            }
            None => {
                // Everything is protected; a full inventory of valuables is
                // a real precondition failure.
                self.failed = true;
            }
        }
        None
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        view.inventory().first_empty_slot().is_some()
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Shift-click the active crafting grid empty.
pub struct ClearCraftingGridTask {
    click: TickTimer,
}

impl ClearCraftingGridTask {
    pub fn new() -> Self {
        Self {
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
        }
    }

    fn occupied_grid_slot(view: &dyn WorldView) -> Option<i32> {
        let (first, _) = active_grid_slots(view)?;
        let grid = view.crafting_grid();
        grid.iter()
            .position(|s| s.is_some())
            .map(|offset| first + offset as i32)
    }
}

impl Default for ClearCraftingGridTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for ClearCraftingGridTask {
    fn display_name(&self) -> String {
        "ClearCraftingGrid".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::ClearCraftingGrid
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let Some(slot) = Self::occupied_grid_slot(&*agent) else {
            return None;
        };
        let now = agent.game_tick();
        if self.click.tick(now) {
            agent.click_slot(slot, MouseButton::Left, SlotAction::QuickMove);
        }
        None
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        Self::occupied_grid_slot(view).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::SimWorld;
    use crate::types::ItemTarget;

    fn full_inventory(world: &mut SimWorld) {
        world.give("iron_ingot", 1);
        // Distinct names so the sim cannot merge them into one stack.
        for i in 0..35 {
            world.give(&format!("mossy_junk_{}", i), 1);
        }
    }

    #[test]
    fn test_pick_garbage_prefers_known_junk_and_respects_preserve() {
        let mut inv = Inventory::empty();
        inv.slots[0] = Some(ItemStack::new("iron_ingot", 5));
        inv.slots[1] = Some(ItemStack::new("cobblestone", 30));
        inv.slots[2] = Some(ItemStack::new("dirt", 3));
        assert_eq!(pick_garbage_slot(&inv, &[]), Some(2));

        let preserve = vec!["dirt".to_string()];
        assert_eq!(pick_garbage_slot(&inv, &preserve), Some(1));

        let preserve = vec!["dirt".to_string(), "cobblestone".to_string()];
        assert_eq!(pick_garbage_slot(&inv, &preserve), None, "iron is protected");
    }

    #[test]
    fn test_ensure_free_cursor_is_idempotent() {
        let mut world = SimWorld::flat(61);
        let mut task = EnsureFreeCursorTask::new();
        // Free cursor: immediately finished, no clicks issued.
        assert!(task.is_finished(&world));
        assert!(task.on_tick(&mut world).is_none());
        assert!(world.take_commands().is_empty());

        // And a second run is still a no-op.
        let mut again = EnsureFreeCursorTask::new();
        assert!(again.on_tick(&mut world).is_none());
        assert!(again.is_finished(&world));
    }

    #[test]
    fn test_ensure_free_slot_throws_garbage() {
        let mut world = SimWorld::flat(62);
        full_inventory(&mut world);
        assert!(world.inventory().first_empty_slot().is_none());

        let mut task = EnsureFreeInventorySlotTask::new(vec![]);
        for _ in 0..20 {
            if task.is_finished(&world) {
                break;
            }
            task.on_tick(&mut world);
            world.step();
        }
        assert!(task.is_finished(&world), "a slot should be freed");
        assert!(
            world.inventory().count_matching(&ItemTarget::new("iron_ingot", 1)) >= 1,
            "protected items must survive"
        );
    }
}
