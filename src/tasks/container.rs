/// Container and crafting protocols: open a window with a use command and
/// wait for the window signal, shuttle items with atomic slot clicks behind
/// a small cooldown, and resolve 2x2 / 3x3 recipes from the static book.
use crate::errors::{AgentError, Result};
use crate::facade::{
    AgentControl, Face, MouseButton, SlotAction, WindowKind, WorldView,
};
use crate::recipes::{recipe_grid_indices, CraftingRecipe};
use crate::task::{handle, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::inventory::{
    window_slot_of_inventory_index, ClearCraftingGridTask, EnsureFreeCursorTask,
    CLICK_COOLDOWN_TICKS, SLOT_CRAFT_INPUT_FIRST, SLOT_CRAFT_OUTPUT,
};
use crate::tasks::movement::GetToPositionTask;
use crate::types::{block_center, block_of};
use glam::IVec3;
use std::cell::Cell;
use tracing::{debug, warn};

/// Interaction reach for containers.
const CONTAINER_REACH: f32 = 4.0;
/// Open attempts before giving up on a container block.
const MAX_OPEN_ATTEMPTS: u32 = 10;

/// Furnace-family window slots.
pub const FURNACE_SLOT_INPUT: i32 = 0;
pub const FURNACE_SLOT_FUEL: i32 = 1;
pub const FURNACE_SLOT_OUTPUT: i32 = 2;

/// Items burnable as furnace fuel, preferred first.
const FUEL_ITEMS: &[&str] = &["coal", "charcoal", "planks", "_log", "stick"];

/// Approach a container block and keep issuing the open command until the
/// window shows up.
pub struct OpenContainerTask {
    pos: IVec3,
    kinds: Vec<WindowKind>,
    walk: Option<TaskHandle>,
    retry: TickTimer,
    attempts: u32,
    failed: bool,
}

impl OpenContainerTask {
    pub fn new(pos: IVec3, kinds: Vec<WindowKind>) -> Self {
        Self {
            pos,
            kinds,
            walk: None,
            retry: TickTimer::new(10),
            attempts: 0,
            failed: false,
        }
    }

    fn window_open(&self, view: &dyn WorldView) -> bool {
        view.open_window()
            .map(|w| self.kinds.contains(&w.kind))
            .unwrap_or(false)
    }
}

impl Task for OpenContainerTask {
    fn display_name(&self) -> String {
        format!("OpenContainer({}, {}, {})", self.pos.x, self.pos.y, self.pos.z)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::OpenContainer { pos: self.pos }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.attempts = 0;
        self.failed = false;
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.window_open(&*agent) {
            return None;
        }
        let center = block_center(self.pos);
        if agent.player_pos().distance(center) > CONTAINER_REACH {
            let pos = self.pos;
            let walk = self
                .walk
                .get_or_insert_with(|| handle(GetToPositionTask::new(pos)))
                .clone();
            return Some(walk);
        }
        let now = agent.game_tick();
        if self.retry.tick(now) {
            if self.attempts >= MAX_OPEN_ATTEMPTS {
                warn!("📦 Container at {:?} never opened", self.pos);
                self.failed = true;
                return None;
            }
            agent.look_at(center);
            agent.use_on_block(self.pos);
            self.attempts += 1;
        }
        None
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.window_open(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Place one block of an item on a nearby free spot (or a given spot).
pub struct PlaceBlockTask {
    item: String,
    pos: IVec3,
    click: TickTimer,
    failed: bool,
}

impl PlaceBlockTask {
    pub fn new(item: &str, pos: IVec3) -> Self {
        Self {
            item: item.to_string(),
            pos,
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
            failed: false,
        }
    }

    fn placed(&self, view: &dyn WorldView) -> bool {
        view.block_at(self.pos)
            .map(|b| crate::types::item_matches(&b.name, &self.item))
            .unwrap_or(false)
    }
}

/// A free spot adjacent to the agent with solid ground under it.
pub fn find_placement_spot(view: &dyn WorldView) -> Option<IVec3> {
    let feet = block_of(view.player_pos());
    for radius in 1..=3i32 {
        for dx in -radius..=radius {
            for dz in -radius..=radius {
                if dx.abs().max(dz.abs()) != radius {
                    continue;
                }
                let spot = feet + IVec3::new(dx, 0, dz);
                let empty = view
                    .block_at(spot)
                    .map(|b| b.bounds == crate::facade::BlockBounds::Empty)
                    .unwrap_or(false);
                let solid_below = view
                    .block_at(spot - IVec3::Y)
                    .map(|b| b.bounds == crate::facade::BlockBounds::Solid)
                    .unwrap_or(false);
                if empty && solid_below {
                    return Some(spot);
                }
            }
        }
    }
    None
}

impl Task for PlaceBlockTask {
    fn display_name(&self) -> String {
        format!("PlaceBlock({})", self.item)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::PlaceBlockAt {
            pos: self.pos,
            item: self.item.clone(),
        }
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.placed(&*agent) {
            return None;
        }
        if agent.inventory().find_slot(&self.item).is_none() {
            self.failed = true;
            return None;
        }
        if !matches!(agent.held_item(), Some(s) if crate::types::item_matches(&s.name, &self.item))
        {
            agent.equip(&self.item, crate::facade::EquipDestination::Hand);
            return None;
        }
        let now = agent.game_tick();
        if self.click.tick(now) {
            agent.look_at(block_center(self.pos));
            agent.place_block(self.pos - IVec3::Y, Face::Up);
        }
        None
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.placed(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CraftState {
    Opening,
    ClearingGrid,
    PlacingItems,
    ReceivingOutput,
}

/// Result of one grid-filling click.
enum PlaceOutcome {
    /// A click was issued (or nothing was needed).
    Clicked,
    /// The cursor holds something the current slot cannot take.
    NeedsPark,
    /// A needed ingredient is missing from the inventory.
    Missing,
}

/// Craft an item from the static book, in the inventory 2x2 or through a
/// crafting table. Finishes once the inventory holds `count` of the output.
pub struct CraftItemTask {
    recipe: &'static CraftingRecipe,
    count: u32,
    use_table: bool,
    material: Option<String>,
    state: CraftState,
    click: TickTimer,
    open: Option<TaskHandle>,
    place: Option<TaskHandle>,
    clear: Option<TaskHandle>,
    cursor_free: Option<TaskHandle>,
    done: Cell<bool>,
    failed: bool,
}

/// Craft with the inventory 2x2 grid; rejects recipes that need a table.
pub fn craft_in_inventory(output: &str, count: u32) -> Result<CraftItemTask> {
    let recipe = crate::recipes::recipe_for(output)
        .ok_or_else(|| AgentError::recipe(format!("unknown recipe '{}'", output)))?;
    if recipe.needs_table() {
        return Err(AgentError::misconfiguration(format!(
            "recipe '{}' needs a crafting table",
            output
        )));
    }
    Ok(CraftItemTask::new(recipe, count, false))
}

/// Craft through a crafting table (works for 2x2 recipes too).
pub fn craft_in_table(output: &str, count: u32) -> Result<CraftItemTask> {
    let recipe = crate::recipes::recipe_for(output)
        .ok_or_else(|| AgentError::recipe(format!("unknown recipe '{}'", output)))?;
    Ok(CraftItemTask::new(recipe, count, true))
}

/// Whichever grid fits the recipe.
pub fn craft(output: &str, count: u32) -> Result<CraftItemTask> {
    let recipe = crate::recipes::recipe_for(output)
        .ok_or_else(|| AgentError::recipe(format!("unknown recipe '{}'", output)))?;
    Ok(CraftItemTask::new(recipe, count, recipe.needs_table()))
}

impl CraftItemTask {
    fn new(recipe: &'static CraftingRecipe, count: u32, use_table: bool) -> Self {
        Self {
            recipe,
            count,
            use_table,
            material: None,
            state: CraftState::Opening,
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
            open: None,
            place: None,
            clear: None,
            cursor_free: None,
            done: Cell::new(false),
            failed: false,
        }
    }

    pub fn output(&self) -> &str {
        &self.recipe.output
    }

    fn satisfied(&self, view: &dyn WorldView) -> bool {
        if self.done.get() {
            return true;
        }
        if view.inventory().count_of(&self.recipe.output) >= self.count {
            self.done.set(true);
            return true;
        }
        false
    }

    fn grid_ready(&self, view: &dyn WorldView) -> bool {
        let grid = view.crafting_grid();
        if grid.is_empty() {
            return false;
        }
        let Some(mapping) = recipe_grid_indices(self.recipe, grid.len()) else {
            return false;
        };
        mapping.iter().enumerate().all(|(ri, gi)| {
            match (&self.recipe.slots[ri], &grid[*gi]) {
                (None, None) => true,
                (Some(req), Some(stack)) => {
                    stack.count >= req.count && self.slot_accepts(ri, req, &stack.name)
                }
                _ => false,
            }
        })
    }

    fn slot_accepts(&self, recipe_index: usize, req: &crate::recipes::RecipeSlot, name: &str) -> bool {
        if self.masked(recipe_index) {
            match &self.material {
                Some(material) => name == material,
                None => req.accepts(name),
            }
        } else {
            req.accepts(name)
        }
    }

    fn masked(&self, recipe_index: usize) -> bool {
        self.recipe
            .same_material_mask
            .as_ref()
            .and_then(|m| m.get(recipe_index).copied())
            .unwrap_or(false)
    }

    /// One shuttle click toward filling the grid.
    fn place_step(&mut self, agent: &mut dyn AgentControl) -> PlaceOutcome {
        let grid = agent.crafting_grid();
        let Some(mapping) = recipe_grid_indices(self.recipe, grid.len()) else {
            return PlaceOutcome::Missing;
        };
        let cursor = agent.inventory().cursor;

        for (ri, gi) in mapping.iter().enumerate() {
            let Some(req) = &self.recipe.slots[ri] else {
                continue;
            };
            let current = &grid[*gi];
            let filled = matches!(current, Some(stack) if stack.count >= req.count
                && self.slot_accepts(ri, req, &stack.name));
            if filled {
                continue;
            }

            let window_slot = SLOT_CRAFT_INPUT_FIRST + *gi as i32;
            match &cursor {
                Some(held) if self.slot_accepts(ri, req, &held.name) => {
                    agent.click_slot(window_slot, MouseButton::Right, SlotAction::Pickup);
                    return PlaceOutcome::Clicked;
                }
                Some(_) => {
                    // Whatever the cursor holds, this slot cannot take it.
                    return PlaceOutcome::NeedsPark;
                }
                None => {
                    let inventory = agent.inventory();
                    let source = inventory.slots.iter().position(|s| {
                        matches!(s, Some(stack) if self.slot_accepts(ri, req, &stack.name))
                    });
                    match source {
                        Some(index) => {
                            let slot = window_slot_of_inventory_index(&*agent, index);
                            agent.click_slot(slot, MouseButton::Left, SlotAction::Pickup);
                            return PlaceOutcome::Clicked;
                        }
                        None => {
                            warn!(
                                "🧰 Missing ingredient for '{}' slot {:?}",
                                self.recipe.output, req.names
                            );
                            return PlaceOutcome::Missing;
                        }
                    }
                }
            }
        }
        PlaceOutcome::Clicked
    }

    fn cursor_busy(view: &dyn WorldView) -> bool {
        view.inventory().cursor.is_some()
    }

    fn table_window_open(view: &dyn WorldView) -> bool {
        view.open_window()
            .map(|w| w.kind == WindowKind::CraftingTable)
            .unwrap_or(false)
    }
}

impl Task for CraftItemTask {
    fn display_name(&self) -> String {
        format!(
            "Craft({} x{}, state: {:?})",
            self.recipe.output, self.count, self.state
        )
    }

    fn intent(&self) -> TaskIntent {
        if self.use_table {
            TaskIntent::CraftInTable {
                output: self.recipe.output.clone(),
                count: self.count,
            }
        } else {
            TaskIntent::CraftInInventory {
                output: self.recipe.output.clone(),
                count: self.count,
            }
        }
    }

    fn on_start(&mut self, agent: &mut dyn AgentControl) {
        self.state = CraftState::Opening;
        self.failed = false;
        self.done.set(false);
        self.click.reset(agent.game_tick());
        if self.recipe.same_material_mask.is_some() {
            self.material = self.recipe.choose_masked_material(&agent.inventory());
            if self.material.is_none() {
                warn!(
                    "🧰 No single material covers the masked slots of '{}'",
                    self.recipe.output
                );
                self.failed = true;
            }
        }
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.satisfied(&*agent) {
            return None;
        }

        match self.state {
            CraftState::Opening => {
                if !self.use_table {
                    self.state = CraftState::ClearingGrid;
                    return None;
                }
                if Self::table_window_open(&*agent) {
                    self.state = CraftState::ClearingGrid;
                    return None;
                }
                // Find a table, or place one we carry.
                let near = block_of(agent.player_pos());
                let table = agent
                    .find_blocks(&["crafting_table".to_string()], near, 16)
                    .into_iter()
                    .next();
                match table {
                    Some(pos) => {
                        let open = self
                            .open
                            .get_or_insert_with(|| {
                                handle(OpenContainerTask::new(
                                    pos,
                                    vec![WindowKind::CraftingTable],
                                ))
                            })
                            .clone();
                        if open.borrow().is_failed() {
                            self.failed = true;
                            return None;
                        }
                        Some(open)
                    }
                    None => {
                        if agent.inventory().has("crafting_table") {
                            let Some(spot) = find_placement_spot(&*agent) else {
                                self.failed = true;
                                return None;
                            };
                            let place = self
                                .place
                                .get_or_insert_with(|| {
                                    handle(PlaceBlockTask::new("crafting_table", spot))
                                })
                                .clone();
                            if place.borrow().is_failed() {
                                self.failed = true;
                                return None;
                            }
                            Some(place)
                        } else {
                            warn!("🧰 No crafting table available for '{}'", self.recipe.output);
                            self.failed = true;
                            None
                        }
                    }
                }
            }
            CraftState::ClearingGrid => {
                if agent.crafting_grid().iter().all(|s| s.is_none()) {
                    self.state = CraftState::PlacingItems;
                    return None;
                }
                let clear = self
                    .clear
                    .get_or_insert_with(|| handle(ClearCraftingGridTask::new()))
                    .clone();
                Some(clear)
            }
            CraftState::PlacingItems => {
                if self.use_table && !Self::table_window_open(&*agent) {
                    self.state = CraftState::Opening;
                    return None;
                }
                if self.grid_ready(&*agent) {
                    self.state = CraftState::ReceivingOutput;
                    return None;
                }
                let now = agent.game_tick();
                if !self.click.tick(now) {
                    return None;
                }
                match self.place_step(agent) {
                    PlaceOutcome::Clicked => None,
                    PlaceOutcome::NeedsPark => {
                        let park = self
                            .cursor_free
                            .get_or_insert_with(|| handle(EnsureFreeCursorTask::new().keep_items()))
                            .clone();
                        Some(park)
                    }
                    PlaceOutcome::Missing => {
                        self.failed = true;
                        None
                    }
                }
            }
            CraftState::ReceivingOutput => {
                if !self.grid_ready(&*agent) {
                    self.state = CraftState::ClearingGrid;
                    return None;
                }
                if Self::cursor_busy(&*agent) {
                    let park = self
                        .cursor_free
                        .get_or_insert_with(|| handle(EnsureFreeCursorTask::new().keep_items()))
                        .clone();
                    return Some(park);
                }
                let now = agent.game_tick();
                if self.click.tick(now) {
                    debug!("🧰 Taking crafted {}", self.recipe.output);
                    agent.click_slot(SLOT_CRAFT_OUTPUT, MouseButton::Left, SlotAction::QuickMove);
                }
                None
            }
        }
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        if self.use_table && agent.open_window().is_some() {
            agent.close_window();
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.satisfied(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Cook or smelt items through the furnace family.
pub struct SmeltInFurnaceTask {
    material: String,
    output: String,
    count: u32,
    open: Option<TaskHandle>,
    place: Option<TaskHandle>,
    cursor_free: Option<TaskHandle>,
    click: TickTimer,
    done: Cell<bool>,
    failed: bool,
}

impl SmeltInFurnaceTask {
    pub fn new(material: &str, output: &str, count: u32) -> Self {
        Self {
            material: material.to_string(),
            output: output.to_string(),
            count,
            open: None,
            place: None,
            cursor_free: None,
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
            done: Cell::new(false),
            failed: false,
        }
    }

    fn furnace_open(view: &dyn WorldView) -> bool {
        view.open_window()
            .map(|w| {
                matches!(
                    w.kind,
                    WindowKind::Furnace | WindowKind::BlastFurnace | WindowKind::Smoker
                )
            })
            .unwrap_or(false)
    }

    fn satisfied(&self, view: &dyn WorldView) -> bool {
        if self.done.get() {
            return true;
        }
        if view.inventory().count_of(&self.output) >= self.count {
            self.done.set(true);
            return true;
        }
        false
    }

    fn fuel_slot_index(view: &dyn WorldView) -> Option<usize> {
        let inventory = view.inventory();
        for fuel in FUEL_ITEMS {
            if let Some(index) = inventory.find_slot(fuel) {
                return Some(index);
            }
        }
        None
    }
}

impl Task for SmeltInFurnaceTask {
    fn display_name(&self) -> String {
        format!("Smelt({} -> {} x{})", self.material, self.output, self.count)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::SmeltItems {
            output: self.output.clone(),
            count: self.count,
        }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.failed = false;
        self.done.set(false);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.satisfied(&*agent) {
            return None;
        }

        if !Self::furnace_open(&*agent) {
            let near = block_of(agent.player_pos());
            let furnace = agent
                .find_blocks(&["furnace".to_string()], near, 16)
                .into_iter()
                .next();
            match furnace {
                Some(pos) => {
                    let open = self
                        .open
                        .get_or_insert_with(|| {
                            handle(OpenContainerTask::new(
                                pos,
                                vec![
                                    WindowKind::Furnace,
                                    WindowKind::BlastFurnace,
                                    WindowKind::Smoker,
                                ],
                            ))
                        })
                        .clone();
                    if open.borrow().is_failed() {
                        self.failed = true;
                        return None;
                    }
                    return Some(open);
                }
                None => {
                    if agent.inventory().has("furnace") {
                        let Some(spot) = find_placement_spot(&*agent) else {
                            self.failed = true;
                            return None;
                        };
                        let place = self
                            .place
                            .get_or_insert_with(|| handle(PlaceBlockTask::new("furnace", spot)))
                            .clone();
                        if place.borrow().is_failed() {
                            self.failed = true;
                        }
                        return Some(place);
                    }
                    warn!("🔥 No furnace available");
                    self.failed = true;
                    return None;
                }
            }
        }

        let Some(window) = agent.open_window() else {
            return None;
        };
        let now = agent.game_tick();
        if !self.click.tick(now) {
            return None;
        }

        // Collect finished output first.
        if window.slot(FURNACE_SLOT_OUTPUT as usize).is_some() {
            agent.click_slot(FURNACE_SLOT_OUTPUT, MouseButton::Left, SlotAction::QuickMove);
            return None;
        }

        if Self::cursor_busy_stack(&window) {
            let park = self
                .cursor_free
                .get_or_insert_with(|| handle(EnsureFreeCursorTask::new().keep_items()))
                .clone();
            return Some(park);
        }

        // Keep the input slot stocked.
        let input_empty = window.slot(FURNACE_SLOT_INPUT as usize).is_none();
        if input_empty {
            let inventory = agent.inventory();
            match inventory.find_slot(&self.material) {
                Some(index) => {
                    let slot = window_slot_of_inventory_index(&*agent, index);
                    agent.click_slot(slot, MouseButton::Left, SlotAction::Pickup);
                    agent.click_slot(FURNACE_SLOT_INPUT, MouseButton::Left, SlotAction::Pickup);
                    return None;
                }
                None => {
                    warn!("🔥 Out of {} to smelt", self.material);
                    self.failed = true;
                    return None;
                }
            }
        }

        // Keep fuel burning.
        let fuel_empty = window.slot(FURNACE_SLOT_FUEL as usize).is_none();
        if fuel_empty {
            match Self::fuel_slot_index(&*agent) {
                Some(index) => {
                    let slot = window_slot_of_inventory_index(&*agent, index);
                    agent.click_slot(slot, MouseButton::Left, SlotAction::Pickup);
                    agent.click_slot(FURNACE_SLOT_FUEL, MouseButton::Left, SlotAction::Pickup);
                }
                None => {
                    warn!("🔥 No fuel for the furnace");
                    self.failed = true;
                }
            }
        }
        None
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        if agent.open_window().is_some() {
            agent.close_window();
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.satisfied(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

impl SmeltInFurnaceTask {
    fn cursor_busy_stack(window: &crate::facade::WindowSnapshot) -> bool {
        window.cursor.is_some()
    }
}

/// Empty a container into the inventory: open it, shift-click every stack
/// across, close. Used to loot side structures on the way.
pub struct LootContainerTask {
    pos: IVec3,
    open: Option<TaskHandle>,
    click: TickTimer,
    emptied: Cell<bool>,
    failed: bool,
}

impl LootContainerTask {
    pub fn new(pos: IVec3) -> Self {
        Self {
            pos,
            open: None,
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
            emptied: Cell::new(false),
            failed: false,
        }
    }

    fn container_stacks_left(view: &dyn WorldView) -> Option<usize> {
        let window = view.open_window()?;
        let container_len = window.slots.len().saturating_sub(36);
        Some(
            window.slots[..container_len]
                .iter()
                .filter(|s| s.is_some())
                .count(),
        )
    }
}

impl Task for LootContainerTask {
    fn display_name(&self) -> String {
        format!("LootContainer({}, {}, {})", self.pos.x, self.pos.y, self.pos.z)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::OpenContainer { pos: self.pos }
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.emptied.get() {
            if agent.open_window().is_some() {
                agent.close_window();
            }
            return None;
        }
        match Self::container_stacks_left(&*agent) {
            None => {
                let pos = self.pos;
                let open = self
                    .open
                    .get_or_insert_with(|| {
                        handle(OpenContainerTask::new(
                            pos,
                            vec![WindowKind::Chest, WindowKind::LargeChest],
                        ))
                    })
                    .clone();
                if open.borrow().is_failed() {
                    self.failed = true;
                    return None;
                }
                Some(open)
            }
            Some(0) => {
                self.emptied.set(true);
                agent.close_window();
                None
            }
            Some(_) => {
                let now = agent.game_tick();
                if self.click.tick(now) {
                    let window = agent.open_window();
                    if let Some(window) = window {
                        let container_len = window.slots.len().saturating_sub(36);
                        if let Some(slot) = window.slots[..container_len]
                            .iter()
                            .position(|s| s.is_some())
                        {
                            agent.click_slot(slot as i32, MouseButton::Left, SlotAction::QuickMove);
                        }
                    }
                }
                None
            }
        }
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        if agent.open_window().is_some() {
            agent.close_window();
        }
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.emptied.get()
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Place a bed and use it, anchoring respawn.
pub struct SetSpawnPointTask {
    place: Option<TaskHandle>,
    spot: Option<IVec3>,
    used: Cell<bool>,
    click: TickTimer,
    failed: bool,
}

impl SetSpawnPointTask {
    pub fn new() -> Self {
        Self {
            place: None,
            spot: None,
            used: Cell::new(false),
            click: TickTimer::new(CLICK_COOLDOWN_TICKS),
            failed: false,
        }
    }

    fn bed_nearby(view: &dyn WorldView) -> Option<IVec3> {
        view.find_blocks(&["_bed".to_string()], block_of(view.player_pos()), 8)
            .into_iter()
            .next()
    }
}

impl Default for SetSpawnPointTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for SetSpawnPointTask {
    fn display_name(&self) -> String {
        "SetSpawnPoint".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::SetSpawnPoint
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.used.get() {
            return None;
        }
        match Self::bed_nearby(&*agent) {
            Some(bed) => {
                let now = agent.game_tick();
                if self.click.tick(now) {
                    agent.look_at(block_center(bed));
                    agent.use_on_block(bed);
                    self.used.set(true);
                }
                None
            }
            None => {
                if !agent.inventory().has("_bed") {
                    self.failed = true;
                    return None;
                }
                let Some(spot) = self.spot.or_else(|| find_placement_spot(&*agent)) else {
                    self.failed = true;
                    return None;
                };
                self.spot = Some(spot);
                let place = self
                    .place
                    .get_or_insert_with(|| handle(PlaceBlockTask::new("_bed", spot)))
                    .clone();
                if place.borrow().is_failed() {
                    self.failed = true;
                    return None;
                }
                Some(place)
            }
        }
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.used.get()
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
    fn test_craft_in_inventory_rejects_table_recipes() {
        assert!(craft_in_inventory("furnace", 1).is_err());
        assert!(craft_in_inventory("planks", 4).is_ok());
        assert!(craft_in_inventory("no_such_output", 1).is_err());
    }

    #[test]
    fn test_craft_planks_from_logs() {
        let mut world = SimWorld::flat(71);
        world.give("oak_log", 2);
        let task = craft_in_inventory("planks", 4).unwrap();
        let mut runner = TaskRunner::new(handle(task));
        for _ in 0..200 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "craft should finish");
        assert!(world.inventory().count_of("planks") >= 4);
    }

    #[test]
    fn test_craft_sticks_through_table_recipe_path() {
        let mut world = SimWorld::flat(72);
        world.give("planks", 8);
        world.give("crafting_table", 1);
        let task = craft_in_table("stick", 4).unwrap();
        let mut runner = TaskRunner::new(handle(task));
        for _ in 0..400 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted());
        assert!(world.inventory().count_of("stick") >= 4);
    }

    #[test]
    fn test_smelt_beef_in_placed_furnace() {
        let mut world = SimWorld::flat(73);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        world.give("furnace", 1);
        world.give("beef", 3);
        world.give("coal", 2);
        let task = SmeltInFurnaceTask::new("beef", "cooked_beef", 2);
        let mut runner = TaskRunner::new(handle(task));
        for _ in 0..800 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "smelting should finish");
        assert!(world.inventory().count_of("cooked_beef") >= 2);
    }
}
