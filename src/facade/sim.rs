/// Deterministic in-memory world implementing the facade traits.
///
/// Drives integration tests and the demo binary: a flat world with a block
/// map, an entity table, naive per-tick actuation (walk along the look
/// direction, finish digs after a fixed delay, pick up nearby drops), and a
/// command log the tests assert against.
///
/// Asynchronous facade behavior is emulated faithfully: equips and window
/// opens settle one tick after the command, never synchronously.
use crate::facade::snapshot::*;
use crate::facade::{AgentControl, Control, EquipDestination, Face, MouseButton, SlotAction, WorldView};
use crate::recipes;
use crate::types::{block_of, ItemStack};
use glam::{IVec2, IVec3, Vec3};
use rand::Rng;
use rand_pcg::Pcg64;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Ticks for a dig command to break a block.
const DIG_TICKS: u64 = 20;
/// Ticks standing inside a portal before the dimension flips.
const PORTAL_TICKS: u64 = 80;
/// Ticks a piglin admires gold before dropping pearls.
const BARTER_TICKS: u64 = 120;
/// Ticks a furnace needs per smelted item.
const SMELT_TICKS: u64 = 40;
/// Eye-of-ender flight time before it despawns.
const EYE_FLIGHT_TICKS: u64 = 60;
/// Blocks per tick while walking (sprinting scales this up).
const WALK_SPEED: f32 = 0.21;
const SPRINT_FACTOR: f32 = 1.3;
/// Radius within which dropped items are absorbed.
const PICKUP_RADIUS: f32 = 1.5;
/// Attack damage per swing.
const ATTACK_DAMAGE: f32 = 4.0;

/// Every command issued to the sim, recorded for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetControl(Control, bool),
    ClearControls,
    Look(f32, f32),
    LookAt(Vec3),
    StartDig(IVec3),
    CancelDig,
    PlaceBlock(IVec3, Face),
    Equip(String, EquipDestination),
    Attack(EntityId),
    UseItem,
    UseOnEntity(EntityId),
    UseOnBlock(IVec3),
    ClickSlot(i32, MouseButton, SlotAction),
    CloseWindow,
}

struct SimEntity {
    snap: EntitySnapshot,
    loot: Vec<ItemStack>,
    /// Remaining flight ticks for projectile-style entities.
    ttl: Option<u64>,
}

struct SimWindow {
    kind: WindowKind,
    slots: Vec<Option<ItemStack>>,
    /// Furnace smelt progress in ticks.
    smelt_ticks: u64,
}

/// Scriptable world + agent; see module docs.
pub struct SimWorld {
    tick: u64,
    dimension_id: String,
    time_of_day: u32,

    player_pos: Vec3,
    player_vel: Vec3,
    yaw: f32,
    pitch: f32,
    look_dir: Vec3,
    health: f32,
    food: u32,
    spawn_point: Option<IVec3>,

    /// Survival-window slot layout: 0 craft output, 1..=4 craft grid,
    /// 5..=8 armor, 9..=35 main, 36..=44 hotbar, 45 offhand.
    player_window: Vec<Option<ItemStack>>,
    cursor: Option<ItemStack>,
    open: Option<SimWindow>,

    blocks: HashMap<IVec3, BlockSnapshot>,
    ground_y: i32,
    loaded_radius: i32,

    entities: HashMap<EntityId, SimEntity>,
    next_entity_id: EntityId,

    controls: HashSet<Control>,
    digging: Option<(IVec3, u64)>,
    pending_equip: Option<(String, EquipDestination)>,
    pending_window: Option<IVec3>,
    /// (piglin id, tick the barter completes).
    barters: Vec<(EntityId, u64)>,
    /// Tick the player stepped into the portal block they are standing in.
    portal_entered: Option<u64>,

    /// Where thrown eyes of ender fly, when scripted.
    stronghold: Option<IVec2>,

    rng: Pcg64,
    pub commands: Vec<Command>,
}

impl SimWorld {
    /// Flat overworld: grass at `ground_y`, air above, stone below.
    pub fn flat(seed: u64) -> Self {
        Self {
            tick: 0,
            dimension_id: "overworld".to_string(),
            time_of_day: 1000,
            player_pos: Vec3::new(0.5, 64.0, 0.5),
            player_vel: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            look_dir: Vec3::Z,
            health: 20.0,
            food: 20,
            spawn_point: None,
            player_window: vec![None; 46],
            cursor: None,
            open: None,
            blocks: HashMap::new(),
            ground_y: 63,
            loaded_radius: 128,
            entities: HashMap::new(),
            next_entity_id: 1,
            controls: HashSet::new(),
            digging: None,
            pending_equip: None,
            pending_window: None,
            barters: Vec::new(),
            portal_entered: None,
            stronghold: None,
            rng: Pcg64::new(seed as u128, 0xa02bdbf7bb3c0a7),
            commands: Vec::new(),
        }
    }

    // --- scripting -------------------------------------------------------

    pub fn set_dimension(&mut self, id: &str) {
        self.dimension_id = id.to_string();
    }

    pub fn set_player_pos(&mut self, pos: Vec3) {
        self.player_pos = pos;
    }

    pub fn set_health(&mut self, health: f32) {
        self.health = health;
    }

    pub fn set_food(&mut self, food: u32) {
        self.food = food;
    }

    pub fn set_stronghold(&mut self, xz: IVec2) {
        self.stronghold = Some(xz);
    }

    pub fn set_block(&mut self, pos: IVec3, block: BlockSnapshot) {
        self.blocks.insert(pos, block);
    }

    pub fn set_loaded_radius(&mut self, radius: i32) {
        self.loaded_radius = radius;
    }

    /// Put items straight into the first free main slots.
    pub fn give(&mut self, name: &str, count: u32) {
        self.insert_stack(ItemStack::new(name, count));
    }

    pub fn spawn_entity(&mut self, name: &str, pos: Vec3, health: f32) -> EntityId {
        self.spawn_entity_with_loot(name, pos, health, Vec::new())
    }

    pub fn spawn_entity_with_loot(
        &mut self,
        name: &str,
        pos: Vec3,
        health: f32,
        loot: Vec<ItemStack>,
    ) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        self.entities.insert(
            id,
            SimEntity {
                snap: EntitySnapshot {
                    id,
                    name: name.to_string(),
                    position: pos,
                    velocity: Vec3::ZERO,
                    valid: true,
                    health: Some(health),
                    metadata: HashMap::new(),
                    hand_item: None,
                    offhand_item: None,
                },
                loot,
                ttl: None,
            },
        );
        id
    }

    pub fn set_entity_metadata(&mut self, id: EntityId, index: usize, value: MetaValue) {
        if let Some(e) = self.entities.get_mut(&id) {
            e.snap.metadata.insert(index, value);
        }
    }

    pub fn set_entity_velocity(&mut self, id: EntityId, velocity: Vec3) {
        if let Some(e) = self.entities.get_mut(&id) {
            e.snap.velocity = velocity;
        }
    }

    pub fn set_entity_offhand(&mut self, id: EntityId, stack: Option<ItemStack>) {
        if let Some(e) = self.entities.get_mut(&id) {
            e.snap.offhand_item = stack;
        }
    }

    pub fn spawn_point(&self) -> Option<IVec3> {
        self.spawn_point
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    // --- internals -------------------------------------------------------

    fn insert_stack(&mut self, stack: ItemStack) {
        // Merge into an existing stack of the same item first.
        for slot in self.player_window[9..45].iter_mut() {
            if let Some(existing) = slot {
                if existing.name == stack.name {
                    existing.count += stack.count;
                    return;
                }
            }
        }
        for slot in self.player_window[9..45].iter_mut() {
            if slot.is_none() {
                *slot = Some(stack);
                return;
            }
        }
        // Inventory full: the stack is lost, mirroring a missed pickup.
    }

    fn synth_block(&self, pos: IVec3) -> BlockSnapshot {
        if pos.y < self.ground_y {
            BlockSnapshot::new("stone", BlockBounds::Solid)
        } else if pos.y == self.ground_y {
            let floor = match self.dimension() {
                crate::types::Dimension::Nether => "netherrack",
                crate::types::Dimension::End => "end_stone",
                _ => "grass_block",
            };
            BlockSnapshot::new(floor, BlockBounds::Solid)
        } else {
            BlockSnapshot::new("air", BlockBounds::Empty)
        }
    }

    fn grid_range(&self) -> Option<(usize, usize)> {
        match &self.open {
            None => Some((1, 4)),
            Some(w) if w.kind == WindowKind::CraftingTable => Some((1, 9)),
            _ => None,
        }
    }

    fn refresh_craft_output(&mut self) {
        let Some((lo, hi)) = self.grid_range() else {
            return;
        };
        let grid: Vec<Option<ItemStack>> = (lo..=hi).map(|i| self.slot_read(i as i32)).collect();
        let output = recipes::match_grid(&grid);
        self.slot_write(0, output);
    }

    fn active_container_len(&self) -> usize {
        self.open.as_ref().map(|w| w.slots.len()).unwrap_or(0)
    }

    /// Resolve a window slot index to the backing storage.
    fn slot_read(&self, index: i32) -> Option<ItemStack> {
        if index == crate::facade::SLOT_CURSOR {
            return self.cursor.clone();
        }
        let index = index as usize;
        match &self.open {
            None => self.player_window.get(index).cloned().flatten(),
            Some(w) => {
                if index < w.slots.len() {
                    w.slots.get(index).cloned().flatten()
                } else {
                    // Player main + hotbar appended after the container.
                    let player_index = 9 + (index - w.slots.len());
                    self.player_window.get(player_index).cloned().flatten()
                }
            }
        }
    }

    fn slot_write(&mut self, index: i32, stack: Option<ItemStack>) {
        if index == crate::facade::SLOT_CURSOR {
            self.cursor = stack;
            return;
        }
        let index = index as usize;
        match &mut self.open {
            None => {
                if index < self.player_window.len() {
                    self.player_window[index] = stack;
                }
            }
            Some(w) => {
                if index < w.slots.len() {
                    w.slots[index] = stack;
                } else {
                    let player_index = 9 + (index - w.slots.len());
                    if player_index < self.player_window.len() {
                        self.player_window[player_index] = stack;
                    }
                }
            }
        }
    }

    fn consume_one_from_grid(&mut self) {
        let Some((lo, hi)) = self.grid_range() else {
            return;
        };
        for i in lo..=hi {
            if let Some(mut stack) = self.slot_read(i as i32) {
                stack.count -= 1;
                let remaining = if stack.count == 0 { None } else { Some(stack) };
                self.slot_write(i as i32, remaining);
            }
        }
    }

    fn consume_held(&mut self, count: u32) {
        // Held item lives in the first hotbar slot in this sim.
        if let Some(stack) = &mut self.player_window[36] {
            stack.count = stack.count.saturating_sub(count);
            if stack.count == 0 {
                self.player_window[36] = None;
            }
        }
    }

    /// Advance the world by one game tick.
    pub fn step(&mut self) {
        self.tick += 1;
        self.time_of_day = (self.time_of_day + 1) % 24000;

        // Equips settle one tick late.
        if let Some((name, dest)) = self.pending_equip.take() {
            let found = self.player_window[9..45]
                .iter()
                .position(|s| matches!(s, Some(st) if crate::types::item_matches(&st.name, &name)))
                .map(|i| i + 9);
            if let Some(slot) = found {
                let target = match dest {
                    EquipDestination::Hand => 36,
                    EquipDestination::OffHand => 45,
                };
                if slot != target {
                    self.player_window.swap(slot, target);
                }
            }
        }

        // Window opens settle one tick late.
        if let Some(pos) = self.pending_window.take() {
            if let Some(block) = self.block_at(pos) {
                let (kind, len) = match block.name.as_str() {
                    "chest" => (WindowKind::Chest, 27),
                    "crafting_table" => (WindowKind::CraftingTable, 10),
                    "furnace" => (WindowKind::Furnace, 3),
                    "blast_furnace" => (WindowKind::BlastFurnace, 3),
                    "smoker" => (WindowKind::Smoker, 3),
                    "anvil" => (WindowKind::Anvil, 3),
                    "smithing_table" => (WindowKind::SmithingTable, 4),
                    _ => (WindowKind::Chest, 27),
                };
                self.open = Some(SimWindow {
                    kind,
                    slots: vec![None; len],
                    smelt_ticks: 0,
                });
            }
        }

        // Movement along the horizontal look direction.
        if self.controls.contains(&Control::Forward) {
            let mut dir = Vec3::new(self.look_dir.x, 0.0, self.look_dir.z);
            if dir.length_squared() > 1e-6 {
                dir = dir.normalize();
                let speed = if self.controls.contains(&Control::Sprint) {
                    WALK_SPEED * SPRINT_FACTOR
                } else {
                    WALK_SPEED
                };
                self.player_pos += dir * speed;
                self.player_vel = dir * speed;
            }
        } else if self.controls.contains(&Control::Left) || self.controls.contains(&Control::Right)
        {
            let mut dir = Vec3::new(self.look_dir.x, 0.0, self.look_dir.z);
            if dir.length_squared() > 1e-6 {
                dir = dir.normalize();
                let side = Vec3::new(-dir.z, 0.0, dir.x);
                let sign = if self.controls.contains(&Control::Left) {
                    -1.0
                } else {
                    1.0
                };
                let speed = if self.controls.contains(&Control::Sprint) {
                    WALK_SPEED * SPRINT_FACTOR
                } else {
                    WALK_SPEED
                };
                self.player_pos += side * sign * speed;
                self.player_vel = side * sign * speed;
            }
        } else {
            self.player_vel = Vec3::ZERO;
        }

        // Dig completion.
        if let Some((pos, started)) = self.digging {
            if self.tick - started >= DIG_TICKS {
                self.digging = None;
                if let Some(block) = self.blocks.remove(&pos) {
                    if let Some(drop) = drop_for_block(&block.name) {
                        let at = crate::types::block_center(pos);
                        let id = self.spawn_entity("item", at, 1.0);
                        if let Some(e) = self.entities.get_mut(&id) {
                            e.snap.hand_item = Some(ItemStack::new(&drop, 1));
                        }
                    }
                } else {
                    // Synthesized terrain: carve an air block over it.
                    let block = self.synth_block(pos);
                    if block.bounds == BlockBounds::Solid {
                        if let Some(drop) = drop_for_block(&block.name) {
                            let at = crate::types::block_center(pos);
                            let id = self.spawn_entity("item", at, 1.0);
                            if let Some(e) = self.entities.get_mut(&id) {
                                e.snap.hand_item = Some(ItemStack::new(&drop, 1));
                            }
                        }
                        self.blocks
                            .insert(pos, BlockSnapshot::new("air", BlockBounds::Empty));
                    }
                }
            }
        }

        // Projectile flight (thrown eyes).
        let mut expired = Vec::new();
        for (id, e) in self.entities.iter_mut() {
            if let Some(ttl) = &mut e.ttl {
                e.snap.position += e.snap.velocity;
                if *ttl == 0 {
                    expired.push(*id);
                } else {
                    *ttl -= 1;
                }
            }
        }
        for id in expired {
            self.entities.remove(&id);
        }

        // Barter settlement.
        let tick = self.tick;
        let finished: Vec<EntityId> = self
            .barters
            .iter()
            .filter(|(_, due)| *due <= tick)
            .map(|(id, _)| *id)
            .collect();
        self.barters.retain(|(_, due)| *due > tick);
        for id in finished {
            let Some(piglin) = self.entities.get_mut(&id) else {
                continue;
            };
            piglin.snap.offhand_item = None;
            let pos = piglin.snap.position;
            let pearls = self.rng.gen_range(1..=2);
            let drop_id = self.spawn_entity("item", pos, 1.0);
            if let Some(e) = self.entities.get_mut(&drop_id) {
                e.snap.hand_item = Some(ItemStack::new("ender_pearl", pearls));
            }
        }

        // Item pickup.
        let player = self.player_pos;
        let picked: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| {
                e.snap.name == "item"
                    && e.ttl.is_none()
                    && e.snap.position.distance(player) <= PICKUP_RADIUS
            })
            .map(|(id, _)| *id)
            .collect();
        for id in picked {
            if let Some(e) = self.entities.remove(&id) {
                if let Some(stack) = e.snap.hand_item {
                    debug!("sim: picked up {} x{}", stack.name, stack.count);
                    self.insert_stack(stack);
                }
            }
        }

        // Furnace smelting.
        if let Some(w) = &mut self.open {
            if matches!(
                w.kind,
                WindowKind::Furnace | WindowKind::BlastFurnace | WindowKind::Smoker
            ) {
                let has_input = w.slots[0].is_some();
                let has_fuel = w.slots[1].is_some();
                if has_input && has_fuel {
                    w.smelt_ticks += 1;
                    if w.smelt_ticks >= SMELT_TICKS {
                        w.smelt_ticks = 0;
                        let input = w.slots[0].take();
                        if let Some(mut input) = input {
                            if let Some(result) = smelt_result(&input.name) {
                                match &mut w.slots[2] {
                                    Some(out) if out.name == result => out.count += 1,
                                    slot @ None => *slot = Some(ItemStack::new(&result, 1)),
                                    _ => {}
                                }
                            }
                            input.count -= 1;
                            if input.count > 0 {
                                w.slots[0] = Some(input);
                            }
                            if let Some(fuel) = &mut w.slots[1] {
                                fuel.count -= 1;
                                if fuel.count == 0 {
                                    w.slots[1] = None;
                                }
                            }
                        }
                    }
                }
            }
        }

        // Portal travel after lingering inside the portal block.
        let standing = block_of(self.player_pos);
        let standing_block = self.block_at(standing).map(|b| b.name);
        match standing_block.as_deref() {
            Some("nether_portal") => {
                if self.portal_linger() >= PORTAL_TICKS {
                    self.dimension_id = if self.dimension_id.contains("nether") {
                        "overworld".to_string()
                    } else {
                        "the_nether".to_string()
                    };
                    self.portal_entered = None;
                    // Keep the agent next to a portal on the far side.
                    self.blocks
                        .insert(standing, BlockSnapshot::new("nether_portal", BlockBounds::Empty));
                }
            }
            Some("end_portal") => {
                self.dimension_id = "the_end".to_string();
                self.portal_entered = None;
            }
            _ => self.portal_entered = None,
        }
        if matches!(standing_block.as_deref(), Some("nether_portal")) {
            if self.portal_entered.is_none() {
                self.portal_entered = Some(self.tick);
            }
        }
    }

    fn portal_linger(&self) -> u64 {
        self.portal_entered
            .map(|since| self.tick.saturating_sub(since))
            .unwrap_or(0)
    }
}

/// Drop table for broken blocks.
fn drop_for_block(name: &str) -> Option<String> {
    match name {
        "air" | "nether_portal" | "end_portal" => None,
        "stone" => Some("cobblestone".to_string()),
        "grass_block" => Some("dirt".to_string()),
        "coal_ore" => Some("coal".to_string()),
        "iron_ore" => Some("raw_iron".to_string()),
        "gold_ore" | "nether_gold_ore" => Some("raw_gold".to_string()),
        "diamond_ore" => Some("diamond".to_string()),
        other => Some(other.to_string()),
    }
}

/// Furnace output for a smeltable input.
pub fn smelt_result(name: &str) -> Option<String> {
    match name {
        "beef" => Some("cooked_beef".to_string()),
        "porkchop" => Some("cooked_porkchop".to_string()),
        "chicken" => Some("cooked_chicken".to_string()),
        "mutton" => Some("cooked_mutton".to_string()),
        "rabbit" => Some("cooked_rabbit".to_string()),
        "cod" => Some("cooked_cod".to_string()),
        "salmon" => Some("cooked_salmon".to_string()),
        "potato" => Some("baked_potato".to_string()),
        "raw_iron" | "iron_ore" => Some("iron_ingot".to_string()),
        "raw_gold" | "gold_ore" => Some("gold_ingot".to_string()),
        "sand" => Some("glass".to_string()),
        _ => None,
    }
}

impl WorldView for SimWorld {
    fn game_tick(&self) -> u64 {
        self.tick
    }

    fn dimension_id(&self) -> String {
        self.dimension_id.clone()
    }

    fn time_of_day(&self) -> u32 {
        self.time_of_day
    }

    fn player_pos(&self) -> Vec3 {
        self.player_pos
    }

    fn player_velocity(&self) -> Vec3 {
        self.player_vel
    }

    fn player_rotation(&self) -> (f32, f32) {
        (self.yaw, self.pitch)
    }

    fn health(&self) -> f32 {
        self.health
    }

    fn food_level(&self) -> u32 {
        self.food
    }

    fn inventory(&self) -> Inventory {
        Inventory {
            slots: self.player_window[9..45].to_vec(),
            cursor: self.cursor.clone(),
            offhand: self.player_window[45].clone(),
        }
    }

    fn held_item(&self) -> Option<ItemStack> {
        self.player_window[36].clone()
    }

    fn crafting_grid(&self) -> Vec<Option<ItemStack>> {
        match self.grid_range() {
            Some((lo, hi)) => (lo..=hi).map(|i| self.slot_read(i as i32)).collect(),
            None => Vec::new(),
        }
    }

    fn open_window(&self) -> Option<WindowSnapshot> {
        self.open.as_ref().map(|w| {
            let mut slots = w.slots.clone();
            slots.extend_from_slice(&self.player_window[9..45]);
            WindowSnapshot {
                kind: w.kind,
                slots,
                cursor: self.cursor.clone(),
                progress: Some(w.smelt_ticks as f32 / SMELT_TICKS as f32),
            }
        })
    }

    fn entities(&self) -> Vec<EntitySnapshot> {
        self.entities.values().map(|e| e.snap.clone()).collect()
    }

    fn entity(&self, id: EntityId) -> Option<EntitySnapshot> {
        self.entities.get(&id).map(|e| e.snap.clone())
    }

    fn block_at(&self, pos: IVec3) -> Option<BlockSnapshot> {
        let player = block_of(self.player_pos);
        let dist = (pos.x - player.x).abs().max((pos.z - player.z).abs());
        if dist > self.loaded_radius {
            return None;
        }
        Some(
            self.blocks
                .get(&pos)
                .cloned()
                .unwrap_or_else(|| self.synth_block(pos)),
        )
    }

    fn find_blocks(&self, names: &[String], near: IVec3, radius: i32) -> Vec<IVec3> {
        let mut out: Vec<IVec3> = self
            .blocks
            .iter()
            .filter(|(pos, block)| {
                let dist = (pos.x - near.x)
                    .abs()
                    .max((pos.y - near.y).abs())
                    .max((pos.z - near.z).abs());
                dist <= radius
                    && names
                        .iter()
                        .any(|n| crate::types::item_matches(&block.name, n))
            })
            .map(|(pos, _)| *pos)
            .collect();
        out.sort_by_key(|p| {
            let d = *p - near;
            d.x * d.x + d.y * d.y + d.z * d.z
        });
        out
    }
}

impl AgentControl for SimWorld {
    fn set_control(&mut self, control: Control, held: bool) {
        self.commands.push(Command::SetControl(control, held));
        if held {
            self.controls.insert(control);
        } else {
            self.controls.remove(&control);
        }
    }

    fn clear_controls(&mut self) {
        self.commands.push(Command::ClearControls);
        self.controls.clear();
    }

    fn look(&mut self, yaw: f32, pitch: f32) {
        self.commands.push(Command::Look(yaw, pitch));
        self.yaw = yaw;
        self.pitch = pitch;
        let (ys, yc) = yaw.to_radians().sin_cos();
        let (ps, pc) = pitch.to_radians().sin_cos();
        self.look_dir = Vec3::new(-ys * pc, -ps, yc * pc);
    }

    fn look_at(&mut self, target: Vec3) {
        self.commands.push(Command::LookAt(target));
        let delta = target - self.player_pos;
        if delta.length_squared() > 1e-6 {
            self.look_dir = delta.normalize();
            self.yaw = (-delta.x).atan2(delta.z).to_degrees();
            let horiz = (delta.x * delta.x + delta.z * delta.z).sqrt();
            self.pitch = (-delta.y).atan2(horiz).to_degrees();
        }
    }

    fn start_dig(&mut self, pos: IVec3) {
        self.commands.push(Command::StartDig(pos));
        match self.digging {
            Some((current, _)) if current == pos => {}
            _ => self.digging = Some((pos, self.tick)),
        }
    }

    fn cancel_dig(&mut self) {
        self.commands.push(Command::CancelDig);
        self.digging = None;
    }

    fn place_block(&mut self, against: IVec3, face: Face) {
        self.commands.push(Command::PlaceBlock(against, face));
        let Some(held) = self.held_item() else {
            return;
        };
        let offset = match face {
            Face::Up => IVec3::Y,
            Face::Down => IVec3::NEG_Y,
            Face::North => IVec3::NEG_Z,
            Face::South => IVec3::Z,
            Face::East => IVec3::X,
            Face::West => IVec3::NEG_X,
        };
        let target = against + offset;
        let bounds = if held.name.contains("_bed") {
            BlockBounds::Empty
        } else {
            BlockBounds::Solid
        };
        self.blocks
            .insert(target, BlockSnapshot::new(&held.name, bounds));
        self.consume_held(1);
    }

    fn equip(&mut self, item_name: &str, destination: EquipDestination) {
        self.commands
            .push(Command::Equip(item_name.to_string(), destination));
        self.pending_equip = Some((item_name.to_string(), destination));
    }

    fn attack_entity(&mut self, id: EntityId) {
        self.commands.push(Command::Attack(id));
        let reach = self.player_pos;
        let mut drops = Vec::new();
        if let Some(e) = self.entities.get_mut(&id) {
            if e.snap.position.distance(reach) <= 4.0 {
                if let Some(h) = &mut e.snap.health {
                    *h -= ATTACK_DAMAGE;
                    if *h <= 0.0 {
                        e.snap.valid = false;
                        drops = std::mem::take(&mut e.loot);
                    }
                }
            }
        }
        if !drops.is_empty() {
            let pos = self.entities.get(&id).map(|e| e.snap.position);
            self.entities.remove(&id);
            if let Some(pos) = pos {
                for stack in drops {
                    let drop_id = self.spawn_entity("item", pos, 1.0);
                    if let Some(e) = self.entities.get_mut(&drop_id) {
                        e.snap.hand_item = Some(stack);
                    }
                }
            }
        }
    }

    fn use_held_item(&mut self) {
        self.commands.push(Command::UseItem);
        let Some(held) = self.held_item() else {
            return;
        };
        if held.name == "ender_eye" {
            let target = self.stronghold.unwrap_or(IVec2::new(1000, 1000));
            let delta = Vec3::new(
                target.x as f32 - self.player_pos.x,
                0.0,
                target.y as f32 - self.player_pos.z,
            );
            let vel = if delta.length_squared() > 1e-6 {
                delta.normalize() * 0.6
            } else {
                Vec3::Z * 0.6
            };
            let origin = self.player_pos + Vec3::new(0.0, 1.5, 0.0);
            let id = self.spawn_entity("eye_of_ender", origin, 1.0);
            if let Some(e) = self.entities.get_mut(&id) {
                e.snap.velocity = vel;
                e.ttl = Some(EYE_FLIGHT_TICKS);
            }
            self.consume_held(1);
        } else if crate::tasks::food::food_value(&held.name) > 0 {
            self.food = (self.food + crate::tasks::food::food_value(&held.name)).min(20);
            self.consume_held(1);
        }
    }

    fn use_on_entity(&mut self, id: EntityId) {
        self.commands.push(Command::UseOnEntity(id));
        let held_gold = matches!(self.held_item(), Some(s) if s.name == "gold_ingot");
        if held_gold {
            if let Some(e) = self.entities.get_mut(&id) {
                if e.snap.name == "piglin" && e.snap.offhand_item.is_none() {
                    e.snap.offhand_item = Some(ItemStack::new("gold_ingot", 1));
                    self.barters.push((id, self.tick + BARTER_TICKS));
                    self.consume_held(1);
                }
            }
        }
    }

    fn use_on_block(&mut self, pos: IVec3) {
        self.commands.push(Command::UseOnBlock(pos));
        let Some(block) = self.block_at(pos) else {
            return;
        };
        match block.name.as_str() {
            "chest" | "crafting_table" | "furnace" | "blast_furnace" | "smoker" | "anvil"
            | "smithing_table" => {
                self.pending_window = Some(pos);
            }
            "end_portal_frame" => {
                if !block.state_flag("eye")
                    && matches!(self.held_item(), Some(s) if s.name == "ender_eye")
                {
                    let filled = block.with_state("eye", "true");
                    self.blocks.insert(pos, filled);
                    self.consume_held(1);
                    // A complete ring opens the portal in its middle.
                    let frames: Vec<IVec3> = self
                        .blocks
                        .iter()
                        .filter(|(p, b)| {
                            b.name == "end_portal_frame"
                                && b.state_flag("eye")
                                && (p.x - pos.x).abs() <= 8
                                && (p.z - pos.z).abs() <= 8
                        })
                        .map(|(p, _)| *p)
                        .collect();
                    if frames.len() >= 12 {
                        let center = frames.iter().fold(IVec3::ZERO, |acc, p| acc + *p)
                            / frames.len() as i32;
                        for dx in -1..=1 {
                            for dz in -1..=1 {
                                self.blocks.insert(
                                    IVec3::new(center.x + dx, center.y, center.z + dz),
                                    BlockSnapshot::new("end_portal", BlockBounds::Empty),
                                );
                            }
                        }
                    }
                }
            }
            "obsidian" => {
                if matches!(self.held_item(), Some(s) if s.name == "flint_and_steel") {
                    self.blocks.insert(
                        pos + IVec3::Y,
                        BlockSnapshot::new("nether_portal", BlockBounds::Empty),
                    );
                    self.blocks.insert(
                        pos + IVec3::Y * 2,
                        BlockSnapshot::new("nether_portal", BlockBounds::Empty),
                    );
                }
            }
            name if name.contains("_bed") => {
                self.spawn_point = Some(pos);
            }
            _ => {}
        }
    }

    fn click_slot(&mut self, slot: i32, button: MouseButton, action: SlotAction) {
        self.commands.push(Command::ClickSlot(slot, button, action));
        match action {
            SlotAction::Pickup => {
                // Crafting output: picking up consumes one of each ingredient.
                if slot == 0 && self.grid_range().is_some() {
                    if let Some(output) = self.slot_read(0) {
                        if self.cursor.is_none() {
                            self.cursor = Some(output);
                            self.consume_one_from_grid();
                        }
                    }
                    self.refresh_craft_output();
                    return;
                }
                let in_slot = self.slot_read(slot);
                match (self.cursor.take(), in_slot) {
                    (None, Some(stack)) => {
                        self.cursor = Some(stack);
                        self.slot_write(slot, None);
                    }
                    (Some(cursor), None) => match button {
                        MouseButton::Left => self.slot_write(slot, Some(cursor)),
                        MouseButton::Right => {
                            let mut one = cursor.clone();
                            one.count = 1;
                            self.slot_write(slot, Some(one));
                            let mut rest = cursor;
                            rest.count -= 1;
                            if rest.count > 0 {
                                self.cursor = Some(rest);
                            }
                        }
                    },
                    (Some(cursor), Some(mut stack)) => {
                        if cursor.name == stack.name {
                            match button {
                                MouseButton::Left => {
                                    stack.count += cursor.count;
                                    self.slot_write(slot, Some(stack));
                                }
                                MouseButton::Right => {
                                    stack.count += 1;
                                    self.slot_write(slot, Some(stack));
                                    let mut rest = cursor;
                                    rest.count -= 1;
                                    if rest.count > 0 {
                                        self.cursor = Some(rest);
                                    }
                                }
                            }
                        } else {
                            self.slot_write(slot, Some(cursor));
                            self.cursor = Some(stack);
                        }
                    }
                    (None, None) => {}
                }
                self.refresh_craft_output();
            }
            SlotAction::QuickMove => {
                if slot == 0 && self.grid_range().is_some() {
                    if let Some(output) = self.slot_read(0) {
                        self.insert_stack(output);
                        self.consume_one_from_grid();
                    }
                    self.refresh_craft_output();
                    return;
                }
                if let Some(stack) = self.slot_read(slot) {
                    self.slot_write(slot, None);
                    if self.open.is_some() && (slot as usize) < self.active_container_len() {
                        self.insert_stack(stack);
                    } else if self.open.is_some() {
                        // Into the container's first free slot.
                        if let Some(w) = &mut self.open {
                            if let Some(free) = w.slots.iter().position(|s| s.is_none()) {
                                w.slots[free] = Some(stack);
                            }
                        }
                    } else {
                        self.insert_stack(stack);
                    }
                }
                self.refresh_craft_output();
            }
            SlotAction::Swap => {
                // Swap with the first hotbar slot.
                let a = self.slot_read(slot);
                let b = self.player_window[36].take();
                self.slot_write(slot, b);
                self.player_window[36] = a;
            }
            SlotAction::Throw => {
                if slot == crate::facade::SLOT_CURSOR {
                    self.cursor = None;
                } else {
                    self.slot_write(slot, None);
                }
                self.refresh_craft_output();
            }
        }
    }

    fn close_window(&mut self) {
        self.commands.push(Command::CloseWindow);
        self.open = None;
    }
}
