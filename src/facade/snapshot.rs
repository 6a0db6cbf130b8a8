/// Read-side snapshot types surfaced by the world facade.
///
/// Everything here is a plain value copied out of the facade at the start of
/// a tick; tasks never hold references into live world state.
use crate::types::{GameVersion, ItemStack, ItemTarget};
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque entity identifier assigned by the world.
pub type EntityId = u64;

/// How a block occupies its cell, as far as navigation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockBounds {
    /// Full collision box.
    Solid,
    /// No collision (air, torches, portal blocks).
    Empty,
    /// Fluid (water, lava).
    Liquid,
}

/// A block observed at a position: name, collision kind, and the block-state
/// map (e.g. `eye = true` on a filled end portal frame).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockSnapshot {
    pub name: String,
    pub bounds: BlockBounds,
    pub state: HashMap<String, String>,
}

impl BlockSnapshot {
    pub fn new(name: &str, bounds: BlockBounds) -> Self {
        Self {
            name: name.to_string(),
            bounds,
            state: HashMap::new(),
        }
    }

    pub fn with_state(mut self, key: &str, value: &str) -> Self {
        self.state.insert(key.to_string(), value.to_string());
        self
    }

    /// Block-state flag lookup, `false` when absent.
    pub fn state_flag(&self, key: &str) -> bool {
        self.state.get(key).map(|v| v == "true").unwrap_or(false)
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }
}

/// Raw entity metadata entry. Indices are version-dependent; read them
/// through the accessors below, never directly from task code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MetaValue {
    Byte(u8),
    Bool(bool),
    Item(ItemStack),
}

/// One entity as observed this tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    /// False once the world has despawned the entity.
    pub valid: bool,
    pub health: Option<f32>,
    /// Raw metadata by index.
    pub metadata: HashMap<usize, MetaValue>,
    /// Main-hand equipment, when the world reports it.
    pub hand_item: Option<ItemStack>,
    /// Off-hand equipment.
    pub offhand_item: Option<ItemStack>,
}

/// Metadata index of the piglin baby flag.
const PIGLIN_BABY_INDEX: usize = 16;

impl EntitySnapshot {
    pub fn distance_sq_to(&self, point: Vec3) -> f32 {
        self.position.distance_squared(point)
    }

    /// Sheared bit of the sheep state byte. The byte's index moved between
    /// game versions, so the caller supplies the active version.
    pub fn sheep_is_sheared(&self, version: GameVersion) -> bool {
        match self.metadata.get(&version.sheep_state_index()) {
            Some(MetaValue::Byte(b)) => b & 0x10 != 0,
            _ => false,
        }
    }

    /// Low nibble of the sheep state byte is the wool color.
    pub fn sheep_color(&self, version: GameVersion) -> Option<u8> {
        match self.metadata.get(&version.sheep_state_index()) {
            Some(MetaValue::Byte(b)) => Some(b & 0x0F),
            _ => None,
        }
    }

    /// A piglin that has accepted gold holds it in the off hand while
    /// "admiring" it. Offering more gold during that window is wasted.
    pub fn piglin_is_trading(&self) -> bool {
        matches!(&self.offhand_item, Some(stack) if stack.name == "gold_ingot")
    }

    pub fn piglin_is_baby(&self) -> bool {
        matches!(
            self.metadata.get(&PIGLIN_BABY_INDEX),
            Some(MetaValue::Bool(true))
        )
    }

    /// Dropped-item entities carry their stack as hand metadata.
    pub fn dropped_stack(&self) -> Option<&ItemStack> {
        if self.name == "item" {
            self.hand_item.as_ref()
        } else {
            None
        }
    }
}

/// Kinds of container windows the agent can have open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowKind {
    PlayerInventory,
    Chest,
    LargeChest,
    CraftingTable,
    Furnace,
    BlastFurnace,
    Smoker,
    Anvil,
    SmithingTable,
    Beacon,
}

/// The currently open window: kind plus a flat slot array in wire order
/// (container slots first, then the player's inventory).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSnapshot {
    pub kind: WindowKind,
    pub slots: Vec<Option<ItemStack>>,
    pub cursor: Option<ItemStack>,
    /// Furnace-family smelt progress in [0, 1].
    pub progress: Option<f32>,
}

impl WindowSnapshot {
    pub fn new(kind: WindowKind, slot_count: usize) -> Self {
        Self {
            kind,
            slots: vec![None; slot_count],
            cursor: None,
            progress: None,
        }
    }

    pub fn slot(&self, index: usize) -> Option<&ItemStack> {
        self.slots.get(index).and_then(|s| s.as_ref())
    }
}

/// Number of main player inventory slots (hotbar included).
pub const PLAYER_INVENTORY_SLOTS: usize = 36;

/// The player inventory as a flat snapshot plus the cursor stack.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub slots: Vec<Option<ItemStack>>,
    pub cursor: Option<ItemStack>,
    pub offhand: Option<ItemStack>,
}

impl Inventory {
    pub fn empty() -> Self {
        Self {
            slots: vec![None; PLAYER_INVENTORY_SLOTS],
            cursor: None,
            offhand: None,
        }
    }

    /// Total count of items matching the target's name set.
    pub fn count_matching(&self, target: &ItemTarget) -> u32 {
        self.stacks()
            .filter(|s| target.matches(&s.name))
            .map(|s| s.count)
            .sum()
    }

    /// Total count of items matching a single name (family rules apply).
    pub fn count_of(&self, name: &str) -> u32 {
        self.count_matching(&ItemTarget::new(name, 0))
    }

    /// Exact-name count, bypassing family matching. Needed where a raw item
    /// must not absorb its processed form ("beef" vs "cooked_beef").
    pub fn count_exact(&self, name: &str) -> u32 {
        self.stacks()
            .filter(|s| s.name == name)
            .map(|s| s.count)
            .sum()
    }

    pub fn has(&self, name: &str) -> bool {
        self.count_of(name) > 0
    }

    pub fn first_empty_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.is_none())
    }

    pub fn is_full(&self) -> bool {
        self.first_empty_slot().is_none()
    }

    /// First slot holding a stack matching `name`.
    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(
            |s| matches!(s, Some(stack) if crate::types::item_matches(&stack.name, name)),
        )
    }

    /// Slot of a partial stack of exactly this item name, if any.
    pub fn partial_stack_slot(&self, name: &str, max_stack: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Some(stack) if stack.name == name && stack.count < max_stack))
    }

    /// Iterate over occupied slots.
    pub fn stacks(&self) -> impl Iterator<Item = &ItemStack> {
        self.slots
            .iter()
            .flatten()
            .chain(self.offhand.iter())
    }

    /// True when every target's count is met.
    pub fn satisfies(&self, targets: &[ItemTarget]) -> bool {
        targets.iter().all(|t| self.count_matching(t) >= t.count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inv_with(stacks: &[(&str, u32)]) -> Inventory {
        let mut inv = Inventory::empty();
        for (i, (name, count)) in stacks.iter().enumerate() {
            inv.slots[i] = Some(ItemStack::new(name, *count));
        }
        inv
    }

    #[test]
    fn test_count_matching_family() {
        let inv = inv_with(&[("oak_log", 3), ("birch_log", 2), ("oak_planks", 4)]);
        assert_eq!(inv.count_matching(&ItemTarget::new("_log", 0)), 5);
        assert_eq!(inv.count_of("oak_planks"), 4);
    }

    #[test]
    fn test_satisfies_all_targets() {
        let inv = inv_with(&[("cobblestone", 12), ("stick", 4)]);
        assert!(inv.satisfies(&[
            ItemTarget::new("cobblestone", 10),
            ItemTarget::new("stick", 2)
        ]));
        assert!(!inv.satisfies(&[ItemTarget::new("cobblestone", 13)]));
    }

    #[test]
    fn test_sheep_sheared_bit() {
        let mut sheep = EntitySnapshot {
            id: 1,
            name: "sheep".to_string(),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            valid: true,
            health: Some(8.0),
            metadata: HashMap::new(),
            hand_item: None,
            offhand_item: None,
        };
        sheep.metadata.insert(17, MetaValue::Byte(0x10 | 0x0E));
        assert!(sheep.sheep_is_sheared(GameVersion::Modern));
        assert_eq!(sheep.sheep_color(GameVersion::Modern), Some(0x0E));
        // Legacy index unset: reads as unsheared.
        assert!(!sheep.sheep_is_sheared(GameVersion::Legacy));
    }

    #[test]
    fn test_piglin_trading_reads_offhand() {
        let mut piglin = EntitySnapshot {
            id: 2,
            name: "piglin".to_string(),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            valid: true,
            health: Some(16.0),
            metadata: HashMap::new(),
            hand_item: None,
            offhand_item: None,
        };
        assert!(!piglin.piglin_is_trading());
        piglin.offhand_item = Some(ItemStack::new("gold_ingot", 1));
        assert!(piglin.piglin_is_trading());
    }
}
