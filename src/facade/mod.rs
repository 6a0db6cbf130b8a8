/// The narrow window between the task tree and the controlled character.
///
/// `WorldView` is the read side: a consistent snapshot of the world taken at
/// the start of each tick. `AgentControl` adds the imperative commands. The
/// split keeps query paths `&self` so tests and tools can hand a task a fake
/// world without wiring up command plumbing.
///
/// Every command is fire-and-forget and idempotent within a tick: the core
/// never awaits completion, it observes resulting state on later ticks.
pub mod sim;
pub mod snapshot;

pub use sim::SimWorld;
pub use snapshot::{
    BlockBounds, BlockSnapshot, EntityId, EntitySnapshot, Inventory, MetaValue, WindowKind,
    WindowSnapshot, PLAYER_INVENTORY_SLOTS,
};

use crate::types::{Dimension, ItemStack, ItemTarget};
use glam::{IVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Movement control states the agent can hold down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Control {
    Forward,
    Backward,
    Left,
    Right,
    Jump,
    Sprint,
    Sneak,
}

/// Block faces for placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Face {
    Up,
    Down,
    North,
    South,
    East,
    West,
}

/// Where an equip command should land the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquipDestination {
    Hand,
    OffHand,
}

/// Mouse buttons for slot clicks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
}

/// Window click action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotAction {
    /// Plain click: swap/merge the cursor with the slot.
    Pickup,
    /// Shift-click: move the stack across the window boundary.
    QuickMove,
    /// Swap with a hotbar slot.
    Swap,
    /// Drop the stack out of the window.
    Throw,
}

/// Virtual slot index meaning "the cursor stack".
pub const SLOT_CURSOR: i32 = -999;

/// Read-only view of the world and the controlled character.
pub trait WorldView {
    /// Monotonic game tick counter; the core's only clock.
    fn game_tick(&self) -> u64;

    /// Raw dimension identifier as the world reports it.
    fn dimension_id(&self) -> String;

    /// Classified dimension tag.
    fn dimension(&self) -> Dimension {
        Dimension::classify(&self.dimension_id())
    }

    /// In-game time of day, 0..24000.
    fn time_of_day(&self) -> u32;

    fn player_pos(&self) -> Vec3;
    fn player_velocity(&self) -> Vec3;
    /// Facing as (yaw, pitch) in degrees.
    fn player_rotation(&self) -> (f32, f32);

    fn health(&self) -> f32;
    /// Food bar units, 0..=20.
    fn food_level(&self) -> u32;

    fn inventory(&self) -> Inventory;
    fn held_item(&self) -> Option<ItemStack>;
    fn open_window(&self) -> Option<WindowSnapshot>;

    /// Contents of the active crafting grid: the inventory 2x2, or an open
    /// table's 3x3. Empty when another container window is open.
    fn crafting_grid(&self) -> Vec<Option<ItemStack>>;

    fn entities(&self) -> Vec<EntitySnapshot>;
    fn entity(&self, id: EntityId) -> Option<EntitySnapshot>;

    /// Block at a position; `None` when the chunk is not loaded.
    fn block_at(&self, pos: IVec3) -> Option<BlockSnapshot>;

    /// Positions of loaded blocks whose name matches any of `names`
    /// (family rules), within a cube of the given radius.
    fn find_blocks(&self, names: &[String], near: IVec3, radius: i32) -> Vec<IVec3>;

    fn world_min_y(&self) -> i32 {
        -64
    }

    fn world_max_y(&self) -> i32 {
        320
    }

    /// Count of inventory items matching a target.
    fn item_count(&self, target: &ItemTarget) -> u32 {
        self.inventory().count_matching(target)
    }

    /// True when the block the player's feet occupy matches `name`.
    fn standing_in(&self, name: &str) -> bool {
        self.block_at(crate::types::block_of(self.player_pos()))
            .map(|b| b.name.contains(name))
            .unwrap_or(false)
    }
}

/// Imperative command surface. Commands post to the network layer outside the
/// core; none of them block or report completion synchronously.
pub trait AgentControl: WorldView {
    fn set_control(&mut self, control: Control, held: bool);

    /// Release every held control state. Invoked by combat/flee/dodge tasks
    /// in their `on_stop`, and by the driver when the root stops.
    fn clear_controls(&mut self);

    fn look(&mut self, yaw: f32, pitch: f32);
    fn look_at(&mut self, target: Vec3);

    fn start_dig(&mut self, pos: IVec3);
    fn cancel_dig(&mut self);

    /// Place the held block against `against` on `face`.
    fn place_block(&mut self, against: IVec3, face: Face);

    /// Move a matching inventory item into the given hand. May settle on a
    /// later tick; observe `held_item` to confirm.
    fn equip(&mut self, item_name: &str, destination: EquipDestination);

    fn attack_entity(&mut self, id: EntityId);
    fn use_held_item(&mut self);
    fn use_on_entity(&mut self, id: EntityId);
    fn use_on_block(&mut self, pos: IVec3);

    fn click_slot(&mut self, slot: i32, button: MouseButton, action: SlotAction);
    fn close_window(&mut self);
}
