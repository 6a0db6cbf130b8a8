/// The concrete task library: navigation leaves, gathering state machines,
/// dimension travel, triangulation, safety interrupts, container protocols,
/// and the beat-the-game orchestrator on top.
pub mod beat_game;
pub mod beds;
pub mod chunk_search;
pub mod container;
pub mod dimension;
pub mod dragon;
pub mod food;
pub mod hunt;
pub mod inventory;
pub mod mine;
pub mod movement;
pub mod nether;
pub mod resource;
pub mod safety;
pub mod stronghold;

pub use beat_game::{BeatGameConfig, BeatGameTask};
pub use beds::collect_beds;
pub use chunk_search::{
    search_chunks_for_block, ChunkSearchConfig, ChunkSearchSpace, ChunkSearchTask,
    SearchChunksForBlockTask,
};
pub use container::{
    craft, craft_in_inventory, craft_in_table, CraftItemTask, LootContainerTask, OpenContainerTask,
    PlaceBlockTask, SetSpawnPointTask, SmeltInFurnaceTask,
};
pub use dimension::{
    ConstructNetherPortalTask, EnterNetherPortalTask, FastTravelTask, GoToDimensionTask,
};
pub use dragon::FightDragonTask;
pub use food::{
    calculate_food_potential, collect_food, food_value, CollectFoodConfig, EatFoodTask,
};
pub use hunt::{kill_and_loot, KillEntityTask};
pub use inventory::{
    pick_garbage_slot, ClearCraftingGridTask, EnsureFreeCursorTask, EnsureFreeInventorySlotTask,
};
pub use mine::{mine_and_collect, MineBlockTask};
pub use movement::{GetToChunkTask, GetToPositionTask, TimeoutWanderTask};
pub use nether::{
    collect_blaze_rods, CollectBlazeRodsConfig, TradeWithPiglinsTask,
};
pub use resource::{PickupDropsTask, ResourceTactic, ResourceTask};
pub use safety::{
    DodgeProjectilesTask, EscapeLavaTask, FleeConfig, FleeHostilesTask, ProjectileDodgeConfig,
};
pub use stronghold::{intersect_rays_xz, EyeDirectionSample, LocateStrongholdTask};
