/// Task kernel: the lifecycle contract every unit of intent implements, and
/// the intent tags the kernel compares to decide whether a re-returned child
/// is "the same task".
///
/// Scheduling is single-threaded and cooperative; tasks are shared as
/// `Rc<RefCell<dyn Task>>` handles so a parent can keep a typed handle to the
/// child it returned and poll `is_failed()` or read results on later ticks.
pub mod progress;
pub mod runner;
pub mod timers;

pub use progress::ProgressChecker;
pub use runner::TaskRunner;
pub use timers::{Stopwatch, TickTimer};

use crate::facade::{AgentControl, EntityId, WorldView};
use crate::types::{ChunkPos, Dimension, ItemTarget};
use glam::IVec3;
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a task in the tree.
pub type TaskHandle = Rc<RefCell<dyn Task>>;

/// Wrap a task into a shareable handle.
pub fn handle<T: Task + 'static>(task: T) -> TaskHandle {
    Rc::new(RefCell::new(task))
}

/// Configuration tag of a task: one variant per task kind, carrying the
/// configuration (never runtime state). The kernel compares these to decide
/// not to restart a task when a parent re-returns an equivalent child —
/// two "mine 10 coal" tasks are equal even if one has already collected 4.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskIntent {
    Idle,
    GetToPosition {
        target: IVec3,
        dimension: Option<Dimension>,
    },
    GetToChunk {
        chunk: ChunkPos,
    },
    Wander,
    EscapeLava,
    DodgeProjectiles,
    FleeHostiles {
        distance: f32,
    },
    PickupDrops {
        targets: Vec<ItemTarget>,
    },
    MineBlock {
        pos: IVec3,
    },
    MineAndCollect {
        targets: Vec<ItemTarget>,
        blocks: Vec<String>,
    },
    KillAndLoot {
        entity: String,
        targets: Vec<ItemTarget>,
    },
    KillEntity {
        id: EntityId,
    },
    CollectFood {
        units: u32,
    },
    EatFood,
    SmeltItems {
        output: String,
        count: u32,
    },
    CraftInInventory {
        output: String,
        count: u32,
    },
    CraftInTable {
        output: String,
        count: u32,
    },
    OpenContainer {
        pos: IVec3,
    },
    EnsureFreeCursor,
    EnsureFreeInventorySlot,
    ClearCraftingGrid,
    PlaceBlockAt {
        pos: IVec3,
        item: String,
    },
    SetSpawnPoint,
    EnterNetherPortal {
        target: Dimension,
    },
    ConstructNetherPortal,
    GoToDimension {
        target: Dimension,
    },
    FastTravel {
        target: IVec3,
    },
    SearchChunksForBlock {
        blocks: Vec<String>,
    },
    LocateStronghold,
    TradeWithPiglins {
        pearls: u32,
    },
    CollectBlazeRods {
        count: u32,
    },
    CollectBeds {
        count: u32,
    },
    CollectEyesOfEnder {
        count: u32,
    },
    FightDragon,
    BeatGame,
    /// Free-form tag for tests and ad-hoc tasks.
    Custom(String),
}

/// A unit of intent: a small state machine driven one step per game tick.
///
/// Lifecycle contract:
/// - `on_start` runs before the first `on_tick` of a run; a task that is
///   stopped and later re-adopted starts a fresh run, so transient state is
///   reset here.
/// - `on_tick` either acts directly through the facade and returns `None`,
///   or returns a child task to run in its stead this tick.
/// - `on_stop` runs exactly once per run after the task stops, whether it
///   finished, failed, or was interrupted by `interrupter`.
/// - `is_finished` must be monotone: once true it stays true for the run.
pub trait Task {
    /// Short human-readable name, may include parameters and current phase.
    fn display_name(&self) -> String;

    /// Configuration tag used for kernel equality.
    fn intent(&self) -> TaskIntent;

    fn on_start(&mut self, agent: &mut dyn AgentControl) {
        let _ = agent;
    }

    /// Drive one step; a returned child is this tick's continuation.
    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle>;

    fn on_stop(&mut self, agent: &mut dyn AgentControl, interrupter: Option<&dyn Task>) {
        let _ = (agent, interrupter);
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool;

    /// Tasks that can give up report it here; parents poll this on the
    /// handle they returned and re-plan.
    fn is_failed(&self) -> bool {
        false
    }
}

/// A task that does nothing and never finishes. Used as a guarded fallback
/// where a child must be returned but no useful work exists.
pub struct IdleTask;

impl Task for IdleTask {
    fn display_name(&self) -> String {
        "Idle".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::Idle
    }

    fn on_tick(&mut self, _agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        None
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        false
    }
}
