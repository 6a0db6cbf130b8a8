//! voxel-agent: a hierarchical task-tree controller for an autonomous agent
//! in a voxel sandbox world.
//!
//! The controller decomposes high-level objectives (collect N of an item,
//! reach a coordinate, beat the game) into a tree of small cooperative tasks
//! and runs exactly one leaf per game tick against a narrow world facade.

pub mod errors;
pub mod facade;
pub mod pursuit;
pub mod recipes;
pub mod settings;
pub mod task;
pub mod tasks;
pub mod types;

pub use errors::{AgentError, Result};
pub use facade::{AgentControl, SimWorld, WorldView};
pub use pursuit::{CachedHeuristic, ClosestObjectPursuit, PursuitSource};
pub use settings::AgentSettings;
pub use task::{handle, ProgressChecker, Task, TaskHandle, TaskIntent, TaskRunner, TickTimer};
pub use tasks::{BeatGameConfig, BeatGameTask};
pub use types::{ChunkPos, Dimension, GameVersion, ItemStack, ItemTarget};
