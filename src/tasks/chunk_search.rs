/// Systematic explore-and-scan over world chunks.
///
/// Scanning walks expanding rings of loaded chunks around the agent; chunks
/// that were searched (or proved unreachable) are absorbed into the explored
/// set and never revisited this run. When no loaded chunk qualifies, the task
/// wanders to force new chunks to load. The subclass hook decides which
/// chunks qualify and what searching one means.
use crate::facade::{AgentControl, WorldView};
use crate::task::{handle, Task, TaskHandle, TaskIntent};
use crate::tasks::movement::{GetToChunkTask, TimeoutWanderTask};
use crate::types::{block_of, ChunkPos};
use glam::IVec3;
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Ring radius of the loaded-chunk scan around the agent's own chunk.
const SCAN_RINGS: i32 = 8;
/// Wander leg used to load fresh chunks while exploring.
const EXPLORE_DISTANCE: f32 = 64.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchConfig {
    pub max_chunks_to_search: u32,
    pub explore_when_empty: bool,
}

impl Default for ChunkSearchConfig {
    fn default() -> Self {
        Self {
            max_chunks_to_search: 100,
            explore_when_empty: true,
        }
    }
}

/// What a concrete search provides: the qualification predicate, the
/// per-chunk search step, and the completion signal.
pub trait ChunkSearchSpace {
    fn is_chunk_within_search_space(&self, view: &dyn WorldView, chunk: ChunkPos) -> bool;

    /// One search step inside the chunk; `None` means the chunk is done.
    fn search_within_chunk(
        &mut self,
        agent: &mut dyn AgentControl,
        chunk: ChunkPos,
    ) -> Option<TaskHandle>;

    fn is_search_complete(&self, view: &dyn WorldView) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SearchState {
    ScanningLoaded,
    Exploring,
    GoingToChunk(ChunkPos),
    SearchingChunk(ChunkPos),
}

pub struct ChunkSearchTask<S: ChunkSearchSpace> {
    space: S,
    config: ChunkSearchConfig,
    intent: TaskIntent,
    state: SearchState,
    explored: HashSet<ChunkPos>,
    searched: u32,
    failed: bool,
    travel: Option<TaskHandle>,
    explore: Option<TaskHandle>,
    done: Cell<bool>,
}

impl<S: ChunkSearchSpace> ChunkSearchTask<S> {
    pub fn new(space: S, config: ChunkSearchConfig, intent: TaskIntent) -> Self {
        Self {
            space,
            config,
            intent,
            state: SearchState::ScanningLoaded,
            explored: HashSet::new(),
            searched: 0,
            failed: false,
            travel: None,
            explore: None,
            done: Cell::new(false),
        }
    }

    pub fn space(&self) -> &S {
        &self.space
    }

    pub fn chunks_searched(&self) -> u32 {
        self.searched
    }

    /// First qualifying loaded chunk in expanding rings around the agent.
    fn scan_loaded(&self, view: &dyn WorldView) -> Option<ChunkPos> {
        let own = ChunkPos::from_block(block_of(view.player_pos()));
        let probe_y = view.player_pos().y.floor() as i32;
        for ring in 0..=SCAN_RINGS {
            for chunk in own.ring(ring) {
                if self.explored.contains(&chunk) {
                    continue;
                }
                // Loaded probe: a block query into the chunk's center column.
                if view.block_at(chunk.center_block(probe_y)).is_none() {
                    continue;
                }
                if self.space.is_chunk_within_search_space(view, chunk) {
                    return Some(chunk);
                }
            }
        }
        None
    }

    fn absorb(&mut self, chunk: ChunkPos) {
        if self.explored.insert(chunk) {
            self.searched += 1;
            if self.searched >= self.config.max_chunks_to_search {
                warn!(
                    "🗺️ Chunk search exhausted after {} chunks",
                    self.searched
                );
                self.failed = true;
            }
        }
    }
}

impl<S: ChunkSearchSpace> Task for ChunkSearchTask<S> {
    fn display_name(&self) -> String {
        format!(
            "ChunkSearch(state: {:?}, {}/{})",
            self.state, self.searched, self.config.max_chunks_to_search
        )
    }

    fn intent(&self) -> TaskIntent {
        self.intent.clone()
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.state = SearchState::ScanningLoaded;
        self.explored.clear();
        self.searched = 0;
        self.failed = false;
        self.done.set(false);
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if self.space.is_search_complete(&*agent) {
            self.done.set(true);
            return None;
        }
        if self.failed {
            return None;
        }

        match self.state {
            SearchState::ScanningLoaded => {
                match self.scan_loaded(&*agent) {
                    Some(chunk) => {
                        debug!("🗺️ Qualifying chunk {} found; heading over", chunk);
                        self.travel = None;
                        self.state = SearchState::GoingToChunk(chunk);
                    }
                    None => {
                        if self.config.explore_when_empty {
                            self.state = SearchState::Exploring;
                        } else {
                            // Nothing qualifies and exploring is off.
                            self.failed = true;
                        }
                    }
                }
                None
            }
            SearchState::Exploring => {
                let explore = self
                    .explore
                    .get_or_insert_with(|| {
                        handle(TimeoutWanderTask::with_distance(EXPLORE_DISTANCE))
                    })
                    .clone();
                let leg_over = {
                    let e = explore.borrow();
                    e.is_failed() || e.is_finished(&*agent)
                };
                if leg_over {
                    self.explore = None;
                    self.state = SearchState::ScanningLoaded;
                    return None;
                }
                Some(explore)
            }
            SearchState::GoingToChunk(chunk) => {
                let travel = self
                    .travel
                    .get_or_insert_with(|| handle(GetToChunkTask::new(chunk)))
                    .clone();
                let (arrived, stuck) = {
                    let t = travel.borrow();
                    (t.is_finished(&*agent), t.is_failed())
                };
                if stuck {
                    debug!("🗺️ Chunk {} unreachable; absorbing", chunk);
                    self.absorb(chunk);
                    self.travel = None;
                    self.state = SearchState::ScanningLoaded;
                    return None;
                }
                if arrived {
                    self.travel = None;
                    self.absorb(chunk);
                    self.state = SearchState::SearchingChunk(chunk);
                    return None;
                }
                Some(travel)
            }
            SearchState::SearchingChunk(chunk) => {
                match self.space.search_within_chunk(agent, chunk) {
                    Some(child) => Some(child),
                    None => {
                        self.state = SearchState::ScanningLoaded;
                        None
                    }
                }
            }
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.done.get() || self.space.is_search_complete(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Search space that looks for any of a set of block names.
pub struct BlockSearchSpace {
    block_names: Vec<String>,
    found: Option<IVec3>,
}

impl BlockSearchSpace {
    pub fn new(block_names: Vec<String>) -> Self {
        Self {
            block_names,
            found: None,
        }
    }

    pub fn found_position(&self) -> Option<IVec3> {
        self.found
    }

    fn blocks_in_chunk(&self, view: &dyn WorldView, chunk: ChunkPos, probe_y: i32) -> Vec<IVec3> {
        view.find_blocks(&self.block_names, chunk.center_block(probe_y), 16)
            .into_iter()
            .filter(|p| ChunkPos::from_block(*p) == chunk)
            .collect()
    }
}

impl ChunkSearchSpace for BlockSearchSpace {
    fn is_chunk_within_search_space(&self, view: &dyn WorldView, chunk: ChunkPos) -> bool {
        let probe_y = view.player_pos().y.floor() as i32;
        !self.blocks_in_chunk(view, chunk, probe_y).is_empty()
    }

    fn search_within_chunk(
        &mut self,
        agent: &mut dyn AgentControl,
        chunk: ChunkPos,
    ) -> Option<TaskHandle> {
        let probe_y = agent.player_pos().y.floor() as i32;
        if let Some(pos) = self.blocks_in_chunk(&*agent, chunk, probe_y).first() {
            self.found = Some(*pos);
        }
        None
    }

    fn is_search_complete(&self, _view: &dyn WorldView) -> bool {
        self.found.is_some()
    }
}

/// Chunk-search for a block kind; the position is readable off the task
/// handle once the search completes.
pub type SearchChunksForBlockTask = ChunkSearchTask<BlockSearchSpace>;

pub fn search_chunks_for_block(
    block_names: Vec<String>,
    config: ChunkSearchConfig,
) -> SearchChunksForBlockTask {
    let intent = TaskIntent::SearchChunksForBlock {
        blocks: block_names.clone(),
    };
    ChunkSearchTask::new(BlockSearchSpace::new(block_names), config, intent)
}

impl ChunkSearchTask<BlockSearchSpace> {
    pub fn found_block(&self) -> Option<IVec3> {
        self.space().found_position()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{BlockBounds, BlockSnapshot, SimWorld};
    use crate::task::TaskRunner;
    use glam::Vec3;
    use std::rc::Rc;

    #[test]
    fn test_search_finds_block_in_nearby_chunk() {
        let mut world = SimWorld::flat(31);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        world.set_block(
            IVec3::new(40, 64, 8),
            BlockSnapshot::new("end_portal_frame", BlockBounds::Solid),
        );

        let task = Rc::new(std::cell::RefCell::new(search_chunks_for_block(
            vec!["end_portal_frame".to_string()],
            ChunkSearchConfig::default(),
        )));
        let root: TaskHandle = task.clone();
        let mut runner = TaskRunner::new(root);

        for _ in 0..3000 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "search should complete");
        assert_eq!(task.borrow().found_block(), Some(IVec3::new(40, 64, 8)));
    }

    #[test]
    fn test_search_fails_after_chunk_limit() {
        let mut world = SimWorld::flat(32);
        // Make every chunk qualify but never complete: search for a block
        // that is everywhere at ground level.
        for x in -3..=3 {
            for z in -3..=3 {
                world.set_block(
                    IVec3::new(x * 16 + 8, 63, z * 16 + 8),
                    BlockSnapshot::new("netherrack_probe", BlockBounds::Solid),
                );
            }
        }
        struct NeverDone;
        impl ChunkSearchSpace for NeverDone {
            fn is_chunk_within_search_space(
                &self,
                _view: &dyn WorldView,
                _chunk: ChunkPos,
            ) -> bool {
                true
            }
            fn search_within_chunk(
                &mut self,
                _agent: &mut dyn AgentControl,
                _chunk: ChunkPos,
            ) -> Option<TaskHandle> {
                None
            }
            fn is_search_complete(&self, _view: &dyn WorldView) -> bool {
                false
            }
        }
        let config = ChunkSearchConfig {
            max_chunks_to_search: 5,
            explore_when_empty: true,
        };
        let task = ChunkSearchTask::new(NeverDone, config, TaskIntent::Custom("never".into()));
        let mut runner = TaskRunner::new(handle(task));
        for _ in 0..5000 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "exhausted search must halt");
    }
}
