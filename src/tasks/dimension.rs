/// Dimension travel: finding and entering nether portals, building one as a
/// fallback, and the nether fast-travel shortcut (1 nether block = 8
/// overworld blocks on X and Z).
///
/// Reaching the End is deliberately not handled here; the End is entered by
/// activating an end-portal-frame ring, which the orchestrator drives.
use crate::errors::{AgentError, Result};
use crate::facade::{AgentControl, Control, Face, WorldView};
use crate::task::{handle, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::movement::{GetToPositionTask, TimeoutWanderTask};
use crate::types::{block_center, block_of, overworld_to_nether, seconds_to_ticks, Dimension};
use glam::IVec3;
use tracing::{debug, info, warn};

/// Cube radius searched for an existing portal.
const PORTAL_SEARCH_RADIUS: i32 = 64;
/// Close enough to start walking into the portal.
const PORTAL_APPROACH_DISTANCE: f32 = 1.5;
/// How long to stand in the portal before assuming the hop failed.
const PORTAL_TIMEOUT_SECONDS: f32 = 10.0;
/// Overworld distance beyond which the nether shortcut pays off.
const FAST_TRAVEL_THRESHOLD: f32 = 600.0;
/// Obsidian needed for a corner-less frame.
const FRAME_OBSIDIAN: u32 = 10;

/// Portal blocks with standing space (the bottom block of the column).
fn standing_portal_blocks(view: &dyn WorldView, near: IVec3) -> Vec<IVec3> {
    view.find_blocks(&["nether_portal".to_string()], near, PORTAL_SEARCH_RADIUS)
        .into_iter()
        .filter(|p| {
            view.block_at(*p - IVec3::Y)
                .map(|below| below.name != "nether_portal")
                .unwrap_or(false)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PortalState {
    FindingPortal,
    Approaching(IVec3),
    Entering(IVec3),
    Waiting { since: u64 },
    Wandering,
}

/// Walk into a nether portal and wait out the hop.
pub struct EnterNetherPortalTask {
    target: Dimension,
    state: PortalState,
    walk: Option<TaskHandle>,
    wander: Option<TaskHandle>,
}

impl EnterNetherPortalTask {
    /// Rejects the End at construction: no nether portal leads there.
    pub fn new(target: Dimension) -> Result<Self> {
        if target == Dimension::End {
            return Err(AgentError::misconfiguration(
                "nether portals cannot reach the End; activate an end portal instead",
            ));
        }
        Ok(Self {
            target,
            state: PortalState::FindingPortal,
            walk: None,
            wander: None,
        })
    }
}

impl Task for EnterNetherPortalTask {
    fn display_name(&self) -> String {
        format!("EnterNetherPortal(state: {:?} -> {})", self.state, self.target)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::EnterNetherPortal {
            target: self.target,
        }
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.state = PortalState::FindingPortal;
        self.walk = None;
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if agent.dimension() == self.target {
            return None;
        }
        match self.state {
            PortalState::FindingPortal => {
                let near = block_of(agent.player_pos());
                match standing_portal_blocks(&*agent, near).into_iter().next() {
                    Some(portal) => {
                        debug!("🌀 Portal found at {:?}", portal);
                        self.walk = None;
                        self.state = PortalState::Approaching(portal);
                    }
                    None => self.state = PortalState::Wandering,
                }
                None
            }
            PortalState::Approaching(portal) => {
                let center = block_center(portal);
                if agent.player_pos().distance(center) <= PORTAL_APPROACH_DISTANCE + 1.0 {
                    self.state = PortalState::Entering(portal);
                    return None;
                }
                let stuck = self
                    .walk
                    .as_ref()
                    .map(|w| w.borrow().is_failed())
                    .unwrap_or(false);
                if stuck {
                    self.state = PortalState::Wandering;
                    self.walk = None;
                    return None;
                }
                let walk = self
                    .walk
                    .get_or_insert_with(|| handle(GetToPositionTask::new(portal)))
                    .clone();
                Some(walk)
            }
            PortalState::Entering(portal) => {
                if agent.standing_in("nether_portal") {
                    // Suspend all input while the hop resolves.
                    agent.clear_controls();
                    self.state = PortalState::Waiting {
                        since: agent.game_tick(),
                    };
                    return None;
                }
                agent.look_at(block_center(portal));
                agent.set_control(Control::Forward, true);
                None
            }
            PortalState::Waiting { since } => {
                let now = agent.game_tick();
                if now.saturating_sub(since) > seconds_to_ticks(PORTAL_TIMEOUT_SECONDS) {
                    warn!("🌀 Portal hop timed out; re-wandering");
                    self.state = PortalState::Wandering;
                }
                None
            }
            PortalState::Wandering => {
                let wander = self
                    .wander
                    .get_or_insert_with(|| handle(TimeoutWanderTask::new()))
                    .clone();
                let over = {
                    let w = wander.borrow();
                    w.is_finished(&*agent) || w.is_failed()
                };
                if over {
                    self.wander = None;
                    self.state = PortalState::FindingPortal;
                    return None;
                }
                Some(wander)
            }
        }
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.set_control(Control::Forward, false);
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        view.dimension() == self.target
    }
}

/// Corner-less 4x5 frame offsets relative to the build base, in the XZ=const
/// plane, followed by lighting the inside.
const FRAME_OFFSETS: [IVec3; 10] = [
    IVec3::new(1, 0, 0),
    IVec3::new(2, 0, 0),
    IVec3::new(0, 1, 0),
    IVec3::new(0, 2, 0),
    IVec3::new(0, 3, 0),
    IVec3::new(3, 1, 0),
    IVec3::new(3, 2, 0),
    IVec3::new(3, 3, 0),
    IVec3::new(1, 4, 0),
    IVec3::new(2, 4, 0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
enum BuildState {
    Placing(usize),
    Lighting,
}

/// Fall-back: build a nether portal frame from carried obsidian and light it.
pub struct ConstructNetherPortalTask {
    base: Option<IVec3>,
    state: BuildState,
    click: TickTimer,
    failed: bool,
}

impl ConstructNetherPortalTask {
    pub fn new() -> Self {
        Self {
            base: None,
            state: BuildState::Placing(0),
            click: TickTimer::new(4),
            failed: false,
        }
    }

    fn portal_lit(view: &dyn WorldView) -> bool {
        !view
            .find_blocks(
                &["nether_portal".to_string()],
                block_of(view.player_pos()),
                16,
            )
            .is_empty()
    }
}

impl Default for ConstructNetherPortalTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for ConstructNetherPortalTask {
    fn display_name(&self) -> String {
        format!("ConstructNetherPortal(state: {:?})", self.state)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::ConstructNetherPortal
    }

    fn on_start(&mut self, agent: &mut dyn AgentControl) {
        self.state = BuildState::Placing(0);
        self.failed = false;
        // Build two blocks out so the frame does not swallow the agent.
        self.base = Some(block_of(agent.player_pos()) + IVec3::new(2, 0, 2));
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let inventory = agent.inventory();
        if inventory.count_of("obsidian") + placed_so_far(&self.state) < FRAME_OBSIDIAN
            && matches!(self.state, BuildState::Placing(_))
        {
            warn!("🌀 Not enough obsidian to build a portal");
            self.failed = true;
            return None;
        }
        if !inventory.has("flint_and_steel") {
            self.failed = true;
            return None;
        }
        let Some(base) = self.base else {
            self.failed = true;
            return None;
        };

        let now = agent.game_tick();
        match self.state {
            BuildState::Placing(index) => {
                if index >= FRAME_OFFSETS.len() {
                    self.state = BuildState::Lighting;
                    return None;
                }
                let target = base + FRAME_OFFSETS[index];
                let already = agent
                    .block_at(target)
                    .map(|b| b.name == "obsidian")
                    .unwrap_or(false);
                if already {
                    self.state = BuildState::Placing(index + 1);
                    return None;
                }
                if !matches!(agent.held_item(), Some(s) if s.name == "obsidian") {
                    agent.equip("obsidian", crate::facade::EquipDestination::Hand);
                    return None;
                }
                if self.click.tick(now) {
                    agent.look_at(block_center(target));
                    agent.place_block(target - IVec3::Y, Face::Up);
                    self.state = BuildState::Placing(index + 1);
                }
                None
            }
            BuildState::Lighting => {
                if Self::portal_lit(&*agent) {
                    return None;
                }
                if !matches!(agent.held_item(), Some(s) if s.name == "flint_and_steel") {
                    agent.equip("flint_and_steel", crate::facade::EquipDestination::Hand);
                    return None;
                }
                if self.click.tick(now) {
                    // Strike the inside of the bottom frame row.
                    agent.use_on_block(base + IVec3::new(1, 0, 0));
                }
                None
            }
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        matches!(self.state, BuildState::Lighting) && Self::portal_lit(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Obsidian already committed to the frame while placing.
fn placed_so_far(state: &BuildState) -> u32 {
    match state {
        BuildState::Placing(index) => *index as u32,
        BuildState::Lighting => FRAME_OBSIDIAN,
    }
}

/// Route to a dimension through whatever portal path applies.
pub struct GoToDimensionTask {
    target: Dimension,
    enter: Option<TaskHandle>,
    construct: Option<TaskHandle>,
    failed: bool,
}

impl GoToDimensionTask {
    pub fn new(target: Dimension) -> Self {
        Self {
            target,
            enter: None,
            construct: None,
            failed: false,
        }
    }
}

impl Task for GoToDimensionTask {
    fn display_name(&self) -> String {
        format!("GoToDimension({})", self.target)
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::GoToDimension {
            target: self.target,
        }
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let current = agent.dimension();
        if current == self.target {
            return None;
        }
        if self.target == Dimension::End {
            warn!("🌀 GoToDimension cannot route to the End");
            self.failed = true;
            return None;
        }
        if current == Dimension::End {
            warn!("🌀 GoToDimension cannot route out of the End");
            self.failed = true;
            return None;
        }

        let near = block_of(agent.player_pos());
        let portal_known = !standing_portal_blocks(&*agent, near).is_empty();
        let inventory = agent.inventory();
        let can_build = inventory.count_of("obsidian") >= FRAME_OBSIDIAN
            && inventory.has("flint_and_steel");

        if !portal_known && can_build {
            let construct = self
                .construct
                .get_or_insert_with(|| handle(ConstructNetherPortalTask::new()))
                .clone();
            let over = {
                let c = construct.borrow();
                c.is_finished(&*agent) || c.is_failed()
            };
            if !over {
                return Some(construct);
            }
        }

        let target = self.target;
        match &self.enter {
            Some(enter) => Some(enter.clone()),
            None => match EnterNetherPortalTask::new(target) {
                Ok(task) => {
                    let enter = handle(task);
                    self.enter = Some(enter.clone());
                    Some(enter)
                }
                Err(e) => {
                    warn!("🌀 {}", e);
                    self.failed = true;
                    None
                }
            },
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        view.dimension() == self.target
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Long-haul overworld travel through the nether: divide the target by 8,
/// walk the short leg down there, pop back out.
pub struct FastTravelTask {
    target: IVec3,
    to_nether: Option<TaskHandle>,
    to_overworld: Option<TaskHandle>,
    walk: Option<TaskHandle>,
    nether_walk: Option<TaskHandle>,
    failed: bool,
}

impl FastTravelTask {
    pub fn new(target: IVec3) -> Self {
        Self {
            target,
            to_nether: None,
            to_overworld: None,
            walk: None,
            nether_walk: None,
            failed: false,
        }
    }

    fn arrived(&self, view: &dyn WorldView) -> bool {
        view.dimension() == Dimension::Overworld
            && crate::types::distance_xz_sq(view.player_pos(), block_center(self.target)) <= 9.0
    }
}

impl Task for FastTravelTask {
    fn display_name(&self) -> String {
        format!(
            "FastTravel({}, {}, {})",
            self.target.x, self.target.y, self.target.z
        )
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::FastTravel {
            target: self.target,
        }
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        match agent.dimension() {
            Dimension::Overworld => {
                let here = agent.player_pos();
                let far = crate::types::distance_xz_sq(here, block_center(self.target))
                    > FAST_TRAVEL_THRESHOLD * FAST_TRAVEL_THRESHOLD;
                if far {
                    info!("🌀 Far target; taking the nether shortcut");
                    let hop = self
                        .to_nether
                        .get_or_insert_with(|| handle(GoToDimensionTask::new(Dimension::Nether)))
                        .clone();
                    Some(hop)
                } else {
                    let target = self.target;
                    let walk = self
                        .walk
                        .get_or_insert_with(|| handle(GetToPositionTask::new(target)))
                        .clone();
                    Some(walk)
                }
            }
            Dimension::Nether => {
                let nether_target = overworld_to_nether(self.target);
                let close = crate::types::distance_xz_sq(
                    agent.player_pos(),
                    block_center(nether_target),
                ) <= 64.0;
                if close {
                    let hop = self
                        .to_overworld
                        .get_or_insert_with(|| {
                            handle(GoToDimensionTask::new(Dimension::Overworld))
                        })
                        .clone();
                    Some(hop)
                } else {
                    let walk = self
                        .nether_walk
                        .get_or_insert_with(|| handle(GetToPositionTask::new(nether_target)))
                        .clone();
                    Some(walk)
                }
            }
            Dimension::End => {
                self.failed = true;
                None
            }
        }
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.arrived(view)
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{BlockBounds, BlockSnapshot, SimWorld};
    use crate::task::TaskRunner;
    use glam::Vec3;

    #[test]
    fn test_portal_task_rejects_the_end_at_construction() {
        let err = EnterNetherPortalTask::new(Dimension::End);
        assert!(err.is_err(), "the End must be rejected up front");
        assert!(EnterNetherPortalTask::new(Dimension::Nether).is_ok());
        assert!(EnterNetherPortalTask::new(Dimension::Overworld).is_ok());
    }

    #[test]
    fn test_enter_portal_crosses_to_nether() {
        let mut world = SimWorld::flat(41);
        world.set_player_pos(Vec3::new(0.5, 64.0, 0.5));
        // Two-block portal column nearby.
        world.set_block(
            IVec3::new(6, 64, 0),
            BlockSnapshot::new("nether_portal", BlockBounds::Empty),
        );
        world.set_block(
            IVec3::new(6, 65, 0),
            BlockSnapshot::new("nether_portal", BlockBounds::Empty),
        );

        let task = EnterNetherPortalTask::new(Dimension::Nether).unwrap();
        let mut runner = TaskRunner::new(handle(task));
        for _ in 0..600 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        assert!(runner.is_halted(), "portal hop should complete");
        assert_eq!(world.dimension(), Dimension::Nether);
    }

    #[test]
    fn test_fast_travel_scales_target_by_eight() {
        assert_eq!(
            overworld_to_nether(IVec3::new(1600, 64, -800)),
            IVec3::new(200, 64, -100)
        );
    }
}
