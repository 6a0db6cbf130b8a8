/// The cooperative driver: walks the returned-child chain once per game
/// tick, enforcing start/stop/interrupt invariants at every transition.
///
/// Only the deepest task of the chain actually issues world commands on a
/// given tick; every ancestor is suspended between `on_tick` returns.
use super::{Task, TaskHandle};
use crate::facade::AgentControl;
use std::rc::Rc;
use tracing::{debug, info, warn};

/// Upper bound on chain depth; a chain this deep is a task returning
/// children cyclically and is cut off rather than allowed to spin.
const MAX_CHAIN_DEPTH: usize = 64;

struct Node {
    task: TaskHandle,
    started: bool,
    ticks: u64,
}

impl Node {
    fn new(task: TaskHandle) -> Self {
        Self {
            task,
            started: false,
            ticks: 0,
        }
    }
}

/// Drives one root task to completion over repeated `tick()` calls.
pub struct TaskRunner {
    chain: Vec<Node>,
    halted: bool,
}

impl TaskRunner {
    pub fn new(root: TaskHandle) -> Self {
        Self {
            chain: vec![Node::new(root)],
            halted: false,
        }
    }

    /// Cancel the current chain (if any) and install a new root.
    pub fn set_root(&mut self, agent: &mut dyn AgentControl, root: TaskHandle) {
        self.stop(agent);
        self.chain = vec![Node::new(root)];
        self.halted = false;
    }

    /// True once the root has finished or failed and the chain was stopped.
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// The display name of the deepest running task, for diagnostics.
    pub fn active_display_name(&self) -> Option<String> {
        self.chain.last().map(|n| n.task.borrow().display_name())
    }

    /// Root display name, for logging phase transitions.
    pub fn root_display_name(&self) -> Option<String> {
        self.chain.first().map(|n| n.task.borrow().display_name())
    }

    /// Stop every task in the chain, deepest first, and release controls.
    pub fn stop(&mut self, agent: &mut dyn AgentControl) {
        self.stop_from(0, agent, None);
        agent.clear_controls();
        self.halted = true;
    }

    /// Run one scheduling step.
    pub fn tick(&mut self, agent: &mut dyn AgentControl) {
        if self.halted || self.chain.is_empty() {
            return;
        }

        // Terminal root: propagate stop and go quiet.
        let (root_finished, root_failed) = {
            let root = self.chain[0].task.borrow();
            (root.is_finished(&*agent), root.is_failed())
        };
        if root_finished || root_failed {
            let name = self.root_display_name().unwrap_or_default();
            if root_failed {
                warn!("🛑 Root task '{}' failed; halting", name);
            } else {
                info!("🏁 Root task '{}' finished", name);
            }
            self.stop(agent);
            return;
        }

        let mut depth = 0;
        loop {
            if depth >= MAX_CHAIN_DEPTH {
                warn!("⛓️ Task chain exceeded depth {}; truncating", MAX_CHAIN_DEPTH);
                self.stop_from(depth, agent, None);
                break;
            }

            // A finished or failed child is stopped here; its parent polls
            // the handle it kept and re-plans on its next turn. Unstarted
            // nodes are exempt: a re-adopted handle may carry a stale
            // finished flag that its on_start is about to reset.
            if depth > 0 && self.chain[depth].started {
                let (finished, failed) = {
                    let task = self.chain[depth].task.borrow();
                    (task.is_finished(&*agent), task.is_failed())
                };
                if finished || failed {
                    debug!(
                        "⛓️ Child '{}' {}; stopping",
                        self.chain[depth].task.borrow().display_name(),
                        if failed { "failed" } else { "finished" }
                    );
                    self.stop_from(depth, agent, None);
                    break;
                }
            }

            if !self.chain[depth].started {
                self.chain[depth].task.borrow_mut().on_start(agent);
                self.chain[depth].started = true;
            }
            self.chain[depth].ticks += 1;

            let proposed = self.chain[depth].task.borrow_mut().on_tick(agent);
            match proposed {
                None => {
                    // No child this tick: anything below is orphaned.
                    self.stop_from(depth + 1, agent, None);
                    break;
                }
                Some(new_child) => {
                    let keep = match self.chain.get(depth + 1) {
                        Some(old) => {
                            Rc::ptr_eq(&old.task, &new_child)
                                || old.task.borrow().intent() == new_child.borrow().intent()
                        }
                        None => false,
                    };
                    if !keep {
                        if self.chain.len() > depth + 1 {
                            debug!(
                                "⛓️ '{}' interrupts '{}'",
                                new_child.borrow().display_name(),
                                self.chain[depth + 1].task.borrow().display_name()
                            );
                        }
                        {
                            let interrupter = new_child.borrow();
                            self.stop_from(depth + 1, agent, Some(&*interrupter));
                        }
                        self.chain.push(Node::new(new_child));
                    }
                    depth += 1;
                }
            }
        }
    }

    /// Stop and drop every node at `depth` and deeper, deepest first
    /// (children before parents).
    fn stop_from(
        &mut self,
        depth: usize,
        agent: &mut dyn AgentControl,
        interrupter: Option<&dyn Task>,
    ) {
        while self.chain.len() > depth {
            let node = self.chain.pop();
            if let Some(node) = node {
                if node.started {
                    node.task.borrow_mut().on_stop(agent, interrupter);
                }
            }
        }
    }
}
