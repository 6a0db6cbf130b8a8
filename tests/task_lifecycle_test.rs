//! Kernel lifecycle invariants: start/stop ordering, equal-child state
//! retention, interrupt semantics, and terminal-root behavior.

use std::cell::RefCell;
use std::rc::Rc;
use voxel_agent::facade::sim::Command;
use voxel_agent::facade::{AgentControl, SimWorld, WorldView};
use voxel_agent::task::{handle, Task, TaskHandle, TaskIntent, TaskRunner};

/// Records every lifecycle event for assertions.
#[derive(Default)]
struct Journal {
    events: Vec<String>,
}

impl Journal {
    fn record(&mut self, event: &str) {
        self.events.push(event.to_string());
    }

    fn count_of(&self, event: &str) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

/// A leaf that runs for a fixed number of ticks, journaling its lifecycle.
struct CountedTask {
    name: String,
    run_ticks: u32,
    ticked: u32,
    journal: Rc<RefCell<Journal>>,
}

impl CountedTask {
    fn new(name: &str, run_ticks: u32, journal: Rc<RefCell<Journal>>) -> Self {
        Self {
            name: name.to_string(),
            run_ticks,
            ticked: 0,
            journal,
        }
    }
}

impl Task for CountedTask {
    fn display_name(&self) -> String {
        self.name.clone()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::Custom(self.name.clone())
    }

    fn on_start(&mut self, _agent: &mut dyn AgentControl) {
        self.journal.borrow_mut().record(&format!("start:{}", self.name));
    }

    fn on_tick(&mut self, _agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        self.ticked += 1;
        self.journal.borrow_mut().record(&format!("tick:{}", self.name));
        None
    }

    fn on_stop(&mut self, _agent: &mut dyn AgentControl, interrupter: Option<&dyn Task>) {
        let cause = interrupter
            .map(|t| t.display_name())
            .unwrap_or_else(|| "none".to_string());
        self.journal
            .borrow_mut()
            .record(&format!("stop:{}:{}", self.name, cause));
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.ticked >= self.run_ticks
    }
}

/// Parent returning children from a script, one per tick.
struct ScriptedParent {
    script: Vec<TaskHandle>,
    cursor: usize,
    done_after: usize,
}

impl ScriptedParent {
    fn new(script: Vec<TaskHandle>) -> Self {
        let done_after = script.len();
        Self {
            script,
            cursor: 0,
            done_after,
        }
    }
}

impl Task for ScriptedParent {
    fn display_name(&self) -> String {
        "ScriptedParent".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::Custom("scripted_parent".to_string())
    }

    fn on_tick(&mut self, _agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        let child = self.script.get(self.cursor).cloned();
        if self.cursor + 1 < self.script.len() {
            self.cursor += 1;
        }
        child
    }

    fn is_finished(&self, _view: &dyn WorldView) -> bool {
        self.cursor + 1 >= self.done_after && self.script.is_empty()
    }
}

#[test]
fn test_start_once_before_ticks_stop_once_after() {
    let mut world = SimWorld::flat(1);
    let journal = Rc::new(RefCell::new(Journal::default()));
    let task = handle(CountedTask::new("leaf", 3, journal.clone()));
    let mut runner = TaskRunner::new(task);

    for _ in 0..10 {
        runner.tick(&mut world);
        world.step();
    }

    let journal = journal.borrow();
    assert_eq!(journal.count_of("start:leaf"), 1, "on_start exactly once");
    assert_eq!(journal.count_of("stop:leaf:none"), 1, "on_stop exactly once");
    let start_at = journal.events.iter().position(|e| e == "start:leaf").unwrap();
    let first_tick = journal.events.iter().position(|e| e == "tick:leaf").unwrap();
    let stop_at = journal
        .events
        .iter()
        .position(|e| e.starts_with("stop:leaf"))
        .unwrap();
    assert!(start_at < first_tick, "start precedes the first tick");
    assert!(
        stop_at
            > journal
                .events
                .iter()
                .rposition(|e| e == "tick:leaf")
                .unwrap(),
        "stop follows every tick"
    );
}

#[test]
fn test_equal_child_is_not_restarted() {
    let mut world = SimWorld::flat(2);
    let journal = Rc::new(RefCell::new(Journal::default()));

    // Two distinct objects with the same intent: the second must never start.
    let c1 = handle(CountedTask::new("same", 1000, journal.clone()));
    let c2 = handle(CountedTask::new("same", 1000, journal.clone()));
    let parent = handle(ScriptedParent::new(vec![c1.clone(), c2, c1.clone(), c1]));
    let mut runner = TaskRunner::new(parent);

    for _ in 0..4 {
        runner.tick(&mut world);
        world.step();
    }

    let journal = journal.borrow();
    assert_eq!(
        journal.count_of("start:same"),
        1,
        "an equivalent re-returned child keeps running; no second on_start"
    );
    assert_eq!(journal.count_of("tick:same"), 4, "the original child kept its turn");
}

#[test]
fn test_interrupter_is_passed_on_replacement() {
    let mut world = SimWorld::flat(3);
    let journal = Rc::new(RefCell::new(Journal::default()));

    let first = handle(CountedTask::new("first", 1000, journal.clone()));
    let second = handle(CountedTask::new("second", 1000, journal.clone()));
    let parent = handle(ScriptedParent::new(vec![first, second]));
    let mut runner = TaskRunner::new(parent);

    runner.tick(&mut world);
    world.step();
    runner.tick(&mut world);

    let journal = journal.borrow();
    assert_eq!(
        journal.count_of("stop:first:second"),
        1,
        "the replaced child sees its interrupter"
    );
    assert_eq!(journal.count_of("start:second"), 1);
}

#[test]
fn test_finished_root_halts_and_clears_controls() {
    let mut world = SimWorld::flat(4);
    let journal = Rc::new(RefCell::new(Journal::default()));
    let mut runner = TaskRunner::new(handle(CountedTask::new("leaf", 2, journal)));

    for _ in 0..6 {
        runner.tick(&mut world);
        world.step();
    }
    assert!(runner.is_halted());
    assert!(
        world.commands.contains(&Command::ClearControls),
        "the driver releases control states when the root stops"
    );

    // Running a finished task through the kernel is a no-op.
    world.take_commands();
    runner.tick(&mut world);
    assert!(world.take_commands().is_empty());
}

#[test]
fn test_finishedness_is_monotone_across_kernel_runs() {
    let mut world = SimWorld::flat(5);
    let journal = Rc::new(RefCell::new(Journal::default()));
    let task = Rc::new(RefCell::new(CountedTask::new("leaf", 2, journal)));
    let root: TaskHandle = task.clone();
    let mut runner = TaskRunner::new(root);

    for _ in 0..8 {
        runner.tick(&mut world);
        world.step();
        if runner.is_halted() {
            break;
        }
    }
    assert!(task.borrow().is_finished(&world));
    // Nothing the kernel does afterwards may flip it back.
    for _ in 0..5 {
        runner.tick(&mut world);
        world.step();
        assert!(task.borrow().is_finished(&world));
    }
}
