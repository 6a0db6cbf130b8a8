/// The dragon fight. Close with the dragon when it is in reach, dodge its
/// breath with the projectile dodger, and call it done once the exit
/// gateway appears.
use crate::facade::{AgentControl, Control, WorldView};
use crate::task::{handle, Task, TaskHandle, TaskIntent, TickTimer};
use crate::tasks::safety::{find_incoming_projectile, DodgeProjectilesTask, ProjectileDodgeConfig};
use crate::types::block_of;
use glam::{IVec3, Vec3};
use std::cell::Cell;
use tracing::{debug, info};

/// Melee reach against the dragon.
const DRAGON_REACH: f32 = 4.0;
/// Swing cooldown in ticks.
const SWING_COOLDOWN_TICKS: u64 = 12;
/// The dragon perches over the exit portal at world center.
const PORTAL_CENTER: IVec3 = IVec3::new(0, 64, 0);

/// Fight the ender dragon until the end gateway opens.
pub struct FightDragonTask {
    swing: TickTimer,
    dodge: Option<TaskHandle>,
    dodge_config: ProjectileDodgeConfig,
    done: Cell<bool>,
}

impl FightDragonTask {
    pub fn new() -> Self {
        Self {
            swing: TickTimer::new(SWING_COOLDOWN_TICKS),
            dodge: None,
            dodge_config: ProjectileDodgeConfig::default(),
            done: Cell::new(false),
        }
    }

    fn gateway_open(view: &dyn WorldView) -> bool {
        !view
            .find_blocks(
                &["end_gateway".to_string()],
                block_of(view.player_pos()),
                128,
            )
            .is_empty()
    }

    fn dragon(view: &dyn WorldView) -> Option<crate::facade::EntitySnapshot> {
        view.entities()
            .into_iter()
            .find(|e| e.valid && e.name == "ender_dragon")
    }
}

impl Default for FightDragonTask {
    fn default() -> Self {
        Self::new()
    }
}

impl Task for FightDragonTask {
    fn display_name(&self) -> String {
        "FightDragon".to_string()
    }

    fn intent(&self) -> TaskIntent {
        TaskIntent::FightDragon
    }

    fn on_tick(&mut self, agent: &mut dyn AgentControl) -> Option<TaskHandle> {
        if Self::gateway_open(&*agent) {
            info!("🐉 End gateway observed; the dragon is down");
            self.done.set(true);
            return None;
        }

        // Dragon breath and fireballs get dodged before anything else.
        if find_incoming_projectile(&*agent, &self.dodge_config).is_some() {
            let dodge = self
                .dodge
                .get_or_insert_with(|| handle(DodgeProjectilesTask::new(self.dodge_config.clone())))
                .clone();
            return Some(dodge);
        }

        match Self::dragon(&*agent) {
            Some(dragon) => {
                let pos = agent.player_pos();
                let dist = pos.distance(dragon.position);
                agent.look_at(dragon.position);
                if dist <= DRAGON_REACH {
                    agent.set_control(Control::Forward, false);
                    let now = agent.game_tick();
                    if self.swing.tick(now) {
                        debug!("🐉 Striking the dragon");
                        agent.attack_entity(dragon.id);
                    }
                } else {
                    // The dragon dips low over the portal; wait for it there.
                    let perched = dragon.velocity.length_squared() < 0.01
                        || dragon.position.y < pos.y + 6.0;
                    let goal = if perched {
                        dragon.position
                    } else {
                        crate::types::block_center(PORTAL_CENTER) + Vec3::new(0.0, 1.0, 0.0)
                    };
                    agent.look_at(goal);
                    agent.set_control(Control::Forward, true);
                    agent.set_control(Control::Sprint, true);
                }
                None
            }
            None => {
                // No dragon and no gateway yet: hold near the portal.
                agent.look_at(crate::types::block_center(PORTAL_CENTER));
                agent.set_control(Control::Forward, true);
                None
            }
        }
    }

    fn on_stop(&mut self, agent: &mut dyn AgentControl, _interrupter: Option<&dyn Task>) {
        agent.clear_controls();
    }

    fn is_finished(&self, view: &dyn WorldView) -> bool {
        self.done.get() || Self::gateway_open(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::{BlockBounds, BlockSnapshot, SimWorld};
    use crate::task::TaskRunner;

    #[test]
    fn test_fight_ends_on_gateway() {
        let mut world = SimWorld::flat(101);
        world.set_dimension("the_end");
        world.spawn_entity("ender_dragon", Vec3::new(3.0, 64.0, 0.5), 20.0);

        let mut runner = TaskRunner::new(handle(FightDragonTask::new()));
        for _ in 0..400 {
            runner.tick(&mut world);
            world.step();
            if runner.is_halted() {
                break;
            }
        }
        // The sim dragon dies to repeated swings; script the gateway.
        world.set_block(
            IVec3::new(0, 70, 0),
            BlockSnapshot::new("end_gateway", BlockBounds::Empty),
        );
        let mut runner = TaskRunner::new(handle(FightDragonTask::new()));
        runner.tick(&mut world);
        assert!(runner.is_halted(), "gateway ends the fight");
    }
}
