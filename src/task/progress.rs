/// Stall detection: a best-distance-in-window monitor.
///
/// A task whose agent is pinned against geometry or circling an obstacle
/// never sets a new best distance; after the patience window elapses the
/// owning task gives up on the current target, blacklists it, and re-plans.
use glam::Vec3;

#[derive(Debug, Clone)]
pub struct ProgressChecker {
    patience_ticks: u64,
    best: Option<f32>,
    best_tick: u64,
}

impl ProgressChecker {
    pub fn new(patience_ticks: u64) -> Self {
        Self {
            patience_ticks,
            best: None,
            best_tick: 0,
        }
    }

    pub fn from_seconds(seconds: f32) -> Self {
        Self::new(crate::types::seconds_to_ticks(seconds))
    }

    /// Forget all observations; the window restarts at the next observe.
    /// Called by the owning task when the goal or strategy changes.
    pub fn reset(&mut self) {
        self.best = None;
        self.best_tick = 0;
    }

    /// Record the metric for this tick. Only a strict improvement renews the
    /// window.
    pub fn observe(&mut self, tick: u64, value: f32) {
        match self.best {
            Some(best) if value >= best => {}
            _ => {
                self.best = Some(value);
                self.best_tick = tick;
            }
        }
    }

    /// Convenience: observe the distance from `pos` to `goal`.
    pub fn observe_distance(&mut self, tick: u64, pos: Vec3, goal: Vec3) {
        self.observe(tick, pos.distance_squared(goal));
    }

    /// True when the window elapsed without a new best.
    pub fn failed(&self, tick: u64) -> bool {
        match self.best {
            None => false,
            Some(_) => tick.saturating_sub(self.best_tick) > self.patience_ticks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_observation_never_fails() {
        let checker = ProgressChecker::new(100);
        assert!(!checker.failed(10_000));
    }

    #[test]
    fn test_fails_after_window_without_improvement() {
        let mut checker = ProgressChecker::new(100);
        checker.observe(0, 50.0);
        assert!(!checker.failed(100));
        assert!(checker.failed(101));
    }

    #[test]
    fn test_strict_improvement_renews_window() {
        let mut checker = ProgressChecker::new(100);
        checker.observe(0, 50.0);
        checker.observe(90, 49.0);
        assert!(!checker.failed(150));
        // Equal value is not an improvement.
        checker.observe(150, 49.0);
        assert!(checker.failed(191));
    }

    #[test]
    fn test_reset_forgets_best() {
        let mut checker = ProgressChecker::new(100);
        checker.observe(0, 10.0);
        checker.reset();
        assert!(!checker.failed(500));
        // A worse value after reset still starts a fresh window.
        checker.observe(500, 99.0);
        assert!(!checker.failed(600));
        assert!(checker.failed(601));
    }
}
