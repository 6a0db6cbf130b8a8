/// Tick-based timers. All durations in the core are game ticks; wall time
/// never appears.
use crate::types::seconds_to_ticks;

/// Interval timer for periodic work (re-evaluation, click cooldowns).
/// Starts elapsed; arm it with `reset` in `on_start`.
#[derive(Debug, Clone)]
pub struct TickTimer {
    interval: u64,
    last: Option<u64>,
}

impl TickTimer {
    pub fn new(interval_ticks: u64) -> Self {
        Self {
            interval: interval_ticks,
            last: None,
        }
    }

    pub fn from_seconds(seconds: f32) -> Self {
        Self::new(seconds_to_ticks(seconds))
    }

    pub fn reset(&mut self, now: u64) {
        self.last = Some(now);
    }

    pub fn elapsed(&self, now: u64) -> bool {
        match self.last {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.interval,
        }
    }

    /// Check-and-rearm in one step.
    pub fn tick(&mut self, now: u64) -> bool {
        if self.elapsed(now) {
            self.reset(now);
            true
        } else {
            false
        }
    }
}

/// Measures how long something has been running, in ticks.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    started: Option<u64>,
}

impl Stopwatch {
    pub fn start(&mut self, now: u64) {
        self.started = Some(now);
    }

    pub fn clear(&mut self) {
        self.started = None;
    }

    pub fn running(&self) -> bool {
        self.started.is_some()
    }

    pub fn elapsed_ticks(&self, now: u64) -> u64 {
        self.started.map(|s| now.saturating_sub(s)).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_starts_elapsed() {
        let timer = TickTimer::new(20);
        assert!(timer.elapsed(0));
    }

    #[test]
    fn test_timer_rearm_cycle() {
        let mut timer = TickTimer::new(20);
        timer.reset(100);
        assert!(!timer.elapsed(119));
        assert!(timer.elapsed(120));
        assert!(timer.tick(120));
        assert!(!timer.tick(121));
    }

    #[test]
    fn test_stopwatch() {
        let mut watch = Stopwatch::default();
        assert_eq!(watch.elapsed_ticks(50), 0);
        watch.start(10);
        assert_eq!(watch.elapsed_ticks(50), 40);
        watch.clear();
        assert!(!watch.running());
    }
}
