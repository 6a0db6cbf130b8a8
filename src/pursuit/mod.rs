/// Closest-object pursuit: heuristic-cached target selection with
/// anti-oscillation, generic over the target type.
///
/// The score of a candidate is the *minimum-ever* observed heuristic, so the
/// decision is stable: once we have learned that reaching A costs 50, a
/// superficially closer B must beat 50, not merely beat Euclidean distance.
/// The quarter-distance rule covers the case where obstacles clear and a
/// candidate becomes genuinely easier.
use crate::facade::WorldView;
use glam::Vec3;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::debug;

/// Per-candidate memory. Both stored metrics are monotone non-increasing
/// (min-reduced on every update).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedHeuristic {
    /// Minimum observed estimated path cost to reach the candidate.
    pub heuristic: f32,
    /// Minimum observed squared Euclidean distance.
    pub closest_dist_sq: f32,
    /// Tick of the last attempt at this candidate.
    pub last_attempt_tick: u64,
}

/// The capability set a pursuit instance is built around. Supplied at
/// construction by the owning task, not via inheritance.
pub trait PursuitSource<T> {
    /// Where the candidate currently is, if observable.
    fn position_of(&self, view: &dyn WorldView, target: &T) -> Option<Vec3>;

    /// The current best candidate near `origin` (typically Euclidean-closest
    /// among valid, non-blacklisted candidates).
    fn closest_to(&self, view: &dyn WorldView, origin: Vec3) -> Option<T>;

    /// Candidates failing this are purged before selection proceeds.
    fn is_valid(&self, view: &dyn WorldView, target: &T) -> bool;

    /// The vantage selection measures from.
    fn origin(&self, view: &dyn WorldView) -> Vec3 {
        view.player_pos()
    }

    /// Estimated path cost from the origin to the candidate. Distance is the
    /// proxy unless a richer pathfinder cost is available.
    fn heuristic(&self, view: &dyn WorldView, target: &T) -> f32 {
        self.position_of(view, target)
            .map(|p| p.distance(self.origin(view)))
            .unwrap_or(f32::INFINITY)
    }
}

/// Selection state: the heuristic cache, the held target, and whether the
/// owner is currently wandering for lack of candidates.
pub struct ClosestObjectPursuit<T> {
    cache: HashMap<T, CachedHeuristic>,
    current: Option<T>,
    pursuing: bool,
    wandering: bool,
}

impl<T> Default for ClosestObjectPursuit<T> {
    fn default() -> Self {
        Self {
            cache: HashMap::new(),
            current: None,
            pursuing: false,
            wandering: false,
        }
    }
}

impl<T: Clone + Eq + Hash> ClosestObjectPursuit<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything learned; used when the owning task resets its search.
    pub fn reset(&mut self) {
        self.cache.clear();
        self.current = None;
        self.pursuing = false;
        self.wandering = false;
    }

    /// Release the held target but keep everything learned. Used by the
    /// re-evaluation timer so the next tick re-selects from scratch.
    pub fn clear_current(&mut self) {
        self.current = None;
        self.pursuing = false;
    }

    /// Forget one candidate (blacklisted or consumed).
    pub fn purge(&mut self, target: &T) {
        self.cache.remove(target);
        if self.current.as_ref() == Some(target) {
            self.current = None;
        }
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn is_wandering(&self) -> bool {
        self.wandering
    }

    /// The owner reports whether the goal task for the held target actually
    /// ran last tick; heuristics are only learned while moving toward it.
    pub fn set_pursuing(&mut self, pursuing: bool) {
        self.pursuing = pursuing;
    }

    /// Min-reduce a candidate's cache entry with an observation.
    pub fn record(&mut self, target: T, heuristic: f32, dist_sq: f32, tick: u64) {
        let entry = self.cache.entry(target).or_insert(CachedHeuristic {
            heuristic,
            closest_dist_sq: dist_sq,
            last_attempt_tick: tick,
        });
        entry.heuristic = entry.heuristic.min(heuristic);
        entry.closest_dist_sq = entry.closest_dist_sq.min(dist_sq);
        entry.last_attempt_tick = tick;
    }

    pub fn cached(&self, target: &T) -> Option<&CachedHeuristic> {
        self.cache.get(target)
    }

    /// Run one round of target selection. Returns the target to pursue this
    /// tick, or `None` when no candidate exists (the owner wanders).
    pub fn select(&mut self, view: &dyn WorldView, source: &impl PursuitSource<T>) -> Option<T> {
        let tick = view.game_tick();

        // Never hold a target that fails validity.
        if let Some(held) = self.current.clone() {
            if !source.is_valid(view, &held) {
                self.purge(&held);
            }
        }

        let origin = source.origin(view);
        let candidate = source
            .closest_to(view, origin)
            .filter(|c| source.is_valid(view, c));

        let mut switched = false;
        if let Some(cand) = candidate {
            if self.current.as_ref() != Some(&cand) {
                match self.current.clone() {
                    None => {
                        self.current = Some(cand);
                        switched = true;
                    }
                    Some(held) => {
                        let held_now = source.heuristic(view, &held);
                        if self.pursuing {
                            let held_dist_sq = source
                                .position_of(view, &held)
                                .map(|p| p.distance_squared(origin))
                                .unwrap_or(f32::INFINITY);
                            self.record(held.clone(), held_now, held_dist_sq, tick);
                        }
                        match self.cache.get(&cand) {
                            // First look is free.
                            None => {
                                self.current = Some(cand);
                                switched = true;
                            }
                            Some(cached) => {
                                let cand_dist_sq = source
                                    .position_of(view, &cand)
                                    .map(|p| p.distance_squared(origin))
                                    .unwrap_or(f32::INFINITY);
                                let learned_better = cached.heuristic < held_now;
                                let markedly_closer =
                                    cand_dist_sq < cached.closest_dist_sq * 0.25;
                                if learned_better || markedly_closer {
                                    debug!(
                                        "🎯 Pursuit switch: learned_better={} markedly_closer={}",
                                        learned_better, markedly_closer
                                    );
                                    self.current = Some(cand);
                                    switched = true;
                                }
                            }
                        }
                    }
                }
            }
        }

        // The candidate query is distance-driven; a candidate we have already
        // learned to be cheap may not be the Euclidean-closest. Sweep the
        // cache with the same learned-better rule.
        if !switched {
            if let Some(held) = self.current.clone() {
                let held_now = source.heuristic(view, &held);
                let better = self
                    .cache
                    .iter()
                    .filter(|(t, _)| **t != held && source.is_valid(view, t))
                    .filter(|(_, c)| c.heuristic < held_now)
                    .min_by(|a, b| a.1.heuristic.total_cmp(&b.1.heuristic))
                    .map(|(t, _)| (*t).clone());
                if let Some(better) = better {
                    debug!("🎯 Pursuit switch to cached-cheaper candidate");
                    self.current = Some(better);
                }
            }
        }

        self.wandering = self.current.is_none();
        self.current.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facade::SimWorld;

    /// Fixed candidate set with scripted positions and path costs.
    struct FixedSource {
        targets: Vec<(u32, Vec3, f32)>,
    }

    impl FixedSource {
        fn entry(&self, id: &u32) -> Option<&(u32, Vec3, f32)> {
            self.targets.iter().find(|(t, _, _)| t == id)
        }
    }

    impl PursuitSource<u32> for FixedSource {
        fn position_of(&self, _view: &dyn WorldView, target: &u32) -> Option<Vec3> {
            self.entry(target).map(|(_, p, _)| *p)
        }

        fn closest_to(&self, _view: &dyn WorldView, origin: Vec3) -> Option<u32> {
            self.targets
                .iter()
                .min_by(|a, b| {
                    a.1.distance_squared(origin)
                        .total_cmp(&b.1.distance_squared(origin))
                })
                .map(|(t, _, _)| *t)
        }

        fn is_valid(&self, _view: &dyn WorldView, target: &u32) -> bool {
            self.entry(target).is_some()
        }

        fn heuristic(&self, _view: &dyn WorldView, target: &u32) -> f32 {
            self.entry(target).map(|(_, _, h)| *h).unwrap_or(f32::INFINITY)
        }
    }

    const A: u32 = 1;
    const B: u32 = 2;

    #[test]
    fn test_switches_to_candidate_with_better_learned_cost() {
        // A is Euclidean-closer (10 vs 15) but its real path cost is 50;
        // B was previously learned to cost 12.
        let world = SimWorld::flat(7);
        let source = FixedSource {
            targets: vec![
                (A, Vec3::new(10.0, 64.0, 0.0), 50.0),
                (B, Vec3::new(15.0, 64.0, 0.0), 12.0),
            ],
        };
        let mut pursuit = ClosestObjectPursuit::new();
        pursuit.record(B, 12.0, 15.0 * 15.0, 0);

        // Adopts the closest candidate first.
        assert_eq!(pursuit.select(&world, &source), Some(A));
        pursuit.set_pursuing(true);

        // The learned cost of B beats A's current cost.
        assert_eq!(pursuit.select(&world, &source), Some(B));
    }

    #[test]
    fn test_anti_oscillation_first_adoption_and_free_switch() {
        let world = SimWorld::flat(7);
        let mut pursuit = ClosestObjectPursuit::new();

        // Tick 1: A closest, nothing held -> adopt A.
        let source = FixedSource {
            targets: vec![
                (A, Vec3::new(10.0, 64.0, 0.0), 10.0),
                (B, Vec3::new(12.0, 64.0, 0.0), 12.0),
            ],
        };
        assert_eq!(pursuit.select(&world, &source), Some(A));
        pursuit.set_pursuing(true);

        // Tick 2: B now closest; B has no cache entry -> free switch,
        // and A's heuristic gets cached on the way out.
        let source = FixedSource {
            targets: vec![
                (A, Vec3::new(12.0, 64.0, 0.0), 12.0),
                (B, Vec3::new(10.0, 64.0, 0.0), 10.0),
            ],
        };
        assert_eq!(pursuit.select(&world, &source), Some(B));
        assert!(pursuit.cached(&A).is_some(), "A must be cached after update");

        // Tick 3: A closest again, but its cached cost (12) does not beat
        // B's current cost (12): no flip.
        let source = FixedSource {
            targets: vec![
                (A, Vec3::new(11.0, 64.0, 0.0), 11.0),
                (B, Vec3::new(12.0, 64.0, 0.0), 12.0),
            ],
        };
        assert_eq!(pursuit.select(&world, &source), Some(B));
    }

    #[test]
    fn test_quarter_distance_rule_fires() {
        let world = SimWorld::flat(7);
        let mut pursuit = ClosestObjectPursuit::new();
        // B was once seen at distance 40 (cached dist_sq 1600) with a poor
        // learned cost.
        pursuit.record(B, 100.0, 1600.0, 0);

        // Adopt A while it is the closest.
        let source = FixedSource {
            targets: vec![
                (A, Vec3::new(5.0, 64.0, 0.0), 5.0),
                (B, Vec3::new(30.0, 64.0, 0.0), 100.0),
            ],
        };
        assert_eq!(pursuit.select(&world, &source), Some(A));
        pursuit.set_pursuing(true);

        // B drifts markedly closer: 9^2 = 81 < 1600/4. Its learned cost of
        // 100 does not beat A's current cost, but the approach signal wins.
        let source = FixedSource {
            targets: vec![
                (A, Vec3::new(10.0, 64.0, 0.0), 10.0),
                (B, Vec3::new(9.0, 64.0, 0.0), 100.0),
            ],
        };
        assert_eq!(pursuit.select(&world, &source), Some(B));
    }

    #[test]
    fn test_invalid_target_is_purged() {
        let world = SimWorld::flat(7);
        let mut pursuit = ClosestObjectPursuit::new();
        let source = FixedSource {
            targets: vec![(A, Vec3::new(10.0, 64.0, 0.0), 10.0)],
        };
        assert_eq!(pursuit.select(&world, &source), Some(A));

        // A disappears: purged, nothing to pursue -> wandering.
        let source = FixedSource { targets: vec![] };
        assert_eq!(pursuit.select(&world, &source), None);
        assert!(pursuit.is_wandering());
        assert!(pursuit.cached(&A).is_none());
    }

    #[test]
    fn test_cache_metrics_are_monotone() {
        let mut pursuit = ClosestObjectPursuit::new();
        pursuit.record(A, 20.0, 400.0, 0);
        pursuit.record(A, 35.0, 900.0, 1);
        let cached = pursuit.cached(&A).unwrap();
        assert_eq!(cached.heuristic, 20.0);
        assert_eq!(cached.closest_dist_sq, 400.0);
        pursuit.record(A, 5.0, 25.0, 2);
        let cached = pursuit.cached(&A).unwrap();
        assert_eq!(cached.heuristic, 5.0);
        assert_eq!(cached.closest_dist_sq, 25.0);
    }
}
