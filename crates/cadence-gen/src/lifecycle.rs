use crate::rng::SimRng;
use cadence_core::seed::{DurationParams, PrLifecycle};
use cadence_core::PrState;
use std::collections::BTreeMap;
use time::{Duration, OffsetDateTime};

/// Longest delay before a closed PR is closed.
const MAX_CLOSE_DELAY: Duration = Duration::days(14);
/// Shortest delay before a merged PR is merged.
const MIN_MERGE_HOURS: f64 = 1.0;
/// Longest merge delay; lognormal tails beyond this are cut off.
const MAX_MERGE_HOURS: f64 = 24.0 * 365.0;

/// Terminal state and timestamps assigned to a finalized PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    pub state: PrState,
    pub created_at: OffsetDateTime,
    pub merged_at: Option<OffsetDateTime>,
    pub closed_at: Option<OffsetDateTime>,
}

/// Fixed weighted-choice state policy with a lognormal merge delay.
#[derive(Debug, Clone)]
pub struct LifecyclePolicy {
    weights: BTreeMap<PrState, f64>,
    review_lead_time: DurationParams,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self::from_seed(&PrLifecycle::default())
    }
}

impl LifecyclePolicy {
    pub fn from_seed(lifecycle: &PrLifecycle) -> Self {
        let w = lifecycle.state_weights;
        Self {
            weights: BTreeMap::from([
                (PrState::Merged, w.merged),
                (PrState::Closed, w.closed),
                (PrState::Open, w.open),
            ]),
            review_lead_time: lifecycle.review_lead_time,
        }
    }

    /// Draw order: state, creation offset, then the merge or close delay.
    pub fn assign(&self, first_commit_at: OffsetDateTime, rng: &mut SimRng) -> Lifecycle {
        let state = rng
            .weighted_choice(&self.weights)
            .copied()
            .unwrap_or(PrState::Merged);
        let created_at = first_commit_at - Duration::minutes(i64::from(rng.below(60)));

        let mut lifecycle = Lifecycle {
            state,
            created_at,
            merged_at: None,
            closed_at: None,
        };
        match state {
            PrState::Merged => {
                let drawn = rng.lognormal_hours(
                    self.review_lead_time.mean_hours,
                    self.review_lead_time.std_hours,
                );
                let hours = if drawn.is_finite() {
                    drawn.clamp(MIN_MERGE_HOURS, MAX_MERGE_HOURS)
                } else {
                    MAX_MERGE_HOURS
                };
                let delay = Duration::seconds_f64(hours * 3600.0);
                lifecycle.merged_at = Some(created_at.saturating_add(delay));
            }
            PrState::Closed => {
                let max_minutes = MAX_CLOSE_DELAY.whole_minutes() as u32;
                let minutes = rng.between(1, max_minutes);
                lifecycle.closed_at = Some(created_at + Duration::minutes(i64::from(minutes)));
            }
            PrState::Open => {}
        }
        lifecycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::seed::StateWeights;
    use time::macros::datetime;

    const FIRST: OffsetDateTime = datetime!(2026-02-02 09:30 UTC);

    #[test]
    fn timestamps_match_state() {
        let policy = LifecyclePolicy::default();
        let mut rng = SimRng::seeded(17);
        for _ in 0..500 {
            let l = policy.assign(FIRST, &mut rng);
            assert!(l.created_at <= FIRST);
            assert!(FIRST - l.created_at < Duration::hours(1));
            match l.state {
                PrState::Merged => {
                    let merged = l.merged_at.unwrap();
                    assert!(merged - l.created_at >= Duration::hours(1));
                    assert!(l.closed_at.is_none());
                }
                PrState::Closed => {
                    let closed = l.closed_at.unwrap();
                    assert!(closed - l.created_at <= MAX_CLOSE_DELAY);
                    assert!(l.merged_at.is_none());
                }
                PrState::Open => {
                    assert!(l.merged_at.is_none() && l.closed_at.is_none());
                }
            }
        }
    }

    #[test]
    fn state_distribution_follows_weights() {
        let policy = LifecyclePolicy::default();
        let mut rng = SimRng::seeded(23);
        let n = 10_000;
        let mut counts: BTreeMap<PrState, usize> = BTreeMap::new();
        for _ in 0..n {
            *counts.entry(policy.assign(FIRST, &mut rng).state).or_default() += 1;
        }
        let share = |s| counts.get(&s).copied().unwrap_or(0) as f64 / n as f64;
        assert!((share(PrState::Merged) - 0.85).abs() < 0.02);
        assert!((share(PrState::Closed) - 0.10).abs() < 0.02);
        assert!((share(PrState::Open) - 0.05).abs() < 0.02);
    }

    #[test]
    fn oversized_lead_time_is_clamped() {
        let lifecycle = PrLifecycle {
            state_weights: StateWeights {
                merged: 1.0,
                closed: 0.0,
                open: 0.0,
            },
            review_lead_time: DurationParams {
                mean_hours: 1e9,
                std_hours: 4.0,
            },
            ..PrLifecycle::default()
        };
        let policy = LifecyclePolicy::from_seed(&lifecycle);
        let mut rng = SimRng::seeded(9);
        for _ in 0..100 {
            let l = policy.assign(FIRST, &mut rng);
            let delay = l.merged_at.unwrap() - l.created_at;
            assert!(delay >= Duration::hours(1));
            assert!(delay <= Duration::days(365));
        }
    }

    #[test]
    fn non_finite_lead_time_does_not_panic() {
        let lifecycle = PrLifecycle {
            state_weights: StateWeights {
                merged: 1.0,
                closed: 0.0,
                open: 0.0,
            },
            review_lead_time: DurationParams {
                mean_hours: f64::INFINITY,
                std_hours: f64::NAN,
            },
            ..PrLifecycle::default()
        };
        let policy = LifecyclePolicy::from_seed(&lifecycle);
        let l = policy.assign(FIRST, &mut SimRng::seeded(2));
        assert!(l.merged_at.unwrap() > l.created_at);
    }

    #[test]
    fn configured_weights_override_default() {
        let lifecycle = PrLifecycle {
            state_weights: StateWeights {
                merged: 0.0,
                closed: 0.0,
                open: 1.0,
            },
            ..PrLifecycle::default()
        };
        let policy = LifecyclePolicy::from_seed(&lifecycle);
        let mut rng = SimRng::seeded(1);
        for _ in 0..50 {
            assert_eq!(policy.assign(FIRST, &mut rng).state, PrState::Open);
        }
    }
}
