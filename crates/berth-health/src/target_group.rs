//! Target group — the set of targets behind the load balancer.
//!
//! Each registered target carries its own [`HealthEvaluator`]. Only
//! healthy targets that are not draining receive traffic. An unhealthy
//! target stays registered and keeps being probed; it is readmitted once it
//! passes `healthy_threshold` probes in a row. A deregistered target drains
//! and is removed by [`TargetGroup::reap`] once the deregistration delay has
//! passed.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use berth_core::HealthCheckPolicy;

use crate::error::{HealthError, HealthResult};
use crate::evaluator::{HealthEvaluator, HealthState, ProbeResult};

/// A state change produced by recording a probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub target: String,
    pub from: HealthState,
    pub to: HealthState,
    /// Whether the target receives traffic after the change.
    pub eligible: bool,
}

/// Point-in-time view of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatus {
    pub target: String,
    pub state: HealthState,
    pub eligible: bool,
    pub draining: bool,
    pub consecutive_passes: u32,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
struct TargetEntry {
    evaluator: HealthEvaluator,
    drain_deadline: Option<Instant>,
}

impl TargetEntry {
    fn is_eligible(&self) -> bool {
        self.drain_deadline.is_none() && self.evaluator.state() == HealthState::Healthy
    }
}

/// Registered targets and their eligibility.
#[derive(Debug)]
pub struct TargetGroup {
    policy: HealthCheckPolicy,
    targets: BTreeMap<String, TargetEntry>,
    counter: AtomicUsize,
}

impl TargetGroup {
    pub fn new(policy: HealthCheckPolicy) -> Self {
        Self {
            policy,
            targets: BTreeMap::new(),
            counter: AtomicUsize::new(0),
        }
    }

    pub fn policy(&self) -> &HealthCheckPolicy {
        &self.policy
    }

    /// Register a target in the `UNKNOWN` state.
    pub fn register(&mut self, target: &str) -> HealthResult<()> {
        if self.targets.contains_key(target) {
            return Err(HealthError::AlreadyRegistered(target.to_string()));
        }
        self.targets.insert(
            target.to_string(),
            TargetEntry {
                evaluator: HealthEvaluator::new(&self.policy),
                drain_deadline: None,
            },
        );
        info!(endpoint = target, "target registered");
        Ok(())
    }

    /// Record a probe result for a target.
    ///
    /// Returns the state change, if any. Health transitions only change
    /// eligibility; removal happens through [`TargetGroup::deregister`].
    pub fn record(
        &mut self,
        target: &str,
        result: ProbeResult,
    ) -> HealthResult<Option<StateChange>> {
        let entry = self
            .targets
            .get_mut(target)
            .ok_or_else(|| HealthError::UnknownTarget(target.to_string()))?;

        let from = entry.evaluator.state();
        let to = entry.evaluator.record(result);
        if from == to {
            return Ok(None);
        }

        let eligible = entry.is_eligible();
        match to {
            HealthState::Unhealthy => {
                warn!(endpoint = target, "target unhealthy, withheld from traffic")
            }
            HealthState::Healthy if eligible => {
                info!(endpoint = target, "target healthy, receiving traffic")
            }
            _ => debug!(endpoint = target, draining = !eligible, "target state changed"),
        }

        Ok(Some(StateChange {
            target: target.to_string(),
            from,
            to,
            eligible,
        }))
    }

    /// Stop sending traffic to a target and schedule its removal.
    ///
    /// Returns the drain deadline. Deregistering a draining target keeps
    /// its original deadline.
    pub fn deregister(&mut self, target: &str, now: Instant) -> HealthResult<Instant> {
        let delay = self.policy.deregistration_delay();
        let entry = self
            .targets
            .get_mut(target)
            .ok_or_else(|| HealthError::UnknownTarget(target.to_string()))?;
        let deadline = *entry.drain_deadline.get_or_insert(now + delay);
        info!(endpoint = target, delay = ?delay, "target deregistered, draining");
        Ok(deadline)
    }

    /// Remove targets whose drain deadline has passed.
    pub fn reap(&mut self, now: Instant) -> Vec<String> {
        let expired: Vec<String> = self
            .targets
            .iter()
            .filter(|(_, e)| e.drain_deadline.is_some_and(|d| d <= now))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.targets.remove(id);
            debug!(endpoint = %id, "drained target removed");
        }
        expired
    }

    /// Drop a target without draining.
    pub fn remove(&mut self, target: &str) -> bool {
        let removed = self.targets.remove(target).is_some();
        if removed {
            debug!(endpoint = target, "target removed");
        }
        removed
    }

    pub fn state(&self, target: &str) -> Option<HealthState> {
        self.targets.get(target).map(|e| e.evaluator.state())
    }

    pub fn drain_deadline(&self, target: &str) -> Option<Instant> {
        self.targets.get(target).and_then(|e| e.drain_deadline)
    }

    pub fn is_eligible(&self, target: &str) -> bool {
        self.targets.get(target).is_some_and(TargetEntry::is_eligible)
    }

    /// Targets currently receiving traffic, in name order.
    pub fn eligible(&self) -> Vec<String> {
        self.targets
            .iter()
            .filter(|(_, e)| e.is_eligible())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Select the next eligible target (round-robin).
    pub fn next_target(&self) -> Option<String> {
        let eligible = self.eligible();
        if eligible.is_empty() {
            return None;
        }
        let idx = self.counter.fetch_add(1, Ordering::Relaxed) % eligible.len();
        eligible.into_iter().nth(idx)
    }

    pub fn snapshot(&self) -> Vec<TargetStatus> {
        self.targets
            .iter()
            .map(|(id, e)| TargetStatus {
                target: id.clone(),
                state: e.evaluator.state(),
                eligible: e.is_eligible(),
                draining: e.drain_deadline.is_some(),
                consecutive_passes: e.evaluator.consecutive_passes(),
                consecutive_failures: e.evaluator.consecutive_failures(),
            })
            .collect()
    }

    pub fn contains(&self, target: &str) -> bool {
        self.targets.contains_key(target)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use berth_core::HealthCheckSettings;

    fn group(healthy: u32, unhealthy: u32, delay_secs: u64) -> TargetGroup {
        TargetGroup::new(
            HealthCheckPolicy::new(HealthCheckSettings {
                healthy_threshold: healthy,
                unhealthy_threshold: unhealthy,
                deregistration_delay: Duration::from_secs(delay_secs),
                ..HealthCheckSettings::default()
            })
            .unwrap(),
        )
    }

    #[test]
    fn registered_target_is_not_eligible_until_healthy() {
        let mut tg = group(2, 3, 30);
        tg.register("10.0.1.5:32768").unwrap();
        assert!(!tg.is_eligible("10.0.1.5:32768"));

        assert_eq!(tg.record("10.0.1.5:32768", ProbeResult::Pass).unwrap(), None);
        let change = tg
            .record("10.0.1.5:32768", ProbeResult::Pass)
            .unwrap()
            .unwrap();
        assert_eq!(change.from, HealthState::Unknown);
        assert_eq!(change.to, HealthState::Healthy);
        assert!(change.eligible);
        assert!(tg.is_eligible("10.0.1.5:32768"));
    }

    #[test]
    fn duplicate_registration_fails() {
        let mut tg = group(1, 1, 0);
        tg.register("a:1").unwrap();
        assert_eq!(
            tg.register("a:1").unwrap_err(),
            HealthError::AlreadyRegistered("a:1".to_string())
        );
    }

    #[test]
    fn unknown_target_errors() {
        let mut tg = group(1, 1, 0);
        let now = Instant::now();
        assert!(matches!(
            tg.record("nope:1", ProbeResult::Pass),
            Err(HealthError::UnknownTarget(_))
        ));
        assert!(matches!(
            tg.deregister("nope:1", now),
            Err(HealthError::UnknownTarget(_))
        ));
    }

    #[test]
    fn unhealthy_target_is_withheld_but_kept() {
        let mut tg = group(1, 2, 30);
        let t0 = Instant::now();
        tg.register("a:1").unwrap();
        tg.record("a:1", ProbeResult::Pass).unwrap();
        assert!(tg.is_eligible("a:1"));

        tg.record("a:1", ProbeResult::Fail).unwrap();
        assert!(tg.is_eligible("a:1"));
        let change = tg.record("a:1", ProbeResult::Fail).unwrap().unwrap();
        assert_eq!(change.to, HealthState::Unhealthy);
        assert!(!change.eligible);
        assert!(!tg.is_eligible("a:1"));
        assert_eq!(tg.drain_deadline("a:1"), None);

        assert!(tg.reap(t0 + Duration::from_secs(3600)).is_empty());
        assert!(tg.contains("a:1"));
    }

    #[test]
    fn recovered_target_is_readmitted() {
        let mut tg = group(2, 1, 30);
        let t0 = Instant::now();
        tg.register("a:1").unwrap();
        for result in [ProbeResult::Pass, ProbeResult::Pass, ProbeResult::Fail] {
            tg.record("a:1", result).unwrap();
        }
        assert_eq!(tg.state("a:1"), Some(HealthState::Unhealthy));
        assert_eq!(tg.next_target(), None);

        assert_eq!(tg.record("a:1", ProbeResult::Pass).unwrap(), None);
        assert!(!tg.is_eligible("a:1"));
        let change = tg.record("a:1", ProbeResult::Pass).unwrap().unwrap();
        assert_eq!(change.from, HealthState::Unhealthy);
        assert_eq!(change.to, HealthState::Healthy);
        assert!(change.eligible);

        assert!(tg.reap(t0 + Duration::from_secs(30)).is_empty());
        assert_eq!(tg.next_target().as_deref(), Some("a:1"));
    }

    #[test]
    fn deregistered_target_stays_out_of_rotation() {
        let mut tg = group(1, 1, 30);
        let t0 = Instant::now();
        tg.register("a:1").unwrap();
        tg.deregister("a:1", t0).unwrap();

        let change = tg.record("a:1", ProbeResult::Pass).unwrap().unwrap();
        assert_eq!(change.to, HealthState::Healthy);
        assert!(!change.eligible);
        assert!(!tg.is_eligible("a:1"));
        assert_eq!(tg.reap(t0 + Duration::from_secs(30)), vec!["a:1".to_string()]);
    }

    #[test]
    fn deregister_keeps_first_deadline() {
        let mut tg = group(1, 1, 10);
        let t0 = Instant::now();
        tg.register("a:1").unwrap();
        tg.record("a:1", ProbeResult::Pass).unwrap();

        let first = tg.deregister("a:1", t0).unwrap();
        let second = tg.deregister("a:1", t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, t0 + Duration::from_secs(10));
        assert!(tg.eligible().is_empty());
    }

    #[test]
    fn zero_delay_reaps_immediately() {
        let mut tg = group(1, 1, 0);
        let t0 = Instant::now();
        tg.register("a:1").unwrap();
        tg.deregister("a:1", t0).unwrap();
        assert_eq!(tg.reap(t0), vec!["a:1".to_string()]);
    }

    #[test]
    fn round_robin_over_eligible_targets() {
        let mut tg = group(1, 1, 30);
        for id in ["a:1", "b:1", "c:1"] {
            tg.register(id).unwrap();
        }
        tg.record("a:1", ProbeResult::Pass).unwrap();
        tg.record("c:1", ProbeResult::Pass).unwrap();

        let picks: Vec<String> = (0..4).filter_map(|_| tg.next_target()).collect();
        assert_eq!(picks, vec!["a:1", "c:1", "a:1", "c:1"]);
    }

    #[test]
    fn no_eligible_targets() {
        let mut tg = group(2, 1, 30);
        tg.register("a:1").unwrap();
        assert_eq!(tg.next_target(), None);
    }

    #[test]
    fn snapshot_reports_counts() {
        let mut tg = group(3, 3, 30);
        tg.register("a:1").unwrap();
        tg.record("a:1", ProbeResult::Pass).unwrap();
        tg.record("a:1", ProbeResult::Pass).unwrap();

        let snap = tg.snapshot();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap[0].state, HealthState::Unknown);
        assert_eq!(snap[0].consecutive_passes, 2);
        assert!(!snap[0].eligible);
        assert!(!snap[0].draining);
    }
}
