//! Target eligibility state machine.
//!
//! ```text
//! UNKNOWN   ── N passes ──▶ HEALTHY
//! UNKNOWN   ── M failures ─▶ UNHEALTHY
//! HEALTHY   ── M failures ─▶ UNHEALTHY
//! UNHEALTHY ── N passes ──▶ HEALTHY
//! ```
//!
//! N is the healthy threshold and M the unhealthy threshold of the
//! [`HealthCheckPolicy`]. Any result of the opposite kind resets the
//! running count. There is no terminal state.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use berth_core::HealthCheckPolicy;

/// Eligibility state of a single target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthState {
    pub fn label(self) -> &'static str {
        match self {
            HealthState::Unknown => "UNKNOWN",
            HealthState::Healthy => "HEALTHY",
            HealthState::Unhealthy => "UNHEALTHY",
        }
    }
}

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeResult {
    /// The endpoint answered with a matching status code.
    Pass,
    /// The endpoint answered with a non-matching status code.
    Fail,
    /// The probe could not complete (connection error or timeout).
    Error,
}

impl ProbeResult {
    pub fn is_pass(self) -> bool {
        self == ProbeResult::Pass
    }
}

/// Tracks consecutive probe results for one target.
#[derive(Debug, Clone)]
pub struct HealthEvaluator {
    state: HealthState,
    consecutive_passes: u32,
    consecutive_failures: u32,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
}

impl HealthEvaluator {
    pub fn new(policy: &HealthCheckPolicy) -> Self {
        Self {
            state: HealthState::Unknown,
            consecutive_passes: 0,
            consecutive_failures: 0,
            healthy_threshold: policy.healthy_threshold(),
            unhealthy_threshold: policy.unhealthy_threshold(),
        }
    }

    /// Record a probe result and return the resulting state.
    pub fn record(&mut self, result: ProbeResult) -> HealthState {
        if result.is_pass() {
            self.consecutive_failures = 0;
            self.consecutive_passes = self.consecutive_passes.saturating_add(1);

            if self.consecutive_passes >= self.healthy_threshold
                && self.state != HealthState::Healthy
            {
                debug!(
                    passes = self.consecutive_passes,
                    from = self.state.label(),
                    "target became healthy"
                );
                self.state = HealthState::Healthy;
            }
        } else {
            self.consecutive_passes = 0;
            self.consecutive_failures = self.consecutive_failures.saturating_add(1);

            if self.consecutive_failures >= self.unhealthy_threshold
                && self.state != HealthState::Unhealthy
            {
                warn!(
                    failures = self.consecutive_failures,
                    threshold = self.unhealthy_threshold,
                    from = self.state.label(),
                    "target became unhealthy"
                );
                self.state = HealthState::Unhealthy;
            }
        }

        self.state
    }

    pub fn state(&self) -> HealthState {
        self.state
    }

    pub fn consecutive_passes(&self) -> u32 {
        self.consecutive_passes
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use berth_core::HealthCheckSettings;

    fn policy(healthy: u32, unhealthy: u32) -> HealthCheckPolicy {
        HealthCheckPolicy::new(HealthCheckSettings {
            healthy_threshold: healthy,
            unhealthy_threshold: unhealthy,
            ..HealthCheckSettings::default()
        })
        .unwrap()
    }

    /// Number of identical results needed to leave the current state.
    fn steps_until(eval: &mut HealthEvaluator, result: ProbeResult, target: HealthState) -> u32 {
        let mut n = 0;
        while eval.state() != target {
            eval.record(result);
            n += 1;
            assert!(n <= 1000, "never reached {target:?}");
        }
        n
    }

    #[test]
    fn starts_unknown() {
        let eval = HealthEvaluator::new(&policy(2, 10));
        assert_eq!(eval.state(), HealthState::Unknown);
        assert_eq!(eval.consecutive_passes(), 0);
        assert_eq!(eval.consecutive_failures(), 0);
    }

    #[test]
    fn healthy_after_exactly_threshold_passes() {
        for threshold in 1..=6 {
            let mut eval = HealthEvaluator::new(&policy(threshold, 3));
            let steps = steps_until(&mut eval, ProbeResult::Pass, HealthState::Healthy);
            assert_eq!(steps, threshold);
        }
    }

    #[test]
    fn unhealthy_after_exactly_threshold_failures_from_healthy() {
        for threshold in 1..=12 {
            let mut eval = HealthEvaluator::new(&policy(1, threshold));
            eval.record(ProbeResult::Pass);
            assert_eq!(eval.state(), HealthState::Healthy);
            let steps = steps_until(&mut eval, ProbeResult::Fail, HealthState::Unhealthy);
            assert_eq!(steps, threshold);
        }
    }

    #[test]
    fn default_policy_example() {
        // 120s interval, 60s timeout, 2 passes to healthy, 10 failures to unhealthy.
        let policy = HealthCheckPolicy::default();
        assert_eq!(policy.interval(), Duration::from_secs(120));
        let mut eval = HealthEvaluator::new(&policy);

        assert_eq!(eval.record(ProbeResult::Pass), HealthState::Unknown);
        assert_eq!(eval.record(ProbeResult::Pass), HealthState::Healthy);

        for _ in 0..9 {
            assert_eq!(eval.record(ProbeResult::Fail), HealthState::Healthy);
        }
        assert_eq!(eval.record(ProbeResult::Fail), HealthState::Unhealthy);
    }

    #[test]
    fn interrupted_streak_starts_over() {
        let mut eval = HealthEvaluator::new(&policy(3, 3));
        eval.record(ProbeResult::Pass);
        eval.record(ProbeResult::Pass);
        eval.record(ProbeResult::Error);
        assert_eq!(eval.consecutive_passes(), 0);
        assert_eq!(eval.consecutive_failures(), 1);

        eval.record(ProbeResult::Pass);
        eval.record(ProbeResult::Pass);
        assert_eq!(eval.state(), HealthState::Unknown);
        eval.record(ProbeResult::Pass);
        assert_eq!(eval.state(), HealthState::Healthy);
    }

    #[test]
    fn unknown_goes_unhealthy_after_threshold_failures() {
        let mut eval = HealthEvaluator::new(&policy(2, 3));
        eval.record(ProbeResult::Fail);
        eval.record(ProbeResult::Error);
        assert_eq!(eval.state(), HealthState::Unknown);
        assert_eq!(eval.record(ProbeResult::Fail), HealthState::Unhealthy);
    }

    #[test]
    fn recovers_after_threshold_passes() {
        let mut eval = HealthEvaluator::new(&policy(2, 1));
        eval.record(ProbeResult::Fail);
        assert_eq!(eval.state(), HealthState::Unhealthy);

        assert_eq!(eval.record(ProbeResult::Pass), HealthState::Unhealthy);
        assert_eq!(eval.record(ProbeResult::Pass), HealthState::Healthy);
    }

    #[test]
    fn error_counts_as_failure() {
        let mut eval = HealthEvaluator::new(&policy(1, 2));
        eval.record(ProbeResult::Pass);
        eval.record(ProbeResult::Error);
        eval.record(ProbeResult::Error);
        assert_eq!(eval.state(), HealthState::Unhealthy);
    }

    #[test]
    fn further_results_keep_state() {
        let mut eval = HealthEvaluator::new(&policy(1, 1));
        eval.record(ProbeResult::Pass);
        for _ in 0..5 {
            assert_eq!(eval.record(ProbeResult::Pass), HealthState::Healthy);
        }
        assert_eq!(eval.consecutive_passes(), 6);
    }
}
