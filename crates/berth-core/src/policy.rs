//! Health check policy: probe path, cadence, thresholds, and drain delay.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{TopologyError, TopologyResult};

/// Upper bound accepted for the deregistration delay.
pub const MAX_DEREGISTRATION_DELAY: Duration = Duration::from_secs(3600);

/// Upper bound accepted for the probe interval.
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Raw health check parameters before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckSettings {
    pub path: String,
    pub interval: Duration,
    pub timeout: Duration,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub deregistration_delay: Duration,
    pub success_codes: SuccessCodes,
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self {
            path: "/".to_string(),
            interval: Duration::from_secs(120),
            timeout: Duration::from_secs(60),
            healthy_threshold: 2,
            unhealthy_threshold: 10,
            deregistration_delay: Duration::from_secs(30),
            success_codes: SuccessCodes::ok(),
        }
    }
}

/// A validated health check policy.
///
/// Invariants: `timeout < interval <= MAX_INTERVAL`, both non-zero, both
/// thresholds at least 1, and the path is absolute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthCheckPolicy {
    path: String,
    interval: Duration,
    timeout: Duration,
    healthy_threshold: u32,
    unhealthy_threshold: u32,
    deregistration_delay: Duration,
    success_codes: SuccessCodes,
}

impl HealthCheckPolicy {
    /// Validate settings into a policy, failing with `InvalidPolicy`.
    pub fn new(settings: HealthCheckSettings) -> TopologyResult<Self> {
        let HealthCheckSettings {
            path,
            interval,
            timeout,
            healthy_threshold,
            unhealthy_threshold,
            deregistration_delay,
            success_codes,
        } = settings;

        if !path.starts_with('/') {
            return Err(TopologyError::InvalidPolicy(format!(
                "path {path:?} must start with '/'"
            )));
        }
        if interval.is_zero() || timeout.is_zero() {
            return Err(TopologyError::InvalidPolicy(
                "interval and timeout must be non-zero".to_string(),
            ));
        }
        if interval > MAX_INTERVAL {
            return Err(TopologyError::InvalidPolicy(format!(
                "interval ({interval:?}) exceeds {MAX_INTERVAL:?}"
            )));
        }
        if timeout >= interval {
            return Err(TopologyError::InvalidPolicy(format!(
                "timeout ({timeout:?}) must be shorter than interval ({interval:?})"
            )));
        }
        if healthy_threshold < 1 {
            return Err(TopologyError::InvalidPolicy(
                "healthy threshold must be at least 1".to_string(),
            ));
        }
        if unhealthy_threshold < 1 {
            return Err(TopologyError::InvalidPolicy(
                "unhealthy threshold must be at least 1".to_string(),
            ));
        }
        if deregistration_delay > MAX_DEREGISTRATION_DELAY {
            return Err(TopologyError::InvalidPolicy(format!(
                "deregistration delay ({deregistration_delay:?}) exceeds {MAX_DEREGISTRATION_DELAY:?}"
            )));
        }

        Ok(Self {
            path,
            interval,
            timeout,
            healthy_threshold,
            unhealthy_threshold,
            deregistration_delay,
            success_codes,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Consecutive passes needed to become healthy.
    pub fn healthy_threshold(&self) -> u32 {
        self.healthy_threshold
    }

    /// Consecutive failures needed to become unhealthy.
    pub fn unhealthy_threshold(&self) -> u32 {
        self.unhealthy_threshold
    }

    pub fn deregistration_delay(&self) -> Duration {
        self.deregistration_delay
    }

    pub fn success_codes(&self) -> &SuccessCodes {
        &self.success_codes
    }
}

impl Default for HealthCheckPolicy {
    fn default() -> Self {
        let s = HealthCheckSettings::default();
        Self {
            path: s.path,
            interval: s.interval,
            timeout: s.timeout,
            healthy_threshold: s.healthy_threshold,
            unhealthy_threshold: s.unhealthy_threshold,
            deregistration_delay: s.deregistration_delay,
            success_codes: s.success_codes,
        }
    }
}

/// HTTP status matcher: "200", "200,204", or "200-299".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SuccessCodes {
    ranges: Vec<(u16, u16)>,
}

impl SuccessCodes {
    /// Matches only 200.
    pub fn ok() -> Self {
        Self {
            ranges: vec![(200, 200)],
        }
    }

    pub fn parse(s: &str) -> TopologyResult<Self> {
        let mut ranges = Vec::new();
        for part in s.split(',').map(str::trim) {
            let (lo, hi) = match part.split_once('-') {
                Some((lo, hi)) => (parse_status(lo)?, parse_status(hi)?),
                None => {
                    let code = parse_status(part)?;
                    (code, code)
                }
            };
            if lo > hi {
                return Err(TopologyError::InvalidPolicy(format!(
                    "success code range {part:?} is reversed"
                )));
            }
            ranges.push((lo, hi));
        }
        Ok(Self { ranges })
    }

    pub fn matches(&self, status: u16) -> bool {
        self.ranges.iter().any(|&(lo, hi)| (lo..=hi).contains(&status))
    }
}

fn parse_status(s: &str) -> TopologyResult<u16> {
    let code: u16 = s
        .trim()
        .parse()
        .map_err(|_| TopologyError::InvalidPolicy(format!("invalid success code {s:?}")))?;
    if !(100..=599).contains(&code) {
        return Err(TopologyError::InvalidPolicy(format!(
            "success code {code} outside 100-599"
        )));
    }
    Ok(code)
}

impl fmt::Display for SuccessCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (lo, hi)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if lo == hi {
                write!(f, "{lo}")?;
            } else {
                write!(f, "{lo}-{hi}")?;
            }
        }
        Ok(())
    }
}

impl TryFrom<String> for SuccessCodes {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SuccessCodes> for String {
    fn from(value: SuccessCodes) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(interval: u64, timeout: u64) -> HealthCheckSettings {
        HealthCheckSettings {
            interval: Duration::from_secs(interval),
            timeout: Duration::from_secs(timeout),
            ..HealthCheckSettings::default()
        }
    }

    #[test]
    fn default_settings_are_valid() {
        let policy = HealthCheckPolicy::new(HealthCheckSettings::default()).unwrap();
        assert_eq!(policy, HealthCheckPolicy::default());
        assert_eq!(policy.interval(), Duration::from_secs(120));
        assert_eq!(policy.timeout(), Duration::from_secs(60));
        assert_eq!(policy.healthy_threshold(), 2);
        assert_eq!(policy.unhealthy_threshold(), 10);
    }

    #[test]
    fn timeout_not_below_interval_is_rejected() {
        for (interval, timeout) in [(30, 30), (30, 31), (5, 60), (1, 1)] {
            let err = HealthCheckPolicy::new(settings(interval, timeout)).unwrap_err();
            assert!(
                matches!(err, TopologyError::InvalidPolicy(_)),
                "interval={interval} timeout={timeout}"
            );
        }
    }

    #[test]
    fn timeout_below_interval_is_accepted() {
        assert!(HealthCheckPolicy::new(settings(30, 29)).is_ok());
        assert!(HealthCheckPolicy::new(settings(2, 1)).is_ok());
    }

    #[test]
    fn zero_thresholds_are_rejected() {
        let mut s = HealthCheckSettings::default();
        s.unhealthy_threshold = 0;
        assert!(matches!(
            HealthCheckPolicy::new(s).unwrap_err(),
            TopologyError::InvalidPolicy(_)
        ));

        let mut s = HealthCheckSettings::default();
        s.healthy_threshold = 0;
        assert!(matches!(
            HealthCheckPolicy::new(s).unwrap_err(),
            TopologyError::InvalidPolicy(_)
        ));
    }

    #[test]
    fn relative_path_is_rejected() {
        let mut s = HealthCheckSettings::default();
        s.path = "healthz".to_string();
        assert!(HealthCheckPolicy::new(s).is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(HealthCheckPolicy::new(settings(10, 0)).is_err());
    }

    #[test]
    fn oversized_deregistration_delay_is_rejected() {
        let mut s = HealthCheckSettings::default();
        s.deregistration_delay = Duration::from_secs(3601);
        assert!(HealthCheckPolicy::new(s).is_err());
    }

    #[test]
    fn oversized_interval_is_rejected() {
        assert!(HealthCheckPolicy::new(settings(3600, 1)).is_ok());
        let err = HealthCheckPolicy::new(settings(u64::MAX / 2, 1)).unwrap_err();
        assert!(matches!(err, TopologyError::InvalidPolicy(_)));
    }

    #[test]
    fn success_codes_single() {
        let codes = SuccessCodes::parse("200").unwrap();
        assert!(codes.matches(200));
        assert!(!codes.matches(204));
    }

    #[test]
    fn success_codes_list_and_range() {
        let codes = SuccessCodes::parse("200-299, 302").unwrap();
        assert!(codes.matches(204));
        assert!(codes.matches(302));
        assert!(!codes.matches(301));
        assert_eq!(codes.to_string(), "200-299,302");
    }

    #[test]
    fn success_codes_reject_bad_input() {
        assert!(SuccessCodes::parse("abc").is_err());
        assert!(SuccessCodes::parse("299-200").is_err());
        assert!(SuccessCodes::parse("600").is_err());
        assert!(SuccessCodes::parse("").is_err());
    }
}
