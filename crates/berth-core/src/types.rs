//! Validated topology types.
//!
//! These are produced by [`TopologyDescriptor::from_config`](crate::TopologyDescriptor::from_config)
//! and are never mutated afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::Ipv4Cidr;

// ── Network ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub cidr: Ipv4Cidr,
    /// Number of availability zones to spread subnets across.
    pub max_azs: u8,
}

// ── Cluster ───────────────────────────────────────────────────────

/// EC2 capacity backing the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSpec {
    pub instance_type: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Desired number of running service tasks.
    pub desired_count: u32,
}

// ── Container ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    /// Port the application listens on inside the container.
    pub port: u16,
    pub memory_limit_mib: u32,
    pub cpu: u32,
    /// Host ports the bridge network may map the container port onto.
    pub host_port_range: PortRange,
    /// Plain environment variables, ordered by name.
    pub env: BTreeMap<String, String>,
}

/// Inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    pub start: u16,
    pub end: u16,
}

impl PortRange {
    /// The ephemeral range used for dynamic host port mapping.
    pub const EPHEMERAL: PortRange = PortRange {
        start: 32768,
        end: 65535,
    };

    /// A range whose start lies past its end holds no ports.
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

// ── Listener ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    /// Public port the load balancer listens on.
    pub fn port(self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    pub protocol: Protocol,
    /// Certificate reference, required for HTTPS.
    pub certificate: Option<String>,
    /// Also listen on 80 and redirect to 443.
    pub redirect_http: bool,
}

// ── Secrets ───────────────────────────────────────────────────────

/// Names of secret-backed environment variables.
///
/// Only key names are carried; values are resolved from `source` when the
/// container starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRefSet {
    pub source: String,
    pub keys: Vec<String>,
}

impl SecretRefSet {
    /// Reference string for one key, e.g. `webapp/production:DATABASE_URL`.
    pub fn reference(&self, key: &str) -> String {
        format!("{}:{key}", self.source)
    }
}

// ── Logging ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSpec {
    pub group: String,
    pub retention_days: u32,
    pub stream_prefix: String,
}
