//! berth-core — topology descriptor, validation, and plan rendering.
//!
//! A topology file (`berth.toml`) is parsed into a [`TopologyConfig`],
//! validated into an immutable [`TopologyDescriptor`], and rendered into
//! a [`DeploymentPlan`] for an external provisioning engine.

pub mod config;
pub mod descriptor;
pub mod duration;
pub mod error;
pub mod network;
pub mod plan;
pub mod policy;
pub mod report;
pub mod types;

pub use config::TopologyConfig;
pub use duration::{format_duration, parse_duration};
pub use descriptor::TopologyDescriptor;
pub use error::{TopologyError, TopologyResult};
pub use network::Ipv4Cidr;
pub use plan::DeploymentPlan;
pub use policy::{HealthCheckPolicy, HealthCheckSettings, SuccessCodes};
pub use types::*;
