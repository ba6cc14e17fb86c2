//! berth-health — target health evaluation behind the load balancer.
//!
//! # Architecture
//!
//! ```text
//! TargetMonitor
//!   ├── Per-target probe task
//!   │   ├── http_probe() → ProbeResult
//!   │   └── TargetGroup::record() → StateChange
//!   ├── TargetGroup (shared)
//!   │   ├── HealthEvaluator per target (UNKNOWN / HEALTHY / UNHEALTHY)
//!   │   ├── unhealthy targets withheld, readmitted on recovery
//!   │   ├── deregistered targets drained over the deregistration delay
//!   │   └── round-robin over eligible targets
//!   └── Optional StateCallback
//! ```
//!
//! The evaluator and target group are synchronous. Drain deadlines take the
//! current time as an argument, so the group can be driven by a live monitor
//! or by a replayed sequence of probe results.

pub mod error;
pub mod evaluator;
pub mod monitor;
pub mod probe;
pub mod target_group;

pub use error::{HealthError, HealthResult};
pub use evaluator::{HealthEvaluator, HealthState, ProbeResult};
pub use monitor::{StateCallback, TargetMonitor};
pub use probe::http_probe;
pub use target_group::{StateChange, TargetGroup, TargetStatus};
