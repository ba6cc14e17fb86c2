//! Target monitor — background probing for every registered target.
//!
//! `TargetMonitor` owns a shared [`TargetGroup`] and spawns one task per
//! target. Each task probes on the policy interval and records results for
//! as long as the target is registered, so an unhealthy target is readmitted
//! once it recovers. After deregistration the task waits out the
//! deregistration delay and removes the target.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use berth_core::HealthCheckPolicy;

use crate::error::{HealthError, HealthResult};
use crate::probe::http_probe;
use crate::target_group::{StateChange, TargetGroup};

/// Callback invoked when a target changes state.
pub type StateCallback = Arc<dyn Fn(StateChange) -> BoxFuture + Send + Sync>;

pub type BoxFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Per-target task state.
struct MonitorSlot {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    /// Wakes the loop early, e.g. after deregistration.
    wake: Arc<Notify>,
}

/// Probes every registered target and keeps the target group current.
pub struct TargetMonitor {
    group: Arc<RwLock<TargetGroup>>,
    monitors: Arc<RwLock<HashMap<String, MonitorSlot>>>,
    on_change: Option<StateCallback>,
}

impl TargetMonitor {
    pub fn new(policy: HealthCheckPolicy) -> Self {
        Self {
            group: Arc::new(RwLock::new(TargetGroup::new(policy))),
            monitors: Arc::new(RwLock::new(HashMap::new())),
            on_change: None,
        }
    }

    /// Set a callback for state changes.
    pub fn with_callback(mut self, callback: StateCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    /// Shared handle to the target group, e.g. for traffic selection.
    pub fn group(&self) -> Arc<RwLock<TargetGroup>> {
        self.group.clone()
    }

    /// Register a target (host:port) and start probing it.
    pub async fn start(&self, target: &str) -> HealthResult<()> {
        self.group.write().await.register(target)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let wake = Arc::new(Notify::new());

        let target_owned = target.to_string();
        let group = self.group.clone();
        let callback = self.on_change.clone();
        let loop_wake = wake.clone();

        let handle = tokio::spawn(async move {
            run_probe_loop(&target_owned, group, callback, loop_wake, shutdown_rx).await;
        });

        let mut monitors = self.monitors.write().await;
        if let Some(old) = monitors.insert(
            target.to_string(),
            MonitorSlot {
                handle,
                shutdown_tx,
                wake,
            },
        ) {
            let _ = old.shutdown_tx.send(true);
            old.handle.abort();
        }

        info!(endpoint = %target, "target monitor started");
        Ok(())
    }

    /// Drain a target: it stops receiving traffic immediately and is
    /// removed once the deregistration delay passes.
    pub async fn deregister(&self, target: &str) -> HealthResult<Instant> {
        let deadline = self.group.write().await.deregister(target, Instant::now())?;
        if let Some(slot) = self.monitors.read().await.get(target) {
            slot.wake.notify_one();
        }
        Ok(deadline)
    }

    /// Stop probing a target and drop it from the group at once.
    pub async fn stop(&self, target: &str) {
        let mut monitors = self.monitors.write().await;
        if let Some(slot) = monitors.remove(target) {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            info!(endpoint = %target, "target monitor stopped");
        }
        self.group.write().await.remove(target);
    }

    /// Stop all monitors (for graceful shutdown).
    pub async fn stop_all(&self) {
        let mut monitors = self.monitors.write().await;
        for (target, slot) in monitors.drain() {
            let _ = slot.shutdown_tx.send(true);
            slot.handle.abort();
            debug!(endpoint = %target, "target monitor stopped");
        }
        info!("all target monitors stopped");
    }

    /// Targets with a running probe loop.
    pub async fn active(&self) -> Vec<String> {
        let monitors = self.monitors.read().await;
        let mut targets: Vec<String> = monitors
            .iter()
            .filter(|(_, slot)| !slot.handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        targets.sort();
        targets
    }

    pub async fn is_monitoring(&self, target: &str) -> bool {
        let monitors = self.monitors.read().await;
        monitors
            .get(target)
            .is_some_and(|slot| !slot.handle.is_finished())
    }
}

/// The probe loop for a single target.
async fn run_probe_loop(
    target: &str,
    group: Arc<RwLock<TargetGroup>>,
    callback: Option<StateCallback>,
    wake: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
) {
    let policy = group.read().await.policy().clone();
    debug!(endpoint = %target, path = policy.path(), "probe loop starting");

    loop {
        let draining = group.read().await.drain_deadline(target);
        if let Some(deadline) = draining {
            tokio::select! {
                _ = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)) => {
                    let removed = group.write().await.reap(Instant::now());
                    debug!(endpoint = %target, removed = removed.len(), "drain complete");
                }
                _ = shutdown.changed() => {}
            }
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(policy.interval()) => {}
            _ = wake.notified() => continue,
            _ = shutdown.changed() => {
                debug!(endpoint = %target, "probe loop shutting down");
                break;
            }
        }

        let result = http_probe(target, policy.path(), policy.timeout(), policy.success_codes()).await;
        let change = group.write().await.record(target, result);

        match change {
            Ok(Some(change)) => {
                info!(
                    endpoint = %target,
                    from = change.from.label(),
                    to = change.to.label(),
                    eligible = change.eligible,
                    "target state changed"
                );
                if let Some(ref cb) = callback {
                    cb(change).await;
                }
            }
            Ok(None) => {}
            Err(HealthError::UnknownTarget(_)) => {
                debug!(endpoint = %target, "target no longer registered");
                break;
            }
            Err(e) => {
                debug!(endpoint = %target, error = %e, "probe result not recorded");
            }
        }
    }
}
