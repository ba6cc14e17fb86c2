//! `berth watch` — run the target monitor against live endpoints.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use berth_health::{StateChange, TargetMonitor};

pub async fn watch(path: &str, targets: &[String]) -> Result<()> {
    let topo = super::load(path)?;
    let policy = topo.health().clone();

    let monitor = TargetMonitor::new(policy).with_callback(Arc::new(|change: StateChange| {
        Box::pin(async move {
            println!(
                "{}: {} → {}{}",
                change.target,
                change.from.label(),
                change.to.label(),
                if change.eligible { "" } else { " (no traffic)" }
            );
        }) as berth_health::monitor::BoxFuture
    }));

    for target in targets {
        monitor.start(target).await?;
    }
    info!(targets = targets.len(), path = topo.health().path(), "watching targets");

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    let group = monitor.group();
    let snapshot = group.read().await.snapshot();
    monitor.stop_all().await;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
