//! Human-readable plan formatting.

use std::time::Duration;

use crate::duration::format_duration;
use crate::plan::{DeploymentPlan, ListenerAction};

pub fn format_plan(plan: &DeploymentPlan, fingerprint: &str) -> String {
    let mut out = String::new();
    let short = fingerprint.get(..12).unwrap_or(fingerprint);

    out.push_str("\n╔══════════════════════════════════════════╗\n");
    out.push_str("║  Berth Deployment Plan                   ║\n");
    out.push_str("╠══════════════════════════════════════════╣\n");
    out.push_str(&format!("║  App:      {:<30}║\n", plan.app));
    out.push_str(&format!("║  Cluster:  {:<30}║\n", plan.cluster.name));
    out.push_str(&format!("║  Plan:     {:<30}║\n", short));
    out.push_str("╚══════════════════════════════════════════╝\n\n");

    out.push_str(&format!(
        "Network {} across {} AZs:\n",
        plan.network.cidr, plan.network.availability_zones
    ));
    for subnet in &plan.network.public_subnets {
        out.push_str(&format!("  public   {subnet}\n"));
    }
    for subnet in &plan.network.private_subnets {
        out.push_str(&format!("  private  {subnet}\n"));
    }
    out.push('\n');

    out.push_str(&format!(
        "Capacity: {} x{}..{}, {} task(s) of {}\n\n",
        plan.cluster.instance_type,
        plan.cluster.min_capacity,
        plan.cluster.max_capacity,
        plan.cluster.service.desired_count,
        plan.task.container.image,
    ));

    out.push_str("Listeners:\n");
    for l in &plan.load_balancer.listeners {
        match &l.action {
            ListenerAction::Forward { target_group } => {
                out.push_str(&format!(
                    "  :{} {} → {target_group}\n",
                    l.port,
                    l.protocol.label()
                ));
            }
            ListenerAction::Redirect { port, protocol } => {
                out.push_str(&format!(
                    "  :{} {} → redirect {}:{port}\n",
                    l.port,
                    l.protocol.label(),
                    protocol.label()
                ));
            }
        }
    }
    let tg = &plan.load_balancer.target_group;
    let hc = &tg.health_check;
    out.push_str(&format!(
        "  {} → container :{} (host ports dynamic)\n\n",
        tg.name, tg.port
    ));

    out.push_str("Health check:\n");
    out.push_str(&format!("  GET {} expecting {}\n", hc.path, hc.success_codes));
    out.push_str(&format!(
        "  every {}, timeout {}\n",
        format_duration(Duration::from_millis(hc.interval_ms)),
        format_duration(Duration::from_millis(hc.timeout_ms))
    ));
    out.push_str(&format!(
        "  healthy after {} pass(es), unhealthy after {} failure(s)\n",
        hc.healthy_threshold, hc.unhealthy_threshold
    ));
    out.push_str(&format!(
        "  drain for {} before removal\n\n",
        format_duration(Duration::from_millis(tg.deregistration_delay_ms))
    ));

    let c = &plan.task.container;
    out.push_str(&format!("Environment ({}):\n", c.environment.len()));
    for e in &c.environment {
        out.push_str(&format!("  {}={}\n", e.name, e.value));
    }
    out.push_str(&format!("Secrets ({}):\n", c.secrets.len()));
    for s in &c.secrets {
        out.push_str(&format!("  {} ← {}\n", s.name, s.value_from));
    }
    out.push('\n');

    out.push_str("Outputs:\n");
    out.push_str(&format!(
        "  load_balancer_dns  {}\n",
        plan.outputs.load_balancer_dns
    ));
    if let Some(url) = &plan.outputs.service_url {
        out.push_str(&format!("  service_url        {url}\n"));
    }

    out
}
