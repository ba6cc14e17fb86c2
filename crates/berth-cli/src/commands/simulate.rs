//! `berth simulate` — replay probe results through the health policy.
//!
//! Probes are spaced one interval apart on a virtual clock starting at
//! zero. Every probe is recorded, so a target that turns unhealthy can be
//! seen recovering and being readmitted to traffic.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;

use berth_core::{format_duration, HealthCheckPolicy, SuccessCodes};
use berth_health::{HealthState, ProbeResult, TargetGroup};

use super::OutputFormat;

const TARGET: &str = "simulated-target";

#[derive(Debug, Serialize)]
pub struct Simulation {
    pub steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
pub struct Step {
    pub probe: usize,
    /// Milliseconds on the virtual clock.
    pub at_ms: u64,
    pub input: String,
    pub result: ProbeResult,
    pub state: HealthState,
    pub eligible: bool,
    pub transition: Option<String>,
}

pub fn simulate(path: &str, probes: &[String], format: OutputFormat) -> Result<()> {
    let topo = super::load(path)?;
    let sim = run(topo.health(), probes)?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&sim)?),
        OutputFormat::Text => print!("{}", format_simulation(&sim)),
    }
    Ok(())
}

/// Replay `probes` against a fresh target under `policy`.
pub fn run(policy: &HealthCheckPolicy, probes: &[String]) -> Result<Simulation> {
    let results = probes
        .iter()
        .map(|p| parse_probe(p, policy.success_codes()))
        .collect::<Result<Vec<_>>>()?;

    let mut group = TargetGroup::new(policy.clone());
    group.register(TARGET)?;

    let mut steps = Vec::with_capacity(results.len());
    for (i, (input, result)) in probes.iter().zip(results).enumerate() {
        let elapsed = u32::try_from(i + 1)
            .ok()
            .and_then(|n| policy.interval().checked_mul(n))
            .and_then(|d| u64::try_from(d.as_millis()).ok())
            .with_context(|| format!("probe {} falls outside the virtual clock", i + 1))?;
        let change = group.record(TARGET, result)?;

        steps.push(Step {
            probe: i + 1,
            at_ms: elapsed,
            input: input.trim().to_string(),
            result,
            state: group.state(TARGET).unwrap_or(HealthState::Unknown),
            eligible: group.is_eligible(TARGET),
            transition: change.map(|c| format!("{} → {}", c.from.label(), c.to.label())),
        });
    }

    Ok(Simulation { steps })
}

fn parse_probe(token: &str, codes: &SuccessCodes) -> Result<ProbeResult> {
    let token = token.trim();
    if let Ok(status) = token.parse::<u16>() {
        return Ok(if codes.matches(status) {
            ProbeResult::Pass
        } else {
            ProbeResult::Fail
        });
    }
    Ok(match token.to_ascii_lowercase().as_str() {
        "pass" | "ok" => ProbeResult::Pass,
        "fail" => ProbeResult::Fail,
        "error" | "timeout" => ProbeResult::Error,
        other => anyhow::bail!(
            "unknown probe result {other:?} (expected pass, fail, error, or a status code)"
        ),
    })
}

fn format_simulation(sim: &Simulation) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:>3}  {:>8}  {:<8} {:<10} {:<9} {}\n",
        "#", "t", "probe", "state", "traffic", "change"
    ));
    for s in &sim.steps {
        out.push_str(&format!(
            "{:>3}  {:>8}  {:<8} {:<10} {:<9} {}\n",
            s.probe,
            format_duration(Duration::from_millis(s.at_ms)),
            s.input,
            s.state.label(),
            if s.eligible { "yes" } else { "no" },
            s.transition.as_deref().unwrap_or(""),
        ));
    }
    out
}
