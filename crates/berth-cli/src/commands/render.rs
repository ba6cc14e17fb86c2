use berth_core::report::format_plan;
use berth_core::DeploymentPlan;

use super::OutputFormat;

pub fn render(path: &str, format: OutputFormat) -> anyhow::Result<()> {
    let topo = super::load(path)?;
    let plan = DeploymentPlan::render(&topo)?;

    match format {
        OutputFormat::Json => println!("{}", plan.to_json()?),
        OutputFormat::Text => println!("{}", format_plan(&plan, &plan.fingerprint()?)),
    }
    Ok(())
}
