use std::path::Path;

use anyhow::{bail, Context};
use berth_core::{TopologyConfig, TopologyDescriptor};

pub fn init(path: &str, name: &str, domain: &str, force: bool) -> anyhow::Result<()> {
    let output = Path::new(path);
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = TopologyConfig::scaffold(name, domain);
    // Refuse to write a scaffold that would not load back.
    TopologyDescriptor::from_config(&config).context("scaffold does not validate")?;

    std::fs::write(output, config.to_toml_string()?)
        .with_context(|| format!("writing {}", output.display()))?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
