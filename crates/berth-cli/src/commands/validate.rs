use berth_core::format_duration;

pub fn validate(path: &str) -> anyhow::Result<()> {
    let topo = super::load(path)?;
    let container = topo.container();
    let health = topo.health();

    println!("✓ {path} is valid");
    println!("  App:       {}", topo.name());
    println!(
        "  Network:   {} across {} AZs",
        topo.network().cidr,
        topo.network().max_azs
    );
    println!(
        "  Listener:  {} :{} → container :{} (host ports {})",
        topo.listener().protocol.label(),
        topo.listener().protocol.port(),
        container.port,
        container.host_port_range
    );
    println!(
        "  Health:    GET {} every {}, timeout {}, {}/{} thresholds, drain {}",
        health.path(),
        format_duration(health.interval()),
        format_duration(health.timeout()),
        health.healthy_threshold(),
        health.unhealthy_threshold(),
        format_duration(health.deregistration_delay())
    );
    println!(
        "  Env:       {} plain, {} secret",
        container.env.len(),
        topo.secrets().keys.len()
    );
    Ok(())
}
