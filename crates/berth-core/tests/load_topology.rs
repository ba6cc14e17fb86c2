//! Loading topology files from disk.

use std::io::Write;
use std::time::Duration;

use berth_core::*;

fn write_topology(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn load_full_topology() {
    let file = write_topology(
        r#"
[app]
name = "webapp"
domain = "app.example.com"

[network]
cidr = "10.20.0.0/16"
max_azs = 3

[container]
image = "registry.example.com/webapp:1.4.0"
port = 3000

[listener]
protocol = "https"
certificate = "cert-webapp"

[health]
path = "/"
interval = "120s"
timeout = "60s"
healthy_threshold = 2
unhealthy_threshold = 10
deregistration_delay = "30s"
"#,
    );

    let topo = TopologyDescriptor::load(file.path()).unwrap();
    assert_eq!(topo.network().max_azs, 3);
    assert_eq!(topo.health().interval(), Duration::from_secs(120));
    assert_eq!(topo.health().timeout(), Duration::from_secs(60));
    assert_eq!(topo.health().healthy_threshold(), 2);
    assert_eq!(topo.health().unhealthy_threshold(), 10);
    assert!(topo.health().success_codes().matches(200));

    let plan = DeploymentPlan::render(&topo).unwrap();
    assert_eq!(plan.network.public_subnets.len(), 3);
    assert_eq!(plan.network.private_subnets.len(), 3);
    assert_eq!(plan.load_balancer.listeners[0].port, 443);
    assert_eq!(plan.outputs.service_url.as_deref(), Some("https://app.example.com"));
}

#[test]
fn load_rejects_timeout_not_below_interval() {
    let file = write_topology(
        r#"
[app]
name = "webapp"

[health]
interval = "60s"
timeout = "2m"
"#,
    );
    let err = TopologyDescriptor::load(file.path()).unwrap_err();
    assert!(matches!(err, TopologyError::InvalidPolicy(_)), "{err}");
}

#[test]
fn load_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TopologyDescriptor::load(&dir.path().join("berth.toml")).unwrap_err();
    assert!(matches!(err, TopologyError::Io(_)));
}

#[test]
fn load_malformed_toml_is_parse_error() {
    let file = write_topology("[app\nname = ");
    let err = TopologyDescriptor::load(file.path()).unwrap_err();
    assert!(matches!(err, TopologyError::Parse(_)));
}
