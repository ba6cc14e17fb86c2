//! Topology descriptor: the validated, immutable form of a berth.toml.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, info};

use crate::config::{HealthConfig, TopologyConfig};
use crate::duration::parse_duration;
use crate::error::{TopologyError, TopologyResult};
use crate::network::{Ipv4Cidr, MAX_VPC_PREFIX, MIN_VPC_PREFIX};
use crate::policy::{HealthCheckPolicy, HealthCheckSettings, SuccessCodes};
use crate::types::*;

/// Secret-backed variables wired into the container when none are listed.
pub const DEFAULT_SECRET_KEYS: &[&str] = &[
    "AUTH_SECRET",
    "AUTH_URL",
    "AUTH_CLIENT_ID",
    "AUTH_CLIENT_SECRET",
    "DATABASE_URL",
    "AUTH_TRUST_HOST",
];

pub const DEFAULT_CONTAINER_PORT: u16 = 3000;
pub const MAX_AZS: u8 = 6;

/// Everything needed to describe one deployment.
///
/// Built once by [`TopologyDescriptor::from_config`]; fields are only
/// reachable through shared references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyDescriptor {
    name: String,
    domain: Option<String>,
    network: NetworkSpec,
    cluster: ClusterSpec,
    container: ContainerSpec,
    listener: ListenerSpec,
    health: HealthCheckPolicy,
    secrets: SecretRefSet,
    logging: LoggingSpec,
}

impl TopologyDescriptor {
    /// Load and validate a topology file.
    pub fn load(path: &Path) -> TopologyResult<Self> {
        let config = TopologyConfig::from_file(path)?;
        Self::from_config(&config)
    }

    /// Apply defaults to a raw config and validate the result.
    pub fn from_config(config: &TopologyConfig) -> TopologyResult<Self> {
        let rules = NameRules::compile()?;

        let name = config.app.name.trim().to_string();
        if !rules.app_name.is_match(&name) {
            return Err(TopologyError::Invalid(format!(
                "app name {name:?} must be 1-28 lowercase letters, digits or '-', starting with a letter"
            )));
        }

        let domain = match config.app.domain.as_deref().map(str::trim) {
            Some("") | None => None,
            Some(d) if d.contains(char::is_whitespace) || d.contains('/') => {
                return Err(TopologyError::Invalid(format!("invalid domain {d:?}")));
            }
            Some(d) => Some(d.to_ascii_lowercase()),
        };

        let network = build_network(config)?;
        let cluster = build_cluster(config)?;
        let container = build_container(config, &name, &rules)?;
        let listener = build_listener(config, domain.as_deref())?;
        let health = build_health(config.health.as_ref())?;
        let secrets = build_secrets(config, &name, &rules, &container.env)?;
        let logging = build_logging(config, &name)?;

        info!(
            app = %name,
            cidr = %network.cidr,
            azs = network.max_azs,
            container_port = container.port,
            listener = listener.protocol.label(),
            secrets = secrets.keys.len(),
            "topology validated"
        );

        Ok(Self {
            name,
            domain,
            network,
            cluster,
            container,
            listener,
            health,
            secrets,
            logging,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn network(&self) -> &NetworkSpec {
        &self.network
    }

    pub fn cluster(&self) -> &ClusterSpec {
        &self.cluster
    }

    pub fn container(&self) -> &ContainerSpec {
        &self.container
    }

    pub fn listener(&self) -> &ListenerSpec {
        &self.listener
    }

    pub fn health(&self) -> &HealthCheckPolicy {
        &self.health
    }

    pub fn secrets(&self) -> &SecretRefSet {
        &self.secrets
    }

    pub fn logging(&self) -> &LoggingSpec {
        &self.logging
    }

    /// Public URL the service is reached at, when a domain is configured.
    pub fn service_url(&self) -> Option<String> {
        self.domain.as_ref().map(|d| format!("https://{d}"))
    }
}

struct NameRules {
    app_name: Regex,
    env_name: Regex,
}

impl NameRules {
    fn compile() -> TopologyResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| TopologyError::Invalid(e.to_string()))
        };
        Ok(Self {
            app_name: compile(r"^[a-z][a-z0-9-]{0,27}$")?,
            env_name: compile(r"^[A-Za-z_][A-Za-z0-9_]*$")?,
        })
    }
}

fn build_network(config: &TopologyConfig) -> TopologyResult<NetworkSpec> {
    let raw = config.network.as_ref();
    let cidr: Ipv4Cidr = raw
        .and_then(|n| n.cidr.as_deref())
        .unwrap_or("10.0.0.0/16")
        .parse()?;
    if !(MIN_VPC_PREFIX..=MAX_VPC_PREFIX).contains(&cidr.prefix()) {
        return Err(TopologyError::InvalidNetwork(format!(
            "VPC prefix /{} must be between /{MIN_VPC_PREFIX} and /{MAX_VPC_PREFIX}",
            cidr.prefix()
        )));
    }

    let max_azs = raw.and_then(|n| n.max_azs).unwrap_or(2);
    if !(1..=MAX_AZS).contains(&max_azs) {
        return Err(TopologyError::InvalidNetwork(format!(
            "max_azs {max_azs} must be between 1 and {MAX_AZS}"
        )));
    }

    // One public and one private subnet per AZ must fit.
    cidr.split(usize::from(max_azs) * 2)?;

    Ok(NetworkSpec { cidr, max_azs })
}

fn build_cluster(config: &TopologyConfig) -> TopologyResult<ClusterSpec> {
    let raw = config.cluster.as_ref();
    let instance_type = raw
        .and_then(|c| c.instance_type.clone())
        .unwrap_or_else(|| "t3.small".to_string());
    let min_capacity = raw.and_then(|c| c.min_capacity).unwrap_or(1);
    let max_capacity = raw.and_then(|c| c.max_capacity).unwrap_or(2);
    let desired_count = raw.and_then(|c| c.desired_count).unwrap_or(1);

    if instance_type.trim().is_empty() {
        return Err(TopologyError::InvalidCapacity(
            "instance type must not be empty".to_string(),
        ));
    }
    if max_capacity < 1 {
        return Err(TopologyError::InvalidCapacity(
            "max_capacity must be at least 1".to_string(),
        ));
    }
    if min_capacity > max_capacity {
        return Err(TopologyError::InvalidCapacity(format!(
            "min_capacity {min_capacity} exceeds max_capacity {max_capacity}"
        )));
    }
    if desired_count < 1 {
        return Err(TopologyError::InvalidCapacity(
            "desired_count must be at least 1".to_string(),
        ));
    }

    Ok(ClusterSpec {
        instance_type,
        min_capacity,
        max_capacity,
        desired_count,
    })
}

fn build_container(
    config: &TopologyConfig,
    name: &str,
    rules: &NameRules,
) -> TopologyResult<ContainerSpec> {
    let raw = config.container.as_ref();
    let port = raw.and_then(|c| c.port).unwrap_or(DEFAULT_CONTAINER_PORT);
    if port == 0 {
        return Err(TopologyError::InvalidPorts(
            "container port must be non-zero".to_string(),
        ));
    }

    let host_port_range = raw
        .and_then(|c| c.host_port_range.as_ref())
        .map(|r| PortRange {
            start: r.start,
            end: r.end,
        })
        .unwrap_or(PortRange::EPHEMERAL);
    if host_port_range.is_empty() {
        return Err(TopologyError::InvalidPorts(format!(
            "host port range {host_port_range} is reversed"
        )));
    }
    if host_port_range.start < 1024 {
        return Err(TopologyError::InvalidPorts(format!(
            "host port range {host_port_range} reaches into privileged ports"
        )));
    }

    let memory_limit_mib = raw.and_then(|c| c.memory_limit_mib).unwrap_or(512);
    let cpu = raw.and_then(|c| c.cpu).unwrap_or(256);
    if memory_limit_mib == 0 || cpu == 0 {
        return Err(TopologyError::InvalidCapacity(
            "container memory and cpu must be non-zero".to_string(),
        ));
    }

    let image = raw
        .and_then(|c| c.image.clone())
        .unwrap_or_else(|| format!("{name}:latest"));
    if image.trim().is_empty() {
        return Err(TopologyError::Invalid("container image must not be empty".to_string()));
    }

    let env = match raw.and_then(|c| c.env.clone()) {
        Some(env) => env,
        None => {
            debug!(app = %name, "no container env given, using defaults");
            default_env(port)
        }
    };
    for key in env.keys() {
        if !rules.env_name.is_match(key) {
            return Err(TopologyError::InvalidEnv(format!(
                "{key:?} is not a valid variable name"
            )));
        }
    }
    if let Some(declared) = env.get("PORT") {
        if declared.trim().parse::<u16>().ok() != Some(port) {
            return Err(TopologyError::InvalidEnv(format!(
                "PORT={declared} does not match container port {port}"
            )));
        }
    }

    Ok(ContainerSpec {
        image,
        port,
        memory_limit_mib,
        cpu,
        host_port_range,
        env,
    })
}

fn default_env(port: u16) -> BTreeMap<String, String> {
    [
        ("NODE_ENV", "production".to_string()),
        ("PORT", port.to_string()),
        ("HOSTNAME", "0.0.0.0".to_string()),
        ("NEXT_TELEMETRY_DISABLED", "1".to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

fn build_listener(config: &TopologyConfig, domain: Option<&str>) -> TopologyResult<ListenerSpec> {
    let raw = config.listener.as_ref();
    let protocol = match raw.and_then(|l| l.protocol.as_deref()) {
        None => Protocol::Http,
        Some(p) if p.eq_ignore_ascii_case("http") => Protocol::Http,
        Some(p) if p.eq_ignore_ascii_case("https") => Protocol::Https,
        Some(other) => {
            return Err(TopologyError::InvalidListener(format!(
                "unknown protocol {other:?}, expected http or https"
            )));
        }
    };
    let certificate = raw
        .and_then(|l| l.certificate.clone())
        .filter(|c| !c.trim().is_empty());
    let redirect_http = raw.and_then(|l| l.redirect_http);

    match protocol {
        Protocol::Https => {
            if certificate.is_none() {
                return Err(TopologyError::InvalidListener(
                    "https listener requires a certificate".to_string(),
                ));
            }
            if domain.is_none() {
                return Err(TopologyError::InvalidListener(
                    "https listener requires app.domain".to_string(),
                ));
            }
        }
        Protocol::Http => {
            if redirect_http == Some(true) {
                return Err(TopologyError::InvalidListener(
                    "redirect_http only applies to https listeners".to_string(),
                ));
            }
            if certificate.is_some() {
                return Err(TopologyError::InvalidListener(
                    "certificate given for an http listener".to_string(),
                ));
            }
        }
    }

    Ok(ListenerSpec {
        protocol,
        certificate,
        redirect_http: protocol == Protocol::Https && redirect_http.unwrap_or(true),
    })
}

fn build_health(raw: Option<&HealthConfig>) -> TopologyResult<HealthCheckPolicy> {
    let defaults = HealthCheckSettings::default();
    let Some(raw) = raw else {
        return HealthCheckPolicy::new(defaults);
    };

    let duration = |field: &str, value: Option<&str>, fallback: Duration| match value {
        None => Ok(fallback),
        Some(s) => parse_duration(s).ok_or_else(|| {
            TopologyError::InvalidPolicy(format!("{field} {s:?} is not a duration"))
        }),
    };

    let settings = HealthCheckSettings {
        path: raw.path.clone().unwrap_or(defaults.path),
        interval: duration("interval", raw.interval.as_deref(), defaults.interval)?,
        timeout: duration("timeout", raw.timeout.as_deref(), defaults.timeout)?,
        healthy_threshold: raw.healthy_threshold.unwrap_or(defaults.healthy_threshold),
        unhealthy_threshold: raw
            .unhealthy_threshold
            .unwrap_or(defaults.unhealthy_threshold),
        deregistration_delay: duration(
            "deregistration_delay",
            raw.deregistration_delay.as_deref(),
            defaults.deregistration_delay,
        )?,
        success_codes: match raw.success_codes.as_deref() {
            Some(s) => SuccessCodes::parse(s)?,
            None => defaults.success_codes,
        },
    };

    HealthCheckPolicy::new(settings)
}

fn build_secrets(
    config: &TopologyConfig,
    name: &str,
    rules: &NameRules,
    env: &BTreeMap<String, String>,
) -> TopologyResult<SecretRefSet> {
    let raw = config.secrets.as_ref();
    let source = raw
        .and_then(|s| s.source.clone())
        .unwrap_or_else(|| format!("{name}/production"));
    if source.trim().is_empty() {
        return Err(TopologyError::InvalidSecret(
            "secret source must not be empty".to_string(),
        ));
    }

    let keys: Vec<String> = match raw.and_then(|s| s.keys.clone()) {
        Some(keys) => keys,
        None => DEFAULT_SECRET_KEYS.iter().map(|k| k.to_string()).collect(),
    };

    let mut seen = Vec::with_capacity(keys.len());
    for key in &keys {
        if !rules.env_name.is_match(key) {
            return Err(TopologyError::InvalidSecret(format!(
                "{key:?} is not a valid variable name"
            )));
        }
        if seen.contains(&key) {
            return Err(TopologyError::InvalidSecret(format!("{key} listed twice")));
        }
        if env.contains_key(key) {
            return Err(TopologyError::InvalidSecret(format!(
                "{key} is also set as a plain environment variable"
            )));
        }
        seen.push(key);
    }

    Ok(SecretRefSet { source, keys })
}

fn build_logging(config: &TopologyConfig, name: &str) -> TopologyResult<LoggingSpec> {
    let raw = config.logging.as_ref();
    let retention_days = raw.and_then(|l| l.retention_days).unwrap_or(7);
    if retention_days == 0 {
        return Err(TopologyError::Invalid(
            "log retention must be at least one day".to_string(),
        ));
    }
    Ok(LoggingSpec {
        group: raw
            .and_then(|l| l.group.clone())
            .unwrap_or_else(|| format!("/ecs/{name}")),
        retention_days,
        stream_prefix: raw
            .and_then(|l| l.stream_prefix.clone())
            .unwrap_or_else(|| name.to_string()),
    })
}
