//! berth.toml configuration parser.
//!
//! Every field is optional here; defaults and validation are applied when
//! the file is turned into a [`TopologyDescriptor`](crate::TopologyDescriptor).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{TopologyError, TopologyResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyConfig {
    pub app: AppConfig,
    pub network: Option<NetworkConfig>,
    pub cluster: Option<ClusterConfig>,
    pub container: Option<ContainerConfig>,
    pub listener: Option<ListenerConfig>,
    pub health: Option<HealthConfig>,
    pub secrets: Option<SecretsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub name: String,
    pub domain: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub cidr: Option<String>,
    pub max_azs: Option<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub instance_type: Option<String>,
    pub min_capacity: Option<u32>,
    pub max_capacity: Option<u32>,
    pub desired_count: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    pub image: Option<String>,
    pub port: Option<u16>,
    pub memory_limit_mib: Option<u32>,
    pub cpu: Option<u32>,
    pub host_port_range: Option<PortRangeConfig>,
    pub env: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortRangeConfig {
    pub start: u16,
    pub end: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// "http" or "https".
    pub protocol: Option<String>,
    pub certificate: Option<String>,
    pub redirect_http: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub path: Option<String>,
    pub interval: Option<String>,
    pub timeout: Option<String>,
    pub healthy_threshold: Option<u32>,
    pub unhealthy_threshold: Option<u32>,
    pub deregistration_delay: Option<String>,
    pub success_codes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Name of the backing secret store entry.
    pub source: Option<String>,
    pub keys: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub group: Option<String>,
    pub retention_days: Option<u32>,
    pub stream_prefix: Option<String>,
}

impl TopologyConfig {
    pub fn from_file(path: &Path) -> TopologyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> TopologyResult<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> TopologyResult<String> {
        toml::to_string_pretty(self).map_err(|e| TopologyError::Serialize(e.to_string()))
    }

    /// Scaffold a berth.toml spelling out every default.
    pub fn scaffold(name: &str, domain: &str) -> Self {
        let env = [
            ("NODE_ENV", "production"),
            ("PORT", "3000"),
            ("HOSTNAME", "0.0.0.0"),
            ("NEXT_TELEMETRY_DISABLED", "1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        TopologyConfig {
            app: AppConfig {
                name: name.to_string(),
                domain: Some(domain.to_string()),
            },
            network: Some(NetworkConfig {
                cidr: Some("10.0.0.0/16".to_string()),
                max_azs: Some(2),
            }),
            cluster: Some(ClusterConfig {
                instance_type: Some("t3.small".to_string()),
                min_capacity: Some(1),
                max_capacity: Some(2),
                desired_count: Some(1),
            }),
            container: Some(ContainerConfig {
                image: Some(format!("{name}:latest")),
                port: Some(3000),
                memory_limit_mib: Some(512),
                cpu: Some(256),
                host_port_range: Some(PortRangeConfig {
                    start: 32768,
                    end: 65535,
                }),
                env: Some(env),
            }),
            listener: Some(ListenerConfig {
                protocol: Some("http".to_string()),
                certificate: None,
                redirect_http: None,
            }),
            health: Some(HealthConfig {
                path: Some("/".to_string()),
                interval: Some("120s".to_string()),
                timeout: Some("60s".to_string()),
                healthy_threshold: Some(2),
                unhealthy_threshold: Some(10),
                deregistration_delay: Some("30s".to_string()),
                success_codes: Some("200".to_string()),
            }),
            secrets: Some(SecretsConfig {
                source: Some(format!("{name}/production")),
                keys: Some(
                    crate::descriptor::DEFAULT_SECRET_KEYS
                        .iter()
                        .map(|k| k.to_string())
                        .collect(),
                ),
            }),
            logging: Some(LoggingConfig {
                group: Some(format!("/ecs/{name}")),
                retention_days: Some(7),
                stream_prefix: Some(name.to_string()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scaffold() {
        let config = TopologyConfig::scaffold("webapp", "app.example.com");
        let toml_str = config.to_toml_string().unwrap();
        assert!(toml_str.contains("webapp"));
        assert!(toml_str.contains("app.example.com"));
        assert!(toml_str.contains("DATABASE_URL"));
    }

    #[test]
    fn test_scaffold_reparses() {
        let config = TopologyConfig::scaffold("webapp", "app.example.com");
        let toml_str = config.to_toml_string().unwrap();
        let parsed = TopologyConfig::parse(&toml_str).unwrap();
        let health = parsed.health.unwrap();
        assert_eq!(health.interval.as_deref(), Some("120s"));
        assert_eq!(health.unhealthy_threshold, Some(10));
    }

    #[test]
    fn test_parse_minimal() {
        let toml_str = r#"
[app]
name = "test"
"#;
        let config = TopologyConfig::parse(toml_str).unwrap();
        assert_eq!(config.app.name, "test");
        assert!(config.health.is_none());
    }

    #[test]
    fn test_parse_rejects_missing_app() {
        let err = TopologyConfig::parse("[network]\ncidr = \"10.0.0.0/16\"\n").unwrap_err();
        assert!(matches!(err, TopologyError::Parse(_)));
    }
}
