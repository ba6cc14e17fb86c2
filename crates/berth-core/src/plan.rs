//! Deployment plan rendering.
//!
//! A [`DeploymentPlan`] is the provider-neutral resource graph handed to an
//! external provisioning engine. Rendering is a pure function of the
//! descriptor; nothing here talks to a cloud API.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::descriptor::TopologyDescriptor;
use crate::error::{TopologyError, TopologyResult};
use crate::types::{PortRange, Protocol};

/// Placeholder for values only known after provisioning.
pub const RESOLVED_AT_DEPLOY: &str = "<resolved at deploy>";

const ANYWHERE: &str = "0.0.0.0/0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentPlan {
    pub app: String,
    pub network: NetworkPlan,
    pub cluster: ClusterPlan,
    pub task: TaskDefinition,
    pub iam: IamPlan,
    pub load_balancer: LoadBalancerPlan,
    pub security_groups: Vec<SecurityGroup>,
    pub log_group: LogGroup,
    pub outputs: Outputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkPlan {
    pub cidr: String,
    pub availability_zones: u8,
    pub public_subnets: Vec<String>,
    pub private_subnets: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterPlan {
    pub name: String,
    pub instance_type: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    /// Host bootstrap commands run at instance launch.
    pub user_data: Vec<String>,
    pub service: ServicePlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePlan {
    pub name: String,
    pub desired_count: u32,
    /// Placement strategy spreading tasks over hosts.
    pub placement: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub family: String,
    pub network_mode: String,
    pub container: ContainerDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDefinition {
    pub name: String,
    pub image: String,
    pub memory_limit_mib: u32,
    pub cpu: u32,
    pub port_mappings: Vec<PortMapping>,
    pub environment: Vec<EnvVar>,
    pub secrets: Vec<SecretVar>,
    pub log_configuration: LogConfiguration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortMapping {
    pub container_port: u16,
    /// 0 requests a dynamic host port from the ephemeral range.
    pub host_port: u16,
    pub protocol: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecretVar {
    pub name: String,
    pub value_from: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogConfiguration {
    pub driver: String,
    pub group: String,
    pub stream_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamPlan {
    pub execution_role: Role,
    pub task_role: Role,
    pub instance_role: Role,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub assumed_by: String,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerPlan {
    pub name: String,
    pub internet_facing: bool,
    pub listeners: Vec<Listener>,
    pub target_group: TargetGroupPlan,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub port: u16,
    pub protocol: Protocol,
    pub certificate: Option<String>,
    pub action: ListenerAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ListenerAction {
    Forward { target_group: String },
    Redirect { port: u16, protocol: Protocol },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetGroupPlan {
    pub name: String,
    pub port: u16,
    pub protocol: Protocol,
    pub target_type: String,
    pub health_check: HealthCheckPlan,
    pub deregistration_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckPlan {
    pub path: String,
    pub interval_ms: u64,
    pub timeout_ms: u64,
    pub healthy_threshold: u32,
    pub unhealthy_threshold: u32,
    pub success_codes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub name: String,
    pub ingress: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    pub ports: PortRange,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogGroup {
    pub name: String,
    pub retention_days: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outputs {
    pub load_balancer_dns: String,
    pub service_url: Option<String>,
}

impl DeploymentPlan {
    /// Render the resource graph for a validated topology.
    pub fn render(topo: &TopologyDescriptor) -> TopologyResult<Self> {
        let app = topo.name().to_string();
        let network = topo.network();
        let container = topo.container();
        let listener = topo.listener();
        let health = topo.health();
        let secrets = topo.secrets();
        let logging = topo.logging();

        let azs = usize::from(network.max_azs);
        let subnets: Vec<String> = network
            .cidr
            .split(azs * 2)?
            .iter()
            .map(ToString::to_string)
            .collect();
        let (public, private) = subnets.split_at(azs);

        let cluster_name = format!("{app}-cluster");
        let target_group_name = format!("{app}-tg");
        let lb_sg = format!("{app}-lb-sg");
        let host_sg = format!("{app}-host-sg");

        let mut listeners = vec![Listener {
            port: listener.protocol.port(),
            protocol: listener.protocol,
            certificate: listener.certificate.clone(),
            action: ListenerAction::Forward {
                target_group: target_group_name.clone(),
            },
        }];
        if listener.redirect_http {
            listeners.push(Listener {
                port: Protocol::Http.port(),
                protocol: Protocol::Http,
                certificate: None,
                action: ListenerAction::Redirect {
                    port: Protocol::Https.port(),
                    protocol: Protocol::Https,
                },
            });
        }
        let lb_ingress = listeners
            .iter()
            .map(|l| IngressRule {
                ports: PortRange {
                    start: l.port,
                    end: l.port,
                },
                source: ANYWHERE.to_string(),
            })
            .collect();

        let secret_resource = format!("secret:{}", secrets.source);

        Ok(DeploymentPlan {
            network: NetworkPlan {
                cidr: network.cidr.to_string(),
                availability_zones: network.max_azs,
                public_subnets: public.to_vec(),
                private_subnets: private.to_vec(),
            },
            cluster: ClusterPlan {
                name: cluster_name.clone(),
                instance_type: topo.cluster().instance_type.clone(),
                min_capacity: topo.cluster().min_capacity,
                max_capacity: topo.cluster().max_capacity,
                user_data: bootstrap_commands(&cluster_name),
                service: ServicePlan {
                    name: format!("{app}-service"),
                    desired_count: topo.cluster().desired_count,
                    placement: vec![
                        "spread:attribute:ecs.availability-zone".to_string(),
                        "spread:instanceId".to_string(),
                    ],
                },
            },
            task: TaskDefinition {
                family: app.clone(),
                network_mode: "bridge".to_string(),
                container: ContainerDefinition {
                    name: app.clone(),
                    image: container.image.clone(),
                    memory_limit_mib: container.memory_limit_mib,
                    cpu: container.cpu,
                    port_mappings: vec![PortMapping {
                        container_port: container.port,
                        host_port: 0,
                        protocol: "tcp".to_string(),
                    }],
                    environment: container
                        .env
                        .iter()
                        .map(|(name, value)| EnvVar {
                            name: name.clone(),
                            value: value.clone(),
                        })
                        .collect(),
                    secrets: secrets
                        .keys
                        .iter()
                        .map(|key| SecretVar {
                            name: key.clone(),
                            value_from: secrets.reference(key),
                        })
                        .collect(),
                    log_configuration: LogConfiguration {
                        driver: "awslogs".to_string(),
                        group: logging.group.clone(),
                        stream_prefix: logging.stream_prefix.clone(),
                    },
                },
            },
            iam: IamPlan {
                execution_role: Role {
                    name: format!("{app}-execution-role"),
                    assumed_by: "ecs-tasks".to_string(),
                    actions: vec![
                        "ecr:GetAuthorizationToken".to_string(),
                        "ecr:BatchGetImage".to_string(),
                        "ecr:GetDownloadUrlForLayer".to_string(),
                        "logs:CreateLogStream".to_string(),
                        "logs:PutLogEvents".to_string(),
                        "secretsmanager:GetSecretValue".to_string(),
                    ],
                    resources: vec![format!("log-group:{}", logging.group), secret_resource],
                },
                task_role: Role {
                    name: format!("{app}-task-role"),
                    assumed_by: "ecs-tasks".to_string(),
                    actions: Vec::new(),
                    resources: Vec::new(),
                },
                instance_role: Role {
                    name: format!("{app}-instance-role"),
                    assumed_by: "ec2".to_string(),
                    actions: vec![
                        "ecs:RegisterContainerInstance".to_string(),
                        "ecs:DeregisterContainerInstance".to_string(),
                        "ecs:Poll".to_string(),
                        "ecs:StartTelemetrySession".to_string(),
                        "ecs:SubmitTaskStateChange".to_string(),
                    ],
                    resources: vec![format!("cluster:{cluster_name}")],
                },
            },
            load_balancer: LoadBalancerPlan {
                name: format!("{app}-alb"),
                internet_facing: true,
                listeners,
                target_group: TargetGroupPlan {
                    name: target_group_name,
                    port: container.port,
                    protocol: Protocol::Http,
                    target_type: "instance".to_string(),
                    health_check: HealthCheckPlan {
                        path: health.path().to_string(),
                        interval_ms: millis(health.interval()),
                        timeout_ms: millis(health.timeout()),
                        healthy_threshold: health.healthy_threshold(),
                        unhealthy_threshold: health.unhealthy_threshold(),
                        success_codes: health.success_codes().to_string(),
                    },
                    deregistration_delay_ms: millis(health.deregistration_delay()),
                },
            },
            security_groups: vec![
                SecurityGroup {
                    name: lb_sg.clone(),
                    ingress: lb_ingress,
                },
                SecurityGroup {
                    name: host_sg,
                    ingress: vec![IngressRule {
                        ports: container.host_port_range,
                        source: lb_sg,
                    }],
                },
            ],
            log_group: LogGroup {
                name: logging.group.clone(),
                retention_days: logging.retention_days,
            },
            outputs: Outputs {
                load_balancer_dns: RESOLVED_AT_DEPLOY.to_string(),
                service_url: topo.service_url(),
            },
            app,
        })
    }

    /// Canonical JSON form.
    pub fn to_json(&self) -> TopologyResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| TopologyError::Serialize(e.to_string()))
    }

    /// SHA-256 of the canonical JSON form; equal plans hash equally.
    pub fn fingerprint(&self) -> TopologyResult<String> {
        let bytes =
            serde_json::to_vec(self).map_err(|e| TopologyError::Serialize(e.to_string()))?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Commands that join an instance to the cluster at boot.
fn bootstrap_commands(cluster: &str) -> Vec<String> {
    vec![
        format!("echo ECS_CLUSTER={cluster} >> /etc/ecs/ecs.config"),
        "echo ECS_ENABLE_CONTAINER_METADATA=true >> /etc/ecs/ecs.config".to_string(),
        "echo ECS_CONTAINER_STOP_TIMEOUT=30s >> /etc/ecs/ecs.config".to_string(),
    ]
}

/// Policy durations are bounded well below `u64::MAX` milliseconds.
fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TopologyConfig;

    fn render(toml_str: &str) -> DeploymentPlan {
        let config = TopologyConfig::parse(toml_str).unwrap();
        let topo = TopologyDescriptor::from_config(&config).unwrap();
        DeploymentPlan::render(&topo).unwrap()
    }

    #[test]
    fn default_plan_shape() {
        let plan = render("[app]\nname = \"webapp\"\n");

        assert_eq!(plan.network.public_subnets, vec!["10.0.0.0/18", "10.0.64.0/18"]);
        assert_eq!(plan.network.private_subnets, vec!["10.0.128.0/18", "10.0.192.0/18"]);

        let mapping = &plan.task.container.port_mappings[0];
        assert_eq!(mapping.container_port, 3000);
        assert_eq!(mapping.host_port, 0);
        assert_eq!(plan.task.network_mode, "bridge");

        assert_eq!(plan.load_balancer.listeners.len(), 1);
        assert_eq!(plan.load_balancer.listeners[0].port, 80);
        assert_eq!(plan.load_balancer.target_group.port, 3000);
        assert_eq!(plan.load_balancer.target_group.health_check.interval_ms, 120_000);
        assert_eq!(plan.load_balancer.target_group.health_check.timeout_ms, 60_000);
        assert_eq!(plan.load_balancer.target_group.deregistration_delay_ms, 30_000);
        assert_eq!(plan.outputs.load_balancer_dns, RESOLVED_AT_DEPLOY);
        assert_eq!(plan.outputs.service_url, None);
    }

    #[test]
    fn secrets_are_references_only() {
        let plan = render("[app]\nname = \"webapp\"\n");
        let secrets = &plan.task.container.secrets;
        assert_eq!(secrets.len(), 6);
        let db = secrets.iter().find(|s| s.name == "DATABASE_URL").unwrap();
        assert_eq!(db.value_from, "webapp/production:DATABASE_URL");
        assert!(
            !plan
                .task
                .container
                .environment
                .iter()
                .any(|e| e.name == "DATABASE_URL")
        );
    }

    #[test]
    fn environment_is_sorted() {
        let plan = render("[app]\nname = \"webapp\"\n");
        let names: Vec<&str> = plan
            .task
            .container
            .environment
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["HOSTNAME", "NEXT_TELEMETRY_DISABLED", "NODE_ENV", "PORT"]);
    }

    #[test]
    fn host_ingress_only_from_load_balancer() {
        let plan = render("[app]\nname = \"webapp\"\n");
        let host = plan
            .security_groups
            .iter()
            .find(|g| g.name == "webapp-host-sg")
            .unwrap();
        assert_eq!(host.ingress.len(), 1);
        assert_eq!(host.ingress[0].ports, PortRange::EPHEMERAL);
        assert_eq!(host.ingress[0].source, "webapp-lb-sg");
    }

    #[test]
    fn https_adds_redirect_listener() {
        let plan = render(
            r#"
[app]
name = "webapp"
domain = "app.example.com"
[listener]
protocol = "https"
certificate = "cert-1"
"#,
        );
        let listeners = &plan.load_balancer.listeners;
        assert_eq!(listeners.len(), 2);
        assert_eq!(listeners[0].port, 443);
        assert_eq!(listeners[0].certificate.as_deref(), Some("cert-1"));
        assert_eq!(
            listeners[1].action,
            ListenerAction::Redirect {
                port: 443,
                protocol: Protocol::Https
            }
        );
        let lb = &plan.security_groups[0];
        assert_eq!(lb.ingress.len(), 2);
        assert_eq!(plan.outputs.service_url.as_deref(), Some("https://app.example.com"));
    }

    #[test]
    fn sub_second_health_durations_keep_precision() {
        let plan = render(
            "[app]\nname = \"webapp\"\n[health]\ninterval = \"1500ms\"\ntimeout = \"1s\"\nderegistration_delay = \"250ms\"\n",
        );
        let tg = &plan.load_balancer.target_group;
        assert_eq!(tg.health_check.interval_ms, 1500);
        assert_eq!(tg.health_check.timeout_ms, 1000);
        assert!(tg.health_check.timeout_ms < tg.health_check.interval_ms);
        assert_eq!(tg.deregistration_delay_ms, 250);
    }

    #[test]
    fn bootstrap_joins_cluster() {
        let plan = render("[app]\nname = \"webapp\"\n");
        assert_eq!(
            plan.cluster.user_data[0],
            "echo ECS_CLUSTER=webapp-cluster >> /etc/ecs/ecs.config"
        );
    }

    #[test]
    fn fingerprint_is_stable_and_sensitive() {
        let a = render("[app]\nname = \"webapp\"\n");
        let b = render("[app]\nname = \"webapp\"\n");
        let c = render("[app]\nname = \"webapp\"\n[container]\nport = 8080\n");
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_ne!(a.fingerprint().unwrap(), c.fingerprint().unwrap());
        assert_eq!(a.fingerprint().unwrap().len(), 64);
    }

    #[test]
    fn json_roundtrips() {
        let plan = render("[app]\nname = \"webapp\"\n");
        let json = plan.to_json().unwrap();
        let back: DeploymentPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
