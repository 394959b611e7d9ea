//! Container creation specs

use crate::service::ConcreteService;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Published-port table as reported by the engine: container port
/// (`80/tcp`) to host bindings. `None` marks a port that is exposed but
/// not published.
pub type PortMap = BTreeMap<String, Option<Vec<HostBinding>>>;

/// A single host-side binding of a container port
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostBinding {
    #[serde(
        rename = "HostIp",
        alias = "host_ip",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub host_ip: Option<String>,
    #[serde(
        rename = "HostPort",
        alias = "host_port",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub host_port: Option<String>,
}

impl HostBinding {
    /// Bind to a host port on all interfaces
    pub fn port(host_port: &str) -> Self {
        Self {
            host_ip: None,
            host_port: Some(host_port.to_string()),
        }
    }
}

/// Restart policy names understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestartPolicy {
    No,
    Always,
    UnlessStopped,
    OnFailure,
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RestartPolicy::No => write!(f, "no"),
            RestartPolicy::Always => write!(f, "always"),
            RestartPolicy::UnlessStopped => write!(f, "unless-stopped"),
            RestartPolicy::OnFailure => write!(f, "on-failure"),
        }
    }
}

/// Named volume (or host path) mounted into a container with mount kind "volume"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub host_path: String,
    pub container_path: String,
}

/// Everything the engine needs to create one container.
///
/// Optional fields stay `None` unless declared so that engine defaults are
/// never overridden by empty values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreationSpec {
    /// Container name; anonymous when `None`
    pub name: Option<String>,
    /// Image reference
    pub image: String,
    /// Command override
    pub cmd: Vec<String>,
    /// Environment as `KEY=VALUE`, in declared order
    pub env: Vec<String>,
    /// Working directory override
    pub working_dir: Option<String>,
    /// Exposed container ports
    pub exposed_ports: BTreeSet<String>,
    /// Container port to host bindings
    pub port_bindings: BTreeMap<String, Vec<HostBinding>>,
    /// Raw `host:container` bind specs
    pub binds: Vec<String>,
    /// Volume declarations keyed by container path
    pub volumes: BTreeSet<String>,
    /// Volume mounts
    pub mounts: Vec<VolumeMount>,
    /// Restart policy
    pub restart_policy: Option<RestartPolicy>,
    /// Alternate execution runtime
    pub runtime: Option<String>,
}

impl CreationSpec {
    /// Create a new spec for an image
    pub fn new(image: &str) -> Self {
        Self {
            image: image.to_string(),
            ..Default::default()
        }
    }

    /// Build the spec for a concrete service descriptor
    pub fn for_service(service: &ConcreteService) -> Self {
        let mut spec = Self::new(&service.image).name(&service.container_name);

        for (container_port, bindings) in &service.port_bindings {
            spec = spec.port(container_port, bindings.clone());
        }
        for var in &service.env {
            spec.env.push(var.clone());
        }
        for bind in &service.binds {
            spec = spec.bind(bind);
        }
        for volume in &service.volumes {
            spec = spec.volume(&volume.host_path, &volume.container_path);
        }

        spec.restart_policy = service.restart_policy;
        spec.runtime = service.runtime.clone();
        spec
    }

    /// Set container name
    pub fn name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Set command to run
    pub fn cmd(mut self, cmd: Vec<String>) -> Self {
        self.cmd = cmd;
        self
    }

    /// Add environment variable
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push(format!("{}={}", key, value));
        self
    }

    /// Set working directory
    pub fn working_dir(mut self, dir: &str) -> Self {
        self.working_dir = Some(dir.to_string());
        self
    }

    /// Expose a container port and bind it on the host
    pub fn port(mut self, container_port: &str, bindings: Vec<HostBinding>) -> Self {
        self.exposed_ports.insert(container_port.to_string());
        self.port_bindings
            .insert(container_port.to_string(), bindings);
        self
    }

    /// Add raw bind mount
    pub fn bind(mut self, spec: &str) -> Self {
        self.binds.push(spec.to_string());
        self
    }

    /// Add volume mount
    pub fn volume(mut self, host_path: &str, container_path: &str) -> Self {
        self.volumes.insert(container_path.to_string());
        self.mounts.push(VolumeMount {
            host_path: host_path.to_string(),
            container_path: container_path.to_string(),
        });
        self
    }
}
