//! Service descriptors

use crate::container::config::{HostBinding, RestartPolicy, VolumeMount};
use crate::error::{LanzoError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Names the engine accepts for containers
const CONTAINER_NAME_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9_.-]+$";

fn container_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(CONTAINER_NAME_PATTERN).expect("container name pattern is valid"))
}

/// A registered service, resolved once at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ServiceDescriptor {
    /// A single deployable container
    Concrete(ConcreteService),
    /// A named, ordered group of other services
    Composite(CompositeService),
}

impl ServiceDescriptor {
    /// Registry key of this service
    pub fn name(&self) -> &str {
        match self {
            ServiceDescriptor::Concrete(s) => &s.name,
            ServiceDescriptor::Composite(c) => &c.name,
        }
    }

    /// Returns true for composite services
    pub fn is_composite(&self) -> bool {
        matches!(self, ServiceDescriptor::Composite(_))
    }

    /// Services this one refers to: members for a composite, dependencies
    /// for a concrete service
    pub fn references(&self) -> &[String] {
        match self {
            ServiceDescriptor::Concrete(s) => &s.depends_on,
            ServiceDescriptor::Composite(c) => &c.members,
        }
    }
}

/// A service backed by exactly one container
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConcreteService {
    pub name: String,
    pub image: String,
    pub container_name: String,
    /// Container port (`80/tcp`) to host bindings
    pub port_bindings: BTreeMap<String, Vec<HostBinding>>,
    pub env: Vec<String>,
    pub binds: Vec<String>,
    pub volumes: Vec<VolumeMount>,
    pub network: Option<String>,
    pub restart_policy: Option<RestartPolicy>,
    pub runtime: Option<String>,
    /// Services that must be running before this one is created
    pub depends_on: Vec<String>,
    /// Command executed inside the container once it has settled
    pub post_start_command: Option<Vec<String>>,
}

/// A service that stands for an ordered list of member services
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompositeService {
    pub name: String,
    pub members: Vec<String>,
}

/// On-disk shape of a registry entry, before it is resolved into a
/// [`ServiceDescriptor`]
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawDescriptor {
    pub image: Option<String>,
    pub container_name: Option<String>,
    pub ports: BTreeMap<String, Vec<HostBinding>>,
    pub env: Vec<String>,
    pub binds: Vec<String>,
    pub volumes: Vec<VolumeMount>,
    pub network: Option<String>,
    pub restart: Option<RestartPolicy>,
    pub runtime: Option<String>,
    pub depends_on: Vec<String>,
    pub post_start: Option<Vec<String>>,
    pub services: Option<Vec<String>>,
}

impl RawDescriptor {
    /// Resolve into a concrete or composite descriptor
    pub fn resolve(self, name: &str) -> Result<ServiceDescriptor> {
        let declares_deployment = self.declares_deployment();
        if let Some(members) = self.services {
            if declares_deployment {
                return Err(invalid(
                    name,
                    "a composite service cannot declare deployment fields",
                ));
            }
            if members.is_empty() {
                return Err(invalid(name, "composite service has no members"));
            }
            return Ok(ServiceDescriptor::Composite(CompositeService {
                name: name.to_string(),
                members,
            }));
        }

        let image = self
            .image
            .filter(|i| !i.trim().is_empty())
            .ok_or_else(|| invalid(name, "concrete service has no image"))?;

        let container_name = self.container_name.unwrap_or_else(|| name.to_string());
        if !container_name_regex().is_match(&container_name) {
            return Err(invalid(
                name,
                &format!("invalid container name '{}'", container_name),
            ));
        }

        let mut port_bindings = BTreeMap::new();
        for (port, bindings) in self.ports {
            port_bindings.insert(normalize_port(name, &port)?, bindings);
        }

        for var in &self.env {
            match var.split_once('=') {
                Some((key, _)) if !key.is_empty() => {}
                _ => {
                    return Err(invalid(
                        name,
                        &format!("environment entry '{}' is not KEY=VALUE", var),
                    ))
                }
            }
        }

        if matches!(self.post_start, Some(ref cmd) if cmd.is_empty()) {
            return Err(invalid(name, "post_start command is empty"));
        }

        Ok(ServiceDescriptor::Concrete(ConcreteService {
            name: name.to_string(),
            image,
            container_name,
            port_bindings,
            env: self.env,
            binds: self.binds,
            volumes: self.volumes,
            network: self.network.filter(|n| !n.is_empty()),
            restart_policy: self.restart,
            runtime: self.runtime.filter(|r| !r.is_empty()),
            depends_on: self.depends_on,
            post_start_command: self.post_start,
        }))
    }

    fn declares_deployment(&self) -> bool {
        self.image.is_some()
            || self.container_name.is_some()
            || !self.ports.is_empty()
            || !self.env.is_empty()
            || !self.binds.is_empty()
            || !self.volumes.is_empty()
            || self.network.is_some()
            || self.restart.is_some()
            || self.runtime.is_some()
            || !self.depends_on.is_empty()
            || self.post_start.is_some()
    }
}

/// `80` becomes `80/tcp`; the protocol must be one the engine knows
fn normalize_port(service: &str, port: &str) -> Result<String> {
    let (number, protocol) = port.split_once('/').unwrap_or((port, "tcp"));

    match number.parse::<u16>() {
        Ok(n) if n > 0 => {}
        _ => return Err(invalid(service, &format!("invalid container port '{}'", port))),
    }
    if !matches!(protocol, "tcp" | "udp" | "sctp") {
        return Err(invalid(service, &format!("invalid port protocol '{}'", protocol)));
    }

    Ok(format!("{}/{}", number, protocol))
}

fn invalid(service: &str, message: &str) -> LanzoError {
    LanzoError::InvalidRegistry(format!("{}: {}", service, message))
}
