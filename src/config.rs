//! Runtime settings

use crate::container::post_start::{PostStartOptions, DEFAULT_SETTLE_DELAY};
use crate::engine::resolver::{DockerResolver, DEFAULT_ENGINE_PORT, DEFAULT_ENGINE_TIMEOUT_SECS};
use crate::error::{LanzoError, Result};
use crate::provision::Provisioner;
use crate::service::ServiceRegistry;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Default HTTP listen address
pub const DEFAULT_LISTEN: &str = "0.0.0.0:4000";

/// Default root of the provisioning directories
pub const DEFAULT_PROVISION_ROOT: &str = "./terraform";

/// Lanzo settings
#[derive(Debug, Clone)]
pub struct Settings {
    /// HTTP listen address
    pub listen: SocketAddr,
    /// Service registry file replacing the built-in table
    pub registry_path: Option<PathBuf>,
    /// Port of remote engines
    pub engine_port: u16,
    /// Per-request engine timeout in seconds
    pub engine_timeout_secs: u64,
    /// Wait before post-start commands
    pub settle_delay: Duration,
    /// Root of the provisioning directories
    pub provision_root: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 4000)),
            registry_path: None,
            engine_port: DEFAULT_ENGINE_PORT,
            engine_timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
            settle_delay: DEFAULT_SETTLE_DELAY,
            provision_root: PathBuf::from(DEFAULT_PROVISION_ROOT),
        }
    }
}

impl Settings {
    /// Replace the listen port with the value of a `PORT`-style override
    pub fn with_port_override(mut self, port: Option<&str>) -> Result<Self> {
        if let Some(port) = port.map(str::trim).filter(|p| !p.is_empty()) {
            let port: u16 = port
                .parse()
                .map_err(|_| LanzoError::InvalidConfig(format!("invalid port '{}'", port)))?;
            self.listen.set_port(port);
        }
        Ok(self)
    }

    /// Load the service registry.
    ///
    /// An explicit registry path must exist. Otherwise the per-user file is
    /// used when present, then the built-in table.
    pub fn load_registry(&self) -> Result<ServiceRegistry> {
        load_registry_from(self.registry_path.as_deref(), default_registry_path().as_deref())
    }

    pub fn resolver(&self) -> DockerResolver {
        DockerResolver::new(self.engine_port, self.engine_timeout_secs)
    }

    pub fn post_start_options(&self) -> PostStartOptions {
        PostStartOptions::default().with_settle_delay(self.settle_delay)
    }

    pub fn provisioner(&self) -> Provisioner {
        Provisioner::new(&self.provision_root)
    }
}

/// Per-user registry file, `<config dir>/lanzo/services.yaml`
pub fn default_registry_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lanzo").join("services.yaml"))
}

fn load_registry_from(explicit: Option<&Path>, fallback: Option<&Path>) -> Result<ServiceRegistry> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "Loading service registry");
        return ServiceRegistry::from_file(path);
    }

    match fallback {
        Some(path) if path.is_file() => {
            info!(path = %path.display(), "Loading service registry");
            ServiceRegistry::from_file(path)
        }
        _ => {
            debug!("Using built-in service registry");
            ServiceRegistry::builtin()
        }
    }
}
