//! Engine client resolution
//!
//! A fresh engine handle is built for every request from the request's
//! optional target host. Nothing is cached between requests.

use super::{ContainerEngine, DockerEngine};
use crate::error::{LanzoError, Result};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

/// Default port of a remote engine's plain-HTTP API
pub const DEFAULT_ENGINE_PORT: u16 = 2375;

/// Default per-request timeout against the engine, in seconds
pub const DEFAULT_ENGINE_TIMEOUT_SECS: u64 = 120;

/// Turns an optional target host into an engine handle
pub trait EngineResolver: Send + Sync {
    /// `None` or a blank host selects the default local engine
    fn resolve(&self, target_host: Option<&str>) -> Result<Arc<dyn ContainerEngine>>;
}

/// Resolver producing Docker engine handles
#[derive(Debug, Clone)]
pub struct DockerResolver {
    port: u16,
    timeout_secs: u64,
}

impl Default for DockerResolver {
    fn default() -> Self {
        Self {
            port: DEFAULT_ENGINE_PORT,
            timeout_secs: DEFAULT_ENGINE_TIMEOUT_SECS,
        }
    }
}

impl DockerResolver {
    /// Create a resolver for remote engines on `port`
    pub fn new(port: u16, timeout_secs: u64) -> Self {
        Self { port, timeout_secs }
    }
}

impl EngineResolver for DockerResolver {
    fn resolve(&self, target_host: Option<&str>) -> Result<Arc<dyn ContainerEngine>> {
        let engine = match normalize_target(target_host) {
            None => DockerEngine::local(self.timeout_secs),
            Some(host) => DockerEngine::remote(&engine_address(host, self.port)?, self.timeout_secs),
        }
        .map_err(|e| LanzoError::EngineUnreachable(e.to_string()))?;

        Ok(Arc::new(engine))
    }
}

/// Trim the target host; blank means "use the local engine"
pub fn normalize_target(target_host: Option<&str>) -> Option<&str> {
    target_host.map(str::trim).filter(|h| !h.is_empty())
}

/// Build the engine URL for a target host.
///
/// Hosts that already carry a scheme or a port are used as given. Only
/// the plain-HTTP `http://` and `tcp://` schemes are accepted.
pub fn engine_address(host: &str, port: u16) -> Result<String> {
    if host.starts_with("http://") || host.starts_with("tcp://") {
        return Ok(host.to_string());
    }
    if host.contains("://") {
        return Err(LanzoError::InvalidConfig(format!(
            "unsupported engine address scheme: {}",
            host
        )));
    }
    if let Ok(addr) = host.parse::<SocketAddr>() {
        return Ok(format!("http://{}", addr));
    }
    if let Ok(ip) = host.trim_matches(|c| c == '[' || c == ']').parse::<IpAddr>() {
        return Ok(format!("http://{}", SocketAddr::new(ip, port)));
    }
    if host.contains(':') {
        return Ok(format!("http://{}", host));
    }
    Ok(format!("http://{}:{}", host, port))
}
