//! Error types for Lanzo

use crate::engine::EngineError;
use thiserror::Error;

/// Result type for Lanzo operations
pub type Result<T> = std::result::Result<T, LanzoError>;

/// Lanzo error types
#[derive(Error, Debug)]
pub enum LanzoError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Container engine unreachable: {0}")]
    EngineUnreachable(String),

    #[error("Container not found: {0}")]
    ContainerNotFound(String),

    #[error("Failed to create container {name}: {reason}")]
    CreationFailed { name: String, reason: String },

    #[error("Failed to start container {name}: {reason}")]
    StartFailed { name: String, reason: String },

    #[error("Failed to attach container {container} to network {network}: {reason}")]
    NetworkAttachFailed {
        container: String,
        network: String,
        reason: String,
    },

    #[error("Failed to remove container {name}: {reason}")]
    RemovalFailed { name: String, reason: String },

    #[error("Invalid service registry: {0}")]
    InvalidRegistry(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid provisioning path: {0}")]
    InvalidProvisionPath(String),

    #[error("Provisioning command {command} failed: {logs}")]
    ProvisionFailed { command: String, logs: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LanzoError {
    /// Classify an engine failure.
    ///
    /// Transport failures always become [`LanzoError::EngineUnreachable`];
    /// anything the engine itself reported is handed to `op` with the
    /// engine's message untouched.
    pub fn from_engine(err: EngineError, op: impl FnOnce(String) -> LanzoError) -> Self {
        match err {
            EngineError::Unreachable(message) => LanzoError::EngineUnreachable(message),
            other => op(other.to_string()),
        }
    }

    /// Returns true if this error says something does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LanzoError::UnknownService(_) | LanzoError::ContainerNotFound(_)
        )
    }
}
