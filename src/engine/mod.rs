//! Container engine boundary
//!
//! Everything Lanzo asks of a container engine goes through the
//! [`ContainerEngine`] trait. The Docker implementation lives in
//! [`docker`]; [`resolver`] turns an optional target host into a bound
//! engine handle.

pub mod docker;
#[cfg(test)]
pub mod fake;
pub mod resolver;

use crate::container::config::{CreationSpec, PortMap};
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

pub use docker::DockerEngine;
pub use resolver::{DockerResolver, EngineResolver};

/// Result type for engine calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Failures reported by a container engine, coarsened to what the
/// orchestration code needs to tell apart
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The named object does not exist
    #[error("{0}")]
    NotFound(String),

    /// The request had no effect, e.g. stopping a stopped container
    #[error("{0}")]
    NotModified(String),

    /// The request conflicts with current engine state, e.g. a name in use
    #[error("{0}")]
    Conflict(String),

    /// The engine could not be reached at all
    #[error("{0}")]
    Unreachable(String),

    /// Any other engine-reported failure
    #[error("{message}")]
    Api {
        status: Option<u16>,
        message: String,
    },
}

/// What an inspect call tells us about a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub image: String,
    pub running: bool,
    /// Published-port table, verbatim from the engine
    pub ports: PortMap,
}

/// Which output stream a chunk came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Stdout,
    Stderr,
    Console,
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputKind::Stdout => write!(f, "stdout"),
            OutputKind::Stderr => write!(f, "stderr"),
            OutputKind::Console => write!(f, "console"),
        }
    }
}

/// One chunk of output from an exec session or container logs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputChunk {
    pub kind: OutputKind,
    pub text: String,
}

/// Streamed output of a command running inside a container
pub type ExecOutput = BoxStream<'static, EngineResult<OutputChunk>>;

/// A command started inside a container
pub struct ExecSession {
    /// Engine id of the exec instance, for reading its exit code later
    pub id: String,
    pub output: ExecOutput,
}

/// A handle bound to one container engine endpoint.
///
/// Containers may be addressed by id or by name.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Endpoint this handle talks to, for logging
    fn endpoint(&self) -> &str;

    /// Inspect a container
    async fn inspect_container(&self, container: &str) -> EngineResult<ContainerInfo>;

    /// Create a container, returning its id
    async fn create_container(&self, spec: &CreationSpec) -> EngineResult<String>;

    /// Start a created container
    async fn start_container(&self, container: &str) -> EngineResult<()>;

    /// Stop a running container
    async fn stop_container(&self, container: &str) -> EngineResult<()>;

    /// Remove a container
    async fn remove_container(&self, container: &str, force: bool) -> EngineResult<()>;

    /// Wait for a container to exit, returning its exit code
    async fn wait_container(&self, container: &str) -> EngineResult<i64>;

    /// Collect a container's stdout and stderr so far
    async fn container_logs(&self, container: &str) -> EngineResult<String>;

    /// Look up a network by name, returning its id
    async fn inspect_network(&self, network: &str) -> EngineResult<String>;

    /// Create a network with the default driver, returning its id
    async fn create_network(&self, network: &str) -> EngineResult<String>;

    /// Connect a container to a network
    async fn connect_network(&self, network: &str, container: &str) -> EngineResult<()>;

    /// Run a command inside a running container, streaming its output
    async fn exec(&self, container: &str, cmd: &[String]) -> EngineResult<ExecSession>;

    /// Exit code of an exec session, `None` if the engine reports none yet
    async fn exec_exit_code(&self, exec_id: &str) -> EngineResult<Option<i64>>;
}
