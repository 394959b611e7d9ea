//! Terraform command runner

use super::{PROVISION_ENV, TERRAFORM_IMAGE, WORKSPACE_MOUNT};
use crate::container::CreationSpec;
use crate::engine::ContainerEngine;
use crate::error::{LanzoError, Result};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

fn workspace_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("valid regex"))
}

/// A Terraform invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionCommand {
    Init,
    Apply,
    Destroy,
}

impl ProvisionCommand {
    /// Arguments passed to the terraform entrypoint
    pub fn args(&self) -> Vec<String> {
        let args: &[&str] = match self {
            ProvisionCommand::Init => &["init"],
            ProvisionCommand::Apply => &["apply", "-auto-approve"],
            ProvisionCommand::Destroy => &["destroy", "-auto-approve"],
        };
        args.iter().map(|a| a.to_string()).collect()
    }
}

impl fmt::Display for ProvisionCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionCommand::Init => write!(f, "init"),
            ProvisionCommand::Apply => write!(f, "apply"),
            ProvisionCommand::Destroy => write!(f, "destroy"),
        }
    }
}

/// Logs of a full deploy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployOutput {
    pub init: String,
    pub apply: String,
}

/// Runs provisioning commands for directories under one root
#[derive(Debug, Clone)]
pub struct Provisioner {
    root: PathBuf,
}

impl Provisioner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve and check the provisioning directory for `name`
    pub fn workspace(&self, name: &str) -> Result<PathBuf> {
        if !workspace_name_regex().is_match(name) {
            return Err(LanzoError::InvalidProvisionPath(name.to_string()));
        }

        let dir = self.root.join(name);
        if !dir.is_dir() {
            return Err(LanzoError::InvalidProvisionPath(dir.display().to_string()));
        }

        std::fs::canonicalize(&dir)
            .map_err(|e| LanzoError::InvalidProvisionPath(format!("{}: {}", dir.display(), e)))
    }

    /// `init` then `apply`; stops at the first failing command
    pub async fn deploy(&self, engine: &dyn ContainerEngine, name: &str) -> Result<DeployOutput> {
        let workspace = self.workspace(name)?;
        info!(workspace = %workspace.display(), "Deploying infrastructure");

        let init = self.run_command(engine, &workspace, ProvisionCommand::Init).await?;
        let apply = self.run_command(engine, &workspace, ProvisionCommand::Apply).await?;
        Ok(DeployOutput { init, apply })
    }

    pub async fn destroy(&self, engine: &dyn ContainerEngine, name: &str) -> Result<String> {
        let workspace = self.workspace(name)?;
        info!(workspace = %workspace.display(), "Destroying infrastructure");

        self.run_command(engine, &workspace, ProvisionCommand::Destroy).await
    }

    /// Run one command to completion and return its combined output.
    ///
    /// The container is removed whatever the outcome.
    pub async fn run_command(
        &self,
        engine: &dyn ContainerEngine,
        workspace: &Path,
        command: ProvisionCommand,
    ) -> Result<String> {
        let spec = command_spec(workspace, command);
        let id = engine.create_container(&spec).await.map_err(|e| {
            LanzoError::from_engine(e, |reason| LanzoError::CreationFailed {
                name: TERRAFORM_IMAGE.to_string(),
                reason,
            })
        })?;
        debug!(command = %command, container = %id, "Created provisioning container");

        let outcome = execute(engine, &id, command).await;

        if let Err(e) = engine.remove_container(&id, true).await {
            warn!(container = %id, error = %e, "Failed to remove provisioning container");
        }

        let (exit_code, logs) = outcome?;
        if exit_code != 0 {
            warn!(command = %command, exit_code, "Provisioning command failed");
            return Err(LanzoError::ProvisionFailed {
                command: command.to_string(),
                logs,
            });
        }

        info!(command = %command, "Provisioning command finished");
        Ok(logs)
    }
}

async fn execute(
    engine: &dyn ContainerEngine,
    id: &str,
    command: ProvisionCommand,
) -> Result<(i64, String)> {
    let failed = |reason: String| LanzoError::ProvisionFailed {
        command: command.to_string(),
        logs: reason,
    };

    engine.start_container(id).await.map_err(|e| {
        LanzoError::from_engine(e, |reason| LanzoError::StartFailed {
            name: id.to_string(),
            reason,
        })
    })?;

    let exit_code = engine
        .wait_container(id)
        .await
        .map_err(|e| LanzoError::from_engine(e, failed))?;

    let logs = engine
        .container_logs(id)
        .await
        .map_err(|e| LanzoError::from_engine(e, failed))?;

    Ok((exit_code, logs))
}

fn command_spec(workspace: &Path, command: ProvisionCommand) -> CreationSpec {
    let host_path = workspace.to_string_lossy().replace('\\', "/");

    PROVISION_ENV.iter().fold(
        CreationSpec::new(TERRAFORM_IMAGE)
            .cmd(command.args())
            .working_dir(WORKSPACE_MOUNT)
            .bind(&format!("{}:{}", host_path, WORKSPACE_MOUNT)),
        |spec, (key, value)| spec.env(key, value),
    )
}
