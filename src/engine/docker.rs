//! Docker Engine API implementation of [`ContainerEngine`]

use super::{
    ContainerEngine, ContainerInfo, EngineError, EngineResult, ExecSession, OutputChunk, OutputKind,
};
use crate::container::config::{CreationSpec, HostBinding, PortMap, RestartPolicy};
use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, LogOutput, LogsOptions,
    RemoveContainerOptions, StartContainerOptions, StopContainerOptions, WaitContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{
    EndpointSettings, HostConfig, Mount, MountTypeEnum, PortBinding,
    RestartPolicy as EngineRestartPolicy, RestartPolicyNameEnum,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Container engine reached through the Docker Engine API
#[derive(Debug, Clone)]
pub struct DockerEngine {
    docker: Docker,
    endpoint: String,
}

impl DockerEngine {
    /// Bind to the local engine (`DOCKER_HOST` or the default socket)
    pub fn local(timeout_secs: u64) -> EngineResult<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(map_error)?
            .with_timeout(Duration::from_secs(timeout_secs));

        Ok(Self {
            docker,
            endpoint: "local".to_string(),
        })
    }

    /// Bind to a remote engine listening on plain HTTP.
    ///
    /// No connection is made here; the first call will fail with
    /// [`EngineError::Unreachable`] if the engine is not there.
    pub fn remote(address: &str, timeout_secs: u64) -> EngineResult<Self> {
        let docker = Docker::connect_with_http(address, timeout_secs, API_DEFAULT_VERSION)
            .map_err(map_error)?;

        Ok(Self {
            docker,
            endpoint: address.to_string(),
        })
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn inspect_container(&self, container: &str) -> EngineResult<ContainerInfo> {
        let response = self
            .docker
            .inspect_container(container, None::<InspectContainerOptions>)
            .await
            .map_err(map_error)?;

        Ok(ContainerInfo {
            id: response.id.unwrap_or_else(|| container.to_string()),
            image: response.config.and_then(|c| c.image).unwrap_or_default(),
            running: response.state.and_then(|s| s.running).unwrap_or(false),
            ports: response
                .network_settings
                .and_then(|n| n.ports)
                .map(from_engine_ports)
                .unwrap_or_default(),
        })
    }

    async fn create_container(&self, spec: &CreationSpec) -> EngineResult<String> {
        let options = spec.name.as_deref().map(|name| CreateContainerOptions {
            name,
            platform: None,
        });

        let response = self
            .docker
            .create_container(options, to_engine_config(spec))
            .await
            .map_err(map_error)?;

        for warning in &response.warnings {
            debug!(image = %spec.image, warning = %warning, "Engine warning on create");
        }

        Ok(response.id)
    }

    async fn start_container(&self, container: &str) -> EngineResult<()> {
        self.docker
            .start_container(container, None::<StartContainerOptions<String>>)
            .await
            .map_err(map_error)
    }

    async fn stop_container(&self, container: &str) -> EngineResult<()> {
        self.docker
            .stop_container(container, None::<StopContainerOptions>)
            .await
            .map_err(map_error)
    }

    async fn remove_container(&self, container: &str, force: bool) -> EngineResult<()> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };

        self.docker
            .remove_container(container, Some(options))
            .await
            .map_err(map_error)
    }

    async fn wait_container(&self, container: &str) -> EngineResult<i64> {
        let mut stream = self
            .docker
            .wait_container(container, None::<WaitContainerOptions<String>>);

        let mut exit_code = 0;
        while let Some(item) = stream.next().await {
            match item {
                Ok(response) => exit_code = response.status_code,
                // Non-zero exits arrive as an error carrying the code
                Err(BollardError::DockerContainerWaitError { code, .. }) => exit_code = code,
                Err(e) => return Err(map_error(e)),
            }
        }

        Ok(exit_code)
    }

    async fn container_logs(&self, container: &str) -> EngineResult<String> {
        let options = LogsOptions::<String> {
            stdout: true,
            stderr: true,
            follow: false,
            ..Default::default()
        };

        let mut stream = self.docker.logs(container, Some(options));
        let mut logs = String::new();
        while let Some(item) = stream.next().await {
            logs.push_str(&item.map_err(map_error)?.to_string());
        }

        Ok(logs)
    }

    async fn inspect_network(&self, network: &str) -> EngineResult<String> {
        let response = self
            .docker
            .inspect_network(network, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(map_error)?;

        Ok(response.id.unwrap_or_else(|| network.to_string()))
    }

    async fn create_network(&self, network: &str) -> EngineResult<String> {
        let options = CreateNetworkOptions {
            name: network.to_string(),
            ..Default::default()
        };

        let response = self.docker.create_network(options).await.map_err(map_error)?;

        if response.id.is_empty() {
            return Err(EngineError::Api {
                status: None,
                message: format!("engine returned no id for network {}", network),
            });
        }

        Ok(response.id)
    }

    async fn connect_network(&self, network: &str, container: &str) -> EngineResult<()> {
        let options = ConnectNetworkOptions {
            container: container.to_string(),
            endpoint_config: EndpointSettings::default(),
        };

        self.docker
            .connect_network(network, options)
            .await
            .map_err(map_error)
    }

    async fn exec(&self, container: &str, cmd: &[String]) -> EngineResult<ExecSession> {
        let options = CreateExecOptions {
            cmd: Some(cmd.to_vec()),
            attach_stdout: Some(true),
            attach_stderr: Some(true),
            ..Default::default()
        };

        let created = self
            .docker
            .create_exec(container, options)
            .await
            .map_err(map_error)?;

        let output = match self.docker.start_exec(&created.id, None).await.map_err(map_error)? {
            StartExecResults::Attached { output, .. } => output
                .map(|item| item.map(to_chunk).map_err(map_error))
                .boxed(),
            StartExecResults::Detached => futures::stream::empty().boxed(),
        };

        Ok(ExecSession {
            id: created.id,
            output,
        })
    }

    async fn exec_exit_code(&self, exec_id: &str) -> EngineResult<Option<i64>> {
        let inspected = self.docker.inspect_exec(exec_id).await.map_err(map_error)?;
        Ok(inspected.exit_code)
    }
}

/// Translate a creation spec into the engine's create body
fn to_engine_config(spec: &CreationSpec) -> Config<String> {
    let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
        .exposed_ports
        .iter()
        .map(|port| (port.clone(), HashMap::new()))
        .collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
        .port_bindings
        .iter()
        .map(|(port, bindings)| {
            let bindings = bindings
                .iter()
                .map(|b| PortBinding {
                    host_ip: b.host_ip.clone(),
                    host_port: b.host_port.clone(),
                })
                .collect();
            (port.clone(), Some(bindings))
        })
        .collect();

    let volumes: HashMap<String, HashMap<(), ()>> = spec
        .volumes
        .iter()
        .map(|path| (path.clone(), HashMap::new()))
        .collect();

    let mounts: Vec<Mount> = spec
        .mounts
        .iter()
        .map(|m| Mount {
            target: Some(m.container_path.clone()),
            source: Some(m.host_path.clone()),
            typ: Some(MountTypeEnum::VOLUME),
            ..Default::default()
        })
        .collect();

    let host_config = HostConfig {
        port_bindings: non_empty_map(port_bindings),
        binds: non_empty(spec.binds.clone()),
        mounts: non_empty(mounts),
        restart_policy: spec.restart_policy.map(|policy| EngineRestartPolicy {
            name: Some(restart_policy_name(policy)),
            maximum_retry_count: None,
        }),
        runtime: spec.runtime.clone(),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        cmd: non_empty(spec.cmd.clone()),
        env: non_empty(spec.env.clone()),
        working_dir: spec.working_dir.clone(),
        exposed_ports: non_empty_map(exposed_ports),
        volumes: non_empty_map(volumes),
        host_config: Some(host_config),
        ..Default::default()
    }
}

fn restart_policy_name(policy: RestartPolicy) -> RestartPolicyNameEnum {
    match policy {
        RestartPolicy::No => RestartPolicyNameEnum::NO,
        RestartPolicy::Always => RestartPolicyNameEnum::ALWAYS,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
        RestartPolicy::OnFailure => RestartPolicyNameEnum::ON_FAILURE,
    }
}

fn from_engine_ports(ports: HashMap<String, Option<Vec<PortBinding>>>) -> PortMap {
    ports
        .into_iter()
        .map(|(port, bindings)| {
            let bindings = bindings.map(|list| {
                list.into_iter()
                    .map(|b| HostBinding {
                        host_ip: b.host_ip,
                        host_port: b.host_port,
                    })
                    .collect()
            });
            (port, bindings)
        })
        .collect()
}

fn to_chunk(output: LogOutput) -> OutputChunk {
    let (kind, message) = match output {
        LogOutput::StdOut { message } => (OutputKind::Stdout, message),
        LogOutput::StdErr { message } => (OutputKind::Stderr, message),
        LogOutput::Console { message } | LogOutput::StdIn { message } => {
            (OutputKind::Console, message)
        }
    };

    OutputChunk {
        kind,
        text: String::from_utf8_lossy(&message).into_owned(),
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items)
    }
}

fn non_empty_map<V>(map: HashMap<String, V>) -> Option<HashMap<String, V>> {
    if map.is_empty() {
        None
    } else {
        Some(map)
    }
}

/// Coarsen a Docker client error into an [`EngineError`]
pub(crate) fn map_error(err: BollardError) -> EngineError {
    match err {
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } => match status_code {
            404 => EngineError::NotFound(message),
            304 => EngineError::NotModified(message),
            409 => EngineError::Conflict(message),
            status => EngineError::Api {
                status: Some(status),
                message,
            },
        },
        BollardError::RequestTimeoutError => {
            EngineError::Unreachable("request to container engine timed out".to_string())
        }
        e @ (BollardError::IOError { .. } | BollardError::HyperResponseError { .. }) => {
            EngineError::Unreachable(e.to_string())
        }
        other => EngineError::Api {
            status: None,
            message: other.to_string(),
        },
    }
}
