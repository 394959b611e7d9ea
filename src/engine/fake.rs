//! In-memory recording engine for tests

use super::{
    ContainerEngine, ContainerInfo, EngineError, EngineResult, ExecSession, OutputChunk, OutputKind,
};
use crate::container::config::{CreationSpec, PortMap};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub spec: CreationSpec,
    pub running: bool,
    pub networks: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    next_id: usize,
    containers: BTreeMap<String, FakeContainer>,
    networks: BTreeMap<String, String>,
    calls: Vec<String>,
    failures: HashMap<(String, String), EngineError>,
    exit_codes: HashMap<String, i64>,
    logs: String,
    exec_output: Vec<String>,
    exec_exit_code: i64,
    execs: Vec<(String, Vec<String>)>,
}

impl FakeState {
    /// Resolve an id or a name to the container's name
    fn resolve(&self, container: &str) -> Option<String> {
        if self.containers.contains_key(container) {
            return Some(container.to_string());
        }
        self.containers
            .values()
            .find(|c| c.id == container)
            .map(|c| c.name.clone())
    }

    fn record(&mut self, op: &str, target: &str) -> EngineResult<()> {
        self.calls.push(format!("{} {}", op, target));
        match self.failures.get(&(op.to_string(), target.to_string())) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

/// Engine double that keeps containers and networks in memory and logs
/// every call as `"<op> <name>"`
#[derive(Clone, Default)]
pub struct RecordingEngine {
    state: Arc<Mutex<FakeState>>,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `op` against `target` (a container or network name) fail
    pub fn fail(&self, op: &str, target: &str, err: EngineError) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op.to_string(), target.to_string()), err);
    }

    /// Pretend a container already exists
    pub fn seed_container(&self, name: &str, image: &str, running: bool) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("id-{}", state.next_id);
        state.containers.insert(
            name.to_string(),
            FakeContainer {
                id: id.clone(),
                name: name.to_string(),
                spec: CreationSpec::new(image).name(name),
                running,
                networks: Vec::new(),
            },
        );
        id
    }

    /// Pretend a network already exists
    pub fn seed_network(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .networks
            .insert(name.to_string(), format!("net-{}", name));
    }

    pub fn set_exit_code(&self, image: &str, code: i64) {
        self.state
            .lock()
            .unwrap()
            .exit_codes
            .insert(image.to_string(), code);
    }

    pub fn set_logs(&self, logs: &str) {
        self.state.lock().unwrap().logs = logs.to_string();
    }

    pub fn set_exec_output(&self, lines: &[&str]) {
        self.state.lock().unwrap().exec_output = lines.iter().map(|l| l.to_string()).collect();
    }

    /// Exit code reported for every exec session
    pub fn set_exec_exit_code(&self, code: i64) {
        self.state.lock().unwrap().exec_exit_code = code;
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls for one operation, in order
    pub fn calls_of(&self, op: &str) -> Vec<String> {
        let prefix = format!("{} ", op);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.state.lock().unwrap().containers.get(name).cloned()
    }

    pub fn container_names(&self) -> Vec<String> {
        self.state.lock().unwrap().containers.keys().cloned().collect()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().unwrap().networks.contains_key(name)
    }

    pub fn execs(&self) -> Vec<(String, Vec<String>)> {
        self.state.lock().unwrap().execs.clone()
    }
}

fn no_such_container(container: &str) -> EngineError {
    EngineError::NotFound(format!("No such container: {}", container))
}

#[async_trait]
impl ContainerEngine for RecordingEngine {
    fn endpoint(&self) -> &str {
        "fake"
    }

    async fn inspect_container(&self, container: &str) -> EngineResult<ContainerInfo> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("inspect", &name)?;

        let found = state
            .containers
            .get(&name)
            .ok_or_else(|| no_such_container(container))?;

        let ports: PortMap = found
            .spec
            .port_bindings
            .iter()
            .map(|(port, bindings)| (port.clone(), Some(bindings.clone())))
            .collect();

        Ok(ContainerInfo {
            id: found.id.clone(),
            image: found.spec.image.clone(),
            running: found.running,
            ports,
        })
    }

    async fn create_container(&self, spec: &CreationSpec) -> EngineResult<String> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("id-{}", state.next_id);
        let name = spec.name.clone().unwrap_or_else(|| format!("anon-{}", id));
        state.record("create", &name)?;

        if state.containers.contains_key(&name) {
            return Err(EngineError::Conflict(format!(
                "Conflict. The container name \"/{}\" is already in use",
                name
            )));
        }

        state.containers.insert(
            name.clone(),
            FakeContainer {
                id: id.clone(),
                name,
                spec: spec.clone(),
                running: false,
                networks: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn start_container(&self, container: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("start", &name)?;

        let found = state
            .containers
            .get_mut(&name)
            .ok_or_else(|| no_such_container(container))?;
        if found.running {
            return Err(EngineError::NotModified("container already started".to_string()));
        }
        found.running = true;
        Ok(())
    }

    async fn stop_container(&self, container: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("stop", &name)?;

        let found = state
            .containers
            .get_mut(&name)
            .ok_or_else(|| no_such_container(container))?;
        if !found.running {
            return Err(EngineError::NotModified("container already stopped".to_string()));
        }
        found.running = false;
        Ok(())
    }

    async fn remove_container(&self, container: &str, force: bool) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("remove", &name)?;

        let running = state
            .containers
            .get(&name)
            .map(|c| c.running)
            .ok_or_else(|| no_such_container(container))?;
        if running && !force {
            return Err(EngineError::Conflict(format!(
                "You cannot remove a running container {}",
                name
            )));
        }
        state.containers.remove(&name);
        Ok(())
    }

    async fn wait_container(&self, container: &str) -> EngineResult<i64> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("wait", &name)?;

        let image = state
            .containers
            .get(&name)
            .map(|c| c.spec.image.clone())
            .ok_or_else(|| no_such_container(container))?;
        let code = state.exit_codes.get(&image).copied().unwrap_or(0);
        if let Some(found) = state.containers.get_mut(&name) {
            found.running = false;
        }
        Ok(code)
    }

    async fn container_logs(&self, container: &str) -> EngineResult<String> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("logs", &name)?;
        Ok(state.logs.clone())
    }

    async fn inspect_network(&self, network: &str) -> EngineResult<String> {
        let mut state = self.state.lock().unwrap();
        state.record("inspect_network", network)?;
        state
            .networks
            .get(network)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("network {} not found", network)))
    }

    async fn create_network(&self, network: &str) -> EngineResult<String> {
        let mut state = self.state.lock().unwrap();
        state.record("create_network", network)?;
        let id = format!("net-{}", network);
        state.networks.insert(network.to_string(), id.clone());
        Ok(id)
    }

    async fn connect_network(&self, network: &str, container: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        let network_name = state
            .networks
            .iter()
            .find(|(name, id)| name.as_str() == network || id.as_str() == network)
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| network.to_string());
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("connect_network", &format!("{} {}", network_name, name))?;

        if !state.networks.contains_key(&network_name) {
            return Err(EngineError::NotFound(format!("network {} not found", network)));
        }
        let found = state
            .containers
            .get_mut(&name)
            .ok_or_else(|| no_such_container(container))?;
        found.networks.push(network_name);
        Ok(())
    }

    async fn exec(&self, container: &str, cmd: &[String]) -> EngineResult<ExecSession> {
        let mut state = self.state.lock().unwrap();
        let name = state.resolve(container).unwrap_or_else(|| container.to_string());
        state.record("exec", &name)?;

        let running = state
            .containers
            .get(&name)
            .map(|c| c.running)
            .ok_or_else(|| no_such_container(container))?;
        if !running {
            return Err(EngineError::Conflict(format!("container {} is not running", name)));
        }

        state.execs.push((name, cmd.to_vec()));
        let id = format!("exec-{}", state.execs.len());
        let chunks: Vec<EngineResult<OutputChunk>> = state
            .exec_output
            .iter()
            .map(|line| {
                Ok(OutputChunk {
                    kind: OutputKind::Stdout,
                    text: line.clone(),
                })
            })
            .collect();

        Ok(ExecSession {
            id,
            output: futures::stream::iter(chunks).boxed(),
        })
    }

    async fn exec_exit_code(&self, exec_id: &str) -> EngineResult<Option<i64>> {
        let state = self.state.lock().unwrap();
        let known = exec_id
            .strip_prefix("exec-")
            .and_then(|n| n.parse::<usize>().ok())
            .is_some_and(|n| n >= 1 && n <= state.execs.len());
        if !known {
            return Err(EngineError::NotFound(format!("No such exec instance: {}", exec_id)));
        }
        Ok(Some(state.exec_exit_code))
    }
}
