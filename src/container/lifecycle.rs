//! Container lifecycle management

use super::config::CreationSpec;
use super::handle::{Deployment, RunningContainer};
use super::post_start::{self, PostStartOptions};
use crate::engine::{ContainerEngine, EngineError};
use crate::error::{LanzoError, Result};
use crate::network;
use crate::service::{ConcreteService, ServiceDescriptor, ServiceRegistry};
use chrono::Utc;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Drives services through their lifecycle against one engine.
///
/// Built per request; holds no container state of its own.
pub struct LifecycleController {
    pub(super) registry: Arc<ServiceRegistry>,
    pub(super) engine: Arc<dyn ContainerEngine>,
    post_start: PostStartOptions,
}

impl LifecycleController {
    /// Create a controller bound to one engine handle
    pub fn new(registry: Arc<ServiceRegistry>, engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            registry,
            engine,
            post_start: PostStartOptions::default(),
        }
    }

    /// Set how post-start commands are scheduled
    pub fn with_post_start(mut self, options: PostStartOptions) -> Self {
        self.post_start = options;
        self
    }

    /// Bring a service up.
    ///
    /// Composite services run their members in declared order and
    /// dependencies run before their dependents. Within one call each
    /// concrete service is brought up at most once; a service that is
    /// reached again (for instance a dependency that is also a stack
    /// member) reuses the container already started. The first failure
    /// aborts the call; services already started stay up.
    pub async fn run_service(&self, service: &str) -> Result<Deployment> {
        let mut started = HashMap::new();
        self.run_recursive(service, &mut started).await
    }

    fn run_recursive<'a>(
        &'a self,
        service: &'a str,
        started: &'a mut HashMap<String, RunningContainer>,
    ) -> BoxFuture<'a, Result<Deployment>> {
        Box::pin(async move {
            match self.registry.get(service)? {
                ServiceDescriptor::Composite(composite) => {
                    info!(service = %service, members = composite.members.len(), "Running composite service");
                    let mut deployments = Vec::with_capacity(composite.members.len());
                    for member in &composite.members {
                        deployments.push(self.run_recursive(member, started).await?);
                    }
                    Ok(Deployment::Group(deployments))
                }
                ServiceDescriptor::Concrete(concrete) => {
                    if let Some(container) = started.get(&concrete.name) {
                        debug!(service = %service, "Already started in this run");
                        return Ok(Deployment::Single(container.clone()));
                    }

                    for dependency in &concrete.depends_on {
                        debug!(service = %service, dependency = %dependency, "Starting dependency");
                        self.run_recursive(dependency, started).await?;
                    }

                    let container = self.recreate(concrete).await?;
                    started.insert(concrete.name.clone(), container.clone());
                    Ok(Deployment::Single(container))
                }
            }
        })
    }

    /// Tear down any stale container, then create, start and wire up a
    /// fresh one
    async fn recreate(&self, service: &ConcreteService) -> Result<RunningContainer> {
        self.pre_clean(service).await?;

        let spec = CreationSpec::for_service(service);
        let id = self
            .engine
            .create_container(&spec)
            .await
            .map_err(|e| {
                LanzoError::from_engine(e, |reason| LanzoError::CreationFailed {
                    name: service.container_name.clone(),
                    reason,
                })
            })?;
        info!(service = %service.name, container = %id, image = %service.image, "Created container");

        if let Err(e) = self.engine.start_container(&id).await {
            // The created container is left in place
            warn!(service = %service.name, container = %id, error = %e, "Container created but failed to start");
            return Err(LanzoError::from_engine(e, |reason| LanzoError::StartFailed {
                name: service.container_name.clone(),
                reason,
            }));
        }
        info!(service = %service.name, container = %id, endpoint = %self.engine.endpoint(), "Started container");

        if let Some(ref network_name) = service.network {
            network::ensure_attached(self.engine.as_ref(), &id, network_name).await?;
        }

        if let Some(ref command) = service.post_start_command {
            post_start::spawn(
                self.engine.clone(),
                service.name.clone(),
                id.clone(),
                command.clone(),
                &self.post_start,
            );
        }

        Ok(RunningContainer {
            id,
            name: service.container_name.clone(),
            service: service.name.clone(),
            image: service.image.clone(),
            network: service.network.clone(),
            started_at: Utc::now(),
        })
    }

    /// Remove a same-named container left over from an earlier run
    async fn pre_clean(&self, service: &ConcreteService) -> Result<()> {
        let name = &service.container_name;

        let existing = match self.engine.inspect_container(name).await {
            Ok(existing) => existing,
            Err(EngineError::NotFound(_)) => return Ok(()),
            Err(EngineError::Unreachable(message)) => {
                return Err(LanzoError::EngineUnreachable(message))
            }
            Err(e) => {
                warn!(container = %name, error = %e, "Could not inspect existing container, continuing");
                return Ok(());
            }
        };

        debug!(
            container = %name,
            id = %existing.id,
            image = %existing.image,
            "Removing stale container"
        );
        if let Err(e) = self.engine.stop_container(&existing.id).await {
            debug!(container = %name, error = %e, "Stop before removal failed");
        }

        match self.engine.remove_container(&existing.id, true).await {
            Ok(()) | Err(EngineError::NotFound(_)) => Ok(()),
            Err(e) => Err(LanzoError::from_engine(e, |reason| LanzoError::RemovalFailed {
                name: name.clone(),
                reason,
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::post_start::PostStartReport;
    use crate::engine::fake::RecordingEngine;
    use std::time::Duration;
    use tokio::sync::mpsc;

    const STACK: &str = r#"
db:
  image: mysql:5.7
  network: backend
  restart: always
wordpress:
  image: wordpress:latest
  ports:
    80/tcp:
      - host_port: "8000"
  network: backend
  depends_on:
    - db
stack:
  services:
    - db
    - wordpress
nested:
  services:
    - stack
    - cache
cache:
  image: redis:7
"#;

    fn controller(engine: &RecordingEngine) -> LifecycleController {
        let registry = Arc::new(ServiceRegistry::from_yaml_str(STACK).unwrap());
        LifecycleController::new(registry, Arc::new(engine.clone()))
    }

    #[tokio::test]
    async fn test_unknown_service_makes_no_engine_calls() {
        let engine = RecordingEngine::new();
        let err = controller(&engine).run_service("nope").await.unwrap_err();

        assert!(matches!(err, LanzoError::UnknownService(ref n) if n == "nope"));
        assert!(engine.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_single_service() {
        let engine = RecordingEngine::new();
        let deployment = controller(&engine).run_service("cache").await.unwrap();

        match deployment {
            Deployment::Single(container) => {
                assert_eq!(container.name, "cache");
                assert_eq!(container.image, "redis:7");
                assert_eq!(container.network, None);
            }
            Deployment::Group(_) => panic!("expected a single container"),
        }
        assert_eq!(
            engine.calls(),
            vec!["inspect cache", "create cache", "start cache"]
        );
        assert!(engine.container("cache").unwrap().running);
    }

    #[tokio::test]
    async fn test_stack_runs_in_order() {
        let engine = RecordingEngine::new();
        let deployment = controller(&engine).run_service("stack").await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                "inspect db",
                "create db",
                "start db",
                "inspect_network backend",
                "create_network backend",
                "connect_network backend db",
                "inspect wordpress",
                "create wordpress",
                "start wordpress",
                "inspect_network backend",
                "connect_network backend wordpress",
            ]
        );

        let names: Vec<&str> = deployment.containers().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["db", "wordpress"]);
    }

    #[tokio::test]
    async fn test_dependency_starts_before_dependent_is_created() {
        let engine = RecordingEngine::new();
        controller(&engine).run_service("wordpress").await.unwrap();

        let calls = engine.calls();
        let db_started = calls.iter().position(|c| c == "start db").unwrap();
        let wp_created = calls.iter().position(|c| c == "create wordpress").unwrap();
        assert!(db_started < wp_created);
        assert!(engine.container("db").unwrap().running);
    }

    #[tokio::test]
    async fn test_run_twice_leaves_one_container() {
        let engine = RecordingEngine::new();
        let controller = controller(&engine);

        let first = controller.run_service("cache").await.unwrap();
        let second = controller.run_service("cache").await.unwrap();

        assert_eq!(engine.container_names(), vec!["cache".to_string()]);
        let first_id = first.containers()[0].id.clone();
        let second_id = second.containers()[0].id.clone();
        assert_ne!(first_id, second_id);
        assert_eq!(engine.container("cache").unwrap().id, second_id);
        assert!(engine.calls().contains(&"remove cache".to_string()));
    }

    #[tokio::test]
    async fn test_pre_clean_tolerates_stopped_container() {
        let engine = RecordingEngine::new();
        engine.seed_container("cache", "redis:6", false);

        controller(&engine).run_service("cache").await.unwrap();

        assert_eq!(
            engine.calls(),
            vec![
                "inspect cache",
                "stop cache",
                "remove cache",
                "create cache",
                "start cache"
            ]
        );
        assert_eq!(engine.container("cache").unwrap().spec.image, "redis:7");
    }

    #[tokio::test]
    async fn test_nested_composite_groups_results() {
        let engine = RecordingEngine::new();
        let deployment = controller(&engine).run_service("nested").await.unwrap();

        match &deployment {
            Deployment::Group(members) => {
                assert_eq!(members.len(), 2);
                assert!(matches!(members[0], Deployment::Group(_)));
                assert!(matches!(members[1], Deployment::Single(_)));
            }
            Deployment::Single(_) => panic!("expected a group"),
        }
        assert_eq!(deployment.containers().len(), 3);
    }

    #[tokio::test]
    async fn test_member_failure_aborts_without_rollback() {
        let engine = RecordingEngine::new();
        engine.fail(
            "create",
            "wordpress",
            EngineError::Api {
                status: Some(500),
                message: "no space left".to_string(),
            },
        );

        let err = controller(&engine).run_service("stack").await.unwrap_err();

        assert!(matches!(err, LanzoError::CreationFailed { ref name, ref reason } if name == "wordpress" && reason == "no space left"));
        assert!(engine.container("db").unwrap().running);
        assert!(engine.calls_of("remove").is_empty());
    }

    #[tokio::test]
    async fn test_dependency_failure_aborts_before_dependent() {
        let registry = Arc::new(ServiceRegistry::builtin().unwrap());
        let engine = RecordingEngine::new();
        engine.fail(
            "create",
            "db-wordpress",
            EngineError::Api {
                status: Some(500),
                message: "image not found".to_string(),
            },
        );

        let err = LifecycleController::new(registry, Arc::new(engine.clone()))
            .run_service("wordpress")
            .await
            .unwrap_err();

        assert!(matches!(err, LanzoError::CreationFailed { ref name, .. } if name == "db-wordpress"));
        assert_eq!(engine.calls(), vec!["inspect db-wordpress", "create db-wordpress"]);
        assert!(engine.container("wordpress").is_none());
    }

    #[tokio::test]
    async fn test_name_conflict_surfaces_as_creation_failure() {
        let engine = RecordingEngine::new();
        engine.fail(
            "create",
            "cache",
            EngineError::Conflict("The container name \"/cache\" is already in use".to_string()),
        );

        let err = controller(&engine).run_service("cache").await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[tokio::test]
    async fn test_start_failure_leaves_created_container() {
        let engine = RecordingEngine::new();
        engine.fail(
            "start",
            "cache",
            EngineError::Api {
                status: Some(500),
                message: "port is already allocated".to_string(),
            },
        );

        let err = controller(&engine).run_service("cache").await.unwrap_err();

        assert!(matches!(err, LanzoError::StartFailed { .. }));
        let leftover = engine.container("cache").unwrap();
        assert!(!leftover.running);
    }

    #[tokio::test]
    async fn test_unreachable_engine() {
        let engine = RecordingEngine::new();
        engine.fail(
            "inspect",
            "cache",
            EngineError::Unreachable("connection refused".to_string()),
        );

        let err = controller(&engine).run_service("cache").await.unwrap_err();
        assert!(matches!(err, LanzoError::EngineUnreachable(_)));
        assert!(engine.calls_of("create").is_empty());
    }

    #[tokio::test]
    async fn test_network_failure_propagates() {
        let engine = RecordingEngine::new();
        engine.fail(
            "create_network",
            "backend",
            EngineError::Api {
                status: Some(500),
                message: "pool overlaps".to_string(),
            },
        );

        let err = controller(&engine).run_service("db").await.unwrap_err();
        assert!(matches!(err, LanzoError::NetworkAttachFailed { ref network, .. } if network == "backend"));
        assert!(engine.container("db").unwrap().running);
    }

    #[tokio::test]
    async fn test_post_start_command_is_detached() {
        let registry = Arc::new(ServiceRegistry::builtin().unwrap());
        let engine = RecordingEngine::new();
        engine.fail(
            "exec",
            "ollama",
            EngineError::Api {
                status: Some(500),
                message: "model registry unreachable".to_string(),
            },
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<PostStartReport>();
        let controller = LifecycleController::new(registry, Arc::new(engine.clone())).with_post_start(
            PostStartOptions::default()
                .with_settle_delay(Duration::ZERO)
                .with_reports(tx),
        );

        let deployment = controller.run_service("ollama").await;
        assert!(deployment.is_ok());

        let report = rx.recv().await.unwrap();
        assert_eq!(report.service, "ollama");
        assert_eq!(
            report.command,
            vec!["ollama".to_string(), "pull".to_string(), "llama3.2:1b".to_string()]
        );
        assert!(report.outcome.is_err());
    }

    #[tokio::test]
    async fn test_post_start_reports_survive_a_later_failure() {
        let yaml = r#"
model:
  image: ollama/ollama
  post_start: [ollama, pull, llama3.2:1b]
cache:
  image: redis:7
ai:
  services: [model, cache]
"#;
        let registry = Arc::new(ServiceRegistry::from_yaml_str(yaml).unwrap());
        let engine = RecordingEngine::new();
        engine.fail(
            "create",
            "cache",
            EngineError::Api {
                status: Some(500),
                message: "no space left on device".to_string(),
            },
        );

        let (tx, rx) = mpsc::unbounded_channel::<PostStartReport>();
        let controller = LifecycleController::new(registry, Arc::new(engine.clone())).with_post_start(
            PostStartOptions::default()
                .with_settle_delay(Duration::ZERO)
                .with_reports(tx),
        );

        let err = controller.run_service("ai").await.unwrap_err();
        assert!(matches!(err, LanzoError::CreationFailed { ref name, .. } if name == "cache"));
        drop(controller);

        let reports = post_start::collect_reports(rx).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].service, "model");
        assert_eq!(reports[0].outcome, Ok(0));
        assert_eq!(engine.calls_of("exec"), vec!["exec model"]);
    }

    #[tokio::test]
    async fn test_builtin_wordpress_stack() {
        let registry = Arc::new(ServiceRegistry::builtin().unwrap());
        let engine = RecordingEngine::new();
        let controller = LifecycleController::new(registry, Arc::new(engine.clone()));

        controller.run_service("wordpressstack").await.unwrap();

        assert_eq!(engine.calls_of("create"), vec!["create db-wordpress", "create wordpress"]);
        assert_eq!(engine.calls_of("create_network"), vec!["create_network wordpress-net"]);
        let wordpress = engine.container("wordpress").unwrap();
        assert_eq!(wordpress.networks, vec!["wordpress-net".to_string()]);
        assert!(wordpress.spec.exposed_ports.contains("80/tcp"));
    }
}
