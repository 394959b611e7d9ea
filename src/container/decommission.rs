//! Stopping and removing service containers

use super::lifecycle::LifecycleController;
use crate::engine::EngineError;
use crate::error::{LanzoError, Result};
use crate::service::{ConcreteService, ServiceDescriptor};
use futures::future::BoxFuture;
use tracing::{debug, info, warn};

impl LifecycleController {
    /// Stop and remove a service's container.
    ///
    /// Composite services are taken down member by member in declared
    /// order. Dependencies are left running. A container that does not
    /// exist counts as already stopped. Returns the names of containers
    /// that were actually removed.
    pub async fn stop_service(&self, service: &str) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        self.stop_recursive(service, &mut removed).await?;
        Ok(removed)
    }

    fn stop_recursive<'a>(
        &'a self,
        service: &'a str,
        removed: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            match self.registry.get(service)? {
                ServiceDescriptor::Composite(composite) => {
                    for member in &composite.members {
                        self.stop_recursive(member, removed).await?;
                    }
                    Ok(())
                }
                ServiceDescriptor::Concrete(concrete) => {
                    if self.decommission(concrete).await? {
                        removed.push(concrete.container_name.clone());
                    }
                    Ok(())
                }
            }
        })
    }

    /// Returns false when there was no container to remove
    async fn decommission(&self, service: &ConcreteService) -> Result<bool> {
        let name = &service.container_name;

        match self.engine.stop_container(name).await {
            Ok(()) => debug!(container = %name, "Stopped container"),
            Err(EngineError::NotFound(_)) => {
                debug!(container = %name, "No container to stop");
                return Ok(false);
            }
            Err(EngineError::NotModified(_)) => debug!(container = %name, "Container already stopped"),
            Err(EngineError::Unreachable(message)) => {
                return Err(LanzoError::EngineUnreachable(message))
            }
            Err(e) => warn!(container = %name, error = %e, "Stop failed, removing anyway"),
        }

        match self.engine.remove_container(name, false).await {
            Ok(()) => {
                info!(service = %service.name, container = %name, "Removed container");
                Ok(true)
            }
            Err(EngineError::NotFound(_)) => Ok(false),
            Err(e) => Err(LanzoError::from_engine(e, |reason| LanzoError::RemovalFailed {
                name: name.clone(),
                reason,
            })),
        }
    }
}
