//! Port mapping lookups

use super::handle::PortReport;
use super::lifecycle::LifecycleController;
use crate::engine::EngineError;
use crate::error::{LanzoError, Result};
use crate::service::ServiceDescriptor;
use futures::future::BoxFuture;

impl LifecycleController {
    /// Report the engine's current port table for a service.
    ///
    /// The service's container must exist and be running. Composite
    /// services report each member under its own name.
    pub async fn port_mapping(&self, service: &str) -> Result<PortReport> {
        self.ports_recursive(service).await
    }

    fn ports_recursive<'a>(&'a self, service: &'a str) -> BoxFuture<'a, Result<PortReport>> {
        Box::pin(async move {
            match self.registry.get(service)? {
                ServiceDescriptor::Composite(composite) => {
                    let mut members = Vec::with_capacity(composite.members.len());
                    for member in &composite.members {
                        members.push((member.clone(), self.ports_recursive(member).await?));
                    }
                    Ok(PortReport::Members(members))
                }
                ServiceDescriptor::Concrete(concrete) => {
                    let name = &concrete.container_name;
                    let info = match self.engine.inspect_container(name).await {
                        Ok(info) => info,
                        Err(EngineError::NotFound(_)) => {
                            return Err(LanzoError::ContainerNotFound(name.clone()))
                        }
                        Err(e) => {
                            return Err(LanzoError::from_engine(e, |reason| {
                                LanzoError::ContainerNotFound(format!("{}: {}", name, reason))
                            }))
                        }
                    };

                    if !info.running {
                        return Err(LanzoError::ContainerNotFound(format!(
                            "{} is not running",
                            name
                        )));
                    }
                    Ok(PortReport::Ports(info.ports))
                }
            }
        })
    }
}
