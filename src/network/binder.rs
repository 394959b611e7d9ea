//! Network binder

use crate::engine::ContainerEngine;
use crate::error::{LanzoError, Result};
use tracing::{debug, info};

/// Ensure `network` exists on the engine and connect `container` to it.
///
/// Any lookup failure is treated as "network absent" and leads to a
/// create. Returns the network id.
pub async fn ensure_attached(
    engine: &dyn ContainerEngine,
    container: &str,
    network: &str,
) -> Result<String> {
    let attach_failed = |reason: String| LanzoError::NetworkAttachFailed {
        container: container.to_string(),
        network: network.to_string(),
        reason,
    };

    let network_id = match engine.inspect_network(network).await {
        Ok(id) => {
            debug!(network = %network, id = %id, "Using existing network");
            id
        }
        Err(e) => {
            debug!(network = %network, error = %e, "Network lookup failed, creating it");
            let id = engine
                .create_network(network)
                .await
                .map_err(|e| LanzoError::from_engine(e, attach_failed))?;
            info!(network = %network, id = %id, "Created network");
            id
        }
    };

    engine
        .connect_network(&network_id, container)
        .await
        .map_err(|e| LanzoError::from_engine(e, attach_failed))?;

    info!(network = %network, container = %container, "Attached container to network");
    Ok(network_id)
}
