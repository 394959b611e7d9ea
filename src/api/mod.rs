//! HTTP API
//!
//! Thin routes over the lifecycle controller and the provisioner. Each
//! request resolves its own engine handle.

mod error;
mod handlers;
mod trace;

pub use error::ErrorResponse;
pub use handlers::TargetRequest;
pub use trace::{request_id_middleware, REQUEST_ID_HEADER};

use crate::container::{LifecycleController, PostStartOptions};
use crate::engine::EngineResolver;
use crate::error::Result;
use crate::provision::Provisioner;
use crate::service::ServiceRegistry;
use axum::routing::{get, post};
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

/// Application state shared with handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ServiceRegistry>,
    pub resolver: Arc<dyn EngineResolver>,
    pub post_start: PostStartOptions,
    pub provisioner: Arc<Provisioner>,
}

impl AppState {
    pub fn new(
        registry: Arc<ServiceRegistry>,
        resolver: Arc<dyn EngineResolver>,
        provisioner: Provisioner,
    ) -> Self {
        Self {
            registry,
            resolver,
            post_start: PostStartOptions::default(),
            provisioner: Arc::new(provisioner),
        }
    }

    pub fn with_post_start(mut self, options: PostStartOptions) -> Self {
        self.post_start = options;
        self
    }

    /// Controller bound to the engine selected by `target_host`
    fn controller(&self, target_host: Option<&str>) -> Result<LifecycleController> {
        let engine = self.resolver.resolve(target_host)?;
        Ok(LifecycleController::new(self.registry.clone(), engine)
            .with_post_start(self.post_start.clone()))
    }
}

/// Create the API router
#[must_use]
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/services", get(handlers::list_services))
        .route(
            "/services/{service}",
            post(handlers::run_service).delete(handlers::stop_service),
        )
        .route("/services/{service}/port", get(handlers::service_ports))
        .route("/provision/deploy/{service}", post(handlers::provision_deploy))
        .route("/provision/destroy/{service}", post(handlers::provision_destroy))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Serve the API until ctrl-c
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "Lanzo listening");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Lanzo stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
