//! Route handlers

use super::AppState;
use crate::container::{Deployment, PortReport};
use crate::error::{LanzoError, Result};
use crate::provision::DeployOutput;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Optional engine selection sent with a request
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TargetRequest {
    #[serde(alias = "ip")]
    pub target_host: Option<String>,
}

impl TargetRequest {
    /// An absent or blank body selects the local engine
    fn from_body(body: &Bytes) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| LanzoError::InvalidConfig(format!("invalid request body: {}", e)))
    }
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub message: String,
    pub containers: Deployment,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub message: String,
    pub removed: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct PortResponse {
    pub message: String,
    pub ports: PortReport,
}

#[derive(Debug, Serialize)]
pub struct ServiceSummary {
    pub name: String,
    pub kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DeployResponse {
    pub message: String,
    pub outputs: DeployOutput,
}

#[derive(Debug, Serialize)]
pub struct DestroyResponse {
    pub message: String,
    pub output: String,
}

pub async fn health() -> &'static str {
    "Lanzo is running"
}

pub async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceSummary>> {
    let services = state
        .registry
        .iter()
        .map(|descriptor| ServiceSummary {
            name: descriptor.name().to_string(),
            kind: if descriptor.is_composite() {
                "composite"
            } else {
                "concrete"
            },
        })
        .collect();
    Json(services)
}

pub async fn run_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
    body: Bytes,
) -> Result<Json<RunResponse>> {
    let target = TargetRequest::from_body(&body)?;
    let controller = state.controller(target.target_host.as_deref())?;

    let containers = controller.run_service(&service).await?;
    info!(service = %service, containers = containers.containers().len(), "Service started");

    Ok(Json(RunResponse {
        message: format!("Service {} started", service),
        containers,
    }))
}

pub async fn stop_service(
    State(state): State<AppState>,
    Path(service): Path<String>,
    body: Bytes,
) -> Result<Json<StopResponse>> {
    let target = TargetRequest::from_body(&body)?;
    let controller = state.controller(target.target_host.as_deref())?;

    let removed = controller.stop_service(&service).await?;
    info!(service = %service, removed = removed.len(), "Service stopped");

    Ok(Json(StopResponse {
        message: format!("Service {} stopped", service),
        removed,
    }))
}

pub async fn service_ports(
    State(state): State<AppState>,
    Path(service): Path<String>,
    Query(target): Query<TargetRequest>,
) -> Result<Json<PortResponse>> {
    let controller = state.controller(target.target_host.as_deref())?;
    let ports = controller.port_mapping(&service).await?;

    Ok(Json(PortResponse {
        message: format!("Port mapping for service {}", service),
        ports,
    }))
}

pub async fn provision_deploy(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<DeployResponse>> {
    let engine = state.resolver.resolve(None)?;
    let outputs = state.provisioner.deploy(engine.as_ref(), &service).await?;

    Ok(Json(DeployResponse {
        message: format!("Infrastructure for {} deployed", service),
        outputs,
    }))
}

pub async fn provision_destroy(
    State(state): State<AppState>,
    Path(service): Path<String>,
) -> Result<Json<DestroyResponse>> {
    let engine = state.resolver.resolve(None)?;
    let output = state.provisioner.destroy(engine.as_ref(), &service).await?;

    Ok(Json(DestroyResponse {
        message: format!("Infrastructure for {} destroyed", service),
        output,
    }))
}
