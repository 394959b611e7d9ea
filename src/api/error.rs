//! HTTP mapping of Lanzo errors

use crate::error::LanzoError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error body returned by every failing route
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl LanzoError {
    /// HTTP status code for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        if self.is_not_found() {
            return StatusCode::NOT_FOUND;
        }
        match self {
            Self::InvalidProvisionPath(_) | Self::InvalidConfig(_) => StatusCode::BAD_REQUEST,
            Self::EngineUnreachable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for LanzoError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
