use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Error taxonomy for the coordinator's HTTP surface.
///
/// Duplicate-key races are deliberately absent: they resolve internally
/// into idempotent success responses. Ledger writeback failures are also
/// absent: they are logged and never surface to the caller.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected before any write.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Non-master agent attempting review→done.
    #[error("{0}")]
    Authorization(String),

    /// Orchestrator collision; carries the conflicting agents so the
    /// caller can react.
    #[error("{message}")]
    Conflict {
        message: String,
        conflicting_agents: Vec<String>,
    },

    /// Transport connect failed; zero mutation performed.
    #[error("{0}")]
    GatewayUnavailable(String),

    /// Connected but the call failed; zero mutation performed.
    #[error("{0}")]
    DispatchCall(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Authorization(_) => "FORBIDDEN",
            ApiError::Conflict { .. } => "ORCHESTRATOR_CONFLICT",
            ApiError::GatewayUnavailable(_) => "GATEWAY_UNAVAILABLE",
            ApiError::DispatchCall(_) => "DISPATCH_CALL_FAILED",
            ApiError::Database(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Authorization(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::DispatchCall(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "{self}");
        }

        let mut body = json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string(),
        });
        if let ApiError::Conflict {
            conflicting_agents, ..
        } = &self
        {
            body["conflicting_agents"] = json!(conflicting_agents);
        }

        (status, Json(body)).into_response()
    }
}
