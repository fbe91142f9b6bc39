use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// Error body returned to callers for every failed request.
///
/// `kind` is a stable machine-readable discriminator so clients never have to
/// match on message text.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "Insufficient stock: requested 20, only 10 available",
    "kind": "insufficient_stock",
    "timestamp": "2026-08-23T10:30:00.000Z"
}))]
pub struct ErrorResponse {
    /// Human-readable error description
    #[schema(example = "Insufficient stock: requested 20, only 10 available")]
    pub error: String,
    /// Stable error-kind discriminator
    #[schema(example = "insufficient_stock")]
    pub kind: String,
    /// ISO 8601 timestamp when the error occurred
    #[schema(example = "2026-08-23T10:30:00.000Z")]
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    /// The backing table's structure has drifted from what the service
    /// expects (missing headers). Server-side, never a client error.
    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Remote service error: {0}")]
    RemoteService(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The transaction log row was written but the quantity cell update
    /// failed afterwards. The ledger and the running quantity now diverge;
    /// there is no compensating write.
    #[error("Partial commit: {0}")]
    PartialCommit(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        ServiceError::RemoteService(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_) | Self::InsufficientStock(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::SchemaError(_)
            | Self::UploadError(_)
            | Self::RemoteService(_)
            | Self::ConfigError(_)
            | Self::PartialCommit(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable discriminator carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InsufficientStock(_) => "insufficient_stock",
            Self::SchemaError(_) => "schema_error",
            Self::UploadError(_) => "upload_error",
            Self::RemoteService(_) => "remote_service_error",
            Self::ConfigError(_) => "config_error",
            Self::PartialCommit(_) => "partial_commit",
            Self::InternalError(_) => "internal_error",
        }
    }

    /// Message suitable for HTTP responses. Unexpected internal errors get a
    /// generic message so implementation details never leak to callers.
    pub fn response_message(&self) -> String {
        match self {
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(kind = self.kind(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.response_message(),
            kind: self.kind().to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
