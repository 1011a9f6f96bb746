// HTTP API Error Types
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::database::DatabaseError;
use crate::services::upstream::UpstreamError;

pub const JSONAPI_CONTENT_TYPE: &str = "application/vnd.api+json";

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),
    ValidationError {
        message: String,
        field_errors: BTreeMap<String, String>,
    },

    // 401 Unauthorized
    Unauthorized(String),

    // 403 Forbidden
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 502 Bad Gateway (external service issues)
    BadGateway(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),

    // Any other status relayed from a remote service
    Upstream { status: u16, message: String },
}

impl ApiError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::ValidationError { .. } => 400,
            ApiError::Unauthorized(_) => 401,
            ApiError::Forbidden(_) => 403,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::InternalServerError(_) => 500,
            ApiError::BadGateway(_) => 502,
            ApiError::ServiceUnavailable(_) => 503,
            ApiError::Upstream { status, .. } => *status,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::ValidationError { message, .. } => message,
            ApiError::Unauthorized(msg) => msg,
            ApiError::Forbidden(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::Conflict(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::BadGateway(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
            ApiError::Upstream { message, .. } => message,
        }
    }

    /// Convert to a JSON:API error document
    pub fn to_json(&self) -> Value {
        let status = self.status_code();
        match self {
            ApiError::ValidationError { message, field_errors } if !field_errors.is_empty() => {
                let errors: Vec<Value> = field_errors
                    .iter()
                    .map(|(field, detail)| {
                        json!({
                            "status": status,
                            "source": { "parameter": field },
                            "title": message,
                            "detail": detail
                        })
                    })
                    .collect();
                json!({ "errors": errors })
            }
            _ => json!({
                "errors": [{
                    "status": status,
                    "detail": self.message()
                }]
            }),
        }
    }

    /// Same status, new client-facing message
    pub fn with_detail(self, message: impl Into<String>) -> Self {
        ApiError::from_status(self.status_code(), message)
    }
}

// Static constructor methods
impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn validation_error(
        message: impl Into<String>,
        field_errors: BTreeMap<String, String>,
    ) -> Self {
        ApiError::ValidationError {
            message: message.into(),
            field_errors,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        ApiError::BadGateway(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            400 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            500 => ApiError::InternalServerError(message),
            502 => ApiError::BadGateway(message),
            503 => ApiError::ServiceUnavailable(message),
            s if (400..600).contains(&s) => ApiError::Upstream { status: s, message },
            _ => ApiError::InternalServerError(message),
        }
    }
}

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        match err.status() {
            Some(status) => ApiError::from_status(status, err.to_string()),
            None => {
                tracing::error!("Upstream failure: {}", err);
                ApiError::bad_gateway(err.to_string())
            }
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Conflict(msg) => ApiError::conflict(msg),
            DatabaseError::EmptyFilter => ApiError::bad_request("Invalid Request"),
            DatabaseError::ConfigMissing(_) | DatabaseError::InvalidDatabaseUrl => {
                tracing::error!("Relation store misconfigured: {}", err);
                ApiError::service_unavailable("Relation store unavailable")
            }
            DatabaseError::Sqlx(sqlx_err) => {
                // Log the real error but return generic message
                tracing::error!("SQLx error: {}", sqlx_err);
                ApiError::internal_server_error("Database error occurred")
            }
        }
    }
}

// Standard error trait implementations
impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{}", self.message());
        } else {
            tracing::info!(status = status.as_u16(), "{}", self.message());
        }

        if status == StatusCode::INTERNAL_SERVER_ERROR && crate::is_production!() {
            return (status, "Unexpected error").into_response();
        }

        let mut response = (status, Json(self.to_json())).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(JSONAPI_CONTENT_TYPE),
        );
        response
    }
}
