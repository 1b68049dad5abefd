//! Error type shared by every layer of the MVC framework.
//!
//! Responses follow the RFC 7807 problem shape used across the EYWA services.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Result alias used throughout the crate.
pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// An action with the same qualified name was already created.
    #[error("action '{0}' is already registered")]
    DuplicateAction(String),

    #[error("component '{0}' is already registered")]
    DuplicateComponent(String),

    /// The resolver could not find the component owning an action.
    #[error("invalid component context: '{0}' is not a registered controller")]
    InvalidComponentContext(String),

    #[error("component '{component}' depends on '{dependency}', which could not be resolved")]
    UnresolvedDependency {
        component: String,
        dependency: String,
    },

    #[error("controller '{controller}' has no handler for action '{action}'")]
    UnknownAction { controller: String, action: String },

    #[error("middleware '{0}' is not registered")]
    UnknownMiddleware(String),

    #[error("route registration failed: {0}")]
    RouteRegistration(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    /// Failure raised by a controller method.
    #[error("{0}")]
    Controller(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self {
            AppError::DuplicateAction(_) => "Duplicate Action",
            AppError::DuplicateComponent(_) => "Duplicate Component",
            AppError::InvalidComponentContext(_) => "Invalid Component Context",
            AppError::UnresolvedDependency { .. } => "Unresolved Dependency",
            AppError::UnknownAction { .. } => "Unknown Action",
            AppError::UnknownMiddleware(_) => "Unknown Middleware",
            AppError::RouteRegistration(_) => "Route Registration Failed",
            AppError::BadRequest(_) => "Bad Request",
            AppError::PayloadTooLarge(_) => "Payload Too Large",
            AppError::Controller(_) => "Controller Error",
            AppError::ConfigError(_) => "Configuration Error",
            AppError::InternalServerError(_) => "Internal Server Error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = json!({
            "type": "about:blank",
            "title": self.title(),
            "status": status.as_u16(),
            "detail": self.to_string(),
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/problem+json")],
            Json(body),
        )
            .into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(err.to_string())
    }
}
