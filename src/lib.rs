//! # eywa-mvc
//!
//! Controller-driven MVC layer of the EYWA framework for Axum services.
//!
//! ## Features
//!
//! - **Controllers**: Routes, parameter bindings and response statuses declared
//!   per controller type and dispatched through a typed table
//! - **Component Registry**: Controllers, middleware and services resolved from
//!   one explicit [`ApplicationContext`]
//! - **Parameter Binding**: Route, query, header, cookie, session, view model,
//!   correlation and body arguments resolved by position
//! - **Sessions**: Cookie-backed sessions with a pluggable store
//! - **Action Middleware**: Pre/post hooks with short-circuit support
//! - **Automatic OpenAPI**: Document built from the registered actions, with
//!   Scalar UI at `/scalar`
//! - **Health Checks**: Kubernetes-ready liveness and readiness probes
//! - **Request Context**: Correlation ID and language propagation
//!
//! ## Quick Start
//!
//! ```ignore
//! use eywa_mvc::prelude::*;
//!
//! struct HelloController;
//!
//! impl Controller for HelloController {
//!     fn configure(registrar: &mut ControllerRegistrar<Self>) {
//!         registrar
//!             .get("/hello/:name", "hello", |_, args| async move {
//!                 Ok(Some(format!("Hello {}", args.text(0).unwrap_or_default()).into()))
//!             })
//!             .route_param(0, "name");
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let settings = EywaConfig::settings()?;
//!     init_tracing(&settings.logging)?;
//!
//!     let mut context = ApplicationContext::new(settings);
//!     context.registry_mut().register_controller_instance(HelloController)?;
//!
//!     EywaApp::new(context).health_checks().run().await
//! }
//! ```

mod app;
pub mod config;
pub mod context;
mod error;
mod health;
pub mod http;
pub mod metadata;
pub mod middleware;
pub mod openapi;
pub mod registry;
pub mod request;
pub mod routing;
pub mod session;
mod starter;
pub mod telemetry;
mod traits;

pub use app::EywaApp;
pub use context::ApplicationContext;
pub use error::{AppError, Result};
pub use health::{HealthController, HealthResponse, HealthStatus, ReadinessResponse};
pub use http::HttpMethod;
pub use middleware::{CorrelationContext, Middleware, correlation_context_middleware_fn};
pub use registry::ComponentRegistry;
pub use request::{Body, RequestContext, ResponseContext};
pub use session::{MemorySessionStore, Session, SessionMiddleware, SessionStore};
pub use starter::{MvcFrameworkStarter, RegisteredRoute};
pub use traits::*;

// Re-export common dependencies
pub use async_trait::async_trait;
pub use axum::{self, Router, http::StatusCode};
pub use serde::{Deserialize, Serialize};
pub use serde_json::{self, json};
pub use tokio;
pub use tracing::{debug, error, info, instrument, warn};
pub use utoipa;

/// Prelude for easy importing
pub mod prelude {
    pub use super::{
        AppError, ApplicationContext, Body, Controller, ControllerRegistrar, Deserialize,
        EywaApp, HealthController, HttpMethod, Middleware, Result, Serialize, Session,
        StatusCode, async_trait, debug, error, info, json, warn,
    };
    pub use crate::config::{EywaConfig, MvcSettings};
    pub use crate::routing::{Arguments, ParamBinding, ParamKind, ViewModel};
    pub use crate::request::ResponseContext;
    pub use crate::telemetry::init_tracing;
    pub use uuid::Uuid;
}
