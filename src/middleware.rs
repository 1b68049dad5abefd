//! Middleware for controller actions, request context propagation and
//! structured logging.
//!
//! This module provides:
//! - `Middleware` - Pre/post request hooks attached to routing actions by name
//! - `CorrelationContext` - Request metadata propagation (correlation ID, language)
//! - `correlation_context_middleware_fn` - Axum middleware for context extraction
//! - `request_logging_middleware` - Tower-http TraceLayer for structured logging

use async_trait::async_trait;
use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::request::ResponseContext;
use crate::routing::params::{Arguments, ParamBinding};

/// Hooks run around a controller action.
///
/// Hook arguments are resolved from the bindings the middleware declares,
/// exactly like controller method arguments.
///
/// # Example
///
/// ```ignore
/// struct RequireApiKey;
///
/// #[async_trait]
/// impl Middleware for RequireApiKey {
///     fn pre_request_bindings(&self) -> Vec<ParamBinding> {
///         vec![ParamBinding::new(ParamKind::Header, 0, Some("x-api-key".into()))]
///     }
///
///     async fn on_pre_request(&self, args: Option<Arguments>, response: &mut ResponseContext) -> bool {
///         let allowed = args.as_ref().and_then(|a| a.text(0)) == Some("secret");
///         if !allowed {
///             response.status = StatusCode::UNAUTHORIZED;
///         }
///         allowed
///     }
/// }
/// ```
#[async_trait]
pub trait Middleware: Send + Sync + 'static {
    fn pre_request_bindings(&self) -> Vec<ParamBinding> {
        Vec::new()
    }

    fn post_request_bindings(&self) -> Vec<ParamBinding> {
        Vec::new()
    }

    /// Returning `false` stops the request before the controller runs.
    async fn on_pre_request(&self, args: Option<Arguments>, response: &mut ResponseContext) -> bool;

    async fn on_post_request(&self, args: Option<Arguments>, response: &mut ResponseContext) {
        let _ = (args, response);
    }
}

/// Request context propagated through the entire request lifecycle.
///
/// Extracted from incoming request headers and made available to handlers
/// and logs via request extensions.
///
/// # Fields
///
/// - `correlation_id` - Unique identifier for tracking the request across services.
///   Extracted from `X-Correlation-ID` header or generated as a new UUID.
/// - `language` - Content language from `Accept-Language` header (defaults to "en").
/// - `request_id` - Unique identifier for this specific request (always generated).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrelationContext {
    pub correlation_id: Uuid,
    pub language: String,
    pub request_id: Uuid,
}

impl Default for CorrelationContext {
    fn default() -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            language: "en".to_string(),
            request_id: Uuid::new_v4(),
        }
    }
}

/// Extract correlation ID from headers or generate a new one.
fn extract_correlation_id(headers: &HeaderMap) -> Uuid {
    headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| Uuid::parse_str(s).ok())
        .unwrap_or_else(Uuid::new_v4)
}

/// Extract language from Accept-Language header or default to "en".
fn extract_language(headers: &HeaderMap) -> String {
    headers
        .get("accept-language")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("en")
        .to_string()
}

/// Axum middleware function for correlation context propagation.
///
/// Inserts a [`CorrelationContext`] into the request extensions and echoes
/// `X-Correlation-ID` on the response.
pub async fn correlation_context_middleware_fn(mut req: Request, next: Next) -> Response {
    let ctx = CorrelationContext {
        correlation_id: extract_correlation_id(req.headers()),
        language: extract_language(req.headers()),
        request_id: Uuid::new_v4(),
    };
    let correlation_id = ctx.correlation_id;

    req.extensions_mut().insert(ctx);

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&correlation_id.to_string()) {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    response
}

/// Request logging middleware using tower-http's TraceLayer.
///
/// Logs method, path, status code and latency in milliseconds.
pub fn request_logging_middleware() -> tower_http::trace::TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
    tower_http::trace::DefaultMakeSpan,
> {
    tower_http::trace::TraceLayer::new_for_http().on_response(
        tower_http::trace::DefaultOnResponse::new()
            .level(tracing::Level::INFO)
            .latency_unit(tower_http::LatencyUnit::Millis),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_correlation_id_from_header() {
        let mut headers = HeaderMap::new();
        let uuid = Uuid::new_v4();
        headers.insert(
            "x-correlation-id",
            HeaderValue::from_str(&uuid.to_string()).unwrap(),
        );

        assert_eq!(extract_correlation_id(&headers), uuid);
    }

    #[test]
    fn test_invalid_correlation_id_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert("x-correlation-id", HeaderValue::from_static("not-a-uuid"));

        let result = extract_correlation_id(&headers);
        assert_eq!(result.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn test_extract_language() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_language(&headers), "en");
        headers.insert("accept-language", HeaderValue::from_static("it-IT"));
        assert_eq!(extract_language(&headers), "it-IT");
    }

    #[test]
    fn test_correlation_context_default() {
        let ctx = CorrelationContext::default();
        assert_eq!(ctx.language, "en");
        assert_ne!(ctx.correlation_id, ctx.request_id);
    }
}
