//! EywaApp builder wiring the MVC starter, OpenAPI and tower layers together.

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use utoipa::openapi::{Info, InfoBuilder};

use crate::context::ApplicationContext;
use crate::health::HealthController;
use crate::openapi::{OPENAPI_JSON_PATH, build_openapi, openapi_router};
use crate::starter::MvcFrameworkStarter;
use crate::{AppError, Result};

type RouterLayer = Box<dyn FnOnce(Router) -> Router + Send>;

/// Builder for creating EYWA MVC applications.
///
/// Controllers and middleware are registered on the [`ApplicationContext`];
/// the builder turns them into a router and serves it.
///
/// # Example
/// ```ignore
/// use eywa_mvc::prelude::*;
///
/// let mut context = ApplicationContext::new(EywaConfig::settings()?);
/// context.registry_mut().register_controller_instance(UserController)?;
///
/// EywaApp::new(context)
///     .info("My API", "1.0.0", "API description")
///     .health_checks()
///     .request_context()
///     .request_logging()
///     .serve("0.0.0.0:8080")
///     .await?;
/// ```
pub struct EywaApp {
    context: ApplicationContext,
    info: Option<Info>,
    layers: Vec<RouterLayer>,
    has_health_checks: bool,
    has_openapi: bool,
}

impl EywaApp {
    pub fn new(context: ApplicationContext) -> Self {
        Self {
            context,
            info: None,
            layers: Vec::new(),
            has_health_checks: false,
            has_openapi: true,
        }
    }

    /// Set API info (title, version, description).
    pub fn info(
        mut self,
        title: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.info = Some(
            InfoBuilder::new()
                .title(title.into())
                .version(version.into())
                .description(Some(description.into()))
                .build(),
        );
        self
    }

    /// Skip the generated OpenAPI document and its UI.
    pub fn without_openapi(mut self) -> Self {
        self.has_openapi = false;
        self
    }

    /// Mutable access to the context, for registering components inline.
    pub fn context_mut(&mut self) -> &mut ApplicationContext {
        &mut self.context
    }

    /// Apply a middleware layer to the final router.
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: tower::Layer<axum::routing::Route> + Clone + Send + Sync + 'static,
        L::Service: tower::Service<axum::extract::Request> + Clone + Send + Sync + 'static,
        <L::Service as tower::Service<axum::extract::Request>>::Future: Send + 'static,
        <L::Service as tower::Service<axum::extract::Request>>::Response:
            axum::response::IntoResponse + 'static,
        <L::Service as tower::Service<axum::extract::Request>>::Error:
            Into<std::convert::Infallible> + 'static,
    {
        self.layers.push(Box::new(move |router| router.layer(layer)));
        self
    }

    /// Add health check endpoints for Kubernetes probes.
    ///
    /// Registers [`HealthController`], serving `/health`, `/health/ready`
    /// and `/health/live`.
    pub fn health_checks(mut self) -> Self {
        self.has_health_checks = true;
        self
    }

    /// Enable response compression using gzip, deflate, and brotli.
    pub fn compression(self) -> Self {
        use tower_http::compression::CompressionLayer;

        self.layer(CompressionLayer::new())
    }

    /// Enable structured request logging.
    ///
    /// Should be called after `.request_context()` to include correlation IDs.
    pub fn request_logging(self) -> Self {
        use crate::middleware::request_logging_middleware;

        self.layer(request_logging_middleware())
    }

    /// Enable correlation ID and language propagation.
    ///
    /// Controllers reach the values through a `correlation` binding
    /// (`Arguments::correlation`).
    pub fn request_context(mut self) -> Self {
        use crate::middleware::correlation_context_middleware_fn;

        use tower::ServiceBuilder;
        use tower_http::normalize_path::NormalizePathLayer;

        self.layers.push(Box::new(|router| {
            router.layer(
                ServiceBuilder::new()
                    .layer(NormalizePathLayer::trim_trailing_slash())
                    .layer(axum::middleware::from_fn(correlation_context_middleware_fn)),
            )
        }));
        self
    }

    /// Build the starter and assemble the final router.
    pub fn into_router(mut self) -> Result<Router> {
        if self.has_health_checks {
            self.context
                .registry_mut()
                .register_controller_instance(HealthController::new())?;
        }
        let starter = MvcFrameworkStarter::new(self.context)?;
        let mut router = starter.router();

        if self.has_openapi {
            let info = self.info.unwrap_or_else(|| {
                Info::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            });
            let openapi = build_openapi(info, starter.context().registry());
            router = router.merge(openapi_router(openapi));
        }

        for layer in self.layers {
            router = layer(router);
        }
        Ok(router)
    }

    /// Serve on the address from the context's server settings.
    pub async fn run(self) -> Result<()> {
        let addr = self.context.settings().server.address();
        self.serve(&addr).await
    }

    /// Build the router and serve it on `addr`.
    pub async fn serve(self, addr: &str) -> Result<()> {
        let has_openapi = self.has_openapi;
        let has_health_checks = self.has_health_checks;
        let router = self.into_router()?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        info!("🚀 Server listening on http://{}", addr);
        info!("📚 Available endpoints:");
        if has_openapi {
            info!("   - OpenAPI: http://{}{}", addr, OPENAPI_JSON_PATH);
            #[cfg(feature = "scalar")]
            info!("   - Scalar: http://{}/scalar", addr);
        }
        if has_health_checks {
            info!("   - Health Checks: http://{}/health", addr);
        }

        axum::serve(listener, router.into_make_service())
            .await
            .map_err(|e: std::io::Error| AppError::InternalServerError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_checks_are_routed() {
        let router = EywaApp::new(ApplicationContext::default())
            .health_checks()
            .into_router()
            .unwrap();

        let response = router
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], br#"{"status":"healthy"}"#);
    }

    #[tokio::test]
    async fn test_openapi_document_served() {
        let router = EywaApp::new(ApplicationContext::default())
            .info("Demo", "0.1.0", "Demo API")
            .health_checks()
            .into_router()
            .unwrap();

        let response = router
            .oneshot(Request::get(OPENAPI_JSON_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let document: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(document["info"]["title"], "Demo");
        assert!(document["paths"]["/health/ready"]["get"].is_object());
    }

    #[tokio::test]
    async fn test_without_openapi() {
        let router = EywaApp::new(ApplicationContext::default())
            .without_openapi()
            .into_router()
            .unwrap();

        let response = router
            .oneshot(Request::get(OPENAPI_JSON_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
