//! Framework starter: wires the registry's controllers into an axum router.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use axum::{
    Router,
    extract::{RawPathParams, Request},
    response::{IntoResponse, Response},
    routing::{MethodRouter, delete, get, head, options, patch, post, put},
};
use tracing::{Instrument, error, info, warn};

use crate::context::ApplicationContext;
use crate::http::HttpMethod;
use crate::middleware::Middleware;
use crate::request::{RequestContext, ResponseContext};
use crate::routing::action::{RoutingAction, route_shape, to_router_path};
use crate::routing::controller::ControllerComponent;
use crate::routing::resolver::{middleware_resolver, request_resolver};
use crate::session::SessionMiddleware;
use crate::telemetry::create_action_span;
use crate::{AppError, Result};

/// A route bound on the router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredRoute {
    pub method: HttpMethod,
    pub path: String,
    /// Qualified action name.
    pub action: String,
}

pub struct MvcFrameworkStarter {
    context: Arc<ApplicationContext>,
    router: Router,
    routes: Vec<RegisteredRoute>,
}

impl MvcFrameworkStarter {
    /// Resolve dependencies, initialize controllers and bind their routes.
    ///
    /// Dependency and controller initialization errors are returned; a route
    /// registration failure is logged and leaves the routes bound so far.
    pub fn new(mut context: ApplicationContext) -> Result<Self> {
        info!("Bootstrapping EYWA MVC");
        context.registry_mut().resolve_dependencies()?;
        context.registry_mut().initialize_controllers()?;

        let mut starter = Self {
            context: Arc::new(context),
            router: Router::new(),
            routes: Vec::new(),
        };
        starter.initialize_controllers_routes();
        Ok(starter)
    }

    fn initialize_controllers_routes(&mut self) {
        let context = Arc::clone(&self.context);
        let controllers = context.registry().get_controllers();

        if controllers.is_empty() {
            warn!("No controllers have been found");
            return;
        }

        match self.add_controllers(&controllers) {
            Ok(()) => info!(
                "A total of {} controllers have been initialized",
                controllers.len()
            ),
            Err(e) => error!("Controllers could not be initialized: {}", e),
        }
    }

    fn add_controllers(&mut self, controllers: &[&ControllerComponent]) -> Result<()> {
        for controller in controllers {
            for action in controller.actions().values() {
                self.add_path_to_router(controller, action)?;
            }
        }
        Ok(())
    }

    fn add_path_to_router(
        &mut self,
        controller: &ControllerComponent,
        action: &RoutingAction,
    ) -> Result<()> {
        let path = to_router_path(&controller.get_action_route(action))?;
        let shape = route_shape(&path);
        for route in &self.routes {
            if route.method == action.method && route.path == path {
                return Err(AppError::RouteRegistration(format!(
                    "{} {} is bound twice",
                    action.method, path
                )));
            }
            if route.path != path && route_shape(&route.path) == shape {
                return Err(AppError::RouteRegistration(format!(
                    "{} {} clashes with {} {}",
                    action.method, path, route.method, route.path
                )));
            }
        }

        let middleware = action
            .options
            .middleware
            .iter()
            .map(|name| {
                self.context
                    .registry()
                    .middleware(name)
                    .ok_or_else(|| AppError::UnknownMiddleware(name.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        let endpoint = Arc::new(ActionEndpoint {
            context: Arc::clone(&self.context),
            session: self.context.session_middleware(),
            action: action.clone(),
            middleware,
        });
        let handler = move |params: RawPathParams, request: Request| {
            let endpoint = Arc::clone(&endpoint);
            async move { endpoint.handle(params, request).await }
        };

        let method_router: MethodRouter = match action.method {
            HttpMethod::Get => get(handler),
            HttpMethod::Post => post(handler),
            HttpMethod::Put => put(handler),
            HttpMethod::Head => head(handler),
            HttpMethod::Delete => delete(handler),
            HttpMethod::Patch => patch(handler),
            HttpMethod::Options => options(handler),
        };
        // The router panics on conflicts the checks above do not model.
        let router = self.router.clone();
        self.router = panic::catch_unwind(AssertUnwindSafe(|| router.route(&path, method_router)))
            .map_err(|_| {
                AppError::RouteRegistration(format!(
                    "{} {} conflicts with a bound route",
                    action.method, path
                ))
            })?;

        let action_name = controller.action_name(&action.method_name);
        info!("📍 {} {} -> {}", action.method, path, action_name);
        self.routes.push(RegisteredRoute {
            method: action.method,
            path,
            action: action_name,
        });
        Ok(())
    }

    pub fn context(&self) -> &Arc<ApplicationContext> {
        &self.context
    }

    pub fn routes(&self) -> &[RegisteredRoute] {
        &self.routes
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Everything one generated route handler needs.
struct ActionEndpoint {
    context: Arc<ApplicationContext>,
    session: Option<SessionMiddleware>,
    action: RoutingAction,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl ActionEndpoint {
    async fn handle(&self, params: RawPathParams, request: Request) -> Response {
        let max_body = self.context.settings().http.max_body_bytes;
        let mut request = match RequestContext::from_request(request, params.iter(), max_body).await {
            Ok(request) => request,
            Err(e) => return e.into_response(),
        };
        let mut response = ResponseContext::default();

        if let Some(session) = &self.session {
            session.create_session_cookie(&mut request, &mut response).await;
        }

        let span = create_action_span(
            self.action.method.as_str(),
            request.uri.path(),
            &self.action.method_name,
        );
        let outcome = self
            .run(&request, &mut response)
            .instrument(span.clone())
            .await;
        span.record("http.status_code", response.status.as_u16());

        if let Some(session) = &self.session {
            session.store_session(&request).await;
        }

        match outcome {
            Ok(()) => response.into_response(),
            Err(e) => {
                error!(
                    action = %self.action.method_name,
                    controller = %self.action.parent,
                    "Request could not be resolved: {}",
                    e
                );
                let mut error_response = e.into_response();
                error_response.headers_mut().extend(response.headers);
                error_response
            }
        }
    }

    async fn run(&self, request: &RequestContext, response: &mut ResponseContext) -> Result<()> {
        for middleware in &self.middleware {
            if middleware_resolver(true, middleware.as_ref(), request, response).await == Some(false) {
                return Ok(());
            }
        }

        request_resolver(&self.action, self.context.registry(), request, response).await?;

        for middleware in &self.middleware {
            middleware_resolver(false, middleware.as_ref(), request, response).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Body;
    use crate::traits::{Controller, ControllerRegistrar};
    use tower::ServiceExt;

    struct RoutesController;

    impl Controller for RoutesController {
        fn configure(registrar: &mut ControllerRegistrar<Self>) {
            registrar.base_path("/api");
            for method in HttpMethod::ALL {
                let route = format!("/{}", method.as_str().to_lowercase());
                let name = format!("{}Route", method.as_str().to_lowercase());
                registrar.action(method, &route, &name, |_, _| async { Ok(None) });
            }
        }
    }

    struct BrokenController;

    impl Controller for BrokenController {
        fn configure(registrar: &mut ControllerRegistrar<Self>) {
            registrar.get("/a", "first", |_, _| async { Ok(None) });
            registrar.get("/a", "second", |_, _| async { Ok(None) });
        }
    }

    struct ClashingController;

    impl Controller for ClashingController {
        fn configure(registrar: &mut ControllerRegistrar<Self>) {
            registrar
                .get("/users/:id", "show", |_, _| async { Ok(None) })
                .route_param(0, "id");
            registrar
                .post("/users/:name", "rename", |_, _| async { Ok(None) })
                .route_param(0, "name");
        }
    }

    struct FilesController;

    impl Controller for FilesController {
        fn configure(registrar: &mut ControllerRegistrar<Self>) {
            registrar
                .get("/files/*path", "download", |_, args| async move {
                    Ok(args.text(0).map(Body::from))
                })
                .route_param(0, "path");
        }
    }

    struct UnclosedBraceController;

    impl Controller for UnclosedBraceController {
        fn configure(registrar: &mut ControllerRegistrar<Self>) {
            registrar.get("/ok", "alive", |_, _| async { Ok(Some(Body::from("ok"))) });
            registrar.get("/oops/{", "broken", |_, _| async { Ok(None) });
        }
    }

    struct GuardedController;

    impl Controller for GuardedController {
        fn configure(registrar: &mut ControllerRegistrar<Self>) {
            registrar
                .get("/guarded", "guarded", |_, _| async { Ok(None) })
                .middleware("missing");
        }
    }

    #[test]
    fn test_every_action_is_bound() {
        let mut context = ApplicationContext::default();
        context
            .registry_mut()
            .register_controller_instance(RoutesController)
            .unwrap();

        let starter = MvcFrameworkStarter::new(context).unwrap();
        assert_eq!(starter.routes().len(), HttpMethod::ALL.len());
        assert!(starter.routes().iter().any(|r| r.method == HttpMethod::Patch
            && r.path == "/api/patch"
            && r.action == "RoutesController.patchRoute"));
    }

    #[test]
    fn test_no_controllers_is_not_an_error() {
        let starter = MvcFrameworkStarter::new(ApplicationContext::default()).unwrap();
        assert!(starter.routes().is_empty());
    }

    #[test]
    fn test_conflicting_route_is_logged_not_fatal() {
        let mut context = ApplicationContext::default();
        context
            .registry_mut()
            .register_controller_instance(BrokenController)
            .unwrap();

        let starter = MvcFrameworkStarter::new(context).unwrap();
        assert_eq!(starter.routes().len(), 1);
    }

    #[test]
    fn test_renamed_parameter_on_same_path_is_rejected() {
        let mut context = ApplicationContext::default();
        context
            .registry_mut()
            .register_controller_instance(ClashingController)
            .unwrap();

        let starter = MvcFrameworkStarter::new(context).unwrap();
        // Actions bind in name order, so `rename` wins and `show` is refused.
        assert_eq!(starter.routes().len(), 1);
        assert_eq!(starter.routes()[0].method, HttpMethod::Post);
        assert_eq!(starter.routes()[0].path, "/users/{name}");
    }

    #[tokio::test]
    async fn test_wildcard_route_is_bound() {
        let mut context = ApplicationContext::default();
        context
            .registry_mut()
            .register_controller_instance(FilesController)
            .unwrap();

        let starter = MvcFrameworkStarter::new(context).unwrap();
        assert_eq!(starter.routes().len(), 1);
        assert_eq!(starter.routes()[0].path, "/files/{*path}");

        let response = starter
            .into_router()
            .oneshot(
                axum::http::Request::get("/files/docs/readme.md")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"docs/readme.md");
    }

    #[tokio::test]
    async fn test_router_rejection_keeps_bound_routes() {
        let mut context = ApplicationContext::default();
        context
            .registry_mut()
            .register_controller_instance(UnclosedBraceController)
            .unwrap();

        let starter = MvcFrameworkStarter::new(context).unwrap();
        assert_eq!(starter.routes().len(), 1);

        let response = starter
            .into_router()
            .oneshot(
                axum::http::Request::get("/ok")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[test]
    fn test_unknown_middleware_stops_registration() {
        let mut context = ApplicationContext::default();
        context
            .registry_mut()
            .register_controller_instance(GuardedController)
            .unwrap();

        let starter = MvcFrameworkStarter::new(context).unwrap();
        assert!(starter.routes().is_empty());
    }
}
