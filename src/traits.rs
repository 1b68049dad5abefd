//! Common traits for the eywa-mvc controller framework.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::http::StatusCode;

use crate::Result;
use crate::http::HttpMethod;
use crate::metadata::{ControllerMetadata, RenderData};
use crate::request::Body;
use crate::routing::params::{Arguments, ParamBinding, ParamKind};

/// Future returned by a controller action.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<Option<Body>>> + Send>>;

/// Typed invocation closure for one controller method.
pub type ActionHandler<C> = Arc<dyn Fn(Arc<C>, Arguments) -> ActionFuture + Send + Sync>;

/// Trait for types exposed as MVC controllers.
///
/// # Example
/// ```ignore
/// struct GreetingController;
///
/// impl Controller for GreetingController {
///     fn configure(registrar: &mut ControllerRegistrar<Self>) {
///         registrar.base_path("/greetings");
///         registrar
///             .get("/:name", "hello", |_, args| async move {
///                 Ok(Some(format!("Hello {}", args.text(0).unwrap_or("stranger")).into()))
///             })
///             .route_param(0, "name");
///     }
/// }
/// ```
pub trait Controller: Send + Sync + Sized + 'static {
    /// Component name; actions are qualified as `name.method`.
    fn name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    /// Declare routes, parameter bindings and response statuses.
    fn configure(registrar: &mut ControllerRegistrar<Self>);
}

/// Collects the metadata and dispatch table of one controller type.
pub struct ControllerRegistrar<C> {
    metadata: ControllerMetadata,
    handlers: HashMap<String, ActionHandler<C>>,
}

impl<C: Controller> ControllerRegistrar<C> {
    pub fn new() -> Self {
        Self {
            metadata: ControllerMetadata::new(C::name()),
            handlers: HashMap::new(),
        }
    }

    /// Path prefix shared by every action of the controller.
    pub fn base_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.metadata.set_base_path(path);
        self
    }

    /// Class-level default response status.
    pub fn response_status(&mut self, status: StatusCode) -> &mut Self {
        self.metadata.set_default_status(status);
        self
    }

    /// Register a route and the closure invoked for it.
    pub fn action<F, Fut>(
        &mut self,
        method: HttpMethod,
        route: &str,
        method_name: &str,
        handler: F,
    ) -> ActionRegistrar<'_>
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Body>>> + Send + 'static,
    {
        self.metadata.add_route(method, route, method_name);
        let handler: ActionHandler<C> =
            Arc::new(move |controller: Arc<C>, args: Arguments| -> ActionFuture {
                Box::pin(handler(controller, args))
            });
        self.handlers.insert(method_name.to_string(), handler);
        ActionRegistrar {
            metadata: &mut self.metadata,
            method_name: method_name.to_string(),
        }
    }

    pub fn get<F, Fut>(&mut self, route: &str, method_name: &str, handler: F) -> ActionRegistrar<'_>
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Body>>> + Send + 'static,
    {
        self.action(HttpMethod::Get, route, method_name, handler)
    }

    pub fn post<F, Fut>(&mut self, route: &str, method_name: &str, handler: F) -> ActionRegistrar<'_>
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Body>>> + Send + 'static,
    {
        self.action(HttpMethod::Post, route, method_name, handler)
    }

    pub fn put<F, Fut>(&mut self, route: &str, method_name: &str, handler: F) -> ActionRegistrar<'_>
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Body>>> + Send + 'static,
    {
        self.action(HttpMethod::Put, route, method_name, handler)
    }

    pub fn delete<F, Fut>(&mut self, route: &str, method_name: &str, handler: F) -> ActionRegistrar<'_>
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Body>>> + Send + 'static,
    {
        self.action(HttpMethod::Delete, route, method_name, handler)
    }

    pub fn patch<F, Fut>(&mut self, route: &str, method_name: &str, handler: F) -> ActionRegistrar<'_>
    where
        F: Fn(Arc<C>, Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Body>>> + Send + 'static,
    {
        self.action(HttpMethod::Patch, route, method_name, handler)
    }

    /// Bind a parameter of `method_name`; may precede the route declaration.
    pub fn routing_param(
        &mut self,
        method_name: &str,
        kind: ParamKind,
        position: usize,
        key: Option<&str>,
    ) -> &mut Self {
        self.metadata.add_binding(
            method_name,
            ParamBinding::new(kind, position, key.map(str::to_string)),
        );
        self
    }

    /// Method-level response status; may precede the route declaration.
    pub fn method_response_status(&mut self, method_name: &str, status: StatusCode) -> &mut Self {
        self.metadata.set_method_status(method_name, status);
        self
    }

    pub fn into_parts(self) -> (ControllerMetadata, HashMap<String, ActionHandler<C>>) {
        (self.metadata, self.handlers)
    }
}

impl<C: Controller> Default for ControllerRegistrar<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Refines the action just registered.
pub struct ActionRegistrar<'a> {
    metadata: &'a mut ControllerMetadata,
    method_name: String,
}

impl ActionRegistrar<'_> {
    fn bind(self, kind: ParamKind, position: usize, key: Option<&str>) -> Self {
        self.metadata.add_binding(
            self.method_name.as_str(),
            ParamBinding::new(kind, position, key.map(str::to_string)),
        );
        self
    }

    /// Declared parameter count; unbound positions resolve to `None`.
    pub fn arity(self, arity: usize) -> Self {
        self.metadata.set_arity(self.method_name.as_str(), arity);
        self
    }

    pub fn route_param(self, position: usize, name: &str) -> Self {
        self.bind(ParamKind::RouteParam, position, Some(name))
    }

    pub fn query_param(self, position: usize, name: &str) -> Self {
        self.bind(ParamKind::QueryParam, position, Some(name))
    }

    pub fn header(self, position: usize, name: &str) -> Self {
        self.bind(ParamKind::Header, position, Some(name))
    }

    pub fn cookie(self, position: usize, name: &str) -> Self {
        self.bind(ParamKind::Cookie, position, Some(name))
    }

    pub fn session(self, position: usize) -> Self {
        self.bind(ParamKind::Session, position, None)
    }

    pub fn view_model(self, position: usize) -> Self {
        self.bind(ParamKind::ViewModel, position, None)
    }

    pub fn parameters(self, position: usize) -> Self {
        self.bind(ParamKind::Parameters, position, None)
    }

    pub fn body(self, position: usize) -> Self {
        self.bind(ParamKind::RequestBody, position, None)
    }

    pub fn correlation(self, position: usize) -> Self {
        self.bind(ParamKind::Correlation, position, None)
    }

    pub fn response_status(self, status: StatusCode) -> Self {
        self.metadata.set_method_status(self.method_name.as_str(), status);
        self
    }

    pub fn middleware(self, name: &str) -> Self {
        self.metadata.add_middleware(self.method_name.as_str(), name);
        self
    }

    /// Mark the method as template-rendered.
    pub fn render(self, template: &str) -> Self {
        self.metadata.set_render(
            self.method_name.as_str(),
            RenderData {
                template: template.to_string(),
            },
        );
        self
    }
}

/// Type-erased dispatch table of a controller instance.
pub trait Dispatch: Send + Sync {
    /// Invoke `method_name` on the receiver; `None` if it has no handler.
    fn invoke(&self, method_name: &str, args: Arguments) -> Option<ActionFuture>;

    fn type_name(&self) -> &'static str;
}

pub(crate) struct DispatchTable<C> {
    instance: Arc<C>,
    handlers: HashMap<String, ActionHandler<C>>,
}

impl<C> DispatchTable<C> {
    pub(crate) fn new(instance: Arc<C>, handlers: HashMap<String, ActionHandler<C>>) -> Self {
        Self { instance, handlers }
    }
}

impl<C: Send + Sync + 'static> Dispatch for DispatchTable<C> {
    fn invoke(&self, method_name: &str, args: Arguments) -> Option<ActionFuture> {
        self.handlers
            .get(method_name)
            .map(|handler| handler(Arc::clone(&self.instance), args))
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<C>()
    }
}
