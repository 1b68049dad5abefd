//! Runtime wrapper around one controller instance and its routing actions.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::http::StatusCode;
use tracing::debug;

use crate::metadata::{ControllerMetadata, RenderData};
use crate::routing::action::{
    InitializationStatus, RoutingAction, RoutingOptions, find_route_params, join_paths,
    route_signature,
};
use crate::routing::params::Arguments;
use crate::traits::{ActionFuture, Controller, ControllerRegistrar, Dispatch, DispatchTable};
use crate::{AppError, Result};

pub struct ControllerComponent {
    name: String,
    route: Option<String>,
    actions: BTreeMap<String, RoutingAction>,
    handler: Arc<dyn Dispatch>,
    metadata: ControllerMetadata,
    pub options: RoutingOptions,
}

impl ControllerComponent {
    pub fn new(
        name: impl Into<String>,
        route: Option<String>,
        metadata: ControllerMetadata,
        handler: Arc<dyn Dispatch>,
    ) -> Self {
        Self {
            name: name.into(),
            route,
            actions: BTreeMap::new(),
            handler,
            metadata,
            options: RoutingOptions::default(),
        }
    }

    /// Wrap a controller instance, collecting its declarations.
    pub fn from_controller<C: Controller>(instance: C) -> Self {
        let mut registrar = ControllerRegistrar::<C>::new();
        C::configure(&mut registrar);
        let (metadata, handlers) = registrar.into_parts();
        let route = metadata.base_path().map(str::to_string);
        let table = DispatchTable::new(Arc::new(instance), handlers);
        Self::new(C::name(), route, metadata, Arc::new(table))
    }

    /// Build the routing actions, then the default response status.
    pub fn initialize_controller_functionality(&mut self) -> Result<()> {
        self.initialize_routes()?;
        self.initialize_default_response_status();
        Ok(())
    }

    /// Insert an action, or merge it into a registered but not yet created one.
    /// A merge keeps the existing initialization status.
    pub fn register_action(&mut self, mut action: RoutingAction) -> Result<()> {
        let action_name = self.action_name(&action.method_name);

        if let Some(existing) = self.actions.get(&action_name) {
            if existing.status == InitializationStatus::Created {
                return Err(AppError::DuplicateAction(action_name));
            }
        }

        self.initialize_routing_action_context(&mut action);

        match self.actions.get_mut(&action_name) {
            Some(current) => {
                current.method_name = action.method_name;
                current.method = action.method;
                current.route = action.route;
                current.options = action.options;
                current.route_params = action.route_params;
                current.route_signature = action.route_signature;
                current.bindings = action.bindings;
                current.arity = action.arity;
            }
            None => {
                self.actions.insert(action_name, action);
            }
        }
        Ok(())
    }

    fn initialize_routes(&mut self) -> Result<()> {
        let annotations = self.metadata.routes().to_vec();
        for annotation in annotations {
            let mut options = annotation.options;
            options
                .middleware
                .extend(self.metadata.middleware(&annotation.method_name).iter().cloned());
            if let Some(status) = self.metadata.method_status(&annotation.method_name) {
                options.response_status = Some(status);
            }

            let mut action = RoutingAction::new(annotation.method, annotation.route, annotation.method_name)
                .with_options(options)
                .with_status(InitializationStatus::Created);
            action.parent = annotation.class_name;
            self.register_action(action)?;
        }
        debug!(controller = %self.name, actions = self.actions.len(), "Initialized routes");
        Ok(())
    }

    fn initialize_default_response_status(&mut self) {
        self.options.response_status = Some(self.metadata.default_status().unwrap_or(StatusCode::OK));
    }

    fn initialize_routing_action_context(&self, action: &mut RoutingAction) {
        action.parent = self.name.clone();
        action.route_params = find_route_params(&action.route);
        action.route_signature = route_signature(action.method, &action.route);
        action.bindings = self.metadata.bindings(&action.method_name).to_vec();
        action.arity = self.metadata.arity(&action.method_name);
    }

    /// Full path of an action: base path followed by the action path.
    pub fn get_action_route(&self, action: &RoutingAction) -> String {
        join_paths(self.route.as_deref(), &action.route)
    }

    pub fn routing_action(&self, method_name: &str) -> Option<&RoutingAction> {
        self.actions.get(&self.action_name(method_name))
    }

    pub fn exists_routing_action(&self, method_name: &str) -> bool {
        self.routing_action(method_name).is_some()
    }

    /// Qualified action name, `Controller.method`.
    pub fn action_name(&self, method_name: &str) -> String {
        format!("{}.{}", self.name, method_name)
    }

    /// Invoke a method on the wrapped instance.
    pub fn invoke(&self, method_name: &str, args: Arguments) -> Result<ActionFuture> {
        self.handler
            .invoke(method_name, args)
            .ok_or_else(|| AppError::UnknownAction {
                controller: self.name.clone(),
                action: method_name.to_string(),
            })
    }

    pub fn render_data(&self, method_name: &str) -> Option<&RenderData> {
        self.metadata.render(method_name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = Some(route.into());
    }

    pub fn actions(&self) -> &BTreeMap<String, RoutingAction> {
        &self.actions
    }

    pub fn metadata(&self) -> &ControllerMetadata {
        &self.metadata
    }

    pub fn handler_type(&self) -> &'static str {
        self.handler.type_name()
    }
}

impl std::fmt::Debug for ControllerComponent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerComponent")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("handler", &self.handler.type_name())
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
