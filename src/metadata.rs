//! Annotation metadata collected for one controller type.
//!
//! Route, binding, status and render declarations may arrive in any order;
//! they are only combined into routing actions when the controller
//! component initializes.

use std::collections::HashMap;

use axum::http::StatusCode;

use crate::http::HttpMethod;
use crate::routing::action::RoutingOptions;
use crate::routing::params::{ParamBinding, upsert_binding};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteAnnotation {
    pub class_name: String,
    pub method: HttpMethod,
    pub method_name: String,
    pub route: String,
    pub options: RoutingOptions,
}

/// Render annotation of a controller method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderData {
    pub template: String,
}

#[derive(Debug, Clone, Default)]
pub struct ControllerMetadata {
    class_name: String,
    base_path: Option<String>,
    routes: Vec<RouteAnnotation>,
    bindings: HashMap<String, Vec<ParamBinding>>,
    arity: HashMap<String, usize>,
    middleware: HashMap<String, Vec<String>>,
    default_status: Option<StatusCode>,
    method_status: HashMap<String, StatusCode>,
    render: HashMap<String, RenderData>,
}

impl ControllerMetadata {
    pub fn new(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            ..Self::default()
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn base_path(&self) -> Option<&str> {
        self.base_path.as_deref()
    }

    pub fn set_base_path(&mut self, path: impl Into<String>) {
        self.base_path = Some(path.into());
    }

    pub fn add_route(&mut self, method: HttpMethod, route: impl Into<String>, method_name: impl Into<String>) {
        self.routes.push(RouteAnnotation {
            class_name: self.class_name.clone(),
            method,
            method_name: method_name.into(),
            route: route.into(),
            options: RoutingOptions::default(),
        });
    }

    /// Route annotations in declaration order.
    pub fn routes(&self) -> &[RouteAnnotation] {
        &self.routes
    }

    pub fn add_middleware(&mut self, method_name: impl Into<String>, middleware: impl Into<String>) {
        self.middleware
            .entry(method_name.into())
            .or_default()
            .push(middleware.into());
    }

    /// Middleware names wrapping a method, in declaration order.
    pub fn middleware(&self, method_name: &str) -> &[String] {
        self.middleware
            .get(method_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn add_binding(&mut self, method_name: impl Into<String>, binding: ParamBinding) {
        upsert_binding(self.bindings.entry(method_name.into()).or_default(), binding);
    }

    pub fn bindings(&self, method_name: &str) -> &[ParamBinding] {
        self.bindings
            .get(method_name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn set_arity(&mut self, method_name: impl Into<String>, arity: usize) {
        self.arity.insert(method_name.into(), arity);
    }

    pub fn arity(&self, method_name: &str) -> usize {
        self.arity.get(method_name).copied().unwrap_or(0)
    }

    pub fn set_default_status(&mut self, status: StatusCode) {
        self.default_status = Some(status);
    }

    /// Class-level response status annotation.
    pub fn default_status(&self) -> Option<StatusCode> {
        self.default_status
    }

    pub fn set_method_status(&mut self, method_name: impl Into<String>, status: StatusCode) {
        self.method_status.insert(method_name.into(), status);
    }

    pub fn method_status(&self, method_name: &str) -> Option<StatusCode> {
        self.method_status.get(method_name).copied()
    }

    pub fn set_render(&mut self, method_name: impl Into<String>, render: RenderData) {
        self.render.insert(method_name.into(), render);
    }

    pub fn render(&self, method_name: &str) -> Option<&RenderData> {
        self.render.get(method_name)
    }
}
