//! The record describing one bound HTTP endpoint.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use crate::http::HttpMethod;
use crate::routing::params::ParamBinding;
use crate::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InitializationStatus {
    #[default]
    NotInitialized,
    Created,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOptions {
    /// Names of middleware components wrapping the action.
    pub middleware: Vec<String>,
    #[serde(with = "status_code", default)]
    pub response_status: Option<StatusCode>,
}

/// A named segment of a route, e.g. `:name` at index 1 of `/users/:name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteParam {
    pub index: usize,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingAction {
    /// Name of the owning controller component.
    pub parent: String,
    pub method: HttpMethod,
    pub method_name: String,
    pub route: String,
    pub options: RoutingOptions,
    pub route_params: Vec<RouteParam>,
    pub route_signature: Vec<String>,
    /// Ordered by position.
    pub bindings: Vec<ParamBinding>,
    /// Declared parameter count of the method.
    pub arity: usize,
    pub status: InitializationStatus,
}

impl RoutingAction {
    pub fn new(method: HttpMethod, route: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            parent: String::new(),
            method,
            method_name: method_name.into(),
            route: route.into(),
            options: RoutingOptions::default(),
            route_params: Vec::new(),
            route_signature: Vec::new(),
            bindings: Vec::new(),
            arity: 0,
            status: InitializationStatus::NotInitialized,
        }
    }

    pub fn with_status(mut self, status: InitializationStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_options(mut self, options: RoutingOptions) -> Self {
        self.options = options;
        self
    }
}

/// Parameter name of a segment and whether it captures the rest of the path.
///
/// Accepts `:name`, `*name`, `{name}` and `{*name}`.
fn param_segment(segment: &str) -> Option<(&str, bool)> {
    let inner = segment
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .unwrap_or(segment);
    if let Some(name) = inner.strip_prefix('*') {
        return Some((name, true));
    }
    if let Some(name) = segment.strip_prefix(':') {
        return Some((name, false));
    }
    (inner.len() != segment.len()).then_some((inner, false))
}

fn param_name(segment: &str) -> Option<&str> {
    param_segment(segment).map(|(name, _)| name)
}

/// Named route parameters, in order of appearance.
pub fn find_route_params(route: &str) -> Vec<RouteParam> {
    route
        .split('/')
        .filter(|segment| !segment.is_empty())
        .enumerate()
        .filter_map(|(index, segment)| {
            param_name(segment).map(|name| RouteParam {
                index,
                name: name.to_string(),
            })
        })
        .collect()
}

/// Method ordinal followed by the non-empty path segments.
pub fn route_signature(method: HttpMethod, route: &str) -> Vec<String> {
    std::iter::once(method.ordinal().to_string())
        .chain(
            route
                .split('/')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string),
        )
        .collect()
}

/// Convert a `:name` / `*name` style path into the router's `{name}` /
/// `{*name}` syntax.
pub fn to_router_path(route: &str) -> Result<String> {
    if !route.starts_with('/') {
        return Err(AppError::RouteRegistration(format!(
            "route '{route}' must start with '/'"
        )));
    }

    let mut converted = String::with_capacity(route.len());
    for segment in route.split('/').skip(1) {
        converted.push('/');
        match param_segment(segment) {
            Some(("", _)) => {
                return Err(AppError::RouteRegistration(format!(
                    "route '{route}' has an unnamed parameter"
                )));
            }
            Some((name, wildcard)) => {
                converted.push('{');
                if wildcard {
                    converted.push('*');
                }
                converted.push_str(name);
                converted.push('}');
            }
            None => converted.push_str(segment),
        }
    }
    Ok(converted)
}

/// Router path with parameter names erased. Two paths with the same shape
/// match the same requests, so they may only differ by method.
pub fn route_shape(path: &str) -> String {
    path.split('/')
        .map(|segment| match param_segment(segment) {
            Some((_, true)) => "{*}",
            Some((_, false)) => "{}",
            None => segment,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Join a controller base path with an action path.
pub fn join_paths(base: Option<&str>, route: &str) -> String {
    match base.map(|b| b.trim_end_matches('/')) {
        Some(base) if !base.is_empty() && route == "/" => base.to_string(),
        Some(base) if !base.is_empty() => format!("{base}{route}"),
        _ => route.to_string(),
    }
}

mod status_code {
    use axum::http::StatusCode;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(status: &Option<StatusCode>, s: S) -> Result<S::Ok, S::Error> {
        match status {
            Some(code) => s.serialize_some(&code.as_u16()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<StatusCode>, D::Error> {
        Option::<u16>::deserialize(d)?
            .map(|code| StatusCode::from_u16(code).map_err(serde::de::Error::custom))
            .transpose()
    }
}
