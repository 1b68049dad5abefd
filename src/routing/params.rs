//! Parameter bindings and positional argument resolution.
//!
//! A binding tags one parameter position of a controller method with the
//! request value it receives. Resolution turns the bindings of a method into
//! a positional argument list against a live [`RequestContext`].

use std::collections::HashMap;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::middleware::CorrelationContext;
use crate::request::RequestContext;
use crate::session::Session;
use crate::{AppError, Result};

/// Where a bound parameter takes its value from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    RouteParam,
    QueryParam,
    Session,
    ViewModel,
    /// Every query and route parameter, grouped.
    Parameters,
    Header,
    Cookie,
    RequestBody,
    /// The request's [`CorrelationContext`], when the correlation layer is on.
    Correlation,
}

impl ParamKind {
    /// Kinds that look a value up by name.
    pub fn is_keyed(self) -> bool {
        matches!(
            self,
            ParamKind::RouteParam | ParamKind::QueryParam | ParamKind::Header | ParamKind::Cookie
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBinding {
    pub kind: ParamKind,
    /// Lookup key for keyed kinds.
    pub key: Option<String>,
    pub position: usize,
}

impl ParamBinding {
    pub fn new(kind: ParamKind, position: usize, key: Option<String>) -> Self {
        Self {
            kind,
            key,
            position,
        }
    }
}

/// Insert a binding, replacing any previous binding at the same position,
/// keeping the list ordered by position.
pub fn upsert_binding(bindings: &mut Vec<ParamBinding>, binding: ParamBinding) {
    match bindings.binary_search_by_key(&binding.position, |b| b.position) {
        Ok(index) => bindings[index] = binding,
        Err(index) => bindings.insert(index, binding),
    }
}

/// Query and route parameters of a request, grouped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllParameters {
    pub query: HashMap<String, String>,
    pub route: HashMap<String, String>,
}

/// Attribute bag handed to render-annotated methods.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewModel {
    attributes: Map<String, Value>,
}

impl ViewModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        &self.attributes
    }
}

/// One resolved argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    Text(String),
    Session(Session),
    Parameters(AllParameters),
    ViewModel(ViewModel),
    Body(Bytes),
    Correlation(CorrelationContext),
}

/// Positional arguments for one invocation; `None` marks an unbound or
/// unresolvable position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<Option<Argument>>,
}

impl Arguments {
    pub fn new(values: Vec<Option<Argument>>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&Argument> {
        self.values.get(position).and_then(Option::as_ref)
    }

    pub fn text(&self, position: usize) -> Option<&str> {
        match self.get(position) {
            Some(Argument::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn session(&self, position: usize) -> Option<&Session> {
        match self.get(position) {
            Some(Argument::Session(session)) => Some(session),
            _ => None,
        }
    }

    pub fn parameters(&self, position: usize) -> Option<&AllParameters> {
        match self.get(position) {
            Some(Argument::Parameters(parameters)) => Some(parameters),
            _ => None,
        }
    }

    pub fn view_model(&self, position: usize) -> Option<&ViewModel> {
        match self.get(position) {
            Some(Argument::ViewModel(model)) => Some(model),
            _ => None,
        }
    }

    pub fn body(&self, position: usize) -> Option<&Bytes> {
        match self.get(position) {
            Some(Argument::Body(bytes)) => Some(bytes),
            _ => None,
        }
    }

    pub fn correlation(&self, position: usize) -> Option<&CorrelationContext> {
        match self.get(position) {
            Some(Argument::Correlation(correlation)) => Some(correlation),
            _ => None,
        }
    }

    /// Deserialize a request body argument as JSON.
    pub fn json<T: DeserializeOwned>(&self, position: usize) -> Result<Option<T>> {
        match self.body(position) {
            Some(bytes) if !bytes.is_empty() => serde_json::from_slice(bytes)
                .map(Some)
                .map_err(|e| AppError::BadRequest(format!("invalid JSON body: {e}"))),
            _ => Ok(None),
        }
    }

    pub fn into_inner(self) -> Vec<Option<Argument>> {
        self.values
    }
}

impl From<Vec<Option<Argument>>> for Arguments {
    fn from(values: Vec<Option<Argument>>) -> Self {
        Self::new(values)
    }
}

/// Resolve the positional arguments of a method.
///
/// The list is as long as the larger of `arity` and the highest bound
/// position plus one. Returns `None` for a method with no parameters and
/// no bindings.
pub fn resolve_method_arguments(
    bindings: &[ParamBinding],
    arity: usize,
    request: &RequestContext,
) -> Option<Arguments> {
    let len = bindings
        .iter()
        .map(|b| b.position + 1)
        .max()
        .unwrap_or(0)
        .max(arity);
    if len == 0 {
        return None;
    }

    let mut values: Vec<Option<Argument>> = vec![None; len];
    for binding in bindings {
        values[binding.position] = resolve_binding(binding, request);
    }

    debug!(
        resolved = values.iter().filter(|v| v.is_some()).count(),
        total = len,
        "Resolved method arguments"
    );
    Some(Arguments::new(values))
}

fn resolve_binding(binding: &ParamBinding, request: &RequestContext) -> Option<Argument> {
    let key = binding.key.as_deref();
    match binding.kind {
        ParamKind::RouteParam => key
            .and_then(|k| request.route_param(k))
            .map(|v| Argument::Text(v.to_string())),
        ParamKind::QueryParam => key
            .and_then(|k| request.query_param(k))
            .map(|v| Argument::Text(v.to_string())),
        ParamKind::Header => key
            .and_then(|k| request.header(k))
            .map(|v| Argument::Text(v.to_string())),
        ParamKind::Cookie => key
            .and_then(|k| request.cookie(k))
            .map(|v| Argument::Text(v.to_string())),
        ParamKind::Session => request.session.clone().map(Argument::Session),
        ParamKind::ViewModel => Some(Argument::ViewModel(ViewModel::new())),
        ParamKind::Parameters => Some(Argument::Parameters(AllParameters {
            query: request.query.clone(),
            route: request.params.clone(),
        })),
        ParamKind::RequestBody => Some(Argument::Body(request.body.clone())),
        ParamKind::Correlation => request.correlation.clone().map(Argument::Correlation),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Option<Argument> {
        Some(Argument::Text(value.to_string()))
    }

    #[test]
    fn test_query_params_fill_their_positions() {
        let mut bindings = Vec::new();
        // declared out of order on purpose
        upsert_binding(
            &mut bindings,
            ParamBinding::new(ParamKind::QueryParam, 4, Some("framework".into())),
        );
        upsert_binding(
            &mut bindings,
            ParamBinding::new(ParamKind::QueryParam, 2, Some("name".into())),
        );
        let request =
            RequestContext::from_url("http://localhost/api-get-2?name=testing&framework=Eywa")
                .unwrap();

        let args = resolve_method_arguments(&bindings, 5, &request).unwrap();
        assert_eq!(
            args.into_inner(),
            vec![None, None, text("testing"), None, text("Eywa")]
        );
    }

    #[test]
    fn test_route_params_fill_their_positions() {
        let bindings = vec![
            ParamBinding::new(ParamKind::RouteParam, 1, Some("name".into())),
            ParamBinding::new(ParamKind::RouteParam, 2, Some("lastname".into())),
        ];
        let request = RequestContext::from_url("http://localhost/api-get-3/Steve/Jobs")
            .unwrap()
            .with_params([("name", "Steve"), ("lastname", "Jobs")]);

        let args = resolve_method_arguments(&bindings, 4, &request).unwrap();
        assert_eq!(
            args.into_inner(),
            vec![None, text("Steve"), text("Jobs"), None]
        );
    }

    #[test]
    fn test_session_argument_is_the_request_session() {
        let bindings = vec![ParamBinding::new(ParamKind::Session, 1, None)];
        let request = RequestContext::from_url("http://localhost/api-get-4")
            .unwrap()
            .with_session(Session::new());

        let args = resolve_method_arguments(&bindings, 2, &request).unwrap();
        assert!(args.get(0).is_none());
        let session = args.session(1).unwrap();
        assert_eq!(session.get("times"), None);
        session.insert("times", 0);
        assert_eq!(args.session(1).unwrap().get("times"), Some(Value::from(0)));
        session.insert("times", 1);
        assert_eq!(args.session(1).unwrap().get("times"), Some(Value::from(1)));

        let again = resolve_method_arguments(&bindings, 2, &request).unwrap();
        assert_eq!(again.session(1).unwrap().get("times"), Some(Value::from(1)));
    }

    #[test]
    fn test_session_absent_resolves_to_none() {
        let bindings = vec![ParamBinding::new(ParamKind::Session, 0, None)];
        let request = RequestContext::from_url("http://localhost/").unwrap();
        let args = resolve_method_arguments(&bindings, 1, &request).unwrap();
        assert!(args.session(0).is_none());
    }

    #[test]
    fn test_view_model_is_fresh() {
        let bindings = vec![ParamBinding::new(ParamKind::ViewModel, 1, None)];
        let request = RequestContext::from_url("http://localhost/api-get-5").unwrap();
        let args = resolve_method_arguments(&bindings, 2, &request).unwrap();
        assert!(args.get(0).is_none());
        assert_eq!(args.view_model(1), Some(&ViewModel::new()));
    }

    #[test]
    fn test_parameters_groups_query_and_route() {
        let bindings = vec![ParamBinding::new(ParamKind::Parameters, 1, None)];
        let request = RequestContext::from_url(
            "http://localhost/api-get-test-parameters/hello/world?favoriteMovie=Interstellar",
        )
        .unwrap()
        .with_params([("param1", "hello"), ("param2", "world")]);

        let args = resolve_method_arguments(&bindings, 2, &request).unwrap();
        assert!(args.get(0).is_none());
        let parameters = serde_json::to_value(args.parameters(1).unwrap()).unwrap();
        assert_eq!(
            parameters,
            serde_json::json!({
                "query": { "favoriteMovie": "Interstellar" },
                "route": { "param1": "hello", "param2": "world" }
            })
        );
    }

    #[test]
    fn test_correlation_argument() {
        let bindings = vec![ParamBinding::new(ParamKind::Correlation, 0, None)];
        let correlation = CorrelationContext::default();
        let request = RequestContext::from_url("http://localhost/")
            .unwrap()
            .with_correlation(correlation.clone());
        let args = resolve_method_arguments(&bindings, 1, &request).unwrap();
        assert_eq!(args.correlation(0), Some(&correlation));

        let bare = RequestContext::from_url("http://localhost/").unwrap();
        let args = resolve_method_arguments(&bindings, 1, &bare).unwrap();
        assert!(args.correlation(0).is_none());
    }

    #[test]
    fn test_no_parameters_yields_no_argument_list() {
        let request = RequestContext::from_url("http://localhost/").unwrap();
        assert!(resolve_method_arguments(&[], 0, &request).is_none());
    }

    #[test]
    fn test_upsert_replaces_same_position() {
        let mut bindings = Vec::new();
        upsert_binding(
            &mut bindings,
            ParamBinding::new(ParamKind::QueryParam, 0, Some("a".into())),
        );
        upsert_binding(
            &mut bindings,
            ParamBinding::new(ParamKind::QueryParam, 0, Some("b".into())),
        );
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].key.as_deref(), Some("b"));
    }

    #[test]
    fn test_json_body_argument() {
        #[derive(Deserialize, PartialEq, Debug)]
        struct Payload {
            name: String,
        }
        let bindings = vec![ParamBinding::new(ParamKind::RequestBody, 0, None)];
        let request = RequestContext::from_url("http://localhost/")
            .unwrap()
            .with_body(r#"{"name":"Steve"}"#);
        let args = resolve_method_arguments(&bindings, 1, &request).unwrap();
        let payload: Option<Payload> = args.json(0).unwrap();
        assert_eq!(
            payload,
            Some(Payload {
                name: "Steve".into()
            })
        );
    }
}
