//! Per-request state handed to resolvers and controllers.

use std::collections::HashMap;

use axum::{
    Json,
    body::Bytes,
    extract::Request,
    http::{HeaderMap, Method, StatusCode, Uri, header::COOKIE},
    response::{IntoResponse, Response},
};
use http_body_util::LengthLimitError;
use serde::Serialize;
use serde_json::Value;

use crate::middleware::CorrelationContext;
use crate::session::Session;
use crate::{AppError, Result};

/// Everything the argument resolver may read from an incoming request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    /// Decoded query string; the last occurrence of a key wins.
    pub query: HashMap<String, String>,
    /// Matched route parameters.
    pub params: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub session: Option<Session>,
    /// Set when the correlation middleware ran for this request.
    pub correlation: Option<CorrelationContext>,
    pub body: Bytes,
}

impl RequestContext {
    pub fn new(method: Method, uri: Uri) -> Self {
        let query = parse_query(uri.query());
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            query,
            params: HashMap::new(),
            cookies: HashMap::new(),
            session: None,
            correlation: None,
            body: Bytes::new(),
        }
    }

    /// Build a GET context from a URL; mostly useful in tests.
    pub fn from_url(url: &str) -> Result<Self> {
        let uri: Uri = url
            .parse()
            .map_err(|e| AppError::BadRequest(format!("invalid url '{url}': {e}")))?;
        Ok(Self::new(Method::GET, uri))
    }

    /// Split an axum request into a context, buffering at most `max_body_bytes`.
    pub async fn from_request<I, K, V>(
        request: Request,
        params: I,
        max_body_bytes: usize,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (parts, body) = request.into_parts();
        let body = axum::body::to_bytes(body, max_body_bytes)
            .await
            .map_err(|e| {
                if exceeds_length_limit(&e) {
                    AppError::PayloadTooLarge(format!(
                        "request body exceeds {max_body_bytes} bytes"
                    ))
                } else {
                    AppError::BadRequest(format!("could not read request body: {e}"))
                }
            })?;

        let mut context = Self::new(parts.method, parts.uri)
            .with_headers(parts.headers)
            .with_params(params)
            .with_body(body);
        context.correlation = parts.extensions.get::<CorrelationContext>().cloned();
        Ok(context)
    }

    pub fn with_correlation(mut self, correlation: CorrelationContext) -> Self {
        self.correlation = Some(correlation);
        self
    }

    pub fn with_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.cookies = parse_cookies(&headers);
        self.headers = headers;
        self
    }

    pub fn with_session(mut self, session: Session) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

fn exceeds_length_limit(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default()
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .collect()
}

/// Value returned by a controller method.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Text(String),
    Json(Value),
}

impl Body {
    /// Serialize any value into a JSON body.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Body::Json)
            .map_err(|e| AppError::InternalServerError(e.to_string()))
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Text(text)
    }
}

impl From<&str> for Body {
    fn from(text: &str) -> Self {
        Body::Text(text.to_string())
    }
}

impl From<Value> for Body {
    fn from(value: Value) -> Self {
        Body::Json(value)
    }
}

impl IntoResponse for Body {
    fn into_response(self) -> Response {
        match self {
            Body::Text(text) => text.into_response(),
            Body::Json(value) => Json(value).into_response(),
        }
    }
}

/// Response under construction; resolvers mutate it in place.
#[derive(Debug, Clone)]
pub struct ResponseContext {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Option<Body>,
}

impl Default for ResponseContext {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: None,
        }
    }
}

impl IntoResponse for ResponseContext {
    fn into_response(self) -> Response {
        let mut response = match self.body {
            Some(body) => body.into_response(),
            None => ().into_response(),
        };
        *response.status_mut() = self.status;
        response.headers_mut().extend(self.headers);
        response
    }
}
