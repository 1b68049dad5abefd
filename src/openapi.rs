//! OpenAPI document generated from the registered controller actions.

use axum::{Json, Router, http::StatusCode, routing::get};
use tracing::{info, warn};
use utoipa::openapi::path::{OperationBuilder, ParameterBuilder, ParameterIn};
use utoipa::openapi::tag::TagBuilder;
use utoipa::openapi::{self, Info, OpenApi, OpenApiBuilder, Paths, Required, ResponseBuilder};

use crate::http::HttpMethod;
use crate::registry::ComponentRegistry;
use crate::routing::action::{RoutingAction, to_router_path};
use crate::routing::params::ParamKind;

/// Path the JSON document is served on.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// Build the document for every action of every controller.
///
/// Actions whose route cannot be expressed as a router path are skipped.
pub fn build_openapi(info: Info, registry: &ComponentRegistry) -> OpenApi {
    let mut paths = Paths::new();
    let mut tags = Vec::new();

    for controller in registry.get_controllers() {
        tags.push(TagBuilder::new().name(controller.name()).build());
        let default_status = controller.options.response_status.unwrap_or(StatusCode::OK);

        for action in controller.actions().values() {
            let path = match to_router_path(&controller.get_action_route(action)) {
                Ok(path) => path,
                Err(e) => {
                    warn!("Skipping {} in OpenAPI document: {}", action.method_name, e);
                    continue;
                }
            };
            let status = action.options.response_status.unwrap_or(default_status);
            let operation = OperationBuilder::new()
                .operation_id(Some(controller.action_name(&action.method_name)))
                .tag(controller.name())
                .parameters(Some(parameters(action)))
                .response(
                    status.as_u16().to_string(),
                    ResponseBuilder::new()
                        .description(status.canonical_reason().unwrap_or("Response"))
                        .build(),
                )
                .build();
            paths.add_path_operation(path, vec![path_method(action.method)], operation);
        }
    }

    OpenApiBuilder::new()
        .info(info)
        .paths(paths)
        .tags(Some(tags))
        .build()
}

fn path_method(method: HttpMethod) -> openapi::HttpMethod {
    match method {
        HttpMethod::Get => openapi::HttpMethod::Get,
        HttpMethod::Post => openapi::HttpMethod::Post,
        HttpMethod::Put => openapi::HttpMethod::Put,
        HttpMethod::Head => openapi::HttpMethod::Head,
        HttpMethod::Delete => openapi::HttpMethod::Delete,
        HttpMethod::Patch => openapi::HttpMethod::Patch,
        HttpMethod::Options => openapi::HttpMethod::Options,
    }
}

fn parameters(action: &RoutingAction) -> Vec<openapi::path::Parameter> {
    action
        .bindings
        .iter()
        .filter_map(|binding| {
            let (location, required) = match binding.kind {
                ParamKind::RouteParam => (ParameterIn::Path, Required::True),
                ParamKind::QueryParam => (ParameterIn::Query, Required::False),
                ParamKind::Header => (ParameterIn::Header, Required::False),
                ParamKind::Cookie => (ParameterIn::Cookie, Required::False),
                _ => return None,
            };
            let name = binding.key.clone()?;
            Some(
                ParameterBuilder::new()
                    .name(name)
                    .parameter_in(location)
                    .required(required)
                    .build(),
            )
        })
        .collect()
}

/// Routes serving the document as JSON and, with the `scalar` feature, the
/// Scalar UI at `/scalar`.
pub fn openapi_router(openapi: OpenApi) -> Router {
    info!("📚 API: {} v{}", openapi.info.title, openapi.info.version);
    for (path, item) in &openapi.paths.paths {
        let methods: Vec<_> = [
            item.get.as_ref().map(|_| "GET"),
            item.post.as_ref().map(|_| "POST"),
            item.put.as_ref().map(|_| "PUT"),
            item.delete.as_ref().map(|_| "DELETE"),
            item.patch.as_ref().map(|_| "PATCH"),
            item.head.as_ref().map(|_| "HEAD"),
            item.options.as_ref().map(|_| "OPTIONS"),
        ]
        .into_iter()
        .flatten()
        .collect();
        info!("   {} [{}]", path, methods.join(", "));
    }

    let document = openapi.clone();
    let router = Router::new().route(
        OPENAPI_JSON_PATH,
        get(move || {
            let document = document.clone();
            async move { Json(document) }
        }),
    );

    #[cfg(feature = "scalar")]
    let router = {
        use utoipa_scalar::{Scalar, Servable};
        router.merge(Scalar::with_url("/scalar", openapi))
    };
    #[cfg(not(feature = "scalar"))]
    drop(openapi);

    router
}
