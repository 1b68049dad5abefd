//! Resolves requests made to an endpoint, and middleware hooks around them.

use axum::http::StatusCode;
use tracing::debug;

use crate::middleware::Middleware;
use crate::registry::ComponentRegistry;
use crate::request::{RequestContext, ResponseContext};
use crate::routing::action::RoutingAction;
use crate::routing::params::resolve_method_arguments;
use crate::{AppError, Result};

/// Resolve the request made to `action`: build the method arguments, set the
/// response status, invoke the controller method and store its value as the
/// response body.
pub async fn request_resolver(
    action: &RoutingAction,
    registry: &ComponentRegistry,
    request: &RequestContext,
    response: &mut ResponseContext,
) -> Result<()> {
    let component = registry
        .controller(&action.parent)
        .ok_or_else(|| AppError::InvalidComponentContext(action.parent.clone()))?;

    let args = resolve_method_arguments(&action.bindings, action.arity, request);

    response.status = action
        .options
        .response_status
        .or(component.options.response_status)
        .unwrap_or(StatusCode::OK);

    let value = component
        .invoke(&action.method_name, args.unwrap_or_default())?
        .await?;

    match component.render_data(&action.method_name) {
        Some(render) => {
            // Template rendering is not wired in; the body stays empty.
            debug!(
                action = %action.method_name,
                template = %render.template,
                "Render metadata present, template rendering disabled"
            );
        }
        None => response.body = value,
    }
    Ok(())
}

/// Run the pre (`pre_request == true`) or post hook of a middleware.
///
/// Only the pre hook reports a value; `Some(false)` means the request must
/// stop here.
pub async fn middleware_resolver(
    pre_request: bool,
    middleware: &dyn Middleware,
    request: &RequestContext,
    response: &mut ResponseContext,
) -> Option<bool> {
    if pre_request {
        let bindings = middleware.pre_request_bindings();
        let args = resolve_method_arguments(&bindings, 0, request);
        Some(middleware.on_pre_request(args, response).await)
    } else {
        let bindings = middleware.post_request_bindings();
        let args = resolve_method_arguments(&bindings, 0, request);
        middleware.on_post_request(args, response).await;
        None
    }
}
