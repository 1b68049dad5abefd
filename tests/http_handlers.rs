use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::body::{Body as HttpBody, to_bytes};
use axum::http::{HeaderValue, Request, StatusCode, header};
use axum::response::Response;
use eywa_mvc::prelude::*;
use eywa_mvc::{HealthStatus, MvcFrameworkStarter};
use tower::ServiceExt;

struct ShowcaseController {
    greeting: Arc<String>,
}

impl Controller for ShowcaseController {
    fn configure(registrar: &mut ControllerRegistrar<Self>) {
        registrar
            .get("/api-get-1", "queryNames", |_, args| async move {
                Ok(Some(Body::from(format!(
                    "{} {}",
                    args.text(2).unwrap_or_default(),
                    args.text(4).unwrap_or_default()
                ))))
            })
            .query_param(2, "name")
            .query_param(4, "lastname")
            .arity(5);
        registrar
            .get("/api-get-3/:name/:lastname", "routeNames", |_, args| async move {
                Ok(Some(Body::from(format!(
                    "{} {}",
                    args.text(1).unwrap_or_default(),
                    args.text(2).unwrap_or_default()
                ))))
            })
            .route_param(1, "name")
            .route_param(2, "lastname")
            .arity(4);
        registrar
            .get("/visits", "visits", |_, args| async move {
                let session = args
                    .session(0)
                    .ok_or_else(|| AppError::Controller("no session".into()))?;
                let visits = session.get("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                session.insert("visits", visits);
                Ok(Some(Body::from(visits.to_string())))
            })
            .session(0);
        registrar
            .get("/params/:id", "parameters", |_, args| async move {
                let parameters = args.parameters(0).cloned().unwrap_or_default();
                Body::json(&parameters).map(Some)
            })
            .parameters(0);
        registrar
            .post("/echo", "echo", |_, args| async move {
                let payload: Option<serde_json::Value> = args.json(0)?;
                Ok(payload.map(Body::from))
            })
            .body(0)
            .response_status(StatusCode::CREATED);
        registrar.get("/greeting", "greeting", |controller: Arc<Self>, _| async move {
            Ok(Some(Body::from(controller.greeting.as_str())))
        });
        registrar
            .get("/whoami", "whoami", |_, args| async move {
                Ok(args
                    .correlation(0)
                    .map(|c| Body::from(c.correlation_id.to_string())))
            })
            .correlation(0);
        registrar.get("/failing", "failing", |_, _| async {
            Err(AppError::Controller("boom".into()))
        });
    }
}

struct VerbsController;

impl Controller for VerbsController {
    fn configure(registrar: &mut ControllerRegistrar<Self>) {
        registrar.base_path("/verbs");
        for method in HttpMethod::ALL {
            let name = method.as_str().to_lowercase();
            registrar.action(method, &format!("/{name}"), &name, move |_, _| {
                let name = method.as_str().to_string();
                async move { Ok(Some(Body::from(name))) }
            });
        }
    }
}

struct StatusController;

impl Controller for StatusController {
    fn configure(registrar: &mut ControllerRegistrar<Self>) {
        registrar.response_status(StatusCode::ACCEPTED);
        registrar.get("/status/default", "classDefault", |_, _| async { Ok(None) });
        registrar
            .get("/status/moved", "moved", |_, _| async { Ok(None) })
            .response_status(StatusCode::MOVED_PERMANENTLY);
    }
}

struct ApiKeyGate {
    completed: Arc<AtomicUsize>,
}

#[async_trait]
impl Middleware for ApiKeyGate {
    fn pre_request_bindings(&self) -> Vec<ParamBinding> {
        vec![ParamBinding::new(ParamKind::Header, 0, Some("x-api-key".into()))]
    }

    async fn on_pre_request(&self, args: Option<Arguments>, response: &mut ResponseContext) -> bool {
        let allowed = args.as_ref().and_then(|a| a.text(0)) == Some("secret");
        if !allowed {
            response.status = StatusCode::UNAUTHORIZED;
        }
        allowed
    }

    async fn on_post_request(&self, _args: Option<Arguments>, response: &mut ResponseContext) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        response
            .headers
            .insert("x-gate", HeaderValue::from_static("passed"));
    }
}

struct GuardedController {
    calls: Arc<AtomicUsize>,
}

impl Controller for GuardedController {
    fn configure(registrar: &mut ControllerRegistrar<Self>) {
        registrar
            .get("/guarded", "guarded", |controller: Arc<Self>, _| async move {
                controller.calls.fetch_add(1, Ordering::SeqCst);
                Ok(Some(Body::from("inside")))
            })
            .middleware("apiKeyGate");
    }
}

struct Harness {
    router: axum::Router,
    controller_calls: Arc<AtomicUsize>,
    middleware_completions: Arc<AtomicUsize>,
}

fn harness() -> Harness {
    let controller_calls = Arc::new(AtomicUsize::new(0));
    let middleware_completions = Arc::new(AtomicUsize::new(0));

    let mut context = ApplicationContext::default();
    let registry = context.registry_mut();
    registry
        .register_service("greeting", "Hello from a service".to_string())
        .unwrap();
    registry
        .register_controller(|registry| {
            Ok(ShowcaseController {
                greeting: registry.service::<String>("greeting")?,
            })
        })
        .unwrap();
    registry.register_controller_instance(VerbsController).unwrap();
    registry.register_controller_instance(StatusController).unwrap();
    registry
        .register_controller_instance(GuardedController {
            calls: Arc::clone(&controller_calls),
        })
        .unwrap();
    registry
        .register_middleware(
            "apiKeyGate",
            ApiKeyGate {
                completed: Arc::clone(&middleware_completions),
            },
        )
        .unwrap();

    let router = EywaApp::new(context)
        .health_checks()
        .request_context()
        .into_router()
        .unwrap();

    Harness {
        router,
        controller_calls,
        middleware_completions,
    }
}

async fn send(router: &axum::Router, request: Request<HttpBody>) -> Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn get(router: &axum::Router, uri: &str) -> Response {
    send(router, Request::get(uri).body(HttpBody::empty()).unwrap()).await
}

async fn text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn every_http_method_is_routed() {
    let Harness { router, .. } = harness();

    for method in HttpMethod::ALL {
        let uri = format!("/verbs/{}", method.as_str().to_lowercase());
        let request = Request::builder()
            .method(axum::http::Method::from(method))
            .uri(&uri)
            .body(HttpBody::empty())
            .unwrap();
        let response = send(&router, request).await;
        assert_eq!(response.status(), StatusCode::OK, "{method} {uri}");
        if method != HttpMethod::Head {
            assert_eq!(text(response).await, method.as_str());
        }
    }
}

#[tokio::test]
async fn query_params_fill_their_positions() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/api-get-1?name=testing&lastname=Eywa").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, "testing Eywa");
}

#[tokio::test]
async fn missing_query_param_resolves_to_nothing() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/api-get-1?name=testing").await;
    assert_eq!(text(response).await, "testing ");
}

#[tokio::test]
async fn route_params_fill_their_positions() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/api-get-3/Steve/Jobs").await;
    assert_eq!(text(response).await, "Steve Jobs");
}

#[tokio::test]
async fn session_survives_between_requests() {
    let Harness { router, .. } = harness();

    let first = get(&router, "/visits").await;
    let cookie = first
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
        .unwrap();
    assert!(cookie.starts_with("EYWA_SESSION="));
    assert_eq!(text(first).await, "1");

    let second = send(
        &router,
        Request::get("/visits")
            .header(header::COOKIE, &cookie)
            .body(HttpBody::empty())
            .unwrap(),
    )
    .await;
    assert!(second.headers().get(header::SET_COOKIE).is_none());
    assert_eq!(text(second).await, "2");

    let fresh = get(&router, "/visits").await;
    assert_eq!(text(fresh).await, "1");
}

#[tokio::test]
async fn parameters_group_query_and_route_values() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/params/42?sort=desc").await;
    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["route"]["id"], "42");
    assert_eq!(body["query"]["sort"], "desc");
}

#[tokio::test]
async fn request_body_is_bound_and_status_applied() {
    let Harness { router, .. } = harness();
    let response = send(
        &router,
        Request::post("/echo")
            .header(header::CONTENT_TYPE, "application/json")
            .body(HttpBody::from(r#"{"name":"Eywa"}"#))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body, json!({"name": "Eywa"}));
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let Harness { router, .. } = harness();
    let response = send(
        &router,
        Request::post("/echo").body(HttpBody::from("{nope")).unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn oversized_body_is_payload_too_large() {
    let Harness { router, .. } = harness();
    let response = send(
        &router,
        Request::post("/echo")
            .body(HttpBody::from(vec![b'x'; 2 * 1024 * 1024 + 1]))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn controller_receives_injected_service() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/greeting").await;
    assert_eq!(text(response).await, "Hello from a service");
}

#[tokio::test]
async fn status_precedence() {
    let Harness { router, .. } = harness();
    assert_eq!(
        get(&router, "/status/default").await.status(),
        StatusCode::ACCEPTED
    );
    assert_eq!(
        get(&router, "/status/moved").await.status(),
        StatusCode::MOVED_PERMANENTLY
    );
    assert_eq!(get(&router, "/api-get-1").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn controller_error_becomes_problem_response() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/failing").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["status"], 500);
}

#[tokio::test]
async fn middleware_short_circuits_the_action() {
    let Harness {
        router,
        controller_calls,
        middleware_completions,
    } = harness();

    let denied = get(&router, "/guarded").await;
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(controller_calls.load(Ordering::SeqCst), 0);
    assert_eq!(middleware_completions.load(Ordering::SeqCst), 0);

    let allowed = send(
        &router,
        Request::get("/guarded")
            .header("x-api-key", "secret")
            .body(HttpBody::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(allowed.status(), StatusCode::OK);
    assert_eq!(allowed.headers().get("x-gate").unwrap(), "passed");
    assert_eq!(text(allowed).await, "inside");
    assert_eq!(controller_calls.load(Ordering::SeqCst), 1);
    assert_eq!(middleware_completions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn correlation_id_is_echoed() {
    let Harness { router, .. } = harness();
    let response = get(&router, "/health").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-correlation-id"));
    let body: serde_json::Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(body["status"], json!(HealthStatus::Healthy));
}

#[tokio::test]
async fn controller_reads_the_correlation_id() {
    let Harness { router, .. } = harness();
    let correlation_id = Uuid::new_v4().to_string();
    let response = send(
        &router,
        Request::get("/whoami")
            .header("x-correlation-id", correlation_id.as_str())
            .body(HttpBody::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(text(response).await, correlation_id);
}

#[tokio::test]
async fn unknown_path_is_not_found() {
    let Harness { router, .. } = harness();
    assert_eq!(get(&router, "/nowhere").await.status(), StatusCode::NOT_FOUND);
}

#[test]
fn starter_lists_bound_routes() {
    let mut context = ApplicationContext::default();
    context
        .registry_mut()
        .register_controller_instance(StatusController)
        .unwrap();

    let starter = MvcFrameworkStarter::new(context).unwrap();
    let mut paths: Vec<_> = starter.routes().iter().map(|r| r.path.as_str()).collect();
    paths.sort_unstable();
    assert_eq!(paths, vec!["/status/default", "/status/moved"]);
}
