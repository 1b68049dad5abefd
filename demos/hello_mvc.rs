//! Small todo service on top of eywa-mvc.
//!
//! Run with `cargo run --example hello_mvc`, then try:
//! - `curl localhost:8080/todos`
//! - `curl -X POST localhost:8080/todos -d '{"title":"write docs"}'`
//! - `curl localhost:8080/todos/1`
//! - `curl -X DELETE -H 'x-admin-token: letmein' localhost:8080/todos/1`

use std::sync::Arc;

use eywa_mvc::prelude::*;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Todo {
    id: u64,
    title: String,
    done: bool,
}

#[derive(Debug, Deserialize)]
struct NewTodo {
    title: String,
}

#[derive(Default)]
struct TodoStore {
    todos: RwLock<Vec<Todo>>,
}

impl TodoStore {
    async fn list(&self) -> Vec<Todo> {
        self.todos.read().await.clone()
    }

    async fn find(&self, id: u64) -> Option<Todo> {
        self.todos.read().await.iter().find(|t| t.id == id).cloned()
    }

    async fn add(&self, title: String) -> Todo {
        let mut todos = self.todos.write().await;
        let todo = Todo {
            id: todos.iter().map(|t| t.id).max().unwrap_or(0) + 1,
            title,
            done: false,
        };
        todos.push(todo.clone());
        todo
    }

    async fn remove(&self, id: u64) -> bool {
        let mut todos = self.todos.write().await;
        let before = todos.len();
        todos.retain(|t| t.id != id);
        todos.len() != before
    }
}

struct TodoController {
    store: Arc<TodoStore>,
}

fn todo_id(args: &Arguments, position: usize) -> Result<u64> {
    args.text(position)
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| AppError::BadRequest("todo id must be a number".into()))
}

impl Controller for TodoController {
    fn configure(registrar: &mut ControllerRegistrar<Self>) {
        registrar.base_path("/todos");

        registrar
            .get("/", "list", |controller: Arc<Self>, args| async move {
                if let Some(session) = args.session(0) {
                    let views = session.get("views").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
                    session.insert("views", views);
                    debug!(views, "Listing todos");
                }
                Body::json(&controller.store.list().await).map(Some)
            })
            .session(0);

        registrar
            .get("/:id", "show", |controller: Arc<Self>, args| async move {
                let todo = controller.store.find(todo_id(&args, 0)?).await;
                todo.map(|t| Body::json(&t)).transpose()
            })
            .route_param(0, "id");

        registrar
            .post("/", "create", |controller: Arc<Self>, args| async move {
                let new: NewTodo = args
                    .json(0)?
                    .ok_or_else(|| AppError::BadRequest("missing todo body".into()))?;
                let todo = controller.store.add(new.title).await;
                info!(id = todo.id, "Created todo");
                Body::json(&todo).map(Some)
            })
            .body(0)
            .response_status(StatusCode::CREATED);

        registrar
            .delete("/:id", "remove", |controller: Arc<Self>, args| async move {
                let removed = controller.store.remove(todo_id(&args, 0)?).await;
                Ok(Some(Body::from(json!({ "removed": removed }))))
            })
            .route_param(0, "id")
            .middleware("adminToken");
    }
}

/// Lets the request through only with the admin token header.
struct AdminToken {
    token: String,
}

#[async_trait]
impl Middleware for AdminToken {
    fn pre_request_bindings(&self) -> Vec<ParamBinding> {
        vec![ParamBinding::new(ParamKind::Header, 0, Some("x-admin-token".into()))]
    }

    async fn on_pre_request(&self, args: Option<Arguments>, response: &mut ResponseContext) -> bool {
        let allowed = args.as_ref().and_then(|a| a.text(0)) == Some(self.token.as_str());
        if !allowed {
            warn!("Rejected request without admin token");
            response.status = StatusCode::FORBIDDEN;
        }
        allowed
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = EywaConfig::settings()?;
    init_tracing(&settings.logging)?;

    let mut context = ApplicationContext::new(settings);
    let registry = context.registry_mut();
    registry.register_service("todoStore", TodoStore::default())?;
    registry.register_middleware(
        "adminToken",
        AdminToken {
            token: std::env::var("ADMIN_TOKEN").unwrap_or_else(|_| "letmein".into()),
        },
    )?;
    registry.register_controller(|registry| {
        Ok(TodoController {
            store: registry.service("todoStore")?,
        })
    })?;

    EywaApp::new(context)
        .info("Todos", "0.1.0", "Todo list served by eywa-mvc controllers")
        .health_checks()
        .request_context()
        .request_logging()
        .compression()
        .run()
        .await?;

    Ok(())
}
