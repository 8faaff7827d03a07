//! Route handlers.

use crate::error::{AppError, AppResult};
use crate::server::AppState;
use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use taskdraft_core::domain::{
    nullable, GenerationOutcome, GenerationRequest, NewTodo, Priority, Todo, TodoFilter, TodoId,
    TodoPatch,
};
use taskdraft_core::logging::{LogEvent, LogLevel};
use taskdraft_core::metrics::MetricsSnapshot;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/todos", get(list_todos).post(create_todo))
        .route("/todos/completed", get(list_completed))
        .route("/todos/priority/{priority}", get(list_by_priority))
        .route("/todos/ai-generate", post(generate_todo))
        .route(
            "/todos/{id}",
            get(get_todo).put(update_todo).delete(delete_todo),
        )
        .route("/providers", get(list_providers))
        .route("/metrics", get(metrics))
}

#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub completed: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTodoRequest {
    #[serde(default)]
    pub title: Option<String>,
    /// `null` clears the description.
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub completed: Option<bool>,
    #[serde(default)]
    pub priority: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateTodoRequest {
    pub user_input: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct GenerateTodoResponse {
    pub success: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub fallback_used: bool,
    pub provider_used: Option<String>,
}

impl From<&GenerationOutcome> for GenerateTodoResponse {
    fn from(outcome: &GenerationOutcome) -> Self {
        let draft = outcome.draft();
        Self {
            success: outcome.success(),
            title: draft.as_ref().map(|d| d.title.clone()),
            description: draft.as_ref().and_then(|d| d.description.clone()),
            priority: draft.map(|d| d.priority),
            fallback_used: outcome.fallback_used(),
            provider_used: outcome.provider_used().map(str::to_string),
        }
    }
}

fn parse_priority(raw: Option<i64>) -> AppResult<Option<Priority>> {
    raw.map(Priority::try_from)
        .transpose()
        .map_err(|e| AppError::Validation(e.to_string()))
}

fn require_title(title: &str) -> AppResult<()> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("title cannot be empty".to_string()));
    }
    Ok(())
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "Todo API is running" }))
}

async fn list_todos(State(state): State<AppState>) -> AppResult<Json<Vec<Todo>>> {
    Ok(Json(state.store.list_todos(TodoFilter::default()).await?))
}

async fn list_completed(State(state): State<AppState>) -> AppResult<Json<Vec<Todo>>> {
    Ok(Json(state.store.list_todos(TodoFilter::completed()).await?))
}

async fn list_by_priority(
    State(state): State<AppState>,
    Path(priority): Path<String>,
) -> AppResult<Json<Vec<Todo>>> {
    let priority = priority
        .parse::<i64>()
        .ok()
        .and_then(|p| Priority::try_from(p).ok())
        .ok_or_else(|| AppError::BadRequest("Invalid priority".to_string()))?;
    Ok(Json(
        state
            .store
            .list_todos(TodoFilter::with_priority(priority))
            .await?,
    ))
}

async fn create_todo(
    State(state): State<AppState>,
    body: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> AppResult<Json<Todo>> {
    let Json(req) = body?;
    require_title(&req.title)?;
    let todo = NewTodo {
        title: req.title,
        description: req.description,
        completed: req.completed.unwrap_or(false),
        priority: parse_priority(req.priority)?.unwrap_or_default(),
    };
    Ok(Json(state.store.create_todo(todo).await?))
}

async fn get_todo(
    State(state): State<AppState>,
    id: Result<Path<TodoId>, PathRejection>,
) -> AppResult<Json<Todo>> {
    let Path(id) = id?;
    state
        .store
        .get_todo(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn update_todo(
    State(state): State<AppState>,
    id: Result<Path<TodoId>, PathRejection>,
    body: Result<Json<UpdateTodoRequest>, JsonRejection>,
) -> AppResult<Json<Todo>> {
    let Path(id) = id?;
    let Json(req) = body?;
    if let Some(title) = &req.title {
        require_title(title)?;
    }
    let patch = TodoPatch {
        title: req.title,
        description: req.description,
        completed: req.completed,
        priority: parse_priority(req.priority)?,
    };
    state
        .store
        .update_todo(id, patch)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

async fn delete_todo(
    State(state): State<AppState>,
    id: Result<Path<TodoId>, PathRejection>,
) -> AppResult<Json<Value>> {
    let Path(id) = id?;
    if !state.store.delete_todo(id).await? {
        return Err(AppError::NotFound);
    }
    Ok(Json(json!({ "message": "Todo deleted successfully" })))
}

async fn generate_todo(
    State(state): State<AppState>,
    body: Result<Json<GenerateTodoRequest>, JsonRejection>,
) -> AppResult<Json<GenerateTodoResponse>> {
    let Json(req) = body?;
    let request = GenerationRequest::new(&req.user_input)
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let preview: String = request.user_input().chars().take(100).collect();
    state.logger.log(
        LogEvent::new(LogLevel::Info, "api.generate.request").with_field("input", preview),
    );

    let outcome = state.orchestrator.generate(&request).await;
    if !outcome.success() {
        return Err(AppError::Generation(json!({
            "success": false,
            "error": outcome.error_message(),
            "fallback_available": true,
        })));
    }
    Ok(Json(GenerateTodoResponse::from(&outcome)))
}

async fn list_providers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "providers": state.orchestrator.candidate_labels() }))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}
