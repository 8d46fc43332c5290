//! JSON HTTP API.
//!
//! Exposes the [`ToolRegistry`] to agents over plain HTTP.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool by name; body is the JSON parameter object |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "content must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `conflict` (409),
//! `tool_error` (500), `vault_unavailable` (503).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::VaultError;
use crate::traits::{ToolContext, ToolInfo, ToolRegistry};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    tools: Arc<ToolRegistry>,
}

/// Start the server with the built-in tools on `[server].bind`.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    run_server_with_tools(config, ToolRegistry::with_builtins()).await
}

/// Start the server with a caller-supplied registry (built-ins plus any
/// custom Rust tools).
pub async fn run_server_with_tools(config: &Config, tools: ToolRegistry) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    for t in tools.tools() {
        tracing::debug!(tool = t.name(), builtin = t.is_builtin(), "registered tool");
    }

    let app = router(Arc::new(config.clone()), Arc::new(tools));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(
        addr = %bind_addr,
        vault = %config.vault.path.display(),
        "note server listening"
    );
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router. Separate from [`run_server`] so it can be driven
/// in-process.
pub fn router(config: Arc<Config>, tools: Arc<ToolRegistry>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { config, tools })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Map a tool failure to a status. Typed vault errors decide first; other
/// errors fall back to inspecting the message.
fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = format!("{}: {}", tool_name, err);

    if let Some(vault_err) = err.downcast_ref::<VaultError>() {
        return match vault_err {
            VaultError::VaultAccess { .. } => {
                AppError::new(StatusCode::SERVICE_UNAVAILABLE, "vault_unavailable", msg)
            }
            VaultError::NoteNotFound(_) => AppError::new(StatusCode::NOT_FOUND, "not_found", msg),
            VaultError::NoteExists(_) => AppError::new(StatusCode::CONFLICT, "conflict", msg),
            VaultError::InvalidTitle(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", msg)
            }
            VaultError::NoteRead { .. } | VaultError::NoteWrite { .. } => {
                AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", msg)
            }
        };
    }

    let text = err.to_string();
    if text.contains("must not be empty")
        || text.contains("invalid")
        || text.contains("requires embeddings")
    {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", msg)
    } else {
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "tool_error", msg)
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state.tools.find(&name).ok_or_else(|| {
        AppError::new(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("no tool registered with name: {}", name),
        )
    })?;

    let params = crate::traits::validate_params(&tool.parameters_schema(), params)
        .map_err(|e| AppError::new(StatusCode::BAD_REQUEST, "bad_request", e.to_string()))?;

    let ctx = ToolContext::new(state.config.clone());
    let result = tool.execute(params, &ctx).await.map_err(|e| {
        tracing::warn!(tool = %name, error = %e, "tool call failed");
        classify_tool_error(&name, e)
    })?;

    Ok(Json(serde_json::json!({ "result": result })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use std::fs;
    use tempfile::TempDir;
    use tower::ServiceExt; // for `oneshot`

    fn app(vault: &std::path::Path) -> Router {
        router(
            Arc::new(Config::for_vault(vault)),
            Arc::new(ToolRegistry::with_builtins()),
        )
    }

    async fn call(
        app: Router,
        name: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(format!("/tools/{}", name))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let resp = app(tmp.path()).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_find_related_over_http() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.md"), "Notes on Hello World programs").unwrap();
        fs::write(tmp.path().join("b.md"), "unrelated").unwrap();

        let (status, body) = call(
            app(tmp.path()),
            "find_related_notes",
            serde_json::json!({ "content": "hello world" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["related"], serde_json::json!(["a"]));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_404() {
        let tmp = TempDir::new().unwrap();
        let (status, body) = call(app(tmp.path()), "nope", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");
    }

    #[tokio::test]
    async fn test_missing_param_is_400() {
        let tmp = TempDir::new().unwrap();
        let (status, body) = call(app(tmp.path()), "create_note", serde_json::json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "bad_request");
    }

    #[tokio::test]
    async fn test_missing_vault_is_503() {
        let tmp = TempDir::new().unwrap();
        let (status, body) = call(
            app(&tmp.path().join("gone")),
            "find_related_notes",
            serde_json::json!({ "content": "x" }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "vault_unavailable");
    }

    #[tokio::test]
    async fn test_duplicate_note_is_409() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Plan.md"), "old").unwrap();
        let (status, body) = call(
            app(tmp.path()),
            "create_note",
            serde_json::json!({ "content": "new", "title": "Plan" }),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "conflict");
    }
}
