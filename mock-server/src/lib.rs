use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::TcpListener,
    sync::{Mutex, RwLock},
};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
pub struct CreateApp {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize)]
pub struct UpdateApp {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct DebugRequest {
    pub query: String,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Envelope<T> {
    pub code: String,
    pub message: String,
    pub data: T,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Paginator {
    pub total: u64,
    pub total_page: u64,
    pub current_page: u64,
    pub page_size: u64,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub paginator: Paginator,
}

#[derive(Deserialize)]
pub struct PageParams {
    #[serde(default = "default_current_page")]
    pub current_page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

#[derive(Deserialize)]
pub struct FlakyParams {
    #[serde(default)]
    pub failures: u32,
}

#[derive(Deserialize)]
pub struct SlowParams {
    #[serde(default)]
    pub delay_ms: u64,
}

#[derive(Deserialize)]
pub struct StatusParams {
    pub body: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Shared server state: the app list in insertion order plus per-key hit
/// counters for the flaky endpoint.
#[derive(Clone, Default)]
pub struct AppState {
    apps: Arc<RwLock<Vec<App>>>,
    hits: Arc<Mutex<HashMap<String, u32>>>,
}

pub fn app() -> Router {
    Router::new()
        .route("/apps", get(list_apps).post(create_app))
        .route("/apps/{id}", get(get_app).put(update_app).delete(delete_app))
        .route("/app/{app_id}/debug", post(debug_app))
        .route("/auth/login", post(login))
        .route("/auth/me", get(current_account))
        .route("/legacy/apps", get(legacy_apps))
        .route("/flaky/{key}", get(flaky))
        .route("/slow", get(slow))
        .route("/status/{code}", get(status))
        .with_state(AppState::default())
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Body bytes promised by `run_truncated` responses; fewer are sent.
pub const TRUNCATED_CONTENT_LENGTH: usize = 64;

/// Answers every connection with `status` and a `content-length` larger than
/// the body it writes, then closes, so the client cannot read the body.
pub async fn run_truncated(listener: TcpListener, status: u16) -> Result<(), std::io::Error> {
    loop {
        let (stream, _) = listener.accept().await?;
        let mut stream = BufReader::new(stream);
        let mut line = String::new();
        loop {
            line.clear();
            if stream.read_line(&mut line).await? == 0 || line == "\r\n" {
                break;
            }
        }
        let response = format!(
            "HTTP/1.1 {} {}\r\ncontent-type: text/plain\r\ncontent-length: {TRUNCATED_CONTENT_LENGTH}\r\nconnection: close\r\n\r\npartial",
            status,
            StatusCode::from_u16(status)
                .ok()
                .and_then(|code| code.canonical_reason())
                .unwrap_or("Unknown"),
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await?;
        tracing::debug!(status, "sent truncated response");
    }
}

fn success<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        code: "success".to_string(),
        message: String::new(),
        data,
    })
}

fn failure(code: &str, message: impl Into<String>) -> Json<Envelope<Value>> {
    Json(Envelope {
        code: code.to_string(),
        message: message.into(),
        data: Value::Null,
    })
}

async fn list_apps(State(state): State<AppState>, Query(params): Query<PageParams>) -> Response {
    let page_size = params.page_size.max(1);
    let current_page = params.current_page.max(1);
    let apps = state.apps.read().await;
    let total = apps.len() as u64;
    let offset = (current_page - 1)
        .checked_mul(page_size)
        .and_then(|offset| usize::try_from(offset).ok())
        .unwrap_or(usize::MAX);
    let list = apps
        .iter()
        .skip(offset)
        .take(usize::try_from(page_size).unwrap_or(usize::MAX))
        .cloned()
        .collect();
    success(Page {
        list,
        paginator: Paginator {
            total,
            total_page: total.div_ceil(page_size).max(1),
            current_page,
            page_size,
        },
    })
    .into_response()
}

async fn create_app(State(state): State<AppState>, Json(input): Json<CreateApp>) -> Response {
    if input.name.trim().is_empty() {
        return failure("validate_error", "app name must not be empty").into_response();
    }
    let app = App {
        id: Uuid::new_v4(),
        name: input.name,
        description: input.description,
    };
    state.apps.write().await.push(app.clone());
    success(app).into_response()
}

async fn get_app(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let apps = state.apps.read().await;
    match apps.iter().find(|app| app.id == id) {
        Some(app) => success(app.clone()).into_response(),
        None => failure("not_found", format!("app {id} not found")).into_response(),
    }
}

async fn update_app(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(input): Json<UpdateApp>,
) -> Response {
    let mut apps = state.apps.write().await;
    let Some(app) = apps.iter_mut().find(|app| app.id == id) else {
        return failure("not_found", format!("app {id} not found")).into_response();
    };
    if let Some(name) = input.name {
        if name.trim().is_empty() {
            return failure("validate_error", "app name must not be empty").into_response();
        }
        app.name = name;
    }
    if let Some(description) = input.description {
        app.description = description;
    }
    success(app.clone()).into_response()
}

async fn delete_app(State(state): State<AppState>, Path(id): Path<Uuid>) -> Response {
    let mut apps = state.apps.write().await;
    let before = apps.len();
    apps.retain(|app| app.id != id);
    if apps.len() == before {
        return failure("not_found", format!("app {id} not found")).into_response();
    }
    success(Value::Null).into_response()
}

async fn debug_app(Path(app_id): Path<String>, Json(input): Json<DebugRequest>) -> Response {
    if input.query.trim().is_empty() {
        return failure("validate_error", "query must not be empty").into_response();
    }
    success(json!({ "content": format!("[{app_id}] {}", input.query) })).into_response()
}

async fn login(Json(input): Json<LoginRequest>) -> Response {
    if input.password.is_empty() {
        return failure("unauthorized", "invalid email or password").into_response();
    }
    let token = Uuid::new_v4();
    (
        [(header::SET_COOKIE, format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly"))],
        success(json!({ "email": input.email })),
    )
        .into_response()
}

async fn current_account(headers: HeaderMap) -> Response {
    let has_session = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .any(|pair| pair.trim().starts_with(&format!("{SESSION_COOKIE}=")));
    if !has_session {
        return failure("unauthorized", "login required").into_response();
    }
    success(json!({ "name": "test", "email": "test@163.com" })).into_response()
}

async fn legacy_apps() -> Redirect {
    Redirect::temporary("/apps")
}

/// Answers 503 `failures` times for each `key`, then succeeds with the
/// number of attempts seen.
async fn flaky(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(params): Query<FlakyParams>,
) -> Response {
    let mut hits = state.hits.lock().await;
    let count = hits.entry(key).or_insert(0);
    *count += 1;
    if *count <= params.failures {
        return (StatusCode::SERVICE_UNAVAILABLE, "service unavailable").into_response();
    }
    success(json!({ "attempts": *count })).into_response()
}

async fn slow(Query(params): Query<SlowParams>) -> Response {
    tokio::time::sleep(Duration::from_millis(params.delay_ms)).await;
    success(json!({ "delay_ms": params.delay_ms })).into_response()
}

async fn status(Path(code): Path<u16>, Query(params): Query<StatusParams>) -> Response {
    let Ok(status) = StatusCode::from_u16(code) else {
        return (StatusCode::BAD_REQUEST, "invalid status code").into_response();
    };
    let body = params.body.unwrap_or_else(|| format!("status {code}"));
    (status, body).into_response()
}

fn default_current_page() -> u64 {
    1
}

fn default_page_size() -> u64 {
    20
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_serializes_to_json() {
        let app = App {
            id: Uuid::nil(),
            name: "Test".to_string(),
            description: String::new(),
        };
        let json = serde_json::to_value(&app).unwrap();
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
        assert_eq!(json["name"], "Test");
    }

    #[test]
    fn create_app_defaults_description() {
        let input: CreateApp = serde_json::from_str(r#"{"name":"Bot"}"#).unwrap();
        assert_eq!(input.name, "Bot");
        assert!(input.description.is_empty());
    }

    #[test]
    fn create_app_rejects_missing_name() {
        let result: Result<CreateApp, _> = serde_json::from_str(r#"{"description":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn update_app_all_fields_optional() {
        let input: UpdateApp = serde_json::from_str("{}").unwrap();
        assert!(input.name.is_none());
        assert!(input.description.is_none());
    }

    #[test]
    fn failure_envelope_has_null_data() {
        let Json(env) = failure("fail", "nope");
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, json!({"code": "fail", "message": "nope", "data": null}));
    }
}
