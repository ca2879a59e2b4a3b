use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use super::api_error::ApiError;
use super::api_key::require_api_key;
use super::health_routes::{detailed_health, health};
use super::sheets_routes::{create_sheet, delete_sheet, get_sheet, update_sheet};
use crate::core::sheets::{SheetsService, SpreadsheetClient};

/// Shared by every handler.
pub struct AppState<C: SpreadsheetClient> {
    pub sheets: Arc<SheetsService<C>>,
    pub started_at: Instant,
}

impl<C: SpreadsheetClient> AppState<C> {
    pub fn new(sheets: SheetsService<C>) -> Self {
        Self {
            sheets: Arc::new(sheets),
            started_at: Instant::now(),
        }
    }
}

// Derive would demand `C: Clone`.
impl<C: SpreadsheetClient> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            sheets: Arc::clone(&self.sheets),
            started_at: self.started_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Normalised to `/segment` form, or empty for no prefix.
    pub api_prefix: String,
    pub api_key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_prefix: "/api".to_string(),
            api_key: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid PORT, using {}", defaults.port);
                defaults.port
            }),
            None => defaults.port,
        };

        Self {
            host: lookup("HOST")
                .filter(|h| !h.trim().is_empty())
                .unwrap_or(defaults.host),
            port,
            api_prefix: lookup("API_PREFIX")
                .map(|p| normalize_prefix(&p))
                .unwrap_or(defaults.api_prefix),
            api_key: lookup("API_KEY").filter(|k| !k.trim().is_empty()),
        }
    }
}

/// `api/` -> `/api`, `/` -> ``.
fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

pub fn build_router<C: SpreadsheetClient + 'static>(
    state: AppState<C>,
    config: &ServerConfig,
) -> Router {
    let sheets = Router::new()
        .route("/sheets/create", post(create_sheet::<C>))
        .route("/sheets/:id/update", put(update_sheet::<C>))
        .route("/sheets/:id", get(get_sheet::<C>).delete(delete_sheet::<C>))
        .layer(middleware::from_fn_with_state(
            config.api_key.clone(),
            require_api_key,
        ));

    let api = Router::new()
        .route("/health", get(health::<C>))
        .route("/health/detailed", get(detailed_health::<C>))
        .merge(sheets)
        .with_state(state);

    // axum refuses to nest at the root.
    let app = if config.api_prefix.is_empty() {
        api
    } else {
        Router::new().nest(&config.api_prefix, api)
    };

    app.fallback(|| async { ApiError::NotFound("Route not found".to_string()) })
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sheets::sheets_service::tests::FakeSheets;
    use crate::core::sheets::SheetsConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with(client: FakeSheets, config: &ServerConfig) -> Router {
        let state = AppState::new(SheetsService::new(client, SheetsConfig::default()));
        build_router(state, config)
    }

    fn app() -> Router {
        app_with(FakeSheets::default(), &ServerConfig::default())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn create_body() -> Value {
        json!({
            "eventData": {"id": "evt-1", "title": "Rust Workshop"},
            "registrations": [{
                "participantName": "Asha",
                "participantEmail": "asha@example.com"
            }]
        })
    }

    #[tokio::test]
    async fn test_health() {
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_detailed_health_reports_upstream_failure() {
        let app = app_with(FakeSheets::failing(&["auth"]), &ServerConfig::default());
        let request = Request::get("/api/health/detailed")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app, request).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_create_returns_created() {
        let (status, body) = send(app(), post_json("/api/sheets/create", create_body())).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["spreadsheetId"], "sheet-123");
        assert_eq!(body["data"]["rowCount"], 1);
        assert_eq!(
            body["data"]["shareableLink"],
            "https://docs.google.com/spreadsheets/d/sheet-123/edit"
        );
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_payload() {
        let payload = json!({
            "eventData": {"id": "evt-1"},
            "registrations": [{"participantName": "Asha", "participantEmail": "nope"}]
        });
        let (status, body) = send(app(), post_json("/api/sheets/create", payload)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "ValidationError");
        let fields: Vec<_> = body["details"]
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["field"].as_str().unwrap().to_string())
            .collect();
        assert!(fields.contains(&"eventData.title".to_string()));
        assert!(fields.contains(&"registrations[0].participantEmail".to_string()));
    }

    #[tokio::test]
    async fn test_create_accepts_both_key_spellings() {
        let payload = json!({
            "event_data": {"id": "evt-1", "title": "Rust Workshop", "name": "Old Title"},
            "registrations": [{
                "participantName": "Asha",
                "participant_name": "Asha K",
                "participant_email": "asha@example.com"
            }]
        });
        let (status, body) = send(app(), post_json("/api/sheets/create", payload)).await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["rowCount"], 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/sheets/create")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(app(), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_unknown_sheet_is_not_found() {
        let request = Request::get("/api/sheets/missing").body(Body::empty()).unwrap();
        let (status, body) = send(app(), request).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NotFoundError");
    }

    #[tokio::test]
    async fn test_api_key_guards_sheet_routes() {
        let config = ServerConfig {
            api_key: Some("s3cret".to_string()),
            ..ServerConfig::default()
        };

        let app = app_with(FakeSheets::default(), &config);
        let (status, _) = send(app, post_json("/api/sheets/create", create_body())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let app = app_with(FakeSheets::default(), &config);
        let mut request = post_json("/api/sheets/create", create_body());
        request
            .headers_mut()
            .insert("x-api-key", "s3cret".parse().unwrap());
        let (status, _) = send(app, request).await;
        assert_eq!(status, StatusCode::CREATED);

        // Health stays public.
        let app = app_with(FakeSheets::default(), &config);
        let request = Request::get("/api/health").body(Body::empty()).unwrap();
        assert_eq!(send(app, request).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_prefix_serves_from_root() {
        let config = ServerConfig {
            api_prefix: String::new(),
            ..ServerConfig::default()
        };
        let app = app_with(FakeSheets::default(), &config);
        let request = Request::get("/health").body(Body::empty()).unwrap();

        assert_eq!(send(app, request).await.0, StatusCode::OK);
    }

    #[test]
    fn test_server_config_from_lookup() {
        let config = ServerConfig::from_lookup(|key| match key {
            "PORT" => Some("8080".to_string()),
            "API_PREFIX" => Some("v1/".to_string()),
            "API_KEY" => Some("  ".to_string()),
            _ => None,
        });

        assert_eq!(config.port, 8080);
        assert_eq!(config.api_prefix, "/v1");
        assert_eq!(config.api_key, None);
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(normalize_prefix("/"), "");
    }
}
