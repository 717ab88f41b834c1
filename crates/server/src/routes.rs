//! HTTP routes wrapping [`ParserService`].

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use longreader_core::{LongreaderError, ParseOutcome, ParserService};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub type AppState = Arc<ParserService>;

/// Body of `POST /api/articles/parse`.
#[derive(Debug, Deserialize)]
pub struct ParseRequest {
    pub url: String,
    /// Caller identity on the calling platform.
    pub user_id: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Error response with a `{ error, message }` JSON body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl From<LongreaderError> for ApiError {
    fn from(err: LongreaderError) -> Self {
        let kind = err.kind();
        Self {
            status: StatusCode::from_u16(kind.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: ErrorBody { error: kind.as_str(), message: err.user_message() },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self { status: rejection.status(), body: ErrorBody { error: "invalid_request", message: rejection.body_text() } }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/articles/parse", post(parse_article))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn parse_article(
    State(service): State<AppState>, payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ParseOutcome>), ApiError> {
    let Json(request) = payload?;
    let outcome = service.handle_parse_request(&request.url, &request.user_id).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use longreader_core::{Fetcher, MemoryStore, ParserConfig, Result};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    const PAGE: &str = r#"<html><head><meta property="og:title" content="Served Title"></head>
        <body><article><p>A short article body served by the stub fetcher.</p></article></body></html>"#;

    struct StubFetcher(fn() -> Result<String>);

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch_html(&self, _url: &str) -> Result<String> {
            (self.0)()
        }
    }

    fn router(fetch: fn() -> Result<String>, daily_limit: u32) -> Router {
        let config = ParserConfig::builder().daily_limit(daily_limit).min_output_size(1).build();
        let service = ParserService::new(Arc::new(MemoryStore::new()), Arc::new(StubFetcher(fetch)), config);
        app(Arc::new(service))
    }

    fn parse_request(body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/articles/parse")
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn valid_request() -> Request<Body> {
        parse_request(json!({ "url": "https://example.com/post", "user_id": "reader" }).to_string())
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = router(|| Ok(PAGE.to_string()), 10)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"ok");
    }

    #[tokio::test]
    async fn test_parse_created() {
        let response = router(|| Ok(PAGE.to_string()), 10).oneshot(valid_request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = json_body(response).await;
        assert_eq!(body["url"], "https://example.com/post");
        assert!(body["article_id"].is_string());
        assert!(body["user_article_id"].is_string());
        assert!(body.get("article").is_none());
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let app = router(|| Ok(PAGE.to_string()), 1);

        let first = app.clone().oneshot(valid_request()).await.unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app.oneshot(valid_request()).await.unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(second).await["error"], "quota_exceeded");
    }

    #[tokio::test]
    async fn test_blocked_fetch() {
        let fetch = || -> Result<String> {
            Err(LongreaderError::FetchBlocked { url: "https://example.com/post".to_string() })
        };
        let response = router(fetch, 10).oneshot(valid_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = json_body(response).await;
        assert_eq!(body["error"], "fetch_blocked");
        assert!(body["message"].as_str().unwrap().contains("blocks automated access"));
    }

    #[tokio::test]
    async fn test_upstream_error() {
        let response = router(|| Err(LongreaderError::Upstream { status: 503 }), 10)
            .oneshot(valid_request())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_unprocessable_page() {
        let page = || -> Result<String> { Ok("<html><body><div id=\"root\"></div></body></html>".to_string()) };
        let response = router(page, 10).oneshot(valid_request()).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(response).await["error"], "unprocessable_content");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let response = router(|| Ok(PAGE.to_string()), 10)
            .oneshot(parse_request("{not json".to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "invalid_request");
    }
}
