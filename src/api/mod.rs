pub mod diagnostics;
pub mod models;
pub mod review;

// Re-exports
pub use models::*;

use crate::config::ServerConfig;
use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::HeaderValue,
    routing::get,
    Json, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Code Review Assistant API".to_string(),
        status: "running".to_string(),
    })
}

// Health handler (simple, keep here)
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.store.clone();
    let total_reviews = match tokio::task::spawn_blocking(move || store.count()).await {
        Ok(Ok(total)) => total,
        Ok(Err(e)) => {
            warn!(error = %e, "Failed to count reviews");
            0
        }
        Err(e) => {
            warn!(error = %e, "Count task failed");
            0
        }
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.gateway.model_name().to_string(),
        total_reviews,
    })
}

fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origins = origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {}", origin))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request()))
}

/// Build the full application router
pub fn router(state: AppState, server: &ServerConfig) -> anyhow::Result<Router> {
    let cors = cors_layer(&server.allowed_origins)?;

    Ok(Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .merge(diagnostics::routes())
        .merge(review::routes())
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(server.max_upload_bytes)),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::testing::FixedGateway;
    use crate::storage::ReviewStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request, StatusCode};
    use serde_json::Value;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tower::ServiceExt;

    const BOUNDARY: &str = "review-test-boundary";

    fn app_with_store(gateway: FixedGateway) -> (Router, Arc<ReviewStore>) {
        let store = Arc::new(ReviewStore::open_in_memory().unwrap());
        let state = AppState::new(Arc::new(gateway), store.clone());
        (router(state, &ServerConfig::default()).unwrap(), store)
    }

    fn app(gateway: FixedGateway) -> Router {
        app_with_store(gateway).0
    }

    fn multipart_request(files: &[(&str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, content) in files {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                     Content-Type: text/plain\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/review")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    const GOOD_REPLY: &str = r#"{"readability_score": 8, "modularity_score": 6.5,
        "potential_issues": ["magic numbers"], "suggestions": ["name constants"]}"#;

    #[tokio::test]
    async fn root_reports_running() {
        let app = app(FixedGateway::replying("{}"));
        let (status, body) = send(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Code Review Assistant API");
        assert_eq!(body["status"], "running");
    }

    #[tokio::test]
    async fn review_returns_one_record_per_file() {
        let app = app(FixedGateway::replying(GOOD_REPLY));
        let request = multipart_request(&[("a.py", b"x = 1"), ("b.js", b"let y = 2;"), ("a.py", b"z = 3")]);

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);

        let reviews = body["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 3);
        let filenames: Vec<&str> = reviews.iter().map(|r| r["filename"].as_str().unwrap()).collect();
        assert_eq!(filenames, vec!["a.py", "b.js", "a.py"]);

        let ids: HashSet<&str> = reviews.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids.len(), 3);
        assert!(ids.iter().all(|id| !id.is_empty()));

        assert_eq!(reviews[0]["readability_score"], 8.0);
        assert_eq!(reviews[0]["modularity_score"], 6.5);
        assert_eq!(reviews[0]["potential_issues"][0], "magic numbers");
        assert_eq!(reviews[0]["suggestions"][0], "name constants");
    }

    #[tokio::test]
    async fn transport_failure_still_succeeds() {
        let app = app(FixedGateway::failing("connection refused"));
        let (status, body) = send(&app, multipart_request(&[("a.rs", b"fn main() {}")])).await;

        assert_eq!(status, StatusCode::OK);
        let review = &body["reviews"][0];
        assert_eq!(review["readability_score"], 6.0);
        assert_eq!(review["modularity_score"], 6.0);
        assert_eq!(review["potential_issues"][0], "API connection error");
        assert_eq!(review["suggestions"][1], "Try again in a moment");
    }

    #[tokio::test]
    async fn unparseable_reply_still_succeeds() {
        let app = app(FixedGateway::replying("Looks fine to me!"));
        let (status, body) = send(&app, multipart_request(&[("a.rs", b"fn main() {}")])).await;

        assert_eq!(status, StatusCode::OK);
        let review = &body["reviews"][0];
        assert_eq!(review["readability_score"], 7.5);
        assert_eq!(review["modularity_score"], 7.0);
        assert_eq!(review["potential_issues"][0], "AI response parsing failed");
    }

    #[tokio::test]
    async fn invalid_utf8_rejects_whole_batch() {
        let app = app(FixedGateway::replying(GOOD_REPLY));
        let request = multipart_request(&[("ok.py", b"x = 1"), ("bad.bin", &[0xc3, 0x28])]);

        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("bad.bin"));

        let (_, listed) = send(&app, get("/reviews")).await;
        assert!(listed["reviews"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_upload_is_rejected() {
        let app = app(FixedGateway::replying(GOOD_REPLY));
        let (status, _) = send(&app, multipart_request(&[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reviews_lists_newest_first_capped() {
        let app = app(FixedGateway::replying(GOOD_REPLY));
        for i in 0..22 {
            let name = format!("file{}.py", i);
            let (status, _) = send(&app, multipart_request(&[(&name, b"pass")])).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, body) = send(&app, get("/reviews")).await;
        assert_eq!(status, StatusCode::OK);
        let reviews = body["reviews"].as_array().unwrap();
        assert_eq!(reviews.len(), 20);
        assert_eq!(reviews[0]["filename"], "file21.py");
        assert_eq!(reviews[19]["filename"], "file2.py");
        assert!(reviews[0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_endpoint_reports_success_and_error() {
        let app_ok = app(FixedGateway::replying("Hello from Gemini API!"));
        let (_, body) = send(&app_ok, get("/test")).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["response"], "Hello from Gemini API!");

        let app_err = app(FixedGateway::failing("bad key"));
        let (status, body) = send(&app_err, get("/test")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "error");
        assert!(body["error"].as_str().unwrap().contains("bad key"));
    }

    #[tokio::test]
    async fn models_endpoint_lists_names() {
        let (_, body) = send(&app(FixedGateway::replying("{}")), get("/models")).await;
        assert_eq!(body["available_models"][0], "models/gemini-1.5-flash");

        let (_, body) = send(&app(FixedGateway::failing("offline")), get("/models")).await;
        assert!(body["error"].as_str().unwrap().contains("offline"));
        assert!(body.get("available_models").is_none());
    }

    #[tokio::test]
    async fn health_counts_reviews() {
        let app = app(FixedGateway::replying(GOOD_REPLY));
        send(&app, multipart_request(&[("a.py", b"x")])).await;

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["total_reviews"], 1);
        assert_eq!(body["model"], "models/fixed");
    }

    #[tokio::test]
    async fn storage_failure_is_a_server_error() {
        let (app, store) = app_with_store(FixedGateway::replying(GOOD_REPLY));
        store.drop_schema().unwrap();

        let (status, body) = send(&app, multipart_request(&[("a.py", b"x = 1")])).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "500 Internal Server Error");
        assert!(body["message"].as_str().unwrap().starts_with("Error processing files"));

        let (status, body) = send(&app, get("/reviews")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["message"].as_str().unwrap().starts_with("Failed to load reviews"));

        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total_reviews"], 0);
    }

    #[tokio::test]
    async fn cors_allows_only_configured_origins() {
        let app = app(FixedGateway::replying("{}"));
        let preflight = |origin: &str| {
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/review")
                .header(header::ORIGIN, origin)
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(preflight("http://localhost:5173")).await.unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );

        let response = app.clone().oneshot(preflight("http://evil.example")).await.unwrap();
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
