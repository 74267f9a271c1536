use crate::api::models::AppState;
use crate::api::diagnostics::handlers::{models_handler, test_handler};
use axum::{routing::get, Router};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/test", get(test_handler))
        .route("/models", get(models_handler))
}
