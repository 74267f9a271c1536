use crate::api::models::AppState;
use crate::api::review::handlers::{list_reviews_handler, review_handler};
use axum::{
    routing::{get, post},
    Router,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/review", post(review_handler))
        .route("/reviews", get(list_reviews_handler))
}
