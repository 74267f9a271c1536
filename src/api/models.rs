use crate::gateway::ModelGateway;
use crate::review::ReviewExtractor;
use crate::storage::{ReviewRecord, ReviewStore};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<dyn ModelGateway>,
    pub extractor: Arc<ReviewExtractor>,
    pub store: Arc<ReviewStore>,
}

impl AppState {
    pub fn new(gateway: Arc<dyn ModelGateway>, store: Arc<ReviewStore>) -> Self {
        Self {
            extractor: Arc::new(ReviewExtractor::new(gateway.clone())),
            gateway,
            store,
        }
    }
}

/// Response from the root endpoint
#[derive(Debug, Serialize)]
pub struct RootResponse {
    pub message: String,
    pub status: String,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
    pub total_reviews: usize,
}

/// Result of a live call to the model
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TestResponse {
    Success { response: String },
    Error { error: String },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ModelsResponse {
    Available { available_models: Vec<String> },
    Error { error: String },
}

/// Reviews produced by an upload or read back from the store
#[derive(Debug, Serialize)]
pub struct ReviewsResponse {
    pub reviews: Vec<ReviewRecord>,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(ErrorResponse {
            error: status.to_string(),
            message,
        }))
        .into_response()
    }
}
