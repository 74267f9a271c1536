use crate::api::models::*;
use axum::{extract::State, Json};
use tracing::{info, warn};

const TEST_PROMPT: &str = "Say 'Hello from Gemini API!'";

/// Round-trip a fixed prompt through the model. Failures are reported in the body.
pub async fn test_handler(State(state): State<AppState>) -> Json<TestResponse> {
    info!(model = %state.gateway.model_name(), "Testing model connection");

    match state.gateway.generate(TEST_PROMPT).await {
        Ok(response) => Json(TestResponse::Success { response }),
        Err(e) => {
            warn!(error = %e, "Model test failed");
            Json(TestResponse::Error { error: e.to_string() })
        }
    }
}

/// Every model the service advertises, generation-capable or not
pub async fn models_handler(State(state): State<AppState>) -> Json<ModelsResponse> {
    match state.gateway.list_models().await {
        Ok(models) => Json(ModelsResponse::Available {
            available_models: models.into_iter().map(|m| m.name).collect(),
        }),
        Err(e) => {
            warn!(error = %e, "Listing models failed");
            Json(ModelsResponse::Error { error: e.to_string() })
        }
    }
}
