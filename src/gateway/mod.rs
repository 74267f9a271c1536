pub mod gemini;
pub mod selection;

pub use gemini::GeminiGateway;
pub use selection::choose_model;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Failure to get a reply out of the model service.
///
/// Network errors, rejected credentials and quota limits all land here;
/// callers treat them the same way.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request to model service failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("model service returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected model service response: {0}")]
    Malformed(String),
}

/// A model advertised by the service
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub name: String,
    pub supported_methods: Vec<String>,
}

impl ModelInfo {
    pub fn supports_generation(&self) -> bool {
        self.supported_methods.iter().any(|m| m == "generateContent")
    }
}

/// Text generation backend used by the review extractor and diagnostics.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    /// Model chosen at startup
    fn model_name(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String, GatewayError>;

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError>;
}
