use super::{choose_model, GatewayError, ModelGateway, ModelInfo};
use crate::config::GeminiConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini REST client bound to the model selected at startup
pub struct GeminiGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<RemoteModel>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteModel {
    name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiGateway {
    /// Create a client for an explicitly named model.
    pub fn new(config: &GeminiConfig, model: impl Into<String>) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: model.into(),
        })
    }

    /// Create a client and select a model from what the service offers.
    ///
    /// Selection happens once; a failed listing falls back to the configured model.
    pub async fn connect(config: &GeminiConfig) -> Result<Self, GatewayError> {
        let mut gateway = Self::new(config, config.fallback_model.clone())?;
        gateway.model = select_model(gateway.list_models().await, config);
        Ok(gateway)
    }

    fn model_path(&self) -> String {
        model_path(&self.model)
    }
}

/// Choose a model from a listing attempt; a failed listing yields the configured fallback.
fn select_model(listing: Result<Vec<ModelInfo>, GatewayError>, config: &GeminiConfig) -> String {
    match listing {
        Ok(models) => {
            let candidates: Vec<String> = models
                .into_iter()
                .filter(ModelInfo::supports_generation)
                .map(|m| m.name)
                .collect();
            info!(count = candidates.len(), "Found generation-capable models");
            debug!(?candidates, "Candidate models");
            choose_model(&candidates, &config.preferred_models, &config.fallback_model)
        }
        Err(e) => {
            warn!(error = %e, fallback = %config.fallback_model, "Could not list models");
            config.fallback_model.clone()
        }
    }
}

fn model_path(name: &str) -> String {
    if name.starts_with("models/") {
        name.to_string()
    } else {
        format!("models/{}", name)
    }
}

/// Join the text parts of the first candidate.
fn candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
    if text.is_empty() { None } else { Some(text) }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Status { status, body })
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, GatewayError> {
        let url = format!("{}/{}:generateContent", self.base_url, self.model_path());
        let body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response = error_for_status(response).await?;

        let parsed: GenerateResponse = response.json().await?;
        candidate_text(parsed)
            .ok_or_else(|| GatewayError::Malformed("response does not contain candidate text".into()))
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, GatewayError> {
        let url = format!("{}/models", self.base_url);
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url).header(API_KEY_HEADER, &self.api_key);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = error_for_status(request.send().await?).await?;
            let page: ListModelsResponse = response.json().await?;

            models.extend(page.models.into_iter().map(|m| ModelInfo {
                name: m.name,
                supported_methods: m.supported_generation_methods,
            }));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(models)
    }
}
