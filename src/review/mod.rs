//! Turns one uploaded source file into review fields.
//!
//! The model is unreliable, so extraction never fails on its account: a
//! transport failure and an unparseable reply each degrade to a fixed
//! fallback record. Only undecodable input is reported as an error.

pub mod parsing;
pub mod prompt;

use crate::gateway::ModelGateway;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The model-derived part of a review record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewFields {
    pub readability_score: f64,
    pub modularity_score: f64,
    pub potential_issues: Vec<String>,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("file '{filename}' is not valid UTF-8 text")]
    Decode { filename: String },
}

/// Which path produced a set of review fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewSource {
    Model,
    ParseFallback,
    TransportFallback,
}

pub struct ReviewExtractor {
    gateway: Arc<dyn ModelGateway>,
}

impl ReviewExtractor {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Check that uploaded bytes are UTF-8 source text.
    pub fn decode<'a>(filename: &str, content: &'a [u8]) -> Result<&'a str, ExtractError> {
        std::str::from_utf8(content).map_err(|_| ExtractError::Decode {
            filename: filename.to_string(),
        })
    }

    pub async fn extract(&self, filename: &str, content: &[u8]) -> Result<ReviewFields, ExtractError> {
        let source = Self::decode(filename, content)?;
        Ok(self.review_source(filename, source).await.0)
    }

    /// Review already-decoded source. Always yields complete fields.
    pub async fn review_source(&self, filename: &str, source: &str) -> (ReviewFields, ReviewSource) {
        let prompt = prompt::build_prompt(filename, &prompt::truncate_source(source));

        let (data, origin) = match self.gateway.generate(&prompt).await {
            Err(e) => {
                warn!(filename = %filename, error = %e, "Model call failed, using fallback review");
                (parsing::transport_fallback(&e.to_string()), ReviewSource::TransportFallback)
            }
            Ok(reply) => {
                debug!(filename = %filename, reply = %preview(&reply), "Model replied");
                match parsing::parse_reply(&reply) {
                    Some(data) => (data, ReviewSource::Model),
                    None => {
                        warn!(filename = %filename, raw = %reply, "Could not parse model reply");
                        (parsing::parse_fallback(), ReviewSource::ParseFallback)
                    }
                }
            }
        };

        let fields = parsing::coerce(&data);
        info!(
            filename = %filename,
            source = ?origin,
            readability = fields.readability_score,
            modularity = fields.modularity_score,
            "Review extracted"
        );
        (fields, origin)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
