//! Text generation providers (local inference).

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use crate::config::MnemoConfig;
use crate::error::ProviderError;

/// Attempts before a generation call is reported as failed
pub const GENERATE_ATTEMPTS: u32 = 3;

/// Opaque text-to-text call.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Ollama `/api/generate` client with bounded retry and linear backoff.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    backoff_unit: Duration,
}

impl OllamaGenerator {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            backoff_unit: Duration::from_secs(1),
        }
    }

    pub fn from_config(config: &MnemoConfig) -> Self {
        Self::new(config.ollama_url.clone(), config.ollama_model.clone())
    }

    /// Override the backoff unit (attempt `n` sleeps `n * unit`).
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    async fn attempt(&self, prompt: &str) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&GenerateRequest {
                model: &self.model,
                prompt,
                stream: false,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(e.to_string()))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl TextGenerator for OllamaGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut last = String::new();
        for attempt in 1..=GENERATE_ATTEMPTS {
            match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                // A malformed body will not improve on retry
                Err(err @ ProviderError::Response(_)) => return Err(err),
                Err(err) => {
                    warn!(attempt, error = %err, "generation attempt failed");
                    last = err.to_string();
                    if attempt < GENERATE_ATTEMPTS {
                        tokio::time::sleep(self.backoff_unit * attempt).await;
                    }
                }
            }
        }

        Err(ProviderError::RetriesExhausted {
            attempts: GENERATE_ATTEMPTS,
            last,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_exhausts_retries() {
        // Port 9 (discard) on localhost is not an HTTP server
        let generator = OllamaGenerator::new("http://127.0.0.1:9", "test")
            .with_backoff_unit(Duration::from_millis(1));
        let err = generator.generate("hi").await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let generator = OllamaGenerator::new("http://localhost:11434/", "m");
        assert_eq!(generator.base_url, "http://localhost:11434");
    }
}
