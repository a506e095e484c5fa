//! Generation service client
//!
//! The external LLM collaborator. Rate-limit and overload responses are
//! surfaced as `EssayflowError::RateLimited` so the resilient call wrapper
//! can classify them as retryable; everything else is terminal for the call.

use crate::config::GenerationConfig;
use crate::error::{EssayflowError, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::{Client as HttpClient, StatusCode};
use serde_json::json;

/// External generation collaborator.
///
/// Structured responses are requested in JSON mode; a malformed payload is
/// handled by the decode fallback in the calling stage, never here.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Single text generation call
    async fn generate(
        &self,
        system_prompt: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> Result<String>;

    /// Describe one reference image for inclusion in the assignment context
    async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String>;
}

pub struct OpenAiClient {
    config: GenerationConfig,
    http_client: HttpClient,
}

impl OpenAiClient {
    pub fn new(config: GenerationConfig) -> Self {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    fn api_url(&self) -> String {
        self.config
            .base_url
            .as_ref()
            .map(|url| format!("{}/chat/completions", url))
            .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string())
    }

    async fn post_chat(&self, body: serde_json::Value) -> Result<String> {
        let response = self
            .http_client
            .post(self.api_url())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EssayflowError::RateLimited(
                "generation service returned 429".to_string(),
            ));
        }

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            // Overload signals come back as 5xx with an "overloaded" marker
            // and are just as transient as an explicit rate limit
            if error_text.to_lowercase().contains("overloaded") {
                return Err(EssayflowError::RateLimited(format!(
                    "generation service overloaded: {}",
                    error_text
                )));
            }

            return Err(EssayflowError::ServiceUnavailable(format!(
                "generation service returned {} - {}",
                status, error_text
            )));
        }

        let result: serde_json::Value = response.json().await?;
        extract_content(&result)
    }
}

fn extract_content(result: &serde_json::Value) -> Result<String> {
    result["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| EssayflowError::Stage("No content in generation response".to_string()))
}

#[async_trait]
impl GenerationClient for OpenAiClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_content: &str,
        max_tokens: u32,
    ) -> Result<String> {
        self.post_chat(json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_content}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0.7,
            "max_tokens": max_tokens
        }))
        .await
    }

    async fn describe_image(&self, prompt: &str, image: &[u8]) -> Result<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);

        self.post_chat(json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {"type": "text", "text": prompt},
                        {
                            "type": "image_url",
                            "image_url": {
                                "url": format!("data:image/jpeg;base64,{}", encoded)
                            }
                        }
                    ]
                }
            ],
            "max_tokens": 500
        }))
        .await
    }
}
