//! Rendering service client
//!
//! The rendering collaborator turns a structured essay into final PDF and
//! DOCX documents. It is invoked exactly once, at the terminal formatting
//! stage; failures here are fatal for the job.

use crate::config::RenderServiceConfig;
use crate::error::{EssayflowError, Result};
use async_trait::async_trait;
use base64::Engine;
use essay_types::EssayOutput;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};

/// Display metadata printed on the rendered documents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RenderMetadata {
    pub author_name: Option<String>,
    pub course_name: Option<String>,
}

/// Both output kinds, produced in one render pass
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub pdf_bytes: Vec<u8>,
    pub docx_bytes: Vec<u8>,
}

/// Rendering collaborator interface
#[async_trait]
pub trait EssayRenderer: Send + Sync {
    async fn render(
        &self,
        essay: &EssayOutput,
        metadata: &RenderMetadata,
    ) -> Result<RenderedDocument>;
}

#[derive(Serialize)]
struct RenderRequest<'a> {
    essay: &'a EssayOutput,
    metadata: &'a RenderMetadata,
}

#[derive(Deserialize)]
struct RenderResponse {
    pdf_base64: String,
    docx_base64: String,
}

pub struct RenderServiceClient {
    config: RenderServiceConfig,
    http_client: HttpClient,
}

impl RenderServiceClient {
    pub fn new(config: RenderServiceConfig) -> Self {
        let http_client = HttpClient::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            http_client,
        }
    }

    /// Check PDF magic bytes
    pub fn validate_pdf(&self, pdf_data: &[u8]) -> bool {
        pdf_data.starts_with(b"%PDF")
    }

    fn decode_document(label: &str, encoded: &str) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| {
                EssayflowError::Stage(format!("Render service sent invalid {} payload: {}", label, e))
            })
    }
}

#[async_trait]
impl EssayRenderer for RenderServiceClient {
    async fn render(
        &self,
        essay: &EssayOutput,
        metadata: &RenderMetadata,
    ) -> Result<RenderedDocument> {
        let url = format!("{}/render", self.config.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(&RenderRequest { essay, metadata })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(EssayflowError::ServiceUnavailable(format!(
                "Render service returned {} - {}",
                status, error_text
            )));
        }

        let body: RenderResponse = response.json().await?;

        let pdf_bytes = Self::decode_document("PDF", &body.pdf_base64)?;
        let docx_bytes = Self::decode_document("DOCX", &body.docx_base64)?;

        if !self.validate_pdf(&pdf_bytes) {
            log::warn!("Render service returned a PDF without the expected magic bytes");
        }

        Ok(RenderedDocument {
            pdf_bytes,
            docx_bytes,
        })
    }
}
