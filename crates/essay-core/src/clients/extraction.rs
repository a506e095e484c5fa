//! Document text extraction collaborator

use crate::error::{EssayflowError, Result};
use async_trait::async_trait;

/// Upstream extraction collaborator.
///
/// Called exactly once per job, before the pipeline starts; a failure here
/// prevents the job from being created at all.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &[u8], format_hint: &str) -> Result<String>;
}

/// Extraction for documents that are already plain text. PDF and DOCX
/// parsers live in an external service behind the same trait.
pub struct PlainTextExtractor;

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, document: &[u8], format_hint: &str) -> Result<String> {
        match format_hint {
            "txt" | "text" | "md" => {
                let text = String::from_utf8(document.to_vec()).map_err(|e| {
                    EssayflowError::Validation(format!("Document is not valid UTF-8: {}", e))
                })?;

                if text.trim().is_empty() {
                    return Err(EssayflowError::Validation(
                        "Document contains no text".to_string(),
                    ));
                }

                Ok(text)
            }
            other => Err(EssayflowError::Validation(format!(
                "Unsupported document format: {}",
                other
            ))),
        }
    }
}
