//! Configuration management for the EssayFlow system

use crate::error::{EssayflowError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure, loaded from a JSON credentials file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EssayflowConfig {
    pub generation: GenerationConfig,

    #[serde(default)]
    pub store: StoreConfig,

    pub render_service: RenderServiceConfig,

    #[serde(default)]
    pub worker: WorkerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub api_key: String,
    pub model: String,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Attempt budget for the resilient call wrapper
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(alias = "url", default = "default_redis_url")]
    pub redis_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            redis_url: default_redis_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderServiceConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_worker_count")]
    pub count: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
        }
    }
}

// Default functions
fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_max_attempts() -> u32 {
    5
}

fn default_worker_count() -> usize {
    4
}

impl EssayflowConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| EssayflowError::Config(format!("Failed to read config file: {}", e)))?;

        Self::from_json_str(&content)
    }

    /// Load configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| EssayflowError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.generation.api_key.is_empty() {
            return Err(EssayflowError::Config(
                "Generation API key is required".to_string(),
            ));
        }

        if self.generation.model.is_empty() {
            return Err(EssayflowError::Config(
                "Generation model is required".to_string(),
            ));
        }

        if self.generation.max_attempts == 0 {
            return Err(EssayflowError::Config(
                "Generation max_attempts must be at least 1".to_string(),
            ));
        }

        if self.render_service.base_url.is_empty() {
            return Err(EssayflowError::Config(
                "Render service base URL is required".to_string(),
            ));
        }

        if self.worker.count == 0 {
            return Err(EssayflowError::Config(
                "Worker count must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
