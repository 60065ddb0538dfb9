// Atlas — lib.rs
// Public API, error types, client configuration, re-exports.
// Author: d65v <https://github.com/d65v>

pub mod batch;
pub mod client;
pub mod ids;
pub mod input;
pub mod map;
pub mod naming;
pub mod npy;
pub mod record;
pub mod settings;
pub mod upload;

use thiserror::Error;

pub use client::{AtlasClient, AtlasDataset, DatasetInfo};
pub use input::{ColumnTable, Embeddings, IntoRecords, JsonRows, RowTable};
pub use map::{map_embeddings, map_text, MapOptions, ProjectionParams};
pub use record::{b64int, EmbeddedRecord, Record};
pub use upload::{
    DatasetProvider, DatasetSession, DatasetSpec, IndexHandle, IndexRequest, Modality, Uploader,
};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Dataset `{name}` already exists. Set add_datums_if_exists to add to it, or reset_project_if_exists to replace it")]
    DatasetExists { name: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("NumPy file error: {0}")]
    Npy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AtlasError {
    /// Failures that came from the remote service or the wire to it.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            AtlasError::Remote { .. } | AtlasError::Http(_) | AtlasError::DatasetExists { .. }
        )
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        AtlasError::Validation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;

// ── Config ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct AtlasConfig {
    /// Base URL of the Atlas API
    pub api_url: String,
    /// Bearer token sent with every request
    pub api_key: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Organization used when a dataset name carries no `org/` prefix
    pub org_slug: Option<String>,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            api_url: settings::DEFAULT_API_URL.to_string(),
            api_key: String::new(),
            timeout_secs: 120,
            org_slug: None,
        }
    }
}

impl AtlasConfig {
    /// Load config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let api_url = std::env::var("ATLAS_API_URL")
            .unwrap_or_else(|_| settings::DEFAULT_API_URL.to_string());

        let api_key = std::env::var("ATLAS_API_KEY").unwrap_or_default();

        let timeout_secs = std::env::var("ATLAS_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(120);

        let org_slug = std::env::var("ATLAS_ORGANIZATION")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            api_url,
            api_key,
            timeout_secs,
            org_slug,
        }
    }

    /// Check that the config can reach a server at all.
    ///
    /// # Errors
    /// Returns `AtlasError::Config` for an empty API key or a non-HTTP URL.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(AtlasError::Config(
                "no API key configured; set ATLAS_API_KEY".to_string(),
            ));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(AtlasError::Config(format!(
                "api_url must start with http:// or https://, got '{}'",
                self.api_url
            )));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
