//! Document store collaborator used to fetch curated records by type and id.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::StoreConfig;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document store returned status {0}")]
    Status(u16),
    #[error("document store request failed: {0}")]
    Transport(String),
    #[error("document store response is not JSON: {0}")]
    Malformed(String),
}

/// Read access to the indexed curation documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetches the raw store response (`{found, _source}`) for one record.
    async fn fetch(&self, doc_type: &str, id: &str) -> Result<Value, StoreError>;
}

/// Store client issuing `GET {base_url}/{type}/{id}`.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpDocumentStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        let base_url = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &StoreConfig) -> Result<Self, StoreError> {
        Self::new(config.base_url.clone(), config.timeout)
    }

    pub fn document_url(&self, doc_type: &str, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, doc_type, id)
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn fetch(&self, doc_type: &str, id: &str) -> Result<Value, StoreError> {
        let url = self.document_url(doc_type, id);
        debug!(url = %url, "fetching document");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| StoreError::Transport(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| StoreError::Malformed(err.to_string()))
    }
}
