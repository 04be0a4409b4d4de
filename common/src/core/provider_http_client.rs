use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, Secret};
use uuid::Uuid;

use crate::domain::entities::source_table::{SourceRow, SourceTable};
use crate::ports::source_provider::{SourceProvider, SourceProviderError};

/// HTTP client to the upstream structured-data provider.
///
/// Endpoints consumed:
/// - `GET {base_url}/sources` — every source visible to our credential
/// - `GET {base_url}/sources/{id}` — metadata of one source
/// - `GET {base_url}/sources/{id}/rows` — current rows of one source
pub struct ProviderHttpClient {
    http_client: reqwest::Client,
    base_url: String,
    api_token: Secret<String>,
}

impl ProviderHttpClient {
    /// A request timeout is always set: a stuck provider call must not pin
    /// a sync job forever
    pub fn try_new(
        base_url: &str,
        api_token: Secret<String>,
        timeout: Duration,
    ) -> Result<Self, SourceProviderError> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, SourceProviderError> {
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(self.api_token.expose_secret())
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl SourceProvider for ProviderHttpClient {
    #[tracing::instrument(name = "Listing sources from provider", skip(self))]
    async fn list_sources(&self) -> Result<Vec<SourceTable>, SourceProviderError> {
        self.get_json(format!("{}/sources", self.base_url)).await
    }

    #[tracing::instrument(name = "Fetching source metadata from provider", skip(self))]
    async fn fetch_source(&self, source_id: Uuid) -> Result<SourceTable, SourceProviderError> {
        self.get_json(format!("{}/sources/{}", self.base_url, source_id))
            .await
    }

    #[tracing::instrument(name = "Fetching source rows from provider", skip(self))]
    async fn fetch_rows(&self, source_id: Uuid) -> Result<Vec<SourceRow>, SourceProviderError> {
        self.get_json(format!("{}/sources/{}/rows", self.base_url, source_id))
            .await
    }
}
