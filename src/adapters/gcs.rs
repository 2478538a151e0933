use crate::adapters::{endpoint_url, error_detail, Credentials};
use crate::config::IngestSettings;
use crate::core::ObjectStorage;
use crate::domain::model::ObjectLocator;
use crate::utils::error::{IngestError, Result};
use reqwest::{Client, StatusCode};

/// Cloud Storage JSON API
#[derive(Debug, Clone)]
pub struct GcsStorage {
    client: Client,
    endpoint: String,
    credentials: Credentials,
}

impl GcsStorage {
    pub fn new(client: Client, endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            credentials,
        }
    }

    pub fn from_settings(client: Client, settings: &IngestSettings) -> Self {
        Self::new(
            client,
            settings.gcs_endpoint.clone(),
            Credentials::from_settings(settings),
        )
    }
}

impl ObjectStorage for GcsStorage {
    async fn read_object(&self, locator: &ObjectLocator) -> Result<Vec<u8>> {
        let mut url = endpoint_url(
            &self.endpoint,
            &["storage", "v1", "b", &locator.bucket, "o", &locator.name],
        )?;
        url.query_pairs_mut().append_pair("alt", "media");

        tracing::debug!("GET {}", url);
        let request = self
            .credentials
            .authorize(&self.client, self.client.get(url))
            .await?;
        let response = request
            .send()
            .await
            .map_err(|e| IngestError::transfer(format!("Failed to read {}: {}", locator, e)))?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(IngestError::ObjectNotFound {
                locator: locator.to_string(),
            }),
            status if !status.is_success() => Err(IngestError::transfer(format!(
                "Failed to read {}: {}",
                locator,
                error_detail(response).await
            ))),
            _ => {
                let data = response.bytes().await.map_err(|e| {
                    IngestError::transfer(format!("Failed to collect {}: {}", locator, e))
                })?;
                Ok(data.to_vec())
            }
        }
    }

    async fn write_object(&self, locator: &ObjectLocator, data: Vec<u8>) -> Result<()> {
        let mut url = endpoint_url(
            &self.endpoint,
            &["upload", "storage", "v1", "b", &locator.bucket, "o"],
        )?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", &locator.name);

        tracing::debug!("POST {} ({} bytes)", url, data.len());
        let request = self
            .credentials
            .authorize(&self.client, self.client.post(url))
            .await?
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(data);
        let response = request
            .send()
            .await
            .map_err(|e| IngestError::transfer(format!("Failed to write {}: {}", locator, e)))?;

        if !response.status().is_success() {
            return Err(IngestError::transfer(format!(
                "Failed to write {}: {}",
                locator,
                error_detail(response).await
            )));
        }

        Ok(())
    }
}
