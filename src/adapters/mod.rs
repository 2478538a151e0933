// Adapters layer: concrete implementations for external systems (GCS, BigQuery, local files, credentials).

pub mod auth;
pub mod bigquery;
pub mod gcs;
pub mod local;

pub use auth::Credentials;
pub use bigquery::BigQueryClient;
pub use gcs::GcsStorage;
pub use local::LocalStorage;

use crate::utils::error::{IngestError, Result};
use url::Url;

/// 在 base URL 後面接上路徑片段；每段都會 percent-encode（包含 `/`）
pub(crate) fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base).map_err(|e| IngestError::ConfigError {
        message: format!("Invalid endpoint '{}': {}", base, e),
    })?;

    url.path_segments_mut()
        .map_err(|_| IngestError::ConfigError {
            message: format!("Endpoint '{}' cannot be a base URL", base),
        })?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}

/// 擷取錯誤回應的內容，給錯誤訊息使用
pub(crate) async fn error_detail(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    format!("HTTP {}: {}", status, message.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_encodes_object_names() {
        let url = endpoint_url(
            "https://storage.googleapis.com",
            &["storage", "v1", "b", "bucket", "o", "output/to_load.json"],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/bucket/o/output%2Fto_load.json"
        );
    }

    #[test]
    fn test_endpoint_url_with_trailing_slash() {
        let url = endpoint_url("http://127.0.0.1:4443/", &["bigquery", "v2"]).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:4443/bigquery/v2");
    }

    #[test]
    fn test_endpoint_url_rejects_invalid_base() {
        assert!(endpoint_url("not a url", &["a"]).is_err());
    }
}
