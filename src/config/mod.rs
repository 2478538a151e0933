#[cfg(feature = "cli")]
pub mod cli;
pub mod env;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::CliConfig;

use crate::core::flatten::SchemaPolicy;
use crate::core::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_bucket_name, validate_file_name, validate_non_empty_string, validate_range,
    validate_url, Validate,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_DESTINATION_BUCKET: &str = "geojson-ingest-demo";
pub const DEFAULT_DESTINATION_TABLE: &str =
    "hurricane-detection-demo.geojson_ingest_demo.day1_hail_forecast";
pub const DEFAULT_DESTINATION_FILE_NAME: &str = "to_load.json";
pub const DEFAULT_LOCATION: &str = "US";
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
pub const DEFAULT_BIGQUERY_ENDPOINT: &str = "https://bigquery.googleapis.com";
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://metadata.google.internal";
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// 執行期設定。每次呼叫再與請求內容組成 `InvocationConfig`。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestSettings {
    pub destination_bucket: String,
    /// `project.dataset.table`；空字串代表不載入 BigQuery
    pub destination_table: String,
    pub destination_file_name: String,
    /// BigQuery 處理區域，需與 dataset 所在區域一致
    pub location: String,
    pub schema_policy: SchemaPolicy,
    pub gcs_endpoint: String,
    pub bigquery_endpoint: String,
    pub metadata_endpoint: String,
    pub access_token: Option<String>,
    /// 不送 Authorization（本地模擬器）
    pub anonymous: bool,
    pub poll_interval_ms: u64,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            destination_bucket: DEFAULT_DESTINATION_BUCKET.to_string(),
            destination_table: DEFAULT_DESTINATION_TABLE.to_string(),
            destination_file_name: DEFAULT_DESTINATION_FILE_NAME.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            schema_policy: SchemaPolicy::default(),
            gcs_endpoint: DEFAULT_GCS_ENDPOINT.to_string(),
            bigquery_endpoint: DEFAULT_BIGQUERY_ENDPOINT.to_string(),
            metadata_endpoint: DEFAULT_METADATA_ENDPOINT.to_string(),
            access_token: None,
            anonymous: false,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

impl ConfigProvider for IngestSettings {
    fn destination_bucket(&self) -> &str {
        &self.destination_bucket
    }

    fn destination_table(&self) -> &str {
        &self.destination_table
    }

    fn destination_file_name(&self) -> &str {
        &self.destination_file_name
    }
}

impl Validate for IngestSettings {
    fn validate(&self) -> Result<()> {
        validate_bucket_name("destination_bucket", &self.destination_bucket)?;
        validate_file_name("destination_file_name", &self.destination_file_name)?;

        // 空字串表示略過載入
        if !self.destination_table.is_empty() {
            self.destination_table
                .parse::<crate::domain::model::TableRef>()?;
        }

        validate_non_empty_string("location", &self.location)?;
        validate_url("gcs_endpoint", &self.gcs_endpoint)?;
        validate_url("bigquery_endpoint", &self.bigquery_endpoint)?;
        validate_url("metadata_endpoint", &self.metadata_endpoint)?;
        validate_range("poll_interval_ms", self.poll_interval_ms, 10, 60_000)?;

        tracing::debug!("✅ Ingest configuration validation passed");
        Ok(())
    }
}
