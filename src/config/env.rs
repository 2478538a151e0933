use crate::config::IngestSettings;
use crate::utils::error::{IngestError, Result};
use std::env;

impl IngestSettings {
    /// 以預設值為基礎，套用環境變數
    pub fn from_env() -> Result<Self> {
        Self::default().overlay_env()
    }

    pub fn overlay_env(self) -> Result<Self> {
        self.overlay_from(|key| env::var(key).ok())
    }

    /// 環境變數覆寫；`lookup` 方便測試時注入
    pub fn overlay_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bucket) = lookup("INGEST_DESTINATION_BUCKET") {
            self.destination_bucket = bucket;
        }
        if let Some(table) = lookup("INGEST_DESTINATION_TABLE") {
            self.destination_table = table;
        }
        if let Some(file_name) = lookup("INGEST_DESTINATION_FILE_NAME") {
            self.destination_file_name = file_name;
        }
        if let Some(location) = lookup("INGEST_LOCATION") {
            self.location = location;
        }
        if let Some(policy) = lookup("INGEST_SCHEMA_POLICY") {
            self.schema_policy = policy.parse()?;
        }
        if let Some(token) = lookup("INGEST_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(anonymous) = lookup("INGEST_ANONYMOUS") {
            self.anonymous = parse_bool("INGEST_ANONYMOUS", &anonymous)?;
        }
        if let Some(interval) = lookup("INGEST_POLL_INTERVAL_MS") {
            self.poll_interval_ms =
                interval
                    .parse()
                    .map_err(|_| IngestError::InvalidConfigValueError {
                        field: "INGEST_POLL_INTERVAL_MS".to_string(),
                        value: interval.clone(),
                        reason: "Expected a number of milliseconds".to_string(),
                    })?;
        }
        if let Some(endpoint) = lookup("GCS_ENDPOINT") {
            self.gcs_endpoint = endpoint;
        }
        if let Some(endpoint) = lookup("BIGQUERY_ENDPOINT") {
            self.bigquery_endpoint = endpoint;
        }
        // 與 Google 用戶端函式庫相同的變數名稱，值不含 scheme
        if let Some(host) = lookup("GCE_METADATA_HOST") {
            self.metadata_endpoint = format!("http://{}", host);
        }

        Ok(self)
    }
}

fn parse_bool(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(IngestError::InvalidConfigValueError {
            field: field.to_string(),
            value: value.to_string(),
            reason: "Expected true or false".to_string(),
        }),
    }
}
