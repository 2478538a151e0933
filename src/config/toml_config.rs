use crate::config::IngestSettings;
use crate::core::flatten::SchemaPolicy;
use crate::utils::error::{IngestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub gcp: GcpConfig,
    #[serde(default)]
    pub schema: SchemaConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DestinationConfig {
    pub bucket: Option<String>,
    pub table: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GcpConfig {
    pub location: Option<String>,
    pub gcs_endpoint: Option<String>,
    pub bigquery_endpoint: Option<String>,
    pub metadata_endpoint: Option<String>,
    pub access_token: Option<String>,
    pub anonymous: Option<bool>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub policy: Option<SchemaPolicy>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(IngestError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| IngestError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${INGEST_TABLE})；未定義的保留原字串
    fn substitute_env_vars(content: &str) -> String {
        static PATTERN: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
        let re = PATTERN.get_or_init(|| Regex::new(r"\$\{([^}]+)\}").expect("valid pattern"));

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    /// 套用到既有設定；檔案沒寫的欄位維持原值
    pub fn apply_to(self, mut settings: IngestSettings) -> IngestSettings {
        let TomlConfig {
            destination,
            gcp,
            schema,
        } = self;

        if let Some(bucket) = destination.bucket {
            settings.destination_bucket = bucket;
        }
        if let Some(table) = destination.table {
            settings.destination_table = table;
        }
        if let Some(file_name) = destination.file_name {
            settings.destination_file_name = file_name;
        }
        if let Some(location) = gcp.location {
            settings.location = location;
        }
        if let Some(endpoint) = gcp.gcs_endpoint {
            settings.gcs_endpoint = endpoint;
        }
        if let Some(endpoint) = gcp.bigquery_endpoint {
            settings.bigquery_endpoint = endpoint;
        }
        if let Some(endpoint) = gcp.metadata_endpoint {
            settings.metadata_endpoint = endpoint;
        }
        if gcp.access_token.is_some() {
            settings.access_token = gcp.access_token;
        }
        if let Some(anonymous) = gcp.anonymous {
            settings.anonymous = anonymous;
        }
        if let Some(interval) = gcp.poll_interval_ms {
            settings.poll_interval_ms = interval;
        }
        if let Some(policy) = schema.policy {
            settings.schema_policy = policy;
        }

        settings
    }

    pub fn into_settings(self) -> IngestSettings {
        self.apply_to(IngestSettings::default())
    }
}
