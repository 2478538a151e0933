use crate::config::toml_config::TomlConfig;
use crate::config::IngestSettings;
use crate::utils::error::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "geojson-ingest")]
#[command(about = "Load a GeoJSON FeatureCollection from GCS into a BigQuery table")]
pub struct CliConfig {
    /// Source object(s), e.g. gs://bucket/forecast.geojson; the last one is processed
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// Optional TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(long)]
    pub bucket: Option<String>,

    /// Fully qualified destination table (project.dataset.table); "" skips the load
    #[arg(long)]
    pub table: Option<String>,

    #[arg(long)]
    pub file_name: Option<String>,

    /// strict | union
    #[arg(long)]
    pub schema_policy: Option<String>,

    /// Serve buckets from subdirectories of this path instead of GCS
    #[arg(long)]
    pub local_root: Option<String>,

    #[arg(long, help = "Do not send credentials (storage emulators)")]
    pub anonymous: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CliConfig {
    /// 預設值 → TOML → 環境變數 → 命令列
    pub fn settings(&self) -> Result<IngestSettings> {
        let mut settings = match &self.config {
            Some(path) => TomlConfig::from_file(path)?.into_settings(),
            None => IngestSettings::default(),
        }
        .overlay_env()?;

        if let Some(bucket) = &self.bucket {
            settings.destination_bucket = bucket.clone();
        }
        if let Some(table) = &self.table {
            settings.destination_table = table.clone();
        }
        if let Some(file_name) = &self.file_name {
            settings.destination_file_name = file_name.clone();
        }
        if let Some(policy) = &self.schema_policy {
            settings.schema_policy = policy.parse()?;
        }
        if self.anonymous {
            settings.anonymous = true;
        }

        Ok(settings)
    }

    /// 組成與 HTTP 觸發相同的請求 body
    pub fn request_body(&self) -> Vec<u8> {
        let calls: Vec<Vec<&str>> = self.sources.iter().map(|s| vec![s.as_str()]).collect();
        serde_json::json!({ "calls": calls }).to_string().into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flatten::SchemaPolicy;
    use crate::core::request::resolve_request;

    #[test]
    fn test_cli_overrides() {
        let cli = CliConfig::parse_from([
            "geojson-ingest",
            "gs://src/a.geojson",
            "--table",
            "",
            "--schema-policy",
            "union",
        ]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.destination_table, "");
        assert_eq!(settings.schema_policy, SchemaPolicy::Union);
    }

    #[test]
    fn test_request_body_keeps_last_source() {
        let cli = CliConfig::parse_from([
            "geojson-ingest",
            "gs://src/a.geojson",
            "gs://src/b.geojson",
        ]);
        let resolved = resolve_request(&cli.request_body()).unwrap();
        assert_eq!(resolved.locator.to_string(), "gs://src/b.geojson");
    }
}
