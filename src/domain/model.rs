use crate::utils::error::{IngestError, Result};
use regex::Regex;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Feature 屬性值。未知型別（布林、陣列、物件）原樣保留在 `Json`。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Integer(i64),
    Float(f64),
    Null,
    Json(serde_json::Value),
}

impl From<serde_json::Value> for PropertyValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Null => PropertyValue::Null,
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PropertyValue::Integer(i)
                } else if n.is_f64() {
                    // is_f64 保證 as_f64 有值
                    PropertyValue::Float(n.as_f64().unwrap_or_default())
                } else {
                    // 超出 i64 範圍的 u64
                    PropertyValue::Json(serde_json::Value::Number(n))
                }
            }
            other => PropertyValue::Json(other),
        }
    }
}

/// 一筆扁平化後的記錄：properties 加上字串化的 `geometry`，保持原始鍵順序。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, PropertyValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已存在的鍵就地覆寫，維持原位置
    pub fn insert(&mut self, key: impl Into<String>, value: PropertyValue) {
        let key = key.into();
        match self.fields.iter().position(|(k, _)| *k == key) {
            Some(pos) => self.fields[pos].1 = value,
            None => self.fields.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "GEOGRAPHY")]
    Geography,
    #[serde(rename = "STRING")]
    String,
    #[serde(rename = "INT64")]
    Int64,
    #[serde(rename = "FLOAT64")]
    Float64,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ColumnType::Geography => "GEOGRAPHY",
            ColumnType::String => "STRING",
            ColumnType::Int64 => "INT64",
            ColumnType::Float64 => "FLOAT64",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnMode {
    Nullable,
}

/// BigQuery schema field 形狀：`{"name", "type", "mode"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnField {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    pub mode: ColumnMode,
}

impl ColumnField {
    pub fn nullable(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            mode: ColumnMode::Nullable,
        }
    }
}

pub type ColumnSchema = Vec<ColumnField>;

/// `gs://bucket/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocator {
    pub bucket: String,
    pub name: String,
}

const GCS_URL: &str = r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)/(?P<key>.+)$";

fn gcs_url_matcher() -> &'static Regex {
    static MATCHER: OnceLock<Regex> = OnceLock::new();
    MATCHER.get_or_init(|| Regex::new(GCS_URL).expect("valid GCS locator pattern"))
}

impl ObjectLocator {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }

    /// 物件名稱的最後一段
    pub fn basename(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

impl FromStr for ObjectLocator {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let caps = gcs_url_matcher()
            .captures(s.trim())
            .ok_or_else(|| IngestError::invalid_request(format!("Invalid object locator: {}", s)))?;
        Ok(Self::new(&caps["bucket"], &caps["key"]))
    }
}

impl fmt::Display for ObjectLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}

/// `project.dataset.table`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableRef {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
}

impl FromStr for TableRef {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [project, dataset, table]
                if !project.is_empty() && !dataset.is_empty() && !table.is_empty() =>
            {
                Ok(Self {
                    project_id: project.to_string(),
                    dataset_id: dataset.to_string(),
                    table_id: table.to_string(),
                })
            }
            _ => Err(IngestError::InvalidConfigValueError {
                field: "destination_table".to_string(),
                value: s.to_string(),
                reason: "Expected a fully qualified table id: project.dataset.table".to_string(),
            }),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

/// 單次呼叫的完整設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationConfig {
    pub source_locator: ObjectLocator,
    pub destination_bucket: String,
    pub destination_table: String,
    pub destination_file_name: String,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub schema: ColumnSchema,
    pub record_count: usize,
    pub output_path: std::path::PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_value_from_json() {
        assert_eq!(
            PropertyValue::from(json!("Zone A")),
            PropertyValue::String("Zone A".to_string())
        );
        assert_eq!(PropertyValue::from(json!(45)), PropertyValue::Integer(45));
        assert_eq!(PropertyValue::from(json!(4.5)), PropertyValue::Float(4.5));
        assert_eq!(PropertyValue::from(json!(null)), PropertyValue::Null);
        assert_eq!(
            PropertyValue::from(json!(true)),
            PropertyValue::Json(json!(true))
        );
        assert_eq!(
            PropertyValue::from(json!(u64::MAX)),
            PropertyValue::Json(json!(u64::MAX))
        );
    }

    #[test]
    fn test_record_insert_keeps_position() {
        let mut record = Record::new();
        record.insert("geometry", PropertyValue::Null);
        record.insert("name", PropertyValue::String("a".to_string()));
        record.insert("geometry", PropertyValue::String("{}".to_string()));

        let keys: Vec<&str> = record.keys().collect();
        assert_eq!(keys, vec!["geometry", "name"]);
        assert_eq!(
            record.get("geometry"),
            Some(&PropertyValue::String("{}".to_string()))
        );
    }

    #[test]
    fn test_record_serializes_in_order() {
        let mut record = Record::new();
        record.insert("b", PropertyValue::Integer(1));
        record.insert("a", PropertyValue::Null);
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"b":1,"a":null}"#);
    }

    #[test]
    fn test_column_field_serializes_bigquery_shape() {
        let field = ColumnField::nullable("wind_speed", ColumnType::Int64);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"name": "wind_speed", "type": "INT64", "mode": "NULLABLE"})
        );
    }

    #[test]
    fn test_object_locator_parse() {
        let locator: ObjectLocator = "gs://bucket/forecasts/day1.geojson".parse().unwrap();
        assert_eq!(locator.bucket, "bucket");
        assert_eq!(locator.name, "forecasts/day1.geojson");
        assert_eq!(locator.basename(), "day1.geojson");
        assert_eq!(locator.to_string(), "gs://bucket/forecasts/day1.geojson");

        assert!("s3://bucket/a.geojson".parse::<ObjectLocator>().is_err());
        assert!("gs://bucket".parse::<ObjectLocator>().is_err());
    }

    #[test]
    fn test_table_ref_parse() {
        let table: TableRef = "proj.dataset.table".parse().unwrap();
        assert_eq!(table.project_id, "proj");
        assert_eq!(table.dataset_id, "dataset");
        assert_eq!(table.table_id, "table");
        assert_eq!(table.to_string(), "proj.dataset.table");

        assert!("dataset.table".parse::<TableRef>().is_err());
        assert!("a..b".parse::<TableRef>().is_err());
    }
}
