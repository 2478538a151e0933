//! GeoJSON FeatureCollection → newline-delimited JSON, plus column schema inference.
//!
//! Every feature becomes one line: its `properties` with the `geometry` member
//! re-encoded as a JSON string under the `geometry` key. Output uses `", "` /
//! `": "` separators and ASCII-only escaping so lines match what the upstream
//! Python tooling produces for the same collection.

use crate::domain::model::{
    ColumnField, ColumnSchema, ColumnType, PropertyValue, Record, TransformResult,
};
use crate::utils::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use serde_json::ser::Formatter;
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

pub const GEOMETRY_KEY: &str = "geometry";

/// 多筆記錄的 schema 合併策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaPolicy {
    /// 所有記錄必須擁有相同的鍵集合
    #[default]
    Strict,
    /// 取所有鍵的聯集，缺少的欄位載入為 NULL
    Union,
}

impl FromStr for SchemaPolicy {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(SchemaPolicy::Strict),
            "union" => Ok(SchemaPolicy::Union),
            other => Err(IngestError::InvalidConfigValueError {
                field: "schema_policy".to_string(),
                value: other.to_string(),
                reason: "Expected 'strict' or 'union'".to_string(),
            }),
        }
    }
}

impl fmt::Display for SchemaPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaPolicy::Strict => f.write_str("strict"),
            SchemaPolicy::Union => f.write_str("union"),
        }
    }
}

/// `{"a": 1, "b": [1, 2]}` 風格的輸出，非 ASCII 字元轉為 `\uXXXX`
#[derive(Debug, Default, Clone, Copy)]
pub struct SpacedAsciiFormatter;

impl Formatter for SpacedAsciiFormatter {
    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + Write>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()> {
        if fragment.is_ascii() {
            return writer.write_all(fragment.as_bytes());
        }

        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// 以 `SpacedAsciiFormatter` 序列化任意值
pub fn to_spaced_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedAsciiFormatter);
    value.serialize(&mut serializer)?;
    // formatter 只輸出 ASCII
    String::from_utf8(buf).map_err(|e| IngestError::MalformedInput {
        message: format!("Serialized record is not UTF-8: {}", e),
    })
}

/// 單一鍵值的型別對應：geometry → GEOGRAPHY，字串 → STRING，整數 → INT64，其餘 → FLOAT64
pub fn infer_column_type(key: &str, value: &PropertyValue) -> ColumnType {
    if key == GEOMETRY_KEY {
        return ColumnType::Geography;
    }
    match value {
        PropertyValue::String(_) => ColumnType::String,
        PropertyValue::Integer(_) => ColumnType::Int64,
        PropertyValue::Float(_) | PropertyValue::Null | PropertyValue::Json(_) => {
            ColumnType::Float64
        }
    }
}

/// Null 不決定型別，交給其他記錄
fn observed_type(key: &str, value: &PropertyValue) -> Option<ColumnType> {
    match value {
        PropertyValue::Null if key != GEOMETRY_KEY => None,
        _ => Some(infer_column_type(key, value)),
    }
}

fn widen(current: ColumnType, incoming: ColumnType) -> Option<ColumnType> {
    use ColumnType::*;
    match (current, incoming) {
        (a, b) if a == b => Some(a),
        (Int64, Float64) | (Float64, Int64) => Some(Float64),
        _ => None,
    }
}

/// 把單一 feature 轉成 Record
pub fn flatten_feature(index: usize, feature: serde_json::Value) -> Result<Record> {
    let serde_json::Value::Object(mut feature) = feature else {
        return Err(IngestError::malformed(format!(
            "feature {} is not a JSON object",
            index
        )));
    };

    let properties = feature.remove("properties").ok_or_else(|| {
        IngestError::malformed(format!("feature {} has no 'properties' key", index))
    })?;
    let geometry = feature.remove(GEOMETRY_KEY).ok_or_else(|| {
        IngestError::malformed(format!("feature {} has no 'geometry' key", index))
    })?;

    let mut record = Record::new();
    match properties {
        serde_json::Value::Object(map) => {
            for (key, value) in map {
                record.insert(key, PropertyValue::from(value));
            }
        }
        // GeoJSON 允許 properties 為 null
        serde_json::Value::Null => {}
        _ => {
            return Err(IngestError::malformed(format!(
                "feature {} has non-object 'properties'",
                index
            )))
        }
    }

    let encoded = match geometry {
        serde_json::Value::Null => PropertyValue::Null,
        geometry => PropertyValue::String(to_spaced_json(&geometry)?),
    };
    record.insert(GEOMETRY_KEY, encoded);

    Ok(record)
}

/// 解析整份 FeatureCollection；任何錯誤都在寫檔之前發生
pub fn parse_collection(content: impl AsRef<[u8]>) -> Result<Vec<Record>> {
    let document: serde_json::Value = serde_json::from_slice(content.as_ref())
        .map_err(|e| IngestError::malformed(format!("input is not valid JSON: {}", e)))?;

    let serde_json::Value::Object(mut document) = document else {
        return Err(IngestError::malformed("top-level value is not a JSON object"));
    };

    let features = match document.remove("features") {
        Some(serde_json::Value::Array(features)) => features,
        Some(_) => return Err(IngestError::malformed("'features' is not an array")),
        None => return Err(IngestError::malformed("top-level 'features' key is missing")),
    };

    features
        .into_iter()
        .enumerate()
        .map(|(index, feature)| flatten_feature(index, feature))
        .collect()
}

/// 一次性推導整個集合的 schema
pub fn infer_schema(records: &[Record], policy: SchemaPolicy) -> Result<ColumnSchema> {
    let Some(first) = records.first() else {
        return Ok(Vec::new());
    };
    let expected: BTreeSet<&str> = first.keys().collect();

    // (欄位名稱, 目前觀察到的型別)，依首次出現順序
    let mut columns: Vec<(String, Option<ColumnType>)> = Vec::new();

    for (index, record) in records.iter().enumerate() {
        if policy == SchemaPolicy::Strict {
            let keys: BTreeSet<&str> = record.keys().collect();
            if keys != expected {
                let missing: Vec<&str> = expected.difference(&keys).copied().collect();
                let extra: Vec<&str> = keys.difference(&expected).copied().collect();
                return Err(IngestError::SchemaConflict {
                    message: format!(
                        "feature {} does not match the key set of feature 0 (missing: {:?}, extra: {:?})",
                        index, missing, extra
                    ),
                });
            }
        }

        for (key, value) in record.iter() {
            let incoming = observed_type(key, value);
            let Some(pos) = columns.iter().position(|(name, _)| name == key) else {
                columns.push((key.to_string(), incoming));
                continue;
            };

            let slot = &mut columns[pos];
            slot.1 = match (slot.1, incoming) {
                (None, t) | (t, None) => t,
                (Some(current), Some(incoming)) => {
                    Some(widen(current, incoming).ok_or_else(|| IngestError::SchemaConflict {
                        message: format!(
                            "column '{}' is {} in an earlier feature but {} in feature {}",
                            key, current, incoming, index
                        ),
                    })?)
                }
            };
        }
    }

    Ok(columns
        .into_iter()
        .map(|(name, column_type)| {
            let column_type =
                column_type.unwrap_or_else(|| infer_column_type(&name, &PropertyValue::Null));
            ColumnField::nullable(name, column_type)
        })
        .collect())
}

/// 每筆記錄一行 JSON，以 `\n` 結尾
pub fn write_ndjson<W: Write>(records: &[Record], writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    for record in records {
        let line = to_spaced_json(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}

pub fn flatten_collection(
    input: &Path,
    output: &Path,
    policy: SchemaPolicy,
) -> Result<TransformResult> {
    // UTF-8 檢查交給 serde_json，非 UTF-8 視為格式錯誤
    let content = std::fs::read(input)?;
    let records = parse_collection(&content)?;
    let schema = infer_schema(&records, policy)?;

    tracing::debug!(
        "Writing {} records to {}",
        records.len(),
        output.display()
    );
    let file = std::fs::File::create(output)?;
    write_ndjson(&records, file)?;

    tracing::info!(
        "🔧 Flattened {} features into {} columns ({} policy)",
        records.len(),
        schema.len(),
        policy
    );

    Ok(TransformResult {
        schema,
        record_count: records.len(),
        output_path: output.to_path_buf(),
    })
}
