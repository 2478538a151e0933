use crate::domain::model::{ColumnSchema, TableRef};
use crate::domain::ports::Warehouse;
use crate::utils::error::Result;

/// 以 schema 取代整張表的內容。表名為空時不載入，回傳 `None`。
pub async fn load_table<W: Warehouse + ?Sized>(
    warehouse: &W,
    destination_table: &str,
    schema: &ColumnSchema,
    source_uri: &str,
) -> Result<Option<u64>> {
    if destination_table.trim().is_empty() {
        tracing::info!(
            "No destination table configured; {} left in place without loading",
            source_uri
        );
        return Ok(None);
    }

    let table: TableRef = destination_table.parse()?;
    tracing::info!(
        "📥 Loading {} into {} ({} columns)",
        source_uri,
        table,
        schema.len()
    );

    warehouse.load_from_uri(&table, schema, source_uri).await?;
    let rows = warehouse.row_count(&table).await?;

    tracing::info!("✅ Loaded {} rows into {}", rows, table);
    Ok(Some(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ColumnField, ColumnType};
    use crate::utils::error::IngestError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingWarehouse {
        loads: Mutex<Vec<(String, usize, String)>>,
        fail_with: Option<String>,
    }

    #[async_trait]
    impl Warehouse for RecordingWarehouse {
        async fn load_from_uri(
            &self,
            table: &TableRef,
            schema: &ColumnSchema,
            source_uri: &str,
        ) -> Result<()> {
            if let Some(message) = &self.fail_with {
                return Err(IngestError::load_job(message.clone()));
            }
            self.loads
                .lock()
                .unwrap()
                .push((table.to_string(), schema.len(), source_uri.to_string()));
            Ok(())
        }

        async fn row_count(&self, _table: &TableRef) -> Result<u64> {
            Ok(3)
        }
    }

    fn schema() -> ColumnSchema {
        vec![
            ColumnField::nullable("dn", ColumnType::Int64),
            ColumnField::nullable("geometry", ColumnType::Geography),
        ]
    }

    #[tokio::test]
    async fn test_load_returns_row_count() {
        let warehouse = RecordingWarehouse::default();
        let rows = load_table(&warehouse, "p.d.t", &schema(), "gs://b/output/x.json")
            .await
            .unwrap();

        assert_eq!(rows, Some(3));
        let loads = warehouse.loads.lock().unwrap();
        assert_eq!(
            loads.as_slice(),
            &[("p.d.t".to_string(), 2, "gs://b/output/x.json".to_string())]
        );
    }

    #[tokio::test]
    async fn test_empty_table_skips_load() {
        let warehouse = RecordingWarehouse::default();
        let rows = load_table(&warehouse, "", &schema(), "gs://b/output/x.json")
            .await
            .unwrap();

        assert_eq!(rows, None);
        assert!(warehouse.loads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_table_id() {
        let warehouse = RecordingWarehouse::default();
        let err = load_table(&warehouse, "just_a_table", &schema(), "gs://b/o.json")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::InvalidConfigValueError { .. }));
    }

    #[tokio::test]
    async fn test_load_failure_propagates() {
        let warehouse = RecordingWarehouse {
            fail_with: Some("Access Denied".to_string()),
            ..Default::default()
        };
        let err = load_table(&warehouse, "p.d.t", &schema(), "gs://b/o.json")
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::LoadJobError { .. }));
    }
}
