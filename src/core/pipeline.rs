use crate::core::flatten::{flatten_collection, SchemaPolicy};
use crate::core::loader::load_table;
use crate::core::transfer::{fetch_object, publish_object};
use crate::domain::model::{ObjectLocator, TransformResult};
use crate::domain::ports::{ObjectStorage, Pipeline, Warehouse};
use crate::utils::error::Result;
use std::path::{Path, PathBuf};

/// GCS → NDJSON → GCS → BigQuery
pub struct IngestPipeline<S: ObjectStorage, W: Warehouse> {
    storage: S,
    warehouse: W,
    policy: SchemaPolicy,
}

impl<S: ObjectStorage, W: Warehouse> IngestPipeline<S, W> {
    pub fn new(storage: S, warehouse: W) -> Self {
        Self {
            storage,
            warehouse,
            policy: SchemaPolicy::default(),
        }
    }

    pub fn with_schema_policy(mut self, policy: SchemaPolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait::async_trait]
impl<S: ObjectStorage, W: Warehouse> Pipeline for IngestPipeline<S, W> {
    async fn extract(&self, locator: &ObjectLocator, scratch: &Path) -> Result<PathBuf> {
        fetch_object(&self.storage, locator, scratch).await
    }

    async fn transform(
        &self,
        local_file: &Path,
        scratch: &Path,
        file_name: &str,
    ) -> Result<TransformResult> {
        let output = scratch.join(file_name);
        flatten_collection(local_file, &output, self.policy)
    }

    async fn load(
        &self,
        result: TransformResult,
        bucket: &str,
        file_name: &str,
        table: &str,
    ) -> Result<Option<u64>> {
        let uri = publish_object(&self.storage, bucket, &result.output_path, file_name).await?;
        load_table(&self.warehouse, table, &result.schema, &uri).await
    }
}
