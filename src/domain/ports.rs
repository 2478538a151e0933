use crate::domain::model::{ColumnSchema, ObjectLocator, TableRef, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub trait ObjectStorage: Send + Sync {
    fn read_object(
        &self,
        locator: &ObjectLocator,
    ) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_object(
        &self,
        locator: &ObjectLocator,
        data: Vec<u8>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

#[async_trait]
pub trait Warehouse: Send + Sync {
    /// 提交載入工作並等待完成（WRITE_TRUNCATE + NEWLINE_DELIMITED_JSON）
    async fn load_from_uri(
        &self,
        table: &TableRef,
        schema: &ColumnSchema,
        source_uri: &str,
    ) -> Result<()>;

    async fn row_count(&self, table: &TableRef) -> Result<u64>;
}

pub trait ConfigProvider: Send + Sync {
    fn destination_bucket(&self) -> &str;
    fn destination_table(&self) -> &str;
    fn destination_file_name(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self, locator: &ObjectLocator, scratch: &Path) -> Result<PathBuf>;
    async fn transform(&self, local_file: &Path, scratch: &Path, file_name: &str)
        -> Result<TransformResult>;
    async fn load(
        &self,
        result: TransformResult,
        bucket: &str,
        file_name: &str,
        table: &str,
    ) -> Result<Option<u64>>;
}
