use crate::core::request::{
    resolve_request, ResolvedRequest, CONTEXT_DESTINATION_BUCKET, CONTEXT_DESTINATION_FILE_NAME,
    CONTEXT_DESTINATION_TABLE,
};
use crate::core::response::ResponseEnvelope;
use crate::core::{ConfigProvider, Pipeline};
use crate::domain::model::{InvocationConfig, TableRef};
use crate::utils::error::Result;
use crate::utils::validation::{validate_bucket_name, validate_file_name};
use tempfile::TempDir;

pub struct EtlEngine<P: Pipeline, C: ConfigProvider> {
    pipeline: P,
    config: C,
}

impl<P: Pipeline, C: ConfigProvider> EtlEngine<P, C> {
    pub fn new(pipeline: P, config: C) -> Self {
        Self { pipeline, config }
    }

    /// 處理一次觸發請求；任何階段失敗都轉成 400 的錯誤外層
    pub async fn handle(&self, body: &[u8]) -> ResponseEnvelope {
        match self.execute(body).await {
            Ok(rows) => ResponseEnvelope::success(rows),
            Err(e) => {
                tracing::error!(
                    "❌ Ingest failed: {} (Category: {:?})",
                    e,
                    e.category()
                );
                ResponseEnvelope::failure(&e)
            }
        }
    }

    async fn execute(&self, body: &[u8]) -> Result<Option<u64>> {
        let resolved = resolve_request(body)?;
        if let Some(request_id) = &resolved.request_id {
            tracing::info!("Handling request {}", request_id);
        }
        let invocation = self.invocation_config(resolved)?;
        self.run(&invocation).await
    }

    /// 以設定值為基礎，套用請求中的 userDefinedContext 覆寫
    pub fn invocation_config(&self, resolved: ResolvedRequest) -> Result<InvocationConfig> {
        let context = resolved.context;
        let pick = |key: &str, default: &str| {
            context
                .get(key)
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        let invocation = InvocationConfig {
            source_locator: resolved.locator,
            destination_bucket: pick(CONTEXT_DESTINATION_BUCKET, self.config.destination_bucket()),
            destination_table: pick(CONTEXT_DESTINATION_TABLE, self.config.destination_table()),
            destination_file_name: pick(
                CONTEXT_DESTINATION_FILE_NAME,
                self.config.destination_file_name(),
            ),
        };

        validate_bucket_name("destination_bucket", &invocation.destination_bucket)?;
        validate_file_name("destination_file_name", &invocation.destination_file_name)?;
        // 空字串表示略過載入；其餘必須在發佈前確認可解析
        if !invocation.destination_table.trim().is_empty() {
            invocation.destination_table.parse::<TableRef>()?;
        }
        Ok(invocation)
    }

    /// fetch → flatten → publish → load；暫存目錄在任何結束路徑都會被清除
    pub async fn run(&self, invocation: &InvocationConfig) -> Result<Option<u64>> {
        tracing::info!("🚀 Starting ingest of {}", invocation.source_locator);
        let scratch = TempDir::new()?;

        tracing::info!("Extracting data...");
        let local_file = self
            .pipeline
            .extract(&invocation.source_locator, scratch.path())
            .await?;

        tracing::info!("Transforming data...");
        let result = self
            .pipeline
            .transform(&local_file, scratch.path(), &invocation.destination_file_name)
            .await?;
        tracing::info!("Transformed {} records", result.record_count);

        tracing::info!("Loading data...");
        let rows = self
            .pipeline
            .load(
                result,
                &invocation.destination_bucket,
                &invocation.destination_file_name,
                &invocation.destination_table,
            )
            .await?;

        tracing::info!("✅ Ingest of {} completed", invocation.source_locator);
        Ok(rows)
    }
}
