use crate::adapters::auth::with_token;
use crate::adapters::{endpoint_url, error_detail, Credentials};
use crate::config::IngestSettings;
use crate::core::Warehouse;
use crate::domain::model::{ColumnSchema, TableRef};
use crate::utils::error::{IngestError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const WRITE_TRUNCATE: &str = "WRITE_TRUNCATE";
const NEWLINE_DELIMITED_JSON: &str = "NEWLINE_DELIMITED_JSON";
const STATE_DONE: &str = "DONE";

/// 同一行程內的工作序號，避免同一微秒送出的工作 id 重複
static JOB_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// BigQuery v2 REST：載入工作與表格中繼資料
#[derive(Debug, Clone)]
pub struct BigQueryClient {
    client: Client,
    endpoint: String,
    location: String,
    credentials: Credentials,
    poll_interval: Duration,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobInsert<'a> {
    job_reference: JobReference,
    configuration: JobConfiguration<'a>,
}

#[derive(Debug, Serialize)]
struct JobConfiguration<'a> {
    load: LoadConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration<'a> {
    source_uris: Vec<&'a str>,
    destination_table: &'a TableRef,
    schema: TableSchema<'a>,
    write_disposition: &'static str,
    source_format: &'static str,
}

#[derive(Debug, Serialize)]
struct TableSchema<'a> {
    fields: &'a ColumnSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    status: JobStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    state: String,
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    reason: Option<String>,
    message: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        match (&self.reason, &self.message) {
            (Some(reason), Some(message)) => format!("{}: {}", reason, message),
            (None, Some(message)) => message.clone(),
            (Some(reason), None) => reason.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Table {
    /// BigQuery 以字串回傳 int64
    num_rows: Option<String>,
}

impl BigQueryClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        location: impl Into<String>,
        credentials: Credentials,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            location: location.into(),
            credentials,
            poll_interval: Duration::from_millis(crate::config::DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn from_settings(client: Client, settings: &IngestSettings) -> Self {
        Self::new(
            client,
            settings.bigquery_endpoint.clone(),
            settings.location.clone(),
            Credentials::from_settings(settings),
        )
        .with_poll_interval(Duration::from_millis(settings.poll_interval_ms))
    }

    fn new_job_id() -> String {
        format!(
            "geojson_ingest_{}_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S_%f"),
            std::process::id(),
            JOB_SEQUENCE.fetch_add(1, Ordering::Relaxed)
        )
    }

    async fn insert_job(&self, job: &JobInsert<'_>, token: Option<&str>) -> Result<Job> {
        let url = endpoint_url(
            &self.endpoint,
            &["bigquery", "v2", "projects", &job.job_reference.project_id, "jobs"],
        )?;

        let request = with_token(self.client.post(url), token).json(job);
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(IngestError::load_job(format!(
                "Failed to submit load job: {}",
                error_detail(response).await
            )));
        }

        Ok(response.json().await?)
    }

    async fn get_job(&self, reference: &JobReference, token: Option<&str>) -> Result<Job> {
        let mut url = endpoint_url(
            &self.endpoint,
            &[
                "bigquery",
                "v2",
                "projects",
                &reference.project_id,
                "jobs",
                &reference.job_id,
            ],
        )?;
        url.query_pairs_mut().append_pair("location", &self.location);

        let request = with_token(self.client.get(url), token);
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(IngestError::load_job(format!(
                "Failed to poll job {}: {}",
                reference.job_id,
                error_detail(response).await
            )));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Warehouse for BigQueryClient {
    async fn load_from_uri(
        &self,
        table: &TableRef,
        schema: &ColumnSchema,
        source_uri: &str,
    ) -> Result<()> {
        let reference = JobReference {
            project_id: table.project_id.clone(),
            job_id: Self::new_job_id(),
            location: Some(self.location.clone()),
        };
        let insert = JobInsert {
            job_reference: reference.clone(),
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    source_uris: vec![source_uri],
                    destination_table: table,
                    schema: TableSchema { fields: schema },
                    write_disposition: WRITE_TRUNCATE,
                    source_format: NEWLINE_DELIMITED_JSON,
                },
            },
        };

        // 提交與輪詢共用同一個 token
        let token = self.credentials.access_token(&self.client).await?;

        tracing::debug!("Submitting load job {}", reference.job_id);
        let mut job = self.insert_job(&insert, token.as_deref()).await?;

        // 沒有逾時，等到工作結束
        while job.status.state != STATE_DONE {
            tracing::debug!("Job {} is {}", reference.job_id, job.status.state);
            tokio::time::sleep(self.poll_interval).await;
            job = self.get_job(&reference, token.as_deref()).await?;
        }

        if let Some(error) = &job.status.error_result {
            let primary = error.describe();
            let mut messages = vec![primary.clone()];
            messages.extend(
                job.status
                    .errors
                    .iter()
                    .map(ErrorProto::describe)
                    .filter(|m| *m != primary),
            );
            return Err(IngestError::load_job(format!(
                "job {} failed: {}",
                reference.job_id,
                messages.join("; ")
            )));
        }

        tracing::debug!("Load job {} finished", reference.job_id);
        Ok(())
    }

    async fn row_count(&self, table: &TableRef) -> Result<u64> {
        let url = endpoint_url(
            &self.endpoint,
            &[
                "bigquery",
                "v2",
                "projects",
                &table.project_id,
                "datasets",
                &table.dataset_id,
                "tables",
                &table.table_id,
            ],
        )?;

        let request = self
            .credentials
            .authorize(&self.client, self.client.get(url))
            .await?;
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(IngestError::load_job(format!(
                "Failed to read table {}: {}",
                table,
                error_detail(response).await
            )));
        }

        let metadata: Table = response.json().await?;
        match metadata.num_rows {
            Some(rows) => rows.parse().map_err(|_| {
                IngestError::load_job(format!("Table {} reported invalid numRows '{}'", table, rows))
            }),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::{ColumnField, ColumnType};
    use httpmock::prelude::*;
    use serde_json::json;

    fn client(server: &MockServer) -> BigQueryClient {
        BigQueryClient::new(Client::new(), server.base_url(), "US", Credentials::Anonymous)
            .with_poll_interval(Duration::from_millis(10))
    }

    fn table() -> TableRef {
        "proj.weather.hail".parse().unwrap()
    }

    fn schema() -> ColumnSchema {
        vec![
            ColumnField::nullable("dn", ColumnType::Int64),
            ColumnField::nullable("geometry", ColumnType::Geography),
        ]
    }

    #[tokio::test]
    async fn test_load_job_completes_immediately() {
        let server = MockServer::start_async().await;
        let insert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bigquery/v2/projects/proj/jobs")
                    .json_body_partial(
                        r#"{
                            "jobReference": {"projectId": "proj", "location": "US"},
                            "configuration": {"load": {
                                "sourceUris": ["gs://dest/output/to_load.json"],
                                "destinationTable": {"projectId": "proj", "datasetId": "weather", "tableId": "hail"},
                                "schema": {"fields": [
                                    {"name": "dn", "type": "INT64", "mode": "NULLABLE"},
                                    {"name": "geometry", "type": "GEOGRAPHY", "mode": "NULLABLE"}
                                ]},
                                "writeDisposition": "WRITE_TRUNCATE",
                                "sourceFormat": "NEWLINE_DELIMITED_JSON"
                            }}
                        }"#,
                    );
                then.status(200).json_body(json!({"status": {"state": "DONE"}}));
            })
            .await;

        client(&server)
            .load_from_uri(&table(), &schema(), "gs://dest/output/to_load.json")
            .await
            .unwrap();

        insert.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_job_polls_until_done() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bigquery/v2/projects/proj/jobs");
                then.status(200).json_body(json!({"status": {"state": "RUNNING"}}));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_contains("/bigquery/v2/projects/proj/jobs/geojson_ingest_")
                    .query_param("location", "US");
                then.status(200).json_body(json!({"status": {"state": "DONE"}}));
            })
            .await;

        client(&server)
            .load_from_uri(&table(), &schema(), "gs://dest/output/to_load.json")
            .await
            .unwrap();

        poll.assert_async().await;
    }

    #[tokio::test]
    async fn test_load_job_error_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bigquery/v2/projects/proj/jobs");
                then.status(200).json_body(json!({
                    "status": {
                        "state": "DONE",
                        "errorResult": {"reason": "invalid", "message": "Error while reading data"},
                        "errors": [
                            {"reason": "invalid", "message": "Error while reading data"},
                            {"reason": "invalid", "message": "Invalid GEOGRAPHY value"}
                        ]
                    }
                }));
            })
            .await;

        let err = client(&server)
            .load_from_uri(&table(), &schema(), "gs://dest/output/to_load.json")
            .await
            .unwrap_err();

        match err {
            IngestError::LoadJobError { message } => {
                assert!(message.contains("Error while reading data"));
                assert!(message.contains("Invalid GEOGRAPHY value"));
            }
            other => panic!("expected LoadJobError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_submit_permission_denied() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/bigquery/v2/projects/proj/jobs");
                then.status(403).json_body(json!({
                    "error": {"code": 403, "message": "Access Denied: Project proj"}
                }));
            })
            .await;

        let err = client(&server)
            .load_from_uri(&table(), &schema(), "gs://dest/output/to_load.json")
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::LoadJobError { .. }));
        assert!(err.to_string().contains("Access Denied"));
    }

    #[test]
    fn test_job_ids_are_unique() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| BigQueryClient::new_job_id()).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.starts_with("geojson_ingest_")));
    }

    #[tokio::test]
    async fn test_polling_reuses_metadata_token() {
        let server = MockServer::start_async().await;
        let token = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/computeMetadata/v1/instance/service-accounts/default/token");
                then.status(200)
                    .json_body(json!({"access_token": "ya29.poll", "expires_in": 3599}));
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/bigquery/v2/projects/proj/jobs")
                    .header("authorization", "Bearer ya29.poll");
                then.status(200).json_body(json!({"status": {"state": "PENDING"}}));
            })
            .await;
        let poll = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path_contains("/bigquery/v2/projects/proj/jobs/geojson_ingest_")
                    .header("authorization", "Bearer ya29.poll");
                then.status(200).json_body(json!({"status": {"state": "DONE"}}));
            })
            .await;

        let credentials = Credentials::MetadataServer {
            endpoint: server.base_url(),
        };
        BigQueryClient::new(Client::new(), server.base_url(), "US", credentials)
            .with_poll_interval(Duration::from_millis(10))
            .load_from_uri(&table(), &schema(), "gs://dest/output/to_load.json")
            .await
            .unwrap();

        poll.assert_async().await;
        token.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn test_row_count() {
        let server = MockServer::start_async().await;
        let metadata = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/bigquery/v2/projects/proj/datasets/weather/tables/hail");
                then.status(200).json_body(json!({"id": "proj:weather.hail", "numRows": "42"}));
            })
            .await;

        let rows = client(&server).row_count(&table()).await.unwrap();

        metadata.assert_async().await;
        assert_eq!(rows, 42);
    }
}
