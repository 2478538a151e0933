use anyhow::Context;
use axum::body::Bytes;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use geojson_ingest::utils::{logger, validation::Validate};
use geojson_ingest::{
    BigQueryClient, EtlEngine, GcsStorage, IngestPipeline, IngestSettings, ResponseEnvelope,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

const DEFAULT_PORT: u16 = 8080;

type Engine = EtlEngine<IngestPipeline<GcsStorage, BigQueryClient>, IngestSettings>;

/// BigQuery remote function 的 HTTP 入口
async fn ingest(
    Extension(engine): Extension<Arc<Engine>>,
    body: Bytes,
) -> (StatusCode, Json<ResponseEnvelope>) {
    let envelope = engine.handle(&body).await;
    let status =
        StatusCode::from_u16(envelope.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope))
}

async fn health() -> &'static str {
    "ok\n"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init_server_logger();

    let settings = IngestSettings::from_env().context("failed to read configuration")?;
    settings.validate().context("invalid configuration")?;

    let client = reqwest::Client::new();
    let storage = GcsStorage::from_settings(client.clone(), &settings);
    let warehouse = BigQueryClient::from_settings(client, &settings);
    let pipeline =
        IngestPipeline::new(storage, warehouse).with_schema_policy(settings.schema_policy);
    let engine: Arc<Engine> = Arc::new(EtlEngine::new(pipeline, settings));

    let app = Router::new()
        .route("/", post(ingest))
        .route("/health", get(health))
        .layer(Extension(engine));

    let port = match std::env::var("PORT") {
        Ok(value) => value
            .parse()
            .with_context(|| format!("invalid PORT '{}'", value))?,
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(%addr, "🚀 geojson-ingest server listening");
    axum::serve(listener, app).await?;

    Ok(())
}
