use clap::Parser;
use geojson_ingest::core::ObjectStorage;
use geojson_ingest::utils::{logger, validation::Validate};
use geojson_ingest::{
    BigQueryClient, CliConfig, EtlEngine, GcsStorage, IngestPipeline, IngestSettings,
    LocalStorage, ResponseEnvelope,
};

async fn ingest<S: ObjectStorage>(
    storage: S,
    cli: &CliConfig,
    settings: IngestSettings,
) -> ResponseEnvelope {
    let warehouse = BigQueryClient::from_settings(reqwest::Client::new(), &settings);
    let pipeline =
        IngestPipeline::new(storage, warehouse).with_schema_policy(settings.schema_policy);
    let engine = EtlEngine::new(pipeline, settings);

    engine.handle(&cli.request_body()).await
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 初始化日誌
    logger::init_cli_logger(cli.verbose);

    tracing::info!("Starting geojson-ingest CLI");
    if cli.verbose {
        tracing::debug!("CLI config: {:?}", cli);
    }

    // 讀取並驗證配置
    let settings = match cli.settings().and_then(|s| s.validate().map(|_| s)) {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            eprintln!("❌ {}", e);
            std::process::exit(1);
        }
    };

    let envelope = match &cli.local_root {
        Some(root) => {
            tracing::info!("📁 Serving buckets from {}", root);
            ingest(LocalStorage::new(root), &cli, settings).await
        }
        None => {
            let storage = GcsStorage::from_settings(reqwest::Client::new(), &settings);
            ingest(storage, &cli, settings).await
        }
    };

    println!("{}", envelope.to_json());
    if !envelope.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
