// Opinion Warehouse worker - runs the ETL pipeline once and reports

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use opinion_warehouse::config::Config;
use opinion_warehouse::pipeline::EtlPipeline;
use opinion_warehouse::sources::{ApiSource, CsvSource, DatabaseSource, JsonSource, OpinionSource};
use opinion_warehouse::warehouse::{PostgresWarehouse, SqliteWarehouse, WarehouseStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::from_env()?;

    let store = build_store(&config).await?;
    let sources = build_sources(&config)?;
    if sources.is_empty() {
        anyhow::bail!(
            "no sources configured; set CSV_FILE_PATH, SOURCE_DATABASE_URL, API_BASE_URL or JSON_FILE_PATH"
        );
    }

    // Ctrl-C requests a graceful stop; phases exit at their next checkpoint.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("shutdown signal received, cancelling run");
            signal_cancel.cancel();
        }
    });

    let pipeline = EtlPipeline::new(store, sources, config.etl.clone());
    let report = pipeline.run(&cancel).await;

    info!(
        run_id = %report.run_id,
        success = report.success,
        extracted = report.extracted,
        accepted = report.accepted,
        rejected = report.rejected,
        loaded = report.loaded,
        "worker finished"
    );

    if !report.success {
        anyhow::bail!(
            "ETL run failed: {}",
            report.error.unwrap_or_else(|| "unknown error".to_string())
        );
    }
    Ok(())
}

async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn WarehouseStore>> {
    let url = &config.warehouse.url;
    if url.starts_with("sqlite") {
        let store = SqliteWarehouse::connect(url).await?;
        store.init_schema().await?;
        Ok(Arc::new(store))
    } else {
        let store = PostgresWarehouse::connect(url).await?;
        store.health_check().await?;
        store.init_schema().await?;
        Ok(Arc::new(store))
    }
}

fn build_sources(config: &Config) -> anyhow::Result<Vec<Arc<dyn OpinionSource>>> {
    let mut sources: Vec<Arc<dyn OpinionSource>> = Vec::new();

    if let Some(csv) = &config.csv {
        sources.push(Arc::new(CsvSource::new(csv.clone())));
    }
    if let Some(db) = &config.source_db {
        sources.push(Arc::new(DatabaseSource::new(db.clone())));
    }
    if let Some(api) = &config.api {
        sources.push(Arc::new(ApiSource::new(api.clone())?));
    }
    if let Some(json) = &config.json {
        sources.push(Arc::new(JsonSource::new(json.clone())));
    }

    Ok(sources)
}
