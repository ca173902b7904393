// Pipeline orchestration - extract, validate, resolve dimensions, load facts

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::EtlOptions;
use crate::error::{AppError, AppResult};
use crate::sources::{ExtractionCoordinator, OpinionSource};
use crate::transform;
use crate::warehouse::{DimensionResolver, FactLoader, WarehouseStore};

/// Outcome of one pipeline run, surfaced to the hosting process.
#[derive(Debug, Clone)]
pub struct EtlReport {
    pub run_id: Uuid,
    pub success: bool,
    pub extracted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub normalized_sentiment: usize,
    pub loaded: u64,
    pub elapsed: Duration,
    pub error: Option<String>,
}

impl EtlReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            success: false,
            extracted: 0,
            accepted: 0,
            rejected: 0,
            normalized_sentiment: 0,
            loaded: 0,
            elapsed: Duration::ZERO,
            error: None,
        }
    }
}

/// Sequences the pipeline phases and defines the failure boundary.
///
/// Phases are strictly ordered because each consumes the complete output
/// of its predecessor. Source failures are isolated inside the extraction
/// phase; dimension-resolution and fact-load failures abort the run.
pub struct EtlPipeline {
    store: Arc<dyn WarehouseStore>,
    sources: Vec<Arc<dyn OpinionSource>>,
    options: EtlOptions,
}

impl EtlPipeline {
    pub fn new(
        store: Arc<dyn WarehouseStore>,
        sources: Vec<Arc<dyn OpinionSource>>,
        options: EtlOptions,
    ) -> Self {
        Self {
            store,
            sources,
            options,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> EtlReport {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let mut report = EtlReport::new(run_id);

        info!(%run_id, "starting ETL run");

        match self.execute(cancel, &mut report).await {
            Ok(()) => {
                report.success = true;
                report.elapsed = started.elapsed();
                let seconds = report.elapsed.as_secs_f64();
                let rate = if seconds > 0.0 {
                    report.loaded as f64 / seconds
                } else {
                    0.0
                };
                info!(
                    %run_id,
                    extracted = report.extracted,
                    accepted = report.accepted,
                    rejected = report.rejected,
                    loaded = report.loaded,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    rows_per_sec = rate,
                    "ETL run complete"
                );
            }
            Err(err) => {
                report.elapsed = started.elapsed();
                report.error = Some(err.to_string());
                error!(
                    %run_id,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    error = %err,
                    "ETL run failed"
                );
            }
        }

        report
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        report: &mut EtlReport,
    ) -> AppResult<()> {
        // Phase 1: extraction. Individual source failures are absorbed here.
        let coordinator = ExtractionCoordinator::new(
            self.sources.clone(),
            self.options.parallel_extraction,
            self.options.max_parallelism,
        );
        let raw = coordinator.extract_all(cancel).await;
        report.extracted = raw.len();
        info!(extracted = report.extracted, "extraction phase complete");

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        // Phase 2: validation and normalization.
        let outcome = transform::validate_and_normalize(raw, self.options.max_parallelism).await;
        report.accepted = outcome.accepted.len();
        report.rejected = outcome.rejections.total();
        report.normalized_sentiment = outcome.normalized_sentiment;
        info!(
            accepted = report.accepted,
            rejected = report.rejected,
            "validation phase complete"
        );

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        // Phase 3: dimension resolution over the full accepted set.
        let resolver = DimensionResolver::new(self.store.clone());
        let keys = resolver.resolve(&outcome.accepted, cancel).await?;

        // Phase 4: full-refresh fact load. Runs even with zero accepted
        // records so a refresh against empty sources empties the warehouse.
        if outcome.accepted.is_empty() {
            warn!("no valid records to load");
        }
        let loader = FactLoader::new(self.store.clone(), self.options.batch_size);
        report.loaded = loader.load(&outcome.accepted, &keys, cancel).await?;

        Ok(())
    }
}
