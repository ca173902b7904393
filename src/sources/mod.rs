// Source extractors - each adapter owns its I/O and maps source-specific
// fields into OpinionRecord; the coordinator merges their outputs

pub mod api_source;
pub mod csv_source;
pub mod db_source;
pub mod json_source;

pub use api_source::ApiSource;
pub use csv_source::CsvSource;
pub use db_source::DatabaseSource;
pub use json_source::JsonSource;

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::AppResult;
use crate::model::OpinionRecord;

/// Contract for one opinion source. Implementations own their I/O, honor
/// cancellation promptly, and must not assume synchronous completion
/// elsewhere in the pipeline.
#[async_trait]
pub trait OpinionSource: Send + Sync {
    /// Stable human-readable name used in logs and metrics.
    fn name(&self) -> &str;

    async fn extract(&self, cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>>;
}

/// Runs every registered source and merges their records.
///
/// A failing source is logged and contributes zero records; the run
/// continues with whatever the other sources produced. No ordering
/// guarantee is made across sources.
pub struct ExtractionCoordinator {
    sources: Vec<Arc<dyn OpinionSource>>,
    parallel: bool,
    max_parallelism: usize,
}

impl ExtractionCoordinator {
    pub fn new(sources: Vec<Arc<dyn OpinionSource>>, parallel: bool, max_parallelism: usize) -> Self {
        Self {
            sources,
            parallel,
            max_parallelism: max_parallelism.max(1),
        }
    }

    pub async fn extract_all(&self, cancel: &CancellationToken) -> Vec<OpinionRecord> {
        info!(sources = self.sources.len(), "starting extraction");

        if self.parallel {
            info!(
                max_parallelism = self.max_parallelism,
                "running sources in parallel"
            );
            let merged: Vec<Vec<OpinionRecord>> = stream::iter(
                self.sources
                    .iter()
                    .map(|source| Self::run_source(source.clone(), cancel)),
            )
            .buffer_unordered(self.max_parallelism)
            .collect()
            .await;

            merged.into_iter().flatten().collect()
        } else {
            info!("running sources sequentially");
            let mut all = Vec::new();
            for source in &self.sources {
                all.extend(Self::run_source(source.clone(), cancel).await);
            }
            all
        }
    }

    async fn run_source(
        source: Arc<dyn OpinionSource>,
        cancel: &CancellationToken,
    ) -> Vec<OpinionRecord> {
        let started = Instant::now();
        info!(source = source.name(), "starting source extraction");

        match source.extract(cancel).await {
            Ok(records) => {
                info!(
                    source = source.name(),
                    count = records.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "source extraction complete"
                );
                records
            }
            Err(err) => {
                error!(
                    source = source.name(),
                    error = %err,
                    "source extraction failed, continuing with remaining sources"
                );
                Vec::new()
            }
        }
    }
}

/// Parse the date formats the sources are known to emit. `None` marks the
/// record for rejection by the validator rather than failing the adapter.
pub(crate) fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    struct StaticSource {
        name: &'static str,
        count: usize,
    }

    #[async_trait]
    impl OpinionSource for StaticSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn extract(&self, _cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
            Ok((0..self.count).map(|i| test_record(i as i64)).collect())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl OpinionSource for FailingSource {
        fn name(&self) -> &str {
            "Failing Source"
        }

        async fn extract(&self, _cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
            Err(AppError::SourceError("connection refused".to_string()))
        }
    }

    fn test_record(id: i64) -> OpinionRecord {
        OpinionRecord {
            source_product_id: id,
            product_name: "Widget".to_string(),
            product_category: None,
            product_brand: None,
            source_customer_id: id,
            customer_name: "Customer".to_string(),
            country: None,
            city: None,
            segment: None,
            age_range: None,
            opinion_date: None,
            channel_name: "Test".to_string(),
            channel_type: "Test".to_string(),
            rating: None,
            sentiment_score: 0,
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_failing_source_is_isolated() {
        let sources: Vec<Arc<dyn OpinionSource>> = vec![
            Arc::new(StaticSource { name: "A", count: 3 }),
            Arc::new(FailingSource),
            Arc::new(StaticSource { name: "B", count: 2 }),
        ];

        let coordinator = ExtractionCoordinator::new(sources, true, 4);
        let merged = coordinator.extract_all(&CancellationToken::new()).await;
        assert_eq!(merged.len(), 5);
    }

    #[tokio::test]
    async fn test_sequential_mode_matches_parallel_counts() {
        let sources: Vec<Arc<dyn OpinionSource>> = vec![
            Arc::new(StaticSource { name: "A", count: 4 }),
            Arc::new(StaticSource { name: "B", count: 6 }),
        ];

        let coordinator = ExtractionCoordinator::new(sources, false, 1);
        let merged = coordinator.extract_all(&CancellationToken::new()).await;
        assert_eq!(merged.len(), 10);
    }

    #[test]
    fn test_parse_datetime_formats() {
        assert!(parse_datetime("2024-06-15 08:30:00").is_some());
        assert!(parse_datetime("2024-06-15T08:30:00").is_some());
        assert!(parse_datetime("2024-06-15").is_some());
        assert!(parse_datetime("15/06/2024").is_none());
        assert!(parse_datetime("").is_none());
    }
}
