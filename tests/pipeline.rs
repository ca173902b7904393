// End-to-end pipeline runs against an in-memory warehouse

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;

use opinion_warehouse::config::EtlOptions;
use opinion_warehouse::error::{AppError, AppResult};
use opinion_warehouse::model::OpinionRecord;
use opinion_warehouse::pipeline::EtlPipeline;
use opinion_warehouse::sources::OpinionSource;
use opinion_warehouse::warehouse::{SqliteWarehouse, WarehouseStore};

struct FixedSource {
    name: &'static str,
    records: Vec<OpinionRecord>,
}

#[async_trait]
impl OpinionSource for FixedSource {
    fn name(&self) -> &str {
        self.name
    }

    async fn extract(&self, _cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
        Ok(self.records.clone())
    }
}

struct BrokenSource;

#[async_trait]
impl OpinionSource for BrokenSource {
    fn name(&self) -> &str {
        "Broken Source"
    }

    async fn extract(&self, _cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
        Err(AppError::SourceError("simulated outage".to_string()))
    }
}

fn record(
    product_id: i64,
    product_name: &str,
    customer_id: i64,
    customer_name: &str,
    sentiment: i32,
) -> OpinionRecord {
    OpinionRecord {
        source_product_id: product_id,
        product_name: product_name.to_string(),
        product_category: Some("Electronics".to_string()),
        product_brand: None,
        source_customer_id: customer_id,
        customer_name: customer_name.to_string(),
        country: Some("Canada".to_string()),
        city: Some("Toronto".to_string()),
        segment: Some("Survey".to_string()),
        age_range: None,
        opinion_date: NaiveDate::from_ymd_opt(2024, 5, 20)
            .unwrap()
            .and_hms_opt(14, 0, 0),
        channel_name: "Internal Survey".to_string(),
        channel_type: "CSV".to_string(),
        rating: Some(4),
        sentiment_score: sentiment,
        comment: None,
    }
}

fn options() -> EtlOptions {
    EtlOptions {
        batch_size: 1_000,
        max_parallelism: 4,
        parallel_extraction: true,
        staging_path: "./staging".to_string(),
    }
}

#[tokio::test]
async fn test_three_record_scenario() {
    let store = Arc::new(SqliteWarehouse::new_in_memory().await.unwrap());

    let records = vec![
        record(1001, "", 1, "John Smith", 0),
        record(1002, "Smartphone Galaxy", 2, "Ana Lopez", 5),
        record(1003, "Wireless Headphones", 3, "James Lee", -1),
    ];
    let source: Arc<dyn OpinionSource> = Arc::new(FixedSource {
        name: "Fixture",
        records,
    });

    let pipeline = EtlPipeline::new(store.clone(), vec![source], options());
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.success);
    assert_eq!(report.extracted, 3);
    assert_eq!(report.accepted, 2);
    assert_eq!(report.rejected, 1);
    assert_eq!(report.normalized_sentiment, 1);
    assert_eq!(report.loaded, 2);

    // Two distinct products and customers reached the dimension tables.
    assert_eq!(store.load_product_keys().await.unwrap().len(), 2);
    assert_eq!(store.load_customer_keys().await.unwrap().len(), 2);
    assert_eq!(store.load_channel_keys().await.unwrap().len(), 1);
    assert_eq!(store.load_date_keys().await.unwrap().len(), 1);

    // Exactly two fact rows landed.
    assert_eq!(store.truncate_facts().await.unwrap(), 2);
}

#[tokio::test]
async fn test_counts_reconcile_exactly() {
    let store = Arc::new(SqliteWarehouse::new_in_memory().await.unwrap());

    let mut records = Vec::new();
    for i in 0..500 {
        records.push(match i % 5 {
            0 => record(1, "", i, "Customer", 0),
            1 => record(1, "Widget", i, "", 0),
            2 => {
                let mut r = record(1, "Widget", i, "Customer", 0);
                r.opinion_date = None;
                r
            }
            _ => record(1, "Widget", i, &format!("Customer {}", i), 40),
        });
    }

    let source: Arc<dyn OpinionSource> = Arc::new(FixedSource {
        name: "Fixture",
        records,
    });
    let pipeline = EtlPipeline::new(store, vec![source], options());
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.success);
    assert_eq!(report.accepted + report.rejected, report.extracted);
    assert_eq!(report.loaded as usize, report.accepted);
}

#[tokio::test]
async fn test_failing_source_does_not_block_others() {
    let store = Arc::new(SqliteWarehouse::new_in_memory().await.unwrap());

    let healthy: Arc<dyn OpinionSource> = Arc::new(FixedSource {
        name: "Healthy",
        records: vec![
            record(1001, "Laptop Pro X1", 1, "John Smith", 1),
            record(1002, "Smartphone Galaxy", 2, "Ana Lopez", -1),
        ],
    });
    let broken: Arc<dyn OpinionSource> = Arc::new(BrokenSource);

    let pipeline = EtlPipeline::new(store, vec![broken, healthy], options());
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.success);
    assert_eq!(report.extracted, 2);
    assert_eq!(report.loaded, 2);
}

#[tokio::test]
async fn test_full_refresh_is_idempotent() {
    let store = Arc::new(SqliteWarehouse::new_in_memory().await.unwrap());

    let records = vec![
        record(1001, "Laptop Pro X1", 1, "John Smith", 1),
        record(1002, "Smartphone Galaxy", 2, "Ana Lopez", 0),
        record(1001, "Laptop Pro X1", 2, "Ana Lopez", -1),
    ];
    let source: Arc<dyn OpinionSource> = Arc::new(FixedSource {
        name: "Fixture",
        records,
    });
    let pipeline = EtlPipeline::new(store.clone(), vec![source], options());

    let first = pipeline.run(&CancellationToken::new()).await;
    assert!(first.success);
    let keys_after_first = store.load_product_keys().await.unwrap();

    let second = pipeline.run(&CancellationToken::new()).await;
    assert!(second.success);
    let keys_after_second = store.load_product_keys().await.unwrap();

    // Same fact count and identical surrogate-key assignments.
    assert_eq!(first.loaded, second.loaded);
    assert_eq!(keys_after_first, keys_after_second);
    assert_eq!(store.truncate_facts().await.unwrap(), second.loaded);
}

#[tokio::test]
async fn test_many_duplicates_few_dimension_rows() {
    let store = Arc::new(SqliteWarehouse::new_in_memory().await.unwrap());

    // 10,000 records spread over 50 distinct product natural keys.
    let records: Vec<OpinionRecord> = (0..10_000)
        .map(|i| {
            record(
                1_000 + i % 50,
                &format!("Product {}", i % 50),
                i,
                &format!("Customer {}", i),
                1,
            )
        })
        .collect();

    let source: Arc<dyn OpinionSource> = Arc::new(FixedSource {
        name: "Fixture",
        records,
    });
    let pipeline = EtlPipeline::new(store.clone(), vec![source], options());
    let report = pipeline.run(&CancellationToken::new()).await;

    assert!(report.success);
    assert_eq!(report.loaded, 10_000);
    assert_eq!(store.load_product_keys().await.unwrap().len(), 50);
}

#[tokio::test]
async fn test_cancellation_before_load_preserves_facts() {
    let store = Arc::new(SqliteWarehouse::new_in_memory().await.unwrap());

    let records = vec![record(1001, "Laptop Pro X1", 1, "John Smith", 1)];
    let source: Arc<dyn OpinionSource> = Arc::new(FixedSource {
        name: "Fixture",
        records,
    });
    let pipeline = EtlPipeline::new(store.clone(), vec![source], options());

    let first = pipeline.run(&CancellationToken::new()).await;
    assert!(first.success);

    let cancel = CancellationToken::new();
    cancel.cancel();
    let second = pipeline.run(&cancel).await;

    assert!(!second.success);
    // The destructive truncate never ran; the previous load is intact.
    assert_eq!(store.truncate_facts().await.unwrap(), 1);
}
