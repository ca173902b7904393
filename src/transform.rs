// Validation and normalization of raw opinion records

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::model::OpinionRecord;

/// Per-reason rejection counters for one validation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectionCounts {
    pub missing_product_name: usize,
    pub missing_customer_name: usize,
    pub invalid_date: usize,
}

impl RejectionCounts {
    pub fn total(&self) -> usize {
        self.missing_product_name + self.missing_customer_name + self.invalid_date
    }
}

/// Result of one validation pass over the merged record set.
#[derive(Debug)]
pub struct ValidationOutcome {
    pub accepted: Vec<OpinionRecord>,
    pub rejections: RejectionCounts,
    pub normalized_sentiment: usize,
}

#[derive(Default)]
struct PhaseCounters {
    missing_product_name: AtomicUsize,
    missing_customer_name: AtomicUsize,
    invalid_date: AtomicUsize,
    normalized_sentiment: AtomicUsize,
}

/// Classify every record as accepted or rejected and clamp out-of-range
/// sentiment scores.
///
/// Each record's classification is independent, so the set is split into
/// chunks processed on concurrent workers. Counters are atomic; accepted
/// records are collected per worker and concatenated afterwards, so the
/// hot loop takes no locks and logs nothing. Consolidated counts are
/// logged once at the end of the phase.
pub async fn validate_and_normalize(
    records: Vec<OpinionRecord>,
    max_parallelism: usize,
) -> ValidationOutcome {
    let total = records.len();
    let counters = Arc::new(PhaseCounters::default());
    let workers = max_parallelism.max(1);
    let chunk_size = total.div_ceil(workers).max(1);

    let mut handles = Vec::with_capacity(workers);
    let mut remaining = records;
    while !remaining.is_empty() {
        let split_at = remaining.len().saturating_sub(chunk_size);
        let chunk = remaining.split_off(split_at);
        let counters = counters.clone();
        handles.push(tokio::spawn(async move { process_chunk(chunk, &counters) }));
    }

    let mut accepted = Vec::with_capacity(total);
    for handle in handles {
        accepted.extend(handle.await.expect("validation worker panicked"));
    }

    let rejections = RejectionCounts {
        missing_product_name: counters.missing_product_name.load(Ordering::Relaxed),
        missing_customer_name: counters.missing_customer_name.load(Ordering::Relaxed),
        invalid_date: counters.invalid_date.load(Ordering::Relaxed),
    };
    let normalized_sentiment = counters.normalized_sentiment.load(Ordering::Relaxed);

    if rejections.missing_product_name > 0 {
        warn!(
            count = rejections.missing_product_name,
            "records rejected: missing product name"
        );
    }
    if rejections.missing_customer_name > 0 {
        warn!(
            count = rejections.missing_customer_name,
            "records rejected: missing customer name"
        );
    }
    if rejections.invalid_date > 0 {
        warn!(count = rejections.invalid_date, "records rejected: invalid date");
    }
    if normalized_sentiment > 0 {
        info!(count = normalized_sentiment, "sentiment scores normalized");
    }

    ValidationOutcome {
        accepted,
        rejections,
        normalized_sentiment,
    }
}

fn process_chunk(chunk: Vec<OpinionRecord>, counters: &PhaseCounters) -> Vec<OpinionRecord> {
    let mut accepted = Vec::with_capacity(chunk.len());

    for mut record in chunk {
        if record.product_name.trim().is_empty() {
            counters.missing_product_name.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        if record.customer_name.trim().is_empty() {
            counters.missing_customer_name.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        if record.opinion_date.is_none() {
            counters.invalid_date.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        if record.sentiment_score < -1 || record.sentiment_score > 1 {
            record.sentiment_score = if record.sentiment_score > 0 { 1 } else { -1 };
            counters.normalized_sentiment.fetch_add(1, Ordering::Relaxed);
        }

        accepted.push(record);
    }

    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(product_name: &str, customer_name: &str, sentiment: i32) -> OpinionRecord {
        OpinionRecord {
            source_product_id: 1,
            product_name: product_name.to_string(),
            product_category: None,
            product_brand: None,
            source_customer_id: 1,
            customer_name: customer_name.to_string(),
            country: None,
            city: None,
            segment: None,
            age_range: None,
            opinion_date: NaiveDate::from_ymd_opt(2024, 1, 5)
                .unwrap()
                .and_hms_opt(9, 0, 0),
            channel_name: "Internal Survey".to_string(),
            channel_type: "CSV".to_string(),
            rating: Some(4),
            sentiment_score: sentiment,
            comment: None,
        }
    }

    #[tokio::test]
    async fn test_rejection_reasons_are_counted() {
        let mut undated = record("Laptop Pro X1", "John Smith", 0);
        undated.opinion_date = None;

        let records = vec![
            record("", "John Smith", 0),
            record("  ", "John Smith", 0),
            record("Laptop Pro X1", "", 0),
            undated,
            record("Laptop Pro X1", "John Smith", 1),
        ];

        let outcome = validate_and_normalize(records, 4).await;

        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.rejections.missing_product_name, 2);
        assert_eq!(outcome.rejections.missing_customer_name, 1);
        assert_eq!(outcome.rejections.invalid_date, 1);
    }

    #[tokio::test]
    async fn test_counts_are_exhaustive() {
        let records: Vec<OpinionRecord> = (0..1_000)
            .map(|i| match i % 4 {
                0 => record("", "John Smith", 0),
                1 => record("Laptop Pro X1", "", 0),
                _ => record("Laptop Pro X1", "John Smith", 0),
            })
            .collect();
        let total = records.len();

        let outcome = validate_and_normalize(records, 8).await;
        assert_eq!(outcome.accepted.len() + outcome.rejections.total(), total);
    }

    #[tokio::test]
    async fn test_sentiment_is_clamped_with_sign_preserved() {
        let records = vec![
            record("Laptop Pro X1", "John Smith", 87),
            record("Laptop Pro X1", "Ana Lopez", -70),
            record("Laptop Pro X1", "Sara King", 0),
            record("Laptop Pro X1", "James Lee", 1),
            record("Laptop Pro X1", "Emma Young", -1),
        ];

        let outcome = validate_and_normalize(records, 2).await;
        assert_eq!(outcome.normalized_sentiment, 2);

        for accepted in &outcome.accepted {
            assert!((-1..=1).contains(&accepted.sentiment_score));
        }

        let by_name = |name: &str| {
            outcome
                .accepted
                .iter()
                .find(|r| r.customer_name == name)
                .unwrap()
                .sentiment_score
        };
        assert_eq!(by_name("John Smith"), 1);
        assert_eq!(by_name("Ana Lopez"), -1);
        assert_eq!(by_name("Sara King"), 0);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let outcome = validate_and_normalize(Vec::new(), 4).await;
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.rejections.total(), 0);
    }
}
