// Relational-database extractor (web reviews)

use std::time::Duration;

use async_trait::async_trait;
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::DatabaseSourceConfig;
use crate::error::{AppError, AppResult};
use crate::model::OpinionRecord;
use crate::sources::{parse_datetime, OpinionSource};

const CANCEL_CHECK_INTERVAL: usize = 1_024;

/// Extracts opinions from an operational relational database with a
/// configured query. The `sqlx` Any driver picks the backend from the
/// connection string; dates are read as text so the query stays portable.
pub struct DatabaseSource {
    config: DatabaseSourceConfig,
}

impl DatabaseSource {
    pub fn new(config: DatabaseSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OpinionSource for DatabaseSource {
    fn name(&self) -> &str {
        "Database Extractor"
    }

    async fn extract(&self, cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        sqlx::any::install_default_drivers();
        let pool = AnyPool::connect(&self.config.connection_string)
            .await
            .map_err(|e| {
                AppError::SourceError(format!("Failed to connect to source database: {}", e))
            })?;

        info!("running source query");
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let rows = tokio::time::timeout(timeout, sqlx::query(&self.config.query).fetch_all(&pool))
            .await
            .map_err(|_| {
                AppError::SourceError(format!(
                    "Source query timed out after {}s",
                    self.config.timeout_secs
                ))
            })?
            .map_err(|e| AppError::SourceError(format!("Source query failed: {}", e)))?;

        let mut records = Vec::with_capacity(rows.len());
        for (index, row) in rows.iter().enumerate() {
            if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                pool.close().await;
                return Err(AppError::Cancelled);
            }
            records.push(map_row(row)?);
        }

        pool.close().await;
        Ok(records)
    }
}

fn map_row(row: &AnyRow) -> AppResult<OpinionRecord> {
    Ok(OpinionRecord {
        source_product_id: column::<i64>(row, "ProductId")?,
        product_name: column::<String>(row, "ProductName")?,
        product_category: column::<Option<String>>(row, "Category")?,
        product_brand: column::<Option<String>>(row, "Brand")?,

        source_customer_id: column::<i64>(row, "CustomerId")?,
        customer_name: column::<String>(row, "CustomerName")?,
        country: column::<Option<String>>(row, "Country")?,
        city: column::<Option<String>>(row, "City")?,
        segment: column::<Option<String>>(row, "Segment")?,
        age_range: column::<Option<String>>(row, "AgeRange")?,

        opinion_date: column::<Option<String>>(row, "ReviewDate")?
            .as_deref()
            .and_then(parse_datetime),
        channel_name: "Web Review".to_string(),
        channel_type: "Database".to_string(),

        rating: column::<Option<i64>>(row, "Rating")?.map(|v| v as i32),
        sentiment_score: column::<i64>(row, "SentimentScore")? as i32,
        comment: column::<Option<String>>(row, "Comment")?,
    })
}

fn column<'r, T>(row: &'r AnyRow, name: &str) -> AppResult<T>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get(name)
        .map_err(|e| AppError::SourceError(format!("Column {}: {}", name, e)))
}
