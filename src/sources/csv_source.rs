// CSV file extractor (internal surveys)

use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CsvSourceConfig;
use crate::error::{AppError, AppResult};
use crate::model::OpinionRecord;
use crate::sources::{parse_datetime, OpinionSource};

// How often the streaming loop polls the cancellation token.
const CANCEL_CHECK_INTERVAL: usize = 1_024;

/// Row layout of the internal-survey export.
#[derive(Debug, Deserialize)]
struct CsvOpinionRow {
    #[serde(rename = "ProductId")]
    product_id: i64,
    #[serde(rename = "ProductName")]
    product_name: String,
    #[serde(rename = "Category")]
    category: Option<String>,
    #[serde(rename = "CustomerId")]
    customer_id: i64,
    #[serde(rename = "CustomerName")]
    customer_name: String,
    #[serde(rename = "Country")]
    country: Option<String>,
    #[serde(rename = "City")]
    city: Option<String>,
    #[serde(rename = "SurveyDate")]
    survey_date: String,
    #[serde(rename = "Rating")]
    rating: Option<i32>,
    #[serde(rename = "Sentiment")]
    sentiment: i32,
    #[serde(rename = "Comment")]
    comment: Option<String>,
}

pub struct CsvSource {
    config: CsvSourceConfig,
}

impl CsvSource {
    pub fn new(config: CsvSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OpinionSource for CsvSource {
    fn name(&self) -> &str {
        "CSV Extractor"
    }

    async fn extract(&self, cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
        let path = self.config.file_path.clone();
        info!(path = %path, "reading CSV source");

        // A missing input file is terminal for this adapter.
        if !std::path::Path::new(&path).exists() {
            return Err(AppError::SourceError(format!("CSV file not found: {}", path)));
        }

        let delimiter = self
            .config
            .delimiter
            .as_bytes()
            .first()
            .copied()
            .unwrap_or(b',');
        let has_header = self.config.has_header;
        let cancel = cancel.clone();

        // The csv crate is synchronous; stream the file on a blocking worker
        // so the reader only suspends its own thread.
        tokio::task::spawn_blocking(move || {
            let mut reader = csv::ReaderBuilder::new()
                .has_headers(has_header)
                .delimiter(delimiter)
                .buffer_capacity(64 * 1024)
                .from_path(&path)
                .map_err(|e| AppError::SourceError(format!("Failed to open {}: {}", path, e)))?;

            let mut records = Vec::new();
            for (index, row) in reader.deserialize::<CsvOpinionRow>().enumerate() {
                if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                    return Err(AppError::Cancelled);
                }
                let row = row.map_err(|e| {
                    AppError::ParseError(format!("CSV record {}: {}", index + 1, e))
                })?;
                records.push(map_row(row));
            }
            Ok(records)
        })
        .await
        .map_err(|e| AppError::SourceError(format!("CSV reader task failed: {}", e)))?
    }
}

fn map_row(row: CsvOpinionRow) -> OpinionRecord {
    OpinionRecord {
        source_product_id: row.product_id,
        product_name: row.product_name,
        product_category: row.category,
        product_brand: None,

        source_customer_id: row.customer_id,
        customer_name: row.customer_name,
        country: row.country,
        city: row.city,
        segment: Some("Survey".to_string()),
        age_range: None,

        opinion_date: parse_datetime(&row.survey_date),
        channel_name: "Internal Survey".to_string(),
        channel_type: "CSV".to_string(),

        rating: row.rating,
        sentiment_score: row.sentiment,
        comment: row.comment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_fixture(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn config_for(file: &NamedTempFile) -> CsvSourceConfig {
        CsvSourceConfig {
            file_path: file.path().to_str().unwrap().to_string(),
            delimiter: ",".to_string(),
            has_header: true,
        }
    }

    #[tokio::test]
    async fn test_extracts_and_maps_rows() {
        let file = write_fixture(
            "ProductId,ProductName,Category,CustomerId,CustomerName,Country,City,SurveyDate,Rating,Sentiment,Comment\n\
             1001,Laptop Pro X1,Electronics,1,John Smith,Canada,Toronto,2024-05-01 10:00:00,5,87,Great quality\n\
             2001,Office Chair Deluxe,Furniture,2,Ana Lopez,Spain,Madrid,2024-05-02,3,0,\n",
        );

        let source = CsvSource::new(config_for(&file));
        let records = source.extract(&CancellationToken::new()).await.unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].source_product_id, 1001);
        assert_eq!(records[0].channel_name, "Internal Survey");
        assert_eq!(records[0].segment.as_deref(), Some("Survey"));
        assert_eq!(records[0].sentiment_score, 87);
        assert_eq!(records[1].rating, Some(3));
        assert!(records[1].opinion_date.is_some());
        assert_eq!(records[1].comment, None);
    }

    #[tokio::test]
    async fn test_unparseable_date_becomes_none() {
        let file = write_fixture(
            "ProductId,ProductName,Category,CustomerId,CustomerName,Country,City,SurveyDate,Rating,Sentiment,Comment\n\
             1001,Laptop Pro X1,Electronics,1,John Smith,Canada,Toronto,not-a-date,5,1,ok\n",
        );

        let source = CsvSource::new(config_for(&file));
        let records = source.extract(&CancellationToken::new()).await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(records[0].opinion_date.is_none());
    }

    #[tokio::test]
    async fn test_missing_file_is_terminal() {
        let source = CsvSource::new(CsvSourceConfig {
            file_path: "/nonexistent/surveys.csv".to_string(),
            delimiter: ",".to_string(),
            has_header: true,
        });

        let result = source.extract(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::SourceError(_))));
    }
}
