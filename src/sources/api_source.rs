// REST API extractor (social media opinions)

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ApiSourceConfig;
use crate::error::{AppError, AppResult};
use crate::model::OpinionRecord;
use crate::sources::{parse_datetime, OpinionSource};

/// Payload shape returned by the opinions endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiOpinionDto {
    product_id: i64,
    product_name: Option<String>,
    category: Option<String>,
    brand: Option<String>,

    user_id: i64,
    user_name: Option<String>,
    location: Option<LocationDto>,
    user_segment: Option<String>,
    age_range: Option<String>,

    comment_date: Option<String>,
    source: Option<String>,
    rating: Option<i32>,
    sentiment_score: i32,
    comment_text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocationDto {
    country: Option<String>,
    city: Option<String>,
}

pub struct ApiSource {
    config: ApiSourceConfig,
    client: reqwest::Client,
}

impl ApiSource {
    pub fn new(config: ApiSourceConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::HttpError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn fetch_opinions(&self) -> AppResult<Vec<ApiOpinionDto>> {
        let url = format!(
            "{}{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.endpoint
        );

        let mut request = self.client.get(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("X-API-Key", api_key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::HttpError(format!("GET {} failed: {}", url, e)))?
            .error_for_status()
            .map_err(|e| AppError::HttpError(format!("GET {} failed: {}", url, e)))?;

        response
            .json::<Vec<ApiOpinionDto>>()
            .await
            .map_err(|e| AppError::ParseError(format!("Invalid API payload: {}", e)))
    }
}

#[async_trait]
impl OpinionSource for ApiSource {
    fn name(&self) -> &str {
        "API Extractor"
    }

    async fn extract(&self, cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
        info!(
            base_url = %self.config.base_url,
            endpoint = %self.config.endpoint,
            "calling opinions API"
        );

        let mut attempt = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            match self.fetch_opinions().await {
                Ok(payload) => {
                    return Ok(payload.into_iter().map(map_dto).collect());
                }
                Err(err @ AppError::HttpError(_)) if attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = backoff_delay(attempt);
                    warn!(
                        attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "API call failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(AppError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Exponential backoff (2^attempt seconds) with a little jitter so
/// concurrent extractors do not retry in lockstep.
fn backoff_delay(attempt: u32) -> Duration {
    let base_ms = 1_000u64.saturating_mul(1u64 << attempt.min(6));
    let jitter_ms = rand::rng().random_range(0..250);
    Duration::from_millis(base_ms + jitter_ms)
}

fn map_dto(dto: ApiOpinionDto) -> OpinionRecord {
    let (country, city) = match dto.location {
        Some(location) => (location.country, location.city),
        None => (None, None),
    };

    OpinionRecord {
        source_product_id: dto.product_id,
        product_name: dto.product_name.unwrap_or_else(|| "Unknown".to_string()),
        product_category: dto.category,
        product_brand: dto.brand,

        source_customer_id: dto.user_id,
        customer_name: dto.user_name.unwrap_or_else(|| "Anonymous".to_string()),
        country,
        city,
        segment: dto.user_segment,
        age_range: dto.age_range,

        opinion_date: dto.comment_date.as_deref().and_then(parse_datetime),
        channel_name: dto.source.unwrap_or_else(|| "Social Media".to_string()),
        channel_type: "API".to_string(),

        rating: dto.rating,
        sentiment_score: dto.sentiment_score,
        comment: dto.comment_text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_mapping_defaults() {
        let payload = r#"[{
            "productId": 1002,
            "productName": "Smartphone Galaxy",
            "category": "Electronics",
            "brand": "Samsung",
            "userId": 77,
            "userName": null,
            "location": {"country": "Mexico", "city": "Monterrey"},
            "userSegment": "Social",
            "ageRange": "18-24",
            "commentDate": "2024-03-12T18:45:00",
            "source": "Twitter",
            "rating": null,
            "sentimentScore": 93,
            "commentText": "Amazing!"
        }, {
            "productId": 1003,
            "userId": 78,
            "sentimentScore": -1
        }]"#;

        let dtos: Vec<ApiOpinionDto> = serde_json::from_str(payload).unwrap();
        let records: Vec<OpinionRecord> = dtos.into_iter().map(map_dto).collect();

        assert_eq!(records[0].customer_name, "Anonymous");
        assert_eq!(records[0].channel_name, "Twitter");
        assert_eq!(records[0].country.as_deref(), Some("Mexico"));
        assert!(records[0].opinion_date.is_some());

        assert_eq!(records[1].product_name, "Unknown");
        assert_eq!(records[1].channel_name, "Social Media");
        assert_eq!(records[1].channel_type, "API");
        assert!(records[1].opinion_date.is_none());
    }

    #[test]
    fn test_backoff_grows_exponentially() {
        let first = backoff_delay(1);
        let third = backoff_delay(3);
        assert!(first >= Duration::from_secs(2));
        assert!(third >= Duration::from_secs(8));
        assert!(third < Duration::from_secs(9));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_exhausts_retries() {
        let source = ApiSource::new(ApiSourceConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            endpoint: "/opinions".to_string(),
            api_key: None,
            timeout_secs: 1,
            max_retries: 0,
        })
        .unwrap();

        let result = source.extract(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AppError::HttpError(_))));
    }
}
