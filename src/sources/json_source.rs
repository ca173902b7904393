// JSON file extractor - records already in the source-agnostic shape

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::JsonSourceConfig;
use crate::error::{AppError, AppResult};
use crate::model::OpinionRecord;
use crate::sources::OpinionSource;

pub struct JsonSource {
    config: JsonSourceConfig,
}

impl JsonSource {
    pub fn new(config: JsonSourceConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl OpinionSource for JsonSource {
    fn name(&self) -> &str {
        "JSON Extractor"
    }

    async fn extract(&self, cancel: &CancellationToken) -> AppResult<Vec<OpinionRecord>> {
        info!(path = %self.config.file_path, "reading JSON source");

        let content = tokio::fs::read_to_string(&self.config.file_path)
            .await
            .map_err(|e| {
                AppError::SourceError(format!("Failed to read {}: {}", self.config.file_path, e))
            })?;

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        serde_json::from_str::<Vec<OpinionRecord>>(&content).map_err(|e| {
            AppError::ParseError(format!("Invalid JSON in {}: {}", self.config.file_path, e))
        })
    }
}
