use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub warehouse: WarehouseConfig,
    pub etl: EtlOptions,
    pub csv: Option<CsvSourceConfig>,
    pub source_db: Option<DatabaseSourceConfig>,
    pub api: Option<ApiSourceConfig>,
    pub json: Option<JsonSourceConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    pub url: String,
}

/// Knobs shared by every pipeline phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlOptions {
    /// Rows per bulk-insert batch during the fact load.
    pub batch_size: usize,
    /// Upper bound on concurrent extraction and validation workers.
    pub max_parallelism: usize,
    /// Run source extractors concurrently instead of one after another.
    pub parallel_extraction: bool,
    /// Scratch directory for staging files. Reserved, unused by the core phases.
    pub staging_path: String,
}

impl Default for EtlOptions {
    fn default() -> Self {
        Self {
            batch_size: 10_000,
            max_parallelism: default_parallelism(),
            parallel_extraction: true,
            staging_path: "./staging".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CsvSourceConfig {
    pub file_path: String,
    pub delimiter: String,
    pub has_header: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSourceConfig {
    pub connection_string: String,
    pub query: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSourceConfig {
    pub base_url: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonSourceConfig {
    pub file_path: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            warehouse: WarehouseConfig {
                url: env::var("DATABASE_URL")
                    .unwrap_or_else(|_| "sqlite:data/opinion_warehouse.db".to_string()),
            },
            etl: EtlOptions {
                batch_size: env_parse("ETL_BATCH_SIZE", 10_000),
                max_parallelism: env_parse("ETL_MAX_PARALLELISM", default_parallelism()),
                parallel_extraction: env_parse("ETL_PARALLEL_EXTRACTION", true),
                staging_path: env::var("ETL_STAGING_PATH")
                    .unwrap_or_else(|_| "./staging".to_string()),
            },
            csv: env::var("CSV_FILE_PATH").ok().map(|file_path| CsvSourceConfig {
                file_path,
                delimiter: env::var("CSV_DELIMITER").unwrap_or_else(|_| ",".to_string()),
                has_header: env_parse("CSV_HAS_HEADER", true),
            }),
            source_db: env::var("SOURCE_DATABASE_URL").ok().map(|connection_string| {
                DatabaseSourceConfig {
                    connection_string,
                    query: env::var("SOURCE_DATABASE_QUERY")
                        .unwrap_or_else(|_| default_source_query().to_string()),
                    timeout_secs: env_parse("SOURCE_DATABASE_TIMEOUT_SECS", 300),
                }
            }),
            api: env::var("API_BASE_URL").ok().map(|base_url| ApiSourceConfig {
                base_url,
                endpoint: env::var("API_ENDPOINT").unwrap_or_else(|_| "/opinions".to_string()),
                api_key: env::var("API_KEY").ok(),
                timeout_secs: env_parse("API_TIMEOUT_SECS", 300),
                max_retries: env_parse("API_MAX_RETRIES", 3),
            }),
            json: env::var("JSON_FILE_PATH")
                .ok()
                .map(|file_path| JsonSourceConfig { file_path }),
        })
    }
}

fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_source_query() -> &'static str {
    "SELECT ProductId, ProductName, Category, Brand, CustomerId, CustomerName, \
     Country, City, Segment, AgeRange, ReviewDate, Rating, SentimentScore, Comment \
     FROM WebReviews"
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
