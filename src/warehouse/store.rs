use crate::error::AppResult;
use crate::model::{
    CustomerNaturalKey, DateKey, DimChannel, DimCustomer, DimDate, DimProduct, FactOpinion,
    ProductNaturalKey, SurrogateKey,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// Store contract consumed by the dimension resolver and the fact loader.
///
/// Upserts are set-based: one statement per call, insert-if-absent keyed on
/// the dimension's natural key, non-key attributes updated in place. The
/// surrogate keys they assign are read back through the `load_*_keys`
/// methods, never returned row by row.
#[async_trait]
pub trait WarehouseStore: Send + Sync {
    async fn upsert_products(&self, rows: &[DimProduct]) -> AppResult<()>;
    async fn upsert_customers(&self, rows: &[DimCustomer]) -> AppResult<()>;
    async fn upsert_dates(&self, rows: &[DimDate]) -> AppResult<()>;
    async fn upsert_channels(&self, rows: &[DimChannel]) -> AppResult<()>;

    async fn load_product_keys(&self) -> AppResult<HashMap<ProductNaturalKey, SurrogateKey>>;
    async fn load_customer_keys(&self) -> AppResult<HashMap<CustomerNaturalKey, SurrogateKey>>;
    async fn load_date_keys(&self) -> AppResult<HashSet<DateKey>>;
    async fn load_channel_keys(&self) -> AppResult<HashMap<String, SurrogateKey>>;

    /// Remove every fact row, returning the count removed. Destructive.
    async fn truncate_facts(&self) -> AppResult<u64>;

    /// Multi-row insert of fact rows, returning the count inserted.
    async fn insert_facts(&self, rows: &[FactOpinion]) -> AppResult<u64>;
}
