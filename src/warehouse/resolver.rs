// Dimension resolution - natural keys to surrogate keys, batch strategy

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{
    date_key, CustomerNaturalKey, DateKey, DimChannel, DimCustomer, DimDate, DimProduct,
    OpinionRecord, ProductNaturalKey, SurrogateKey,
};
use crate::warehouse::store::WarehouseStore;

/// Read-only natural-key to surrogate-key lookup tables for one run.
///
/// Built once per run after the batch upserts complete and passed by
/// reference to the fact loader; never shared across runs or processes.
/// A lookup miss means a fact row cannot reference a valid dimension row,
/// which is fatal for the run.
#[derive(Debug, Default)]
pub struct DimensionKeyCache {
    products: HashMap<ProductNaturalKey, SurrogateKey>,
    customers: HashMap<CustomerNaturalKey, SurrogateKey>,
    dates: HashSet<DateKey>,
    channels: HashMap<String, SurrogateKey>,
}

impl DimensionKeyCache {
    pub fn product(&self, key: &ProductNaturalKey) -> AppResult<SurrogateKey> {
        self.products.get(key).copied().ok_or_else(|| {
            AppError::DimensionError(format!(
                "No product dimension row for natural key ({}, {})",
                key.source_product_id, key.product_name
            ))
        })
    }

    pub fn customer(&self, key: &CustomerNaturalKey) -> AppResult<SurrogateKey> {
        self.customers.get(key).copied().ok_or_else(|| {
            AppError::DimensionError(format!(
                "No customer dimension row for natural key ({}, {})",
                key.source_customer_id, key.customer_name
            ))
        })
    }

    /// Date keys are self-describing; the cache only verifies the dimension
    /// row was actually upserted before a fact row references it.
    pub fn date(&self, key: DateKey) -> AppResult<DateKey> {
        if self.dates.contains(&key) {
            Ok(key)
        } else {
            Err(AppError::DimensionError(format!(
                "No date dimension row for key {}",
                key
            )))
        }
    }

    pub fn channel(&self, name: &str) -> AppResult<SurrogateKey> {
        self.channels.get(name).copied().ok_or_else(|| {
            AppError::DimensionError(format!("No channel dimension row named {}", name))
        })
    }
}

/// Resolves the four dimensions for a validated record set using the
/// batch strategy: distinct natural keys are upserted in one set-based
/// store call per dimension, then the full key mappings are reloaded
/// into a fresh `DimensionKeyCache`.
///
/// The store's unique natural-key constraints make the upserts
/// race-free and idempotent, so re-resolving a key in this run or any
/// later run always lands on the same surrogate key.
pub struct DimensionResolver {
    store: Arc<dyn WarehouseStore>,
}

impl DimensionResolver {
    pub fn new(store: Arc<dyn WarehouseStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        records: &[OpinionRecord],
        cancel: &CancellationToken,
    ) -> AppResult<DimensionKeyCache> {
        let products = distinct_products(records);
        let customers = distinct_customers(records);
        let dates = distinct_dates(records);
        let channels = distinct_channels(records);

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.store.upsert_products(&products).await?;
        info!(count = products.len(), "product dimension upserted");

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.store.upsert_customers(&customers).await?;
        info!(count = customers.len(), "customer dimension upserted");

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.store.upsert_dates(&dates).await?;
        info!(count = dates.len(), "date dimension upserted");

        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        self.store.upsert_channels(&channels).await?;
        info!(count = channels.len(), "channel dimension upserted");

        Ok(DimensionKeyCache {
            products: self.store.load_product_keys().await?,
            customers: self.store.load_customer_keys().await?,
            dates: self.store.load_date_keys().await?,
            channels: self.store.load_channel_keys().await?,
        })
    }
}

// Distinct-set extraction keyed on each dimension's natural key. When the
// same natural key appears with different non-key attributes, the last
// sighting wins, matching the upsert's update semantics.

fn distinct_products(records: &[OpinionRecord]) -> Vec<DimProduct> {
    let mut seen: HashMap<ProductNaturalKey, DimProduct> = HashMap::new();
    for record in records {
        seen.insert(
            record.product_key(),
            DimProduct {
                product_key: 0,
                source_product_id: record.source_product_id,
                product_name: record.product_name.clone(),
                category: record.product_category.clone(),
                brand: record.product_brand.clone(),
            },
        );
    }
    seen.into_values().collect()
}

fn distinct_customers(records: &[OpinionRecord]) -> Vec<DimCustomer> {
    let mut seen: HashMap<CustomerNaturalKey, DimCustomer> = HashMap::new();
    for record in records {
        seen.insert(
            record.customer_key(),
            DimCustomer {
                customer_key: 0,
                source_customer_id: record.source_customer_id,
                customer_name: record.customer_name.clone(),
                country: record.country.clone(),
                city: record.city.clone(),
                segment: record.segment.clone(),
                age_range: record.age_range.clone(),
            },
        );
    }
    seen.into_values().collect()
}

fn distinct_dates(records: &[OpinionRecord]) -> Vec<DimDate> {
    let mut seen: HashMap<DateKey, DimDate> = HashMap::new();
    for record in records {
        if let Some(timestamp) = record.opinion_date {
            let date = timestamp.date();
            seen.entry(date_key(date)).or_insert_with(|| DimDate::from_date(date));
        }
    }
    seen.into_values().collect()
}

fn distinct_channels(records: &[OpinionRecord]) -> Vec<DimChannel> {
    let mut seen: HashMap<String, DimChannel> = HashMap::new();
    for record in records {
        seen.insert(
            record.channel_name.clone(),
            DimChannel {
                channel_key: 0,
                channel_name: record.channel_name.clone(),
                channel_type: record.channel_type.clone(),
            },
        );
    }
    seen.into_values().collect()
}
