// Fact loading - truncate then bulk-insert the full fact row set

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::model::{date_key, FactOpinion, OpinionRecord};
use crate::warehouse::resolver::DimensionKeyCache;
use crate::warehouse::store::WarehouseStore;

/// Builds and persists the fact row set for one run.
///
/// The load is a full refresh: the existing fact table is truncated first,
/// which is destructive and has no recovery path if the following insert
/// fails - the table stays empty until the next successful run.
pub struct FactLoader {
    store: Arc<dyn WarehouseStore>,
    batch_size: usize,
}

impl FactLoader {
    pub fn new(store: Arc<dyn WarehouseStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn load(
        &self,
        records: &[OpinionRecord],
        keys: &DimensionKeyCache,
        cancel: &CancellationToken,
    ) -> AppResult<u64> {
        // Never start the destructive truncate once cancellation is in.
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }

        let started = Instant::now();
        let removed = self.store.truncate_facts().await?;
        info!(removed, "fact table truncated");

        let facts = build_facts(records, keys)?;

        let mut loaded = 0u64;
        for batch in facts.chunks(self.batch_size) {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }
            loaded += self.store.insert_facts(batch).await?;
        }

        let elapsed_ms = started.elapsed().as_millis();
        info!(loaded, elapsed_ms, "fact load complete");
        Ok(loaded)
    }
}

fn build_facts(
    records: &[OpinionRecord],
    keys: &DimensionKeyCache,
) -> AppResult<Vec<FactOpinion>> {
    let mut facts = Vec::with_capacity(records.len());
    for record in records {
        let date = record.opinion_date.ok_or_else(|| {
            AppError::DimensionError("Record without opinion date reached the loader".to_string())
        })?;

        facts.push(FactOpinion {
            product_key: keys.product(&record.product_key())?,
            customer_key: keys.customer(&record.customer_key())?,
            date_key: keys.date(date_key(date.date()))?,
            channel_key: keys.channel(&record.channel_name)?,
            rating: record.rating,
            sentiment_score: record.sentiment_score,
            opinion_count: 1,
        });
    }
    Ok(facts)
}
