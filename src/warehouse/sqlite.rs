use async_trait::async_trait;
use sqlx::{sqlite::Sqlite, sqlite::SqlitePool, QueryBuilder, Row};
use std::collections::{HashMap, HashSet};

use crate::error::{AppError, AppResult};
use crate::model::{
    CustomerNaturalKey, DateKey, DimChannel, DimCustomer, DimDate, DimProduct, FactOpinion,
    ProductNaturalKey, SurrogateKey,
};
use crate::warehouse::store::WarehouseStore;

// Rows per multi-row statement, bounded by SQLite's bind-parameter limit.
const UPSERT_CHUNK: usize = 1_000;
const FACT_INSERT_CHUNK: usize = 4_000;

/// SQLite implementation of the warehouse store. Used for local runs and
/// in-memory testing; the schema mirrors the Postgres backend.
pub struct SqliteWarehouse {
    pool: SqlitePool,
}

impl SqliteWarehouse {
    pub async fn connect(url: &str) -> AppResult<Self> {
        let pool = SqlitePool::connect(url)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to connect to SQLite: {}", e)))?;
        Ok(Self { pool })
    }

    pub async fn new_in_memory() -> AppResult<Self> {
        let pool = SqlitePool::connect("sqlite::memory:").await.map_err(|e| {
            AppError::DatabaseError(format!("Failed to connect to in-memory SQLite: {}", e))
        })?;

        let db = Self { pool };
        db.init_schema().await?;
        Ok(db)
    }

    /// Create the star-schema tables if they do not exist. Dimension tables
    /// persist across runs; only the fact table is refreshed per run.
    pub async fn init_schema(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dim_product (
                product_key INTEGER PRIMARY KEY AUTOINCREMENT,
                source_product_id INTEGER NOT NULL,
                product_name TEXT NOT NULL,
                category TEXT,
                brand TEXT,
                UNIQUE (source_product_id, product_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create dim_product: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dim_customer (
                customer_key INTEGER PRIMARY KEY AUTOINCREMENT,
                source_customer_id INTEGER NOT NULL,
                customer_name TEXT NOT NULL,
                country TEXT,
                city TEXT,
                segment TEXT,
                age_range TEXT,
                UNIQUE (source_customer_id, customer_name)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create dim_customer: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dim_date (
                date_key INTEGER PRIMARY KEY,
                full_date TEXT NOT NULL,
                day_of_month INTEGER NOT NULL,
                month_number INTEGER NOT NULL,
                month_name TEXT NOT NULL,
                quarter INTEGER NOT NULL,
                year INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create dim_date: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dim_channel (
                channel_key INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_name TEXT NOT NULL UNIQUE,
                channel_type TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create dim_channel: {}", e)))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fact_opinion (
                product_key INTEGER NOT NULL,
                customer_key INTEGER NOT NULL,
                date_key INTEGER NOT NULL,
                channel_key INTEGER NOT NULL,
                rating INTEGER,
                sentiment_score INTEGER NOT NULL,
                opinion_count INTEGER NOT NULL DEFAULT 1
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to create fact_opinion: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl WarehouseStore for SqliteWarehouse {
    async fn upsert_products(&self, rows: &[DimProduct]) -> AppResult<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO dim_product (source_product_id, product_name, category, brand) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.source_product_id)
                    .push_bind(&row.product_name)
                    .push_bind(row.category.as_deref())
                    .push_bind(row.brand.as_deref());
            });
            qb.push(
                " ON CONFLICT (source_product_id, product_name) DO UPDATE SET \
                 category = excluded.category, brand = excluded.brand",
            );
            qb.build().execute(&self.pool).await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to upsert dim_product: {}", e))
            })?;
        }
        Ok(())
    }

    async fn upsert_customers(&self, rows: &[DimCustomer]) -> AppResult<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO dim_customer \
                 (source_customer_id, customer_name, country, city, segment, age_range) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.source_customer_id)
                    .push_bind(&row.customer_name)
                    .push_bind(row.country.as_deref())
                    .push_bind(row.city.as_deref())
                    .push_bind(row.segment.as_deref())
                    .push_bind(row.age_range.as_deref());
            });
            qb.push(
                " ON CONFLICT (source_customer_id, customer_name) DO UPDATE SET \
                 country = excluded.country, city = excluded.city, \
                 segment = excluded.segment, age_range = excluded.age_range",
            );
            qb.build().execute(&self.pool).await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to upsert dim_customer: {}", e))
            })?;
        }
        Ok(())
    }

    async fn upsert_dates(&self, rows: &[DimDate]) -> AppResult<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO dim_date \
                 (date_key, full_date, day_of_month, month_number, month_name, quarter, year) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(row.date_key)
                    .push_bind(row.full_date)
                    .push_bind(row.day_of_month)
                    .push_bind(row.month_number)
                    .push_bind(&row.month_name)
                    .push_bind(row.quarter)
                    .push_bind(row.year);
            });
            // Attributes are all derived from the key, nothing to update.
            qb.push(" ON CONFLICT (date_key) DO NOTHING");
            qb.build()
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::DatabaseError(format!("Failed to upsert dim_date: {}", e)))?;
        }
        Ok(())
    }

    async fn upsert_channels(&self, rows: &[DimChannel]) -> AppResult<()> {
        for chunk in rows.chunks(UPSERT_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO dim_channel (channel_name, channel_type) ",
            );
            qb.push_values(chunk, |mut b, row| {
                b.push_bind(&row.channel_name).push_bind(&row.channel_type);
            });
            qb.push(
                " ON CONFLICT (channel_name) DO UPDATE SET channel_type = excluded.channel_type",
            );
            qb.build().execute(&self.pool).await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to upsert dim_channel: {}", e))
            })?;
        }
        Ok(())
    }

    async fn load_product_keys(&self) -> AppResult<HashMap<ProductNaturalKey, SurrogateKey>> {
        let rows =
            sqlx::query("SELECT product_key, source_product_id, product_name FROM dim_product")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to load product keys: {}", e))
                })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    ProductNaturalKey {
                        source_product_id: row.get("source_product_id"),
                        product_name: row.get("product_name"),
                    },
                    row.get::<i64, _>("product_key"),
                )
            })
            .collect())
    }

    async fn load_customer_keys(&self) -> AppResult<HashMap<CustomerNaturalKey, SurrogateKey>> {
        let rows =
            sqlx::query("SELECT customer_key, source_customer_id, customer_name FROM dim_customer")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(format!("Failed to load customer keys: {}", e))
                })?;

        Ok(rows
            .into_iter()
            .map(|row| {
                (
                    CustomerNaturalKey {
                        source_customer_id: row.get("source_customer_id"),
                        customer_name: row.get("customer_name"),
                    },
                    row.get::<i64, _>("customer_key"),
                )
            })
            .collect())
    }

    async fn load_date_keys(&self) -> AppResult<HashSet<DateKey>> {
        let keys = sqlx::query_scalar::<_, i32>("SELECT date_key FROM dim_date")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to load date keys: {}", e)))?;

        Ok(keys.into_iter().collect())
    }

    async fn load_channel_keys(&self) -> AppResult<HashMap<String, SurrogateKey>> {
        let rows = sqlx::query("SELECT channel_key, channel_name FROM dim_channel")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to load channel keys: {}", e)))?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get("channel_name"), row.get::<i64, _>("channel_key")))
            .collect())
    }

    async fn truncate_facts(&self) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM fact_opinion")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(format!("Failed to truncate fact_opinion: {}", e)))?;

        Ok(result.rows_affected())
    }

    async fn insert_facts(&self, rows: &[FactOpinion]) -> AppResult<u64> {
        for chunk in rows.chunks(FACT_INSERT_CHUNK) {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "INSERT INTO fact_opinion \
                 (product_key, customer_key, date_key, channel_key, rating, sentiment_score, opinion_count) ",
            );
            qb.push_values(chunk, |mut b, fact| {
                b.push_bind(fact.product_key)
                    .push_bind(fact.customer_key)
                    .push_bind(fact.date_key)
                    .push_bind(fact.channel_key)
                    .push_bind(fact.rating)
                    .push_bind(fact.sentiment_score)
                    .push_bind(fact.opinion_count);
            });
            qb.build().execute(&self.pool).await.map_err(|e| {
                AppError::DatabaseError(format!("Failed to insert fact rows: {}", e))
            })?;
        }
        Ok(rows.len() as u64)
    }
}
