// Record and dimension types for the opinion star schema

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Warehouse-assigned surrogate key for a dimension row.
pub type SurrogateKey = i64;

/// Date dimension key, encoded as yyyymmdd.
pub type DateKey = i32;

/// One customer opinion as extracted from any source, before validation.
/// Immutable once produced by a source; `opinion_date` is `None` when the
/// source value was absent or unparseable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpinionRecord {
    pub source_product_id: i64,
    pub product_name: String,
    pub product_category: Option<String>,
    pub product_brand: Option<String>,

    pub source_customer_id: i64,
    pub customer_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub segment: Option<String>,
    pub age_range: Option<String>,

    pub opinion_date: Option<NaiveDateTime>,
    pub channel_name: String,
    pub channel_type: String,

    pub rating: Option<i32>,
    pub sentiment_score: i32,
    pub comment: Option<String>,
}

/// Natural key of the product dimension: source system id plus product name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProductNaturalKey {
    pub source_product_id: i64,
    pub product_name: String,
}

/// Natural key of the customer dimension: source system id plus customer name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CustomerNaturalKey {
    pub source_customer_id: i64,
    pub customer_name: String,
}

impl OpinionRecord {
    pub fn product_key(&self) -> ProductNaturalKey {
        ProductNaturalKey {
            source_product_id: self.source_product_id,
            product_name: self.product_name.clone(),
        }
    }

    pub fn customer_key(&self) -> CustomerNaturalKey {
        CustomerNaturalKey {
            source_customer_id: self.source_customer_id,
            customer_name: self.customer_name.clone(),
        }
    }
}

/// Product dimension row. `product_key` is 0 until assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimProduct {
    pub product_key: SurrogateKey,
    pub source_product_id: i64,
    pub product_name: String,
    pub category: Option<String>,
    pub brand: Option<String>,
}

/// Customer dimension row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimCustomer {
    pub customer_key: SurrogateKey,
    pub source_customer_id: i64,
    pub customer_name: String,
    pub country: Option<String>,
    pub city: Option<String>,
    pub segment: Option<String>,
    pub age_range: Option<String>,
}

/// Date dimension row. Unlike the other dimensions the key is derived from
/// the calendar date itself, never assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimDate {
    pub date_key: DateKey,
    pub full_date: NaiveDate,
    pub day_of_month: i32,
    pub month_number: i32,
    pub month_name: String,
    pub quarter: i32,
    pub year: i32,
}

impl DimDate {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            date_key: date_key(date),
            full_date: date,
            day_of_month: date.day() as i32,
            month_number: date.month() as i32,
            month_name: date.format("%B").to_string(),
            quarter: (date.month0() / 3 + 1) as i32,
            year: date.year(),
        }
    }
}

/// Encode a calendar date as its yyyymmdd dimension key.
pub fn date_key(date: NaiveDate) -> DateKey {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Channel dimension row. Natural key is the channel name alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimChannel {
    pub channel_key: SurrogateKey,
    pub channel_name: String,
    pub channel_type: String,
}

/// One fact table row: four surrogate foreign keys plus the measures.
/// References are plain integers resolved once; fact rows never point back
/// at dimension objects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactOpinion {
    pub product_key: SurrogateKey,
    pub customer_key: SurrogateKey,
    pub date_key: DateKey,
    pub channel_key: SurrogateKey,
    pub rating: Option<i32>,
    pub sentiment_score: i32,
    pub opinion_count: i32,
}
