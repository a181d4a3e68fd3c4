use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Jpy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RetailerType {
    Standard,
    Secondhand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Shoes,
    Outerwear,
    Bottoms,
    Tops,
    Accessories,
    Other,
}

/// What a field extractor knows about one product block. Fields a source
/// cannot observe stay `None` until normalization fills them.
#[derive(Debug, Clone, PartialEq)]
pub struct RawProduct {
    pub brand: String,
    pub name: String,
    pub sale_price: u64,
    pub original_price: u64,
    pub url: String,
    pub discount_pct: Option<i64>,
    pub currency: Option<Currency>,
    pub retailer_type: Option<RetailerType>,
    pub image_url: Option<String>,
}

impl RawProduct {
    pub fn new(brand: String, name: String, sale_price: u64, original_price: u64, url: String) -> Self {
        RawProduct {
            brand,
            name,
            sale_price,
            original_price,
            url,
            discount_pct: None,
            currency: None,
            retailer_type: None,
            image_url: None,
        }
    }
}

/// One normalized product, the unit the pipeline filters, sorts and writes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductRecord {
    pub brand: String,
    pub name: String,
    pub sale_price: u64,
    pub original_price: u64,
    pub url: String,
    pub image_url: Option<String>,
    pub retailer: String,
    pub discount_pct: i64,
    pub currency: Currency,
    pub retailer_type: RetailerType,
    pub category: Category,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_price_jpy: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_price_jpy: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_status: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    #[serde(serialize_with = "utc_seconds")]
    pub scraped_at: DateTime<Utc>,
    pub retailers: BTreeSet<String>,
    pub total_parsed: usize,
    pub total_filtered: usize,
    pub min_discount_pct: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jpy_usd_rate: Option<f64>,
}

/// The persisted result of one run.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub meta: RunMetadata,
    pub products: Vec<ProductRecord>,
}

fn utc_seconds<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Python-style `round()`: halves go to the even neighbour.
pub fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}
