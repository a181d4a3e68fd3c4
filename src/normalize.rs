use crate::category;
use crate::model::{round_half_even, Currency, ProductRecord, RawProduct, RetailerType};

/// Fill every field a source could not observe and classify the product.
pub fn normalize(raw: RawProduct, retailer: &str) -> ProductRecord {
    let discount_pct = raw
        .discount_pct
        .unwrap_or_else(|| discount_from_prices(raw.sale_price, raw.original_price));
    let category = category::classify(&raw.name);

    ProductRecord {
        brand: raw.brand,
        name: raw.name,
        sale_price: raw.sale_price,
        original_price: raw.original_price,
        url: raw.url,
        image_url: raw.image_url,
        retailer: retailer.to_string(),
        discount_pct,
        currency: raw.currency.unwrap_or(Currency::Usd),
        retailer_type: raw.retailer_type.unwrap_or(RetailerType::Standard),
        category,
        sale_price_jpy: None,
        original_price_jpy: None,
        feedback_status: None,
    }
}

/// `round((1 - sale/original) * 100)`, 0 when there is no original price.
pub fn discount_from_prices(sale: u64, original: u64) -> i64 {
    if original == 0 {
        return 0;
    }
    round_half_even((1.0 - sale as f64 / original as f64) * 100.0)
}
