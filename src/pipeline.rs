use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use itertools::Itertools;
use tracing::{info, warn};

use crate::feedback::{FeedbackSource, NoFeedback};
use crate::images::ImageResolver;
use crate::model::{round_half_even, Currency, ProductRecord, RetailerType, RunMetadata, Snapshot};
use crate::normalize::normalize;
use crate::parser::{parse_document, SourceDocument};
use crate::rates::{NoRates, RateSource};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub min_discount_pct: i64,
    /// Pages shorter than this are treated as placeholders.
    pub min_document_bytes: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            min_discount_pct: 50,
            min_document_bytes: 500,
        }
    }
}

/// Parse → normalize → dedup → filter → sort → convert → images → feedback.
pub struct Pipeline {
    options: PipelineOptions,
    rates: Box<dyn RateSource>,
    images: Option<ImageResolver>,
    feedback: Box<dyn FeedbackSource>,
}

/// Normalized records of a batch, in page order, plus who produced them.
pub struct Parsed {
    pub records: Vec<ProductRecord>,
    pub retailers: BTreeSet<String>,
}

impl Pipeline {
    pub fn new(options: PipelineOptions) -> Self {
        Pipeline {
            options,
            rates: Box::new(NoRates),
            images: None,
            feedback: Box::new(NoFeedback),
        }
    }

    pub fn with_rates(mut self, rates: Box<dyn RateSource>) -> Self {
        self.rates = rates;
        self
    }

    pub fn with_images(mut self, images: ImageResolver) -> Self {
        self.images = Some(images);
        self
    }

    pub fn with_feedback(mut self, feedback: Box<dyn FeedbackSource>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn parse(&self, docs: &[SourceDocument]) -> Parsed {
        let mut records = Vec::new();
        let mut retailers = BTreeSet::new();
        for doc in docs {
            let raw = parse_document(doc, self.options.min_document_bytes);
            if raw.is_empty() {
                continue;
            }
            retailers.insert(doc.retailer.clone());
            records.extend(raw.into_iter().map(|p| normalize(p, &doc.retailer)));
        }
        Parsed { records, retailers }
    }

    pub async fn run(&self, docs: &[SourceDocument]) -> Snapshot {
        info!("Parsing {} documents...", docs.len());
        let Parsed { records, retailers } = self.parse(docs);
        info!("Total products parsed: {}", records.len());

        let unique = dedupe(records);
        let total_parsed = unique.len();
        info!("After dedup: {}", total_parsed);

        let mut kept = filter_by_discount(unique, self.options.min_discount_pct);
        sort_by_discount(&mut kept);
        info!("After filtering (>={}% off): {}", self.options.min_discount_pct, kept.len());

        let jpy_usd_rate = usable_rate(self.rates.jpy_to_usd().await);
        if let Some(rate) = jpy_usd_rate {
            let converted = convert_jpy(&mut kept, rate);
            if converted > 0 {
                info!("Converted {} JPY products to USD", converted);
            }
        }

        if let Some(images) = &self.images {
            let stats = images.resolve(&mut kept).await;
            if stats.from_cache + stats.attempted > 0 {
                info!(
                    "Images: {} from cache, {}/{} fetched",
                    stats.from_cache, stats.fetched, stats.attempted
                );
            }
        }

        match self.feedback.load() {
            Ok(state) if !state.is_empty() => {
                let tagged = merge_feedback(&mut kept, &state);
                info!("Feedback sync: {} items with feedback", tagged);
            }
            Ok(_) => {}
            Err(e) => warn!("Feedback unavailable: {}", e),
        }

        Snapshot {
            meta: RunMetadata {
                scraped_at: Utc::now(),
                retailers,
                total_parsed,
                total_filtered: kept.len(),
                min_discount_pct: self.options.min_discount_pct,
                jpy_usd_rate,
            },
            products: kept,
        }
    }
}

/// First record per URL wins; order is preserved.
pub fn dedupe(records: Vec<ProductRecord>) -> Vec<ProductRecord> {
    records.into_iter().unique_by(|r| r.url.clone()).collect()
}

/// Secondhand listings carry no list-versus-sale discount, so they always pass.
pub fn filter_by_discount(records: Vec<ProductRecord>, min_discount_pct: i64) -> Vec<ProductRecord> {
    records
        .into_iter()
        .filter(|r| r.retailer_type == RetailerType::Secondhand || r.discount_pct >= min_discount_pct)
        .collect()
}

/// Deepest discount first; equal discounts keep their input order.
pub fn sort_by_discount(records: &mut [ProductRecord]) {
    records.sort_by(|a, b| b.discount_pct.cmp(&a.discount_pct));
}

/// Move JPY prices to USD, keeping the yen values alongside. Returns how many
/// records were converted.
pub fn convert_jpy(records: &mut [ProductRecord], rate: f64) -> usize {
    let mut converted = 0;
    for r in records.iter_mut().filter(|r| r.currency == Currency::Jpy) {
        r.sale_price_jpy = Some(r.sale_price);
        r.original_price_jpy = Some(r.original_price);
        r.sale_price = to_usd(r.sale_price, rate);
        r.original_price = to_usd(r.original_price, rate);
        r.currency = Currency::Usd;
        converted += 1;
    }
    converted
}

/// A rate that is zero, negative or not finite counts as no rate at all.
fn usable_rate(rate: Option<f64>) -> Option<f64> {
    match rate {
        Some(r) if r.is_finite() && r > 0.0 => Some(r),
        Some(r) => {
            warn!("Ignoring unusable JPY→USD rate {}", r);
            None
        }
        None => None,
    }
}

fn to_usd(yen: u64, rate: f64) -> u64 {
    round_half_even(yen as f64 * rate).max(0) as u64
}

pub fn merge_feedback(records: &mut [ProductRecord], state: &HashMap<String, String>) -> usize {
    for r in records.iter_mut() {
        if let Some(status) = state.get(&r.url) {
            r.feedback_status = Some(status.clone());
        }
    }
    records.iter().filter(|r| r.feedback_status.is_some()).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MonitorError;
    use crate::images::{ImageLookup, NoImageLookup};
    use crate::model::RawProduct;
    use crate::rates::FixedRate;
    use async_trait::async_trait;
    use std::time::Duration;

    fn record(url: &str, sale: u64, original: u64) -> ProductRecord {
        normalize(RawProduct::new("B".into(), "Thing".into(), sale, original, url.into()), "ssense")
    }

    fn secondhand(url: &str, yen: u64, pct: i64) -> ProductRecord {
        let mut raw = RawProduct::new("B".into(), "Thing".into(), yen, yen, url.into());
        raw.discount_pct = Some(pct);
        raw.currency = Some(Currency::Jpy);
        raw.retailer_type = Some(RetailerType::Secondhand);
        normalize(raw, "2ndstreet")
    }

    fn fixture_docs() -> Vec<SourceDocument> {
        ["ssense_sale.md", "mrporter_sale.md", "2ndstreet_sale.md", "ssense_sale.md"]
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let text = std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap();
                let retailer = name.split('_').next().unwrap();
                SourceDocument::new(&format!("{}_p{}.md", retailer, i), text)
            })
            .collect()
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let records = vec![record("u1", 10, 100), record("u2", 20, 100), record("u1", 99, 100)];
        let unique = dedupe(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].sale_price, 10);
        assert_eq!(unique[1].url, "u2");
    }

    #[test]
    fn secondhand_bypasses_threshold() {
        let records = vec![record("low", 90, 100), record("high", 40, 100), secondhand("used", 1000, 0)];
        let kept = filter_by_discount(records, 50);
        let urls: Vec<_> = kept.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["high", "used"]);
    }

    #[test]
    fn sort_is_stable_and_descending() {
        let mut records = vec![
            record("a", 50, 100),
            record("b", 30, 100),
            record("c", 50, 100),
            record("d", 90, 100),
        ];
        sort_by_discount(&mut records);
        let urls: Vec<_> = records.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["b", "a", "c", "d"]);
    }

    #[test]
    fn jpy_conversion_keeps_shadow_prices() {
        let mut raw = RawProduct::new("B".into(), "Thing".into(), 1000, 2000, "u".into());
        raw.currency = Some(Currency::Jpy);
        let mut records = vec![normalize(raw, "2ndstreet"), record("usd", 10, 20)];
        assert_eq!(convert_jpy(&mut records, 0.0067), 1);

        let r = &records[0];
        assert_eq!((r.sale_price, r.original_price), (7, 13));
        assert_eq!((r.sale_price_jpy, r.original_price_jpy), (Some(1000), Some(2000)));
        assert_eq!(r.currency, Currency::Usd);
        assert_eq!(records[1].sale_price_jpy, None);
        assert_eq!(records[1].sale_price, 10);
    }

    #[test]
    fn unusable_rates_are_dropped() {
        assert_eq!(usable_rate(Some(0.0067)), Some(0.0067));
        assert_eq!(usable_rate(Some(0.0)), None);
        assert_eq!(usable_rate(Some(-0.5)), None);
        assert_eq!(usable_rate(Some(f64::NAN)), None);
        assert_eq!(usable_rate(Some(f64::INFINITY)), None);
        assert_eq!(usable_rate(None), None);
    }

    #[tokio::test]
    async fn zero_rate_leaves_yen_prices_alone() {
        let pipeline = Pipeline::new(PipelineOptions { min_discount_pct: 0, min_document_bytes: 500 })
            .with_rates(Box::new(FixedRate(0.0)));
        let text = std::fs::read_to_string("tests/fixtures/2ndstreet_sale.md").unwrap();
        let snapshot = pipeline.run(&[SourceDocument::new("2ndstreet_p1.md", text)]).await;

        assert_eq!(snapshot.meta.jpy_usd_rate, None);
        assert_eq!(snapshot.products.len(), 2);
        for p in &snapshot.products {
            assert_eq!(p.currency, Currency::Jpy);
            assert_eq!(p.sale_price_jpy, None);
            assert!(p.sale_price > 0);
        }
    }

    #[test]
    fn feedback_tags_matching_urls() {
        let mut records = vec![record("a", 1, 2), record("b", 1, 2)];
        let state = HashMap::from([("b".to_string(), "liked".to_string())]);
        assert_eq!(merge_feedback(&mut records, &state), 1);
        assert_eq!(records[0].feedback_status, None);
        assert_eq!(records[1].feedback_status.as_deref(), Some("liked"));
    }

    #[test]
    fn listing_scenario_end_to_end() {
        let block = "[![x](<Base64-Image-Removed>)\\\\\n\\\\\nBRAND\\\\\n\\\\\nProduct Name\\\\\n\\\\\n$50\\\\\n\\\\\n$100](https://www.ssense.com/en-us/men/product/brand/product-name/1)\n";
        let text = format!("{}{}", block, " ".repeat(500));
        let parsed = Pipeline::new(PipelineOptions::default()).parse(&[SourceDocument::new("ssense_p1.md", text)]);
        let r = &parsed.records[0];
        assert_eq!((r.brand.as_str(), r.name.as_str()), ("BRAND", "Product Name"));
        assert_eq!((r.sale_price, r.original_price, r.discount_pct), (50, 100, 50));
    }

    #[test]
    fn parse_skips_placeholder_pages() {
        let docs = vec![
            SourceDocument::new("ssense_p9.md", "blocked".into()),
            SourceDocument::new("mrporter_p9.md", format!("No sale products to display {}", "x".repeat(600))),
        ];
        let parsed = Pipeline::new(PipelineOptions::default()).parse(&docs);
        assert!(parsed.records.is_empty());
        assert!(parsed.retailers.is_empty());
    }

    struct FixedLookup;

    #[async_trait]
    impl ImageLookup for FixedLookup {
        async fn product_code(&self, _product_url: &str) -> Option<String> {
            Some("241251M180011".into())
        }
    }

    struct BrokenFeedback;

    impl FeedbackSource for BrokenFeedback {
        fn load(&self) -> Result<HashMap<String, String>, MonitorError> {
            Err(MonitorError::Feedback(rusqlite::Error::InvalidQuery))
        }
    }

    #[tokio::test]
    async fn full_run_over_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineOptions { min_discount_pct: 50, min_document_bytes: 500 })
            .with_rates(Box::new(FixedRate(0.0067)))
            .with_images(ImageResolver {
                retailer: "ssense".into(),
                cache_path: dir.path().join("images.json"),
                delay: Duration::ZERO,
                lookup: Box::new(FixedLookup),
            })
            .with_feedback(Box::new(BrokenFeedback));

        let snapshot = pipeline.run(&fixture_docs()).await;
        let meta = &snapshot.meta;
        assert_eq!(
            meta.retailers.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["2ndstreet", "mrporter", "ssense"]
        );
        // 3 listing + 2 marketplace + 2 secondhand; the repeated listing page adds nothing
        assert_eq!(meta.total_parsed, 7);
        assert_eq!(meta.jpy_usd_rate, Some(0.0067));
        assert_eq!(meta.total_filtered, snapshot.products.len());

        let discounts: Vec<_> = snapshot.products.iter().map(|p| p.discount_pct).collect();
        assert!(discounts.windows(2).all(|w| w[0] >= w[1]), "{:?}", discounts);
        assert!(snapshot
            .products
            .iter()
            .all(|p| p.retailer_type == RetailerType::Secondhand || p.discount_pct >= 50));
        assert!(snapshot.products.iter().all(|p| p.currency == Currency::Usd));
        assert!(snapshot
            .products
            .iter()
            .filter(|p| p.retailer == "2ndstreet")
            .all(|p| p.sale_price_jpy.is_some()));
        assert!(snapshot.products.iter().all(|p| p.image_url.is_some()));
        assert!(snapshot.products.iter().all(|p| p.feedback_status.is_none()));
    }

    #[tokio::test]
    async fn collaborators_absent_degrade_quietly() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(PipelineOptions { min_discount_pct: 0, min_document_bytes: 500 })
            .with_images(ImageResolver {
                retailer: "ssense".into(),
                cache_path: dir.path().join("images.json"),
                delay: Duration::ZERO,
                lookup: Box::new(NoImageLookup),
            });

        let snapshot = pipeline.run(&fixture_docs()).await;
        assert_eq!(snapshot.meta.jpy_usd_rate, None);
        assert_eq!(snapshot.products.len(), 7);
        assert!(snapshot
            .products
            .iter()
            .filter(|p| p.retailer == "2ndstreet")
            .all(|p| p.currency == Currency::Jpy && p.sale_price_jpy.is_none()));
        assert!(!dir.path().join("images.json").exists());
    }
}
