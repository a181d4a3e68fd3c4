use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use regex::Regex;
use spider_client::shapes::request::{ReturnFormat, ReturnFormatHandling};
use spider_client::{RequestParams, Spider};
use tracing::{debug, info, warn};

use crate::error::MonitorError;
use crate::model::ProductRecord;

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

// SSENSE product codes sit alone on a line: 6 digits, a letter, 6 digits.
static PRODUCT_CODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(\d{6}[A-Z]\d{6})\s*$").unwrap());

/// Finds the image code for a product page.
#[async_trait]
pub trait ImageLookup: Send + Sync {
    /// False when the lookup cannot run at all (e.g. no credential).
    fn is_available(&self) -> bool {
        true
    }

    async fn product_code(&self, product_url: &str) -> Option<String>;
}

pub struct NoImageLookup;

#[async_trait]
impl ImageLookup for NoImageLookup {
    fn is_available(&self) -> bool {
        false
    }

    async fn product_code(&self, _product_url: &str) -> Option<String> {
        None
    }
}

/// Scrapes product pages as markdown through spider.cloud.
pub struct SpiderLookup {
    spider: Spider,
}

impl SpiderLookup {
    /// `None` when `SPIDER_API_KEY` is unset.
    pub fn from_env() -> Result<Option<Self>> {
        let Ok(api_key) = std::env::var("SPIDER_API_KEY") else {
            return Ok(None);
        };
        let spider = Spider::new(Some(api_key))
            .map_err(|e| anyhow::anyhow!("Failed to create Spider client: {}", e))?;
        Ok(Some(SpiderLookup { spider }))
    }

    async fn scrape_markdown(&self, url: &str) -> Result<String> {
        let params = RequestParams {
            return_format: Some(ReturnFormatHandling::Single(ReturnFormat::Markdown)),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            LOOKUP_TIMEOUT,
            self.spider.scrape_url(url, Some(params), "application/json"),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Spider scrape timed out"))?
        .map_err(|e| anyhow::anyhow!("Spider scrape failed: {}", e))?;

        let parsed: serde_json::Value = match response.as_str() {
            Some(s) => serde_json::from_str(s).unwrap_or(response.clone()),
            None => response,
        };

        parsed
            .as_array()
            .and_then(|arr| arr.first())
            .and_then(|obj| obj.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("No content in spider response"))
    }
}

#[async_trait]
impl ImageLookup for SpiderLookup {
    async fn product_code(&self, product_url: &str) -> Option<String> {
        match self.scrape_markdown(product_url).await {
            Ok(md) => find_product_code(&md),
            Err(e) => {
                warn!("Lookup failed for {}: {:#}", product_url, e);
                None
            }
        }
    }
}

pub fn find_product_code(markdown: &str) -> Option<String> {
    PRODUCT_CODE_RE.captures(markdown).map(|c| c[1].to_string())
}

pub fn image_url_for_code(code: &str) -> String {
    format!("https://img.ssensemedia.com/images/{}_1/x.jpg", code)
}

/// Cache key: last path segment of the product URL.
pub fn cache_key(url: &str) -> &str {
    url.trim_end_matches('/').rsplit('/').next().unwrap_or(url)
}

// ── Cache ──

/// Flat `product id → image URL` map persisted as JSON between runs.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: BTreeMap<String, String>,
}

impl ImageCache {
    pub fn load(path: &Path) -> Self {
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "no image cache yet");
                return ImageCache::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entries) => ImageCache { entries },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable image cache");
                ImageCache::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), MonitorError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MonitorError::write(parent, e))?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(path, json).map_err(|e| MonitorError::write(path, e))
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: String, image_url: String) {
        self.entries.insert(key, image_url);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

// ── Resolution stage ──

#[derive(Debug, Default, PartialEq)]
pub struct ImageStats {
    pub from_cache: usize,
    pub fetched: usize,
    pub attempted: usize,
}

/// Fills missing images for one retailer's records, cache first.
pub struct ImageResolver {
    pub retailer: String,
    pub cache_path: PathBuf,
    pub delay: Duration,
    pub lookup: Box<dyn ImageLookup>,
}

impl ImageResolver {
    pub async fn resolve(&self, records: &mut [ProductRecord]) -> ImageStats {
        let mut stats = ImageStats::default();
        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.retailer == self.retailer && r.image_url.is_none())
            .map(|(i, _)| i)
            .collect();
        if pending.is_empty() {
            return stats;
        }

        let mut cache = ImageCache::load(&self.cache_path);
        let mut to_fetch = Vec::new();
        for idx in pending {
            let record = &mut records[idx];
            match cache.get(cache_key(&record.url)) {
                Some(image) => {
                    record.image_url = Some(image.clone());
                    stats.from_cache += 1;
                }
                None => to_fetch.push(idx),
            }
        }
        if stats.from_cache > 0 {
            info!("{} images: {} from cache", self.retailer, stats.from_cache);
        }
        if to_fetch.is_empty() {
            return stats;
        }
        if !self.lookup.is_available() {
            warn!(
                "{} images: {} need fetching but no lookup is configured, skipping",
                self.retailer,
                to_fetch.len()
            );
            return stats;
        }

        info!("{} images: fetching {} product pages...", self.retailer, to_fetch.len());
        let pb = ProgressBar::new(to_fetch.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );

        for (i, &idx) in to_fetch.iter().enumerate() {
            let record = &mut records[idx];
            let key = cache_key(&record.url).to_string();
            stats.attempted += 1;
            match self.lookup.product_code(&record.url).await {
                Some(code) => {
                    let image = image_url_for_code(&code);
                    debug!("{} -> {}", key, code);
                    record.image_url = Some(image.clone());
                    cache.insert(key, image);
                    stats.fetched += 1;
                }
                None => debug!("{} -> no product code found", key),
            }
            pb.inc(1);
            if i + 1 < to_fetch.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
        pb.finish_and_clear();

        match cache.save(&self.cache_path) {
            Ok(()) => debug!(entries = cache.len(), "image cache saved"),
            Err(e) => warn!("Could not save image cache: {}", e),
        }
        stats
    }
}
