//! Stop/continue decisions for paginated scraping, one page at a time.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::info;

static DISCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\d+%\s*OFF").unwrap());
static SECONDHAND_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://en\.2ndstreet\.jp/goods/detail/[^\s\)\]]+").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop,
}

impl Verdict {
    fn from_continue(keep_going: bool) -> Self {
        if keep_going {
            Verdict::Continue
        } else {
            Verdict::Stop
        }
    }

    pub fn exit_code(self) -> u8 {
        match self {
            Verdict::Continue => 0,
            Verdict::Stop => 1,
        }
    }
}

/// Keep paging while the page still advertises at least one discount.
pub fn check_no_discount(text: &str) -> Verdict {
    let count = DISCOUNT_RE.find_iter(text).count();
    info!("no_discount: found {} discounted items", count);
    Verdict::from_continue(count > 0)
}

#[derive(Deserialize)]
struct KnownProducts {
    #[serde(default)]
    products: Vec<KnownProduct>,
}

#[derive(Deserialize)]
struct KnownProduct {
    #[serde(default)]
    url: String,
}

/// Stop once `threshold` or more of the page's products are already in the
/// previous run's snapshot. An unreadable snapshot means keep going.
pub fn check_seen_before(text: &str, latest: &Path, threshold: f64) -> Verdict {
    let page_urls: HashSet<&str> = SECONDHAND_URL_RE.find_iter(text).map(|m| m.as_str()).collect();
    if page_urls.is_empty() {
        info!("seen_before: no product URLs found on page");
        return Verdict::Stop;
    }

    let known = match load_known_urls(latest) {
        Ok(urls) => urls,
        Err(e) => {
            info!("seen_before: could not load {}: {:#}", latest.display(), e);
            return Verdict::Continue;
        }
    };

    let overlap = page_urls.iter().filter(|u| known.contains(**u)).count();
    let ratio = overlap as f64 / page_urls.len() as f64;
    info!(
        "seen_before: {}/{} URLs already known ({:.0}%, threshold {:.0}%)",
        overlap,
        page_urls.len(),
        ratio * 100.0,
        threshold * 100.0
    );
    Verdict::from_continue(ratio < threshold)
}

fn load_known_urls(path: &Path) -> anyhow::Result<HashSet<String>> {
    let raw = fs::read_to_string(path)?;
    let known: KnownProducts = serde_json::from_str(&raw)?;
    Ok(known.products.into_iter().map(|p| p.url).collect())
}
