pub mod listing;
pub mod marketplace;
pub mod secondhand;

use std::sync::LazyLock;

use regex::Regex;

use crate::model::RawProduct;
use crate::parser::brackets::find_label_start;

/// The three page layouts we know how to read, selected by retailer tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// SSENSE listing pages. Unknown tags fall back to this layout.
    Listing,
    /// MR PORTER listing pages.
    Marketplace,
    /// 2nd STREET (JP) used-goods pages.
    Secondhand,
}

/// Which observed price is which. Encoded per layout, never inferred from
/// magnitudes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOrder {
    SaleFirst,
    OriginalFirst,
    /// One observed price; original is derived from the discount line.
    Single,
}

impl Format {
    pub fn for_retailer(tag: &str) -> Self {
        match tag {
            "mrporter" => Format::Marketplace,
            "2ndstreet" => Format::Secondhand,
            _ => Format::Listing,
        }
    }

    pub fn price_order(self) -> PriceOrder {
        match self {
            Format::Listing => PriceOrder::SaleFirst,
            Format::Marketplace => PriceOrder::OriginalFirst,
            Format::Secondhand => PriceOrder::Single,
        }
    }

    pub fn extract(self, text: &str) -> Vec<RawProduct> {
        match self {
            Format::Listing => listing::extract(text),
            Format::Marketplace => marketplace::extract(text),
            Format::Secondhand => secondhand::extract(text),
        }
    }
}

impl PriceOrder {
    /// `(sale, original)` from the prices of one span, or `None` when the span
    /// carries too few of them.
    pub fn assign(self, prices: &[u64], discount: Option<i64>) -> Option<(u64, u64)> {
        match self {
            PriceOrder::SaleFirst if prices.len() >= 2 => Some((prices[0], prices[1])),
            PriceOrder::OriginalFirst if prices.len() >= 2 => Some((prices[1], prices[0])),
            PriceOrder::Single => {
                let price = *prices.last()?;
                Some((price, original_from_discount(price, discount.unwrap_or(0))))
            }
            _ => None,
        }
    }
}

/// Back out a list price from a sale price and its advertised percent off.
pub fn original_from_discount(price: u64, pct: i64) -> u64 {
    if pct <= 0 || pct >= 100 {
        return price;
    }
    let original = price as f64 / (1.0 - pct as f64 / 100.0);
    crate::model::round_half_even(original).max(0) as u64
}

static PRODUCT_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/product/([^/]+)/").unwrap());

/// `"maison-margiela"` in `/product/maison-margiela/...` becomes `"Maison Margiela"`.
pub fn brand_from_url(url: &str) -> Option<String> {
    let slug = PRODUCT_SLUG_RE.captures(url)?.get(1)?.as_str();
    Some(title_case(&slug.replace('-', " ")))
}

fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut word_start = true;
    for c in s.chars() {
        if c.is_alphabetic() {
            if word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}

/// Every `[label](url)` in `text` whose URL matches `url_re` (URL in group 1),
/// as `(label, url)`. Labels whose opening bracket cannot be found are skipped.
pub fn labelled_links<'a>(text: &'a str, url_re: &Regex) -> Vec<(&'a str, &'a str)> {
    let mut spans = Vec::new();
    for caps in url_re.captures_iter(text) {
        let (Some(whole), Some(url)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let close = whole.start();
        match find_label_start(text, close) {
            Some(open) => spans.push((&text[open + 1..close], url.as_str())),
            None => tracing::debug!(url = url.as_str(), "unbalanced label, skipping block"),
        }
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retailer_dispatch() {
        assert_eq!(Format::for_retailer("mrporter"), Format::Marketplace);
        assert_eq!(Format::for_retailer("2ndstreet"), Format::Secondhand);
        assert_eq!(Format::for_retailer("ssense"), Format::Listing);
        assert_eq!(Format::for_retailer("unknown"), Format::Listing);
    }

    #[test]
    fn price_orders() {
        assert_eq!(PriceOrder::SaleFirst.assign(&[50, 100], None), Some((50, 100)));
        assert_eq!(PriceOrder::OriginalFirst.assign(&[100, 50], None), Some((50, 100)));
        assert_eq!(PriceOrder::SaleFirst.assign(&[50], None), None);
        assert_eq!(PriceOrder::Single.assign(&[], None), None);
        assert_eq!(PriceOrder::Single.assign(&[700], None), Some((700, 700)));
        assert_eq!(PriceOrder::Single.assign(&[700], Some(30)), Some((700, 1000)));
    }

    #[test]
    fn discount_back_calculation() {
        assert_eq!(original_from_discount(14190, 50), 28380);
        assert_eq!(original_from_discount(100, 0), 100);
        assert_eq!(original_from_discount(100, 100), 100);
        // 999 / 0.7 = 1427.14
        assert_eq!(original_from_discount(999, 30), 1427);
    }

    #[test]
    fn brand_slug() {
        assert_eq!(
            brand_from_url("https://www.ssense.com/en-us/men/product/maison-margiela/black-tabi/123"),
            Some("Maison Margiela".to_string())
        );
        assert_eq!(brand_from_url("https://www.ssense.com/en-us/men/sale"), None);
    }

    #[test]
    fn title_case_lowercases_tails() {
        assert_eq!(title_case("COMME des garcons"), "Comme Des Garcons");
        assert_eq!(title_case("a.p.c."), "A.P.C.");
    }

    #[test]
    fn labelled_links_skip_unbalanced() {
        let re = Regex::new(r"\]\((https://shop/[^)]+)\)").unwrap();
        let text = "stray](https://shop/1) [ok](https://shop/2)";
        let links = labelled_links(text, &re);
        assert_eq!(links, vec![("ok", "https://shop/2")]);
    }
}
