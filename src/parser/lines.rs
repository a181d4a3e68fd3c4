use std::sync::LazyLock;

use regex::Regex;

static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)!\[.*?\]\(.*?\)").unwrap());
static CONTINUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\+\s*\n|\\+\s*\\+").unwrap());
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[$¥￥]([0-9,]+)$").unwrap());
static DISCOUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^-?\s*(\d+)%\s*off$").unwrap());

/// A single cleaned line from a product span.
#[derive(Debug, Clone, PartialEq)]
pub enum Line {
    Price(u64),
    Discount(i64),
    Text(String),
}

pub fn classify(line: &str) -> Line {
    if let Some(caps) = PRICE_RE.captures(line) {
        if let Some(amount) = parse_amount(&caps[1]) {
            return Line::Price(amount);
        }
    }
    if let Some(caps) = DISCOUNT_RE.captures(line) {
        if let Ok(pct) = caps[1].parse::<i64>() {
            return Line::Discount(pct);
        }
    }
    Line::Text(line.to_string())
}

/// Remove every `![alt](src)` from the span.
pub fn strip_images(span: &str) -> String {
    IMAGE_RE.replace_all(span, "").into_owned()
}

/// First embedded image whose source matches `cdn`, which must capture the URL
/// in group 1.
pub fn find_image(span: &str, cdn: &Regex) -> Option<String> {
    cdn.captures(span).map(|c| c[1].to_string())
}

/// Split a span on `\\`-style continuation markers and trim what is left.
pub fn split_continuations(span: &str) -> Vec<String> {
    CONTINUATION_RE
        .split(span)
        .map(|part| part.trim().trim_matches('\\').trim())
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Prices, discount and free text of one span, in source order.
#[derive(Debug, Default)]
pub struct Fields {
    pub prices: Vec<u64>,
    pub discount: Option<i64>,
    pub texts: Vec<String>,
}

impl Fields {
    pub fn collect<I, F>(lines: I, is_boilerplate: F) -> Self
    where
        I: IntoIterator<Item = String>,
        F: Fn(&str) -> bool,
    {
        let mut fields = Fields::default();
        for line in lines {
            match classify(&line) {
                Line::Price(p) => fields.prices.push(p),
                Line::Discount(d) => fields.discount = Some(d),
                Line::Text(t) if is_boilerplate(&t) => {}
                Line::Text(t) => fields.texts.push(t),
            }
        }
        fields
    }

    /// `(brand, name)`: first text line, then the second or the brand again.
    pub fn brand_and_name(&self) -> Option<(String, String)> {
        let brand = self.texts.first()?.clone();
        let name = self.texts.get(1).cloned().unwrap_or_else(|| brand.clone());
        Some((brand, name))
    }
}

fn parse_amount(digits: &str) -> Option<u64> {
    digits.replace(',', "").parse().ok()
}
