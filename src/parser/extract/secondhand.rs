//! 2nd STREET (JP) used goods. One yen price per item, optionally preceded by
//! an `NN% OFF` line; size and condition lines are metadata.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{labelled_links, Format};
use crate::model::{Currency, RawProduct, RetailerType};
use crate::parser::lines::{find_image, split_continuations, strip_images, Fields};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]\((https://en\.2ndstreet\.jp/goods/detail/[^\)]+)\)").unwrap()
});
static CDN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[.*?\]\((https://cdn2\.2ndstreet\.jp/img/pc/goods/[^)]+)\)").unwrap()
});
static SIZE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^Size\s").unwrap());

pub fn extract(text: &str) -> Vec<RawProduct> {
    labelled_links(text, &URL_RE)
        .into_iter()
        .filter_map(|(label, url)| parse_span(label, url))
        .collect()
}

fn parse_span(label: &str, url: &str) -> Option<RawProduct> {
    let image = find_image(label, &CDN_RE).map(|src| src.replace("_tn.jpg", ".jpg"));
    let lines = split_continuations(&strip_images(label))
        .into_iter()
        .map(|line| line.strip_prefix("- ").map(|rest| rest.trim().to_string()).unwrap_or(line))
        .filter(|line| !line.is_empty() && line != "-");
    let fields = Fields::collect(lines, is_metadata);

    let Some((sale, original)) = Format::Secondhand.price_order().assign(&fields.prices, fields.discount) else {
        debug!(url, "secondhand block without a yen price");
        return None;
    };
    let (brand, name) = fields.brand_and_name()?;

    let mut product = RawProduct::new(brand, name, sale, original, url.to_string());
    product.discount_pct = Some(fields.discount.unwrap_or(0));
    product.currency = Some(Currency::Jpy);
    product.retailer_type = Some(RetailerType::Secondhand);
    product.image_url = image;
    Some(product)
}

fn is_metadata(line: &str) -> bool {
    line.starts_with("Item Condition:") || SIZE_RE.is_match(line)
}
