//! MR PORTER listings: product links whose labels hold an image plus
//! continuation-separated lines (`BRAND`, name, `$original`, `NN% off`, `$sale`).

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{labelled_links, Format};
use crate::model::RawProduct;
use crate::parser::lines::{find_image, split_continuations, strip_images, Fields};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\]\((https://www\.mrporter\.com/[^\)]*?/product/[^\)]+)\)").unwrap()
});
static CDN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[.*?\]\((https://www\.mrporter\.com/variants/images/[^)]+)\)").unwrap()
});
static PRODUCT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/product/(?:[^/]+/)+(\d+)$").unwrap());

const BANNERS: &[&str] = &["FINAL SALE", "FURTHER REDUCED"];

pub fn extract(text: &str) -> Vec<RawProduct> {
    labelled_links(text, &URL_RE)
        .into_iter()
        .filter_map(|(label, url)| parse_span(label, url))
        .collect()
}

fn parse_span(label: &str, url: &str) -> Option<RawProduct> {
    let image = find_image(label, &CDN_RE).or_else(|| fallback_image(url));
    let lines = split_continuations(&strip_images(label));
    let fields = Fields::collect(lines, |l| BANNERS.contains(&l));

    // The stated percent is ignored: the positional price pair is authoritative.
    let Some((sale, original)) = Format::Marketplace.price_order().assign(&fields.prices, None) else {
        debug!(url, prices = fields.prices.len(), "marketplace block without a price pair");
        return None;
    };
    let (brand, name) = fields.brand_and_name()?;

    let mut product = RawProduct::new(brand, name, sale, original, url.to_string());
    product.image_url = image;
    Some(product)
}

fn fallback_image(url: &str) -> Option<String> {
    let id = PRODUCT_ID_RE.captures(url)?.get(1)?.as_str();
    Some(format!("https://www.mrporter.com/variants/images/{}/in/w358_q60.jpg", id))
}
