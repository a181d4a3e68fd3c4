//! SSENSE sale listings.
//!
//! Every product is one link whose label starts with a base64 image placeholder:
//!
//! ```text
//! [![slug - Name](<Base64-Image-Removed>)\\
//! \\
//! BRAND\\
//! \\
//! \\
//! Product Name\\
//! \\
//! \\
//! $SALE\\
//! \\
//! $ORIGINAL](https://www.ssense.com/...)
//! ```

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::{brand_from_url, Format};
use crate::model::RawProduct;
use crate::parser::brackets::split_on_image_links;
use crate::parser::lines::Fields;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\((https://www\.ssense\.com/[^\)]+)\)").unwrap());
static URL_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\(https://www\.ssense\.com/[^\)]+\)$").unwrap());

pub fn extract(text: &str) -> Vec<RawProduct> {
    split_on_image_links(text)
        .into_iter()
        .filter(|block| !block.trim().is_empty())
        .filter_map(parse_block)
        .collect()
}

fn parse_block(block: &str) -> Option<RawProduct> {
    let url = URL_RE.captures(block)?.get(1)?.as_str().to_string();

    let lines = block.split('\n').filter_map(|line| {
        let cleaned = line.trim().trim_end_matches('\\').trim();
        let cleaned = URL_SUFFIX_RE.replace(cleaned, "");
        let cleaned = cleaned.trim();
        (!cleaned.is_empty()).then(|| cleaned.to_string())
    });
    let fields = Fields::collect(lines, is_boilerplate);

    let Some((sale, original)) = Format::Listing.price_order().assign(&fields.prices, None) else {
        debug!(%url, prices = fields.prices.len(), "listing block without a price pair");
        return None;
    };
    let Some((mut brand, name)) = fields.brand_and_name() else {
        debug!(%url, "listing block without text lines");
        return None;
    };
    if brand == name {
        if let Some(from_url) = brand_from_url(&url) {
            brand = from_url;
        }
    }

    Some(RawProduct::new(brand, name, sale, original, url))
}

fn is_boilerplate(line: &str) -> bool {
    line.starts_with("[![") || line.starts_with('#') || line.eq_ignore_ascii_case("SALE ONLY")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(lines: &[&str], url: &str) -> String {
        let mut out = String::from("[![slug - Name](<Base64-Image-Removed>)\\\\\n");
        for (i, line) in lines.iter().enumerate() {
            out.push_str("\\\\\n");
            out.push_str(line);
            if i + 1 < lines.len() {
                out.push_str("\\\\\n");
            }
        }
        out.push_str(&format!("]({})\n", url));
        out
    }

    #[test]
    fn sale_price_comes_first() {
        let md = block(&["BRAND", "Product Name", "$50", "$100"], "https://www.ssense.com/en-us/men/product/brand/product-name/1");
        let products = extract(&md);
        assert_eq!(products.len(), 1);
        let p = &products[0];
        assert_eq!(p.brand, "BRAND");
        assert_eq!(p.name, "Product Name");
        assert_eq!(p.sale_price, 50);
        assert_eq!(p.original_price, 100);
        assert_eq!(p.discount_pct, None);
    }

    #[test]
    fn single_text_line_takes_brand_from_url() {
        let md = block(&["Tabi Boots", "$600", "$1,200"], "https://www.ssense.com/en-us/men/product/maison-margiela/tabi-boots/99");
        let products = extract(&md);
        assert_eq!(products[0].brand, "Maison Margiela");
        assert_eq!(products[0].name, "Tabi Boots");
        assert_eq!(products[0].original_price, 1200);
    }

    #[test]
    fn drops_sale_only_banner() {
        let md = block(&["SALE ONLY", "Acne Studios", "Scarf", "$90", "$180"], "https://www.ssense.com/en-us/men/product/acne-studios/scarf/5");
        let products = extract(&md);
        assert_eq!(products[0].brand, "Acne Studios");
        assert_eq!(products[0].name, "Scarf");
    }

    #[test]
    fn block_with_one_price_is_dropped() {
        let md = block(&["BRAND", "Thing", "$50"], "https://www.ssense.com/en-us/men/product/brand/thing/2");
        assert!(extract(&md).is_empty());
    }

    #[test]
    fn foreign_links_are_ignored() {
        let md = block(&["BRAND", "Thing", "$50", "$90"], "https://example.com/product/brand/thing/2");
        assert!(extract(&md).is_empty());
    }

    #[test]
    fn fixture_page() {
        let md = std::fs::read_to_string("tests/fixtures/ssense_sale.md").unwrap();
        let products = extract(&md);
        assert_eq!(products.len(), 3, "got: {:?}", products);
        assert_eq!(products[0].brand, "Our Legacy");
        assert_eq!(products[0].name, "Black Borrowed Shirt");
        assert_eq!((products[0].sale_price, products[0].original_price), (126, 315));
        assert_eq!(products[2].brand, "Rick Owens");
    }
}
