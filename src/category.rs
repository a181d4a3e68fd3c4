use crate::model::Category;

// Order matters: the first category with a matching keyword wins.
const RULES: &[(Category, &[&str])] = &[
    (
        Category::Shoes,
        &[
            "boot", "shoe", "sneaker", "loafer", "sandal", "mule", "slipper", "derby", "oxford",
            "clog", "espadrille", "pump", "flat", "trainer",
        ],
    ),
    (
        Category::Outerwear,
        &[
            "coat", "jacket", "blazer", "parka", "vest", "gilet", "cape", "poncho", "anorak",
            "windbreaker", "bomber", "overcoat", "peacoat",
        ],
    ),
    (
        Category::Bottoms,
        &["trouser", "pant", "jean", "short", "skirt", "legging", "jogger", "chino"],
    ),
    (
        Category::Tops,
        &[
            "shirt", "t-shirt", "tee", "polo", "sweater", "hoodie", "cardigan", "tank", "blouse",
            "henley", "sweatshirt", "top", "knit", "pullover", "jersey", "debardeur", "mock neck",
        ],
    ),
    (
        Category::Accessories,
        &[
            "bag", "belt", "wallet", "scarf", "hat", "cap", "glove", "sunglasses", "tie", "ring",
            "necklace", "bracelet", "earring", "keychain", "pouch", "tote", "backpack", "clutch",
            "case", "watch", "socks", "sock", "beanie", "umbrella",
        ],
    ),
];

/// Case-insensitive substring match of `name` against the keyword table.
pub fn classify(name: &str) -> Category {
    let lower = name.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names() {
        assert_eq!(classify("Leather Ankle Boot"), Category::Shoes);
        assert_eq!(classify("Wool Overcoat"), Category::Outerwear);
        assert_eq!(classify("Wide Leg TROUSERS"), Category::Bottoms);
        assert_eq!(classify("Logo Hoodie"), Category::Tops);
        assert_eq!(classify("Leather Belt"), Category::Accessories);
    }

    #[test]
    fn no_keyword_is_other() {
        assert_eq!(classify("Eau de Parfum"), Category::Other);
        assert_eq!(classify(""), Category::Other);
    }

    #[test]
    fn earlier_rule_wins() {
        assert_eq!(classify("Jacket with Boot Cuffs"), Category::Shoes);
        // "coat" appears inside "Coated", outerwear precedes bottoms
        assert_eq!(classify("Coated Denim Jeans"), Category::Outerwear);
    }
}
