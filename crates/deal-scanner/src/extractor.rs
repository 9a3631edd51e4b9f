//! Field extraction: turn one feed entry plus its linked page into a candidate.
//!
//! Every heuristic stage is an ordered, data-driven table evaluated top to
//! bottom with first-match-wins semantics:
//!
//! - [`CATEGORY_RULES`]: keyword groups, specific before broad
//! - [`PRICE_PATTERNS`]: Indian currency formats
//! - [`CONTENT_SOURCES`]: page containers that usually hold the deal text

use deal_core::text::collapse_whitespace;
use deal_core::{Category, DealError, PageFetcher, RawEntry, ScrapedCandidate};
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;

pub struct CategoryRule {
    pub category: Category,
    pub keywords: &'static [&'static str],
}

impl CategoryRule {
    /// Case-insensitive match of any keyword at a word start ("earbud" matches "earbuds").
    fn pattern(&self) -> Regex {
        let alternatives: Vec<String> = self.keywords.iter().map(|k| regex::escape(k)).collect();
        Regex::new(&format!(r"(?i)\b(?:{})", alternatives.join("|")))
            .expect("category keywords are escaped")
    }
}

pub const CATEGORY_RULES: &[CategoryRule] = &[
    CategoryRule {
        category: Category::Smartwatches,
        keywords: &["smartwatch", "smart watch", "apple watch", "galaxy watch", "fitness band"],
    },
    CategoryRule {
        category: Category::Headphones,
        keywords: &["headphone", "earphone", "earbud", "airpods", "neckband", "galaxy buds", "tws"],
    },
    CategoryRule {
        category: Category::Tvs,
        keywords: &["smart tv", "android tv", "led tv", "television"],
    },
    CategoryRule {
        category: Category::Mobiles,
        keywords: &["iphone", "smartphone", "mobile", "android", "galaxy", "oneplus", "redmi"],
    },
    CategoryRule {
        category: Category::Laptops,
        keywords: &["laptop", "macbook", "notebook", "ultrabook", "chromebook"],
    },
    CategoryRule {
        category: Category::Gaming,
        keywords: &[
            "gaming",
            "ps5",
            "playstation",
            "xbox",
            "nintendo",
            "controller",
            "gpu",
            "rtx",
            "graphics card",
        ],
    },
    CategoryRule {
        category: Category::Tvs,
        keywords: &["tv"],
    },
    CategoryRule {
        category: Category::Cameras,
        keywords: &["camera", "dslr", "mirrorless", "gopro"],
    },
    CategoryRule {
        category: Category::Clothing,
        keywords: &[
            "jeans", "shirt", "tshirt", "t-shirt", "dress", "apparel", "kurta", "jacket", "sneaker",
            "shoe",
        ],
    },
    CategoryRule {
        category: Category::Smartwatches,
        keywords: &["watch"],
    },
    CategoryRule {
        category: Category::HomeKitchen,
        keywords: &[
            "home",
            "kitchen",
            "cookware",
            "appliance",
            "mixer",
            "air fryer",
            "refrigerator",
            "washing machine",
            "vacuum",
        ],
    },
    CategoryRule {
        category: Category::Electronics,
        keywords: &[
            "electronics",
            "speaker",
            "charger",
            "power bank",
            "monitor",
            "keyboard",
            "mouse",
            "router",
            "ssd",
            "tablet",
        ],
    },
];

static CATEGORY_PATTERNS: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    CATEGORY_RULES
        .iter()
        .map(|rule| (rule.category, rule.pattern()))
        .collect()
});

/// Currency formats tried in order; the first capture group is the amount.
pub const PRICE_PATTERNS: &[&str] = &[
    r"₹\s*(\d[\d,]*(?:\.\d+)?)",
    r"(?i)\bRs\.?\s*(\d[\d,]*(?:\.\d+)?)",
    r"(?i)\bINR\s*(\d[\d,]*(?:\.\d+)?)",
];

static PRICE_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    PRICE_PATTERNS
        .iter()
        .map(|p| Regex::new(p).expect("price pattern is valid"))
        .collect()
});

static FEATURES_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bFeatures\b").expect("features marker is valid"));

pub enum ContentSource {
    /// Text of the first element matching the selector.
    Element(&'static str),
    /// `content` attribute of the first matching `<meta>` tag.
    Meta(&'static str),
}

pub const CONTENT_SOURCES: &[ContentSource] = &[
    ContentSource::Element("div.deal-desc"),
    ContentSource::Element("div.content-section"),
    ContentSource::Element("div.description"),
    ContentSource::Element("div#content"),
    ContentSource::Element("article"),
    ContentSource::Element("div.post-content"),
    ContentSource::Element("div.entry-content"),
    ContentSource::Meta(r#"meta[name="description"]"#),
    ContentSource::Meta(r#"meta[property="og:description"]"#),
];

/// Category of a listing from its title and summary text. Deterministic.
pub fn classify(text: &str) -> Category {
    CATEGORY_PATTERNS
        .iter()
        .find(|(_, pattern)| pattern.is_match(text))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Others)
}

/// First amount matched by the currency pattern table, separators stripped.
pub fn extract_price(text: &str) -> Option<f64> {
    PRICE_REGEXES.iter().find_map(|re| {
        re.captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().replace(',', "").parse::<f64>().ok())
            .filter(|p| p.is_finite())
    })
}

/// Plain text of a feed summary. DesiDime wraps the useful part in
/// `div.snippet.summary`; anything else is stripped of markup wholesale.
pub fn clean_summary(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    if let Ok(selector) = Selector::parse("div.snippet.summary") {
        if let Some(snippet) = fragment.select(&selector).next() {
            return collapse_whitespace(&snippet.text().collect::<Vec<_>>().join(" "));
        }
    }
    collapse_whitespace(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

/// Deal text from a fetched page, using the first content source that yields anything.
pub fn canonical_content(page: &str) -> Option<String> {
    let document = Html::parse_document(page);

    CONTENT_SOURCES.iter().find_map(|source| {
        let (css, is_meta) = match source {
            ContentSource::Element(css) => (*css, false),
            ContentSource::Meta(css) => (*css, true),
        };
        let selector = Selector::parse(css).ok()?;
        let element = document.select(&selector).next()?;
        let text = if is_meta {
            element.value().attr("content").unwrap_or_default().to_string()
        } else {
            element.text().collect::<Vec<_>>().join(" ")
        };
        let text = collapse_whitespace(&text);
        (!text.is_empty()).then_some(text)
    })
}

/// Split once on the first whole-word "Features" marker into (details, features).
pub fn split_features(content: &str) -> (String, String) {
    match FEATURES_MARKER.find(content) {
        Some(m) => (
            content[..m.start()].trim().to_string(),
            content[m.end()..].trim().to_string(),
        ),
        None => (content.trim().to_string(), String::new()),
    }
}

/// Build a candidate from a feed entry. Never fails: when the page cannot be
/// fetched or has no recognisable content, the feed summary stands in.
pub async fn extract_candidate(entry: &RawEntry, fetcher: &dyn PageFetcher) -> ScrapedCandidate {
    let title = entry.title.trim().to_string();
    let url = entry.link.trim().to_string();
    let summary = clean_summary(&entry.summary);
    let category = classify(&format!("{} {}", title, summary));

    let page = fetcher.fetch(&url).await;
    let (details, features, raw_price) = match page {
        Ok(html) => {
            let content = canonical_content(&html).unwrap_or_else(|| {
                tracing::debug!("{}", DealError::ExtractionDegraded(url.clone()));
                summary.clone()
            });
            let (details, features) = split_features(&content);
            let raw_price = extract_price(&details).or_else(|| extract_price(&summary));
            (details, features, raw_price)
        }
        Err(e) => {
            tracing::debug!("Page fetch failed, using feed summary: {}", e);
            (summary.clone(), String::new(), extract_price(&summary))
        }
    };

    ScrapedCandidate {
        title,
        category,
        summary,
        details,
        features,
        raw_price,
        url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StaticPage(Result<String, ()>);

    #[async_trait]
    impl PageFetcher for StaticPage {
        async fn fetch(&self, url: &str) -> Result<String, DealError> {
            self.0
                .clone()
                .map_err(|_| DealError::SourceUnavailable(url.to_string()))
        }
    }

    fn entry(title: &str, summary: &str) -> RawEntry {
        RawEntry {
            title: title.to_string(),
            summary: summary.to_string(),
            link: "https://www.desidime.com/deals/x".to_string(),
            source: "test".to_string(),
        }
    }

    #[test]
    fn test_every_category_rule_matches_its_keywords() {
        for (idx, rule) in CATEGORY_RULES.iter().enumerate() {
            for keyword in rule.keywords {
                let text = format!("Great deal on {} today", keyword);
                let first_match = CATEGORY_RULES
                    .iter()
                    .position(|r| r.pattern().is_match(&text))
                    .unwrap();
                // A keyword may be shadowed only by an earlier, more specific rule.
                assert!(first_match <= idx, "{} matched rule {}", keyword, first_match);
                assert_eq!(classify(&text), CATEGORY_RULES[first_match].category);
            }
        }
    }

    #[test]
    fn test_specific_rules_win_over_broad_ones() {
        assert_eq!(classify("Samsung Galaxy Watch 6"), Category::Smartwatches);
        assert_eq!(classify("Samsung Galaxy Buds FE"), Category::Headphones);
        assert_eq!(classify("Mi 43 inch Android TV"), Category::Tvs);
        assert_eq!(classify("Gaming laptop with RTX 4060"), Category::Laptops);
        assert_eq!(classify("Logitech gaming mouse"), Category::Gaming);
        assert_eq!(classify("Titan analog watch for men"), Category::Smartwatches);
    }

    #[test]
    fn test_classify_is_case_insensitive_and_word_anchored() {
        assert_eq!(classify("APPLE IPHONE 15"), Category::Mobiles);
        // "tv" inside another word is not a TV.
        assert_eq!(classify("Activa scooter helmet"), Category::Others);
        assert_eq!(classify("Nothing to see here"), Category::Others);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let text = "boAt Rockerz 450 wireless headphones ₹1,299";
        let first = classify(text);
        for _ in 0..10 {
            assert_eq!(classify(text), first);
        }
    }

    #[test]
    fn test_price_patterns() {
        assert_eq!(extract_price("Now at ₹40,000 only"), Some(40000.0));
        assert_eq!(extract_price("₹ 1,299.50"), Some(1299.5));
        assert_eq!(extract_price("Deal price Rs. 12,499"), Some(12499.0));
        assert_eq!(extract_price("rs 799 after coupon"), Some(799.0));
        assert_eq!(extract_price("INR 2,49,900"), Some(249900.0));
        assert_eq!(extract_price("inr599"), Some(599.0));
        assert_eq!(extract_price("$49.99"), None);
        assert_eq!(extract_price("Prices drop soon"), None);
    }

    #[test]
    fn test_price_pattern_order() {
        // Rupee symbol is tried before "Rs." even when it appears later in the text.
        assert_eq!(extract_price("MRP Rs. 2,000, now ₹1,500"), Some(1500.0));
    }

    #[test]
    fn test_clean_summary_prefers_snippet_block() {
        let html = r#"<p>Posted by someone</p><div class="snippet summary">Lowest <b>price</b>
            ever</div>"#;
        assert_eq!(clean_summary(html), "Lowest price ever");
        assert_eq!(clean_summary("<p>Just  <i>text</i></p>"), "Just text");
        assert_eq!(clean_summary("plain text"), "plain text");
    }

    #[test]
    fn test_content_sources_in_priority_order() {
        let page = r#"<html><head><meta name="description" content="meta text"></head>
            <body><article>article text</article><div class="deal-desc">deal text</div></body></html>"#;
        assert_eq!(canonical_content(page).as_deref(), Some("deal text"));

        let page = r#"<html><head><meta property="og:description" content="og text"></head><body></body></html>"#;
        assert_eq!(canonical_content(page).as_deref(), Some("og text"));

        let page = r#"<html><body><div class="description">   </div><article>fallback</article></body></html>"#;
        assert_eq!(canonical_content(page).as_deref(), Some("fallback"));

        assert_eq!(canonical_content("<html><body><p>nothing</p></body></html>"), None);
    }

    #[test]
    fn test_every_content_source_selector_parses() {
        for source in CONTENT_SOURCES {
            let css = match source {
                ContentSource::Element(css) | ContentSource::Meta(css) => css,
            };
            assert!(Selector::parse(css).is_ok(), "bad selector {}", css);
        }
    }

    #[test]
    fn test_split_features() {
        let (details, features) = split_features("Great phone Features 5G, 120Hz");
        assert_eq!(details, "Great phone");
        assert_eq!(features, "5G, 120Hz");

        let (details, features) = split_features("No marker, just FeaturesList text");
        assert_eq!(details, "No marker, just FeaturesList text");
        assert!(features.is_empty());
    }

    #[tokio::test]
    async fn test_scenario_iphone_from_summary() {
        let fetcher = StaticPage(Err(()));
        let candidate =
            extract_candidate(&entry("iPhone 15 deal", "Flat ₹40,000 on Flipkart"), &fetcher).await;

        assert_eq!(candidate.category, Category::Mobiles);
        assert_eq!(candidate.raw_price, Some(40000.0));
        assert_eq!(candidate.details, "Flat ₹40,000 on Flipkart");
        assert!(candidate.features.is_empty());
    }

    #[tokio::test]
    async fn test_page_content_and_features() {
        let page = r#"<html><body><div class="deal-desc">Sony Bravia 55 inch at Rs. 57,990 Features 4K HDR</div></body></html>"#;
        let fetcher = StaticPage(Ok(page.to_string()));
        let candidate = extract_candidate(&entry("Sony Bravia", "Big screen deal"), &fetcher).await;

        assert_eq!(candidate.details, "Sony Bravia 55 inch at Rs. 57,990");
        assert_eq!(candidate.features, "4K HDR");
        assert_eq!(candidate.raw_price, Some(57990.0));
    }

    #[tokio::test]
    async fn test_page_without_content_falls_back_to_summary() {
        let fetcher = StaticPage(Ok("<html><body></body></html>".to_string()));
        let candidate = extract_candidate(&entry("Mixer grinder", "Only INR 2,199"), &fetcher).await;

        assert_eq!(candidate.category, Category::HomeKitchen);
        assert_eq!(candidate.details, "Only INR 2,199");
        assert_eq!(candidate.raw_price, Some(2199.0));
    }

    #[tokio::test]
    async fn test_missing_price_is_none() {
        let fetcher = StaticPage(Err(()));
        let candidate = extract_candidate(&entry("Mystery box", "Check it out"), &fetcher).await;
        assert_eq!(candidate.raw_price, None);
        assert!(Category::ALL.contains(&candidate.category));
    }
}
