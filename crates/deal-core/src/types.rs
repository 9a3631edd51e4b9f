use chrono::{DateTime, Utc};
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::text::first_amount;

/// One item pulled from a deal feed, before any page scraping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEntry {
    pub title: String,
    /// Feed summary/description, usually an HTML fragment.
    pub summary: String,
    pub link: String,
    /// Identifier of the feed the entry came from (its URL for HTTP feeds).
    pub source: String,
}

/// Fixed product domain a candidate is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Mobiles,
    Laptops,
    Headphones,
    Gaming,
    Smartwatches,
    Clothing,
    #[serde(rename = "TVs")]
    Tvs,
    Cameras,
    #[serde(rename = "Home & Kitchen")]
    HomeKitchen,
    Electronics,
    #[default]
    Others,
}

impl Category {
    pub const ALL: [Category; 11] = [
        Category::Mobiles,
        Category::Laptops,
        Category::Headphones,
        Category::Gaming,
        Category::Smartwatches,
        Category::Clothing,
        Category::Tvs,
        Category::Cameras,
        Category::HomeKitchen,
        Category::Electronics,
        Category::Others,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Category::Mobiles => "Mobiles",
            Category::Laptops => "Laptops",
            Category::Headphones => "Headphones",
            Category::Gaming => "Gaming",
            Category::Smartwatches => "Smartwatches",
            Category::Clothing => "Clothing",
            Category::Tvs => "TVs",
            Category::Cameras => "Cameras",
            Category::HomeKitchen => "Home & Kitchen",
            Category::Electronics => "Electronics",
            Category::Others => "Others",
        }
    }

    /// Case-insensitive lookup by display label.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL
            .into_iter()
            .find(|category| category.label().eq_ignore_ascii_case(label))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A feed entry enriched with whatever the linked page gave us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedCandidate {
    pub title: String,
    pub category: Category,
    /// Feed summary with markup stripped.
    pub summary: String,
    pub details: String,
    pub features: String,
    pub raw_price: Option<f64>,
    /// Dedup key.
    pub url: String,
}

impl ScrapedCandidate {
    /// Multi-line rendering used when presenting candidates to the completion model.
    pub fn describe(&self) -> String {
        let price = self
            .raw_price
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "Title: {}\nCategory: {}\nRaw Price: {}\nDetails: {}\nFeatures: {}\nURL: {}",
            self.title, self.category, price, self.details, self.features, self.url
        )
    }
}

/// A candidate the scanner confirmed, with a strictly positive listed price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deal {
    pub product_description: String,
    #[serde(deserialize_with = "lenient_price")]
    pub price: f64,
    pub url: String,
    #[serde(default, alias = "domain", deserialize_with = "lenient_category")]
    pub category: Category,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DealSelection {
    #[serde(default)]
    pub deals: Vec<Deal>,
}

/// A priced deal: `discount = estimate - deal.price`, negative for bad deals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub deal: Deal,
    pub estimate: f64,
    pub discount: f64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Opportunity {
    pub fn new(deal: Deal, estimate: f64) -> Self {
        let discount = estimate - deal.price;
        Self {
            deal,
            estimate,
            discount,
            created_at: Utc::now(),
        }
    }

    pub fn url(&self) -> &str {
        &self.deal.url
    }
}

/// A comparable item returned by the similarity lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparable {
    pub description: String,
    pub price: f64,
}

/// Currencies estimators may quote in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    Inr,
    Usd,
    Eur,
    Gbp,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Inr => "INR",
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Inr => "₹",
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Gbp => "£",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "INR" => Some(Currency::Inr),
            "USD" => Some(Currency::Usd),
            "EUR" => Some(Currency::Eur),
            "GBP" => Some(Currency::Gbp),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Prompt sent to the text-completion capability.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Ask the backend for JSON output when it supports a JSON mode.
    pub json_output: bool,
    pub max_tokens: Option<u32>,
}

impl CompletionRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn json(mut self) -> Self {
        self.json_output = true;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Models sometimes quote prices as text ("₹40,000"); anything unreadable becomes 0
/// and is dropped later by the positive-price check.
fn lenient_price<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PriceRepr {
        Number(f64),
        Text(String),
    }

    Ok(match PriceRepr::deserialize(deserializer)? {
        PriceRepr::Number(n) => n,
        PriceRepr::Text(s) => first_amount(&s).unwrap_or(0.0),
    })
}

/// Labels outside the fixed set fall back to `Others`; the scanner re-attaches
/// the real category from the originating candidate anyway.
fn lenient_category<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum CategoryRepr {
        Label(String),
        Other(IgnoredAny),
    }

    Ok(match CategoryRepr::deserialize(deserializer)? {
        CategoryRepr::Label(label) => Category::from_label(&label).unwrap_or_default(),
        CategoryRepr::Other(_) => Category::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opportunity_discount() {
        let deal = Deal {
            product_description: "Pixel 8".into(),
            price: 9000.0,
            url: "https://example.com/pixel".into(),
            category: Category::Mobiles,
        };
        let opp = Opportunity::new(deal, 110.0);
        assert!((opp.discount - (110.0 - 9000.0)).abs() < 1e-9);
    }

    #[test]
    fn test_deal_accepts_legacy_domain_field_and_text_price() {
        let json = r#"{"product_description":"Boat earbuds","price":"₹1,299","url":"u","domain":"Headphones"}"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.category, Category::Headphones);
        assert!((deal.price - 1299.0).abs() < 1e-9);
    }

    #[test]
    fn test_deal_category_defaults_to_others() {
        let json = r#"{"product_description":"Thing","price":10,"url":"u"}"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.category, Category::Others);
    }

    #[test]
    fn test_unknown_category_label_falls_back_to_others() {
        let json = r#"{"product_description":"Air fryer","price":4999,"url":"u","category":"Appliances"}"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.category, Category::Others);

        let json = r#"{"product_description":"Kettle","price":999,"url":"u","domain":"home & kitchen"}"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.category, Category::HomeKitchen);

        let json = r#"{"product_description":"Mug","price":99,"url":"u","category":null}"#;
        let deal: Deal = serde_json::from_str(json).unwrap();
        assert_eq!(deal.category, Category::Others);
    }

    #[test]
    fn test_category_labels_round_trip_through_serde() {
        for category in Category::ALL {
            let json = serde_json::to_string(&category).unwrap();
            assert_eq!(json, format!("\"{}\"", category.label()));
        }
    }

    #[test]
    fn test_memory_record_without_timestamp_loads() {
        let json = r#"{"deal":{"product_description":"x","price":5.0,"url":"u"},"estimate":7.0,"discount":2.0}"#;
        let opp: Opportunity = serde_json::from_str(json).unwrap();
        assert_eq!(opp.url(), "u");
    }
}
