//! Small text helpers shared by the scanner, the estimators and the alert templates.

use regex::Regex;
use std::sync::LazyLock;

static AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.\d+|\d+").expect("amount pattern is valid"));

/// Collapse runs of whitespace (including newlines) into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First number in free text, after dropping currency symbols and thousands separators.
///
/// `"Price is ₹1,299.50 today"` → `Some(1299.5)`.
pub fn first_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | '₹' | '€' | '£' | ','))
        .collect();
    AMOUNT
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Brand + model style name: alphanumerics only, first seven words.
pub fn clean_product_name(text: &str) -> String {
    let spaced: String = text
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    spaced.split_whitespace().take(7).collect::<Vec<_>>().join(" ")
}

/// Truncate to `max` characters, appending "..." when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Host of a listing URL without a leading `www.`, used as the "competitor" label.
pub fn competitor_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
        .unwrap_or_else(|| "Unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_amount_strips_symbols_and_separators() {
        assert_eq!(first_amount("Price is ₹1,299.50 today"), Some(1299.5));
        assert_eq!(first_amount("$ 120"), Some(120.0));
        assert_eq!(first_amount("around 84.99 dollars"), Some(84.99));
    }

    #[test]
    fn test_first_amount_none_without_digits() {
        assert_eq!(first_amount("I cannot estimate this"), None);
    }

    #[test]
    fn test_clean_product_name_keeps_seven_words() {
        let name = clean_product_name("Samsung Galaxy S23 (8GB/256GB) - Phantom Black, 5G, 50MP camera");
        assert_eq!(name, "Samsung Galaxy S23 8GB 256GB Phantom Black");
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_competitor_domain() {
        assert_eq!(competitor_domain("https://www.amazon.in/dp/B0"), "amazon.in");
        assert_eq!(competitor_domain("not a url"), "Unknown");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \n\t b  c "), "a b c");
    }
}
