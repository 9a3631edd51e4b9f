//! Prompting the completion model to pick deals, and reading its reply.

use deal_core::json_repair::{parse_concatenated, strip_code_fences};
use deal_core::{Deal, ScrapedCandidate};
use serde_json::Value;

pub const SYSTEM_PROMPT: &str = "You identify and summarize the most promising deals from a list, \
picking those with the most detailed, high quality product descriptions and a clear price that is greater than 0. \
Respond strictly in JSON with no explanation, using this format:\n\
{\"deals\": [{\"product_description\": \"Clear description of the product in 3-4 sentences\", \"price\": 99.99, \"url\": \"the url as provided\"}]}";

/// Reply of the completion model to a selection prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    Parsed(Vec<Deal>),
    Malformed(String),
}

pub fn user_prompt(candidates: &[ScrapedCandidate], count: usize) -> String {
    let mut prompt = format!(
        "Respond with the {} most promising deals from this list. Each deal must have a clear \
listed price greater than 0; skip any deal whose price you cannot determine. \
Describe the product itself, not the terms of the deal. Copy each url exactly.\n\nDeals:\n\n",
        count
    );
    let blocks: Vec<String> = candidates.iter().map(ScrapedCandidate::describe).collect();
    prompt.push_str(&blocks.join("\n\n"));
    prompt.push_str(&format!(
        "\n\nInclude exactly {} deals, no more. Respond only with JSON.",
        count
    ));
    prompt
}

/// Read the model's deal list.
///
/// The outermost JSON object is tried first. If that fails the text is read as
/// a run of concatenated values (`{..}{..}`) and every `deals` list found is
/// merged. Individual deals that do not fit the schema are skipped.
pub fn parse_selection(raw: &str) -> SelectionOutcome {
    let text = strip_code_fences(raw);

    let values = match outermost_object(text).and_then(|s| serde_json::from_str::<Value>(s).ok()) {
        Some(value) => vec![value],
        None => parse_concatenated(text),
    };

    let mut recognised = false;
    let mut deals = Vec::new();
    for value in &values {
        if let Some(found) = deals_in(value) {
            recognised = true;
            deals.extend(found);
        }
    }

    if recognised {
        SelectionOutcome::Parsed(deals)
    } else {
        SelectionOutcome::Malformed(raw.to_string())
    }
}

fn outermost_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

fn deals_in(value: &Value) -> Option<Vec<Deal>> {
    match value {
        Value::Object(map) => match map.get("deals") {
            Some(Value::Array(items)) => Some(items.iter().filter_map(as_deal).collect()),
            Some(_) => Some(Vec::new()),
            None => as_deal(value).map(|deal| vec![deal]),
        },
        Value::Array(items) => {
            let nested: Vec<Vec<Deal>> = items.iter().filter_map(deals_in).collect();
            (!nested.is_empty()).then(|| nested.into_iter().flatten().collect())
        }
        _ => None,
    }
}

fn as_deal(value: &Value) -> Option<Deal> {
    let mut value = value.clone();
    // `domain` is an alias of `category`; serde rejects a deal carrying both.
    if let Value::Object(map) = &mut value {
        if map.contains_key("category") {
            map.remove("domain");
        }
    }
    serde_json::from_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_core::Category;

    fn parsed(outcome: SelectionOutcome) -> Vec<Deal> {
        match outcome {
            SelectionOutcome::Parsed(deals) => deals,
            SelectionOutcome::Malformed(raw) => panic!("unexpected malformed reply: {}", raw),
        }
    }

    #[test]
    fn test_plain_object() {
        let deals = parsed(parse_selection(
            r#"{"deals":[{"product_description":"Redmi Note 13","price":14999,"url":"https://a"}]}"#,
        ));
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].url, "https://a");
        assert_eq!(deals[0].category, Category::Others);
    }

    #[test]
    fn test_prose_and_fences_around_object() {
        let raw = "```json\nSure! {\"deals\":[{\"product_description\":\"x\",\"price\":\"₹1,999\",\"url\":\"u\"}]}\n```";
        let deals = parsed(parse_selection(raw));
        assert!((deals[0].price - 1999.0).abs() < 1e-9);
    }

    #[test]
    fn test_concatenated_objects_are_merged() {
        let raw = r#"{"deals":[{"product_description":"a","price":1,"url":"u1"}]}
{"deals":[{"product_description":"b","price":2,"url":"u2"}]}"#;
        let deals = parsed(parse_selection(raw));
        let urls: Vec<&str> = deals.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2"]);
    }

    #[test]
    fn test_bare_deal_objects() {
        let raw = r#"{"product_description":"a","price":1,"url":"u1"}{"product_description":"b","price":2,"url":"u2"}"#;
        assert_eq!(parsed(parse_selection(raw)).len(), 2);
    }

    #[test]
    fn test_invalid_deals_are_skipped() {
        let raw = r#"{"deals":[{"product_description":"no url","price":5},{"product_description":"ok","price":5,"url":"u"}]}"#;
        let deals = parsed(parse_selection(raw));
        assert_eq!(deals.len(), 1);
        assert_eq!(deals[0].url, "u");
    }

    #[test]
    fn test_unknown_category_label_keeps_the_deal() {
        let raw = r#"{"deals":[
            {"product_description":"Air fryer 4L","price":4999,"url":"u1","category":"Appliances"},
            {"product_description":"Earbuds","price":1299,"url":"u2","domain":"Audio"},
            {"product_description":"Jeans","price":899,"url":"u3"},
            {"product_description":"Kettle","price":999,"url":"u4","category":"Kitchen","domain":"Home"}
        ]}"#;
        let deals = parsed(parse_selection(raw));
        let urls: Vec<&str> = deals.iter().map(|d| d.url.as_str()).collect();
        assert_eq!(urls, vec!["u1", "u2", "u3", "u4"]);
        assert!(deals.iter().all(|d| d.category == Category::Others));
    }

    #[test]
    fn test_empty_deal_list_is_parsed() {
        assert_eq!(parse_selection(r#"{"deals":[]}"#), SelectionOutcome::Parsed(vec![]));
    }

    #[test]
    fn test_malformed_keeps_raw_text() {
        let raw = "I could not find any good deals today.";
        assert_eq!(parse_selection(raw), SelectionOutcome::Malformed(raw.to_string()));
        assert!(matches!(
            parse_selection(r#"{"message":"hello"}"#),
            SelectionOutcome::Malformed(_)
        ));
    }

    #[test]
    fn test_user_prompt_lists_every_candidate() {
        let candidate = ScrapedCandidate {
            title: "Pixel 8".into(),
            category: Category::Mobiles,
            summary: String::new(),
            details: "Flagship".into(),
            features: String::new(),
            raw_price: Some(52999.0),
            url: "https://p".into(),
        };
        let prompt = user_prompt(&[candidate.clone(), candidate], 5);
        assert_eq!(prompt.matches("URL: https://p").count(), 2);
        assert!(prompt.contains("exactly 5 deals"));
    }
}
