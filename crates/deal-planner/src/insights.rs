//! Short market commentary on the most recent finds.

use deal_core::text::clean_product_name;
use deal_core::{CompletionModel, CompletionRequest, Opportunity};
use deal_memory::Memory;
use futures_util::future::join_all;
use regex::Regex;
use serde::Serialize;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static BULLET_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*•]+|\d+[.)])\s*").expect("bullet prefix pattern is valid"));

const BULLETS_PER_PRODUCT: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductInsight {
    pub title: String,
    pub url: String,
    pub bullets: Vec<String>,
}

pub struct InsightGenerator {
    completion: Arc<dyn CompletionModel>,
    timeout: Duration,
}

impl InsightGenerator {
    pub fn new(completion: Arc<dyn CompletionModel>) -> Self {
        Self {
            completion,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Insights for the last `n` items in memory, oldest first.
    pub async fn insights(&self, memory: &Memory, n: usize) -> Vec<ProductInsight> {
        let recent = memory.last(n);
        join_all(recent.iter().map(|opportunity| self.insight_for(opportunity))).await
    }

    /// A failed or empty completion yields an insight with no bullets.
    pub async fn insight_for(&self, opportunity: &Opportunity) -> ProductInsight {
        let description = &opportunity.deal.product_description;
        let request = CompletionRequest::new(prompt(description)).with_max_tokens(200);

        let bullets = match tokio::time::timeout(self.timeout, self.completion.complete(&request)).await {
            Ok(Ok(reply)) => parse_bullets(&reply),
            Ok(Err(e)) => {
                tracing::warn!("Insight generation failed for {}: {}", opportunity.url(), e);
                Vec::new()
            }
            Err(_) => {
                tracing::warn!("Insight generation timed out for {}", opportunity.url());
                Vec::new()
            }
        };

        ProductInsight {
            title: clean_product_name(description),
            url: opportunity.url().to_string(),
            bullets,
        }
    }
}

fn prompt(description: &str) -> String {
    format!(
        "Analyze why this product is a \"Top Seller\" in current market conditions.\n\
Provide 3 distinct, professional insights focusing on value proposition, competitive advantage, or consumer demand.\n\n\
Product:\n{}\n\n\
Constraints:\n\
- Return exactly 3 short, punchy bullet points.\n\
- Use professional business tone.\n\
- No introductory text (e.g. \"Here are the reasons\").",
        description
    )
}

/// Bullet text from a model reply: list markers and `**` emphasis removed,
/// lead-in lines ending in `:` skipped, at most three kept.
pub fn parse_bullets(reply: &str) -> Vec<String> {
    reply
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.ends_with(':'))
        .map(|line| BULLET_PREFIX.replace(line, "").replace("**", "").trim().to_string())
        .filter(|line| !line.is_empty())
        .take(BULLETS_PER_PRODUCT)
        .collect()
}
