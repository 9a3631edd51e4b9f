//! The independent pricing strategies combined by the ensemble.

use async_trait::async_trait;
use deal_core::text::first_amount;
use deal_core::{
    Comparable, CompletionModel, CompletionRequest, Currency, DealError, PriceEstimator,
    SimilarityIndex,
};
use model_client::SpecialistClient;
use std::sync::Arc;

/// Comparables fetched for grounding.
const NEIGHBOURS: usize = 5;

const FRONTIER_SYSTEM_PROMPT: &str =
    "You estimate prices of items. Reply only with the price, no explanation";

/// Similarity lookup for comparable items, then a completion model prices the
/// product with those comparables as context.
pub struct FrontierEstimator {
    completion: Arc<dyn CompletionModel>,
    similarity: Arc<dyn SimilarityIndex>,
    currency: Currency,
}

impl FrontierEstimator {
    /// Comparables in the similarity index are priced in dollars.
    pub fn new(completion: Arc<dyn CompletionModel>, similarity: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            completion,
            similarity,
            currency: Currency::Usd,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    fn prompt(&self, description: &str, comparables: &[Comparable]) -> String {
        let mut prompt = String::from(
            "To provide some context, here are some other items that might be similar to the item you need to estimate.\n\n",
        );
        for item in comparables {
            prompt.push_str(&format!(
                "Potentially related product:\n{}\nPrice is {}{:.2}\n\n",
                item.description,
                self.currency.symbol(),
                item.price
            ));
        }
        prompt.push_str(&format!(
            "And now the question for you:\n\nHow much does this cost?\n\n{}",
            description
        ));
        prompt
    }
}

#[async_trait]
impl PriceEstimator for FrontierEstimator {
    async fn price(&self, description: &str) -> Result<f64, DealError> {
        let comparables = match self.similarity.find_similar(description, NEIGHBOURS).await {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!("Similarity lookup failed, pricing without context: {}", e);
                Vec::new()
            }
        };

        let request = CompletionRequest::new(self.prompt(description, &comparables))
            .with_system(FRONTIER_SYSTEM_PROMPT)
            .with_max_tokens(16);
        let reply = self.completion.complete(&request).await?;

        // Unreadable replies price at zero, which the ensemble treats as an abstention.
        Ok(first_amount(&reply).unwrap_or(0.0))
    }

    fn currency(&self) -> Currency {
        self.currency
    }

    fn name(&self) -> &str {
        "frontier"
    }
}

/// The separately hosted fine-tuned pricing model.
pub struct SpecialistEstimator {
    client: SpecialistClient,
    currency: Currency,
}

impl SpecialistEstimator {
    pub fn new(client: SpecialistClient, currency: Currency) -> Self {
        Self { client, currency }
    }
}

#[async_trait]
impl PriceEstimator for SpecialistEstimator {
    async fn price(&self, description: &str) -> Result<f64, DealError> {
        Ok(self.client.price(description).await?)
    }

    fn currency(&self) -> Currency {
        self.currency
    }

    fn name(&self) -> &str {
        "specialist"
    }
}

/// Mean price of the nearest comparables. Model-free, so it keeps voting when
/// the completion backend is down.
pub struct NeighborAverageEstimator {
    similarity: Arc<dyn SimilarityIndex>,
    currency: Currency,
}

impl NeighborAverageEstimator {
    pub fn new(similarity: Arc<dyn SimilarityIndex>) -> Self {
        Self {
            similarity,
            currency: Currency::Usd,
        }
    }

    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }
}

#[async_trait]
impl PriceEstimator for NeighborAverageEstimator {
    async fn price(&self, description: &str) -> Result<f64, DealError> {
        let prices: Vec<f64> = self
            .similarity
            .find_similar(description, NEIGHBOURS)
            .await?
            .into_iter()
            .map(|c| c.price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();

        if prices.is_empty() {
            return Err(DealError::EstimatorAbstained(
                "no priced comparables".to_string(),
            ));
        }
        Ok(prices.iter().sum::<f64>() / prices.len() as f64)
    }

    fn currency(&self) -> Currency {
        self.currency
    }

    fn name(&self) -> &str {
        "neighbor_average"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FixedIndex(Result<Vec<Comparable>, ()>);

    #[async_trait]
    impl SimilarityIndex for FixedIndex {
        async fn find_similar(&self, _description: &str, k: usize) -> Result<Vec<Comparable>, DealError> {
            self.0
                .clone()
                .map(|mut items| {
                    items.truncate(k);
                    items
                })
                .map_err(|_| DealError::Http("index offline".to_string()))
        }
    }

    struct EchoModel {
        reply: String,
        last_prompt: Mutex<String>,
    }

    #[async_trait]
    impl CompletionModel for EchoModel {
        async fn complete(&self, request: &CompletionRequest) -> Result<String, DealError> {
            *self.last_prompt.lock().unwrap() = request.prompt.clone();
            Ok(self.reply.clone())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn comparables() -> Vec<Comparable> {
        vec![
            Comparable {
                description: "JBL Tune 510BT".into(),
                price: 40.0,
            },
            Comparable {
                description: "Sony WH-CH520".into(),
                price: 60.0,
            },
        ]
    }

    fn model(reply: &str) -> Arc<EchoModel> {
        Arc::new(EchoModel {
            reply: reply.to_string(),
            last_prompt: Mutex::new(String::new()),
        })
    }

    #[tokio::test]
    async fn test_frontier_parses_first_number_and_grounds_prompt() {
        let completion = model("Price is $84.99");
        let estimator = FrontierEstimator::new(
            completion.clone(),
            Arc::new(FixedIndex(Ok(comparables()))),
        );

        let price = estimator.price("Wireless over-ear headphones").await.unwrap();
        assert!((price - 84.99).abs() < 1e-9);

        let prompt = completion.last_prompt.lock().unwrap().clone();
        assert!(prompt.contains("JBL Tune 510BT\nPrice is $40.00"));
        assert!(prompt.ends_with("Wireless over-ear headphones"));
    }

    #[tokio::test]
    async fn test_frontier_unreadable_reply_is_zero() {
        let estimator = FrontierEstimator::new(
            model("I really can't say"),
            Arc::new(FixedIndex(Ok(vec![]))),
        );
        assert_eq!(estimator.price("anything").await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_frontier_survives_similarity_outage() {
        let estimator = FrontierEstimator::new(model("₹1,499"), Arc::new(FixedIndex(Err(()))))
            .with_currency(Currency::Inr);
        assert_eq!(estimator.price("anything").await.unwrap(), 1499.0);
        assert_eq!(estimator.currency(), Currency::Inr);
    }

    #[tokio::test]
    async fn test_neighbor_average() {
        let estimator = NeighborAverageEstimator::new(Arc::new(FixedIndex(Ok(comparables()))));
        assert_eq!(estimator.price("headphones").await.unwrap(), 50.0);

        let empty = NeighborAverageEstimator::new(Arc::new(FixedIndex(Ok(vec![]))));
        assert!(matches!(
            empty.price("headphones").await,
            Err(DealError::EstimatorAbstained(_))
        ));
    }
}
