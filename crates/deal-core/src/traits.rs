use async_trait::async_trait;

use crate::{
    Comparable, CompletionRequest, Currency, DealError, Opportunity, RawEntry,
};

/// A pull-based deal feed (RSS/Atom or anything that yields entries).
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self) -> Result<Vec<RawEntry>, DealError>;
    fn id(&self) -> &str;
}

/// Best-effort page download used to enrich feed entries.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, DealError>;
}

/// Opaque text-completion capability (local or hosted LLM).
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, DealError>;
    fn model_name(&self) -> &str;
}

/// Opaque nearest-neighbour lookup over previously priced items.
#[async_trait]
pub trait SimilarityIndex: Send + Sync {
    async fn find_similar(&self, description: &str, k: usize) -> Result<Vec<Comparable>, DealError>;
}

/// One independent strategy for pricing a product description.
#[async_trait]
pub trait PriceEstimator: Send + Sync {
    /// Estimated fair price, quoted in [`PriceEstimator::currency`].
    async fn price(&self, description: &str) -> Result<f64, DealError>;
    fn currency(&self) -> Currency;
    fn name(&self) -> &str;
}

/// Outbound notification for a single opportunity.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn alert(&self, opportunity: &Opportunity) -> Result<(), DealError>;
}
