use async_trait::async_trait;
use deal_core::text::truncate_chars;
use deal_core::{
    Category, CompletionModel, CompletionRequest, Deal, DealError, DealSelection, FeedSource,
    PageFetcher, ScrapedCandidate,
};
use deal_memory::Memory;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::extractor::extract_candidate;
use crate::selection::{parse_selection, user_prompt, SelectionOutcome, SYSTEM_PROMPT};

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Entries extracted per feed source per scan
    pub entries_per_source: usize,
    /// Deals the completion model is asked to confirm
    pub deals_per_scan: usize,
    /// Pause between page fetches
    pub fetch_delay: Duration,
    pub completion_timeout: Duration,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            entries_per_source: 10,
            deals_per_scan: 5,
            fetch_delay: Duration::from_millis(400),
            completion_timeout: Duration::from_secs(120),
        }
    }
}

/// Anything that can produce this cycle's confirmed deals.
#[async_trait]
pub trait DealSource: Send + Sync {
    /// `None` when there is nothing new to price this cycle.
    async fn scan(&self, memory: &Memory) -> Option<DealSelection>;
}

pub struct DealScanner {
    sources: Vec<Arc<dyn FeedSource>>,
    fetcher: Arc<dyn PageFetcher>,
    completion: Arc<dyn CompletionModel>,
    config: ScannerConfig,
}

impl DealScanner {
    pub fn new(
        sources: Vec<Arc<dyn FeedSource>>,
        fetcher: Arc<dyn PageFetcher>,
        completion: Arc<dyn CompletionModel>,
        config: ScannerConfig,
    ) -> Self {
        Self {
            sources,
            fetcher,
            completion,
            config,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Extract candidates from every source, skipping URLs already in memory or
    /// already seen this cycle. Memory is checked before the page fetch so
    /// known listings cost nothing.
    pub async fn fetch_candidates(&self, memory: &Memory) -> Vec<ScrapedCandidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        let mut fetched_any = false;

        for source in &self.sources {
            let entries = match source.fetch_entries().await {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Skipping feed {}: {}", source.id(), e);
                    continue;
                }
            };

            for entry in entries.into_iter().take(self.config.entries_per_source) {
                let url = entry.link.trim();
                if url.is_empty() || memory.has(url) || !seen.insert(url.to_string()) {
                    continue;
                }

                if fetched_any && !self.config.fetch_delay.is_zero() {
                    tokio::time::sleep(self.config.fetch_delay).await;
                }
                fetched_any = true;

                candidates.push(extract_candidate(&entry, self.fetcher.as_ref()).await);
            }
        }

        tracing::info!(
            "Scanner extracted {} new candidates from {} sources",
            candidates.len(),
            self.sources.len()
        );
        candidates
    }

    /// Ask the completion model to pick the most promising candidates.
    pub async fn select(&self, candidates: &[ScrapedCandidate]) -> Result<SelectionOutcome, DealError> {
        let request = CompletionRequest::new(user_prompt(candidates, self.config.deals_per_scan))
            .with_system(SYSTEM_PROMPT)
            .json();

        let reply = tokio::time::timeout(
            self.config.completion_timeout,
            self.completion.complete(&request),
        )
        .await
        .map_err(|_| DealError::Timeout(self.config.completion_timeout.as_secs()))??;

        Ok(parse_selection(&reply))
    }

    /// Validate the model's picks: positive price, not already in memory, one
    /// deal per URL, at most `deals_per_scan`, category taken from the
    /// originating candidate (`Others` for URLs the model made up).
    pub fn confirm(&self, deals: Vec<Deal>, candidates: &[ScrapedCandidate], memory: &Memory) -> Vec<Deal> {
        let categories: HashMap<&str, Category> = candidates
            .iter()
            .map(|c| (c.url.as_str(), c.category))
            .collect();
        let mut seen = HashSet::new();

        deals
            .into_iter()
            .map(|mut deal| {
                deal.url = deal.url.trim().to_string();
                deal
            })
            .filter(|deal| deal.price > 0.0 && deal.price.is_finite())
            .filter(|deal| !memory.has(&deal.url))
            .filter(|deal| seen.insert(deal.url.clone()))
            .take(self.config.deals_per_scan)
            .map(|mut deal| {
                deal.category = categories.get(deal.url.as_str()).copied().unwrap_or_default();
                deal
            })
            .collect()
    }
}

#[async_trait]
impl DealSource for DealScanner {
    async fn scan(&self, memory: &Memory) -> Option<DealSelection> {
        let candidates = self.fetch_candidates(memory).await;
        if candidates.is_empty() {
            tracing::info!("No new candidates this cycle");
            return None;
        }

        let deals = match self.select(&candidates).await {
            Ok(SelectionOutcome::Parsed(deals)) => deals,
            Ok(SelectionOutcome::Malformed(raw)) => {
                tracing::warn!("{}", DealError::CompletionMalformed(truncate_chars(&raw, 500)));
                return None;
            }
            Err(e) => {
                tracing::warn!("Deal selection failed: {}", e);
                return None;
            }
        };

        let proposed = deals.len();
        let deals = self.confirm(deals, &candidates, memory);
        tracing::info!(
            "Scanner confirmed {} of {} proposed deals",
            deals.len(),
            proposed
        );

        if deals.is_empty() {
            None
        } else {
            Some(DealSelection { deals })
        }
    }
}
