use deal_core::{Currency, DealError, PriceEstimator};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::currency::CurrencyConverter;

#[derive(Debug, Clone)]
pub struct EnsembleConfig {
    /// Budget for each estimator call; expiry counts as an abstention.
    pub estimator_timeout: Duration,
    /// Estimate reported when every estimator abstains.
    pub sentinel: f64,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            estimator_timeout: Duration::from_secs(60),
            sentinel: 0.0,
        }
    }
}

/// One estimator's contribution to an ensemble estimate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "vote", rename_all = "snake_case")]
pub enum Vote {
    Counted {
        estimator: String,
        amount: f64,
        currency: Currency,
        /// `amount` in the working currency
        converted: f64,
    },
    Abstained {
        estimator: String,
        reason: String,
    },
}

impl Vote {
    pub fn estimator(&self) -> &str {
        match self {
            Vote::Counted { estimator, .. } | Vote::Abstained { estimator, .. } => estimator,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnsembleEstimate {
    /// Mean of the counted votes in the working currency, or the sentinel.
    pub amount: f64,
    pub votes: Vec<Vote>,
}

impl EnsembleEstimate {
    pub fn counted(&self) -> usize {
        self.votes
            .iter()
            .filter(|v| matches!(v, Vote::Counted { .. }))
            .count()
    }

    pub fn is_exhausted(&self) -> bool {
        self.counted() == 0
    }
}

/// Combines independent estimators into one price in the working currency.
pub struct PricingEnsemble {
    estimators: Vec<Arc<dyn PriceEstimator>>,
    converter: CurrencyConverter,
    config: EnsembleConfig,
}

impl PricingEnsemble {
    pub fn new(
        estimators: Vec<Arc<dyn PriceEstimator>>,
        converter: CurrencyConverter,
        config: EnsembleConfig,
    ) -> Self {
        Self {
            estimators,
            converter,
            config,
        }
    }

    pub fn working_currency(&self) -> Currency {
        self.converter.working()
    }

    /// Query every estimator concurrently and average the usable votes.
    ///
    /// Errors, timeouts, non-positive or non-finite results and currencies
    /// without a configured rate are abstentions. Votes are converted into the
    /// working currency before averaging. Never fails.
    pub async fn estimate(&self, description: &str) -> EnsembleEstimate {
        let calls = self.estimators.iter().map(|estimator| async move {
            let result =
                tokio::time::timeout(self.config.estimator_timeout, estimator.price(description))
                    .await;
            self.vote(estimator.as_ref(), result)
        });
        let votes = join_all(calls).await;

        let converted: Vec<f64> = votes
            .iter()
            .filter_map(|v| match v {
                Vote::Counted { converted, .. } => Some(*converted),
                Vote::Abstained { .. } => None,
            })
            .collect();

        let amount = if converted.is_empty() {
            tracing::warn!(
                "{}",
                DealError::EnsembleExhausted(format!(
                    "all {} estimators abstained",
                    self.estimators.len()
                ))
            );
            self.config.sentinel
        } else {
            converted.iter().sum::<f64>() / converted.len() as f64
        };

        tracing::info!(
            "Ensemble estimate {}{:.2} from {}/{} estimators",
            self.converter.working().symbol(),
            amount,
            converted.len(),
            self.estimators.len()
        );

        EnsembleEstimate { amount, votes }
    }

    /// Just the amount from [`PricingEnsemble::estimate`].
    pub async fn price(&self, description: &str) -> f64 {
        self.estimate(description).await.amount
    }

    fn vote(
        &self,
        estimator: &dyn PriceEstimator,
        result: Result<Result<f64, DealError>, tokio::time::error::Elapsed>,
    ) -> Vote {
        let name = estimator.name().to_string();
        let currency = estimator.currency();

        let abstain = |reason: String| {
            tracing::debug!(
                "{}",
                DealError::EstimatorAbstained(format!("{}: {}", name, reason))
            );
            Vote::Abstained {
                estimator: name.clone(),
                reason,
            }
        };

        let amount = match result {
            Err(_) => {
                return abstain(format!(
                    "timed out after {}s",
                    self.config.estimator_timeout.as_secs_f64()
                ))
            }
            Ok(Err(e)) => return abstain(e.to_string()),
            Ok(Ok(amount)) => amount,
        };

        if !amount.is_finite() || amount <= 0.0 {
            return abstain(format!("unusable estimate {}", amount));
        }

        match self.converter.convert(amount, currency) {
            Some(converted) => Vote::Counted {
                estimator: estimator.name().to_string(),
                amount,
                currency,
                converted,
            },
            None => abstain(format!("no conversion rate for {}", currency)),
        }
    }
}
