use anyhow::{bail, Context, Result};
use deal_core::Currency;
use deal_scanner::DEFAULT_FEEDS;
use model_client::ModelConfig;
use notification_service::NotificationConfig;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    // Scheduling
    pub scan_interval_seconds: u64,        // 300 (5 minutes)
    pub metrics_log_interval_cycles: u64,  // 6

    // Planner
    pub alert_threshold: f64,              // 50.0 in working currency
    pub deals_per_scan: usize,             // 5

    // Scanner
    pub feeds: Vec<String>,
    pub entries_per_source: usize,         // 10
    pub fetch_delay_ms: u64,               // 400
    pub page_timeout_seconds: u64,         // 10
    pub selection_timeout_seconds: u64,    // 120

    // Pricing
    pub estimator_timeout_seconds: u64,    // 60
    pub usd_to_inr: f64,                   // 83.0
    pub specialist_currency: Currency,     // USD

    // Memory
    pub memory_path: PathBuf,

    // Insights over the last N remembered items (0 disables)
    pub insights_count: usize,

    // Model services
    pub model: ModelConfig,

    // Email / Discord
    pub notifications: NotificationConfig,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?
            .with_model(ModelConfig::default());
        config.notifications = NotificationConfig::from_env();
        config.validate()?;
        Ok(config)
    }

    /// Build from any key lookup. Model and notification settings keep their
    /// defaults; [`AgentConfig::from_env`] fills them from the environment.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let specialist_code = text("SPECIALIST_CURRENCY", "USD");
        let specialist_currency = Currency::from_code(&specialist_code)
            .with_context(|| format!("SPECIALIST_CURRENCY: unsupported currency {}", specialist_code))?;

        let feeds = match lookup("DEAL_FEEDS") {
            Some(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            scan_interval_seconds: number(&lookup, "SCAN_INTERVAL", "300")?,
            metrics_log_interval_cycles: number(&lookup, "METRICS_LOG_INTERVAL", "6")?,
            alert_threshold: number(&lookup, "ALERT_THRESHOLD", "50.0")?,
            deals_per_scan: number(&lookup, "DEALS_PER_SCAN", "5")?,
            feeds,
            entries_per_source: number(&lookup, "ENTRIES_PER_SOURCE", "10")?,
            fetch_delay_ms: number(&lookup, "FETCH_DELAY_MS", "400")?,
            page_timeout_seconds: number(&lookup, "PAGE_TIMEOUT_SECS", "10")?,
            selection_timeout_seconds: number(&lookup, "SELECTION_TIMEOUT_SECS", "120")?,
            estimator_timeout_seconds: number(&lookup, "ESTIMATOR_TIMEOUT_SECS", "60")?,
            usd_to_inr: number(&lookup, "USD_TO_INR", "83.0")?,
            specialist_currency,
            memory_path: PathBuf::from(text("MEMORY_PATH", "memory.json")),
            insights_count: number(&lookup, "INSIGHTS_COUNT", "0")?,
            model: ModelConfig::default(),
            notifications: NotificationConfig::default(),
        })
    }

    /// Use `model`, raising its HTTP timeout so it never cuts a call short of
    /// the selection or estimator timeout.
    pub fn with_model(mut self, mut model: ModelConfig) -> Self {
        let longest = self
            .selection_timeout_seconds
            .max(self.estimator_timeout_seconds);
        model.timeout = model.timeout.max(Duration::from_secs(longest));
        self.model = model;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_seconds == 0 {
            bail!("SCAN_INTERVAL must be at least 1 second");
        }
        if self.deals_per_scan == 0 {
            bail!("DEALS_PER_SCAN must be at least 1");
        }
        if self.entries_per_source == 0 {
            bail!("ENTRIES_PER_SOURCE must be at least 1");
        }
        if self.feeds.is_empty() {
            bail!("DEAL_FEEDS lists no feeds");
        }
        if !self.alert_threshold.is_finite() || self.alert_threshold < 0.0 {
            bail!("ALERT_THRESHOLD must be a non-negative number");
        }
        if !self.usd_to_inr.is_finite() || self.usd_to_inr <= 0.0 {
            bail!("USD_TO_INR must be positive");
        }
        Ok(())
    }
}

fn number<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .unwrap_or_else(|| default.to_string())
        .trim()
        .parse()
        .with_context(|| format!("{} is not a valid number", key))
}
