mod discord;
mod smtp;
mod templates;

pub use discord::DiscordWebhookNotifier;
pub use smtp::SmtpNotifier;
pub use templates::EmailTemplate;

use async_trait::async_trait;
use futures_util::future::join_all;
use deal_core::text::{clean_product_name, competitor_domain, truncate_chars};
use deal_core::{AlertSink, Category, Currency, DealError, Opportunity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Alert types that trigger notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AlertType {
    DealFound {
        product: String,
        category: Category,
        price: f64,
        estimate: f64,
        discount: f64,
        /// Currency of price, estimate and discount.
        currency: Currency,
        url: String,
        /// Listing host without `www.`
        competitor: String,
    },
}

/// A notification alert to be dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub alert_type: AlertType,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub title: String,
    pub message: String,
}

impl Alert {
    pub fn new(
        alert_type: AlertType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            alert_type,
            timestamp: chrono::Utc::now(),
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn from_opportunity(opportunity: &Opportunity, currency: Currency) -> Self {
        let deal = &opportunity.deal;
        let competitor = competitor_domain(&deal.url);
        let title = format!(
            "High Value Deal Alert: {}",
            truncate_chars(&clean_product_name(&deal.product_description), 40)
        );
        let message = format!(
            "{} on {} is listed at {}{:.2} against an estimated {}{:.2}",
            deal.category,
            competitor,
            currency.symbol(),
            deal.price,
            currency.symbol(),
            opportunity.estimate
        );

        Self::new(
            AlertType::DealFound {
                product: deal.product_description.clone(),
                category: deal.category,
                price: deal.price,
                estimate: opportunity.estimate,
                discount: opportunity.discount,
                currency,
                url: deal.url.clone(),
                competitor,
            },
            title,
            message,
        )
    }
}

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError>;
    fn name(&self) -> &str;
}

/// Errors from the notification system.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("SMTP error: {0}")]
    Smtp(String),
    #[error("Discord webhook error: {0}")]
    Discord(String),
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Configuration for the notification service.
#[derive(Debug, Clone, Default)]
pub struct NotificationConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
    pub smtp_to: Vec<String>,
    pub smtp_tls: SmtpTls,
    pub discord_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub enum SmtpTls {
    #[default]
    StartTls,
    Tls,
    None,
}

impl NotificationConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let smtp_tls = match var("SMTP_TLS").map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("tls") => SmtpTls::Tls,
            Some("none") => SmtpTls::None,
            _ => SmtpTls::StartTls,
        };

        Self {
            smtp_host: var("SMTP_HOST"),
            smtp_port: var("SMTP_PORT").and_then(|s| s.parse().ok()).unwrap_or(587),
            smtp_username: var("SMTP_USERNAME"),
            smtp_password: var("SMTP_PASSWORD"),
            smtp_from: var("SMTP_FROM_ADDRESS"),
            smtp_to: var("NOTIFICATION_EMAIL_TO")
                .map(|list| {
                    list.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            smtp_tls,
            discord_webhook_url: var("DISCORD_WEBHOOK_URL"),
        }
    }

    pub fn email_enabled(&self) -> bool {
        self.smtp_host.is_some() && self.smtp_from.is_some() && !self.smtp_to.is_empty()
    }
}

/// Fans deal alerts out to every configured channel.
pub struct NotificationService {
    channels: Vec<Arc<dyn NotificationChannel>>,
    currency: Currency,
}

impl NotificationService {
    pub fn new(config: &NotificationConfig) -> Self {
        let email = config
            .email_enabled()
            .then(|| SmtpNotifier::new(config))
            .and_then(|built| match built {
                Ok(notifier) => {
                    tracing::info!(
                        "Email alerts enabled ({} recipients)",
                        notifier.recipients().len()
                    );
                    Some(Arc::new(notifier) as Arc<dyn NotificationChannel>)
                }
                Err(e) => {
                    tracing::warn!("Email alerts disabled: {}", e);
                    None
                }
            });

        let discord = config.discord_webhook_url.as_ref().map(|url| {
            tracing::info!("Discord webhook alerts enabled");
            Arc::new(DiscordWebhookNotifier::new(url.clone())) as Arc<dyn NotificationChannel>
        });

        let channels: Vec<_> = email.into_iter().chain(discord).collect();
        if channels.is_empty() {
            tracing::info!("No alert channels configured (set SMTP_HOST or DISCORD_WEBHOOK_URL)");
        }
        Self::with_channels(channels)
    }

    pub fn with_channels(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            currency: Currency::default(),
        }
    }

    /// Currency the alerted amounts are quoted in.
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send to all channels concurrently. Returns how many accepted the alert.
    pub async fn send_alert_async(&self, alert: &Alert) -> usize {
        let results = join_all(self.channels.iter().map(|channel| async move {
            let result = channel.send(alert).await;
            if let Err(e) = &result {
                tracing::warn!("Alert via {} failed: {}", channel.name(), e);
            }
            result.is_ok()
        }))
        .await;
        results.into_iter().filter(|delivered| *delivered).count()
    }
}

#[async_trait]
impl AlertSink for NotificationService {
    /// Fails only when channels are configured and every one of them failed.
    async fn alert(&self, opportunity: &Opportunity) -> Result<(), DealError> {
        let alert = Alert::from_opportunity(opportunity, self.currency);

        if self.channels.is_empty() {
            tracing::info!("Deal alert (no channels): {} - {}", alert.title, alert.message);
            return Ok(());
        }

        let delivered = self.send_alert_async(&alert).await;
        if delivered == 0 {
            return Err(DealError::AlertDispatchFailed(format!(
                "all {} channels failed for {}",
                self.channels.len(),
                opportunity.url()
            )));
        }
        tracing::info!(
            "Deal alert for {} delivered via {}/{} channels",
            opportunity.url(),
            delivered,
            self.channels.len()
        );
        Ok(())
    }
}
