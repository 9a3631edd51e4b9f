use async_trait::async_trait;

use crate::{Alert, AlertType, NotificationChannel, NotificationError};

/// Discord webhook notifier.
pub struct DiscordWebhookNotifier {
    webhook_url: String,
    client: reqwest::Client,
}

impl DiscordWebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    fn payload(alert: &Alert) -> serde_json::Value {
        let AlertType::DealFound {
            product,
            category,
            price,
            estimate,
            discount,
            currency,
            url,
            competitor,
        } = &alert.alert_type;
        let symbol = currency.symbol();

        serde_json::json!({
            "embeds": [{
                "title": alert.title,
                "url": url,
                "description": product,
                "color": 0x27ae60,
                "fields": [
                    { "name": "Competitor", "value": competitor, "inline": true },
                    { "name": "Category", "value": category.label(), "inline": true },
                    { "name": "Price", "value": format!("{}{:.2}", symbol, price), "inline": true },
                    { "name": "Estimate", "value": format!("{}{:.2}", symbol, estimate), "inline": true },
                    { "name": "Gross Difference", "value": format!("{}{:.2}", symbol, discount), "inline": true },
                ],
                "timestamp": alert.timestamp.to_rfc3339(),
            }]
        })
    }
}

#[async_trait]
impl NotificationChannel for DiscordWebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        self.client
            .post(&self.webhook_url)
            .json(&Self::payload(alert))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| NotificationError::Discord(e.to_string()))?;

        Ok(())
    }

    fn name(&self) -> &str {
        "discord-webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_core::{Category, Currency, Deal, Opportunity};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alert() -> Alert {
        let opportunity = Opportunity::new(
            Deal {
                product_description: "Sony WH-1000XM5".into(),
                price: 24990.0,
                url: "https://www.amazon.in/dp/B0".into(),
                category: Category::Headphones,
            },
            34990.0,
        );
        Alert::from_opportunity(&opportunity, Currency::Inr)
    }

    #[tokio::test]
    async fn test_posts_embed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "embeds": [{ "url": "https://www.amazon.in/dp/B0", "description": "Sony WH-1000XM5" }]
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = DiscordWebhookNotifier::new(format!("{}/hook", server.uri()));
        notifier.send(&alert()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejected_webhook_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let notifier = DiscordWebhookNotifier::new(format!("{}/hook", server.uri()));
        assert!(matches!(
            notifier.send(&alert()).await,
            Err(NotificationError::Discord(_))
        ));
    }
}
