use async_trait::async_trait;
use lettre::{
    message::{Mailbox, MultiPart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::templates::EmailTemplate;
use crate::{Alert, NotificationChannel, NotificationConfig, NotificationError, SmtpTls};

/// Deal alert e-mail: one message per alert, addressed to every recipient,
/// with plain-text and HTML alternatives.
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl SmtpNotifier {
    pub fn new(config: &NotificationConfig) -> Result<Self, NotificationError> {
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_HOST not set".into()))?;
        let from: Mailbox = config
            .smtp_from
            .as_deref()
            .ok_or_else(|| NotificationError::Config("SMTP_FROM_ADDRESS not set".into()))?
            .parse()
            .map_err(|e| NotificationError::Config(format!("Invalid from address: {}", e)))?;

        let recipients = parse_recipients(&config.smtp_to);
        if recipients.is_empty() {
            return Err(NotificationError::Config(
                "No valid NOTIFICATION_EMAIL_TO addresses".into(),
            ));
        }

        Ok(Self {
            transport: build_transport(host, config)?,
            from,
            recipients,
        })
    }

    pub fn recipients(&self) -> &[Mailbox] {
        &self.recipients
    }

    fn compose(&self, alert: &Alert) -> Result<Message, NotificationError> {
        let builder = self
            .recipients
            .iter()
            .fold(Message::builder().from(self.from.clone()), |b, to| b.to(to.clone()));

        builder
            .subject(&alert.title)
            .multipart(MultiPart::alternative_plain_html(
                EmailTemplate::render_text(alert),
                EmailTemplate::render(alert),
            ))
            .map_err(|e| NotificationError::Smtp(format!("Failed to build email: {}", e)))
    }
}

fn build_transport(
    host: &str,
    config: &NotificationConfig,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
    let builder = match config.smtp_tls {
        SmtpTls::Tls => AsyncSmtpTransport::<Tokio1Executor>::relay(host),
        SmtpTls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host),
        SmtpTls::None => Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)),
    }
    .map_err(|e| NotificationError::Smtp(format!("SMTP transport error: {}", e)))?
    .port(config.smtp_port);

    let builder = match (&config.smtp_username, &config.smtp_password) {
        (Some(user), Some(pass)) => builder.credentials(Credentials::new(user.clone(), pass.clone())),
        _ => builder,
    };
    Ok(builder.build())
}

/// Unparseable addresses are dropped with a warning.
fn parse_recipients(addresses: &[String]) -> Vec<Mailbox> {
    addresses
        .iter()
        .filter_map(|addr| match addr.parse::<Mailbox>() {
            Ok(mailbox) => Some(mailbox),
            Err(e) => {
                tracing::warn!("Ignoring recipient {}: {}", addr, e);
                None
            }
        })
        .collect()
}

#[async_trait]
impl NotificationChannel for SmtpNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotificationError> {
        let email = self.compose(alert)?;
        self.transport
            .send(email)
            .await
            .map_err(|e| NotificationError::Smtp(format!("Failed to send email: {}", e)))?;
        tracing::debug!("Deal alert mailed to {} recipients", self.recipients.len());
        Ok(())
    }

    fn name(&self) -> &str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_core::{Category, Currency, Deal, Opportunity};

    fn local_config() -> NotificationConfig {
        NotificationConfig {
            smtp_host: Some("localhost".into()),
            smtp_port: 2525,
            smtp_from: Some("Deal Hunter <bot@example.com>".into()),
            smtp_to: vec![
                "me@example.com".into(),
                "not an address".into(),
                "team@example.com".into(),
            ],
            smtp_tls: SmtpTls::None,
            ..NotificationConfig::default()
        }
    }

    #[test]
    fn test_invalid_recipients_are_dropped() {
        let to = parse_recipients(&["deals@example.com".to_string(), "not an address".to_string()]);
        assert_eq!(to.len(), 1);
    }

    #[test]
    fn test_missing_host_is_config_error() {
        let config = NotificationConfig {
            smtp_host: None,
            ..local_config()
        };
        assert!(matches!(
            SmtpNotifier::new(&config),
            Err(NotificationError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_one_message_for_all_recipients() {
        let notifier = SmtpNotifier::new(&local_config()).unwrap();
        assert_eq!(notifier.recipients().len(), 2);

        let opportunity = Opportunity::new(
            Deal {
                product_description: "Sony WH-1000XM5".into(),
                price: 19990.0,
                url: "https://www.amazon.in/dp/B0B".into(),
                category: Category::Headphones,
            },
            29990.0,
        );
        let alert = Alert::from_opportunity(&opportunity, Currency::Inr);
        let raw = String::from_utf8(notifier.compose(&alert).unwrap().formatted()).unwrap();

        assert!(raw.contains("me@example.com"));
        assert!(raw.contains("team@example.com"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }
}
