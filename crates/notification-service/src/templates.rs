use crate::{Alert, AlertType};

pub struct EmailTemplate;

impl EmailTemplate {
    pub fn render(alert: &Alert) -> String {
        let body_content = match &alert.alert_type {
            AlertType::DealFound {
                product,
                category,
                price,
                estimate,
                discount,
                currency,
                url,
                competitor,
            } => {
                let symbol = html_entities(currency.symbol());
                let product = escape_html(product);
                let competitor = escape_html(competitor);
                let href = escape_html(url);
                format!(
                    r#"<div style="background:#2c3e50;color:#fff;padding:12px 20px;border-radius:8px 8px 0 0;font-size:18px;font-weight:700;">High Value Deal Found!</div>
<table style="width:100%;border-collapse:collapse;">
  <tr><td style="padding:8px 12px;color:#94a3b8;">Competitor</td><td style="padding:8px 12px;font-weight:600;">{competitor}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Product</td><td style="padding:8px 12px;">{product}</td></tr>
  <tr><td style="padding:8px 12px;color:#94a3b8;">Category</td><td style="padding:8px 12px;font-weight:600;">{category}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Listed Price</td><td style="padding:8px 12px;font-weight:600;">{symbol}{price:.2}</td></tr>
  <tr><td style="padding:8px 12px;color:#94a3b8;">Estimated Value</td><td style="padding:8px 12px;font-weight:600;">{symbol}{estimate:.2}</td></tr>
  <tr style="background:#f8fafc;"><td style="padding:8px 12px;color:#94a3b8;">Gross Difference</td><td style="padding:8px 12px;font-weight:700;font-size:1.2em;color:#27ae60;">{symbol}{discount:.2}</td></tr>
</table>
<div style="padding:16px 20px;text-align:center;">
  <a href="{href}" style="background:#3498db;color:#fff;padding:10px 20px;text-decoration:none;border-radius:5px;font-weight:700;">View Deal Link</a>
</div>"#
                )
            }
        };

        format!(
            r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><meta name="viewport" content="width=device-width,initial-scale=1"></head>
<body style="margin:0;padding:0;background:#f1f5f9;font-family:Arial,sans-serif;">
<table width="100%" cellpadding="0" cellspacing="0" style="background:#f1f5f9;padding:32px 0;">
  <tr><td align="center">
    <table width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;overflow:hidden;border:1px solid #e9ecef;">
      <tr><td>
        {body_content}
      </td></tr>
      <tr><td style="padding:16px 20px;border-top:1px solid #e2e8f0;">
        <p style="margin:0;color:#94a3b8;font-size:12px;">
          {msg}
          <br>Sent at {ts} UTC
        </p>
      </td></tr>
    </table>
    <p style="color:#94a3b8;font-size:11px;margin-top:16px;">Deal Hunter Notification Service</p>
  </td></tr>
</table>
</body>
</html>"#,
            msg = escape_html(&alert.message),
            ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
        )
    }

    /// Plain-text part for mail clients that do not render HTML.
    pub fn render_text(alert: &Alert) -> String {
        match &alert.alert_type {
            AlertType::DealFound {
                product,
                category,
                price,
                estimate,
                discount,
                currency,
                url,
                competitor,
            } => format!(
                "High Value Deal Found!\n\n\
Competitor: {competitor}\n\
Product: {product}\n\
Category: {category}\n\
Listed Price: {code} {price:.2}\n\
Estimated Value: {code} {estimate:.2}\n\
Gross Difference: {code} {discount:.2}\n\n\
{url}\n\n\
Sent at {ts} UTC",
                code = currency.code(),
                ts = alert.timestamp.format("%Y-%m-%d %H:%M:%S"),
            ),
        }
    }
}

/// Product text comes from feeds and model output, so it is escaped before templating.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Non-ASCII currency symbols as numeric character references.
fn html_entities(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii() {
                c.to_string()
            } else {
                format!("&#{};", c as u32)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deal_core::{Category, Currency, Deal, Opportunity};

    #[test]
    fn test_render_deal_found() {
        let opportunity = Opportunity::new(
            Deal {
                product_description: "Samsung 55\" <Crystal> 4K TV".into(),
                price: 37990.0,
                url: "https://www.croma.com/samsung-55?ref=a&b=c".into(),
                category: Category::Tvs,
            },
            62990.0,
        );
        let alert = Alert::from_opportunity(&opportunity, Currency::Inr);

        let html = EmailTemplate::render(&alert);
        assert!(html.contains("croma.com"));
        assert!(html.contains("Samsung 55&quot; &lt;Crystal&gt; 4K TV"));
        assert!(html.contains("Gross Difference"));
        assert!(html.contains("&#8377;25000.00"));
        assert!(html.contains("&#8377;37990.00"));
        assert!(html.contains(r#"href="https://www.croma.com/samsung-55?ref=a&amp;b=c""#));
        assert!(html.contains("TVs"));

        let text = EmailTemplate::render_text(&alert);
        assert!(text.contains("Competitor: croma.com"));
        assert!(text.contains("Gross Difference: INR 25000.00"));
        assert!(text.contains("https://www.croma.com/samsung-55?ref=a&b=c"));

        let euro = EmailTemplate::render(&Alert::from_opportunity(&opportunity, Currency::Eur));
        assert!(euro.contains("&#8364;25000.00"));
    }
}
