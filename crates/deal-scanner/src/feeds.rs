//! RSS 2.0 and Atom feed sources.

use async_trait::async_trait;
use deal_core::{DealError, FeedSource, RawEntry};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::time::Duration;

/// Indian deal feeds scanned when no `DEAL_FEEDS` override is configured.
pub const DEFAULT_FEEDS: &[&str] = &[
    "https://www.desidime.com/deals.rss",
    "https://www.desidime.com/stores/amazon-india.rss",
    "https://www.desidime.com/stores/flipkart.rss",
    "https://www.desidime.com/stores/reliance-digital.rss",
    "https://www.desidime.com/stores/tata-cliq.rss",
    "https://www.desidime.com/stores/croma.rss",
    "https://www.desidime.com/stores/ajio.rss",
    "https://www.desidime.com/stores/myntra.rss",
    "https://www.desidime.com/stores/nykaa.rss",
    "https://www.reddit.com/r/indiandeals/.rss",
    "https://www.reddit.com/r/IndianGaming/.rss",
    "https://www.reddit.com/r/buildapcsalesindia/.rss",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Summary,
    Content,
    Link,
}

#[derive(Default)]
struct EntryBuilder {
    title: String,
    summary: String,
    content: String,
    link: String,
}

impl EntryBuilder {
    fn push_text(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Summary => &mut self.summary,
            Field::Content => &mut self.content,
            Field::Link => &mut self.link,
        };
        target.push_str(text);
    }

    fn build(self, source: &str) -> Option<RawEntry> {
        let link = self.link.trim().to_string();
        if link.is_empty() {
            return None;
        }
        let summary = if self.summary.trim().is_empty() {
            self.content
        } else {
            self.summary
        };
        Some(RawEntry {
            title: self.title.trim().to_string(),
            summary,
            link,
            source: source.to_string(),
        })
    }
}

fn field_for(local_name: &[u8]) -> Option<Field> {
    match local_name {
        b"title" => Some(Field::Title),
        b"description" | b"summary" => Some(Field::Summary),
        b"content" | b"encoded" => Some(Field::Content),
        b"link" => Some(Field::Link),
        _ => None,
    }
}

/// Atom links carry the URL in `href`; only alternate (or unqualified) links count.
fn atom_href(e: &BytesStart) -> Option<String> {
    let mut href = None;
    let mut rel = None;
    for attr in e.attributes().flatten() {
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| String::from_utf8_lossy(&attr.value).into_owned());
        match attr.key.local_name().as_ref() {
            b"href" => href = Some(value),
            b"rel" => rel = Some(value),
            _ => {}
        }
    }
    match rel.as_deref() {
        None | Some("alternate") => href,
        _ => None,
    }
}

/// Parse an RSS or Atom document into entries. Entries without a link are skipped.
///
/// A document that breaks part-way still yields the entries read before the
/// error; only a document with nothing usable is an error.
pub fn parse_feed(xml: &str, source: &str) -> Result<Vec<RawEntry>, DealError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut entries = Vec::new();
    let mut current: Option<EntryBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name();
                match name.as_ref() {
                    b"item" | b"entry" => {
                        current = Some(EntryBuilder::default());
                        field = None;
                    }
                    other => {
                        if let Some(entry) = current.as_mut() {
                            field = field_for(other);
                            if field == Some(Field::Link) {
                                if let Some(href) = atom_href(&e) {
                                    entry.link = href;
                                    field = None;
                                }
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                if let Some(entry) = current.as_mut() {
                    if e.local_name().as_ref() == b"link" && entry.link.is_empty() {
                        if let Some(href) = atom_href(&e) {
                            entry.link = href;
                        }
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    let text = e
                        .unescape()
                        .map(|t| t.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&e).into_owned());
                    entry.push_text(f, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(entry), Some(f)) = (current.as_mut(), field) {
                    entry.push_text(f, &String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Ok(Event::End(e)) => {
                field = None;
                if matches!(e.local_name().as_ref(), b"item" | b"entry") {
                    if let Some(entry) = current.take().and_then(|b| b.build(source)) {
                        entries.push(entry);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                if entries.is_empty() {
                    return Err(DealError::SourceUnavailable(format!(
                        "{}: feed parse error: {}",
                        source, e
                    )));
                }
                tracing::warn!("Feed {} truncated after {} entries: {}", source, entries.len(), e);
                break;
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(entries)
}

/// A feed fetched over HTTP on every scan.
pub struct HttpFeedSource {
    client: reqwest::Client,
    url: String,
}

impl HttpFeedSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, DealError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0")
            .build()
            .map_err(|e| DealError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_entries(&self) -> Result<Vec<RawEntry>, DealError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| DealError::SourceUnavailable(format!("{}: {}", self.url, e)))?;

        if !response.status().is_success() {
            return Err(DealError::SourceUnavailable(format!(
                "{}: Status: {}",
                self.url,
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DealError::SourceUnavailable(format!("{}: {}", self.url, e)))?;

        let entries = parse_feed(&body, &self.url)?;
        tracing::debug!("Feed {} returned {} entries", self.url, entries.len());
        Ok(entries)
    }

    fn id(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>DesiDime Deals</title>
    <link>https://www.desidime.com</link>
    <item>
      <title>Redmi Note 13 5G at ₹14,999</title>
      <link>https://www.desidime.com/deals/redmi-note-13</link>
      <description><![CDATA[<div class="snippet summary">Lowest price <b>ever</b></div>]]></description>
    </item>
    <item>
      <title>Boat Airdopes &amp; charger combo</title>
      <link>https://www.desidime.com/deals/boat-combo</link>
      <description>&lt;p&gt;Rs. 999 only&lt;/p&gt;</description>
    </item>
  </channel>
</rss>"#;

    const ATOM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>r/indiandeals</title>
  <link rel="self" href="https://www.reddit.com/r/indiandeals/.rss"/>
  <entry>
    <title>[Amazon] Sony WH-1000XM5 for INR 24,990</title>
    <link rel="alternate" href="https://www.reddit.com/r/indiandeals/comments/abc/"/>
    <content type="html">&lt;div&gt;Great noise cancelling&lt;/div&gt;</content>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_rss_items() {
        let entries = parse_feed(RSS, "desidime").unwrap();
        assert_eq!(entries.len(), 2);

        assert_eq!(entries[0].title, "Redmi Note 13 5G at ₹14,999");
        assert_eq!(entries[0].link, "https://www.desidime.com/deals/redmi-note-13");
        assert!(entries[0].summary.contains("snippet summary"));
        assert_eq!(entries[0].source, "desidime");

        assert_eq!(entries[1].title, "Boat Airdopes & charger combo");
        assert_eq!(entries[1].summary, "<p>Rs. 999 only</p>");
    }

    #[test]
    fn test_parse_atom_entries() {
        let entries = parse_feed(ATOM, "reddit").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].link, "https://www.reddit.com/r/indiandeals/comments/abc/");
        // Atom content stands in for the missing summary.
        assert_eq!(entries[0].summary, "<div>Great noise cancelling</div>");
    }

    #[test]
    fn test_entries_without_link_are_skipped() {
        let xml = r#"<rss><channel><item><title>No link</title></item></channel></rss>"#;
        assert!(parse_feed(xml, "x").unwrap().is_empty());
    }

    #[test]
    fn test_broken_document_is_source_unavailable() {
        let xml = "<rss><channel><item><title>oops</wrong>";
        assert!(matches!(
            parse_feed(xml, "x"),
            Err(DealError::SourceUnavailable(_))
        ));
    }
}
