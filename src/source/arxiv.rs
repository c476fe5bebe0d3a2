//! arXiv Adapter
//!
//! Academic paper index backed by the arXiv export API, which serves Atom XML.
//! Entries that cannot be parsed individually are skipped; the whole payload
//! failing to parse is a `SourceMalformedResponse`.

use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{RateLimiter, SourceAdapter, build_client, classify_request_error};
use crate::config::SourceSettings;
use crate::types::{FlowError, RawSourceItem, Result, SourceKind, Topic};

const DEFAULT_ENDPOINT: &str = "https://export.arxiv.org/api/query";

pub struct ArxivAdapter {
    endpoint: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl ArxivAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        Ok(Self {
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: build_client(SourceKind::Arxiv, settings.timeout_secs)?,
            limiter: RateLimiter::new(
                settings.requests_per_window,
                std::time::Duration::from_secs(settings.window_secs),
            ),
        })
    }

    fn parse_feed(&self, body: &str) -> Result<Vec<RawSourceItem>> {
        let feed: Feed = from_str(body).map_err(|e| FlowError::SourceMalformedResponse {
            kind: SourceKind::Arxiv,
            message: format!("Atom parse failed: {}", e),
        })?;

        let mut items = Vec::with_capacity(feed.entries.len());
        for entry in feed.entries {
            let title = collapse_whitespace(&entry.title);
            if title.is_empty() {
                warn!("Skipping arXiv entry with empty title");
                continue;
            }

            // Prefer the PDF link; fall back to the abstract page id
            let url = entry
                .links
                .iter()
                .find(|l| l.title.as_deref() == Some("pdf"))
                .and_then(|l| l.href.clone())
                .unwrap_or_else(|| entry.id.clone());

            let published = entry
                .published
                .as_deref()
                .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
                .map(|dt| dt.with_timezone(&Utc));

            items.push(RawSourceItem {
                kind: SourceKind::Arxiv,
                title,
                url,
                snippet: collapse_whitespace(&entry.summary),
                published,
                provider_id: Some(entry.id),
            });
        }
        Ok(items)
    }
}

#[async_trait::async_trait]
impl SourceAdapter for ArxivAdapter {
    async fn fetch(&self, topic: &Topic, max_items: usize) -> Result<Vec<RawSourceItem>> {
        self.limiter.acquire().await;

        debug!(topic = %topic, max_items, "Querying arXiv");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("search_query", format!("all:{}", topic.normalized())),
                ("max_results", max_items.to_string()),
                ("sortBy", "relevance".to_string()),
            ])
            .send()
            .await
            .map_err(|e| classify_request_error(SourceKind::Arxiv, e))?;

        if !response.status().is_success() {
            return Err(FlowError::SourceUnavailable {
                kind: SourceKind::Arxiv,
                message: format!("HTTP {}", response.status()),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(SourceKind::Arxiv, e))?;

        let mut items = self.parse_feed(&body)?;
        items.truncate(max_items);
        Ok(items)
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Arxiv
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Atom feed shapes (arXiv export API)

#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    summary: String,
    published: Option<String>,
    #[serde(rename = "link", default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@title")]
    title: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <id>http://arxiv.org/abs/2301.00001v1</id>
    <title>Quantum  Error
        Correction Advances</title>
    <summary>We present new results on surface codes.</summary>
    <published>2023-01-02T10:00:00Z</published>
    <link href="http://arxiv.org/abs/2301.00001v1" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/2301.00001v1" rel="related" type="application/pdf"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.00002v1</id>
    <title></title>
    <summary>Entry without a title is skipped.</summary>
  </entry>
</feed>"#;

    fn adapter() -> ArxivAdapter {
        ArxivAdapter::new(&crate::config::SourceSettings::default()).unwrap()
    }

    #[test]
    fn test_parse_feed() {
        let items = adapter().parse_feed(SAMPLE_FEED).unwrap();
        assert_eq!(items.len(), 1);

        let item = &items[0];
        assert_eq!(item.kind, SourceKind::Arxiv);
        assert_eq!(item.title, "Quantum Error Correction Advances");
        assert_eq!(item.url, "http://arxiv.org/pdf/2301.00001v1");
        assert!(item.published.is_some());
        assert_eq!(
            item.provider_id.as_deref(),
            Some("http://arxiv.org/abs/2301.00001v1")
        );
    }

    #[test]
    fn test_parse_empty_feed_is_not_an_error() {
        let feed = r#"<?xml version="1.0"?><feed xmlns="http://www.w3.org/2005/Atom"></feed>"#;
        let items = adapter().parse_feed(feed).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_malformed_response() {
        let err = adapter().parse_feed("this is not xml <<<").unwrap_err();
        assert!(matches!(
            err,
            FlowError::SourceMalformedResponse {
                kind: SourceKind::Arxiv,
                ..
            }
        ));
    }
}
