//! Web Search Adapter
//!
//! General web search against a SearxNG-compatible JSON endpoint.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use super::{RateLimiter, SourceAdapter, build_client, classify_request_error};
use crate::config::SourceSettings;
use crate::types::{FlowError, RawSourceItem, Result, SourceKind, Topic};

const DEFAULT_ENDPOINT: &str = "https://searx.be/search";

pub struct WebSearchAdapter {
    endpoint: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl WebSearchAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        Ok(Self {
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: build_client(SourceKind::Web, settings.timeout_secs)?,
            limiter: RateLimiter::new(
                settings.requests_per_window,
                std::time::Duration::from_secs(settings.window_secs),
            ),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for WebSearchAdapter {
    async fn fetch(&self, topic: &Topic, max_items: usize) -> Result<Vec<RawSourceItem>> {
        self.limiter.acquire().await;

        debug!(topic = %topic, max_items, "Querying web search");

        let response = search(
            &self.client,
            &self.endpoint,
            topic.normalized(),
            SourceKind::Web,
        )
        .await?;

        Ok(into_items(response, SourceKind::Web, max_items))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Web
    }
}

/// Issue one search call and parse the JSON payload.
/// Shared with the video adapter, which scopes its query by site.
pub(crate) async fn search(
    client: &reqwest::Client,
    endpoint: &str,
    query: &str,
    kind: SourceKind,
) -> Result<SearchResponse> {
    let response = client
        .get(endpoint)
        .query(&[("q", query), ("format", "json")])
        .send()
        .await
        .map_err(|e| classify_request_error(kind, e))?;

    if !response.status().is_success() {
        return Err(FlowError::SourceUnavailable {
            kind,
            message: format!("HTTP {}", response.status()),
        });
    }

    response
        .json::<SearchResponse>()
        .await
        .map_err(|e| FlowError::SourceMalformedResponse {
            kind,
            message: e.to_string(),
        })
}

/// Convert search hits into raw items, dropping hits without title or URL
pub(crate) fn into_items(
    response: SearchResponse,
    kind: SourceKind,
    max_items: usize,
) -> Vec<RawSourceItem> {
    response
        .results
        .into_iter()
        .filter(|r| !r.title.trim().is_empty() && !r.url.trim().is_empty())
        .take(max_items)
        .map(|r| RawSourceItem {
            kind,
            title: r.title.trim().to_string(),
            url: r.url.trim().to_string(),
            snippet: r.content.trim().to_string(),
            published: r
                .published_date
                .as_deref()
                .and_then(|p| DateTime::parse_from_rfc3339(p).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            provider_id: None,
        })
        .collect()
}

// SearxNG-compatible response shapes

#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchHit {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
}
