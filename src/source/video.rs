//! Video Search Adapter
//!
//! Video index implemented as a site-scoped web search (`site:youtube.com`),
//! matching how the upstream service resolves video results without a
//! dedicated video API key.

use tracing::debug;

use super::web::{into_items, search};
use super::{RateLimiter, SourceAdapter, build_client};
use crate::config::SourceSettings;
use crate::types::{RawSourceItem, Result, SourceKind, Topic};

const DEFAULT_ENDPOINT: &str = "https://searx.be/search";
const VIDEO_SITE: &str = "youtube.com";

pub struct VideoSearchAdapter {
    endpoint: String,
    client: reqwest::Client,
    limiter: RateLimiter,
}

impl VideoSearchAdapter {
    pub fn new(settings: &SourceSettings) -> Result<Self> {
        Ok(Self {
            endpoint: settings
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            client: build_client(SourceKind::Video, settings.timeout_secs)?,
            limiter: RateLimiter::new(
                settings.requests_per_window,
                std::time::Duration::from_secs(settings.window_secs),
            ),
        })
    }
}

#[async_trait::async_trait]
impl SourceAdapter for VideoSearchAdapter {
    async fn fetch(&self, topic: &Topic, max_items: usize) -> Result<Vec<RawSourceItem>> {
        self.limiter.acquire().await;

        let query = format!("site:{} {}", VIDEO_SITE, topic.normalized());
        debug!(topic = %topic, max_items, "Querying video search");

        let response = search(&self.client, &self.endpoint, &query, SourceKind::Video).await?;

        Ok(into_items(response, SourceKind::Video, max_items))
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Video
    }
}
