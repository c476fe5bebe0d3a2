//! Source Adapters
//!
//! One adapter per source kind, each translating a topic into a provider
//! query, performing the network call under its own rate limit and timeout,
//! and parsing the provider payload into [`RawSourceItem`]s.
//!
//! Adapters are stateless apart from their rate limiter and safe to invoke
//! concurrently for different topics. Zero results is not an error; network
//! and auth failures surface as `SourceUnavailable`, unparseable payloads as
//! `SourceMalformedResponse`.

mod arxiv;
mod rate_limit;
mod video;
mod web;

pub use arxiv::ArxivAdapter;
pub use rate_limit::RateLimiter;
pub use video::VideoSearchAdapter;
pub use web::WebSearchAdapter;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourceSettings;
use crate::types::{FlowError, RawSourceItem, Result, SourceKind, Topic};

/// Shared adapter type for concurrent fan-out
pub type SharedAdapter = Arc<dyn SourceAdapter>;

/// A single data source
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Fetch up to `max_items` results for the topic.
    ///
    /// Returns an empty Vec for zero results; fails with
    /// [`FlowError::SourceUnavailable`] or
    /// [`FlowError::SourceMalformedResponse`] otherwise.
    async fn fetch(&self, topic: &Topic, max_items: usize) -> Result<Vec<RawSourceItem>>;

    /// Which source kind this adapter serves
    fn kind(&self) -> SourceKind;
}

/// Create an adapter for the given source kind
pub fn create_adapter(kind: SourceKind, settings: &SourceSettings) -> Result<SharedAdapter> {
    match kind {
        SourceKind::Arxiv => Ok(Arc::new(ArxivAdapter::new(settings)?)),
        SourceKind::Web => Ok(Arc::new(WebSearchAdapter::new(settings)?)),
        SourceKind::Video => Ok(Arc::new(VideoSearchAdapter::new(settings)?)),
    }
}

/// Build the HTTP client adapters share per instance
pub(crate) fn build_client(kind: SourceKind, timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .connect_timeout(Duration::from_secs(
            crate::constants::network::CONNECTION_TIMEOUT_SECS,
        ))
        .user_agent(concat!("contentflow/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| FlowError::SourceUnavailable {
            kind,
            message: format!("failed to create HTTP client: {}", e),
        })
}

/// Map a reqwest failure into the adapter error taxonomy
pub(crate) fn classify_request_error(kind: SourceKind, err: reqwest::Error) -> FlowError {
    if err.is_decode() {
        FlowError::SourceMalformedResponse {
            kind,
            message: err.to_string(),
        }
    } else {
        FlowError::SourceUnavailable {
            kind,
            message: err.to_string(),
        }
    }
}
