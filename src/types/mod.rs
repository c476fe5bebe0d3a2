//! Core Data Model
//!
//! Domain types shared across the pipeline: topics, raw and canonical items,
//! aggregation results, insight sets, and content drafts.
//!
//! Ownership follows the pipeline direction: adapters produce `RawSourceItem`s,
//! the normalizer consumes them into immutable `CanonicalItem`s, the cache owns
//! `AggregationResult`s and hands out `Arc` views.

pub mod error;

pub use error::{ErrorCategory, ErrorClassifier, FlowError, Result};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Topic
// =============================================================================

/// A research topic: the user-supplied string plus the normalized form used
/// for querying and cache fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    raw: String,
    normalized: String,
}

impl Topic {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let normalized = raw
            .trim()
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        Self { raw, normalized }
    }

    /// Original user input
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Lowercase, whitespace-collapsed form used for fingerprints and queries
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Whitespace-separated terms of the normalized topic
    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.normalized.split_whitespace()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized)
    }
}

// =============================================================================
// Sources
// =============================================================================

/// Kind of data source an item came from
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Academic paper index (arXiv)
    Arxiv,
    /// General web search
    Web,
    /// Video index
    Video,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Arxiv => "arxiv",
            Self::Web => "web",
            Self::Video => "video",
        }
    }

    pub fn all() -> [SourceKind; 3] {
        [Self::Arxiv, Self::Web, Self::Video]
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-specific payload parsed into the common shape at the adapter
/// boundary. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSourceItem {
    pub kind: SourceKind,
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub published: Option<DateTime<Utc>>,
    /// Provider-specific identifier, when the provider exposes one
    pub provider_id: Option<String>,
}

// =============================================================================
// Canonical Items
// =============================================================================

/// Deduplicated, normalized projection of one or more raw items.
/// Immutable once scored; `sources` is always non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalItem {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    /// Kind of the first contributing source
    pub kind: SourceKind,
    /// All source kinds that surfaced this item
    pub sources: BTreeSet<SourceKind>,
    /// Topic relevance in [0, 1]
    pub relevance: f64,
    /// Recency in [0, 1]; 0.0 when the publish date is unknown
    pub recency: f64,
}

impl CanonicalItem {
    /// Deterministic total order: relevance desc, recency desc, title asc.
    pub fn cmp_rank(a: &Self, b: &Self) -> std::cmp::Ordering {
        b.relevance
            .total_cmp(&a.relevance)
            .then_with(|| b.recency.total_cmp(&a.recency))
            .then_with(|| a.title.cmp(&b.title))
    }
}

// =============================================================================
// Aggregation
// =============================================================================

/// Outcome state of one source within an aggregation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    /// Source responded within budget
    Ok,
    /// Source responded, but only as the global deadline expired
    Partial,
    /// Source failed (network, auth, or malformed payload)
    Failed,
    /// Source was still pending when a timeout elapsed
    TimedOut,
}

/// Per-source status entry in an [`AggregationResult`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceStatus {
    pub state: SourceState,
    /// Number of items this source contributed
    pub items: usize,
    /// Error summary for failed or timed-out sources
    pub error: Option<String>,
}

impl SourceStatus {
    pub fn ok(items: usize) -> Self {
        Self {
            state: SourceState::Ok,
            items,
            error: None,
        }
    }

    pub fn partial(items: usize) -> Self {
        Self {
            state: SourceState::Partial,
            items,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            state: SourceState::Failed,
            items: 0,
            error: Some(error.into()),
        }
    }

    pub fn timed_out(error: impl Into<String>) -> Self {
        Self {
            state: SourceState::TimedOut,
            items: 0,
            error: Some(error.into()),
        }
    }

    /// Whether this source delivered usable items
    pub fn succeeded(&self) -> bool {
        matches!(self.state, SourceState::Ok | SourceState::Partial)
    }
}

/// Result of one aggregation call: ranked canonical items plus per-source
/// status. Items are in the deterministic total order of
/// [`CanonicalItem::cmp_rank`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Normalized topic
    pub topic: String,
    /// Canonical items, most relevant first
    pub items: Vec<CanonicalItem>,
    pub statuses: BTreeMap<SourceKind, SourceStatus>,
    pub fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl AggregationResult {
    /// Number of sources that delivered usable results
    pub fn succeeded_sources(&self) -> usize {
        self.statuses.values().filter(|s| s.succeeded()).count()
    }

    /// Whether any source delivered usable results
    pub fn is_degraded(&self) -> bool {
        self.statuses.values().any(|s| !s.succeeded())
    }
}

// =============================================================================
// Insights
// =============================================================================

/// Short list of key insights synthesized from one aggregation. Immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightSet {
    pub topic: String,
    pub insights: Vec<String>,
    /// Canonical URLs of the items that were fed to the backend
    pub provenance: Vec<String>,
}

// =============================================================================
// Content
// =============================================================================

/// Target publishing platform
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Twitter,
    LinkedIn,
    Instagram,
    Blog,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Twitter => "twitter",
            Self::LinkedIn => "linkedin",
            Self::Instagram => "instagram",
            Self::Blog => "blog",
        }
    }

    /// Maximum characters per unit (per thread segment for Twitter), if the
    /// platform imposes one
    pub fn char_limit(&self) -> Option<usize> {
        match self {
            Self::Twitter => Some(crate::constants::content::TWITTER_SEGMENT_CHARS),
            Self::LinkedIn => Some(crate::constants::content::LINKEDIN_MAX_CHARS),
            Self::Instagram => Some(crate::constants::content::INSTAGRAM_MAX_CHARS),
            Self::Blog => None,
        }
    }

    /// Whether output is a multi-segment thread
    pub fn is_threaded(&self) -> bool {
        matches!(self, Self::Twitter)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Requested voice of the generated content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Professional,
    Casual,
    Technical,
    Engaging,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Professional => "professional",
            Self::Casual => "casual",
            Self::Technical => "technical",
            Self::Engaging => "engaging",
        }
    }
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform-specific draft produced from one [`InsightSet`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDraft {
    pub platform: Platform,
    pub tone: Tone,
    pub text: String,
    /// Thread segment count (1 for single-unit platforms)
    pub segments: usize,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_normalization() {
        let topic = Topic::new("  Quantum   Computing ");
        assert_eq!(topic.raw(), "  Quantum   Computing ");
        assert_eq!(topic.normalized(), "quantum computing");
        assert_eq!(topic.terms().count(), 2);
    }

    #[test]
    fn test_source_kind_roundtrip() {
        for kind in SourceKind::all() {
            let json = serde_json::to_string(&kind).unwrap();
            let back: SourceKind = serde_json::from_str(&json).unwrap();
            assert_eq!(kind, back);
        }
    }

    #[test]
    fn test_rank_order_ties_break_by_title() {
        let base = CanonicalItem {
            title: String::new(),
            url: "https://example.com".to_string(),
            summary: String::new(),
            published: None,
            kind: SourceKind::Web,
            sources: BTreeSet::from([SourceKind::Web]),
            relevance: 0.5,
            recency: 0.5,
        };
        let a = CanonicalItem {
            title: "alpha".to_string(),
            ..base.clone()
        };
        let b = CanonicalItem {
            title: "beta".to_string(),
            ..base
        };
        assert_eq!(CanonicalItem::cmp_rank(&a, &b), std::cmp::Ordering::Less);
        assert_eq!(CanonicalItem::cmp_rank(&b, &a), std::cmp::Ordering::Greater);
    }

    #[test]
    fn test_source_status_succeeded() {
        assert!(SourceStatus::ok(3).succeeded());
        assert!(SourceStatus::partial(1).succeeded());
        assert!(!SourceStatus::failed("boom").succeeded());
        assert!(!SourceStatus::timed_out("deadline").succeeded());
    }

    #[test]
    fn test_platform_limits() {
        assert_eq!(Platform::Twitter.char_limit(), Some(280));
        assert_eq!(Platform::Blog.char_limit(), None);
        assert!(Platform::Twitter.is_threaded());
        assert!(!Platform::LinkedIn.is_threaded());
    }
}
