//! Configuration Types
//!
//! Typed configuration for every component, constructed once and passed by
//! reference at construction time. No ambient/global lookup at call sites.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::ai::ProviderConfig;
use crate::constants;
use crate::types::{FlowError, Result, SourceKind};

// =============================================================================
// Root Config
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub sources: SourcesConfig,
    pub dispatch: DispatchConfig,
    pub scoring: ScoringConfig,
    pub cache: CacheConfig,
    pub synthesis: SynthesisConfig,
    pub content: ContentConfig,
    pub provider: ProviderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            sources: SourcesConfig::default(),
            dispatch: DispatchConfig::default(),
            scoring: ScoringConfig::default(),
            cache: CacheConfig::default(),
            synthesis: SynthesisConfig::default(),
            content: ContentConfig::default(),
            provider: ProviderConfig::default(),
        }
    }
}

impl Config {
    /// Validate cross-field invariants after loading
    pub fn validate(&self) -> Result<()> {
        self.scoring.validate()?;
        self.synthesis.validate()?;
        if self.dispatch.global_timeout_secs == 0 {
            return Err(FlowError::Config(
                "dispatch.global_timeout_secs must be positive".to_string(),
            ));
        }
        if self.cache.max_entries == 0 {
            return Err(FlowError::Config(
                "cache.max_entries must be positive".to_string(),
            ));
        }
        for kind in SourceKind::all() {
            let s = self.sources.get(kind);
            if s.enabled && s.requests_per_window == 0 {
                return Err(FlowError::Config(format!(
                    "sources.{}.requests_per_window must be positive",
                    kind
                )));
            }
        }
        Ok(())
    }

    /// Source kinds currently enabled
    pub fn enabled_sources(&self) -> Vec<SourceKind> {
        SourceKind::all()
            .into_iter()
            .filter(|k| self.sources.get(*k).enabled)
            .collect()
    }
}

// =============================================================================
// Sources
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub arxiv: SourceSettings,
    pub web: SourceSettings,
    pub video: SourceSettings,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            // arXiv asks clients to stay under one request per three seconds
            arxiv: SourceSettings {
                requests_per_window: constants::rate_limit::ARXIV_REQUESTS_PER_WINDOW,
                window_secs: constants::rate_limit::ARXIV_WINDOW_SECS,
                prior_weight: constants::scoring::ARXIV_PRIOR,
                ..SourceSettings::default()
            },
            web: SourceSettings::default(),
            video: SourceSettings {
                prior_weight: constants::scoring::VIDEO_PRIOR,
                ..SourceSettings::default()
            },
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, kind: SourceKind) -> &SourceSettings {
        match kind {
            SourceKind::Arxiv => &self.arxiv,
            SourceKind::Web => &self.web,
            SourceKind::Video => &self.video,
        }
    }
}

/// Per-source adapter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub enabled: bool,
    /// Override for the provider base URL
    pub endpoint: Option<String>,
    /// Maximum items requested per fetch
    pub max_items: usize,
    /// Adapter-specific request timeout (seconds)
    pub timeout_secs: u64,
    /// Requests admitted per rate-limit window
    pub requests_per_window: u32,
    /// Rate-limit window length (seconds)
    pub window_secs: u64,
    /// Source-kind prior weight used in relevance scoring
    pub prior_weight: f64,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: None,
            max_items: constants::dispatch::DEFAULT_MAX_ITEMS,
            timeout_secs: constants::dispatch::PER_SOURCE_TIMEOUT_SECS,
            requests_per_window: constants::rate_limit::DEFAULT_REQUESTS_PER_WINDOW,
            window_secs: constants::rate_limit::DEFAULT_WINDOW_SECS,
            prior_weight: constants::scoring::WEB_PRIOR,
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Per-source fetch timeout (seconds)
    pub per_source_timeout_secs: u64,
    /// Wall-time budget for one aggregation call (seconds)
    pub global_timeout_secs: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            per_source_timeout_secs: constants::dispatch::PER_SOURCE_TIMEOUT_SECS,
            global_timeout_secs: constants::dispatch::GLOBAL_TIMEOUT_SECS,
        }
    }
}

impl DispatchConfig {
    pub fn per_source_timeout(&self) -> Duration {
        Duration::from_secs(self.per_source_timeout_secs)
    }

    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_secs)
    }
}

// =============================================================================
// Scoring
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Title similarity above which two items are duplicates, in (0, 1]
    pub similarity_threshold: f64,
    /// Recency half-life in days
    pub recency_half_life_days: f64,
    /// Weight of topic term overlap in relevance
    pub term_weight: f64,
    /// Weight of the source-kind prior in relevance
    pub prior_weight: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: constants::scoring::SIMILARITY_THRESHOLD,
            recency_half_life_days: constants::scoring::RECENCY_HALF_LIFE_DAYS,
            term_weight: constants::scoring::TERM_WEIGHT,
            prior_weight: constants::scoring::PRIOR_WEIGHT,
        }
    }
}

impl ScoringConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(FlowError::Config(
                "scoring.similarity_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.recency_half_life_days <= 0.0 {
            return Err(FlowError::Config(
                "scoring.recency_half_life_days must be positive".to_string(),
            ));
        }
        if self.term_weight < 0.0
            || self.prior_weight < 0.0
            || self.term_weight + self.prior_weight <= 0.0
        {
            return Err(FlowError::Config(
                "scoring weights must be non-negative with a positive sum".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum age of a cached aggregation (seconds)
    pub freshness_secs: u64,
    /// Maximum entries before LRU eviction
    pub max_entries: usize,
    /// SQLite file for durable backing; in-memory only when unset
    pub db_path: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            freshness_secs: constants::cache::DEFAULT_FRESHNESS_SECS,
            max_entries: constants::cache::MAX_ENTRIES,
            db_path: None,
        }
    }
}

impl CacheConfig {
    pub fn freshness_window(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

// =============================================================================
// Synthesis
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Maximum backend attempts per call
    pub max_attempts: u32,
    /// Base delay for exponential backoff (milliseconds)
    pub base_delay_ms: u64,
    /// Backoff ceiling (seconds)
    pub max_delay_secs: u64,
    /// Backoff multiplier
    pub backoff_factor: f32,
    /// Highest-ranked items included in the request
    pub max_context_items: usize,
    pub min_insights: usize,
    pub max_insights: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::retry::MAX_ATTEMPTS,
            base_delay_ms: constants::retry::BASE_DELAY_MS,
            max_delay_secs: constants::retry::MAX_DELAY_SECS,
            backoff_factor: constants::retry::BACKOFF_FACTOR,
            max_context_items: constants::synthesis::MAX_CONTEXT_ITEMS,
            min_insights: constants::synthesis::MIN_INSIGHTS,
            max_insights: constants::synthesis::MAX_INSIGHTS,
        }
    }
}

impl SynthesisConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(FlowError::Config(
                "synthesis.max_attempts must be positive".to_string(),
            ));
        }
        if self.min_insights == 0 || self.min_insights > self.max_insights {
            return Err(FlowError::Config(
                "synthesis insight bounds must satisfy 0 < min <= max".to_string(),
            ));
        }
        if self.max_context_items == 0 {
            return Err(FlowError::Config(
                "synthesis.max_context_items must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Content
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Regeneration attempts when a draft violates platform constraints
    pub max_regenerations: u32,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_regenerations: constants::content::MAX_REGENERATIONS,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
