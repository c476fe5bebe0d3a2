//! ContentFlow - Multi-Source Research Aggregation & Synthesis Pipeline
//!
//! Aggregates research on a topic from heterogeneous sources (academic
//! papers, web search, video), normalizes and ranks the results, synthesizes
//! key insights through a text-generation backend, and renders
//! platform-specific content drafts.
//!
//! ## Core Features
//!
//! - **Concurrent Fan-Out**: per-source and global timeouts with bulkhead
//!   isolation; one slow or failing source never sinks the rest
//! - **Deterministic Ranking**: pure normalization/dedup stage with a total
//!   order over relevance, recency, and title
//! - **Single-Flight Cache**: fingerprint-keyed freshness window with LRU
//!   eviction and optional SQLite durability
//! - **Bounded Retries**: category-aware backoff with jitter for backend
//!   calls; no placeholder fallbacks
//!
//! ## Quick Start
//!
//! ```ignore
//! use contentflow::{ConfigLoader, ContentFlow, Platform, Tone};
//!
//! let config = ConfigLoader::load()?;
//! let flow = ContentFlow::new(config)?;
//!
//! let aggregation = flow.research("rust async runtimes", &[]).await?;
//! let insights = flow.synthesize(&aggregation).await?;
//! let draft = flow
//!     .generate_content(&insights, Platform::LinkedIn, Tone::Professional)
//!     .await?;
//! ```
//!
//! ## Modules
//!
//! - [`source`]: per-source adapters with rate limiting
//! - [`dispatch`]: concurrent fan-out with timeout isolation
//! - [`normalize`]: canonicalization, dedup, scoring, ordering
//! - [`cache`]: single-flight aggregation cache
//! - [`synth`] / [`content`]: backend-driven insight and draft generation
//! - [`ai`]: text-provider abstraction and retry policy
//! - [`storage`]: SQLite persistence with connection pooling

pub mod ai;
pub mod cache;
pub mod config;
pub mod constants;
pub mod content;
pub mod dispatch;
pub mod normalize;
pub mod pipeline;
pub mod source;
pub mod storage;
pub mod synth;
pub mod types;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{
    CacheConfig, Config, ConfigLoader, ContentConfig, DispatchConfig, ScoringConfig,
    SourceSettings, SourcesConfig, SynthesisConfig,
};

// Error Types
pub use types::error::{ErrorCategory, FlowError, Result};

// Domain Types
pub use types::{
    AggregationResult, CanonicalItem, ContentDraft, InsightSet, Platform, RawSourceItem,
    SourceKind, SourceState, SourceStatus, Tone, Topic,
};

// Storage
pub use storage::{Database, PoolConfig, SharedDatabase};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use cache::{AggregationCache, fingerprint};
pub use content::ContentGenerator;
pub use dispatch::Dispatcher;
pub use normalize::Normalizer;
pub use pipeline::ContentFlow;
pub use source::{ArxivAdapter, SharedAdapter, SourceAdapter, VideoSearchAdapter, WebSearchAdapter};
pub use synth::InsightSynthesizer;

// =============================================================================
// AI Re-exports
// =============================================================================

pub use ai::{
    OpenRouterProvider, ProviderConfig, RetryExhausted, RetryPolicy, SharedProvider, TextProvider,
    create_provider, extract_json_from_response,
};
