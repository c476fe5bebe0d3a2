//! Global Constants
//!
//! Centralized constants for configuration defaults and tuning.

/// Retry/backoff constants for backend calls
pub mod retry {
    /// Maximum attempts per synthesis or generation call
    pub const MAX_ATTEMPTS: u32 = 4;

    /// Base delay for exponential backoff (milliseconds)
    pub const BASE_DELAY_MS: u64 = 500;

    /// Maximum delay between retries (seconds)
    pub const MAX_DELAY_SECS: u64 = 30;

    /// Backoff multiplier
    pub const BACKOFF_FACTOR: f32 = 2.0;
}

/// Dispatcher constants
pub mod dispatch {
    /// Per-source fetch timeout (seconds)
    pub const PER_SOURCE_TIMEOUT_SECS: u64 = 20;

    /// Global wall-time budget for one aggregation call (seconds)
    pub const GLOBAL_TIMEOUT_SECS: u64 = 45;

    /// Default maximum items requested from each source
    pub const DEFAULT_MAX_ITEMS: usize = 5;
}

/// Source rate-limiting defaults
pub mod rate_limit {
    /// Requests allowed per window
    pub const DEFAULT_REQUESTS_PER_WINDOW: u32 = 5;

    /// Window length (seconds)
    pub const DEFAULT_WINDOW_SECS: u64 = 10;

    /// arXiv asks for no more than one request every three seconds
    pub const ARXIV_REQUESTS_PER_WINDOW: u32 = 1;
    pub const ARXIV_WINDOW_SECS: u64 = 3;
}

/// Scoring and deduplication constants
pub mod scoring {
    /// Normalized-Levenshtein similarity above which two titles are the same item
    pub const SIMILARITY_THRESHOLD: f64 = 0.90;

    /// Recency half-life in days
    pub const RECENCY_HALF_LIFE_DAYS: f64 = 30.0;

    /// Weight of topic term overlap in the relevance score
    pub const TERM_WEIGHT: f64 = 0.7;

    /// Weight of the source-kind prior in the relevance score
    pub const PRIOR_WEIGHT: f64 = 0.3;

    /// Source-kind priors
    pub const ARXIV_PRIOR: f64 = 1.0;
    pub const WEB_PRIOR: f64 = 0.8;
    pub const VIDEO_PRIOR: f64 = 0.7;
}

/// Cache constants
pub mod cache {
    /// Maximum entries before LRU eviction
    pub const MAX_ENTRIES: usize = 256;

    /// Default freshness window (seconds)
    pub const DEFAULT_FRESHNESS_SECS: u64 = 3600;
}

/// Insight synthesis constants
pub mod synthesis {
    /// Insight count requested from the backend (original app asks for 5-7)
    pub const MIN_INSIGHTS: usize = 5;
    pub const MAX_INSIGHTS: usize = 7;

    /// Highest-ranked items included in the backend request
    pub const MAX_CONTEXT_ITEMS: usize = 10;

    /// Maximum characters per insight before it stops being "short"
    pub const MAX_INSIGHT_CHARS: usize = 300;
}

/// Content generation constants
pub mod content {
    /// Characters per Twitter thread segment
    pub const TWITTER_SEGMENT_CHARS: usize = 280;

    /// Maximum segments in a generated thread
    pub const TWITTER_MAX_SEGMENTS: usize = 10;

    pub const LINKEDIN_MAX_CHARS: usize = 3000;
    pub const INSTAGRAM_MAX_CHARS: usize = 2200;

    /// Regeneration attempts allowed when a draft violates its constraints
    pub const MAX_REGENERATIONS: u32 = 1;
}

/// HTTP/network constants
pub mod network {
    /// Default backend request timeout (seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

    /// Connection timeout (seconds)
    pub const CONNECTION_TIMEOUT_SECS: u64 = 10;
}
