//! Unified Error Type System
//!
//! Centralized error types for the whole pipeline, with category-based
//! classification for retry decisions.
//!
//! ## Design Principles
//!
//! - Single unified error type (`FlowError`) for the entire crate
//! - Adapter failures are recovered into per-source status entries by the
//!   dispatcher and never reach `aggregate`'s caller directly
//! - `FlowError` is `Clone` (underlying errors are stringified) so the cache's
//!   single-flight guard can hand the same failure to every waiting caller

use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

use super::{Platform, SourceKind, SourceStatus};

// =============================================================================
// Error Categories
// =============================================================================

/// Error categories for retry decisions on backend calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rate limited - wait then retry
    RateLimit,
    /// Authentication failed - fail fast, don't retry
    Auth,
    /// Network/connectivity issues - retry with backoff
    Network,
    /// Temporary server issues - retry
    Transient,
    /// Response could not be parsed or failed shape validation - retry
    ParseError,
    /// Invalid request - don't retry, fix request
    BadRequest,
    /// Unknown error - conservative retry
    Unknown,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimit => write!(f, "RATE_LIMIT"),
            Self::Auth => write!(f, "AUTH"),
            Self::Network => write!(f, "NETWORK"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::ParseError => write!(f, "PARSE_ERROR"),
            Self::BadRequest => write!(f, "BAD_REQUEST"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl ErrorCategory {
    /// Check if this category is worth retrying on the same backend
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::Network | Self::Transient | Self::ParseError | Self::Unknown
        )
    }

    /// Recommended delay before the next attempt
    pub fn recommended_delay(&self) -> Duration {
        match self {
            Self::RateLimit => Duration::from_secs(30),
            Self::Network => Duration::from_secs(5),
            Self::Transient => Duration::from_secs(2),
            Self::ParseError => Duration::from_secs(1),
            _ => Duration::from_millis(500),
        }
    }
}

// =============================================================================
// Error Classifier
// =============================================================================

/// Classifies backend error messages into categories
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an error message from any backend
    pub fn classify(message: &str) -> ErrorCategory {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("429")
            || lower.contains("too many requests")
            || lower.contains("quota exceeded")
        {
            return ErrorCategory::RateLimit;
        }

        if lower.contains("auth")
            || lower.contains("401")
            || lower.contains("403")
            || lower.contains("api key")
            || lower.contains("unauthorized")
            || lower.contains("permission denied")
        {
            return ErrorCategory::Auth;
        }

        if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("timeout")
            || lower.contains("timed out")
            || lower.contains("unreachable")
        {
            return ErrorCategory::Network;
        }

        if lower.contains("500")
            || lower.contains("502")
            || lower.contains("503")
            || lower.contains("504")
            || lower.contains("server error")
            || lower.contains("overloaded")
            || lower.contains("temporary")
        {
            return ErrorCategory::Transient;
        }

        if lower.contains("parse")
            || lower.contains("json")
            || lower.contains("validation")
            || lower.contains("unexpected token")
        {
            return ErrorCategory::ParseError;
        }

        if lower.contains("400") || lower.contains("bad request") || lower.contains("invalid") {
            return ErrorCategory::BadRequest;
        }

        ErrorCategory::Unknown
    }

    /// Classify an HTTP status code directly (more accurate than string matching)
    pub fn classify_http_status(status: u16) -> ErrorCategory {
        match status {
            429 => ErrorCategory::RateLimit,
            401 | 403 => ErrorCategory::Auth,
            400 | 404 | 422 => ErrorCategory::BadRequest,
            500 | 502 | 503 | 504 => ErrorCategory::Transient,
            _ => ErrorCategory::Unknown,
        }
    }
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Clone, Error)]
pub enum FlowError {
    // -------------------------------------------------------------------------
    // Source Errors (recovered into SourceStatus by the dispatcher)
    // -------------------------------------------------------------------------
    #[error("source {kind} unavailable: {message}")]
    SourceUnavailable { kind: SourceKind, message: String },

    #[error("source {kind} returned a malformed response: {message}")]
    SourceMalformedResponse { kind: SourceKind, message: String },

    // -------------------------------------------------------------------------
    // Aggregation Errors (surfaced to the caller)
    // -------------------------------------------------------------------------
    #[error("all sources failed for topic '{topic}'")]
    AllSourcesFailed {
        topic: String,
        statuses: BTreeMap<SourceKind, SourceStatus>,
    },

    // -------------------------------------------------------------------------
    // Generation Errors (surfaced after retries are exhausted)
    // -------------------------------------------------------------------------
    #[error("synthesis failed after {attempts} attempts: {last_error}")]
    SynthesisFailed { attempts: u32, last_error: String },

    #[error("{platform} content exceeds limit: {actual} > {limit} chars")]
    ContentTooLong {
        platform: Platform,
        limit: usize,
        actual: usize,
    },

    // -------------------------------------------------------------------------
    // Infrastructure Errors
    // -------------------------------------------------------------------------
    /// Text-generation backend error. The message carries HTTP status and
    /// body context so classification stays accurate.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("JSON error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Json(err.to_string())
    }
}

impl From<rusqlite::Error> for FlowError {
    fn from(err: rusqlite::Error) -> Self {
        FlowError::Storage(err.to_string())
    }
}

impl From<r2d2::Error> for FlowError {
    fn from(err: r2d2::Error) -> Self {
        FlowError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;

impl FlowError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a backend error from an HTTP failure, keeping the status in the
    /// message for the classifier
    pub fn backend_http(status: u16, body: impl AsRef<str>) -> Self {
        Self::Backend(format!("HTTP {}: {}", status, body.as_ref()))
    }

    /// Category of this error for retry decisions
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Backend(msg) => ErrorClassifier::classify(msg),
            Self::Json(_) => ErrorCategory::ParseError,
            Self::Timeout { .. } => ErrorCategory::Network,
            Self::SourceUnavailable { message, .. } => ErrorClassifier::classify(message),
            Self::SourceMalformedResponse { .. } => ErrorCategory::ParseError,
            Self::Config(_) => ErrorCategory::BadRequest,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Check if this error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        self.category().is_retryable()
    }
}

// =============================================================================
// Tests
// =============================================================================
