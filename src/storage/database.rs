//! Database Layer with Connection Pooling
//!
//! SQLite-backed persistence featuring:
//! - Connection pooling via r2d2 for concurrent access
//! - WAL mode with pragmas tuned for mixed read/write load
//! - Version-tracked schema initialization
//!
//! Rows store serialized JSON payloads keyed by cache fingerprint or topic;
//! query paths the pipeline needs (load by fingerprint, recent drafts by
//! topic) are indexed.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;

use crate::types::{AggregationResult, ContentDraft, FlowError, InsightSet, Result};

/// Shared database handle for async contexts
pub type SharedDatabase = Arc<Database>;

const SCHEMA: &str = include_str!("schema.sql");

const SCHEMA_VERSION: u32 = 1;

/// Connection pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool
    pub max_size: u32,
    /// Minimum idle connections to keep ready
    pub min_idle: u32,
    /// Timeout for acquiring a connection (seconds)
    pub connection_timeout_secs: u64,
}

impl PoolConfig {
    const MIN_POOL_SIZE: u32 = 4;
    const MAX_POOL_SIZE: u32 = 32;

    /// Two connections per core, within sensible bounds
    pub fn auto() -> Self {
        let cores = std::thread::available_parallelism()
            .map(|p| p.get() as u32)
            .unwrap_or(4);
        let max_size = (cores * 2).clamp(Self::MIN_POOL_SIZE, Self::MAX_POOL_SIZE);
        Self {
            max_size,
            min_idle: (max_size / 4).max(2),
            connection_timeout_secs: 30,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::auto()
    }
}

/// Thread-safe database with connection pooling
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open the database at the given path and initialize the schema
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_config(path, PoolConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, config: PoolConfig) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(config.max_size)
            .min_idle(Some(config.min_idle))
            .connection_timeout(std::time::Duration::from_secs(
                config.connection_timeout_secs,
            ))
            .build(manager)
            .map_err(|e| FlowError::Storage(format!("failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// In-memory database for tests and cache-only operation
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            Ok(())
        });

        // Single connection: each in-memory connection is its own database
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| FlowError::Storage(format!("failed to create in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| FlowError::Storage(format!("failed to acquire connection: {}", e)))
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        Ok(())
    }

    // =========================================================================
    // Aggregations
    // =========================================================================

    /// Upsert one aggregation result keyed by its fingerprint
    pub fn save_aggregation(&self, result: &AggregationResult) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO aggregations (fingerprint, topic, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(fingerprint) DO UPDATE SET
                 topic = excluded.topic,
                 payload = excluded.payload,
                 created_at = excluded.created_at",
            params![
                result.fingerprint,
                result.topic,
                payload,
                result.created_at.to_rfc3339(),
            ],
        )?;
        debug!(fingerprint = %result.fingerprint, "Persisted aggregation");
        Ok(())
    }

    /// Load a stored aggregation by fingerprint.
    /// A row whose payload no longer deserializes is treated as absent.
    pub fn load_aggregation(&self, fingerprint: &str) -> Result<Option<AggregationResult>> {
        let conn = self.conn()?;
        let payload: Option<String> = conn
            .query_row(
                "SELECT payload FROM aggregations WHERE fingerprint = ?1",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;

        Ok(payload.and_then(|p| serde_json::from_str(&p).ok()))
    }

    /// Delete aggregations created before the cutoff; returns rows removed
    pub fn purge_aggregations_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM aggregations WHERE created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(removed)
    }

    // =========================================================================
    // Insights & Drafts
    // =========================================================================

    pub fn save_insights(&self, fingerprint: &str, insights: &InsightSet) -> Result<()> {
        let payload = serde_json::to_string(insights)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO insight_sets (topic, fingerprint, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                insights.topic,
                fingerprint,
                payload,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn save_draft(&self, topic: &str, draft: &ContentDraft) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO drafts (topic, platform, tone, body, segments, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                topic,
                draft.platform.as_str(),
                draft.tone.as_str(),
                draft.text,
                draft.segments as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent draft bodies for a topic, newest first
    pub fn recent_drafts(&self, topic: &str, limit: usize) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT body FROM drafts WHERE topic = ?1 ORDER BY id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![topic, limit as i64], |row| row.get(0))?;
        let mut bodies = Vec::new();
        for row in rows {
            bodies.push(row?);
        }
        Ok(bodies)
    }
}

// =============================================================================
// Tests
// =============================================================================
