//! Storage Layer
//!
//! SQLite persistence for aggregation results, insight sets, and generated
//! drafts, pooled via r2d2 for concurrent access. The cache layers on top of
//! this store; the pipeline records history through it.

mod database;

pub use database::{Database, PoolConfig, SharedDatabase};
