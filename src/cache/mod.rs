//! Aggregation Cache
//!
//! Fingerprint-keyed cache of aggregation results with a freshness window,
//! LRU eviction, single-flight de-duplication of concurrent misses, and an
//! optional SQLite backing store that survives restarts.
//!
//! A fingerprint covers the normalized topic, the deduplicated sorted source
//! set, and the freshness window, so a topic queried with different source
//! sets or windows occupies distinct entries. For any one fingerprint at most
//! one aggregation runs at a time: the first caller computes, every
//! concurrent caller waits and receives the same `Arc`'d result, and a failed
//! computation hands the identical error to every waiter without poisoning
//! the cache. A leader that is cancelled mid-flight releases the slot so a
//! waiter can take over.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::storage::SharedDatabase;
use crate::types::{AggregationResult, FlowError, Result, SourceKind, Topic};

type FlightOutcome = std::result::Result<Arc<AggregationResult>, FlowError>;

/// Compute the cache fingerprint for one aggregation request
pub fn fingerprint(topic: &Topic, kinds: &[SourceKind], freshness_secs: u64) -> String {
    let mut sorted: Vec<SourceKind> = kinds.to_vec();
    sorted.sort();
    sorted.dedup();

    let mut hasher = Sha256::new();
    hasher.update(topic.normalized().as_bytes());
    hasher.update(b"|");
    for kind in &sorted {
        hasher.update(kind.as_str().as_bytes());
        hasher.update(b",");
    }
    hasher.update(b"|");
    hasher.update(freshness_secs.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

struct Entry {
    result: Arc<AggregationResult>,
    inserted: Instant,
    last_used: AtomicU64,
}

/// One in-flight computation; waiters park on `notify` until `outcome` is set
struct Flight {
    notify: Arc<Notify>,
    outcome: Arc<OnceLock<FlightOutcome>>,
}

pub struct AggregationCache {
    config: CacheConfig,
    entries: DashMap<String, Entry>,
    flights: DashMap<String, Flight>,
    /// Monotonic use counter backing LRU eviction
    clock: AtomicU64,
    db: Option<SharedDatabase>,
}

impl AggregationCache {
    pub fn new(config: CacheConfig, db: Option<SharedDatabase>) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            flights: DashMap::new(),
            clock: AtomicU64::new(0),
            db,
        }
    }

    /// Return the cached result for `key`, or run `compute` to produce it.
    ///
    /// `compute` is the caller's own aggregation future; it is polled only if
    /// this caller ends up leading the flight, and dropped untouched when a
    /// fresh entry or another leader's result serves the call.
    pub async fn get_or_compute<Fut>(
        &self,
        key: &str,
        compute: Fut,
    ) -> Result<Arc<AggregationResult>>
    where
        Fut: Future<Output = Result<AggregationResult>>,
    {
        let mut compute = Some(compute);

        loop {
            if let Some(result) = self.lookup(key) {
                debug!(fingerprint = %key, "Cache hit");
                return Ok(result);
            }

            // Miss: join the in-flight computation or lead a new one
            let notify = Arc::new(Notify::new());
            let outcome = Arc::new(OnceLock::new());
            let flight = match self.flights.entry(key.to_string()) {
                dashmap::mapref::entry::Entry::Occupied(existing) => {
                    let f = existing.get();
                    Some((f.notify.clone(), f.outcome.clone()))
                }
                dashmap::mapref::entry::Entry::Vacant(slot) => {
                    slot.insert(Flight {
                        notify: notify.clone(),
                        outcome: outcome.clone(),
                    });
                    None
                }
            };

            match flight {
                Some((notify, outcome)) => {
                    // Waiter: register before checking so a finish between the
                    // two cannot be missed
                    let notified = notify.notified();
                    if let Some(settled) = outcome.get() {
                        return settled.clone();
                    }
                    notified.await;
                    match outcome.get() {
                        Some(settled) => return settled.clone(),
                        // Leader was cancelled; retry and possibly lead
                        None => continue,
                    }
                }
                None => {
                    let guard = FlightGuard {
                        flights: &self.flights,
                        key,
                        notify: &notify,
                        armed: true,
                    };
                    // Taking the slot means this caller's future runs
                    let settled = match compute.take() {
                        Some(fut) => fut.await,
                        None => Err(FlowError::Config(
                            "aggregation future already consumed".to_string(),
                        )),
                    };
                    return self.settle(key, settled, &outcome, guard);
                }
            }
        }
    }

    /// Record the leader's outcome, publish it to waiters, and release the
    /// flight slot
    fn settle(
        &self,
        key: &str,
        settled: Result<AggregationResult>,
        outcome: &OnceLock<FlightOutcome>,
        mut guard: FlightGuard<'_>,
    ) -> Result<Arc<AggregationResult>> {
        let shared = match settled {
            Ok(result) => {
                let result = Arc::new(result);
                self.insert(key, result.clone());
                Ok(result)
            }
            Err(err) => {
                info!(fingerprint = %key, error = %err, "Aggregation failed; not cached");
                Err(err)
            }
        };

        // Publish before waking; waiters read immediately after
        let _ = outcome.set(shared.clone());
        guard.armed = false;
        self.flights.remove(key);
        guard.notify.notify_waiters();
        shared
    }

    /// Fresh in-memory entry, falling back to the durable store
    fn lookup(&self, key: &str) -> Option<Arc<AggregationResult>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.inserted.elapsed() < self.config.freshness_window() {
                entry
                    .last_used
                    .store(self.clock.fetch_add(1, Ordering::Relaxed), Ordering::Relaxed);
                return Some(entry.result.clone());
            }
            drop(entry);
            self.entries.remove(key);
        }

        let db = self.db.as_ref()?;
        let stored = db.load_aggregation(key).ok().flatten()?;
        let age = chrono::Utc::now()
            .signed_duration_since(stored.created_at)
            .to_std()
            .unwrap_or_default();
        if age >= self.config.freshness_window() {
            return None;
        }

        // The memory entry is back-dated by the durable age so promotion
        // never extends the original expiry
        let inserted = Instant::now().checked_sub(age)?;
        debug!(fingerprint = %key, "Promoted durable entry to memory");
        let result = Arc::new(stored);
        self.insert_memory_only(key, result.clone(), inserted);
        Some(result)
    }

    fn insert(&self, key: &str, result: Arc<AggregationResult>) {
        if let Some(db) = &self.db
            && let Err(err) = db.save_aggregation(&result)
        {
            // Durable backing is best-effort; the memory entry still serves
            info!(fingerprint = %key, error = %err, "Failed to persist aggregation");
        }
        self.insert_memory_only(key, result, Instant::now());
    }

    fn insert_memory_only(&self, key: &str, result: Arc<AggregationResult>, inserted: Instant) {
        self.entries.insert(
            key.to_string(),
            Entry {
                result,
                inserted,
                last_used: AtomicU64::new(self.clock.fetch_add(1, Ordering::Relaxed)),
            },
        );
        self.evict_if_full();
    }

    /// Drop least-recently-used entries once capacity is exceeded
    fn evict_if_full(&self) {
        while self.entries.len() > self.config.max_entries {
            let victim = self
                .entries
                .iter()
                .min_by_key(|e| e.last_used.load(Ordering::Relaxed))
                .map(|e| e.key().clone());
            match victim {
                Some(key) => {
                    debug!(fingerprint = %key, "Evicting LRU cache entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Drop one entry from memory (the durable row, if any, is untouched)
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Releases the flight slot if the leader is dropped before settling, so
/// waiters can retry instead of parking forever
struct FlightGuard<'a> {
    flights: &'a DashMap<String, Flight>,
    key: &'a str,
    notify: &'a Notify,
    armed: bool,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.flights.remove(self.key);
            self.notify.notify_waiters();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
