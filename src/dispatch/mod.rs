//! Concurrent Source Dispatch
//!
//! Fans one aggregation request out to every requested source adapter,
//! enforcing a per-source timeout around each fetch and a global wall-time
//! budget around the whole call. One source failing or timing out never
//! aborts the others; its status is recorded and the rest proceed.
//!
//! When the global deadline expires, fetches that already completed are
//! still harvested (recorded as `Partial`), and fetches still pending are
//! dropped and recorded as `TimedOut`. Only when no source at all delivers
//! usable results does the call fail, with the full per-source status map
//! attached.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use futures::FutureExt;
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::config::{DispatchConfig, SourcesConfig};
use crate::normalize::Normalizer;
use crate::source::SharedAdapter;
use crate::types::{
    AggregationResult, FlowError, RawSourceItem, Result, SourceKind, SourceStatus, Topic,
};

pub struct Dispatcher {
    adapters: BTreeMap<SourceKind, SharedAdapter>,
    sources: SourcesConfig,
    config: DispatchConfig,
    normalizer: Normalizer,
}

impl Dispatcher {
    pub fn new(
        adapters: BTreeMap<SourceKind, SharedAdapter>,
        sources: SourcesConfig,
        config: DispatchConfig,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            adapters,
            sources,
            config,
            normalizer,
        }
    }

    /// Fetch the topic from every requested source concurrently, then merge
    /// the per-source results into one ranked [`AggregationResult`].
    ///
    /// Fails only with [`FlowError::AllSourcesFailed`] when no source
    /// delivers usable items.
    pub async fn aggregate(
        &self,
        topic: &Topic,
        kinds: &[SourceKind],
        fingerprint: String,
    ) -> Result<AggregationResult> {
        let requested: BTreeSet<SourceKind> = kinds.iter().copied().collect();
        let mut statuses: BTreeMap<SourceKind, SourceStatus> = BTreeMap::new();
        let mut raw_items: Vec<RawSourceItem> = Vec::new();

        let mut pending: FuturesUnordered<_> = requested
            .iter()
            .filter_map(|&kind| match self.adapters.get(&kind) {
                Some(adapter) => Some(self.fetch_one(kind, adapter.clone(), topic)),
                None => {
                    statuses.insert(kind, SourceStatus::failed("source not enabled"));
                    None
                }
            })
            .collect();

        let deadline = Instant::now() + self.config.global_timeout();

        while let Ok(Some((kind, result))) = timeout_at(deadline, pending.next()).await {
            record(&mut statuses, &mut raw_items, kind, result, false);
        }

        // Deadline hit: harvest fetches that finished but were not yet
        // polled, then drop the rest.
        while let Some(Some((kind, result))) = pending.next().now_or_never() {
            record(&mut statuses, &mut raw_items, kind, result, true);
        }
        drop(pending);

        for kind in &requested {
            statuses.entry(*kind).or_insert_with(|| {
                warn!(source = %kind, "Source still pending at aggregation deadline");
                SourceStatus::timed_out("aggregation deadline exceeded")
            });
        }

        if !statuses.values().any(SourceStatus::succeeded) {
            return Err(FlowError::AllSourcesFailed {
                topic: topic.normalized().to_string(),
                statuses,
            });
        }

        let items = self.normalizer.normalize(topic, raw_items, Utc::now());

        info!(
            topic = %topic,
            items = items.len(),
            sources_ok = statuses.values().filter(|s| s.succeeded()).count(),
            sources_total = statuses.len(),
            "Aggregation complete"
        );

        Ok(AggregationResult {
            topic: topic.normalized().to_string(),
            items,
            statuses,
            fingerprint,
            created_at: Utc::now(),
        })
    }

    /// One source fetch under its per-source timeout, never panicking and
    /// always yielding a `(kind, outcome)` pair.
    async fn fetch_one(
        &self,
        kind: SourceKind,
        adapter: SharedAdapter,
        topic: &Topic,
    ) -> (SourceKind, Result<Vec<RawSourceItem>>) {
        let max_items = self.sources.get(kind).max_items;
        let per_source = self.config.per_source_timeout();

        let outcome = match timeout(per_source, adapter.fetch(topic, max_items)).await {
            Ok(result) => result,
            Err(_) => Err(FlowError::timeout(
                format!("{} fetch", kind),
                per_source,
            )),
        };
        (kind, outcome)
    }
}

/// Fold one source outcome into the status map and raw item pool
fn record(
    statuses: &mut BTreeMap<SourceKind, SourceStatus>,
    raw_items: &mut Vec<RawSourceItem>,
    kind: SourceKind,
    result: Result<Vec<RawSourceItem>>,
    at_deadline: bool,
) {
    match result {
        Ok(items) => {
            debug!(source = %kind, items = items.len(), at_deadline, "Source fetch succeeded");
            let status = if at_deadline {
                SourceStatus::partial(items.len())
            } else {
                SourceStatus::ok(items.len())
            };
            statuses.insert(kind, status);
            raw_items.extend(items);
        }
        Err(err) => {
            warn!(source = %kind, error = %err, "Source fetch failed");
            let status = if matches!(err, FlowError::Timeout { .. }) {
                SourceStatus::timed_out(err.to_string())
            } else {
                SourceStatus::failed(err.to_string())
            };
            statuses.insert(kind, status);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScoringConfig;
    use crate::source::SourceAdapter;
    use crate::types::SourceState;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct MockAdapter {
        kind: SourceKind,
        delay: Duration,
        outcome: std::result::Result<Vec<RawSourceItem>, FlowError>,
    }

    impl MockAdapter {
        fn items(kind: SourceKind, count: usize, delay: Duration) -> SharedAdapter {
            let items = (0..count)
                .map(|i| RawSourceItem {
                    kind,
                    title: format!("{} item {}", kind, i),
                    url: format!("https://example.com/{}/{}", kind, i),
                    snippet: String::new(),
                    published: None,
                    provider_id: None,
                })
                .collect();
            Arc::new(Self {
                kind,
                delay,
                outcome: Ok(items),
            })
        }

        fn failing(kind: SourceKind) -> SharedAdapter {
            Arc::new(Self {
                kind,
                delay: Duration::ZERO,
                outcome: Err(FlowError::SourceUnavailable {
                    kind,
                    message: "connection refused".to_string(),
                }),
            })
        }
    }

    #[async_trait]
    impl SourceAdapter for MockAdapter {
        async fn fetch(&self, _topic: &Topic, _max_items: usize) -> Result<Vec<RawSourceItem>> {
            tokio::time::sleep(self.delay).await;
            self.outcome.clone()
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }
    }

    fn dispatcher(adapters: BTreeMap<SourceKind, SharedAdapter>) -> Dispatcher {
        let priors = BTreeMap::from([
            (SourceKind::Arxiv, 1.0),
            (SourceKind::Web, 0.8),
            (SourceKind::Video, 0.7),
        ]);
        Dispatcher::new(
            adapters,
            SourcesConfig::default(),
            DispatchConfig {
                per_source_timeout_secs: 5,
                global_timeout_secs: 10,
            },
            Normalizer::new(ScoringConfig::default(), priors),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_sources_succeed() {
        let adapters = BTreeMap::from([
            (
                SourceKind::Arxiv,
                MockAdapter::items(SourceKind::Arxiv, 2, Duration::ZERO),
            ),
            (
                SourceKind::Web,
                MockAdapter::items(SourceKind::Web, 3, Duration::from_secs(1)),
            ),
        ]);

        let topic = Topic::new("rust");
        let result = dispatcher(adapters)
            .aggregate(&topic, &[SourceKind::Arxiv, SourceKind::Web], "fp".to_string())
            .await
            .unwrap();

        assert_eq!(result.items.len(), 5);
        assert_eq!(result.succeeded_sources(), 2);
        assert!(!result.is_degraded());
        assert_eq!(result.statuses[&SourceKind::Arxiv].state, SourceState::Ok);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_failure_degrades_without_aborting() {
        let adapters = BTreeMap::from([
            (
                SourceKind::Arxiv,
                MockAdapter::items(SourceKind::Arxiv, 2, Duration::ZERO),
            ),
            (SourceKind::Web, MockAdapter::failing(SourceKind::Web)),
        ]);

        let topic = Topic::new("rust");
        let result = dispatcher(adapters)
            .aggregate(&topic, &[SourceKind::Arxiv, SourceKind::Web], "fp".to_string())
            .await
            .unwrap();

        assert_eq!(result.items.len(), 2);
        assert!(result.is_degraded());
        assert_eq!(result.statuses[&SourceKind::Web].state, SourceState::Failed);
        assert!(
            result.statuses[&SourceKind::Web]
                .error
                .as_deref()
                .unwrap()
                .contains("connection refused")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_source_times_out_per_source() {
        let adapters = BTreeMap::from([
            (
                SourceKind::Arxiv,
                MockAdapter::items(SourceKind::Arxiv, 1, Duration::ZERO),
            ),
            (
                SourceKind::Web,
                MockAdapter::items(SourceKind::Web, 3, Duration::from_secs(7)),
            ),
        ]);

        let topic = Topic::new("rust");
        let result = dispatcher(adapters)
            .aggregate(&topic, &[SourceKind::Arxiv, SourceKind::Web], "fp".to_string())
            .await
            .unwrap();

        assert_eq!(result.items.len(), 1);
        assert_eq!(
            result.statuses[&SourceKind::Web].state,
            SourceState::TimedOut
        );
    }

    /// Completes its fetch, then yields once before handing the items back,
    /// so a completion landing on the aggregation deadline is only visible
    /// to the post-deadline drain
    struct DeadlineAdapter {
        kind: SourceKind,
        delay: Duration,
    }

    #[async_trait]
    impl SourceAdapter for DeadlineAdapter {
        async fn fetch(&self, _topic: &Topic, _max_items: usize) -> Result<Vec<RawSourceItem>> {
            tokio::time::sleep(self.delay).await;
            tokio::task::yield_now().await;
            Ok(vec![RawSourceItem {
                kind: self.kind,
                title: "late arrival".to_string(),
                url: "https://example.com/late".to_string(),
                snippet: String::new(),
                published: None,
                provider_id: None,
            }])
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completion_on_the_deadline_is_harvested_as_partial() {
        let adapters = BTreeMap::from([(
            SourceKind::Web,
            Arc::new(DeadlineAdapter {
                kind: SourceKind::Web,
                delay: Duration::from_secs(10),
            }) as SharedAdapter,
        )]);

        let priors = BTreeMap::from([(SourceKind::Web, 0.8)]);
        let dispatcher = Dispatcher::new(
            adapters,
            SourcesConfig::default(),
            DispatchConfig {
                per_source_timeout_secs: 30,
                global_timeout_secs: 10,
            },
            Normalizer::new(ScoringConfig::default(), priors),
        );

        let topic = Topic::new("rust");
        let result = dispatcher
            .aggregate(&topic, &[SourceKind::Web], "fp".to_string())
            .await
            .unwrap();

        assert_eq!(
            result.statuses[&SourceKind::Web].state,
            SourceState::Partial
        );
        assert_eq!(result.statuses[&SourceKind::Web].items, 1);
        assert_eq!(result.items.len(), 1);
        assert!(result.statuses[&SourceKind::Web].succeeded());
    }

    #[test]
    fn test_record_marks_deadline_completions_partial() {
        let mut statuses = BTreeMap::new();
        let mut raw_items = Vec::new();
        let items = vec![RawSourceItem {
            kind: SourceKind::Arxiv,
            title: "drained at deadline".to_string(),
            url: "https://example.com/drained".to_string(),
            snippet: String::new(),
            published: None,
            provider_id: None,
        }];

        record(
            &mut statuses,
            &mut raw_items,
            SourceKind::Arxiv,
            Ok(items),
            true,
        );

        assert_eq!(statuses[&SourceKind::Arxiv].state, SourceState::Partial);
        assert_eq!(statuses[&SourceKind::Arxiv].items, 1);
        assert!(statuses[&SourceKind::Arxiv].succeeded());
        assert_eq!(raw_items.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_sources_failed_is_an_error() {
        let adapters = BTreeMap::from([
            (SourceKind::Arxiv, MockAdapter::failing(SourceKind::Arxiv)),
            (SourceKind::Web, MockAdapter::failing(SourceKind::Web)),
        ]);

        let topic = Topic::new("rust");
        let err = dispatcher(adapters)
            .aggregate(&topic, &[SourceKind::Arxiv, SourceKind::Web], "fp".to_string())
            .await
            .unwrap_err();

        match err {
            FlowError::AllSourcesFailed { statuses, .. } => {
                assert_eq!(statuses.len(), 2);
                assert!(statuses.values().all(|s| !s.succeeded()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfigured_source_is_recorded_failed() {
        let adapters = BTreeMap::from([(
            SourceKind::Arxiv,
            MockAdapter::items(SourceKind::Arxiv, 1, Duration::ZERO),
        )]);

        let topic = Topic::new("rust");
        let result = dispatcher(adapters)
            .aggregate(
                &topic,
                &[SourceKind::Arxiv, SourceKind::Video],
                "fp".to_string(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.statuses[&SourceKind::Video].state,
            SourceState::Failed
        );
        assert_eq!(
            result.statuses[&SourceKind::Video].error.as_deref(),
            Some("source not enabled")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_results_still_count_as_success() {
        let adapters = BTreeMap::from([(
            SourceKind::Web,
            MockAdapter::items(SourceKind::Web, 0, Duration::ZERO),
        )]);

        let topic = Topic::new("rust");
        let result = dispatcher(adapters)
            .aggregate(&topic, &[SourceKind::Web], "fp".to_string())
            .await
            .unwrap();

        assert!(result.items.is_empty());
        assert_eq!(result.statuses[&SourceKind::Web].state, SourceState::Ok);
        assert_eq!(result.succeeded_sources(), 1);
    }
}
