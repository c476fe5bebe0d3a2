//! Pipeline Facade
//!
//! `ContentFlow` wires the stages together: cached multi-source aggregation,
//! insight synthesis, and platform content generation. It owns the shared
//! components (cache, dispatcher, provider, optional durable store) and is
//! the only type most consumers need.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::ai::{RetryPolicy, SharedProvider, create_provider};
use crate::cache::{AggregationCache, fingerprint};
use crate::config::Config;
use crate::content::ContentGenerator;
use crate::dispatch::Dispatcher;
use crate::normalize::Normalizer;
use crate::source::{SharedAdapter, create_adapter};
use crate::storage::{Database, SharedDatabase};
use crate::synth::InsightSynthesizer;
use crate::types::{
    AggregationResult, ContentDraft, FlowError, InsightSet, Platform, Result, SourceKind, Tone,
    Topic,
};

pub struct ContentFlow {
    config: Config,
    cache: AggregationCache,
    dispatcher: Dispatcher,
    synthesizer: InsightSynthesizer,
    generator: ContentGenerator,
    db: Option<SharedDatabase>,
}

impl ContentFlow {
    /// Build the pipeline from configuration, constructing the provider and
    /// one adapter per enabled source
    pub fn new(config: Config) -> Result<Self> {
        let provider = create_provider(&config.provider)?;
        Self::with_provider(config, provider)
    }

    /// Build the pipeline around an existing provider (custom backends,
    /// tests)
    pub fn with_provider(config: Config, provider: SharedProvider) -> Result<Self> {
        config.validate()?;

        let mut adapters: BTreeMap<SourceKind, SharedAdapter> = BTreeMap::new();
        for kind in config.enabled_sources() {
            adapters.insert(kind, create_adapter(kind, config.sources.get(kind))?);
        }

        Self::assemble(config, provider, adapters)
    }

    fn assemble(
        config: Config,
        provider: SharedProvider,
        adapters: BTreeMap<SourceKind, SharedAdapter>,
    ) -> Result<Self> {
        let db: Option<SharedDatabase> = match &config.cache.db_path {
            Some(path) => Some(Arc::new(Database::open(path)?)),
            None => None,
        };

        let priors: BTreeMap<SourceKind, f64> = SourceKind::all()
            .into_iter()
            .map(|k| (k, config.sources.get(k).prior_weight))
            .collect();
        let normalizer = Normalizer::new(config.scoring.clone(), priors);

        let dispatcher = Dispatcher::new(
            adapters,
            config.sources.clone(),
            config.dispatch.clone(),
            normalizer,
        );

        let synthesizer = InsightSynthesizer::new(provider.clone(), config.synthesis.clone());
        let generator = ContentGenerator::new(
            provider,
            RetryPolicy::from_synthesis_config(&config.synthesis),
            config.content.clone(),
        );
        let cache = AggregationCache::new(config.cache.clone(), db.clone());

        Ok(Self {
            config,
            cache,
            dispatcher,
            synthesizer,
            generator,
            db,
        })
    }

    /// Aggregate research for a topic across the requested sources, served
    /// from cache when a fresh result exists.
    ///
    /// An empty `kinds` slice means every enabled source.
    pub async fn research(
        &self,
        topic: &str,
        kinds: &[SourceKind],
    ) -> Result<Arc<AggregationResult>> {
        let topic = Topic::new(topic);
        if topic.normalized().is_empty() {
            return Err(FlowError::Config("topic must not be empty".to_string()));
        }

        let kinds: Vec<SourceKind> = if kinds.is_empty() {
            self.config.enabled_sources()
        } else {
            kinds.to_vec()
        };
        if kinds.is_empty() {
            return Err(FlowError::Config("no sources enabled".to_string()));
        }

        let key = fingerprint(&topic, &kinds, self.config.cache.freshness_secs);
        info!(topic = %topic, sources = kinds.len(), fingerprint = %key, "Research requested");

        self.cache
            .get_or_compute(&key, self.dispatcher.aggregate(&topic, &kinds, key.clone()))
            .await
    }

    /// Synthesize key insights from an aggregation result
    pub async fn synthesize(&self, aggregation: &AggregationResult) -> Result<InsightSet> {
        let insights = self.synthesizer.synthesize(aggregation).await?;
        if let Some(db) = &self.db
            && let Err(err) = db.save_insights(&aggregation.fingerprint, &insights)
        {
            warn!(error = %err, "Failed to persist insight set");
        }
        Ok(insights)
    }

    /// Generate a platform draft from an insight set
    pub async fn generate_content(
        &self,
        insights: &InsightSet,
        platform: Platform,
        tone: Tone,
    ) -> Result<ContentDraft> {
        let draft = self.generator.generate(insights, platform, tone).await?;
        if let Some(db) = &self.db
            && let Err(err) = db.save_draft(&insights.topic, &draft)
        {
            warn!(error = %err, "Failed to persist draft");
        }
        Ok(draft)
    }

    /// Full flow: research, synthesize, and draft in one call
    pub async fn create_content(
        &self,
        topic: &str,
        kinds: &[SourceKind],
        platform: Platform,
        tone: Tone,
    ) -> Result<ContentDraft> {
        let aggregation = self.research(topic, kinds).await?;
        let insights = self.synthesize(&aggregation).await?;
        self.generate_content(&insights, platform, tone).await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::TextProvider;
    use crate::source::SourceAdapter;
    use crate::types::RawSourceItem;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct StubAdapter {
        kind: SourceKind,
        fetches: AtomicU32,
    }

    #[async_trait]
    impl SourceAdapter for StubAdapter {
        async fn fetch(&self, topic: &Topic, max_items: usize) -> Result<Vec<RawSourceItem>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok((0..max_items.min(3))
                .map(|i| RawSourceItem {
                    kind: self.kind,
                    title: format!("{} on {} ({})", self.kind, topic.normalized(), i),
                    url: format!("https://example.com/{}/{}", self.kind, i),
                    snippet: format!("Notes about {}", topic.normalized()),
                    published: None,
                    provider_id: None,
                })
                .collect())
        }

        fn kind(&self) -> SourceKind {
            self.kind
        }
    }

    struct ScriptedProvider {
        responses: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<Value> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(FlowError::Backend("script exhausted".to_string()))
            } else {
                Ok(responses.remove(0))
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn flow(responses: Vec<Value>) -> (ContentFlow, Arc<StubAdapter>) {
        let adapter = Arc::new(StubAdapter {
            kind: SourceKind::Web,
            fetches: AtomicU32::new(0),
        });
        let mut config = Config::default();
        config.sources.arxiv.enabled = false;
        config.sources.video.enabled = false;

        let flow = ContentFlow::assemble(
            config,
            Arc::new(ScriptedProvider {
                responses: Mutex::new(responses),
            }),
            BTreeMap::from([(SourceKind::Web, adapter.clone() as SharedAdapter)]),
        )
        .unwrap();
        (flow, adapter)
    }

    #[tokio::test]
    async fn test_research_is_cached_per_fingerprint() {
        let (flow, adapter) = flow(vec![]);

        let first = flow.research("Rust Async", &[]).await.unwrap();
        let second = flow.research("  rust   async ", &[]).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(adapter.fetches.load(Ordering::SeqCst), 1);
        assert_eq!(first.items.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_topic_is_rejected() {
        let (flow, _) = flow(vec![]);
        let err = flow.research("   ", &[]).await.unwrap_err();
        assert!(matches!(err, FlowError::Config(_)));
    }

    #[tokio::test]
    async fn test_full_flow() {
        let (flow, _) = flow(vec![
            json!(["a", "b", "c", "d", "e"]),
            json!({"text": "A short post #rust"}),
        ]);

        let draft = flow
            .create_content("rust async", &[], Platform::LinkedIn, Tone::Professional)
            .await
            .unwrap();
        assert_eq!(draft.platform, Platform::LinkedIn);
        assert_eq!(draft.text, "A short post #rust");
    }

    #[tokio::test]
    async fn test_synthesize_produces_provenance_from_aggregation() {
        let (flow, _) = flow(vec![json!(["a", "b", "c", "d", "e"])]);

        let aggregation = flow.research("rust async", &[]).await.unwrap();
        let insights = flow.synthesize(&aggregation).await.unwrap();
        assert_eq!(insights.insights.len(), 5);
        assert_eq!(insights.provenance.len(), aggregation.items.len());
    }
}
