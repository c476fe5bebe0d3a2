//! Insight Synthesizer
//!
//! Turns one aggregation result into a short list of key insights via the
//! text-generation backend. The top-ranked items are folded into the prompt,
//! the response must be a JSON array of 5-7 short strings, and shape
//! violations count as transient so the retry policy gets another attempt.
//! Exhaustion surfaces as `SynthesisFailed` with the attempt count and last
//! error; there is no placeholder fallback.

use serde_json::Value;
use tracing::{debug, info};

use crate::ai::{RetryPolicy, SharedProvider, extract_json_from_response};
use crate::config::SynthesisConfig;
use crate::types::{AggregationResult, FlowError, InsightSet, Result};

const SYSTEM_PROMPT: &str = "You are a research analyst. You distill source \
material into precise, standalone insights. Respond with JSON only.";

pub struct InsightSynthesizer {
    provider: SharedProvider,
    config: SynthesisConfig,
    policy: RetryPolicy,
}

impl InsightSynthesizer {
    pub fn new(provider: SharedProvider, config: SynthesisConfig) -> Self {
        let policy = RetryPolicy::from_synthesis_config(&config);
        Self {
            provider,
            config,
            policy,
        }
    }

    /// Synthesize key insights from the ranked aggregation items
    pub async fn synthesize(&self, aggregation: &AggregationResult) -> Result<InsightSet> {
        let context_items: Vec<_> = aggregation
            .items
            .iter()
            .take(self.config.max_context_items)
            .collect();

        if context_items.is_empty() {
            return Err(FlowError::SynthesisFailed {
                attempts: 0,
                last_error: "no items to synthesize from".to_string(),
            });
        }

        let prompt = self.build_prompt(&aggregation.topic, &context_items);
        debug!(
            topic = %aggregation.topic,
            context_items = context_items.len(),
            "Synthesizing insights"
        );

        let insights = self
            .policy
            .run("synthesize", |attempt| {
                let prompt = prompt.clone();
                async move {
                    let response = self.provider.generate(SYSTEM_PROMPT, &prompt).await?;
                    let insights = self.parse_insights(&response)?;
                    if attempt > 1 {
                        debug!(attempt, "Insight shape valid after retry");
                    }
                    Ok(insights)
                }
            })
            .await
            .map_err(|exhausted| FlowError::SynthesisFailed {
                attempts: exhausted.attempts,
                last_error: exhausted.last_error.to_string(),
            })?;

        info!(
            topic = %aggregation.topic,
            insights = insights.len(),
            "Synthesis complete"
        );

        Ok(InsightSet {
            topic: aggregation.topic.clone(),
            insights,
            provenance: context_items.iter().map(|i| i.url.clone()).collect(),
        })
    }

    fn build_prompt(&self, topic: &str, items: &[&crate::types::CanonicalItem]) -> String {
        let mut prompt = format!(
            "Research topic: {}\n\nSources ({}):\n",
            topic,
            items.len()
        );
        for (i, item) in items.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. [{}] {}\n   {}\n",
                i + 1,
                item.kind,
                item.title,
                item.summary
            ));
        }
        prompt.push_str(&format!(
            "\nExtract the {}-{} most important insights from these sources.\n\
             Each insight must be one standalone sentence under {} characters.\n\
             Respond with a JSON array of strings and nothing else.",
            self.config.min_insights,
            self.config.max_insights,
            crate::constants::synthesis::MAX_INSIGHT_CHARS,
        ));
        prompt
    }

    /// Validate the response shape: a JSON array (possibly wrapped in an
    /// `insights` object) of 5-7 non-empty short strings
    fn parse_insights(&self, response: &Value) -> Result<Vec<String>> {
        let text = match response {
            Value::String(s) => extract_json_from_response(s)?,
            other => other.clone(),
        };

        let array = match &text {
            Value::Array(a) => a.clone(),
            Value::Object(map) => match map.get("insights") {
                Some(Value::Array(a)) => a.clone(),
                _ => {
                    return Err(FlowError::Json(
                        "expected a JSON array of insights".to_string(),
                    ));
                }
            },
            _ => {
                return Err(FlowError::Json(
                    "expected a JSON array of insights".to_string(),
                ));
            }
        };

        let mut insights = Vec::with_capacity(array.len());
        for value in array {
            let Value::String(s) = value else {
                return Err(FlowError::Json("insight is not a string".to_string()));
            };
            let trimmed = s.trim().to_string();
            if trimmed.is_empty() {
                return Err(FlowError::Json("empty insight".to_string()));
            }
            if trimmed.chars().count() > crate::constants::synthesis::MAX_INSIGHT_CHARS {
                return Err(FlowError::Json(format!(
                    "insight exceeds {} characters",
                    crate::constants::synthesis::MAX_INSIGHT_CHARS
                )));
            }
            insights.push(trimmed);
        }

        if insights.len() < self.config.min_insights || insights.len() > self.config.max_insights {
            return Err(FlowError::Json(format!(
                "expected {}-{} insights, got {}",
                self.config.min_insights,
                self.config.max_insights,
                insights.len()
            )));
        }

        Ok(insights)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::TextProvider;
    use crate::types::{CanonicalItem, SourceKind, SourceStatus};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use std::sync::Mutex;
    use std::sync::Arc;

    struct ScriptedProvider {
        responses: Mutex<Vec<Result<Value>>>,
        calls: Mutex<u32>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<Value>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(0),
            })
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl TextProvider for ScriptedProvider {
        async fn generate(&self, _system: &str, _prompt: &str) -> Result<Value> {
            *self.calls.lock().unwrap() += 1;
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(FlowError::Backend("script exhausted".to_string()))
            } else {
                responses.remove(0)
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        fn model(&self) -> &str {
            "test"
        }
    }

    fn item(title: &str) -> CanonicalItem {
        CanonicalItem {
            title: title.to_string(),
            url: format!("https://example.com/{}", title.replace(' ', "-")),
            summary: "summary".to_string(),
            published: None,
            kind: SourceKind::Web,
            sources: BTreeSet::from([SourceKind::Web]),
            relevance: 0.5,
            recency: 0.0,
        }
    }

    fn aggregation(item_count: usize) -> AggregationResult {
        AggregationResult {
            topic: "rust async".to_string(),
            items: (0..item_count).map(|i| item(&format!("item {}", i))).collect(),
            statuses: BTreeMap::from([(SourceKind::Web, SourceStatus::ok(item_count))]),
            fingerprint: "fp".to_string(),
            created_at: chrono::Utc::now(),
        }
    }

    fn fast_config() -> SynthesisConfig {
        SynthesisConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_secs: 1,
            ..SynthesisConfig::default()
        }
    }

    fn five_insights() -> Value {
        json!(["one", "two", "three", "four", "five"])
    }

    #[tokio::test]
    async fn test_synthesize_happy_path() {
        let provider = ScriptedProvider::new(vec![Ok(five_insights())]);
        let synth = InsightSynthesizer::new(provider.clone(), fast_config());

        let set = synth.synthesize(&aggregation(3)).await.unwrap();
        assert_eq!(set.insights.len(), 5);
        assert_eq!(set.provenance.len(), 3);
        assert_eq!(set.topic, "rust async");
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_wrapped_insights_object_is_accepted() {
        let provider =
            ScriptedProvider::new(vec![Ok(json!({"insights": ["a", "b", "c", "d", "e"]}))]);
        let synth = InsightSynthesizer::new(provider, fast_config());

        let set = synth.synthesize(&aggregation(1)).await.unwrap();
        assert_eq!(set.insights.len(), 5);
    }

    #[tokio::test]
    async fn test_bad_shape_retries_then_succeeds() {
        let provider = ScriptedProvider::new(vec![
            Ok(json!({"unexpected": true})),
            Ok(json!(["a", "b"])),
            Ok(five_insights()),
        ]);
        let synth = InsightSynthesizer::new(provider.clone(), fast_config());

        let set = synth.synthesize(&aggregation(2)).await.unwrap();
        assert_eq!(set.insights.len(), 5);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_synthesis_failed() {
        let provider = ScriptedProvider::new(vec![
            Err(FlowError::Backend("HTTP 503: overloaded".to_string())),
            Err(FlowError::Backend("HTTP 503: overloaded".to_string())),
            Err(FlowError::Backend("HTTP 503: overloaded".to_string())),
        ]);
        let synth = InsightSynthesizer::new(provider.clone(), fast_config());

        let err = synth.synthesize(&aggregation(2)).await.unwrap_err();
        match err {
            FlowError::SynthesisFailed {
                attempts,
                last_error,
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("503"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_auth_failure_does_not_burn_attempts() {
        let provider = ScriptedProvider::new(vec![Err(FlowError::Backend(
            "HTTP 401: unauthorized".to_string(),
        ))]);
        let synth = InsightSynthesizer::new(provider.clone(), fast_config());

        let err = synth.synthesize(&aggregation(2)).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::SynthesisFailed { attempts: 1, .. }
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_aggregation_fails_without_calling_backend() {
        let provider = ScriptedProvider::new(vec![Ok(five_insights())]);
        let synth = InsightSynthesizer::new(provider.clone(), fast_config());

        let err = synth.synthesize(&aggregation(0)).await.unwrap_err();
        assert!(matches!(
            err,
            FlowError::SynthesisFailed { attempts: 0, .. }
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_context_is_truncated_to_top_items() {
        let provider = ScriptedProvider::new(vec![Ok(five_insights())]);
        let config = SynthesisConfig {
            max_context_items: 4,
            ..fast_config()
        };
        let synth = InsightSynthesizer::new(provider, config);

        let set = synth.synthesize(&aggregation(10)).await.unwrap();
        assert_eq!(set.provenance.len(), 4);
    }

    #[test]
    fn test_parse_rejects_out_of_range_counts() {
        let provider = ScriptedProvider::new(vec![]);
        let synth = InsightSynthesizer::new(provider, fast_config());

        assert!(synth.parse_insights(&json!(["a", "b", "c"])).is_err());
        assert!(
            synth
                .parse_insights(&json!(["a", "b", "c", "d", "e", "f", "g", "h"]))
                .is_err()
        );
        assert!(synth.parse_insights(&json!(["", "b", "c", "d", "e"])).is_err());
        assert!(synth.parse_insights(&json!("not an array")).is_err());
    }

    #[test]
    fn test_parse_rejects_oversized_insight() {
        let provider = ScriptedProvider::new(vec![]);
        let synth = InsightSynthesizer::new(provider, fast_config());

        let long = "x".repeat(crate::constants::synthesis::MAX_INSIGHT_CHARS + 1);
        let err = synth
            .parse_insights(&json!([long, "b", "c", "d", "e"]))
            .unwrap_err();
        assert!(matches!(err, FlowError::Json(_)));
    }
}
