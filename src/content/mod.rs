//! Content Generator
//!
//! Renders one insight set into a platform-specific draft through the
//! text-generation backend, then enforces the platform's structural
//! constraints locally. Twitter drafts are threads of bounded segments;
//! LinkedIn and Instagram are single bounded posts; Blog is unbounded
//! Markdown. A draft that violates its limits gets one regeneration with the
//! violation fed back into the prompt; a second violation is
//! `ContentTooLong`.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::ai::{RetryPolicy, SharedProvider};
use crate::config::ContentConfig;
use crate::types::{ContentDraft, FlowError, InsightSet, Platform, Result, Tone};

const SYSTEM_PROMPT: &str = "You are a social media copywriter. You turn \
research insights into platform-native content. Respond with JSON only.";

pub struct ContentGenerator {
    provider: SharedProvider,
    policy: RetryPolicy,
    config: ContentConfig,
}

impl ContentGenerator {
    pub fn new(provider: SharedProvider, policy: RetryPolicy, config: ContentConfig) -> Self {
        Self {
            provider,
            policy,
            config,
        }
    }

    /// Generate a draft for the platform and tone, enforcing its limits
    pub async fn generate(
        &self,
        insights: &InsightSet,
        platform: Platform,
        tone: Tone,
    ) -> Result<ContentDraft> {
        let mut feedback: Option<String> = None;

        for round in 0..=self.config.max_regenerations {
            let prompt = build_prompt(insights, platform, tone, feedback.as_deref());
            debug!(%platform, %tone, round, "Generating content");

            let draft = self
                .policy
                .run("generate content", |_| {
                    let prompt = prompt.clone();
                    async move {
                        let response = self.provider.generate(SYSTEM_PROMPT, &prompt).await?;
                        parse_draft(&response, platform, tone)
                    }
                })
                .await
                .map_err(|exhausted| FlowError::SynthesisFailed {
                    attempts: exhausted.attempts,
                    last_error: exhausted.last_error.to_string(),
                })?;
            match validate_draft(&draft) {
                Ok(()) => {
                    info!(
                        %platform,
                        %tone,
                        chars = draft.text.chars().count(),
                        segments = draft.segments,
                        "Draft accepted"
                    );
                    return Ok(draft);
                }
                Err(violation) => {
                    if round >= self.config.max_regenerations {
                        return Err(violation);
                    }
                    warn!(%platform, error = %violation, "Draft violates limits; regenerating");
                    feedback = Some(violation.to_string());
                }
            }
        }

        // max_regenerations is validated positive; the loop always returns
        Err(FlowError::Config(
            "content.max_regenerations must allow at least one round".to_string(),
        ))
    }
}

fn build_prompt(
    insights: &InsightSet,
    platform: Platform,
    tone: Tone,
    feedback: Option<&str>,
) -> String {
    let mut prompt = format!(
        "Topic: {}\n\nKey insights:\n",
        insights.topic
    );
    for (i, insight) in insights.insights.iter().enumerate() {
        prompt.push_str(&format!("{}. {}\n", i + 1, insight));
    }

    prompt.push_str(&format!("\nTone: {}.\n", tone_guidance(tone)));
    prompt.push_str(platform_guidance(platform));

    if let Some(feedback) = feedback {
        prompt.push_str(&format!(
            "\nThe previous draft was rejected: {}. Produce a shorter draft that \
             respects the limit.\n",
            feedback
        ));
    }
    prompt
}

fn tone_guidance(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "professional and authoritative, no slang",
        Tone::Casual => "casual and conversational, approachable",
        Tone::Technical => "technical and precise, assume an expert reader",
        Tone::Engaging => "engaging and energetic, hook the reader early",
    }
}

fn platform_guidance(platform: Platform) -> &'static str {
    match platform {
        Platform::Twitter => {
            "Write a Twitter thread. Respond with {\"segments\": [...]}: an array \
             of up to 10 tweet strings, each under 280 characters, numbered like \
             \"1/\", \"2/\".\n"
        }
        Platform::LinkedIn => {
            "Write a LinkedIn post under 3000 characters with a strong opening \
             line and 3-5 relevant hashtags at the end. Respond with \
             {\"text\": \"...\"}.\n"
        }
        Platform::Instagram => {
            "Write an Instagram caption under 2200 characters with line breaks \
             for readability and hashtags at the end. Respond with \
             {\"text\": \"...\"}.\n"
        }
        Platform::Blog => {
            "Write a Markdown blog post with a title, section headings, and a \
             conclusion. Respond with {\"text\": \"...\"}.\n"
        }
    }
}

/// Parse the backend response into a draft; shape mismatches are `Json`
/// errors (and therefore retryable upstream)
fn parse_draft(response: &Value, platform: Platform, tone: Tone) -> Result<ContentDraft> {
    if platform.is_threaded() {
        let segments = response
            .get("segments")
            .and_then(Value::as_array)
            .ok_or_else(|| FlowError::Json("expected a segments array".to_string()))?;

        let mut texts = Vec::with_capacity(segments.len());
        for segment in segments {
            let Some(s) = segment.as_str() else {
                return Err(FlowError::Json("segment is not a string".to_string()));
            };
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(FlowError::Json("empty thread segment".to_string()));
            }
            texts.push(trimmed.to_string());
        }
        if texts.is_empty() {
            return Err(FlowError::Json("empty thread".to_string()));
        }

        Ok(ContentDraft {
            platform,
            tone,
            segments: texts.len(),
            text: texts.join("\n\n"),
        })
    } else {
        let text = response
            .get("text")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| FlowError::Json("expected a text field".to_string()))?;

        Ok(ContentDraft {
            platform,
            tone,
            text: text.to_string(),
            segments: 1,
        })
    }
}

/// Enforce the platform's structural constraints on a parsed draft
fn validate_draft(draft: &ContentDraft) -> Result<()> {
    if draft.platform.is_threaded() {
        if draft.segments > crate::constants::content::TWITTER_MAX_SEGMENTS {
            return Err(FlowError::ContentTooLong {
                platform: draft.platform,
                limit: crate::constants::content::TWITTER_MAX_SEGMENTS,
                actual: draft.segments,
            });
        }
        let limit = crate::constants::content::TWITTER_SEGMENT_CHARS;
        for segment in draft.text.split("\n\n") {
            let actual = segment.chars().count();
            if actual > limit {
                return Err(FlowError::ContentTooLong {
                    platform: draft.platform,
                    limit,
                    actual,
                });
            }
        }
        return Ok(());
    }

    if let Some(limit) = draft.platform.char_limit() {
        let actual = draft.text.chars().count();
        if actual > limit {
            return Err(FlowError::ContentTooLong {
                platform: draft.platform,
                limit,
                actual,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
