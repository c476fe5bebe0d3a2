//! Result Normalization & Deduplication
//!
//! Pure, in-memory stage: merges heterogeneous per-source result lists into
//! one canonical, deterministically ordered sequence. No I/O, no mutation of
//! inputs; fully testable from fixed lists.
//!
//! Deduplication groups items by canonical URL or near-identical title
//! (normalized Levenshtein above a configurable threshold). Scoring blends
//! topic term overlap with a per-source prior, and recency decays with a
//! fixed half-life. The final order is total: relevance desc, recency desc,
//! title asc.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use regex::Regex;
use strsim::normalized_levenshtein;
use tracing::debug;
use url::Url;

use crate::config::ScoringConfig;
use crate::types::{CanonicalItem, RawSourceItem, SourceKind, Topic};

/// Query parameters stripped during URL canonicalization (exact matches;
/// `utm_*` is handled as a prefix family)
const TRACKING_PARAMS: [&str; 4] = ["fbclid", "gclid", "ref", "mc_cid"];

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}

pub struct Normalizer {
    config: ScoringConfig,
    /// Source-kind priors used in relevance scoring
    priors: BTreeMap<SourceKind, f64>,
    non_word: Regex,
}

impl Normalizer {
    pub fn new(config: ScoringConfig, priors: BTreeMap<SourceKind, f64>) -> Self {
        Self {
            config,
            priors,
            // Infallible: pattern is a compile-time constant
            non_word: Regex::new(r"[^a-z0-9\s]+").expect("valid regex"),
        }
    }

    /// Merge raw items from all sources into ranked canonical items.
    ///
    /// `now` is passed in so the stage stays pure and reproducible.
    pub fn normalize(
        &self,
        topic: &Topic,
        raw_items: Vec<RawSourceItem>,
        now: DateTime<Utc>,
    ) -> Vec<CanonicalItem> {
        let mut groups: Vec<Group> = Vec::new();

        for raw in raw_items {
            let canon_url = canonical_url(&raw.url);
            let canon_title = self.canonical_title(&raw.title);

            let existing = groups.iter_mut().find(|g| {
                g.canon_url == canon_url
                    || normalized_levenshtein(&g.canon_title, &canon_title)
                        >= self.config.similarity_threshold
            });

            match existing {
                Some(group) => group.merge(raw),
                None => groups.push(Group::new(raw, canon_url, canon_title)),
            }
        }

        debug!(groups = groups.len(), "Deduplicated raw items");

        let mut items: Vec<CanonicalItem> = groups
            .into_iter()
            .map(|g| self.score(topic, g, now))
            .collect();

        items.sort_by(CanonicalItem::cmp_rank);
        items
    }

    fn score(&self, topic: &Topic, group: Group, now: DateTime<Utc>) -> CanonicalItem {
        let overlap = term_overlap(topic, &group.canon_title, &group.summary);
        let prior = self
            .priors
            .get(&group.kind)
            .copied()
            .unwrap_or(crate::constants::scoring::WEB_PRIOR)
            .clamp(0.0, 1.0);

        let weight_sum = self.config.term_weight + self.config.prior_weight;
        let relevance =
            (self.config.term_weight * overlap + self.config.prior_weight * prior) / weight_sum;

        let recency = group
            .published
            .map(|published| recency_score(published, now, self.config.recency_half_life_days))
            .unwrap_or(0.0);

        CanonicalItem {
            title: group.title,
            url: group.canon_url,
            summary: group.summary,
            published: group.published,
            kind: group.kind,
            sources: group.sources,
            relevance: relevance.clamp(0.0, 1.0),
            recency,
        }
    }

    /// Lowercase, punctuation-stripped, whitespace-collapsed title
    fn canonical_title(&self, title: &str) -> String {
        let lower = title.to_lowercase();
        let stripped = self.non_word.replace_all(&lower, " ");
        stripped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// One dedup group: accumulates contributing raw items before scoring
struct Group {
    title: String,
    canon_title: String,
    canon_url: String,
    summary: String,
    published: Option<DateTime<Utc>>,
    kind: SourceKind,
    sources: BTreeSet<SourceKind>,
}

impl Group {
    fn new(raw: RawSourceItem, canon_url: String, canon_title: String) -> Self {
        Self {
            title: raw.title.trim().to_string(),
            canon_title,
            canon_url,
            summary: raw.snippet,
            published: raw.published,
            kind: raw.kind,
            sources: BTreeSet::from([raw.kind]),
        }
    }

    /// Fold a duplicate into this group: union sources, keep the richest
    /// summary and the earliest known publish date
    fn merge(&mut self, raw: RawSourceItem) {
        self.sources.insert(raw.kind);
        if raw.snippet.len() > self.summary.len() {
            self.summary = raw.snippet;
        }
        self.published = match (self.published, raw.published) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
    }
}

/// Canonicalize a URL: lowercase scheme/host, drop fragment and tracking
/// query parameters, trim the trailing slash. Unparseable input is trimmed
/// and returned as-is.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        // Re-serialize through form_urlencoded so decoded separators inside
        // values stay escaped
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.extend_pairs(&kept);
        url.set_query(Some(&serializer.finish()));
    }

    let mut out = url.to_string();
    if out.ends_with('/') && url.path() == "/" && url.query().is_none() {
        out.pop();
    }
    out
}

/// Fraction of topic terms appearing in the item's title or summary
fn term_overlap(topic: &Topic, canon_title: &str, summary: &str) -> f64 {
    let haystack = format!("{} {}", canon_title, summary.to_lowercase());
    let terms: Vec<&str> = topic.terms().collect();
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms.iter().filter(|t| haystack.contains(**t)).count();
    hits as f64 / terms.len() as f64
}

/// Exponential half-life decay of item age, in [0, 1]
fn recency_score(published: DateTime<Utc>, now: DateTime<Utc>, half_life_days: f64) -> f64 {
    let age_days = (now - published).num_seconds().max(0) as f64 / 86_400.0;
    0.5_f64.powf(age_days / half_life_days).clamp(0.0, 1.0)
}

// =============================================================================
// Tests
// =============================================================================
