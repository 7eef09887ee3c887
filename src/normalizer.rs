use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use tracing::debug;

use crate::types::{push_tag, Article, RawRecord};

/// Summaries are capped at this many characters, ellipsis included.
pub const SUMMARY_MAX_CHARS: usize = 300;

/// Feed-provided tags kept per record, before source and language tags.
const MAX_FEED_TAGS: usize = 3;

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").expect("markup pattern is valid"))
}

/// Strip markup tags and collapse runs of whitespace.
pub fn clean_text(text: &str) -> String {
    let stripped = markup_re().replace_all(text, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cap `text` at [`SUMMARY_MAX_CHARS`] characters, appending "..." when cut.
pub fn truncate_summary(text: &str) -> String {
    if text.chars().count() <= SUMMARY_MAX_CHARS {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(SUMMARY_MAX_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

/// 16-hex-char digest of the cleaned title and URL.
///
/// Deterministic: the same cleaned inputs always produce the same hash.
/// Must be called after cleaning, never on raw markup.
pub fn content_hash(title: &str, url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(url.as_bytes());
    let digest = hasher.finalize();
    digest
        .iter()
        .take(8)
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Turns raw collector records into canonical articles, dropping anything
/// older than the freshness window.
pub struct Normalizer {
    freshness: Duration,
}

impl Normalizer {
    pub fn new(freshness_hours: i64) -> Self {
        Self {
            freshness: Duration::hours(freshness_hours),
        }
    }

    /// Normalize one record, or drop it.
    ///
    /// Drops are logged and never surfaced as errors; a malformed or stale
    /// record costs only itself.
    pub fn normalize(&self, raw: RawRecord, collected_at: DateTime<Utc>) -> Option<Article> {
        let title = clean_text(&raw.title);
        if title.is_empty() {
            debug!(url = %raw.url, "dropping record with empty title");
            return None;
        }

        match url::Url::parse(&raw.url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
            _ => {
                debug!(title = %title, url = %raw.url, "dropping record with invalid URL");
                return None;
            }
        }

        let summary = truncate_summary(&clean_text(raw.summary.as_deref().unwrap_or("")));

        // Publish time fallback chain: published -> updated -> collection time.
        let published_at = raw
            .published_at
            .or(raw.updated_at)
            .unwrap_or(collected_at);

        if published_at < collected_at - self.freshness {
            debug!(title = %title, %published_at, "dropping stale record");
            return None;
        }

        let language = raw.language.trim().to_lowercase();
        let mut tags: Vec<String> = Vec::new();
        push_tag(&mut tags, &raw.source);
        for tag in raw.feed_tags.iter().take(MAX_FEED_TAGS) {
            push_tag(&mut tags, tag);
        }
        push_tag(&mut tags, &language);

        // Hash strictly after cleaning so identity survives markup noise.
        let content_hash = content_hash(&title, &raw.url);

        Some(Article {
            title,
            url: raw.url,
            summary,
            published_at,
            source: raw.source,
            source_weight: raw.source_weight.clamp(0.0, 1.0),
            language,
            tags,
            score: 0.0,
            content_hash,
            author: raw.author,
            id: None,
        })
    }

    /// Normalize a whole batch, counting stale/invalid drops.
    pub fn normalize_batch(
        &self,
        records: Vec<RawRecord>,
        collected_at: DateTime<Utc>,
    ) -> (Vec<Article>, usize) {
        let total = records.len();
        let articles: Vec<Article> = records
            .into_iter()
            .filter_map(|raw| self.normalize(raw, collected_at))
            .collect();
        let dropped = total - articles.len();
        (articles, dropped)
    }
}
