use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A raw item as produced by a collector, before normalization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub source: String,
    pub source_weight: f64,
    pub language: String,
    pub feed_tags: Vec<String>,
    pub author: Option<String>,
}

/// A normalized article flowing through the pipeline.
///
/// `content_hash` is computed once during normalization from the cleaned
/// title and URL and is the article's identity for deduplication. `score`
/// stays within [0, 1] at every stage; only the scorer writes to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub url: String,
    pub summary: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    pub source_weight: f64,
    /// Lowercased feed language; present in `tags` but hidden when tags are
    /// displayed.
    pub language: String,
    pub tags: Vec<String>,
    pub score: f64,
    pub content_hash: String,
    pub author: Option<String>,
    /// Assigned by the store at persistence time; the pipeline ignores it.
    pub id: Option<Uuid>,
}

impl Article {
    /// Add a tag, lowercased, skipping case-insensitive duplicates.
    pub fn add_tag(&mut self, tag: &str) {
        push_tag(&mut self.tags, tag);
    }
}

/// Push a lowercased tag onto `tags` unless an equal tag is already present.
pub fn push_tag(tags: &mut Vec<String>, tag: &str) {
    let tag = tag.trim().to_lowercase();
    if !tag.is_empty() && !tags.iter().any(|t| *t == tag) {
        tags.push(tag);
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("collection failed for {source_name}: {message}")]
    Collection { source_name: String, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed parse error: {0}")]
    Parse(String),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("delivery rejected with HTTP status {status}")]
    Delivery { status: u16 },

    #[error("{0}")]
    General(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Per-run counters, logged as a single summary line when the run ends.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    pub collected: HashMap<String, usize>,
    pub collection_errors: Vec<(String, String)>,
    pub normalized: usize,
    pub dropped_stale: usize,
    pub after_dedup: usize,
    pub after_filter: usize,
    pub selected: usize,
    pub persisted: usize,
    pub persist_failures: usize,
    pub delivered: usize,
}

impl RunStats {
    pub fn add_source(&mut self, source: &str, count: usize) {
        self.collected.insert(source.to_string(), count);
    }

    pub fn add_collection_error(&mut self, source: &str, message: String) {
        self.collection_errors.push((source.to_string(), message));
    }

    pub fn total_collected(&self) -> usize {
        self.collected.values().sum()
    }

    pub fn summary(&self) -> String {
        let mut per_source: Vec<String> = self
            .collected
            .iter()
            .map(|(source, count)| format!("{}={}", source, count))
            .collect();
        per_source.sort();

        format!(
            "collected {} ({}), stale {}, deduped to {}, filtered to {}, selected {}, persisted {} ({} failed), delivered {}, source errors {}",
            self.total_collected(),
            per_source.join(" "),
            self.dropped_stale,
            self.after_dedup,
            self.after_filter,
            self.selected,
            self.persisted,
            self.persist_failures,
            self.delivered,
            self.collection_errors.len(),
        )
    }
}
