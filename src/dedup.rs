use std::collections::HashSet;
use strsim::normalized_levenshtein;
use tracing::{debug, info};

use crate::types::Article;

/// Two URLs with a similarity ratio above this are treated as the same story.
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Removes exact and near-duplicate articles.
///
/// The seen-hash set is a read-once snapshot primed from storage for the
/// configured lookback window and passed in explicitly; it grows as articles
/// are accepted during the run but is never shared across runs.
///
/// Articles are processed in encounter order and the first occurrence wins.
/// Later stages rely on that ordering for tie-breaks, so this step must stay
/// sequential.
pub struct Deduplicator {
    seen_hashes: HashSet<String>,
}

impl Deduplicator {
    pub fn new(seen_hashes: HashSet<String>) -> Self {
        Self { seen_hashes }
    }

    /// Drop duplicates, preserving the input order of survivors.
    ///
    /// Exact `content_hash` matches (against the primed set or earlier
    /// articles in this batch) are rejected first; the fuzzy URL comparison
    /// only runs against articles already accepted in this run.
    pub fn deduplicate(&mut self, articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();
        let mut accepted: Vec<Article> = Vec::new();

        for article in articles {
            if self.seen_hashes.contains(&article.content_hash) {
                debug!(title = %article.title, hash = %article.content_hash, "duplicate by hash");
                continue;
            }

            let near_duplicate = accepted
                .iter()
                .any(|kept| normalized_levenshtein(&kept.url, &article.url) > SIMILARITY_THRESHOLD);
            if near_duplicate {
                debug!(title = %article.title, url = %article.url, "near-duplicate by URL");
                continue;
            }

            self.seen_hashes.insert(article.content_hash.clone());
            accepted.push(article);
        }

        info!(
            "deduplication kept {} of {} articles",
            accepted.len(),
            total
        );
        accepted
    }

    pub fn seen_count(&self) -> usize {
        self.seen_hashes.len()
    }
}
