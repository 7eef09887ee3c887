use regex::RegexSet;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::config::{RELEVANT_TAGS, SPAM_PATTERNS, TECH_KEYWORDS};
use crate::types::Article;

/// Keeps topically relevant, non-spam articles.
///
/// The predicate is pure: it never mutates articles and applying it twice
/// yields the same survivors.
pub struct ContentFilter {
    keywords: Vec<String>,
    relevant_tags: HashSet<String>,
    spam: RegexSet,
}

impl ContentFilter {
    pub fn new() -> Self {
        Self::with_rules(TECH_KEYWORDS, RELEVANT_TAGS, SPAM_PATTERNS)
    }

    pub fn with_rules(keywords: &[&str], relevant_tags: &[&str], spam_patterns: &[&str]) -> Self {
        Self {
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
            relevant_tags: relevant_tags.iter().map(|t| t.to_lowercase()).collect(),
            spam: RegexSet::new(spam_patterns).expect("spam patterns are valid regexes"),
        }
    }

    /// Relevant iff a tech keyword appears in the lowercased title+summary,
    /// or the tag set intersects the relevant-tag set.
    pub fn is_relevant(&self, article: &Article) -> bool {
        let text = format!("{} {}", article.title, article.summary).to_lowercase();
        if self.keywords.iter().any(|keyword| text.contains(keyword)) {
            return true;
        }
        article
            .tags
            .iter()
            .any(|tag| self.relevant_tags.contains(tag))
    }

    pub fn is_spam(&self, article: &Article) -> bool {
        let text = format!("{} {}", article.title, article.summary).to_lowercase();
        self.spam.is_match(&text)
    }

    /// Keep articles that are relevant and not spam, preserving order.
    pub fn filter(&self, articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();
        let survivors: Vec<Article> = articles
            .into_iter()
            .filter(|article| {
                if self.is_spam(article) {
                    debug!(title = %article.title, "filtered as spam");
                    return false;
                }
                if !self.is_relevant(article) {
                    debug!(title = %article.title, "filtered as off-topic");
                    return false;
                }
                true
            })
            .collect();

        info!("content filter kept {} of {} articles", survivors.len(), total);
        survivors
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new()
    }
}
