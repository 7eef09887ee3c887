use tracing::info;

use crate::types::Article;

/// Orders scored articles and bounds the output for delivery.
pub struct Ranker {
    min_score: f64,
    top_n: usize,
}

impl Ranker {
    pub fn new(min_score: f64, top_n: usize) -> Self {
        Self { min_score, top_n }
    }

    /// Sort by score descending and keep the top N above the threshold.
    ///
    /// The sort is stable, so articles with equal scores retain their
    /// pre-ranking encounter order.
    pub fn select(&self, mut articles: Vec<Article>) -> Vec<Article> {
        let total = articles.len();

        articles.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        articles.retain(|article| article.score >= self.min_score);
        articles.truncate(self.top_n);

        info!(
            "selected {} of {} articles (threshold {}, limit {})",
            articles.len(),
            total,
            self.min_score,
            self.top_n
        );
        articles
    }
}
