use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::collectors::{self, Collector};
use crate::config::Config;
use crate::dedup::Deduplicator;
use crate::filter::ContentFilter;
use crate::normalizer::Normalizer;
use crate::ranker::Ranker;
use crate::scorer::{ScoreOracle, Scorer};
use crate::slack::SlackNotifier;
use crate::store::{self, ArticleStore};
use crate::types::{Result, RunStats};

/// One batch run: collect → normalize → dedup → filter → score → rank →
/// persist → format → deliver.
///
/// Every stage degrades per item; the only failure that fails the run is
/// delivery. Persistence happens before delivery and is never rolled back.
pub async fn run(
    config: &Config,
    collectors: &[Box<dyn Collector>],
    oracle: Option<Arc<dyn ScoreOracle>>,
    store: &dyn ArticleStore,
    notifier: Option<&SlackNotifier>,
) -> Result<RunStats> {
    let mut stats = RunStats::default();
    let collected_at = Utc::now();

    info!("starting collection from {} sources", collectors.len());
    let records =
        collectors::collect_all(collectors, config.collector_concurrency, &mut stats).await;

    if records.is_empty() {
        warn!("no records collected from any source");
        info!("{}", stats.summary());
        return Ok(stats);
    }

    let normalizer = Normalizer::new(config.freshness_hours);
    let (articles, dropped) = normalizer.normalize_batch(records, collected_at);
    stats.normalized = articles.len();
    stats.dropped_stale = dropped;
    info!("normalized {} articles ({} dropped)", articles.len(), dropped);

    // A failed hash read degrades to an empty seen set; duplicates from
    // earlier runs may then slip through, which is acceptable.
    let seen = store::prime_hashes(store, config.lookback_days).await;
    let mut deduplicator = Deduplicator::new(seen);
    let articles = deduplicator.deduplicate(articles);
    stats.after_dedup = articles.len();

    let filter = ContentFilter::new();
    let articles = filter.filter(articles);
    stats.after_filter = articles.len();

    let scorer = match oracle {
        Some(oracle) => Scorer::with_oracle(oracle, config.oracle_concurrency),
        None => Scorer::heuristic_only(),
    };
    let articles = scorer.score_all(articles).await;

    // Persist everything that survived processing so future runs can dedup
    // against it, not just the delivered subset.
    for article in &articles {
        match store.upsert(article, config.ttl_days).await {
            Ok(()) => stats.persisted += 1,
            Err(error) => {
                warn!(title = %article.title, %error, "failed to persist article");
                stats.persist_failures += 1;
            }
        }
    }

    let ranker = Ranker::new(config.min_score, config.top_n);
    let selected = ranker.select(articles);
    stats.selected = selected.len();

    if let Some(notifier) = notifier {
        if selected.is_empty() {
            info!("no articles above threshold, skipping delivery");
        } else {
            notifier.send_digest(&selected, Utc::now()).await?;
            stats.delivered = selected.len();
        }
    }

    info!("{}", stats.summary());
    Ok(stats)
}
