use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashSet;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use news_digest::collectors::Collector;
use news_digest::normalizer::{self, Normalizer};
use news_digest::scorer::{MockBehavior, MockScoreOracle, OracleResponse, parse_verdict};
use news_digest::slack::Block;
use news_digest::store::{ArticleStore, MemoryStore};
use news_digest::types::{PipelineError, RawRecord, Result};
use news_digest::{
    pipeline, Article, Config, ContentFilter, Deduplicator, Ranker, Scorer, SlackNotifier,
};

fn raw(title: &str, url: &str, source: &str, weight: f64) -> RawRecord {
    RawRecord {
        title: title.to_string(),
        url: url.to_string(),
        summary: Some("A deep dive into Rust and Docker tooling".to_string()),
        published_at: Some(Utc::now()),
        updated_at: None,
        source: source.to_string(),
        source_weight: weight,
        language: "en".to_string(),
        feed_tags: vec!["tooling".to_string()],
        author: None,
    }
}

fn article(title: &str, url: &str, source: &str, weight: f64, score: f64) -> Article {
    Article {
        title: title.to_string(),
        url: url.to_string(),
        summary: "A deep dive into Rust and Docker tooling".to_string(),
        published_at: Utc::now(),
        source: source.to_string(),
        source_weight: weight,
        language: "en".to_string(),
        tags: vec![source.to_string(), "en".to_string()],
        score,
        content_hash: normalizer::content_hash(title, url),
        author: None,
        id: None,
    }
}

fn test_config() -> Config {
    let mut config = Config::from_env();
    config.min_score = 0.5;
    config.top_n = 10;
    config.freshness_hours = 12;
    config.lookback_days = 7;
    config
}

#[test]
fn content_hash_is_deterministic() {
    let a = normalizer::content_hash("Launch", "http://x.test/a");
    let b = normalizer::content_hash("Launch", "http://x.test/a");
    assert_eq!(a, b);
    assert_eq!(a.len(), 16);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));

    let other = normalizer::content_hash("Launch", "http://x.test/b");
    assert_ne!(a, other);
}

#[test]
fn normalizer_cleans_and_truncates() {
    let normalizer = Normalizer::new(12);
    let mut record = raw(
        "<b>Big   News</b> about <i>Rust</i>",
        "https://example.com/big-news",
        "hackernews",
        0.8,
    );
    record.summary = Some(format!("<p>{}</p>", "x".repeat(400)));

    let article = normalizer.normalize(record, Utc::now()).unwrap();
    assert_eq!(article.title, "Big News about Rust");
    assert_eq!(article.summary.chars().count(), 300);
    assert!(article.summary.ends_with("..."));
    assert_eq!(
        article.content_hash,
        normalizer::content_hash("Big News about Rust", "https://example.com/big-news")
    );
}

#[test]
fn normalizer_drops_stale_records() {
    let normalizer = Normalizer::new(12);
    let collected_at = Utc::now();

    let mut record = raw("Old story", "https://example.com/old", "hackernews", 0.8);
    record.published_at = Some(collected_at - Duration::hours(13));
    assert!(normalizer.normalize(record, collected_at).is_none());

    let mut fresh = raw("Fresh story", "https://example.com/new", "hackernews", 0.8);
    fresh.published_at = Some(collected_at - Duration::hours(11));
    assert!(normalizer.normalize(fresh, collected_at).is_some());
}

#[test]
fn normalizer_drops_invalid_urls() {
    let normalizer = Normalizer::new(12);

    let record = raw("Broken link", "not a url", "hackernews", 0.8);
    assert!(normalizer.normalize(record, Utc::now()).is_none());

    let record = raw("Wrong scheme", "ftp://example.com/file", "hackernews", 0.8);
    assert!(normalizer.normalize(record, Utc::now()).is_none());
}

#[test]
fn normalizer_publish_time_fallback_chain() {
    let normalizer = Normalizer::new(12);
    let collected_at = Utc::now();
    let updated = collected_at - Duration::hours(2);

    let mut record = raw("Updated only", "https://example.com/u", "hackernews", 0.8);
    record.published_at = None;
    record.updated_at = Some(updated);
    let article = normalizer.normalize(record, collected_at).unwrap();
    assert_eq!(article.published_at, updated);

    let mut record = raw("No times", "https://example.com/n", "hackernews", 0.8);
    record.published_at = None;
    record.updated_at = None;
    let article = normalizer.normalize(record, collected_at).unwrap();
    assert_eq!(article.published_at, collected_at);
}

#[test]
fn normalizer_tags_are_deduplicated() {
    let normalizer = Normalizer::new(12);
    let mut record = raw("Tag soup", "https://example.com/tags", "hackernews", 0.8);
    record.feed_tags = vec![
        "Rust".to_string(),
        "rust".to_string(),
        "Tooling".to_string(),
        "ignored-fourth".to_string(),
    ];

    let article = normalizer.normalize(record, Utc::now()).unwrap();
    assert_eq!(
        article.tags,
        vec!["hackernews", "rust", "tooling", "en"]
    );
}

#[test]
fn dedup_scenario_a_exact_hash() {
    // Same title and URL from two different sources hash identically.
    let normalizer = Normalizer::new(12);
    let first = normalizer
        .normalize(raw("Launch", "http://x.test/a", "hackernews", 0.8), Utc::now())
        .unwrap();
    let second = normalizer
        .normalize(raw("Launch", "http://x.test/a", "reddit", 0.5), Utc::now())
        .unwrap();
    assert_eq!(first.content_hash, second.content_hash);

    let mut deduplicator = Deduplicator::new(HashSet::new());
    let survivors = deduplicator.deduplicate(vec![first, second]);
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].source, "hackernews");
}

#[test]
fn dedup_rejects_seeded_hashes_at_any_position() {
    let target = article("Seen before", "https://example.com/seen", "hackernews", 0.8, 0.0);
    let seeded: HashSet<String> = [target.content_hash.clone()].into_iter().collect();

    let batch = vec![
        article("Other one", "https://a.example.com/1", "hackernews", 0.8, 0.0),
        target.clone(),
        article("Another completely different", "https://b.example.org/xyz", "reddit", 0.5, 0.0),
    ];

    let mut deduplicator = Deduplicator::new(seeded.clone());
    let survivors = deduplicator.deduplicate(batch);
    assert!(survivors.iter().all(|a| a.content_hash != target.content_hash));

    // Same hash at the front of a batch is rejected just the same.
    let mut deduplicator = Deduplicator::new(seeded);
    let survivors = deduplicator.deduplicate(vec![target.clone()]);
    assert!(survivors.is_empty());
}

#[test]
fn dedup_rejects_near_duplicate_urls() {
    let batch = vec![
        article("Rust 1.80 released", "https://x.test/rust-1-80-release", "hackernews", 0.8, 0.0),
        article("Rust 1.80 is out", "https://x.test/rust-1-80-released", "reddit", 0.5, 0.0),
        article("Unrelated story", "https://elsewhere.example.org/completely/other", "zenn", 0.6, 0.0),
    ];

    let mut deduplicator = Deduplicator::new(HashSet::new());
    let survivors = deduplicator.deduplicate(batch);
    assert_eq!(survivors.len(), 2);
    assert_eq!(survivors[0].source, "hackernews");

    // Property: no surviving pair is more than 0.8 similar.
    for (i, a) in survivors.iter().enumerate() {
        for b in survivors.iter().skip(i + 1) {
            assert!(strsim::normalized_levenshtein(&a.url, &b.url) <= 0.8);
        }
    }
}

#[test]
fn dedup_preserves_encounter_order() {
    let batch = vec![
        article("Low score first", "https://a.example.com/first", "reddit", 0.4, 0.0),
        article("High score second", "https://b.example.net/second", "hackernews", 0.9, 0.0),
    ];

    let mut deduplicator = Deduplicator::new(HashSet::new());
    let survivors = deduplicator.deduplicate(batch);
    assert_eq!(survivors[0].title, "Low score first");
    assert_eq!(survivors[1].title, "High score second");
}

#[test]
fn filter_keeps_relevant_drops_spam() {
    let filter = ContentFilter::new();

    let relevant = article("Kubernetes operators in practice", "https://x.test/k8s", "blog", 0.5, 0.0);
    let mut spam = article("Kubernetes secrets", "https://x.test/spam", "blog", 0.5, 0.0);
    spam.summary = "Buy now and get rich with crypto trading signals".to_string();
    let mut off_topic = article("My holiday in the hills", "https://x.test/walk", "blog", 0.5, 0.0);
    off_topic.summary = "Pictures of snow".to_string();
    off_topic.tags = vec!["travel".to_string()];

    let survivors = filter.filter(vec![relevant.clone(), spam, off_topic]);
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].title, relevant.title);
}

#[test]
fn filter_relevance_by_tag_alone() {
    let filter = ContentFilter::new();
    let mut by_tag = article("Weekly roundup", "https://x.test/roundup", "reddit", 0.5, 0.0);
    by_tag.summary = "This week's highlights".to_string();
    by_tag.tags = vec!["r/programming".to_string()];

    assert!(filter.is_relevant(&by_tag));
}

#[test]
fn filter_is_idempotent() {
    let filter = ContentFilter::new();
    let batch = vec![
        article("Rust async patterns", "https://x.test/1", "hackernews", 0.8, 0.0),
        article("Win a free cruise, click here", "https://x.test/2", "blog", 0.5, 0.0),
        article("Docker images at scale", "https://x.test/3", "zenn", 0.6, 0.0),
    ];

    let once = filter.filter(batch);
    let twice = filter.filter(once.clone());
    assert_eq!(once.len(), twice.len());
    for (a, b) in once.iter().zip(twice.iter()) {
        assert_eq!(a.content_hash, b.content_hash);
    }
}

#[test]
fn scorer_scenario_b_weight_only() {
    // Title of 10 chars is below the bonus threshold and contains no
    // keywords; the heuristic is exactly the source weight.
    let mut subject = article("Launchpads", "https://x.test/launchpads", "custom", 0.9, 0.0);
    subject.summary = String::new();

    let score = Scorer::heuristic(&subject);
    assert!((score - 0.9).abs() < 1e-9);
}

#[test]
fn scorer_bonuses_and_cap() {
    let mut subject = article(
        "Kubernetes and Docker security on AWS cloud",
        "https://x.test/k8s-docker",
        "custom",
        0.9,
        0.0,
    );
    subject.summary = "api microservices devops database rust python".to_string();

    // Weight 0.9 + title bonus 0.1 + keyword bonus (capped) must clamp to 1.0.
    let score = Scorer::heuristic(&subject);
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn scores_stay_in_range() {
    for weight in [0.0, 0.3, 0.7, 1.0] {
        let subject = article(
            "Rust and Docker and Kubernetes on AWS with Python",
            "https://x.test/everything",
            "custom",
            weight,
            0.0,
        );
        let score = Scorer::heuristic(&subject);
        assert!((0.0..=1.0).contains(&score), "score {} out of range", score);
    }
}

#[tokio::test]
async fn scorer_scenario_c_oracle_timeout_degrades() {
    let articles = vec![article("Rust ships a new release", "https://x.test/rust", "hackernews", 0.8, 0.0)];
    let expected = Scorer::heuristic(&articles[0]);

    let oracle = Arc::new(MockScoreOracle::new(MockBehavior::Timeout));
    let scorer = Scorer::with_oracle(oracle, 2);
    let scored = scorer.score_all(articles).await;

    assert_eq!(scored.len(), 1);
    assert!((scored[0].score - expected).abs() < 1e-9);
}

#[tokio::test]
async fn scorer_applies_oracle_verdict() {
    let mut subject = article("Rust ships a new release", "https://x.test/rust", "hackernews", 0.8, 0.0);
    subject.summary = "Short note".to_string(); // under 50 chars
    subject.tags = vec!["hackernews".to_string(), "rust".to_string(), "en".to_string()];

    let oracle = Arc::new(MockScoreOracle::new(MockBehavior::Verdict {
        score: 0.95,
        summary: Some("A generated, much richer summary of the release".to_string()),
        tags: vec!["Rust".to_string(), "release".to_string()],
    }));
    let scorer = Scorer::with_oracle(oracle, 2);
    let scored = scorer.score_all(vec![subject]).await;

    assert!((scored[0].score - 0.95).abs() < 1e-9);
    assert_eq!(
        scored[0].summary,
        "A generated, much richer summary of the release"
    );
    assert!(scored[0].tags.contains(&"release".to_string()));
    // "Rust" from the oracle must not duplicate the existing "rust" tag.
    assert_eq!(
        scored[0].tags.iter().filter(|t| *t == "rust").count(),
        1
    );
}

#[tokio::test]
async fn scorer_keeps_long_summary_over_oracle() {
    let mut subject = article("Rust ships a new release", "https://x.test/rust", "hackernews", 0.8, 0.0);
    subject.summary = "x".repeat(60); // at or above the 50-char threshold

    let oracle = Arc::new(MockScoreOracle::new(MockBehavior::Verdict {
        score: 0.6,
        summary: Some("Replacement".to_string()),
        tags: Vec::new(),
    }));
    let scorer = Scorer::with_oracle(oracle, 1);
    let scored = scorer.score_all(vec![subject]).await;
    assert_eq!(scored[0].summary, "x".repeat(60));
}

#[test]
fn oracle_response_parsing() {
    let ok = parse_verdict(OracleResponse {
        score: " 0.85 ".to_string(),
        summary: None,
        tags: None,
    })
    .unwrap();
    assert!((ok.score - 0.85).abs() < 1e-9);

    assert!(parse_verdict(OracleResponse {
        score: "very important".to_string(),
        summary: None,
        tags: None,
    })
    .is_err());

    assert!(parse_verdict(OracleResponse {
        score: "1.5".to_string(),
        summary: None,
        tags: None,
    })
    .is_err());
}

#[test]
fn ranker_scenario_d_threshold_and_truncation() {
    let mut batch = Vec::new();
    for i in 0..15 {
        // Scores 0.30, 0.35, ... 1.00.
        let score = 0.30 + 0.05 * i as f64;
        batch.push(article(
            &format!("Story {}", i),
            &format!("https://site-{}.example.com/story", i),
            "hackernews",
            0.8,
            score,
        ));
    }

    let ranker = Ranker::new(0.6, 10);
    let selected = ranker.select(batch);

    assert_eq!(selected.len(), 9); // scores 0.60..=1.00
    assert!(selected.iter().all(|a| a.score >= 0.6));
    for pair in selected.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn ranker_is_stable_on_ties() {
    let batch = vec![
        article("First at 0.7", "https://a.example.com/1", "hackernews", 0.8, 0.7),
        article("Second at 0.7", "https://b.example.net/2", "reddit", 0.5, 0.7),
        article("Top at 0.9", "https://c.example.org/3", "zenn", 0.6, 0.9),
        article("Third at 0.7", "https://d.example.io/4", "qiita", 0.6, 0.7),
    ];

    let ranker = Ranker::new(0.5, 10);
    let selected = ranker.select(batch);

    assert_eq!(selected[0].title, "Top at 0.9");
    assert_eq!(selected[1].title, "First at 0.7");
    assert_eq!(selected[2].title, "Second at 0.7");
    assert_eq!(selected[3].title, "Third at 0.7");
}

#[test]
fn ranker_never_exceeds_limits() {
    let batch: Vec<Article> = (0..4)
        .map(|i| {
            article(
                &format!("Story number {}", i),
                &format!("https://site-{}.example.com/s", i),
                "hackernews",
                0.8,
                0.8,
            )
        })
        .collect();

    let ranker = Ranker::new(0.5, 10);
    let selected = ranker.select(batch.clone());
    assert!(selected.len() <= 10);
    assert!(selected.len() <= batch.len());

    let tight = Ranker::new(0.5, 2);
    assert_eq!(tight.select(batch).len(), 2);
}

struct StaticCollector {
    name: String,
    records: Vec<RawRecord>,
}

#[async_trait]
impl Collector for StaticCollector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self) -> Result<Vec<RawRecord>> {
        Ok(self.records.clone())
    }
}

struct FailingCollector;

#[async_trait]
impl Collector for FailingCollector {
    fn name(&self) -> &str {
        "broken"
    }

    async fn collect(&self) -> Result<Vec<RawRecord>> {
        Err(PipelineError::General("connection refused".to_string()))
    }
}

struct FailingStore;

#[async_trait]
impl ArticleStore for FailingStore {
    async fn recent_hashes(&self, _lookback_days: i64) -> Result<std::collections::HashSet<String>> {
        Err(PipelineError::General("store unavailable".to_string()))
    }

    async fn upsert(&self, _article: &Article, _ttl_days: i64) -> Result<()> {
        Err(PipelineError::General("store unavailable".to_string()))
    }
}

#[tokio::test]
async fn pipeline_end_to_end_without_delivery() {
    let config = test_config();
    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(StaticCollector {
            name: "hackernews".to_string(),
            records: vec![
                raw("Rust 1.80 released with new features", "https://x.test/rust-release", "hackernews", 0.8),
                raw("Rust 1.80 released with new features", "https://x.test/rust-release", "hackernews", 0.8),
                raw("Win a free cruise, click here now", "https://x.test/cruise", "hackernews", 0.8),
            ],
        }),
        Box::new(FailingCollector),
    ];
    let store = MemoryStore::new();

    let stats = pipeline::run(&config, &collectors, None, &store, None)
        .await
        .unwrap();

    assert_eq!(stats.total_collected(), 3);
    assert_eq!(stats.collection_errors.len(), 1);
    assert_eq!(stats.after_dedup, 2);
    assert_eq!(stats.after_filter, 1);
    assert_eq!(stats.selected, 1);
    assert_eq!(stats.persisted, 1);
    assert_eq!(stats.delivered, 0);
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn pipeline_survives_store_read_failure() {
    let config = test_config();
    let collectors: Vec<Box<dyn Collector>> = vec![Box::new(StaticCollector {
        name: "hackernews".to_string(),
        records: vec![raw(
            "Kubernetes 2.0 announced at last",
            "https://x.test/k8s-two",
            "hackernews",
            0.8,
        )],
    })];

    // Both the hash read and every upsert fail; the run still completes.
    let stats = pipeline::run(&config, &collectors, None, &FailingStore, None)
        .await
        .unwrap();

    assert_eq!(stats.after_dedup, 1);
    assert_eq!(stats.persisted, 0);
    assert_eq!(stats.persist_failures, 1);
    assert_eq!(stats.selected, 1);
}

/// Webhook stand-in that answers every request with the given status line.
async fn spawn_rejecting_webhook(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 8192];
                let _ = socket.read(&mut buf).await;
                let response = format!(
                    "{}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    status_line
                );
                let _ = socket.write_all(response.as_bytes()).await;
            });
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn notifier_surfaces_rejected_delivery() {
    let url = spawn_rejecting_webhook("HTTP/1.1 500 Internal Server Error").await;
    let notifier = SlackNotifier::new(url, "Tech News Bot".to_string(), ":newspaper:".to_string());

    let err = notifier
        .send_blocks(&[Block::Divider])
        .await
        .unwrap_err();
    match err {
        PipelineError::Delivery { status } => assert_eq!(status, 500),
        other => panic!("expected delivery error, got {:?}", other),
    }
}

#[tokio::test]
async fn pipeline_fails_on_rejected_delivery_but_keeps_persisted_articles() {
    let config = test_config();
    let collectors: Vec<Box<dyn Collector>> = vec![Box::new(StaticCollector {
        name: "hackernews".to_string(),
        records: vec![raw(
            "Rust 1.80 released with new features",
            "https://x.test/rust-release",
            "hackernews",
            0.8,
        )],
    })];
    let store = MemoryStore::new();

    let url = spawn_rejecting_webhook("HTTP/1.1 500 Internal Server Error").await;
    let notifier = SlackNotifier::new(url, "Tech News Bot".to_string(), ":newspaper:".to_string());

    let outcome = pipeline::run(&config, &collectors, None, &store, Some(&notifier)).await;
    match outcome {
        Err(PipelineError::Delivery { status }) => assert_eq!(status, 500),
        other => panic!("expected delivery failure, got {:?}", other),
    }

    // Persistence happened before the delivery attempt and stands.
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn pipeline_rejects_cross_run_duplicates() {
    let config = test_config();
    let record = raw(
        "Rust 1.80 released with new features",
        "https://x.test/rust-release",
        "hackernews",
        0.8,
    );
    let collectors: Vec<Box<dyn Collector>> = vec![Box::new(StaticCollector {
        name: "hackernews".to_string(),
        records: vec![record],
    })];
    let store = MemoryStore::new();

    let first = pipeline::run(&config, &collectors, None, &store, None)
        .await
        .unwrap();
    assert_eq!(first.after_dedup, 1);

    // Second run sees the persisted hash and drops the same story.
    let second = pipeline::run(&config, &collectors, None, &store, None)
        .await
        .unwrap();
    assert_eq!(second.after_dedup, 0);
}
