use std::env;

use crate::types::{PipelineError, Result};

/// One RSS/Atom feed to poll, with its configured base importance.
#[derive(Debug, Clone)]
pub struct FeedSpec {
    pub url: String,
    pub source: String,
    pub weight: f64,
}

impl FeedSpec {
    pub fn new(url: &str, source: &str, weight: f64) -> Self {
        Self {
            url: url.to_string(),
            source: source.to_string(),
            weight,
        }
    }
}

/// Runtime configuration, read from the environment once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub slack_webhook_url: Option<String>,
    pub slack_bot_name: String,
    pub slack_icon_emoji: String,
    pub database_url: Option<String>,
    pub oracle_url: Option<String>,
    pub oracle_timeout_secs: u64,
    pub oracle_concurrency: usize,
    pub github_token: Option<String>,
    /// Records older than this (relative to collection time) are dropped.
    pub freshness_hours: i64,
    /// Date partitions scanned to prime the dedup hash set.
    pub lookback_days: i64,
    pub min_score: f64,
    pub top_n: usize,
    pub ttl_days: i64,
    pub collector_concurrency: usize,
    pub rss_feeds: Vec<FeedSpec>,
    pub subreddits: Vec<String>,
    pub github_languages: Vec<String>,
    pub github_weight: f64,
    pub reddit_weight: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            slack_webhook_url: env::var("SLACK_WEBHOOK_URL").ok(),
            slack_bot_name: env::var("SLACK_BOT_NAME")
                .unwrap_or_else(|_| "Tech News Bot".to_string()),
            slack_icon_emoji: env::var("SLACK_ICON_EMOJI")
                .unwrap_or_else(|_| ":newspaper:".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            oracle_url: env::var("ORACLE_URL").ok(),
            oracle_timeout_secs: env_parse("ORACLE_TIMEOUT_SECS", 10),
            oracle_concurrency: env_parse("ORACLE_CONCURRENCY", 4),
            github_token: env::var("GITHUB_TOKEN").ok(),
            freshness_hours: env_parse("FRESHNESS_HOURS", 12),
            lookback_days: env_parse("LOOKBACK_DAYS", 7),
            min_score: env_parse("MIN_SCORE_THRESHOLD", 0.5),
            top_n: env_parse("MAX_ARTICLES", 10),
            ttl_days: env_parse("TTL_DAYS", 30),
            collector_concurrency: env_parse("COLLECTOR_CONCURRENCY", 4),
            rss_feeds: default_feeds(),
            subreddits: vec![
                "programming".to_string(),
                "webdev".to_string(),
                "MachineLearning".to_string(),
                "devops".to_string(),
            ],
            github_languages: vec![
                "python".to_string(),
                "javascript".to_string(),
                "typescript".to_string(),
                "go".to_string(),
                "rust".to_string(),
            ],
            github_weight: 0.7,
            reddit_weight: 0.5,
        }
    }

    /// Check that everything a delivering run needs is present.
    pub fn validate(&self) -> Result<()> {
        if self.slack_webhook_url.is_none() {
            return Err(PipelineError::General(
                "SLACK_WEBHOOK_URL is not set".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_score) {
            return Err(PipelineError::General(format!(
                "MIN_SCORE_THRESHOLD must be within [0, 1], got {}",
                self.min_score
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

fn default_feeds() -> Vec<FeedSpec> {
    vec![
        FeedSpec::new("https://hnrss.org/frontpage", "hackernews", 0.8),
        FeedSpec::new(
            "https://feeds.feedburner.com/venturebeat/SZYF",
            "venturebeat",
            0.6,
        ),
        FeedSpec::new("https://zenn.dev/feed", "zenn", 0.6),
        FeedSpec::new("https://qiita.com/popular-items/feed", "qiita", 0.6),
    ]
}

/// Keywords that mark an article as topically relevant and feed the
/// scorer's keyword bonus.
pub const TECH_KEYWORDS: &[&str] = &[
    "ai",
    "machine learning",
    "python",
    "javascript",
    "react",
    "node.js",
    "docker",
    "kubernetes",
    "aws",
    "cloud",
    "api",
    "microservices",
    "blockchain",
    "web3",
    "rust",
    "golang",
    "typescript",
    "frontend",
    "backend",
    "devops",
    "cicd",
    "database",
    "security",
];

/// Tags that make an article relevant even without a keyword hit.
pub const RELEVANT_TAGS: &[&str] = &[
    "github",
    "hackernews",
    "zenn",
    "qiita",
    "r/programming",
    "r/webdev",
    "r/machinelearning",
    "r/devops",
    "programming",
    "software",
    "engineering",
];

/// Spam patterns, matched against the lowercased title + summary.
pub const SPAM_PATTERNS: &[&str] = &[
    r"\b(buy now|click here|limited time|act fast)\b",
    r"\b(make money|get rich|earn \$\d+)\b",
    r"\b(free trial|no credit card|risk free)\b",
    r"!{3,}",
    r"\b(crypto|bitcoin|ethereum)\b.*\b(profit|investment|trading)\b",
];
