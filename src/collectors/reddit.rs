use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{error, info};

use super::{send_with_retry, Collector};
use crate::types::{RawRecord, Result};

const USER_AGENT: &str = "tech-news-bot/1.0";
const MAX_RETRIES: u32 = 2;
const POST_LIMIT: u32 = 20;
const SELFTEXT_CHARS: usize = 200;
const RATE_LIMIT_PAUSE_MS: u64 = 2000;

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Post,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    url: String,
    permalink: String,
    #[serde(default)]
    selftext: String,
    created_utc: f64,
    author: Option<String>,
    #[serde(default)]
    is_self: bool,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    link_flair_text: Option<String>,
}

/// Collects hot posts from a configured list of subreddits via the public
/// JSON listings.
pub struct RedditCollector {
    client: reqwest::Client,
    subreddits: Vec<String>,
    weight: f64,
}

impl RedditCollector {
    pub fn new(subreddits: Vec<String>, weight: f64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            subreddits,
            weight,
        }
    }

    async fn collect_subreddit(&self, subreddit: &str) -> Result<Vec<RawRecord>> {
        let url = format!(
            "https://www.reddit.com/r/{}/hot.json?limit={}",
            subreddit, POST_LIMIT
        );
        let response = send_with_retry(|| self.client.get(&url), MAX_RETRIES).await?;
        let listing: Listing = response.json().await?;

        let records = listing
            .data
            .children
            .into_iter()
            .map(|child| self.record_from_post(child.data, subreddit))
            .collect();

        Ok(records)
    }

    fn record_from_post(&self, post: Post, subreddit: &str) -> RawRecord {
        // Self posts link back to Reddit instead of an empty external URL.
        let url = if post.is_self {
            format!("https://reddit.com{}", post.permalink)
        } else {
            post.url
        };

        let mut summary_parts: Vec<String> = Vec::new();
        let selftext = post.selftext.trim();
        if !selftext.is_empty() {
            summary_parts.push(selftext.chars().take(SELFTEXT_CHARS).collect());
        }
        summary_parts.push(format!(
            "👍 {} upvotes, 💬 {} comments",
            post.score, post.num_comments
        ));
        if let Some(flair) = &post.link_flair_text {
            summary_parts.push(format!("[{}]", flair));
        }

        RawRecord {
            title: post.title,
            url,
            summary: Some(summary_parts.join(" | ")),
            published_at: DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0),
            updated_at: None,
            source: "reddit".to_string(),
            source_weight: self.weight,
            language: "en".to_string(),
            feed_tags: vec![format!("r/{}", subreddit.to_lowercase())],
            author: post.author,
        }
    }
}

#[async_trait]
impl Collector for RedditCollector {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();

        for (i, subreddit) in self.subreddits.iter().enumerate() {
            match self.collect_subreddit(subreddit).await {
                Ok(mut batch) => {
                    info!("collected {} posts from r/{}", batch.len(), subreddit);
                    records.append(&mut batch);
                }
                Err(error) => {
                    error!("failed to fetch r/{}: {}", subreddit, error);
                }
            }

            if i + 1 < self.subreddits.len() {
                tokio::time::sleep(std::time::Duration::from_millis(RATE_LIMIT_PAUSE_MS)).await;
            }
        }

        Ok(records)
    }
}
