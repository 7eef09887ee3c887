use async_trait::async_trait;
use chrono::Utc;
use feed_rs::parser;
use std::time::Duration;
use tracing::{error, info};

use super::{send_with_retry, Collector};
use crate::config::FeedSpec;
use crate::types::{PipelineError, RawRecord, Result};

const USER_AGENT: &str = "tech-news-bot/1.0";
const MAX_RETRIES: u32 = 2;

/// Pulls articles from a configured list of RSS/Atom feeds.
pub struct RssCollector {
    client: reqwest::Client,
    feeds: Vec<FeedSpec>,
}

impl RssCollector {
    pub fn new(feeds: Vec<FeedSpec>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .gzip(true)
            .build()
            .expect("failed to create HTTP client");
        Self { client, feeds }
    }

    async fn collect_feed(&self, feed: &FeedSpec) -> Result<Vec<RawRecord>> {
        let response = send_with_retry(|| self.client.get(&feed.url), MAX_RETRIES).await?;
        let body = response.bytes().await?;

        let parsed = parser::parse(body.as_ref())
            .map_err(|e| PipelineError::Parse(format!("failed to parse {}: {}", feed.url, e)))?;

        let language = parsed
            .language
            .as_deref()
            .map(|lang| lang.chars().take(2).collect::<String>())
            .unwrap_or_else(|| "en".to_string());

        let mut records = Vec::new();
        for entry in parsed.entries {
            let Some(link) = entry.links.first() else {
                continue;
            };

            let title = match entry.title {
                Some(text) => text.content,
                None => continue,
            };

            let summary = entry
                .summary
                .map(|text| text.content)
                .or_else(|| entry.content.and_then(|content| content.body));

            records.push(RawRecord {
                title,
                url: link.href.clone(),
                summary,
                published_at: entry.published.map(|dt| dt.with_timezone(&Utc)),
                updated_at: entry.updated.map(|dt| dt.with_timezone(&Utc)),
                source: feed.source.clone(),
                source_weight: feed.weight,
                language: language.clone(),
                feed_tags: entry.categories.into_iter().map(|c| c.term).collect(),
                author: entry.authors.first().map(|person| person.name.clone()),
            });
        }

        Ok(records)
    }
}

#[async_trait]
impl Collector for RssCollector {
    fn name(&self) -> &str {
        "rss"
    }

    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();

        // One bad feed only costs its own entries.
        for feed in &self.feeds {
            match self.collect_feed(feed).await {
                Ok(mut batch) => {
                    info!("fetched {} entries from {}", batch.len(), feed.source);
                    records.append(&mut batch);
                }
                Err(error) => {
                    error!("failed to fetch RSS feed {}: {}", feed.url, error);
                }
            }
        }

        Ok(records)
    }
}
