use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::{error, info};

use super::{send_with_retry, Collector};
use crate::types::{RawRecord, Result};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "tech-news-bot/1.0";
const MAX_RETRIES: u32 = 2;
const PER_PAGE: u32 = 20;
/// Pause between per-language queries to stay inside API limits.
const RATE_LIMIT_PAUSE_MS: u64 = 2000;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<Repo>,
}

#[derive(Debug, Deserialize)]
struct Repo {
    name: String,
    full_name: String,
    html_url: String,
    description: Option<String>,
    language: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner: Option<Owner>,
}

#[derive(Debug, Deserialize)]
struct Owner {
    login: String,
}

/// Collects freshly created, already-starred repositories per language.
pub struct GitHubCollector {
    client: reqwest::Client,
    token: Option<String>,
    languages: Vec<String>,
    weight: f64,
}

impl GitHubCollector {
    pub fn new(token: Option<String>, languages: Vec<String>, weight: f64) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            token,
            languages,
            weight,
        }
    }

    async fn collect_language(&self, language: &str) -> Result<Vec<RawRecord>> {
        let yesterday = (Utc::now() - Duration::days(1)).format("%Y-%m-%d");
        let query = format!("created:>{} stars:>10 language:{}", yesterday, language);
        let per_page = PER_PAGE.to_string();

        let response = send_with_retry(
            || {
                let mut request = self
                    .client
                    .get(format!("{}/search/repositories", API_BASE))
                    .header("Accept", "application/vnd.github.v3+json")
                    .query(&[
                        ("q", query.as_str()),
                        ("sort", "stars"),
                        ("order", "desc"),
                        ("per_page", per_page.as_str()),
                    ]);
                if let Some(token) = &self.token {
                    request = request.header("Authorization", format!("token {}", token));
                }
                request
            },
            MAX_RETRIES,
        )
        .await?;

        let search: SearchResponse = response.json().await?;

        let records = search
            .items
            .into_iter()
            .take(PER_PAGE as usize)
            .map(|repo| {
                // A push after creation still counts as recent activity.
                let published_at = repo.created_at.max(repo.updated_at);
                let summary = repo.description.clone().unwrap_or_else(|| {
                    format!(
                        "New {} repository",
                        repo.language.as_deref().unwrap_or("GitHub")
                    )
                });

                RawRecord {
                    title: format!("{}: {}", repo.full_name, repo.name),
                    url: repo.html_url,
                    summary: Some(summary),
                    published_at: Some(published_at),
                    updated_at: Some(repo.updated_at),
                    source: "github".to_string(),
                    source_weight: self.weight,
                    language: "en".to_string(),
                    feed_tags: repo
                        .language
                        .map(|lang| vec![lang.to_lowercase()])
                        .unwrap_or_default(),
                    author: repo.owner.map(|owner| owner.login),
                }
            })
            .collect();

        Ok(records)
    }
}

#[async_trait]
impl Collector for GitHubCollector {
    fn name(&self) -> &str {
        "github"
    }

    async fn collect(&self) -> Result<Vec<RawRecord>> {
        let mut records = Vec::new();

        for (i, language) in self.languages.iter().enumerate() {
            match self.collect_language(language).await {
                Ok(mut batch) => {
                    info!("collected {} repos for {}", batch.len(), language);
                    records.append(&mut batch);
                }
                Err(error) => {
                    error!("failed to fetch GitHub trending for {}: {}", language, error);
                }
            }

            if i + 1 < self.languages.len() {
                tokio::time::sleep(std::time::Duration::from_millis(RATE_LIMIT_PAUSE_MS)).await;
            }
        }

        Ok(records)
    }
}
