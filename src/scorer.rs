use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::TECH_KEYWORDS;
use crate::normalizer::{clean_text, truncate_summary};
use crate::types::Article;

/// Bonus for a title whose length sits in [20, 100] characters.
const TITLE_LENGTH_BONUS: f64 = 0.1;
/// Per-keyword bonus, capped at [`KEYWORD_BONUS_CAP`].
const KEYWORD_BONUS: f64 = 0.05;
const KEYWORD_BONUS_CAP: f64 = 0.2;
/// Below this summary length the oracle's generated summary replaces ours.
const SHORT_SUMMARY_CHARS: usize = 50;

/// Request sent to the external scoring oracle.
#[derive(Debug, Clone, Serialize)]
pub struct OracleRequest {
    pub title: String,
    pub summary: String,
    pub source: String,
}

impl OracleRequest {
    pub fn for_article(article: &Article) -> Self {
        Self {
            title: article.title.clone(),
            summary: article.summary.clone(),
            source: article.source.clone(),
        }
    }
}

/// Wire shape of the oracle's reply. The score arrives as a numeric string.
#[derive(Debug, Clone, Deserialize)]
pub struct OracleResponse {
    pub score: String,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// A validated oracle reply: score already parsed and range-checked.
#[derive(Debug, Clone)]
pub struct OracleVerdict {
    pub score: f64,
    pub summary: Option<String>,
    pub tags: Vec<String>,
}

/// Everything that can go wrong talking to the oracle. Each variant degrades
/// the affected article to its heuristic score; none of them propagate past
/// the scorer.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle call timed out after {0:?}")]
    Timeout(Duration),

    #[error("oracle transport error: {0}")]
    Transport(String),

    #[error("malformed oracle response: {0}")]
    Malformed(String),

    #[error("oracle score {0} outside [0, 1]")]
    OutOfRange(f64),
}

/// External scoring/summarization collaborator.
#[async_trait]
pub trait ScoreOracle: Send + Sync {
    async fn assess(&self, request: OracleRequest) -> Result<OracleVerdict, OracleError>;
}

/// HTTP oracle client with a hard per-call timeout.
pub struct HttpScoreOracle {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl HttpScoreOracle {
    pub fn new(endpoint: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            endpoint,
            timeout,
        }
    }
}

#[async_trait]
impl ScoreOracle for HttpScoreOracle {
    async fn assess(&self, request: OracleRequest) -> Result<OracleVerdict, OracleError> {
        let exchange = async {
            let response = self
                .client
                .post(&self.endpoint)
                .json(&request)
                .send()
                .await
                .map_err(|e| OracleError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(OracleError::Transport(format!("HTTP {}", status)));
            }

            response
                .json::<OracleResponse>()
                .await
                .map_err(|e| OracleError::Malformed(e.to_string()))
        };

        let body = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| OracleError::Timeout(self.timeout))??;

        parse_verdict(body)
    }
}

/// Validate a raw oracle response into a verdict.
pub fn parse_verdict(body: OracleResponse) -> Result<OracleVerdict, OracleError> {
    let score: f64 = body
        .score
        .trim()
        .parse()
        .map_err(|_| OracleError::Malformed(format!("non-numeric score {:?}", body.score)))?;

    if !(0.0..=1.0).contains(&score) {
        return Err(OracleError::OutOfRange(score));
    }

    Ok(OracleVerdict {
        score,
        summary: body.summary,
        tags: body.tags.unwrap_or_default(),
    })
}

/// Scripted oracle for tests and local development.
pub struct MockScoreOracle {
    behavior: MockBehavior,
}

#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always return this score, with no summary or tags.
    Score(f64),
    /// Return a full verdict.
    Verdict {
        score: f64,
        summary: Option<String>,
        tags: Vec<String>,
    },
    /// Fail every call as a timeout.
    Timeout,
    /// Fail every call as a malformed response.
    Malformed,
}

impl MockScoreOracle {
    pub fn new(behavior: MockBehavior) -> Self {
        Self { behavior }
    }
}

#[async_trait]
impl ScoreOracle for MockScoreOracle {
    async fn assess(&self, _request: OracleRequest) -> Result<OracleVerdict, OracleError> {
        match &self.behavior {
            MockBehavior::Score(score) => Ok(OracleVerdict {
                score: *score,
                summary: None,
                tags: Vec::new(),
            }),
            MockBehavior::Verdict {
                score,
                summary,
                tags,
            } => Ok(OracleVerdict {
                score: *score,
                summary: summary.clone(),
                tags: tags.clone(),
            }),
            MockBehavior::Timeout => Err(OracleError::Timeout(Duration::from_secs(0))),
            MockBehavior::Malformed => {
                Err(OracleError::Malformed("scripted failure".to_string()))
            }
        }
    }
}

/// Computes importance scores: a deterministic heuristic base, optionally
/// enhanced per article by the oracle with bounded concurrency.
pub struct Scorer {
    oracle: Option<Arc<dyn ScoreOracle>>,
    concurrency: usize,
}

impl Scorer {
    pub fn heuristic_only() -> Self {
        Self {
            oracle: None,
            concurrency: 1,
        }
    }

    pub fn with_oracle(oracle: Arc<dyn ScoreOracle>, concurrency: usize) -> Self {
        Self {
            oracle: Some(oracle),
            concurrency: concurrency.max(1),
        }
    }

    /// Heuristic base score: source weight + title-length bonus + capped
    /// keyword bonus, clamped into [0, 1].
    pub fn heuristic(article: &Article) -> f64 {
        let mut score = article.source_weight;

        let title_len = article.title.chars().count();
        if (20..=100).contains(&title_len) {
            score += TITLE_LENGTH_BONUS;
        }

        let text = format!("{} {}", article.title, article.summary).to_lowercase();
        let matches = TECH_KEYWORDS
            .iter()
            .filter(|keyword| text.contains(*keyword))
            .count();
        score += (KEYWORD_BONUS * matches as f64).min(KEYWORD_BONUS_CAP);

        score.clamp(0.0, 1.0)
    }

    /// Score every article. Oracle failures degrade the affected article to
    /// its heuristic score; the batch always completes.
    pub async fn score_all(&self, mut articles: Vec<Article>) -> Vec<Article> {
        for article in &mut articles {
            article.score = Self::heuristic(article);
        }

        let Some(oracle) = &self.oracle else {
            debug!("no oracle configured, keeping heuristic scores");
            return articles;
        };

        let outcomes: Vec<(usize, Result<OracleVerdict, OracleError>)> =
            stream::iter(articles.iter().enumerate().map(|(index, article)| {
                let oracle = Arc::clone(oracle);
                let request = OracleRequest::for_article(article);
                async move { (index, oracle.assess(request).await) }
            }))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut enhanced = 0usize;
        for (index, outcome) in outcomes {
            match outcome {
                Ok(verdict) => {
                    apply_verdict(&mut articles[index], verdict);
                    enhanced += 1;
                }
                Err(error) => {
                    warn!(
                        title = %articles[index].title,
                        %error,
                        "oracle enhancement failed, keeping heuristic score"
                    );
                }
            }
        }

        info!(
            "scored {} articles ({} oracle-enhanced)",
            articles.len(),
            enhanced
        );
        articles
    }
}

fn apply_verdict(article: &mut Article, verdict: OracleVerdict) {
    article.score = verdict.score.clamp(0.0, 1.0);

    // Only adopt the generated summary when ours is too thin to be useful.
    if article.summary.chars().count() < SHORT_SUMMARY_CHARS {
        if let Some(summary) = verdict.summary {
            article.summary = truncate_summary(&clean_text(&summary));
        }
    }

    for tag in &verdict.tags {
        article.add_tag(tag);
    }
}
