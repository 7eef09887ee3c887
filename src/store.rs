use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::types::{Article, Result};

/// Storage collaborator contract used by the pipeline.
///
/// Reads prime the deduplicator; writes are idempotent upserts keyed by
/// content hash. A read failure degrades to an empty hash set at the call
/// site, a write failure costs only the one article.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Content hashes persisted within the last `lookback_days` partitions.
    async fn recent_hashes(&self, lookback_days: i64) -> Result<HashSet<String>>;

    /// Upsert one article under today's date partition with the given TTL.
    async fn upsert(&self, article: &Article, ttl_days: i64) -> Result<()>;
}

/// Postgres-backed store over a date-partitioned `articles` table.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                content_hash TEXT PRIMARY KEY,
                article_id UUID NOT NULL,
                date_partition DATE NOT NULL,
                title TEXT NOT NULL,
                url TEXT NOT NULL,
                summary TEXT NOT NULL,
                published_at TIMESTAMPTZ NOT NULL,
                source TEXT NOT NULL,
                language TEXT NOT NULL,
                tags TEXT[] NOT NULL,
                score DOUBLE PRECISION NOT NULL,
                author TEXT,
                ttl_days BIGINT NOT NULL,
                stored_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_date_partition ON articles (date_partition)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ArticleStore for PostgresStore {
    async fn recent_hashes(&self, lookback_days: i64) -> Result<HashSet<String>> {
        let cutoff = Utc::now().date_naive() - Duration::days(lookback_days);

        let rows = sqlx::query("SELECT content_hash FROM articles WHERE date_partition >= $1")
            .bind(cutoff)
            .fetch_all(&self.pool)
            .await?;

        let hashes: HashSet<String> = rows
            .into_iter()
            .filter_map(|row| row.try_get::<String, _>("content_hash").ok())
            .collect();

        debug!(
            "primed {} hashes from the last {} days",
            hashes.len(),
            lookback_days
        );
        Ok(hashes)
    }

    async fn upsert(&self, article: &Article, ttl_days: i64) -> Result<()> {
        let article_id = article.id.unwrap_or_else(Uuid::new_v4);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO articles (
                content_hash, article_id, date_partition, title, url, summary,
                published_at, source, language, tags, score, author, ttl_days,
                stored_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (content_hash) DO UPDATE SET
                summary = EXCLUDED.summary,
                tags = EXCLUDED.tags,
                score = EXCLUDED.score,
                stored_at = EXCLUDED.stored_at
            "#,
        )
        .bind(&article.content_hash)
        .bind(article_id)
        .bind(now.date_naive())
        .bind(&article.title)
        .bind(&article.url)
        .bind(&article.summary)
        .bind(article.published_at)
        .bind(&article.source)
        .bind(&article.language)
        .bind(&article.tags)
        .bind(article.score)
        .bind(&article.author)
        .bind(ttl_days)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// In-memory store for tests and runs without a configured database.
/// Hashes do not survive the process, so cross-run dedup is disabled.
pub struct MemoryStore {
    articles: RwLock<HashMap<String, Article>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            articles: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.articles.read().await.len()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn recent_hashes(&self, _lookback_days: i64) -> Result<HashSet<String>> {
        let articles = self.articles.read().await;
        Ok(articles.keys().cloned().collect())
    }

    async fn upsert(&self, article: &Article, _ttl_days: i64) -> Result<()> {
        let mut stored = article.clone();
        if stored.id.is_none() {
            stored.id = Some(Uuid::new_v4());
        }
        let mut articles = self.articles.write().await;
        articles.insert(stored.content_hash.clone(), stored);
        Ok(())
    }
}

/// Prime the dedup hash set, degrading to empty on a read failure.
pub async fn prime_hashes(store: &dyn ArticleStore, lookback_days: i64) -> HashSet<String> {
    match store.recent_hashes(lookback_days).await {
        Ok(hashes) => {
            info!("primed dedup set with {} known hashes", hashes.len());
            hashes
        }
        Err(error) => {
            tracing::warn!(
                %error,
                "hash-store read failed, continuing with an empty seen set"
            );
            HashSet::new()
        }
    }
}
