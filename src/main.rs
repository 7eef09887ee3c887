use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use news_digest::collectors::Collector;
use news_digest::scorer::ScoreOracle;
use news_digest::store::ArticleStore;
use news_digest::{
    pipeline, Config, GitHubCollector, HttpScoreOracle, MemoryStore, PostgresStore,
    RedditCollector, RssCollector, SlackNotifier,
};

#[derive(Debug, Parser)]
#[command(name = "news-digest", about = "Collect, rank and deliver a tech news digest")]
struct Args {
    /// Run the full pipeline but skip Slack delivery.
    #[arg(long)]
    dry_run: bool,

    /// Override the maximum number of delivered articles.
    #[arg(long)]
    top_n: Option<usize>,

    /// Override the minimum score threshold.
    #[arg(long)]
    min_score: Option<f64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(top_n) = args.top_n {
        config.top_n = top_n;
    }
    if let Some(min_score) = args.min_score {
        config.min_score = min_score;
    }

    if !args.dry_run {
        config.validate().map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    info!("=== tech news collection started ===");

    let collectors: Vec<Box<dyn Collector>> = vec![
        Box::new(RssCollector::new(config.rss_feeds.clone())),
        Box::new(GitHubCollector::new(
            config.github_token.clone(),
            config.github_languages.clone(),
            config.github_weight,
        )),
        Box::new(RedditCollector::new(
            config.subreddits.clone(),
            config.reddit_weight,
        )),
    ];

    let oracle: Option<Arc<dyn ScoreOracle>> = config.oracle_url.clone().map(|url| {
        Arc::new(HttpScoreOracle::new(
            url,
            Duration::from_secs(config.oracle_timeout_secs),
        )) as Arc<dyn ScoreOracle>
    });

    let store: Box<dyn ArticleStore> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url).await?;
            store.init_schema().await?;
            Box::new(store)
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store (no cross-run dedup)");
            Box::new(MemoryStore::new())
        }
    };

    let notifier = if args.dry_run {
        None
    } else {
        config.slack_webhook_url.clone().map(|url| {
            SlackNotifier::new(
                url,
                config.slack_bot_name.clone(),
                config.slack_icon_emoji.clone(),
            )
        })
    };

    let outcome = pipeline::run(
        &config,
        &collectors,
        oracle,
        store.as_ref(),
        notifier.as_ref(),
    )
    .await;

    match outcome {
        Ok(stats) => {
            info!("=== tech news collection completed ===");
            info!("{}", stats.summary());
            Ok(())
        }
        Err(e) => {
            error!("run failed: {}", e);
            if let Some(notifier) = &notifier {
                // Best effort; a failed error report is ignored.
                let _ = notifier.send_error_notification(&e.to_string()).await;
            }
            Err(anyhow::anyhow!("{e}"))
        }
    }
}
