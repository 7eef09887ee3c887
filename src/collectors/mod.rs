use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use futures::stream::{self, StreamExt};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::types::{PipelineError, RawRecord, Result, RunStats};

pub mod github;
pub mod reddit;
pub mod rss;

pub use github::GitHubCollector;
pub use reddit::RedditCollector;
pub use rss::RssCollector;

/// A source of raw records. Implementations are enumerated statically and
/// wired up in a fixed order at startup.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Source identifier, also used in logs and stats.
    fn name(&self) -> &str;

    /// Fetch the current batch of raw records from this source.
    async fn collect(&self) -> Result<Vec<RawRecord>>;
}

/// Collect from every source concurrently with a bounded worker pool.
///
/// A failing source contributes zero records and an error entry in the
/// stats; it never aborts the run. Records are flattened in the collectors'
/// configured order so downstream encounter-order semantics stay
/// deterministic regardless of completion order.
pub async fn collect_all(
    collectors: &[Box<dyn Collector>],
    concurrency: usize,
    stats: &mut RunStats,
) -> Vec<RawRecord> {
    let mut results: Vec<(usize, String, Result<Vec<RawRecord>>)> =
        stream::iter(collectors.iter().enumerate().map(|(index, collector)| {
            let name = collector.name().to_string();
            async move {
                info!("collecting from {}", name);
                let outcome = collector.collect().await;
                (index, name, outcome)
            }
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(index, _, _)| *index);

    let mut records = Vec::new();
    for (_, name, outcome) in results {
        match outcome {
            Ok(mut batch) => {
                info!("collected {} records from {}", batch.len(), name);
                stats.add_source(&name, batch.len());
                records.append(&mut batch);
            }
            Err(error) => {
                error!("failed to collect from {}: {}", name, error);
                stats.add_source(&name, 0);
                stats.add_collection_error(&name, error.to_string());
            }
        }
    }
    records
}

/// Send a request, retrying non-2xx and transport failures with exponential
/// backoff. Retries live here at the collection boundary only; the core
/// pipeline never retries.
pub(crate) async fn send_with_retry(
    build: impl Fn() -> reqwest::RequestBuilder,
    max_retries: u32,
) -> Result<reqwest::Response> {
    let mut backoff = ExponentialBackoff {
        initial_interval: Duration::from_secs(1),
        max_interval: Duration::from_secs(30),
        ..Default::default()
    };

    let mut last_error: Option<PipelineError> = None;

    for attempt in 0..=max_retries {
        match build().send().await {
            Ok(response) if response.status().is_success() => return Ok(response),
            Ok(response) => {
                last_error = Some(PipelineError::General(format!(
                    "HTTP {}",
                    response.status()
                )));
            }
            Err(e) => last_error = Some(PipelineError::Http(e)),
        }

        if attempt < max_retries {
            if let Some(delay) = backoff.next_backoff() {
                warn!("request attempt {} failed, retrying in {:?}", attempt + 1, delay);
                tokio::time::sleep(delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| PipelineError::General("request failed".to_string())))
}
