pub mod collectors;
pub mod config;
pub mod dedup;
pub mod filter;
pub mod normalizer;
pub mod pipeline;
pub mod ranker;
pub mod scorer;
pub mod slack;
pub mod store;
pub mod types;

pub use collectors::{Collector, GitHubCollector, RedditCollector, RssCollector};
pub use config::{Config, FeedSpec};
pub use dedup::Deduplicator;
pub use filter::ContentFilter;
pub use normalizer::Normalizer;
pub use ranker::Ranker;
pub use scorer::{HttpScoreOracle, MockScoreOracle, ScoreOracle, Scorer};
pub use slack::{Block, DigestFormatter, SlackNotifier};
pub use store::{ArticleStore, MemoryStore, PostgresStore};
pub use types::{Article, PipelineError, RawRecord, Result, RunStats};
