use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::types::{Article, PipelineError, Result};

/// Article blocks per group before a visual divider is inserted.
const DIVIDER_EVERY: usize = 5;
/// Tags shown per article, after dropping the source and language tags.
const DISPLAY_TAGS: usize = 3;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TextObject {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl TextObject {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: "plain_text".to_string(),
            text: text.into(),
        }
    }

    pub fn mrkdwn(text: impl Into<String>) -> Self {
        Self {
            kind: "mrkdwn".to_string(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Button {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: TextObject,
    pub url: String,
    pub action_id: String,
}

impl Button {
    pub fn link(label: &str, url: &str, action_id: String) -> Self {
        Self {
            kind: "button".to_string(),
            text: TextObject::plain(label),
            url: url.to_string(),
            action_id,
        }
    }
}

/// Slack Block Kit block. The formatter emits these; the notifier posts them.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Header {
        text: TextObject,
    },
    Section {
        text: TextObject,
        #[serde(skip_serializing_if = "Option::is_none")]
        accessory: Option<Button>,
    },
    Divider,
    Context {
        elements: Vec<TextObject>,
    },
}

/// Renders ranked articles into delivery-ready blocks.
///
/// Pure transform: no network, no storage, no mutation of the articles.
pub struct DigestFormatter;

impl DigestFormatter {
    /// Build the full block sequence for a digest generated at `at`.
    pub fn format(articles: &[Article], at: DateTime<Utc>) -> Vec<Block> {
        let mut blocks = Vec::new();

        let header = if at.hour() < 12 {
            "🌅 Morning Tech Digest"
        } else {
            "🌆 Evening Tech Digest"
        };
        blocks.push(Block::Header {
            text: TextObject::plain(header),
        });

        blocks.push(Block::Section {
            text: TextObject::mrkdwn(format!(
                "*{}* | {} top articles",
                at.format("%Y-%m-%d"),
                articles.len()
            )),
            accessory: None,
        });

        for (i, article) in articles.iter().enumerate() {
            let index = i + 1;
            blocks.push(Self::article_block(article, index));

            if index % DIVIDER_EVERY == 0 && index < articles.len() {
                blocks.push(Block::Divider);
            }
        }

        blocks.push(Block::Context {
            elements: vec![TextObject::mrkdwn(format!(
                "Generated at {}",
                at.format("%Y-%m-%d %H:%M UTC")
            ))],
        });

        blocks
    }

    fn article_block(article: &Article, index: usize) -> Block {
        let importance = importance_glyph(article.score);
        let source = source_glyph(&article.source);

        let tags_text = {
            let shown: Vec<String> = article
                .tags
                .iter()
                .filter(|tag| **tag != article.source)
                .filter(|tag| **tag != article.language)
                .take(DISPLAY_TAGS)
                .map(|tag| format!("`{}`", tag))
                .collect();
            if shown.is_empty() {
                String::new()
            } else {
                format!(" | {}", shown.join(" • "))
            }
        };

        let author_text = article
            .author
            .as_deref()
            .map(|author| format!(" by {}", author))
            .unwrap_or_default();

        let text = format!(
            "{source} *{index}. {title}*{author}\n{summary}\n\n{importance} *Score: {score:.2}* | Source: {src}{tags}",
            source = source,
            index = index,
            title = article.title,
            author = author_text,
            summary = article.summary,
            importance = importance,
            score = article.score,
            src = article.source,
            tags = tags_text,
        );

        Block::Section {
            text: TextObject::mrkdwn(text),
            accessory: Some(Button::link(
                "Read More",
                &article.url,
                format!("read_more_{}", index),
            )),
        }
    }
}

/// Importance glyph by score threshold.
pub fn importance_glyph(score: f64) -> &'static str {
    if score >= 0.9 {
        "🔥"
    } else if score >= 0.8 {
        "⭐"
    } else if score >= 0.7 {
        "✨"
    } else {
        "📄"
    }
}

/// Source glyph lookup; unknown sources get the default newspaper.
pub fn source_glyph(source: &str) -> &'static str {
    match source {
        "github" => "🔧",
        "reddit" => "💬",
        "hackernews" => "📰",
        "techcrunch" => "🚀",
        "venturebeat" => "💼",
        "zenn" => "📝",
        "qiita" => "💡",
        _ => "📰",
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    blocks: &'a [Block],
    username: &'a str,
    icon_emoji: &'a str,
}

/// Posts block sequences to a Slack incoming webhook.
pub struct SlackNotifier {
    client: reqwest::Client,
    webhook_url: String,
    bot_name: String,
    icon_emoji: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: String, bot_name: String, icon_emoji: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            webhook_url,
            bot_name,
            icon_emoji,
        }
    }

    /// Deliver a block sequence. Any non-2xx status is a delivery failure.
    pub async fn send_blocks(&self, blocks: &[Block]) -> Result<()> {
        let payload = WebhookPayload {
            blocks,
            username: &self.bot_name,
            icon_emoji: &self.icon_emoji,
        };

        let response = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!("delivered {} blocks to Slack", blocks.len());
            Ok(())
        } else {
            error!("Slack rejected delivery with HTTP {}", status);
            Err(PipelineError::Delivery {
                status: status.as_u16(),
            })
        }
    }

    /// Format and deliver a ranked digest in one step.
    pub async fn send_digest(&self, articles: &[Article], at: DateTime<Utc>) -> Result<()> {
        let blocks = DigestFormatter::format(articles, at);
        self.send_blocks(&blocks).await
    }

    /// Best-effort error report for a failed run.
    pub async fn send_error_notification(&self, message: &str) -> Result<()> {
        let blocks = vec![
            Block::Header {
                text: TextObject::plain("⚠️ Tech News Bot Error"),
            },
            Block::Section {
                text: TextObject::mrkdwn(format!(
                    "An error occurred during news collection:\n\n```{}```",
                    message
                )),
                accessory: None,
            },
            Block::Context {
                elements: vec![TextObject::mrkdwn(format!(
                    "Timestamp: {}",
                    Utc::now().format("%Y-%m-%d %H:%M:%S")
                ))],
            },
        ];
        self.send_blocks(&blocks).await
    }
}
