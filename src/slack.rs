use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::debug;

use crate::config::SlackConfig;
use crate::format::RenderedMessage;

/// Requests older (or newer) than this many seconds are treated as replays.
pub const SIGNATURE_MAX_AGE_SECS: i64 = 60 * 5;

// ── Events API envelope ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    UrlVerification {
        challenge: String,
    },
    EventCallback {
        event: MessageEvent,
        #[serde(default)]
        event_time: Option<f64>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct MessageEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
}

// ── Request signing ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("missing signature headers")]
    MissingHeaders,
    #[error("malformed request timestamp")]
    BadTimestamp,
    #[error("request timestamp outside the replay window")]
    Expired,
    #[error("signature mismatch")]
    Mismatch,
}

/// Verify a `v0=` request signature over `v0:{timestamp}:{body}`.
pub fn verify_signature(
    signing_secret: &str,
    timestamp: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    now: i64,
) -> Result<(), SignatureError> {
    let (timestamp, signature) = match (timestamp, signature) {
        (Some(ts), Some(sig)) => (ts, sig),
        _ => return Err(SignatureError::MissingHeaders),
    };

    let ts: i64 = timestamp
        .trim()
        .parse()
        .map_err(|_| SignatureError::BadTimestamp)?;
    if now.abs_diff(ts) > SIGNATURE_MAX_AGE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let expected = signature
        .strip_prefix("v0=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
        .ok_or(SignatureError::Mismatch)?;

    signing_mac(signing_secret, timestamp, body)
        .verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// Compute the `v0=` signature header value for a request.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mac = signing_mac(signing_secret, timestamp, body);
    format!("v0={}", hex::encode(mac.finalize().into_bytes()))
}

fn signing_mac(signing_secret: &str, timestamp: &str, body: &[u8]) -> Hmac<Sha256> {
    // HMAC accepts keys of any length.
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(signing_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!());
    mac.update(b"v0:");
    mac.update(timestamp.as_bytes());
    mac.update(b":");
    mac.update(body);
    mac
}

// ── chat.postMessage ──────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum PostError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Slack API error ({status}): {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Slack rejected message: {0}")]
    Rejected(String),
}

/// Destination for rendered quote messages.
#[async_trait]
pub trait MessagePoster: Send + Sync {
    async fn post(&self, channel: &str, message: &RenderedMessage) -> Result<(), PostError>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    username: &'a str,
    attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
struct Attachment {
    color: String,
    blocks: Vec<Block>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Header {
        text: Text,
    },
    Section {
        text: Text,
        fields: Vec<Text>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Text {
    PlainText {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        emoji: Option<bool>,
    },
    Mrkdwn {
        text: String,
    },
}

impl Text {
    fn plain(text: &str) -> Self {
        Text::PlainText {
            text: text.to_string(),
            emoji: None,
        }
    }

    fn mrkdwn(text: &str) -> Self {
        Text::Mrkdwn {
            text: text.to_string(),
        }
    }
}

fn attachment(message: &RenderedMessage) -> Attachment {
    Attachment {
        color: message.color.clone(),
        blocks: vec![
            Block::Header {
                text: Text::PlainText {
                    text: message.header.clone(),
                    emoji: Some(true),
                },
            },
            Block::Section {
                text: Text::mrkdwn(&message.body),
                fields: vec![
                    Text::mrkdwn("*Previous Close Price:*"),
                    Text::mrkdwn("*Change:*"),
                    Text::plain(&message.previous_close),
                    Text::plain(&message.change),
                ],
            },
        ],
    }
}

#[derive(Debug, Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// Slack Web API client for posting quote messages.
pub struct SlackClient {
    client: reqwest::Client,
    config: SlackConfig,
}

impl SlackClient {
    pub fn new(config: SlackConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build Slack HTTP client")?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl MessagePoster for SlackClient {
    async fn post(&self, channel: &str, message: &RenderedMessage) -> Result<(), PostError> {
        let request = PostMessageRequest {
            channel,
            username: &self.config.username,
            attachments: vec![attachment(message)],
        };

        let url = format!(
            "{}/chat.postMessage",
            self.config.api_base_url.trim_end_matches('/')
        );

        debug!("Posting message to {} via {}", channel, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.bot_token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PostError::Status { status, body });
        }

        let body: PostMessageResponse = response.json().await?;
        if !body.ok {
            return Err(PostError::Rejected(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(())
    }
}
