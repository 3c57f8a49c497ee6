//! Minimal Anthropic Claude API client.
//!
//! Single-shot text completions against the Messages endpoint. No streaming
//! and no tool use; non-text content blocks in a reply are dropped.

use reqwest::header::HeaderValue;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_MAX_TOKENS: u32 = 1024;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum Error {
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingKey,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Claude returned {code}: {body}")]
    Status { code: u16, body: String },

    #[error("could not set up client: {0}")]
    Setup(String),
}

/// Handle to the Messages endpoint. Cheap to clone.
#[derive(Clone)]
pub struct Claude {
    http: reqwest::Client,
    key: HeaderValue,
    model: String,
}

impl std::fmt::Debug for Claude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claude").field("model", &self.model).finish_non_exhaustive()
    }
}

impl Claude {
    pub fn new(api_key: impl Into<String>) -> Result<Self, Error> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Every request gives up after `timeout`; connecting is capped at 10s.
    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, Error> {
        let mut key = HeaderValue::try_from(api_key.into())
            .map_err(|_| Error::Setup("API key contains characters not allowed in a header".into()))?;
        key.set_sensitive(true);

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .map_err(|e| Error::Setup(e.to_string()))?;

        Ok(Self {
            http,
            key,
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    pub fn from_env() -> Result<Self, Error> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(Error::MissingKey),
        }
    }

    /// Model used when a request does not name one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn complete(&self, request: Request) -> Result<Completion, Error> {
        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", self.key.clone())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.wire(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                code: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<WireReply>().await?.into())
    }

    fn wire<'a>(&'a self, request: &'a Request) -> WireRequest<'a> {
        WireRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.turns,
            temperature: request.temperature,
        }
    }
}

/// One completion call.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: u32,
    pub system: Option<String>,
    pub turns: Vec<Turn>,
    pub temperature: Option<f32>,
}

impl Request {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            model: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            system: None,
            turns,
            temperature: None,
        }
    }

    /// A request holding a single user turn.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::new(vec![Turn::user(text)])
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Assistant,
}

/// A plain-text conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    #[serde(rename = "role")]
    pub speaker: Speaker,
    #[serde(rename = "content")]
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// Prefill for the reply, e.g. `{` to force a JSON object.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Text of a reply with its bookkeeping.
#[derive(Debug, Clone)]
pub struct Completion {
    pub id: String,
    pub model: String,
    pub text: String,
    pub stop_reason: Option<StopReason>,
    pub usage: Usage,
}

impl Completion {
    /// The reply ran into `max_tokens` and is cut off.
    pub fn truncated(&self) -> bool {
        self.stop_reason == Some(StopReason::MaxTokens)
    }
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Turn],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct WireReply {
    id: String,
    model: String,
    content: Vec<Block>,
    stop_reason: Option<StopReason>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Block {
    Text { text: String },
    #[serde(other)]
    Ignored,
}

impl From<WireReply> for Completion {
    fn from(reply: WireReply) -> Self {
        let text = reply
            .content
            .into_iter()
            .filter_map(|block| match block {
                Block::Text { text } => Some(text),
                Block::Ignored => None,
            })
            .collect();
        Completion {
            id: reply.id,
            model: reply.model,
            text,
            stop_reason: reply.stop_reason,
            usage: reply.usage,
        }
    }
}
