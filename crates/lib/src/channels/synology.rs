//! Synology Chat channel: outgoing-webhook payload (inbound to us) and incoming-webhook
//! sendMessage (outbound from us) via `webapi/entry.cgi`.

use crate::channels::notifier::ChatNotifier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const ENTRY_PATH: &str = "/webapi/entry.cgi";
const CHAT_API: &str = "SYNO.Chat.External";
const INCOMING_METHOD: &str = "incoming";
const API_VERSION: &str = "2";

/// Outgoing-webhook POST body sent by Synology Chat when a trigger word matches.
/// Absent fields decode as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingWebhook {
    pub token: String,
    pub channel_id: String,
    pub channel_name: String,
    pub user_id: String,
    pub username: String,
    pub post_id: String,
    pub timestamp: String,
    pub text: String,
    pub trigger_word: String,
}

/// Message posted back to a channel through the incoming webhook.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub text: String,
    /// Optional attachment URL the NAS fetches and attaches to the post.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

/// Wire names of [`OutgoingWebhook`] fields.
const WEBHOOK_FIELDS: [&str; 9] = [
    "token",
    "channel_id",
    "channel_name",
    "user_id",
    "username",
    "post_id",
    "timestamp",
    "text",
    "trigger_word",
];

impl OutgoingWebhook {
    /// Decode a webhook body the way the platform's own tooling does: only a JSON object
    /// (or a bare `null`, which leaves every field empty) is accepted, keys match field
    /// names case-insensitively with the last duplicate winning, and `null` values leave
    /// the field empty.
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        let map = match serde_json::from_slice::<serde_json::Value>(body)? {
            serde_json::Value::Object(map) => map,
            serde_json::Value::Null => return Ok(Self::default()),
            other => {
                return Err(<serde_json::Error as serde::de::Error>::custom(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        let mut fields = serde_json::Map::new();
        for (key, value) in map {
            if value.is_null() {
                continue;
            }
            if let Some(name) = WEBHOOK_FIELDS.iter().find(|f| f.eq_ignore_ascii_case(&key)) {
                fields.insert(name.to_string(), value);
            }
        }
        serde_json::from_value(serde_json::Value::Object(fields))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

impl ChatMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            file_url: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SynologyError {
    #[error("invalid synology chat base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("synology chat request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("synology chat api error: {0}")]
    Api(String),
    #[error("synology chat rejected message: {0}")]
    Rejected(String),
}

#[derive(Debug, Deserialize)]
struct EntryResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Client for posting to Synology Chat through `SYNO.Chat.External`.
#[derive(Clone)]
pub struct SynologyChatClient {
    base_url: String,
    client: reqwest::Client,
}

impl SynologyChatClient {
    /// Validates `base_url` (absolute http or https URL with a host).
    pub fn new(base_url: &str) -> Result<Self, SynologyError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let invalid = |reason: String| SynologyError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };
        let parsed = reqwest::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(invalid(format!("unsupported scheme {}", parsed.scheme())));
        }
        if parsed.host_str().map_or(true, str::is_empty) {
            return Err(invalid("missing host".to_string()));
        }
        Ok(Self {
            base_url: trimmed.to_string(),
            client: reqwest::Client::new(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST the message as `payload=<json>` with the token in the query (quoted, as the NAS expects).
    pub async fn send_message(&self, message: &ChatMessage, token: &str) -> Result<(), SynologyError> {
        let url = format!("{}{}", self.base_url, ENTRY_PATH);
        let payload = serde_json::to_string(message)
            .map_err(|e| SynologyError::Api(format!("encoding payload: {}", e)))?;
        let quoted_token = format!("\"{}\"", token);
        let res = self
            .client
            .post(&url)
            .query(&[
                ("api", CHAT_API),
                ("method", INCOMING_METHOD),
                ("version", API_VERSION),
                ("token", quoted_token.as_str()),
            ])
            .form(&[("payload", payload.as_str())])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(SynologyError::Api(format!("{} {}", status, body)));
        }
        let body = res.text().await?;
        match serde_json::from_str::<EntryResponse>(&body) {
            Ok(r) if !r.success => Err(SynologyError::Rejected(
                r.error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "success: false".to_string()),
            )),
            Ok(_) => Ok(()),
            Err(_) => {
                log::debug!("synology chat: non-JSON 2xx response, treating as success");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ChatNotifier for SynologyChatClient {
    async fn send_message(&self, message: &ChatMessage, token: &str) -> Result<(), String> {
        SynologyChatClient::send_message(self, message, token)
            .await
            .map_err(|e| e.to_string())
    }
}
