//! Anthropic Messages API client (https://api.anthropic.com by default).
//! Single-turn, non-streaming: one user message in, concatenated text blocks out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_ANTHROPIC_MODEL, DEFAULT_MAX_TOKENS};
use crate::llm::responder::AiResponder;

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Client for the Anthropic HTTP API.
#[derive(Clone)]
pub struct AnthropicClient {
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
}

#[derive(Debug, thiserror::Error)]
pub enum AnthropicError {
    #[error("anthropic request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("anthropic api error: {0}")]
    Api(String),
    #[error("anthropic response contained no text")]
    EmptyResponse,
}

impl AnthropicClient {
    /// `model` falls back to the default model when None or blank.
    pub fn new(api_key: impl Into<String>, model: Option<String>) -> Self {
        let model = model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_ANTHROPIC_MODEL.to_string());
        Self {
            base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
            api_key: api_key.into(),
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            client: reqwest::Client::new(),
        }
    }

    /// Point the client at another API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST /v1/messages with `text` as the only user turn. Returns the reply text.
    pub async fn send_message(&self, text: &str) -> Result<String, AnthropicError> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: text,
            }],
        };
        let res = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(AnthropicError::Api(format!("{} {}", status, body)));
        }
        let data: MessagesResponse = res.json().await?;
        data.text().ok_or(AnthropicError::EmptyResponse)
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

/// One content block; non-text blocks (tool_use etc.) keep only their type.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    typ: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    /// Concatenated text blocks, or None when the reply carries no text.
    fn text(&self) -> Option<String> {
        let mut out = String::new();
        let mut any = false;
        for block in self.content.iter().filter(|b| b.typ == "text") {
            if let Some(ref t) = block.text {
                out.push_str(t);
                any = true;
            }
        }
        any.then_some(out)
    }
}

#[async_trait]
impl AiResponder for AnthropicClient {
    async fn respond(&self, text: &str) -> Result<String, String> {
        self.send_message(text).await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::HeaderMap, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    async fn spawn_fake(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    #[test]
    fn blank_model_falls_back_to_default() {
        let client = AnthropicClient::new("k", Some("  ".to_string()));
        assert_eq!(client.model(), DEFAULT_ANTHROPIC_MODEL);
        let client = AnthropicClient::new("k", Some("claude-x".to_string()));
        assert_eq!(client.model(), "claude-x");
    }

    #[test]
    fn joins_text_blocks_and_skips_others() {
        let res: MessagesResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "hi "},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}},
                {"type": "text", "text": "there"}
            ]
        }))
        .unwrap();
        assert_eq!(res.text().as_deref(), Some("hi there"));

        let empty: MessagesResponse = serde_json::from_value(json!({"content": []})).unwrap();
        assert_eq!(empty.text(), None);
    }

    #[tokio::test]
    async fn sends_headers_and_single_user_turn() {
        let app = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("x-api-key").unwrap(), "sk-test");
                assert_eq!(headers.get("anthropic-version").unwrap(), ANTHROPIC_VERSION);
                assert_eq!(body["model"], "claude-test");
                assert_eq!(body["max_tokens"], 64);
                assert_eq!(body["messages"][0]["role"], "user");
                let echoed = format!("echo: {}", body["messages"][0]["content"].as_str().unwrap());
                Json(json!({
                    "id": "msg_1",
                    "type": "message",
                    "role": "assistant",
                    "content": [{"type": "text", "text": echoed}]
                }))
            }),
        );
        let base = spawn_fake(app).await;
        let client = AnthropicClient::new("sk-test", Some("claude-test".to_string()))
            .with_base_url(format!("{}/", base))
            .with_max_tokens(64);
        let reply = client.send_message("hello").await.unwrap();
        assert_eq!(reply, "echo: hello");
    }

    #[tokio::test]
    async fn non_success_status_is_api_error() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async { (StatusCode::UNAUTHORIZED, "invalid x-api-key") }),
        );
        let base = spawn_fake(app).await;
        let client = AnthropicClient::new("bad", None).with_base_url(base);
        match client.send_message("hello").await {
            Err(AnthropicError::Api(msg)) => {
                assert!(msg.contains("401"), "{}", msg);
                assert!(msg.contains("invalid x-api-key"), "{}", msg);
            }
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn reply_without_text_is_empty_response() {
        let app = Router::new().route(
            "/v1/messages",
            post(|| async { Json(json!({"content": []})) }),
        );
        let base = spawn_fake(app).await;
        let client = AnthropicClient::new("k", None).with_base_url(base);
        assert!(matches!(
            client.send_message("hello").await,
            Err(AnthropicError::EmptyResponse)
        ));
    }
}
