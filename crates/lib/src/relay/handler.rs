//! POST /webhook: validate the Synology Chat outgoing webhook, ask the AI for a reply, post
//! the reply back to the chat. One pass per request, stops at the first failure.

use crate::channels::{ChatMessage, ChatNotifier, OutgoingWebhook};
use crate::llm::AiResponder;
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Per-request state. Immutable; cloned into every request by axum.
#[derive(Clone)]
pub struct RelayState {
    /// Token the platform must present, reused as the credential for posting replies.
    pub outgoing_token: Arc<str>,
    pub responder: Arc<dyn AiResponder>,
    pub notifier: Arc<dyn ChatNotifier>,
    /// Reported by the health probe.
    pub port: u16,
}

impl RelayState {
    pub fn new(
        outgoing_token: impl Into<Arc<str>>,
        responder: Arc<dyn AiResponder>,
        notifier: Arc<dyn ChatNotifier>,
        port: u16,
    ) -> Self {
        Self {
            outgoing_token: outgoing_token.into(),
            responder,
            notifier,
            port,
        }
    }
}

/// Terminal failure of a webhook request. Display text is the plain-text response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WebhookError {
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("Failed to read request body")]
    UnreadableBody,
    #[error("Failed to parse JSON payload")]
    InvalidPayload,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Failed to process message")]
    Completion,
    #[error("Failed to send response")]
    Delivery,
}

impl WebhookError {
    pub fn status(self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            WebhookError::UnreadableBody | WebhookError::InvalidPayload => StatusCode::BAD_REQUEST,
            WebhookError::InvalidToken => StatusCode::UNAUTHORIZED,
            WebhookError::Completion | WebhookError::Delivery => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

/// Decode the webhook body. Any shape mismatch is a parse failure.
pub fn parse_payload(body: &[u8]) -> Result<OutgoingWebhook, WebhookError> {
    OutgoingWebhook::from_slice(body).map_err(|_| WebhookError::InvalidPayload)
}

/// Token check, AI call, chat post. Neither client is called when the token is wrong;
/// the chat client is not called when the AI call fails.
pub async fn relay_payload(
    state: &RelayState,
    payload: &OutgoingWebhook,
    request_id: &str,
) -> Result<(), WebhookError> {
    if payload.token.as_str() != &*state.outgoing_token {
        log::warn!("[{}] webhook rejected: invalid token", request_id);
        return Err(WebhookError::InvalidToken);
    }

    log::debug!(
        "[{}] message from {} in #{} ({} chars)",
        request_id,
        payload.username,
        payload.channel_name,
        payload.text.chars().count()
    );

    let reply = state.responder.respond(&payload.text).await.map_err(|e| {
        log::error!("[{}] failed to get response from AI: {}", request_id, e);
        WebhookError::Completion
    })?;

    let message = ChatMessage::text(reply);
    state
        .notifier
        .send_message(&message, &state.outgoing_token)
        .await
        .map_err(|e| {
            log::error!("[{}] failed to send message to chat: {}", request_id, e);
            WebhookError::Delivery
        })?;

    log::info!("[{}] relayed reply to #{}", request_id, payload.channel_name);
    Ok(())
}

async fn handle_webhook(
    state: &RelayState,
    method: &Method,
    body: Result<Bytes, BytesRejection>,
    request_id: &str,
) -> Result<(), WebhookError> {
    if *method != Method::POST {
        log::warn!("[{}] webhook rejected: method {}", request_id, method);
        return Err(WebhookError::MethodNotAllowed);
    }
    let body = body.map_err(|e| {
        log::warn!("[{}] failed to read webhook body: {}", request_id, e);
        WebhookError::UnreadableBody
    })?;
    let payload = parse_payload(&body).map_err(|e| {
        log::warn!("[{}] failed to parse webhook payload", request_id);
        e
    })?;
    relay_payload(state, &payload, request_id).await
}

/// /webhook for every method, so the 405 carries the same plain-text body as other failures.
pub async fn webhook(
    State(state): State<RelayState>,
    method: Method,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();
    match handle_webhook(&state, &method, body, &request_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET / returns a simple health JSON (for probes).
pub async fn health_http(State(state): State<RelayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}
