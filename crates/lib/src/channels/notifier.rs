//! Chat-side capability used by the relay: post a reply back to the platform.

use async_trait::async_trait;

use crate::channels::ChatMessage;

/// Sends a message to the chat platform, authorised by `token`.
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn send_message(&self, message: &ChatMessage, token: &str) -> Result<(), String>;
}
