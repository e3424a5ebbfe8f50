//! AI-side capability used by the relay: turn a prompt into a reply.

use async_trait::async_trait;

/// Generates a reply for one piece of user text.
#[async_trait]
pub trait AiResponder: Send + Sync {
    async fn respond(&self, text: &str) -> Result<String, String>;
}
