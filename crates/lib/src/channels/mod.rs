//! Communication channels (Synology Chat).
//!
//! Payload types for the platform's outgoing webhook, the client that posts replies through
//! its incoming webhook, and the [`ChatNotifier`] seam the relay depends on.

mod notifier;
mod synology;

pub use notifier::ChatNotifier;
pub use synology::{ChatMessage, OutgoingWebhook, SynologyChatClient, SynologyError};
