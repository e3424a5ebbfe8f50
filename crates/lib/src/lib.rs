//! Synorelay core library: configuration, the webhook relay, and the Anthropic and
//! Synology Chat clients it sits between.

pub mod channels;
pub mod config;
pub mod llm;
pub mod relay;
