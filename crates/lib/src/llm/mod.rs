//! AI completion client.
//!
//! Talks to the Anthropic Messages API: one prompt in, one generated reply out.

mod anthropic;
mod responder;

pub use anthropic::{AnthropicClient, AnthropicError};
pub use responder::AiResponder;
