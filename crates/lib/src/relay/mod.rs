//! Relay: the HTTP surface between Synology Chat and the AI.
//!
//! One port, two routes: `GET /` for probes and `/webhook` for the platform's outgoing
//! webhook. Each webhook request runs the whole pipeline inline and answers only when it
//! is done.

mod handler;
mod server;

pub use handler::{parse_payload, relay_payload, RelayState, WebhookError};
pub use server::{build_state, router, run_relay, serve};
