//! Relay HTTP server (single port).

use crate::channels::SynologyChatClient;
use crate::config::Settings;
use crate::llm::AnthropicClient;
use crate::relay::handler::{health_http, webhook, RelayState};
use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    routing::{any, get},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Routes: `GET /` health, `/webhook` (all methods; non-POST answered with 405 by the handler).
/// Webhook bodies are read whole with no size cap.
pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/", get(health_http))
        .route("/webhook", any(webhook).layer(DefaultBodyLimit::disable()))
        .with_state(state)
}

/// Build the production clients from resolved settings. Fails when the chat base URL is invalid.
pub fn build_state(settings: &Settings) -> Result<RelayState> {
    let chat = SynologyChatClient::new(&settings.chat_base_url)
        .context("failed to create Synology Chat client")?;
    let ai = AnthropicClient::new(
        settings.anthropic_api_key.clone(),
        Some(settings.anthropic_model.clone()),
    )
    .with_base_url(settings.anthropic_base_url.clone())
    .with_max_tokens(settings.max_tokens);
    log::info!(
        "relay clients ready: chat {} model {}",
        chat.base_url(),
        ai.model()
    );
    Ok(RelayState::new(
        settings.outgoing_token.as_str(),
        Arc::new(ai),
        Arc::new(chat),
        settings.port,
    ))
}

/// Serve the relay on an already-bound listener until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, state: RelayState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("relay server exited")
}

/// Build clients, bind, and serve until SIGINT/SIGTERM.
pub async fn run_relay(settings: Settings) -> Result<()> {
    let state = build_state(&settings)?;
    let bind_addr = settings.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    log::info!("starting server on {}", bind_addr);
    serve(listener, state, shutdown_signal()).await?;
    log::info!("relay stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
/// In-flight webhook requests are allowed to finish.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining in-flight requests");
}
