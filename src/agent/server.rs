//! HTTP chat adapter.
//!
//! A small axum app with two routes: `POST /v1/chat` accepts a chat message,
//! acknowledges it immediately with 202, and runs the pipeline in a spawned
//! task; `GET /health` reports liveness. The substantive reply is POSTed back
//! to the sender's endpoint when the run finishes, success or failure.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use super::message::{ChatAcknowledgement, ChatMessage, HELP_TEXT, Intent, interpret};
use crate::config::Config;
use crate::pipeline::Pipeline;

/// Configuration for the chat adapter server.
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8001,
            dev_mode: false,
        }
    }
}

pub struct AppState {
    pipeline: Pipeline,
    /// Client used to POST replies back to senders.
    replies: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let pipeline = Pipeline::new(config).context("Failed to set up pipeline")?;
        Ok(Self {
            pipeline,
            replies: reqwest::Client::new(),
        })
    }
}

/// Build the chat adapter router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/chat", post(receive_message))
        .route("/v1/ack", post(receive_ack))
        .route("/health", get(health))
        .with_state(state)
}

/// Peers acknowledge our replies here; nothing to do beyond recording it.
async fn receive_ack(Json(ack): Json<ChatAcknowledgement>) -> StatusCode {
    info!(acknowledged_msg_id = %ack.acknowledged_msg_id, "reply acknowledged");
    StatusCode::OK
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Acknowledge and hand off. The HTTP exchange never waits on the pipeline.
async fn receive_message(
    State(state): State<Arc<AppState>>,
    Json(message): Json<ChatMessage>,
) -> (StatusCode, Json<ChatAcknowledgement>) {
    let ack = ChatAcknowledgement::for_message(&message);
    info!(msg_id = %message.msg_id, sender = %message.sender, "message received");

    tokio::spawn(async move {
        handle_message(state, message).await;
    });

    (StatusCode::ACCEPTED, Json(ack))
}

async fn handle_message(state: Arc<AppState>, message: ChatMessage) {
    let reply_text = match interpret(&message.text) {
        Intent::Help => HELP_TEXT.to_string(),
        Intent::Analyze(reference) => match state.pipeline.run(&reference).await {
            Ok(outcome) => {
                info!(msg_id = %message.msg_id, url = %outcome.preview_url, "run succeeded");
                outcome.summary()
            }
            Err(err) => {
                error!(msg_id = %message.msg_id, error = %err, "run failed");
                err.user_message()
            }
        },
    };
    send_reply(&state, &message, &reply_text).await;
}

async fn send_reply(state: &AppState, inbound: &ChatMessage, text: &str) {
    if !inbound.sender.starts_with("http://") && !inbound.sender.starts_with("https://") {
        warn!(msg_id = %inbound.msg_id, sender = %inbound.sender, "sender is not a reply endpoint, dropping reply");
        return;
    }
    let reply = ChatMessage::new("tabula", text);
    match state
        .replies
        .post(&inbound.sender)
        .json(&reply)
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            info!(msg_id = %inbound.msg_id, "reply delivered");
        }
        Ok(resp) => {
            warn!(msg_id = %inbound.msg_id, status = %resp.status(), "reply rejected by sender");
        }
        Err(err) => {
            warn!(msg_id = %inbound.msg_id, error = %err, "reply delivery failed");
        }
    }
}

/// Start the chat adapter server.
pub async fn start_server(server: ServerConfig, config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config)?);
    let mut app = build_router(state);

    if server.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let host = if server.dev_mode { "0.0.0.0" } else { "127.0.0.1" };
    let addr = format!("{}:{}", host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, "chat adapter listening");
    println!("Tabula agent running at http://{}", local_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    println!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    println!("\nShutting down...");
}
