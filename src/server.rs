use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use tracing::{debug, info, warn};

use crate::handler::{EventHandler, InboundEvent};
use crate::slack::{self, Envelope};

#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<EventHandler>,
    pub signing_secret: Arc<str>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/slack/events", post(slack_events))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until the process is stopped.
pub async fn run(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;

    info!("Listening for Slack events on http://{}/slack/events", addr);

    axum::serve(listener, router(state))
        .await
        .context("Server error")?;

    Ok(())
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

async fn health() -> &'static str {
    "ok"
}

async fn slack_events(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Err(e) = slack::verify_signature(
        &state.signing_secret,
        header(&headers, "x-slack-request-timestamp"),
        header(&headers, "x-slack-signature"),
        &body,
        chrono::Utc::now().timestamp(),
    ) {
        warn!("Rejected Slack request: {}", e);
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let envelope: Envelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Malformed Slack payload: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };

    match envelope {
        Envelope::UrlVerification { challenge } => {
            info!("Answering Slack URL verification");
            challenge.into_response()
        }
        Envelope::EventCallback { event, event_time } => {
            if event.kind != "message" {
                debug!("Ignoring {} event", event.kind);
                return StatusCode::OK.into_response();
            }
            let (Some(channel_id), Some(event_timestamp)) = (event.channel, event_time) else {
                debug!("Ignoring message event without channel or event_time");
                return StatusCode::OK.into_response();
            };

            let inbound = InboundEvent {
                text: event.text,
                channel_id,
                event_timestamp,
            };
            // Slack wants an ack within 3 seconds; quote lookups run after it.
            let handler = state.handler.clone();
            tokio::spawn(async move {
                handler.handle(&inbound).await;
            });
            StatusCode::OK.into_response()
        }
        Envelope::Other => StatusCode::OK.into_response(),
    }
}
