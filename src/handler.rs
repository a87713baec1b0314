use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dedup::DedupGuard;
use crate::format;
use crate::quote::{QuoteError, QuoteProvider};
use crate::slack::MessagePoster;
use crate::ticker;

/// A verified message event handed over by the webhook transport.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub text: Option<String>,
    pub channel_id: String,
    pub event_timestamp: f64,
}

/// Turns message events into quote replies: dedup, extract, quote, render, post.
///
/// Failures for one mention are logged and skipped; nothing is ever posted
/// back as an error, so the channel only sees successful quotes.
pub struct EventHandler {
    dedup: DedupGuard,
    quotes: Arc<dyn QuoteProvider>,
    poster: Arc<dyn MessagePoster>,
}

impl EventHandler {
    pub fn new(
        dedup: DedupGuard,
        quotes: Arc<dyn QuoteProvider>,
        poster: Arc<dyn MessagePoster>,
    ) -> Self {
        Self {
            dedup,
            quotes,
            poster,
        }
    }

    #[cfg(test)]
    pub fn dedup(&self) -> &DedupGuard {
        &self.dedup
    }

    pub async fn handle(&self, event: &InboundEvent) {
        let text = match event.text.as_deref() {
            Some(t) if !t.is_empty() => t,
            _ => return,
        };

        if !self.dedup.accept(event.event_timestamp) {
            return;
        }

        let mentions: Vec<&str> = ticker::extract(Some(text)).collect();
        info!(
            "Message in {} at {}: {} mention(s)",
            event.channel_id,
            event.event_timestamp,
            mentions.len()
        );
        debug!("Message text: {}", text);

        for symbol in mentions {
            self.process_mention(&event.channel_id, symbol).await;
        }
    }

    async fn process_mention(&self, channel: &str, symbol: &str) {
        let details = match self.quotes.query(symbol).await {
            Ok(details) => details,
            Err(QuoteError::NotFound(s)) => {
                debug!("No quote for ${}: {} not found", symbol, s);
                return;
            }
            Err(e) => {
                warn!("Quote lookup for ${} failed: {}", symbol, e);
                return;
            }
        };

        let message = format::render(&details);
        match self.poster.post(channel, &message).await {
            Ok(()) => info!(
                "Posted {} quote ({:?}) to {}",
                details.symbol, message.direction, channel
            ),
            Err(e) => warn!("Failed to post {} quote to {}: {}", details.symbol, channel, e),
        }
    }
}
