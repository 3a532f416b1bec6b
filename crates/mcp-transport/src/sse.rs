//! The SSE / streamable-HTTP drain loop shared by both transport variants.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, Sse};
use futures::Stream;
use mcp_core::config::StreamConfig;
use mcp_storage::Storage;

/// Build the event stream for one open drain connection.
///
/// `endpoint_event` is `Some(post_url)` for the plain SSE endpoint (which
/// announces the POST URL bound to the session first); the streamable-HTTP
/// variant passes `None` and starts straight into message framing.
pub fn event_stream(
    storage: Arc<dyn Storage>,
    session_id: String,
    config: StreamConfig,
    endpoint_event: Option<String>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        if let Some(post_url) = endpoint_event {
            yield Ok(Event::default().event("endpoint").data(post_url));
        }

        let started = tokio::time::Instant::now();
        let mut idle_secs: u64 = 0;
        let mut interval = config.keepalive_interval_secs;

        loop {
            if started.elapsed() >= Duration::from_secs(config.max_connection_time_secs) {
                break;
            }

            let messages = match storage.list_messages(&session_id, 64).await {
                Ok(messages) => messages,
                Err(_) => break,
            };

            if messages.is_empty() {
                if config.test_mode {
                    break;
                }

                tokio::time::sleep(Duration::from_secs(interval)).await;
                yield Ok(Event::default().comment("keepalive"));

                idle_secs += interval;
                if idle_secs >= config.switch_interval_after_secs {
                    interval = (interval * 2).min(
                        config.keepalive_interval_secs * config.backoff_ceiling_multiplier,
                    );
                }
                continue;
            }

            idle_secs = 0;
            interval = config.keepalive_interval_secs;

            // Emit each message, then delete it from storage -- in that
            // order, per message. A client disconnect mid-batch drops this
            // generator before it resumes past the `yield`, so the delete
            // for the message that was never confirmed never runs and it
            // stays queued for the next drain connection.
            for message in messages {
                let payload = serde_json::to_string(&message.payload)
                    .unwrap_or_else(|_| "null".to_string());
                yield Ok(Event::default().event("message").data(payload));
                if storage.delete_message(&session_id, message.id).await.is_err() {
                    break;
                }
            }

            if config.test_mode {
                break;
            }
        }
    }
}

/// Wrap [`event_stream`] as an axum SSE response.
pub fn drain_stream(
    storage: Arc<dyn Storage>,
    session_id: String,
    config: StreamConfig,
    endpoint_event: Option<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(storage, session_id, config, endpoint_event))
}
