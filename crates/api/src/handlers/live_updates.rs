//! Server-sent event stream of a session's progress.
//!
//! The stream polls the session at a fixed interval and emits one `data:`
//! event per poll. When a poll observes a terminal status a final summary
//! event follows and the stream ends. Dropping the connection does not
//! affect processing.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use futures::stream::{self, BoxStream, Stream, StreamExt};
use lifeguard_pipeline::payload::STREAM_DETECTION_LIMIT;
use lifeguard_pipeline::DetectionSession;
use serde::Serialize;
use serde_json::json;

use crate::handlers::session::find_session;
use crate::state::AppState;

type EventStream = BoxStream<'static, Result<Event, Infallible>>;

/// GET /live_updates/{session_id}
///
/// An unknown session yields a single `{"error": "Session not found"}` event.
pub async fn live_updates(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Sse<KeepAliveStream<EventStream>> {
    let events: EventStream = match find_session(&state, &session_id).await {
        Ok(session) => {
            tracing::debug!(%session_id, "Live update stream opened");
            update_stream(session, state.config.live_update_interval()).boxed()
        }
        Err(_) => stream::once(async { Ok(json_event(&json!({ "error": "Session not found" }))) })
            .boxed(),
    };

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Poll `session` every `interval` until it reaches a terminal status.
pub fn update_stream(
    session: Arc<DetectionSession>,
    interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> + Send + 'static {
    stream::unfold(Some((session, true)), move |cursor| async move {
        let Some((session, first)) = cursor else {
            return None;
        };
        if !first {
            tokio::time::sleep(interval).await;
        }

        let (update, terminal) = session.live_update(STREAM_DETECTION_LIMIT).await;
        let mut events = vec![json_event(&update)];
        let next = match terminal {
            Some(terminal) => {
                events.push(json_event(&terminal));
                None
            }
            None => Some((session, false)),
        };
        Some((events, next))
    })
    .flat_map(|events| stream::iter(events.into_iter().map(Ok)))
}

fn json_event<T: Serialize>(payload: &T) -> Event {
    match Event::default().json_data(payload) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize live update");
            Event::default().data(r#"{"error":"Failed to serialize update"}"#)
        }
    }
}
