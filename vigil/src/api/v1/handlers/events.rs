//! v1 progress event stream.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::api::AppState;

/// `GET /api/v1/searches/{searchId}/events`
///
/// Server-sent stream of progress events for one recurring search. The
/// bus is at-least-once and unordered; a consumer that falls behind the
/// channel capacity loses the oldest events rather than slowing the
/// pipeline down.
pub async fn search_events(
    State(state): State<AppState>,
    Path(search_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.events.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if event.search_id() != search_id {
                        continue;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => yield Ok(Event::default().data(json)),
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to serialize progress event");
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, search_id, "SSE subscriber lagged, events dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
