//! SSE session status stream.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{Extension, Path},
    response::{sse::Event, Sse},
};
use futures_util::{Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};

/// Handler for `GET /api/signing/sessions/{id}/events`.
///
/// Emits one `status` event per change, starting with the current status,
/// and closes after a terminal status.
pub async fn session_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let updates = state.sessions.subscribe(&id).await?;

    let events = updates.filter_map(|update| async move {
        match serde_json::to_string(&update) {
            Ok(data) => Some(Ok(Event::default().event("status").data(data))),
            Err(e) => {
                tracing::error!("failed to serialize session update: {}", e);
                None
            }
        }
    });

    Ok(Sse::new(events).keep_alive(axum::response::sse::KeepAlive::default()))
}
