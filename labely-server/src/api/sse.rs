//! Server-Sent Events for labeling activity

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;

/// GET /events
///
/// Streams SessionStarted, LabelSubmitted, SessionCompleted and
/// SessionExpired events, with a heartbeat every 15 seconds.
pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    labely_common::sse::create_event_sse_stream(&state.event_bus, "labely-server")
}
