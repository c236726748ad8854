//! Server-Sent Events (SSE) utilities

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use crate::events::{EventBus, LabelyEvent};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Forward every event on `bus` to an SSE client, with a keep-alive
/// heartbeat comment every 15 seconds
///
/// A client that falls behind the channel capacity skips the lost events and
/// keeps streaming.
///
/// # Example
/// ```rust,ignore
/// pub async fn event_stream(
///     State(state): State<AppState>,
/// ) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
///     labely_common::sse::create_event_sse_stream(&state.event_bus, "labely-server")
/// }
/// ```
pub fn create_event_sse_stream(
    bus: &EventBus,
    service_name: &'static str,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to {} events", service_name);

    Sse::new(event_frames(bus.subscribe(), service_name)).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("heartbeat"),
    )
}

/// A `ConnectionStatus` frame followed by one frame per received event
///
/// Ends when the bus closes. Heartbeats come from the `KeepAlive` wrapper.
fn event_frames(
    mut rx: broadcast::Receiver<LabelyEvent>,
    service_name: &'static str,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        yield Ok(Event::default()
            .event("ConnectionStatus")
            .data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) => {
                    let event_type = event.event_type();
                    match serde_json::to_string(&event) {
                        Ok(event_json) => {
                            yield Ok(Event::default()
                                .event(event_type)
                                .data(event_json));
                        }
                        Err(e) => {
                            warn!("SSE: Failed to serialize event {}: {}", event_type, e);
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("SSE: {} client lagged, skipped {} events", service_name, skipped);
                }
                Err(RecvError::Closed) => {
                    info!("SSE: {} event bus closed", service_name);
                    break;
                }
            }
        }
    }
}
