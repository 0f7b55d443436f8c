//! Server-Sent Events relay
//!
//! Every connection gets its own bus subscription under a fresh UUID. The
//! subscription is removed when the client goes away (the stream is
//! dropped) and the stream ends when the bus terminates the subscription.

use crate::api::server::AppContext;
use crate::bus::EventBus;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, warn};

/// Unsubscribes when the event stream is dropped
struct Unsubscribe {
    bus: Arc<EventBus>,
    id: String,
}

impl Drop for Unsubscribe {
    fn drop(&mut self) {
        debug!("SSE client {} disconnected", self.id);
        self.bus.unsubscribe(&self.id);
    }
}

/// GET /api/get_events - SSE event stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let id = uuid::Uuid::new_v4().simple().to_string();
    debug!("New SSE client {}", id);

    let bus = Arc::clone(&ctx.app.bus);
    let events = bus.subscribe(&id).await;
    let guard = Unsubscribe { bus, id };

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(event) = events.recv().await {
            match serde_json::to_string(event.as_ref()) {
                Ok(json) => yield Ok(Event::default().data(json)),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
    };

    Sse::new(stream)
}
