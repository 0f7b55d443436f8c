//! Per-subscriber bounded event queue

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;
use webradio_common::BusEvent;

/// One subscriber's view of the event bus
///
/// The bus pushes without blocking; a full queue gets the subscriber evicted.
/// Termination (unsubscribe, eviction, bus shutdown) drops the sending side,
/// so a reader first drains what is buffered and then sees `None`.
pub struct Subscription {
    id: String,
    tx: Mutex<Option<mpsc::Sender<Arc<BusEvent>>>>,
    rx: tokio::sync::Mutex<mpsc::Receiver<Arc<BusEvent>>>,
}

impl Subscription {
    pub(crate) fn new(id: &str, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            id: id.to_string(),
            tx: Mutex::new(Some(tx)),
            rx: tokio::sync::Mutex::new(rx),
        }
    }

    /// Subscriber identity
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the bus has stopped delivering to this subscriber
    pub fn is_terminated(&self) -> bool {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Wait for the next event; `None` once terminated and drained
    pub async fn recv(&self) -> Option<Arc<BusEvent>> {
        self.rx.lock().await.recv().await
    }

    /// Non-blocking push; `false` if the queue is full or terminated
    pub(crate) fn try_deliver(&self, event: Arc<BusEvent>) -> bool {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match tx.as_ref() {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    /// End the stream for the reader (the terminal sentinel)
    pub(crate) fn terminate(&self) {
        self.tx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("terminated", &self.is_terminated())
            .finish()
    }
}
