//! Event bus
//!
//! Single-writer, many-reader fan-out. Producers call [`EventBus::publish`],
//! which never blocks. One distribution task renders each event once and
//! pushes it into every subscriber's bounded queue without blocking; a
//! subscriber whose queue is full is evicted instead of slowing anyone down.
//!
//! # Ordering
//!
//! Events reach a given subscriber in publish order. There is no ordering
//! across subscribers.
//!
//! # Keep-alive
//!
//! When nothing was published for the keep-alive interval, the distribution
//! task synthesizes a `keep_alive` event carrying the local time so that
//! streaming clients can detect dead connections.

mod subscription;

pub use subscription::Subscription;

use crate::state::SharedState;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use webradio_common::config::EventsConfig;
use webradio_common::{BusEvent, RadioEvent};

/// Smallest usable queue: it must hold the two seed events
const MIN_QUEUE_SIZE: usize = 2;

/// Subscriber registry in registration order
#[derive(Default)]
struct Registry {
    subscribers: Mutex<Vec<Arc<Subscription>>>,
}

impl Registry {
    fn find(&self, id: &str) -> Option<Arc<Subscription>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    fn snapshot(&self) -> Vec<Arc<Subscription>> {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deliver to every subscriber, evicting the ones that cannot keep up
    fn deliver(&self, event: Arc<BusEvent>) {
        // The lock is not held while pushing
        let stale: Vec<Arc<Subscription>> = self
            .snapshot()
            .into_iter()
            .filter(|sub| !sub.try_deliver(Arc::clone(&event)))
            .collect();

        if stale.is_empty() {
            return;
        }

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for sub in &stale {
            warn!("Evicting stale subscriber {}", sub.id());
            subscribers.retain(|s| !Arc::ptr_eq(s, sub));
        }
        drop(subscribers);

        for sub in stale {
            sub.terminate();
        }
    }

    fn drain(&self) -> Vec<Arc<Subscription>> {
        std::mem::take(
            &mut *self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

/// Event bus shared by all producers and subscribers
pub struct EventBus {
    ingress: mpsc::UnboundedSender<RadioEvent>,
    registry: Arc<Registry>,
    state: Arc<SharedState>,
    queue_size: usize,
    shutdown: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl EventBus {
    /// Create the bus and spawn its distribution task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &EventsConfig, state: Arc<SharedState>) -> Arc<Self> {
        let (ingress, ingress_rx) = mpsc::unbounded_channel();
        let registry = Arc::new(Registry::default());
        let shutdown = CancellationToken::new();
        let keep_alive = Duration::from_secs(config.keep_alive_secs.max(1));

        let task = tokio::spawn(distribute(
            ingress_rx,
            Arc::clone(&registry),
            keep_alive,
            shutdown.clone(),
        ));

        info!(
            "Event bus started (queue size {}, keep-alive {}s)",
            config.queue_size,
            keep_alive.as_secs()
        );

        Arc::new(Self {
            ingress,
            registry,
            state,
            queue_size: config.queue_size.max(MIN_QUEUE_SIZE),
            shutdown,
            task: Mutex::new(Some(task)),
        })
    }

    /// Queue an event for distribution. Never blocks.
    pub fn publish(&self, event: RadioEvent) {
        debug!("Publishing {} event", event.kind());
        if self.ingress.send(event).is_err() {
            debug!("Event bus stopped, event dropped");
        }
    }

    /// Publish the current shared state document
    pub async fn publish_state(&self) {
        self.publish(RadioEvent::State(self.state.snapshot().await));
    }

    /// Register a subscriber, or return the existing queue for `id`.
    ///
    /// A new queue starts with a `version` and a `state` event so the
    /// subscriber is never blind to the current state.
    pub async fn subscribe(&self, id: &str) -> Arc<Subscription> {
        if let Some(existing) = self.registry.find(id) {
            debug!("Reusing subscriber queue with id {}", id);
            return existing;
        }

        let snapshot = self.state.snapshot().await;
        let sub = Arc::new(Subscription::new(id, self.queue_size));
        sub.try_deliver(Arc::new(BusEvent::new(RadioEvent::Version(
            self.state.version().to_string(),
        ))));
        sub.try_deliver(Arc::new(BusEvent::new(RadioEvent::State(snapshot))));

        let mut subscribers = self
            .registry
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = subscribers.iter().find(|s| s.id() == id) {
            return Arc::clone(existing);
        }
        if self.shutdown.is_cancelled() {
            sub.terminate();
            return sub;
        }
        info!("Adding subscriber with id {}", id);
        subscribers.push(Arc::clone(&sub));
        sub
    }

    /// Remove a subscriber and end its stream
    pub fn unsubscribe(&self, id: &str) {
        let removed = {
            let mut subscribers = self
                .registry
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let position = subscribers.iter().position(|s| s.id() == id);
            position.map(|index| subscribers.remove(index))
        };

        if let Some(sub) = removed {
            info!("Removing subscriber with id {}", id);
            sub.terminate();
        }
    }

    /// Whether `id` is currently registered
    pub fn is_subscribed(&self, id: &str) -> bool {
        self.registry.find(id).is_some()
    }

    /// Number of registered subscribers
    pub fn subscriber_count(&self) -> usize {
        self.registry.snapshot().len()
    }

    /// Stop distribution and end every remaining subscriber's stream
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Event distribution task failed: {}", e);
            }
        }
    }
}

/// Distribution loop
async fn distribute(
    mut ingress: mpsc::UnboundedReceiver<RadioEvent>,
    registry: Arc<Registry>,
    keep_alive: Duration,
    shutdown: CancellationToken,
) {
    info!("Event distribution started");

    loop {
        let event = tokio::select! {
            _ = shutdown.cancelled() => break,
            received = tokio::time::timeout(keep_alive, ingress.recv()) => match received {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(_) => RadioEvent::KeepAlive(
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                ),
            },
        };

        registry.deliver(Arc::new(BusEvent::new(event)));
    }

    info!("Stopping event distribution");
    for sub in registry.drain() {
        sub.terminate();
    }
    info!("Event distribution finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(queue_size: usize) -> EventsConfig {
        EventsConfig {
            queue_size,
            keep_alive_secs: 15,
        }
    }

    async fn drain_seed(sub: &Subscription) {
        assert_eq!(sub.recv().await.unwrap().kind(), "version");
        assert_eq!(sub.recv().await.unwrap().kind(), "state");
    }

    #[tokio::test]
    async fn test_subscribe_is_idempotent() {
        let bus = EventBus::start(&config(20), Arc::new(SharedState::default()));

        let first = bus.subscribe("x").await;
        let second = bus.subscribe("x").await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_new_subscriber_is_seeded() {
        let state = Arc::new(SharedState::new("player"));
        let bus = EventBus::start(&config(20), Arc::clone(&state));

        let sub = bus.subscribe("x").await;

        let version = sub.recv().await.unwrap();
        assert_eq!(version.event, RadioEvent::Version(state.version().to_string()));
        let snapshot = sub.recv().await.unwrap();
        assert_eq!(snapshot.event, RadioEvent::State(state.snapshot().await));
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers_in_order() {
        let bus = EventBus::start(&config(20), Arc::new(SharedState::default()));
        let a = bus.subscribe("a").await;
        let b = bus.subscribe("b").await;
        drain_seed(&a).await;
        drain_seed(&b).await;

        for volume in [10, 20, 30] {
            bus.publish(RadioEvent::VolSet(volume));
        }

        for sub in [&a, &b] {
            for volume in [10, 20, 30] {
                let event = sub.recv().await.unwrap();
                assert_eq!(event.event, RadioEvent::VolSet(volume));
                assert_eq!(event.text, format!("setting current volume to {}", volume));
            }
        }
    }

    #[tokio::test]
    async fn test_unsubscribe_ends_stream() {
        let bus = EventBus::start(&config(20), Arc::new(SharedState::default()));
        let sub = bus.subscribe("x").await;
        drain_seed(&sub).await;

        bus.unsubscribe("x");

        assert!(!bus.is_subscribed("x"));
        assert!(sub.recv().await.is_none());

        // Subscribing again yields a fresh queue
        let again = bus.subscribe("x").await;
        assert!(!Arc::ptr_eq(&sub, &again));
    }

    #[tokio::test]
    async fn test_shutdown_terminates_subscribers() {
        let bus = EventBus::start(&config(20), Arc::new(SharedState::default()));
        let sub = bus.subscribe("x").await;
        drain_seed(&sub).await;

        bus.shutdown().await;

        assert!(sub.recv().await.is_none());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
