//! The lifecycle event bus.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::application::Application;

/// A point in the application's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    /// Raised before the application starts serving calls.
    Starting,
    /// Raised once the application is ready.
    Started,
    /// Raised before the application shuts down.
    Stopping,
    /// Raised after shutdown completed.
    Stopped,
}

impl LifecycleEvent {
    /// Every event, in the order an application raises them.
    pub const ALL: [Self; 4] = [Self::Starting, Self::Started, Self::Stopping, Self::Stopped];

    /// Returns the event name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies one subscription so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A lifecycle subscriber.
pub type LifecycleHandler = Arc<dyn Fn(&Application) -> anyhow::Result<()> + Send + Sync>;

/// A subscriber that failed or panicked while an event was raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberFailure {
    /// The event being raised.
    pub event: LifecycleEvent,
    /// The failing subscription.
    pub subscription: SubscriptionId,
    /// What went wrong.
    pub message: String,
}

/// Ordered subscriber lists, one per lifecycle event.
#[derive(Default)]
pub struct LifecycleEvents {
    next_id: AtomicU64,
    handlers: RwLock<HashMap<LifecycleEvent, Vec<(SubscriptionId, LifecycleHandler)>>>,
}

impl LifecycleEvents {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `handler` to the end of `event`'s subscriber list.
    pub fn subscribe<F>(&self, event: LifecycleEvent, handler: F) -> SubscriptionId
    where
        F: Fn(&Application) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .entry(event)
            .or_default()
            .push((id, Arc::new(handler)));
        debug!(%event, subscription = %id, "Subscribed to lifecycle event");
        id
    }

    /// Removes a subscription. Returns false if it was not subscribed.
    pub fn unsubscribe(&self, event: LifecycleEvent, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&event) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    /// Number of subscribers for `event`.
    #[must_use]
    pub fn subscriber_count(&self, event: LifecycleEvent) -> usize {
        self.handlers.read().get(&event).map_or(0, Vec::len)
    }

    /// Invokes every subscriber of `event` in subscription order.
    ///
    /// The list is snapshotted first, so subscribers may unsubscribe
    /// (themselves included) while the event is being raised. A failing or
    /// panicking subscriber is logged and reported; the rest still run.
    pub fn raise(&self, event: LifecycleEvent, application: &Application) -> Vec<SubscriberFailure> {
        let snapshot: Vec<(SubscriptionId, LifecycleHandler)> = self
            .handlers
            .read()
            .get(&event)
            .cloned()
            .unwrap_or_default();

        debug!(%event, subscribers = snapshot.len(), "Raising lifecycle event");

        let mut failures = Vec::new();
        for (id, handler) in snapshot {
            let message = match catch_unwind(AssertUnwindSafe(|| handler(application))) {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error.to_string(),
                Err(panic) => panic_message(panic.as_ref()),
            };
            warn!(%event, subscription = %id, error = %message, "Lifecycle subscriber failed");
            failures.push(SubscriberFailure {
                event,
                subscription: id,
                message,
            });
        }
        failures
    }
}

impl fmt::Debug for LifecycleEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for event in LifecycleEvent::ALL {
            map.entry(&event, &handlers.get(&event).map_or(0, Vec::len));
        }
        map.finish()
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}
