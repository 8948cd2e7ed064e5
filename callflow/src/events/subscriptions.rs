//! Grouped subscriptions that can be torn down together.

use parking_lot::Mutex;

use super::lifecycle::{LifecycleEvent, LifecycleEvents, SubscriptionId};
use crate::application::Application;

/// Remembers every subscription a feature made so it can drop them all at
/// once, typically from its own `Stopped` handler.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    entries: Mutex<Vec<(LifecycleEvent, SubscriptionId)>>,
}

impl SubscriptionSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `handler` on `events` and records the subscription.
    pub fn subscribe<F>(&self, events: &LifecycleEvents, event: LifecycleEvent, handler: F) -> SubscriptionId
    where
        F: Fn(&Application) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = events.subscribe(event, handler);
        self.entries.lock().push((event, id));
        id
    }

    /// Unsubscribes everything recorded so far. Returns how many
    /// subscriptions were still live.
    pub fn unsubscribe_all(&self, events: &LifecycleEvents) -> usize {
        let entries = std::mem::take(&mut *self.entries.lock());
        entries
            .into_iter()
            .filter(|(event, id)| events.unsubscribe(*event, *id))
            .count()
    }

    /// Number of recorded subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True if nothing is recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ApplicationBuilder;

    #[test]
    fn test_unsubscribe_all() {
        let app = ApplicationBuilder::new("subscriptions").build().unwrap();
        let events = LifecycleEvents::new();
        let set = SubscriptionSet::new();

        for event in LifecycleEvent::ALL {
            set.subscribe(&events, event, |_| Ok(()));
        }
        assert_eq!(set.len(), 4);

        assert_eq!(set.unsubscribe_all(&events), 4);
        assert!(set.is_empty());
        for event in LifecycleEvent::ALL {
            assert_eq!(events.subscriber_count(event), 0);
            assert!(events.raise(event, &app).is_empty());
        }
        assert_eq!(set.unsubscribe_all(&events), 0);
    }
}
