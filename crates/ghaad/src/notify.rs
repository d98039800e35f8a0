//! Change notifications for UI-style consumers of the engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::RepoStatus;

/// What changed. Consumers re-read engine state after being notified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    AdapterChanged,
    SessionChanged,
    RepoStatusChanged(RepoStatus),
    CollectionChanged { collection: String },
    Synced,
    PullRequestsChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&Change) + Send + Sync>;

/// Ordered registry of listeners.
#[derive(Default)]
pub(crate) struct Subscribers {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(SubscriptionId, Listener)>>,
}

impl Subscribers {
    pub(crate) fn subscribe(&self, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, listener));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Call every listener. The registry lock is released first so listeners
    /// may subscribe or unsubscribe.
    pub(crate) fn notify(&self, change: Change) {
        let listeners: Vec<Listener> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        tracing::debug!(?change, listeners = listeners.len(), "notifying subscribers");
        for listener in listeners {
            listener(&change);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn recorder() -> (Arc<Mutex<Vec<Change>>>, Listener) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, Arc::new(move |change: &Change| sink.lock().unwrap().push(change.clone())))
    }

    #[test]
    fn notifies_in_subscription_order() {
        let subscribers = Subscribers::default();
        let order = Arc::new(Mutex::new(Vec::new()));

        for n in 0..3 {
            let order = order.clone();
            subscribers.subscribe(Arc::new(move |_: &Change| order.lock().unwrap().push(n)));
        }

        subscribers.notify(Change::Synced);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let subscribers = Subscribers::default();
        let (seen, listener) = recorder();
        let id = subscribers.subscribe(listener);

        subscribers.notify(Change::AdapterChanged);
        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.notify(Change::SessionChanged);

        assert_eq!(*seen.lock().unwrap(), vec![Change::AdapterChanged]);
    }

    #[test]
    fn listener_may_unsubscribe_itself() {
        let subscribers = Arc::new(Subscribers::default());
        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));

        let registry = subscribers.clone();
        let own_id = slot.clone();
        let id = subscribers.subscribe(Arc::new(move |_: &Change| {
            if let Some(id) = *own_id.lock().unwrap() {
                registry.unsubscribe(id);
            }
        }));
        *slot.lock().unwrap() = Some(id);

        subscribers.notify(Change::Synced);
        assert!(!subscribers.unsubscribe(id));
    }
}
