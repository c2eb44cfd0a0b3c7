use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use shield_model::PushEvent;
use tracing::warn;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Raw id, unique per client.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subscriber-{}", self.0)
    }
}

pub(crate) type Handler = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// Registration-ordered handler list.
///
/// Dispatch works on a snapshot taken under the lock and calls handlers with
/// the lock released, so handlers may subscribe or unsubscribe freely. Each
/// handler's registration is re-checked right before it is called.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    next_id: AtomicU64,
    handlers: Mutex<Vec<(SubscriberId, Handler)>>,
}

impl SubscriberSet {
    pub(crate) fn insert(&self, handler: Handler) -> SubscriberId {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.handlers.lock().push((id, handler));
        id
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut handlers = self.handlers.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        handlers.len() != before
    }

    pub(crate) fn contains(&self, id: SubscriberId) -> bool {
        self.handlers.lock().iter().any(|(existing, _)| *existing == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    /// Returns how many handlers returned normally. A handler that panics is
    /// skipped for this event and stays registered.
    pub(crate) fn dispatch(&self, event: &PushEvent) -> usize {
        let snapshot: Vec<(SubscriberId, Handler)> = self.handlers.lock().clone();

        let mut delivered = 0;
        for (id, handler) in snapshot {
            if !self.contains(id) {
                continue;
            }
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| handler(event)));
            match outcome {
                Ok(()) => delivered += 1,
                Err(_) => {
                    warn!(subscriber = %id, "push subscriber panicked, skipping it for this event")
                }
            }
        }
        delivered
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("len", &self.len())
            .finish()
    }
}

/// Handle to one registered handler.
///
/// Dropping it unsubscribes the handler; call [`Subscription::detach`] to
/// keep the handler registered for the life of the client.
#[must_use = "dropping a Subscription unsubscribes its handler"]
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    set: Weak<SubscriberSet>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, set: &Arc<SubscriberSet>) -> Self {
        Self {
            id,
            set: Arc::downgrade(set),
        }
    }

    /// Id of the handler this guard owns.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove exactly this handler. Returns `false` if it was already gone.
    pub fn unsubscribe(&self) -> bool {
        self.set.upgrade().is_some_and(|set| set.remove(self.id))
    }

    /// Whether the handler is still registered.
    pub fn is_active(&self) -> bool {
        self.set.upgrade().is_some_and(|set| set.contains(self.id))
    }

    /// Leave the handler registered; it can still be removed through
    /// `PushEventClient::unsubscribe` with the returned id.
    pub fn detach(mut self) -> SubscriberId {
        self.set = Weak::new();
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
