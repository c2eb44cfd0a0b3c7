use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use shield_model::PushEvent;

use super::{PushEventClient, PushTransport, Subscription};

/// Most-recent-N buffer of push events for display.
#[derive(Debug, Clone)]
pub struct EventFeed {
    events: Arc<Mutex<VecDeque<PushEvent>>>,
    capacity: usize,
}

impl EventFeed {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Maximum number of events kept.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Add `event`, evicting the oldest one when full.
    pub fn push(&self, event: PushEvent) {
        let mut events = self.events.lock();
        if events.len() == self.capacity {
            events.pop_back();
        }
        events.push_front(event);
    }

    /// Buffered events, newest first.
    pub fn snapshot(&self) -> Vec<PushEvent> {
        self.events.lock().iter().cloned().collect()
    }

    /// Most recent event.
    pub fn latest(&self) -> Option<PushEvent> {
        self.events.lock().front().cloned()
    }

    /// Number of events held.
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether no event has been kept yet, or the feed was cleared.
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }

    /// Drop every held event.
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Record every event `client` delivers until the subscription drops.
    pub fn attach<T: PushTransport + ?Sized>(&self, client: &PushEventClient<T>) -> Subscription {
        let feed = self.clone();
        client.subscribe(move |event| feed.push(event.clone()))
    }
}

impl Default for EventFeed {
    fn default() -> Self {
        Self::new(shield_config::constants::DEFAULT_FEED_CAPACITY)
    }
}
