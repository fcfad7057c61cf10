// src/network/event_channel.rs
use std::collections::HashSet;

/// A named publish point owned by one object.
#[derive(Debug, Clone)]
pub struct EventChannel {
    object_id: String,
    event_id: String,
    active: bool,
    subscribers: HashSet<String>,
}

impl EventChannel {
    pub fn new(object_id: impl Into<String>, event_id: impl Into<String>, active: bool) -> Self {
        Self {
            object_id: object_id.into(),
            event_id: event_id.into(),
            active,
            subscribers: HashSet::new(),
        }
    }

    pub fn object_id(&self) -> &str {
        &self.object_id
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Flips availability only; the subscriber set is left as it is.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Returns false if `object_id` was already subscribed.
    pub fn subscribe(&mut self, object_id: impl Into<String>) -> bool {
        self.subscribers.insert(object_id.into())
    }

    /// Returns false if `object_id` was not subscribed.
    pub fn unsubscribe(&mut self, object_id: &str) -> bool {
        self.subscribers.remove(object_id)
    }

    pub fn subscribers(&self) -> HashSet<String> {
        self.subscribers.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Empties the subscriber set, handing back who was in it.
    pub fn take_subscribers(&mut self) -> HashSet<String> {
        std::mem::take(&mut self.subscribers)
    }
}
