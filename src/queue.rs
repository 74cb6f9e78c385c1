//! # Event queue module
//!
//! This module provides the single-slot, coalescing [`EventQueue`] keyed by
//! resource uid, with a disjoint "currently handling" set.
//!
//! The queue itself is a plain `HashMap`-backed structure with no internal
//! synchronization: [`crate::controller::Controller`] guards it (together
//! with its [`crate::tracker::ChangeTracker`]) behind a single
//! `tokio::sync::Mutex`, per the one-lock-per-controller policy. All
//! operations here are O(1).

use std::collections::HashMap;

use crate::event::Event;

// -----------------------------------------------------------------------------
// EventQueue structure

/// At most one pending event per uid; at most one in-flight (`handling`)
/// event per uid. `pending[uid]` may coexist with `handling[uid]`, but is
/// never dequeued while `handling[uid]` is set.
pub struct EventQueue<T> {
    pending: HashMap<String, Event<T>>,
    handling: HashMap<String, Event<T>>,
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self {
            pending: HashMap::new(),
            handling: HashMap::new(),
        }
    }
}

impl<T> EventQueue<T>
where
    T: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `pending[uid] = event`, unconditionally overwriting any prior
    /// pending value for the same uid. Intermediate watch events for the
    /// same resource are redundant; only the terminal state matters for
    /// convergence.
    pub fn enqueue(&mut self, uid: String, event: Event<T>) {
        self.pending.insert(uid, event);
    }

    /// Returns the pending event for `uid` without removing it.
    pub fn peek(&self, uid: &str) -> Option<&Event<T>> {
        self.pending.get(uid)
    }

    /// Removes and returns the pending event for `uid`, unless a
    /// reconciliation is already in flight for it (back-pressure: never
    /// start a second reconcile while one is in flight).
    pub fn dequeue(&mut self, uid: &str) -> Option<Event<T>> {
        if self.handling.contains_key(uid) {
            return None;
        }

        self.pending.remove(uid)
    }

    /// Marks `event` as in flight for its uid.
    pub fn begin_handle(&mut self, uid: String, event: Event<T>) {
        self.handling.insert(uid, event);
    }

    /// Clears the in-flight marker for `uid`.
    pub fn end_handle(&mut self, uid: &str) {
        self.handling.remove(uid);
    }

    /// Returns whether `uid` currently has an in-flight reconciliation.
    /// Exposed mainly for tests asserting the mutual-exclusion invariant.
    pub fn is_handling(&self, uid: &str) -> bool {
        self.handling.contains_key(uid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(n: u32) -> Event<u32> {
        Event::Added(n)
    }

    #[test]
    fn enqueue_overwrites_prior_pending_value() {
        let mut queue = EventQueue::new();
        queue.enqueue("u1".to_string(), added(1));
        queue.enqueue("u1".to_string(), added(2));

        match queue.peek("u1") {
            Some(Event::Added(n)) => assert_eq!(*n, 2),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn dequeue_is_blocked_while_handling() {
        let mut queue = EventQueue::new();
        queue.begin_handle("u1".to_string(), added(1));
        queue.enqueue("u1".to_string(), added(2));

        assert!(queue.dequeue("u1").is_none());
        assert!(queue.peek("u1").is_some());
    }

    #[test]
    fn dequeue_succeeds_once_handling_ends() {
        let mut queue = EventQueue::new();
        queue.begin_handle("u1".to_string(), added(1));
        queue.enqueue("u1".to_string(), added(2));
        queue.end_handle("u1");

        match queue.dequeue("u1") {
            Some(Event::Added(n)) => assert_eq!(n, 2),
            other => panic!("expected Added(2), got {other:?}"),
        }
    }

    #[test]
    fn dequeue_of_absent_uid_is_none() {
        let mut queue: EventQueue<u32> = EventQueue::new();
        assert!(queue.dequeue("missing").is_none());
    }
}
