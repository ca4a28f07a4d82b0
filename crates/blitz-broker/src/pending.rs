//! Request/response correlation.
//!
//! Every correlated request registers a one-shot completion handle keyed by
//! its request id together with the reply names it expects. Exactly one
//! listener fires per reply; the entry is removed on first resolution, and
//! the caller removes it itself when its deadline fires. A connection
//! closing clears the whole map, invalidating every outstanding listener.

use crate::message::Frame;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

struct PendingReply {
    expected: &'static [&'static str],
    tx: oneshot::Sender<Frame>,
    #[allow(dead_code)]
    created_at: Instant,
}

impl std::fmt::Debug for PendingReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingReply")
            .field("expected", &self.expected)
            .finish()
    }
}

/// Map of outstanding correlated requests for one connection.
#[derive(Debug, Default)]
pub struct PendingRequests {
    inner: DashMap<u64, PendingReply>,
    next_id: AtomicU64,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
            // ids start at 1 and never repeat within a connection's lifetime
            next_id: AtomicU64::new(1),
        }
    }

    /// Allocate a fresh request id. Monotonic, never reused while pending.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::AcqRel)
    }

    /// Register a listener for `id`, expecting one of `expected` reply names.
    ///
    /// At most one listener exists per id; registering twice for the same id
    /// replaces the earlier listener (which then resolves as closed).
    pub fn register(&self, id: u64, expected: &'static [&'static str]) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        let prior = self.inner.insert(
            id,
            PendingReply {
                expected,
                tx,
                created_at: Instant::now(),
            },
        );
        debug_assert!(prior.is_none(), "request id {id} registered twice");
        rx
    }

    /// Route an inbound frame to its listener, if any.
    ///
    /// Frames carrying a request id must match both the id and an expected
    /// name. Frames without an id (the gateway omits it on some reply
    /// names) resolve against the pending entry expecting that name.
    /// Returns `true` when a listener consumed the frame.
    pub fn try_resolve(&self, frame: &Frame) -> bool {
        let key = match frame.request_id_u64() {
            Some(id) => {
                let matches = self
                    .inner
                    .get(&id)
                    .is_some_and(|entry| entry.expected.contains(&frame.name.as_str()));
                if !matches {
                    return false;
                }
                id
            }
            None => {
                let found = self
                    .inner
                    .iter()
                    .find(|entry| entry.value().expected.contains(&frame.name.as_str()))
                    .map(|entry| *entry.key());
                match found {
                    Some(id) => id,
                    None => return false,
                }
            }
        };

        if let Some((_, reply)) = self.inner.remove(&key) {
            if reply.tx.send(frame.clone()).is_err() {
                debug!(request_id = key, "Reply listener already dropped");
            }
            return true;
        }
        false
    }

    /// Remove a listener whose deadline fired.
    pub fn remove(&self, id: u64) {
        self.inner.remove(&id);
    }

    /// Invalidate every outstanding listener (connection closed or
    /// reconnecting). Dropped senders make the receivers resolve as closed,
    /// which callers surface as a timeout.
    pub fn clear(&self) {
        let count = self.inner.len();
        if count > 0 {
            debug!(count, "Clearing pending request listeners");
        }
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(name: &str, request_id: Option<u64>) -> Frame {
        let mut v = json!({"name": name, "msg": {}});
        if let Some(id) = request_id {
            v["request_id"] = json!(id);
        }
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_ids_are_monotonic_and_unique() {
        let pending = PendingRequests::new();
        let a = pending.next_id();
        let b = pending.next_id();
        assert_eq!(a, 1);
        assert!(b > a);
    }

    #[test]
    fn test_resolve_by_id_and_name() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let mut rx = pending.register(id, &["candles"]);

        assert!(pending.try_resolve(&frame("candles", Some(id))));
        assert_eq!(pending.len(), 0);
        assert_eq!(rx.try_recv().unwrap().name, "candles");
    }

    #[test]
    fn test_resolve_requires_expected_name() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let _rx = pending.register(id, &["candles"]);

        // Same id, wrong name: not consumed, listener stays
        assert!(!pending.try_resolve(&frame("profile", Some(id))));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_resolve_requires_matching_id() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let _rx = pending.register(id, &["candles"]);

        assert!(!pending.try_resolve(&frame("candles", Some(id + 100))));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_resolve_without_id_matches_by_name() {
        // option-opened replies omit the request id
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let mut rx = pending.register(id, &["option-opened", "option"]);

        assert!(pending.try_resolve(&frame("option-opened", None)));
        assert_eq!(rx.try_recv().unwrap().name, "option-opened");
        assert_eq!(pending.len(), 0);
    }

    #[test]
    fn test_resolve_fires_exactly_once() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let _rx = pending.register(id, &["candles"]);

        assert!(pending.try_resolve(&frame("candles", Some(id))));
        // Second matching frame finds no listener
        assert!(!pending.try_resolve(&frame("candles", Some(id))));
    }

    #[test]
    fn test_unmatched_push_is_not_consumed() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let _rx = pending.register(id, &["candles"]);

        assert!(!pending.try_resolve(&frame("position-changed", None)));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_clear_invalidates_listeners() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let mut rx = pending.register(id, &["candles"]);

        pending.clear();
        assert!(pending.is_empty());
        // Sender dropped: receiver observes closure
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_remove_after_deadline() {
        let pending = PendingRequests::new();
        let id = pending.next_id();
        let _rx = pending.register(id, &["candles"]);

        pending.remove(id);
        assert!(!pending.try_resolve(&frame("candles", Some(id))));
    }
}
