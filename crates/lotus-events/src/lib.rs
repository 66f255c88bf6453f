//! The event-emitter surface (§9): a typed observer registry, `on(kind,
//! handler) -> unsubscribe`. No global bus — one registry per node,
//! created at start and torn down at stop.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Every event kind the core emits, across both protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SessionNoncesComplete,
    SessionComplete,
    SessionAborted,
    PoolAborted,
    SecurityRejected,
    ValidationError,
}

/// The event payload delivered to a handler. Kept loosely typed (an id
/// plus a free-form detail string) so session/pool/security code doesn't
/// need to depend on this crate's specific event enum per kind.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: EventKind,
    pub subject_id: String,
    pub detail: String,
}

type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

/// A token returned by `on`; dropping it does *not* unsubscribe — call
/// `unsubscribe` explicitly, mirroring the source's `on(kind, handler) ->
/// unsubscribe` contract rather than RAII-based unsubscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    handlers: Mutex<HashMap<EventKind, Vec<(SubscriptionId, Handler)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every event of `kind`. Returns a
    /// subscription id that `unsubscribe` accepts.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        for handlers in self.handlers.lock().unwrap().values_mut() {
            handlers.retain(|(h_id, _)| *h_id != id);
        }
    }

    /// Emit `event` to every handler currently registered for its kind.
    /// Ordering guarantees (§5): `SESSION_NONCES_COMPLETE` and
    /// `SESSION_COMPLETE` are each emitted at most once per session by the
    /// caller — the bus itself makes no such guarantee, it only fans out.
    pub fn emit(&self, event: Event) {
        let handlers = self
            .handlers
            .lock()
            .unwrap()
            .get(&event.kind)
            .cloned()
            .unwrap_or_default();
        for (_, handler) in handlers {
            handler(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn subscribed_handler_receives_matching_events() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.on(EventKind::SessionComplete, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(Event {
            kind: EventKind::SessionComplete,
            subject_id: "s1".to_string(),
            detail: String::new(),
        });
        bus.emit(Event {
            kind: EventKind::SessionAborted,
            subject_id: "s1".to_string(),
            detail: String::new(),
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = bus.on(EventKind::PoolAborted, move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(Event {
            kind: EventKind::PoolAborted,
            subject_id: "pool1".to_string(),
            detail: "x".to_string(),
        });
        bus.unsubscribe(id);
        bus.emit(Event {
            kind: EventKind::PoolAborted,
            subject_id: "pool1".to_string(),
            detail: "x".to_string(),
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn multiple_subscribers_all_fire() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = count.clone();
            bus.on(EventKind::SecurityRejected, move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(Event {
            kind: EventKind::SecurityRejected,
            subject_id: "peer1".to_string(),
            detail: "rate limited".to_string(),
        });
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }
}
