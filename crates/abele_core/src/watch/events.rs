//! Process-wide vault event dispatcher.
//!
//! # Responsibility
//! - Hold the one registry of `(id -> callback)` subscribers fed by the host's
//!   raw file stream and metadata-index signals.
//! - Provide the timer queue used to deliver debounced trailing calls.
//!
//! # Invariants
//! - Dispatch works on a snapshot: callbacks may subscribe or unsubscribe while
//!   an event is being delivered. A subscriber removed mid-dispatch is skipped;
//!   one added mid-dispatch does not see the in-flight event.
//! - Timers run in `(due_at, id)` order and each runs at most once.

use log::debug;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Stable handle for one registered subscriber.
pub type SubscriptionId = u64;

/// Stable handle for one scheduled timer.
pub type TimerId = u64;

type Listener = Rc<dyn Fn(&VaultEvent)>;
type TimerCallback = Box<dyn FnOnce()>;

/// Host event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEvent {
    /// Raw content change of one file.
    Modify { path: String },
    /// Raw rename/move of one file.
    Rename { old_path: String, new_path: String },
    /// Raw deletion of one file.
    Delete { path: String },
    /// Metadata index was refreshed for one file.
    MetadataChanged { path: String },
    /// Metadata index has caught up with all pending file changes.
    MetadataResolved,
}

impl VaultEvent {
    /// Stable event name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Modify { .. } => "modify",
            Self::Rename { .. } => "rename",
            Self::Delete { .. } => "delete",
            Self::MetadataChanged { .. } => "metadata_changed",
            Self::MetadataResolved => "metadata_resolved",
        }
    }
}

/// Single dispatcher shared by every watcher and relation graph.
#[derive(Default)]
pub struct VaultEvents {
    next_id: Cell<u64>,
    listeners: RefCell<BTreeMap<SubscriptionId, Listener>>,
    timers: RefCell<BTreeMap<(u64, TimerId), TimerCallback>>,
}

impl VaultEvents {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> u64 {
        let id = self.next_id.get().wrapping_add(1);
        self.next_id.set(id);
        id
    }

    /// Registers one subscriber and returns its handle.
    pub fn subscribe(&self, listener: impl Fn(&VaultEvent) + 'static) -> SubscriptionId {
        let id = self.allocate_id();
        self.listeners.borrow_mut().insert(id, Rc::new(listener));
        id
    }

    /// Removes one subscriber. Returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.listeners.borrow_mut().remove(&id).is_some()
    }

    pub fn is_subscribed(&self, id: SubscriptionId) -> bool {
        self.listeners.borrow().contains_key(&id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Delivers one event to every subscriber registered at call time.
    pub fn emit(&self, event: &VaultEvent) {
        let snapshot: Vec<(SubscriptionId, Listener)> = self
            .listeners
            .borrow()
            .iter()
            .map(|(id, listener)| (*id, Rc::clone(listener)))
            .collect();

        debug!(
            "event=vault_event module=watch status=dispatch kind={} listeners={}",
            event.name(),
            snapshot.len()
        );

        for (id, listener) in snapshot {
            if !self.is_subscribed(id) {
                continue;
            }
            listener(event);
        }
    }

    /// Schedules `callback` to run once the clock reaches `due_at` (epoch ms).
    pub fn schedule(&self, due_at: u64, callback: impl FnOnce() + 'static) -> TimerId {
        let id = self.allocate_id();
        self.timers
            .borrow_mut()
            .insert((due_at, id), Box::new(callback));
        id
    }

    /// Cancels a pending timer. Returns whether it was still pending.
    pub fn cancel(&self, id: TimerId) -> bool {
        let mut timers = self.timers.borrow_mut();
        let key = timers.keys().find(|(_, timer_id)| *timer_id == id).copied();
        match key {
            Some(key) => timers.remove(&key).is_some(),
            None => false,
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Runs every timer due at or before `now`, including timers scheduled by
    /// callbacks run here. Returns the number of callbacks run.
    pub fn run_due(&self, now: u64) -> usize {
        let mut ran = 0;
        loop {
            let next = {
                let mut timers = self.timers.borrow_mut();
                let due_key = timers
                    .keys()
                    .next()
                    .copied()
                    .filter(|(due_at, _)| *due_at <= now);
                due_key.and_then(|key| timers.remove(&key))
            };

            match next {
                Some(callback) => {
                    callback();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{VaultEvent, VaultEvents};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn modify(path: &str) -> VaultEvent {
        VaultEvent::Modify {
            path: path.to_string(),
        }
    }

    #[test]
    fn emit_reaches_every_subscriber_until_unsubscribed() {
        let events = VaultEvents::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first_seen = Rc::clone(&seen);
        let first = events.subscribe(move |event| first_seen.borrow_mut().push(("a", event.clone())));
        let second_seen = Rc::clone(&seen);
        events.subscribe(move |event| second_seen.borrow_mut().push(("b", event.clone())));

        events.emit(&modify("x.md"));
        assert!(events.unsubscribe(first));
        assert!(!events.unsubscribe(first));
        events.emit(&modify("y.md"));

        let seen = seen.borrow();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], ("b", modify("y.md")));
    }

    #[test]
    fn subscriber_removed_during_dispatch_is_skipped() {
        let events = Rc::new(VaultEvents::new());
        let calls = Rc::new(RefCell::new(0));

        // Subscriber ids are allocated in order, so the remover runs first.
        let victim_id = Rc::new(RefCell::new(0));
        let events_for_remover = Rc::downgrade(&events);
        let victim_for_remover = Rc::clone(&victim_id);
        events.subscribe(move |_| {
            if let Some(events) = events_for_remover.upgrade() {
                events.unsubscribe(*victim_for_remover.borrow());
            }
        });
        let victim_calls = Rc::clone(&calls);
        *victim_id.borrow_mut() = events.subscribe(move |_| *victim_calls.borrow_mut() += 1);

        events.emit(&VaultEvent::MetadataResolved);
        assert_eq!(*calls.borrow(), 0);
        assert_eq!(events.listener_count(), 1);
    }

    #[test]
    fn timers_run_in_due_order_and_only_once() {
        let events = VaultEvents::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (due, label) in [(30, "late"), (10, "early"), (20, "middle")] {
            let order = Rc::clone(&order);
            events.schedule(due, move || order.borrow_mut().push(label));
        }
        let cancelled_order = Rc::clone(&order);
        let cancelled = events.schedule(15, move || cancelled_order.borrow_mut().push("cancelled"));
        assert!(events.cancel(cancelled));

        assert_eq!(events.run_due(20), 2);
        assert_eq!(events.run_due(20), 0);
        assert_eq!(events.run_due(100), 1);
        assert_eq!(*order.borrow(), vec!["early", "middle", "late"]);
        assert_eq!(events.pending_timers(), 0);
    }
}
