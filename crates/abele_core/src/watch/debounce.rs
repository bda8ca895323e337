//! Leading-edge debounce over the hub timer queue.
//!
//! The first call of a burst runs at once. Calls arriving within `delay` of
//! the previous one are collapsed into a single trailing run scheduled at
//! `last_call + delay`.

use crate::clock::Clock;
use crate::watch::events::{TimerId, VaultEvents};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Clone)]
pub struct Debouncer {
    inner: Rc<DebounceInner>,
}

struct DebounceInner {
    events: Weak<VaultEvents>,
    clock: Rc<dyn Clock>,
    delay: u64,
    callback: Box<dyn Fn()>,
    state: RefCell<DebounceState>,
}

#[derive(Default)]
struct DebounceState {
    last_call: Option<u64>,
    pending: bool,
    timer: Option<TimerId>,
    cancelled: bool,
}

impl Debouncer {
    pub fn new(
        events: &Rc<VaultEvents>,
        clock: Rc<dyn Clock>,
        delay: u64,
        callback: impl Fn() + 'static,
    ) -> Self {
        Self {
            inner: Rc::new(DebounceInner {
                events: Rc::downgrade(events),
                clock,
                delay,
                callback: Box::new(callback),
                state: RefCell::new(DebounceState::default()),
            }),
        }
    }

    pub fn delay(&self) -> u64 {
        self.inner.delay
    }

    /// Whether a trailing run is waiting on the timer queue.
    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().pending
    }

    pub fn call(&self) {
        let inner = &self.inner;
        let now = inner.clock.now_millis();

        let (flush_stale, fire_now) = {
            let mut state = inner.state.borrow_mut();
            if state.cancelled {
                return;
            }

            let window_open = state
                .last_call
                .map(|last| now < last.saturating_add(inner.delay))
                .unwrap_or(false);
            state.last_call = Some(now);

            if window_open {
                state.pending = true;
                (false, false)
            } else {
                // The previous trailing run is overdue but the loop has not
                // delivered it yet.
                let stale = state.pending;
                state.pending = false;
                (stale, true)
            }
        };

        if flush_stale || fire_now {
            inner.cancel_timer();
        }
        if flush_stale {
            (inner.callback)();
        }
        if fire_now {
            (inner.callback)();
        } else {
            DebounceInner::reschedule(inner, now.saturating_add(inner.delay));
        }
    }

    /// Drops any pending trailing run and ignores later calls.
    pub fn cancel(&self) {
        {
            let mut state = self.inner.state.borrow_mut();
            state.cancelled = true;
            state.pending = false;
        }
        self.inner.cancel_timer();
    }
}

impl DebounceInner {
    fn cancel_timer(&self) {
        let timer = self.state.borrow_mut().timer.take();
        if let (Some(timer), Some(events)) = (timer, self.events.upgrade()) {
            events.cancel(timer);
        }
    }

    fn reschedule(this: &Rc<Self>, due_at: u64) {
        this.cancel_timer();
        let Some(events) = this.events.upgrade() else {
            return;
        };

        let weak = Rc::downgrade(this);
        let timer = events.schedule(due_at, move || {
            if let Some(inner) = weak.upgrade() {
                inner.flush();
            }
        });
        this.state.borrow_mut().timer = Some(timer);
    }

    fn flush(&self) {
        let run = {
            let mut state = self.state.borrow_mut();
            state.timer = None;
            let run = state.pending && !state.cancelled;
            state.pending = false;
            run
        };
        if run {
            (self.callback)();
        }
    }
}

impl Drop for DebounceInner {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use crate::clock::{Clock, ManualClock};
    use crate::watch::events::VaultEvents;
    use std::cell::Cell;
    use std::rc::Rc;

    fn setup() -> (Rc<VaultEvents>, Rc<ManualClock>, Rc<Cell<u32>>, Debouncer) {
        let events = Rc::new(VaultEvents::new());
        let clock = Rc::new(ManualClock::new(1_000));
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let debouncer = Debouncer::new(&events, clock.clone(), 300, move || {
            counter.set(counter.get() + 1)
        });
        (events, clock, calls, debouncer)
    }

    #[test]
    fn first_call_fires_immediately_and_burst_collapses() {
        let (events, clock, calls, debouncer) = setup();

        debouncer.call();
        assert_eq!(calls.get(), 1);

        for _ in 0..5 {
            clock.advance(50);
            debouncer.call();
        }
        assert_eq!(calls.get(), 1);
        assert!(debouncer.is_pending());

        // Trailing run lands 300ms after the last call of the burst.
        clock.advance(299);
        events.run_due(clock.now_millis());
        assert_eq!(calls.get(), 1);
        clock.advance(1);
        events.run_due(clock.now_millis());
        assert_eq!(calls.get(), 2);
        assert_eq!(events.pending_timers(), 0);
    }

    #[test]
    fn quiet_period_restarts_leading_edge() {
        let (_events, clock, calls, debouncer) = setup();

        debouncer.call();
        clock.advance(500);
        debouncer.call();
        assert_eq!(calls.get(), 2);
        assert!(!debouncer.is_pending());
    }

    #[test]
    fn cancel_drops_trailing_run() {
        let (events, clock, calls, debouncer) = setup();

        debouncer.call();
        clock.advance(10);
        debouncer.call();
        debouncer.cancel();
        clock.advance(1_000);
        events.run_due(clock.now_millis());
        debouncer.call();
        assert_eq!(calls.get(), 1);
    }
}
