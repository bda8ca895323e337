//! Explicit dependency bundle handed to every engine component.

use crate::clock::{Clock, SystemClock};
use crate::config::AbeleConfig;
use crate::host::{MemoryVault, VaultHost};
use crate::watch::VaultEvents;
use std::rc::Rc;

/// Host oracles, configuration, event hub and clock. Clones share state.
#[derive(Clone)]
pub struct AbeleContext {
    pub host: Rc<dyn VaultHost>,
    pub config: Rc<AbeleConfig>,
    pub events: Rc<VaultEvents>,
    pub clock: Rc<dyn Clock>,
}

impl AbeleContext {
    pub fn new(
        host: Rc<dyn VaultHost>,
        config: Rc<AbeleConfig>,
        events: Rc<VaultEvents>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            host,
            config,
            events,
            clock,
        }
    }

    /// Context over a fresh [`MemoryVault`] wired to a fresh event hub.
    pub fn in_memory(config: AbeleConfig, clock: Rc<dyn Clock>) -> (Self, Rc<MemoryVault>) {
        let events = Rc::new(VaultEvents::new());
        let vault = Rc::new(MemoryVault::new(&events));
        let context = Self::new(vault.clone(), Rc::new(config), events, clock);
        (context, vault)
    }

    /// In-memory context on the wall clock.
    pub fn in_memory_with_system_clock(config: AbeleConfig) -> (Self, Rc<MemoryVault>) {
        Self::in_memory(config, Rc::new(SystemClock))
    }

    /// Runs every debounced callback due at the clock's current time.
    pub fn run_due_timers(&self) -> usize {
        self.events.run_due(self.clock.now_millis())
    }
}
