//! Per-file subscription on the shared dispatcher.
//!
//! # Responsibility
//! - Bind one logical note path to one callback.
//! - Follow the note across renames and stop after it is deleted.
//!
//! # Invariants
//! - A watcher owns at most one subscription; `restart` never duplicates it.
//! - On rename the watched path is updated before the callback runs.
//! - `cleanup` is idempotent and also runs on drop.

use crate::paths::{compare_paths, normalize_path};
use crate::watch::events::{SubscriptionId, VaultEvent, VaultEvents};
use log::debug;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileChangeKind {
    Modify,
    Rename,
    Delete,
}

/// Raw file change as seen by one watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChangeEvent {
    pub kind: FileChangeKind,
    /// Path of the file after the change.
    pub path: String,
    /// Previous path, set for renames only.
    pub old_path: Option<String>,
}

pub struct FileWatcher {
    inner: Rc<WatcherInner>,
}

struct WatcherInner {
    events: Weak<VaultEvents>,
    callback: Box<dyn Fn(&FileChangeEvent)>,
    state: RefCell<WatcherState>,
}

struct WatcherState {
    file_path: String,
    subscription: Option<SubscriptionId>,
}

impl FileWatcher {
    /// Creates an active watcher for `path`.
    pub fn new(
        events: &Rc<VaultEvents>,
        path: &str,
        callback: impl Fn(&FileChangeEvent) + 'static,
    ) -> Self {
        let watcher = Self {
            inner: Rc::new(WatcherInner {
                events: Rc::downgrade(events),
                callback: Box::new(callback),
                state: RefCell::new(WatcherState {
                    file_path: normalize_path(path),
                    subscription: None,
                }),
            }),
        };
        watcher.restart(None);
        watcher
    }

    pub fn current_path(&self) -> String {
        self.inner.state.borrow().file_path.clone()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.borrow().subscription.is_some()
    }

    /// Optionally repoints the watcher and makes sure it is subscribed.
    pub fn restart(&self, new_path: Option<&str>) {
        if let Some(path) = new_path {
            self.inner.state.borrow_mut().file_path = normalize_path(path);
        }
        if self.is_active() {
            return;
        }
        let Some(events) = self.inner.events.upgrade() else {
            return;
        };

        let weak = Rc::downgrade(&self.inner);
        let id = events.subscribe(move |event| {
            if let Some(inner) = weak.upgrade() {
                inner.handle(event);
            }
        });
        self.inner.state.borrow_mut().subscription = Some(id);
    }

    pub fn cleanup(&self) {
        self.inner.cleanup();
    }
}

impl WatcherInner {
    fn handle(&self, event: &VaultEvent) {
        let change = {
            let mut state = self.state.borrow_mut();
            if state.subscription.is_none() {
                return;
            }
            match event {
                VaultEvent::Modify { path } if compare_paths(path, &state.file_path) => {
                    Some(FileChangeEvent {
                        kind: FileChangeKind::Modify,
                        path: state.file_path.clone(),
                        old_path: None,
                    })
                }
                VaultEvent::Rename { old_path, new_path }
                    if compare_paths(old_path, &state.file_path) =>
                {
                    let old = std::mem::replace(&mut state.file_path, normalize_path(new_path));
                    Some(FileChangeEvent {
                        kind: FileChangeKind::Rename,
                        path: state.file_path.clone(),
                        old_path: Some(old),
                    })
                }
                VaultEvent::Delete { path } if compare_paths(path, &state.file_path) => {
                    Some(FileChangeEvent {
                        kind: FileChangeKind::Delete,
                        path: state.file_path.clone(),
                        old_path: None,
                    })
                }
                _ => None,
            }
        };

        let Some(change) = change else {
            return;
        };
        debug!(
            "event=file_change module=watch status=matched kind={:?} path={}",
            change.kind, change.path
        );
        (self.callback)(&change);

        if change.kind == FileChangeKind::Delete {
            self.cleanup();
        }
    }

    fn cleanup(&self) {
        let subscription = self.state.borrow_mut().subscription.take();
        if let (Some(id), Some(events)) = (subscription, self.events.upgrade()) {
            events.unsubscribe(id);
        }
    }
}

impl Drop for WatcherInner {
    fn drop(&mut self) {
        self.cleanup();
    }
}
