//! Note-derived entities.
//!
//! # Responsibility
//! - Define Task/Log/Note entities loaded from the frontmatter cache.
//! - Keep each loaded entity in sync with its file through a debounced
//!   watcher.
//! - Define journals and note-matching criteria.
//!
//! # Invariants
//! - `load(false)` reads the cache at most once; `load(true)` always re-reads.
//! - `cleanup()` is terminal: afterwards no load or watcher callback mutates
//!   the entity.
//! - A rename repoints the entity path immediately; only the reload is
//!   debounced.

pub mod criterion;
pub mod journal;
pub mod log_note;
pub mod note;
pub mod task;

use crate::context::AbeleContext;
use crate::watch::{Debouncer, FileChangeEvent, FileChangeKind, FileWatcher};
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub use self::criterion::{Criterion, CriterionOperator, CriterionType};
pub use self::journal::{DayOfPeriod, DayOfPeriodValue, Journal, JournalRecurrence, JournalSettings};
pub use self::log_note::Log;
pub use self::note::Note;
pub use self::task::{Task, TaskCreateRequest, TaskSnapshot};

/// Entities are shared between relation buckets, watchers and callers.
pub type Shared<T> = Rc<RefCell<T>>;

/// Lifecycle shared by every trackable note-derived object.
pub trait Entity {
    /// Current normalized vault path.
    fn path(&self) -> &str;
    fn load(&mut self, force: bool);
    fn cleanup(&mut self);
    fn is_loaded(&self) -> bool;
    fn is_cleaned_up(&self) -> bool;
    /// Whether the last load found no indexed note.
    fn is_not_found(&self) -> bool;
}

/// Debounced file watcher bound to one entity.
pub(crate) struct EntityWatch {
    watcher: FileWatcher,
    debouncer: Debouncer,
}

impl EntityWatch {
    /// Watches `path` for `entity`.
    ///
    /// `repoint` runs synchronously on rename with the new path; `refresh`
    /// runs through the debouncer for every matching change.
    pub(crate) fn start<T: Entity + 'static>(
        ctx: &AbeleContext,
        path: &str,
        entity: Weak<RefCell<T>>,
        repoint: fn(&mut T, &str),
        refresh: fn(&mut T),
    ) -> Self {
        let refresh_target = entity.clone();
        let debouncer = Debouncer::new(
            &ctx.events,
            Rc::clone(&ctx.clock),
            ctx.config.refresh_delay,
            move || {
                let Some(entity) = refresh_target.upgrade() else {
                    return;
                };
                let Ok(mut entity) = entity.try_borrow_mut() else {
                    return;
                };
                if !entity.is_cleaned_up() {
                    refresh(&mut entity);
                }
            },
        );

        let trigger = debouncer.clone();
        let watcher = FileWatcher::new(&ctx.events, path, move |change: &FileChangeEvent| {
            let Some(entity) = entity.upgrade() else {
                return;
            };
            {
                let Ok(mut entity) = entity.try_borrow_mut() else {
                    return;
                };
                if entity.is_cleaned_up() {
                    return;
                }
                if change.kind == FileChangeKind::Rename {
                    repoint(&mut entity, &change.path);
                }
            }
            trigger.call();
        });

        Self { watcher, debouncer }
    }

    pub(crate) fn current_path(&self) -> String {
        self.watcher.current_path()
    }

    pub(crate) fn stop(&self) {
        self.debouncer.cancel();
        self.watcher.cleanup();
    }
}
