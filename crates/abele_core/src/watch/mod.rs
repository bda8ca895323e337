//! File change notification plumbing.
//!
//! # Responsibility
//! - Fan host file events out to many per-entity watchers.
//! - Gate entity reloads behind a leading-edge debounce.
//!
//! # See also
//! - `relations::note_relations` for the metadata-resolved fence.

pub mod debounce;
pub mod events;
pub mod file_watcher;

pub use debounce::Debouncer;
pub use events::{SubscriptionId, TimerId, VaultEvent, VaultEvents};
pub use file_watcher::{FileChangeEvent, FileChangeKind, FileWatcher};
