//! Live relation graph of one root note.
//!
//! # Responsibility
//! - Discover the tasks, logs and notes related to a root note through
//!   backlinks, `groups` membership and journal-day co-occurrence.
//! - Keep that set current while the vault changes.
//!
//! # Invariants
//! - A path is tracked in at most one bucket.
//! - Raw vault events are queued and applied only on the next
//!   metadata-resolved signal, so mutations never read a stale index.
//! - Traversals never revisit a path within one pass.
//! - `cleanup()` is terminal and idempotent.
//!
//! # See also
//! - `model` for the tracked entities and their own file watchers.

mod note_relations;

pub use note_relations::{NoteRelations, RelationKind};
