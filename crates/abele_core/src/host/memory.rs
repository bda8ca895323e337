//! In-process vault used by tests and the CLI probe.
//!
//! # Responsibility
//! - Store note contents keyed by normalized path.
//! - Index frontmatter and wikilinks on every write.
//! - Publish host events to the attached dispatcher.
//!
//! # Invariants
//! - Links are stored raw and resolved on read, so renames never rewrite text.
//! - Resolution prefers an exact path, then the shortest path ending in the
//!   link target (ties broken lexicographically).
//! - Raw file events are emitted right after the write; metadata events are
//!   emitted immediately in auto-resolve mode, or on [`MemoryVault::resolve`].
//! - No internal borrow is held while events are dispatched.

use crate::host::frontmatter::{extract_frontmatter, Frontmatter};
use crate::host::{VaultError, VaultHost, VaultResult};
use crate::paths::{name_from_path, normalize_path};
use crate::watch::events::{VaultEvent, VaultEvents};
use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"!?\[\[([^\]|#]+)(?:#[^\]|]*)?(?:\|[^\]]*)?\]\]").expect("valid link regex")
});

struct StoredNote {
    content: String,
    frontmatter: Option<Frontmatter>,
    links: Vec<String>,
}

impl StoredNote {
    fn index(content: &str) -> Self {
        let links = LINK_RE
            .captures_iter(content)
            .filter_map(|caps| caps.get(1))
            .map(|target| target.as_str().trim().to_string())
            .filter(|target| !target.is_empty())
            .collect();

        Self {
            content: content.to_string(),
            frontmatter: extract_frontmatter(content),
            links,
        }
    }
}

pub struct MemoryVault {
    events: Weak<VaultEvents>,
    notes: RefCell<BTreeMap<String, StoredNote>>,
    auto_resolve: Cell<bool>,
    unresolved: RefCell<Vec<String>>,
}

impl MemoryVault {
    /// Creates an empty vault publishing to `events`, in auto-resolve mode.
    pub fn new(events: &Rc<VaultEvents>) -> Self {
        Self {
            events: Rc::downgrade(events),
            notes: RefCell::new(BTreeMap::new()),
            auto_resolve: Cell::new(true),
            unresolved: RefCell::new(Vec::new()),
        }
    }

    /// Inserts or replaces a note without publishing any event.
    pub fn seed(&self, path: &str, content: &str) {
        self.notes
            .borrow_mut()
            .insert(normalize_path(path), StoredNote::index(content));
    }

    /// When disabled, metadata events are held back until [`Self::resolve`].
    pub fn set_auto_resolve(&self, enabled: bool) {
        self.auto_resolve.set(enabled);
    }

    /// Publishes held-back metadata events followed by one resolved signal.
    pub fn resolve(&self) {
        let paths = std::mem::take(&mut *self.unresolved.borrow_mut());
        for path in paths {
            self.emit(VaultEvent::MetadataChanged { path });
        }
        self.emit(VaultEvent::MetadataResolved);
    }

    pub fn len(&self) -> usize {
        self.notes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.borrow().is_empty()
    }

    fn emit(&self, event: VaultEvent) {
        if let Some(events) = self.events.upgrade() {
            events.emit(&event);
        }
    }

    fn publish(&self, raw: Option<VaultEvent>, changed: Option<String>) {
        if let Some(event) = raw {
            self.emit(event);
        }
        if let Some(path) = changed {
            self.unresolved.borrow_mut().push(path);
        }
        if self.auto_resolve.get() {
            self.resolve();
        }
    }

    fn checked_path(path: &str) -> VaultResult<String> {
        let normalized = normalize_path(path);
        if name_from_path(&normalized).trim().is_empty() {
            return Err(VaultError::InvalidPath(path.to_string()));
        }
        Ok(normalized)
    }

    fn resolve_in(notes: &BTreeMap<String, StoredNote>, link: &str) -> Option<String> {
        let target = normalize_path(link);
        if notes.contains_key(&target) {
            return Some(target);
        }

        let suffix = format!("/{target}");
        notes
            .keys()
            .filter(|path| path.ends_with(&suffix))
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .cloned()
    }

    fn resolved_links(notes: &BTreeMap<String, StoredNote>, note: &StoredNote) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::new();
        for link in &note.links {
            if let Some(path) = Self::resolve_in(notes, link) {
                if !resolved.contains(&path) {
                    resolved.push(path);
                }
            }
        }
        resolved
    }
}

impl VaultHost for MemoryVault {
    fn backlinks(&self, path: &str) -> Vec<String> {
        let target = normalize_path(path);
        let notes = self.notes.borrow();
        notes
            .iter()
            .filter(|(_, note)| Self::resolved_links(&notes, note).contains(&target))
            .map(|(source, _)| source.clone())
            .collect()
    }

    fn outgoing_links(&self, path: &str) -> Vec<String> {
        let notes = self.notes.borrow();
        match notes.get(&normalize_path(path)) {
            Some(note) => Self::resolved_links(&notes, note),
            None => Vec::new(),
        }
    }

    fn frontmatter(&self, path: &str) -> Option<Frontmatter> {
        self.notes
            .borrow()
            .get(&normalize_path(path))
            .and_then(|note| note.frontmatter.clone())
    }

    fn file_exists(&self, path: &str) -> bool {
        self.notes.borrow().contains_key(&normalize_path(path))
    }

    fn resolve_link(&self, link: &str) -> Option<String> {
        Self::resolve_in(&self.notes.borrow(), link)
    }

    fn markdown_files(&self) -> Vec<String> {
        self.notes.borrow().keys().cloned().collect()
    }

    fn read(&self, path: &str) -> Option<String> {
        self.notes
            .borrow()
            .get(&normalize_path(path))
            .map(|note| note.content.clone())
    }

    fn create(&self, path: &str, content: &str) -> VaultResult<()> {
        let path = Self::checked_path(path)?;
        {
            let mut notes = self.notes.borrow_mut();
            if notes.contains_key(&path) {
                return Err(VaultError::AlreadyExists(path));
            }
            notes.insert(path.clone(), StoredNote::index(content));
        }
        debug!("event=vault_create module=host status=ok path={path}");
        self.publish(None, Some(path));
        Ok(())
    }

    fn modify(&self, path: &str, content: &str) -> VaultResult<()> {
        let path = normalize_path(path);
        {
            let mut notes = self.notes.borrow_mut();
            let note = notes
                .get_mut(&path)
                .ok_or_else(|| VaultError::NotFound(path.clone()))?;
            *note = StoredNote::index(content);
        }
        debug!("event=vault_modify module=host status=ok path={path}");
        self.publish(Some(VaultEvent::Modify { path: path.clone() }), Some(path));
        Ok(())
    }

    fn rename(&self, old_path: &str, new_path: &str) -> VaultResult<()> {
        let old_path = normalize_path(old_path);
        let new_path = Self::checked_path(new_path)?;
        {
            let mut notes = self.notes.borrow_mut();
            if notes.contains_key(&new_path) {
                return Err(VaultError::AlreadyExists(new_path));
            }
            let note = notes
                .remove(&old_path)
                .ok_or_else(|| VaultError::NotFound(old_path.clone()))?;
            notes.insert(new_path.clone(), note);
        }
        debug!("event=vault_rename module=host status=ok old_path={old_path} new_path={new_path}");
        self.publish(
            Some(VaultEvent::Rename {
                old_path,
                new_path: new_path.clone(),
            }),
            Some(new_path),
        );
        Ok(())
    }

    fn delete(&self, path: &str) -> VaultResult<()> {
        let path = normalize_path(path);
        if self.notes.borrow_mut().remove(&path).is_none() {
            return Err(VaultError::NotFound(path));
        }
        debug!("event=vault_delete module=host status=ok path={path}");
        self.publish(Some(VaultEvent::Delete { path }), None);
        Ok(())
    }
}
