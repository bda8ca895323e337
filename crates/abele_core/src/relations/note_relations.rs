use crate::context::AbeleContext;
use crate::dates::parse_date;
use crate::host::Frontmatter;
use crate::model::{Entity, Journal, Log, Note, Shared, Task};
use crate::paths::{is_wikilink, normalize_path, wikilink_to_path};
use crate::watch::{SubscriptionId, VaultEvent};
use chrono::NaiveDate;
use log::{debug, info};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::rc::Rc;

const TASK_TYPE: &str = "task";
/// Frontmatter keys checked, in order, by the journal-day scan.
const JOURNAL_DAY_KEYS: [&str; 3] = ["due", "date", "created"];

/// Bucket a tracked path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Task,
    Log,
    Note,
}

impl RelationKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Log => "log",
            Self::Note => "note",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PendingChange {
    Changed(String),
    Renamed { old_path: String, new_path: String },
    Deleted(String),
}

type ChangeListener = Rc<dyn Fn()>;

struct RelationsState {
    ctx: AbeleContext,
    file_path: String,
    journal: Option<Journal>,
    journal_date: Option<NaiveDate>,
    tasks: BTreeMap<String, Shared<Task>>,
    logs: BTreeMap<String, Shared<Log>>,
    notes: BTreeMap<String, Shared<Note>>,
    queue: VecDeque<PendingChange>,
    subscription: Option<SubscriptionId>,
    listeners: Vec<ChangeListener>,
    /// Bumped on every add/remove; used to detect mutating batches.
    revision: u64,
    active: bool,
    resolved: bool,
    cleaned_up: bool,
}

/// Self-maintaining set of relations of one root note.
///
/// Clones share the same state. The graph is discovered synchronously on
/// construction and then follows vault events until [`NoteRelations::cleanup`]
/// or until the last handle is dropped.
#[derive(Clone)]
pub struct NoteRelations {
    inner: Rc<RefCell<RelationsState>>,
}

impl NoteRelations {
    pub fn new(ctx: &AbeleContext, file_path: &str) -> Self {
        let inner = Rc::new(RefCell::new(RelationsState::new(ctx, file_path)));
        inner.borrow_mut().discover();

        let weak = Rc::downgrade(&inner);
        let subscription = ctx.events.subscribe(move |event| {
            if let Some(state) = weak.upgrade() {
                RelationsState::on_event(&state, event);
            }
        });

        {
            let mut state = inner.borrow_mut();
            state.subscription = Some(subscription);
            state.active = true;
            info!(
                "event=relations_start module=relations status=ok root={} tracked={}",
                state.file_path,
                state.len()
            );
        }
        Self { inner }
    }

    pub fn file_path(&self) -> String {
        self.inner.borrow().file_path.clone()
    }

    /// Default journal the root note is an instance of.
    pub fn journal(&self) -> Option<Journal> {
        self.inner.borrow().journal.clone()
    }

    pub fn journal_date(&self) -> Option<NaiveDate> {
        self.inner.borrow().journal_date
    }

    /// Tracked task paths, sorted.
    pub fn tasks(&self) -> Vec<String> {
        self.inner.borrow().tasks.keys().cloned().collect()
    }

    pub fn logs(&self) -> Vec<String> {
        self.inner.borrow().logs.keys().cloned().collect()
    }

    pub fn notes(&self) -> Vec<String> {
        self.inner.borrow().notes.keys().cloned().collect()
    }

    pub fn task(&self, path: &str) -> Option<Shared<Task>> {
        self.inner.borrow().tasks.get(&normalize_path(path)).cloned()
    }

    pub fn log(&self, path: &str) -> Option<Shared<Log>> {
        self.inner.borrow().logs.get(&normalize_path(path)).cloned()
    }

    pub fn note(&self, path: &str) -> Option<Shared<Note>> {
        self.inner.borrow().notes.get(&normalize_path(path)).cloned()
    }

    pub fn kind_of(&self, path: &str) -> Option<RelationKind> {
        self.inner.borrow().kind_of(&normalize_path(path))
    }

    pub fn has_path(&self, path: &str) -> bool {
        self.kind_of(path).is_some()
    }

    /// Number of tracked relations across all buckets.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `Some(true)` when `path` currently qualifies as a relation. `None`
    /// means undetermined (missing file, or a task/log without a related
    /// link); treat anything but `Some(true)` as unrelated.
    pub fn is_related_path(&self, path: &str) -> Option<bool> {
        self.inner
            .borrow()
            .is_related_path(path, &mut BTreeSet::new())
    }

    /// Runs a discovery pass starting at `path` (the root for a full pass).
    pub fn find_relations(&self, path: &str) {
        RelationsState::run_batch(&self.inner, |state| {
            let root = state.file_path.clone();
            let path = normalize_path(path);
            let mut visited = BTreeSet::from([root, path.clone()]);
            state.find_relations(&path, &mut visited);
        });
    }

    /// Vault changes waiting for the next metadata-resolved signal.
    pub fn pending_len(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    pub fn is_resolved(&self) -> bool {
        self.inner.borrow().resolved
    }

    pub fn is_cleaned_up(&self) -> bool {
        self.inner.borrow().cleaned_up
    }

    /// Counter bumped by every relation added or removed.
    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    /// Registers a callback fired after each batch that changed the buckets.
    pub fn on_change(&self, listener: impl Fn() + 'static) {
        self.inner.borrow_mut().listeners.push(Rc::new(listener));
    }

    /// Stops following the vault and releases every tracked entity.
    pub fn cleanup(&self) {
        RelationsState::run_batch(&self.inner, RelationsState::cleanup);
    }
}

impl RelationsState {
    fn new(ctx: &AbeleContext, file_path: &str) -> Self {
        let file_path = normalize_path(file_path);
        let (journal, journal_date) = match detect_journal(ctx, &file_path) {
            Some((journal, date)) => (Some(journal), Some(date)),
            None => (None, None),
        };

        Self {
            ctx: ctx.clone(),
            file_path,
            journal,
            journal_date,
            tasks: BTreeMap::new(),
            logs: BTreeMap::new(),
            notes: BTreeMap::new(),
            queue: VecDeque::new(),
            subscription: None,
            listeners: Vec::new(),
            revision: 0,
            active: false,
            resolved: false,
            cleaned_up: false,
        }
    }

    fn on_event(state: &Rc<RefCell<Self>>, event: &VaultEvent) {
        let change = match event {
            VaultEvent::MetadataResolved => {
                Self::run_batch(state, Self::flush);
                return;
            }
            VaultEvent::MetadataChanged { path } => PendingChange::Changed(path.clone()),
            VaultEvent::Rename { old_path, new_path } => PendingChange::Renamed {
                old_path: old_path.clone(),
                new_path: new_path.clone(),
            },
            VaultEvent::Delete { path } => PendingChange::Deleted(path.clone()),
            VaultEvent::Modify { .. } => return,
        };

        match state.try_borrow_mut() {
            Ok(mut state) => {
                if !state.cleaned_up {
                    state.queue.push_back(change);
                }
            }
            Err(_) => debug!(
                "event=relations_queue module=relations status=skipped reason=busy change={:?}",
                change
            ),
        }
    }

    /// Runs `action` and notifies change listeners, with the state borrow
    /// released, when it added or removed relations.
    fn run_batch(state: &Rc<RefCell<Self>>, action: impl FnOnce(&mut Self)) {
        let listeners = {
            let Ok(mut guard) = state.try_borrow_mut() else {
                debug!("event=relations_batch module=relations status=skipped reason=busy");
                return;
            };
            let before = guard.revision;
            action(&mut guard);
            if guard.revision == before {
                return;
            }
            guard.listeners.clone()
        };

        for listener in listeners {
            listener();
        }
    }

    /// Applies queued changes in arrival order, then runs the one-time
    /// post-index discovery pass.
    fn flush(&mut self) {
        while let Some(change) = self.queue.pop_front() {
            if self.cleaned_up {
                return;
            }
            self.apply(change);
        }
        if self.cleaned_up || self.resolved {
            return;
        }
        self.resolved = true;
        self.discover();
    }

    fn apply(&mut self, change: PendingChange) {
        debug!(
            "event=relations_apply module=relations status=start root={} change={:?}",
            self.file_path, change
        );
        match change {
            PendingChange::Changed(path) => {
                let path = normalize_path(&path);
                if self.is_related_path(&path, &mut BTreeSet::new()) == Some(true) {
                    let root = self.file_path.clone();
                    let mut visited = BTreeSet::from([root.clone()]);
                    self.add_backlink(&root, &path, &mut visited);
                } else if self.kind_of(&path).is_some() {
                    self.unlink_path(&path);
                }
            }
            PendingChange::Renamed { old_path, new_path } => {
                let old_path = normalize_path(&old_path);
                let new_path = normalize_path(&new_path);
                if old_path == self.file_path {
                    self.rename_root(&new_path);
                } else if let Some(kind) = self.kind_of(&old_path) {
                    self.remove(&old_path);
                    self.add(kind, &new_path);
                }
            }
            PendingChange::Deleted(path) => {
                if normalize_path(&path) == self.file_path {
                    self.cleanup();
                } else {
                    self.remove_remaining_relations();
                }
            }
        }
    }

    fn discover(&mut self) {
        let root = self.file_path.clone();
        let mut visited = BTreeSet::from([root.clone()]);
        self.find_relations(&root, &mut visited);
    }

    fn find_relations(&mut self, file_path: &str, visited: &mut BTreeSet<String>) {
        let file_path = normalize_path(file_path);
        for backlink in self.ctx.host.backlinks(&file_path) {
            self.add_backlink(&file_path, &backlink, visited);
        }

        if self.journal_date.is_some() && file_path == self.file_path {
            self.add_journal_day_notes();
        }
    }

    /// Tracks `backlink` of `file_path` and, when it nominates `file_path` as
    /// its group, pulls in its own relations.
    fn add_backlink(&mut self, file_path: &str, backlink: &str, visited: &mut BTreeSet<String>) {
        let backlink = normalize_path(backlink);
        if backlink == file_path || backlink == self.file_path {
            return;
        }
        if !self.ctx.host.file_exists(&backlink) {
            return;
        }

        let frontmatter = self.ctx.host.frontmatter(&backlink);
        if self.kind_of(&backlink).is_none() {
            let kind = self.classify(&backlink, frontmatter.as_ref());
            self.add(kind, &backlink);
        }

        let grouped_here = frontmatter
            .map(|frontmatter| self.group_paths(&frontmatter))
            .unwrap_or_default()
            .iter()
            .any(|group| group == file_path);
        if grouped_here && visited.insert(backlink.clone()) {
            self.find_relations(&backlink, visited);
        }
    }

    /// Tracks every note dated on the root's journal day.
    fn add_journal_day_notes(&mut self) {
        let Some(journal_date) = self.journal_date else {
            return;
        };

        for path in self.ctx.host.markdown_files() {
            if path == self.file_path || self.kind_of(&path).is_some() {
                continue;
            }
            let Some(frontmatter) = self.ctx.host.frontmatter(&path) else {
                continue;
            };
            let day = JOURNAL_DAY_KEYS
                .iter()
                .find_map(|key| frontmatter.get_str(key))
                .and_then(parse_date);
            if day != Some(journal_date) {
                continue;
            }

            let kind = self.classify(&path, Some(&frontmatter));
            if kind == RelationKind::Log && self.is_journal_instance(&path) {
                continue;
            }
            self.add(kind, &path);
        }
    }

    fn is_journal_instance(&self, path: &str) -> bool {
        self.ctx.config.journals.iter().any(|journal| {
            journal
                .check_if_note_path_is_journal(self.ctx.host.as_ref(), path)
                .is_some()
        })
    }

    fn is_related_path(&self, path: &str, visited: &mut BTreeSet<String>) -> Option<bool> {
        let path = normalize_path(path);
        let host = self.ctx.host.as_ref();

        if host.backlinks(&self.file_path).contains(&path) {
            return Some(true);
        }
        if !host.file_exists(&path) {
            return None;
        }

        let frontmatter = host.frontmatter(&path);
        if let Some(journal_date) = self.journal_date {
            let created = frontmatter
                .as_ref()
                .and_then(|frontmatter| frontmatter.get_str("created"))
                .and_then(parse_date);
            if created == Some(journal_date) {
                return Some(true);
            }
        }

        let note_type = frontmatter.as_ref().and_then(Frontmatter::note_type);
        visited.insert(path.clone());

        if note_type == Some(TASK_TYPE) || self.ctx.config.is_log_type(note_type, &path) {
            for link in host.outgoing_links(&path) {
                if visited.contains(&link) {
                    continue;
                }
                if self.is_related_path(&link, visited) == Some(true) {
                    return Some(true);
                }
            }
            return None;
        }

        let groups = frontmatter
            .as_ref()
            .map(|frontmatter| self.group_paths(frontmatter))
            .unwrap_or_default();
        for group_path in groups {
            if visited.contains(&group_path) {
                continue;
            }
            if self.is_related_path(&group_path, visited) == Some(true) {
                return Some(true);
            }
        }
        Some(false)
    }

    fn unlink_path(&mut self, path: &str) {
        if self.remove(path) {
            self.remove_remaining_relations();
        }
    }

    /// Drops every tracked path that no longer qualifies as a relation.
    fn remove_remaining_relations(&mut self) {
        for path in self.paths() {
            if self.is_related_path(&path, &mut BTreeSet::new()) != Some(true) {
                self.remove(&path);
            }
        }
    }

    fn rename_root(&mut self, new_path: &str) {
        let previous = self
            .journal
            .as_ref()
            .map(|journal| journal.id.clone())
            .zip(self.journal_date);

        self.file_path = new_path.to_string();
        let detected = detect_journal(&self.ctx, &self.file_path);
        let current = detected
            .as_ref()
            .map(|(journal, date)| (journal.id.clone(), *date));
        (self.journal, self.journal_date) = match detected {
            Some((journal, date)) => (Some(journal), Some(date)),
            None => (None, None),
        };

        info!(
            "event=relations_root_rename module=relations status=ok root={} journal_changed={}",
            self.file_path,
            previous != current
        );
        if previous != current {
            self.remove_remaining_relations();
            self.discover();
        }
    }

    fn cleanup(&mut self) {
        if !self.active {
            return;
        }
        self.cleaned_up = true;
        if let Some(subscription) = self.subscription.take() {
            self.ctx.events.unsubscribe(subscription);
        }
        self.queue.clear();
        for path in self.paths() {
            self.remove(&path);
        }
        self.active = false;
        info!(
            "event=relations_cleanup module=relations status=ok root={}",
            self.file_path
        );
    }

    fn classify(&self, path: &str, frontmatter: Option<&Frontmatter>) -> RelationKind {
        let note_type = frontmatter.and_then(Frontmatter::note_type);
        if note_type == Some(TASK_TYPE) {
            RelationKind::Task
        } else if self.ctx.config.is_log_type(note_type, path) {
            RelationKind::Log
        } else {
            RelationKind::Note
        }
    }

    /// Resolved paths of the wikilinks listed in `groups`.
    fn group_paths(&self, frontmatter: &Frontmatter) -> Vec<String> {
        frontmatter
            .groups()
            .iter()
            .filter(|group| is_wikilink(group))
            .filter_map(|group| wikilink_to_path(group))
            .filter_map(|group| self.ctx.host.resolve_link(&group))
            .collect()
    }

    fn kind_of(&self, path: &str) -> Option<RelationKind> {
        if self.tasks.contains_key(path) {
            Some(RelationKind::Task)
        } else if self.logs.contains_key(path) {
            Some(RelationKind::Log)
        } else if self.notes.contains_key(path) {
            Some(RelationKind::Note)
        } else {
            None
        }
    }

    fn paths(&self) -> Vec<String> {
        self.tasks
            .keys()
            .chain(self.logs.keys())
            .chain(self.notes.keys())
            .cloned()
            .collect()
    }

    fn len(&self) -> usize {
        self.tasks.len() + self.logs.len() + self.notes.len()
    }

    fn add(&mut self, kind: RelationKind, path: &str) -> bool {
        let path = normalize_path(path);
        if path == self.file_path || self.kind_of(&path).is_some() {
            return false;
        }

        match kind {
            RelationKind::Task => {
                let task = Task::from_path(&self.ctx, &path);
                task.borrow_mut().load(false);
                self.tasks.insert(path.clone(), task);
            }
            RelationKind::Log => {
                let log = Log::new(&self.ctx, &path, Some(self.file_path.as_str()));
                log.borrow_mut().load(false);
                self.logs.insert(path.clone(), log);
            }
            RelationKind::Note => {
                let note = Note::new(&self.ctx, &path);
                note.borrow_mut().load(false);
                self.notes.insert(path.clone(), note);
            }
        }

        self.revision += 1;
        debug!(
            "event=relation_add module=relations status=ok kind={} path={} root={}",
            kind.as_str(),
            path,
            self.file_path
        );
        true
    }

    fn remove(&mut self, path: &str) -> bool {
        let path = normalize_path(path);
        let kind = if let Some(task) = self.tasks.remove(&path) {
            task.borrow_mut().cleanup();
            RelationKind::Task
        } else if let Some(log) = self.logs.remove(&path) {
            log.borrow_mut().cleanup();
            RelationKind::Log
        } else if let Some(note) = self.notes.remove(&path) {
            note.borrow_mut().cleanup();
            RelationKind::Note
        } else {
            return false;
        };

        self.revision += 1;
        debug!(
            "event=relation_remove module=relations status=ok kind={} path={} root={}",
            kind.as_str(),
            path,
            self.file_path
        );
        true
    }
}

impl Drop for RelationsState {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.ctx.events.unsubscribe(subscription);
        }
    }
}

/// First default journal the note at `path` is an instance of.
fn detect_journal(ctx: &AbeleContext, path: &str) -> Option<(Journal, NaiveDate)> {
    ctx.config.default_journals().find_map(|journal| {
        journal
            .check_if_note_path_is_journal(ctx.host.as_ref(), path)
            .map(|date| (journal.clone(), date))
    })
}

#[cfg(test)]
mod tests {
    use super::{NoteRelations, RelationKind};
    use crate::clock::ManualClock;
    use crate::config::AbeleConfig;
    use crate::context::AbeleContext;
    use crate::host::VaultHost;
    use crate::model::Entity;
    use std::rc::Rc;

    fn context() -> (AbeleContext, Rc<crate::host::MemoryVault>) {
        AbeleContext::in_memory(AbeleConfig::default(), Rc::new(ManualClock::new(0)))
    }

    #[test]
    fn backlinks_are_classified_into_one_bucket_each() {
        let (ctx, vault) = context();
        vault.seed("Projects/Alpha.md", "# Alpha\n");
        vault.seed("Tasks/Ship.md", "---\ntype: task\n---\nShip [[Alpha]]\n");
        vault.seed("Daily/2024-01-02.md", "---\ntype: log\n---\nworked on [[Alpha]]\n");
        vault.seed("Ideas/Beta.md", "see [[Projects/Alpha]]\n");

        let relations = NoteRelations::new(&ctx, "Projects/Alpha");
        assert_eq!(relations.tasks(), vec!["Tasks/Ship.md"]);
        assert_eq!(relations.logs(), vec!["Daily/2024-01-02.md"]);
        assert_eq!(relations.notes(), vec!["Ideas/Beta.md"]);
        assert_eq!(relations.kind_of("Tasks/Ship"), Some(RelationKind::Task));
        assert_eq!(relations.is_related_path("Ideas/Beta.md"), Some(true));
        assert_eq!(relations.is_related_path("Nowhere.md"), None);
    }

    #[test]
    fn changes_wait_for_metadata_resolution() {
        let (ctx, vault) = context();
        vault.set_auto_resolve(false);
        vault.seed("Projects/Alpha.md", "# Alpha\n");
        let relations = NoteRelations::new(&ctx, "Projects/Alpha.md");

        vault
            .create("Ideas/Beta.md", "links [[Alpha]]\n")
            .expect("create should succeed");
        assert!(relations.notes().is_empty());
        assert_eq!(relations.pending_len(), 0);

        vault.resolve();
        assert_eq!(relations.notes(), vec!["Ideas/Beta.md"]);
        assert!(relations.is_resolved());
        assert_eq!(relations.pending_len(), 0);

        vault
            .rename("Ideas/Beta.md", "Ideas/Beta 2.md")
            .expect("rename should succeed");
        assert_eq!(relations.pending_len(), 1);
        assert_eq!(relations.notes(), vec!["Ideas/Beta.md"]);

        vault.resolve();
        assert_eq!(relations.notes(), vec!["Ideas/Beta 2.md"]);
    }

    #[test]
    fn cleanup_is_terminal_and_idempotent() {
        let (ctx, vault) = context();
        vault.seed("Projects/Alpha.md", "# Alpha\n");
        vault.seed("Ideas/Beta.md", "links [[Alpha]]\n");
        let relations = NoteRelations::new(&ctx, "Projects/Alpha.md");
        let note = relations.note("Ideas/Beta.md").expect("note should be tracked");

        relations.cleanup();
        relations.cleanup();
        assert!(relations.is_cleaned_up());
        assert!(relations.is_empty());
        assert!(note.borrow().is_cleaned_up());

        vault
            .create("Ideas/Gamma.md", "links [[Alpha]]\n")
            .expect("create should succeed");
        assert!(relations.is_empty());
        assert_eq!(ctx.events.listener_count(), 0);
    }
}
