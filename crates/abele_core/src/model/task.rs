//! Task entity backed by one task note.
//!
//! A task note carries `type: task` frontmatter (`created`, `completed`,
//! `date`/`dateTime`, `due`/`dueTime`, `recurrence`) and a free-text body
//! whose first non-empty line is the title.

use crate::context::AbeleContext;
use crate::dates::{format_date, parse_date, parse_time, DATE_FORMAT};
use crate::host::{strip_frontmatter, Frontmatter};
use crate::model::{Entity, EntityWatch, Shared};
use crate::paths::{
    alias_or_name_from_wikilink, folder_from_path, name_from_path, normalize_path,
    path_to_wikilink, resolve_path, wikilink_to_path,
};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

pub const DEFAULT_TASK_TITLE: &str = "New Task";

/// Field set used to write a task note.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskCreateRequest {
    pub title: String,
    pub description: String,
    pub created_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub date: Option<NaiveDate>,
    pub date_time: Option<NaiveTime>,
    pub due: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub recurrence: Option<String>,
    pub content: String,
    pub old_props: Frontmatter,
}

/// Detached copy of a task, safe to use while the task itself may change.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSnapshot {
    pub path: String,
    pub request: TaskCreateRequest,
}

pub struct Task {
    ctx: AbeleContext,
    self_ref: Weak<RefCell<Task>>,
    task_path: String,
    task_name: String,
    /// Note where the task link was found, if any.
    source_path: Option<String>,

    pub title: String,
    pub description: String,
    pub created_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
    pub date: Option<NaiveDate>,
    pub date_time: Option<NaiveTime>,
    pub due: Option<NaiveDate>,
    pub due_time: Option<NaiveTime>,
    pub recurrence: Option<String>,
    pub content: String,
    pub old_props: Frontmatter,

    loaded: bool,
    not_found: bool,
    cleaned_up: bool,
    load_count: usize,
    watch: Option<EntityWatch>,
}

impl Task {
    /// Builds a task from a `[[path|alias]]` link. Link targets without a
    /// match in the vault fall back to the configured tasks folder.
    pub fn from_wikilink(ctx: &AbeleContext, wikilink: &str, source_path: Option<&str>) -> Shared<Self> {
        let task_name = alias_or_name_from_wikilink(wikilink).unwrap_or_default();
        let task_path = match wikilink_to_path(wikilink) {
            Some(target) => ctx.host.resolve_link(&target).unwrap_or(target),
            None => resolve_path(&ctx.config.tasks_folder, &task_name),
        };
        Self::build(ctx, task_path, task_name, source_path.map(normalize_path))
    }

    pub fn from_path(ctx: &AbeleContext, path: &str) -> Shared<Self> {
        Self::from_wikilink(ctx, &path_to_wikilink(path, None), None)
    }

    fn build(
        ctx: &AbeleContext,
        task_path: String,
        task_name: String,
        source_path: Option<String>,
    ) -> Shared<Self> {
        Rc::new_cyclic(|self_ref| {
            RefCell::new(Self {
                ctx: ctx.clone(),
                self_ref: self_ref.clone(),
                task_path,
                task_name,
                source_path,
                title: String::new(),
                description: String::new(),
                created_at: None,
                completed_at: None,
                date: None,
                date_time: None,
                due: None,
                due_time: None,
                recurrence: None,
                content: String::new(),
                old_props: Frontmatter::new(),
                loaded: false,
                not_found: false,
                cleaned_up: false,
                load_count: 0,
                watch: None,
            })
        })
    }

    /// File name of the task note, without extension.
    pub fn name(&self) -> &str {
        &self.task_name
    }

    pub fn folder(&self) -> &str {
        folder_from_path(&self.task_path)
    }

    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    pub fn wikilink(&self) -> String {
        path_to_wikilink(&self.task_path, None)
    }

    /// Number of times the frontmatter cache was actually read.
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Reads the note body: first non-empty line is the title, the rest the
    /// description.
    pub fn load_content(&mut self) {
        if self.cleaned_up {
            return;
        }
        let Some(raw) = self.ctx.host.read(&self.task_path) else {
            self.not_found = true;
            return;
        };

        let body = strip_frontmatter(&raw);
        let lines: Vec<&str> = body.split('\n').filter(|line| !line.trim().is_empty()).collect();
        self.title = lines
            .first()
            .map(|line| line.to_string())
            .unwrap_or_else(|| DEFAULT_TASK_TITLE.to_string());
        self.description = lines.iter().skip(1).copied().collect::<Vec<_>>().join("\n");
        self.content = body.to_string();
    }

    /// `date` with its `dateTime`, midnight when no time is set.
    pub fn date_at(&self) -> Option<NaiveDateTime> {
        self.date.map(|date| date.and_time(self.date_time.unwrap_or_default()))
    }

    /// `due` with its `dueTime`, midnight when no time is set.
    pub fn due_at(&self) -> Option<NaiveDateTime> {
        self.due.map(|due| due.and_time(self.due_time.unwrap_or_default()))
    }

    /// Earliest of `date`/`due`, else `created`.
    pub fn task_date(&self) -> Option<NaiveDate> {
        match (self.date, self.due) {
            (Some(date), Some(due)) => Some(date.min(due)),
            (Some(date), None) => Some(date),
            (None, Some(due)) => Some(due),
            (None, None) => self.created_at,
        }
    }

    /// Every day the task spans, from `date` through `due` inclusive.
    pub fn dates(&self) -> Vec<String> {
        let mut dates = Vec::new();
        if let Some(date) = self.date {
            dates.push(format_date(date));
        }
        if let Some(due) = self.due {
            if let Some(date) = self.date.filter(|date| *date < due) {
                let mut current = date.succ_opt();
                while let Some(day) = current.filter(|day| *day < due) {
                    dates.push(format_date(day));
                    current = day.succ_opt();
                }
            }
            dates.push(format_date(due));
        }
        dates
    }

    pub fn is_related_to_date(&self, date: NaiveDate) -> bool {
        let wanted = date.format(DATE_FORMAT).to_string();
        self.dates().contains(&wanted)
    }

    pub fn is_completed(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn to_create_request(&self) -> TaskCreateRequest {
        TaskCreateRequest {
            title: self.title.clone(),
            description: self.description.clone(),
            created_at: self.created_at,
            completed_at: self.completed_at,
            date: self.date,
            date_time: self.date_time,
            due: self.due,
            due_time: self.due_time,
            recurrence: self.recurrence.clone(),
            content: self.content.clone(),
            old_props: self.old_props.clone(),
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            path: self.task_path.clone(),
            request: self.to_create_request(),
        }
    }

    fn init_watcher(&mut self) {
        if self.watch.is_some() {
            return;
        }
        self.watch = Some(EntityWatch::start(
            &self.ctx,
            &self.task_path,
            self.self_ref.clone(),
            |task: &mut Task, new_path| {
                task.task_path = normalize_path(new_path);
                task.task_name = name_from_path(&task.task_path).to_string();
            },
            |task: &mut Task| {
                task.load(true);
                task.load_content();
            },
        ));
    }

    fn clear_data(&mut self) {
        self.title.clear();
        self.description.clear();
        self.created_at = None;
        self.completed_at = None;
        self.date = None;
        self.date_time = None;
        self.due = None;
        self.due_time = None;
        self.recurrence = None;
        self.content.clear();
        self.old_props = Frontmatter::new();
        self.loaded = false;
        self.not_found = false;
    }
}

impl Entity for Task {
    fn path(&self) -> &str {
        &self.task_path
    }

    fn load(&mut self, force: bool) {
        if self.cleaned_up || (self.loaded && !force) {
            return;
        }
        self.loaded = true;
        self.load_count += 1;

        match self.ctx.host.frontmatter(&self.task_path) {
            Some(frontmatter) => {
                self.not_found = false;
                self.created_at = frontmatter.get_str("created").and_then(parse_date);
                self.completed_at = frontmatter.get_str("completed").and_then(parse_date);
                self.recurrence = frontmatter
                    .get_str("recurrence")
                    .filter(|value| !value.trim().is_empty())
                    .map(str::to_string);
                self.date = frontmatter.get_str("date").and_then(parse_date);
                self.date_time = self
                    .date
                    .and(frontmatter.get_str("dateTime"))
                    .and_then(parse_time);
                self.due = frontmatter.get_str("due").and_then(parse_date);
                self.due_time = self
                    .due
                    .and(frontmatter.get_str("dueTime"))
                    .and_then(parse_time);

                let mut old_props = frontmatter;
                old_props.remove("content");
                self.old_props = old_props;
            }
            None => {
                debug!(
                    "event=entity_load module=model status=not_found kind=task path={}",
                    self.task_path
                );
                self.not_found = true;
            }
        }

        self.init_watcher();
    }

    fn cleanup(&mut self) {
        self.cleaned_up = true;
        if let Some(watch) = self.watch.take() {
            watch.stop();
        }
        self.clear_data();
    }

    fn is_loaded(&self) -> bool {
        self.loaded
    }

    fn is_cleaned_up(&self) -> bool {
        self.cleaned_up
    }

    fn is_not_found(&self) -> bool {
        self.not_found
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Task;
    use crate::clock::ManualClock;
    use crate::config::AbeleConfig;
    use crate::context::AbeleContext;
    use crate::host::VaultHost;
    use crate::model::Entity;
    use chrono::NaiveDate;
    use std::rc::Rc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    fn context() -> (AbeleContext, Rc<crate::host::MemoryVault>) {
        AbeleContext::in_memory(AbeleConfig::default(), Rc::new(ManualClock::new(0)))
    }

    #[test]
    fn load_reads_frontmatter_once_unless_forced() {
        let (ctx, vault) = context();
        vault.seed(
            "Tasks/Plan.md",
            "---\ntype: task\ndate: 2024-01-02\ndateTime: \"08:15\"\ndue: 2024-01-04\n---\nPlan trip\nbook hotel\n",
        );
        let task = Task::from_wikilink(&ctx, "[[Plan]]", None);

        task.borrow_mut().load(false);
        task.borrow_mut().load(false);
        assert_eq!(task.borrow().load_count(), 1);
        task.borrow_mut().load(true);
        assert_eq!(task.borrow().load_count(), 2);

        let task = task.borrow();
        assert_eq!(task.path(), "Tasks/Plan.md");
        assert_eq!(task.task_date(), Some(ymd(2024, 1, 2)));
        assert_eq!(
            task.dates(),
            vec!["2024-01-02", "2024-01-03", "2024-01-04"]
        );
        assert!(task.is_related_to_date(ymd(2024, 1, 3)));
        assert_eq!(task.date_at().map(|at| at.time().to_string()), Some("08:15:00".to_string()));
    }

    #[test]
    fn content_splits_title_and_description() {
        let (ctx, vault) = context();
        vault.seed("Tasks/Plan.md", "---\ntype: task\n---\n\nPlan trip\n\nbook hotel\n");
        let task = Task::from_path(&ctx, "Tasks/Plan.md");

        task.borrow_mut().load_content();
        assert_eq!(task.borrow().title, "Plan trip");
        assert_eq!(task.borrow().description, "book hotel");
    }

    #[test]
    fn unresolved_link_keeps_target_and_marks_not_found() {
        let (ctx, _vault) = context();
        let task = Task::from_wikilink(&ctx, "[[Missing|later]]", Some("/Notes/Root"));
        task.borrow_mut().load(false);

        let task = task.borrow();
        assert!(task.is_not_found());
        assert_eq!(task.path(), "Missing.md");
        assert_eq!(task.name(), "later");
        assert_eq!(task.source_path(), Some("Notes/Root.md"));
    }

    #[test]
    fn rename_repoints_and_cleanup_is_terminal() {
        let (ctx, vault) = context();
        vault.seed("Tasks/Plan.md", "---\ntype: task\ndue: 2024-01-04\n---\nPlan\n");
        let task = Task::from_path(&ctx, "Tasks/Plan.md");
        task.borrow_mut().load(false);

        vault
            .rename("Tasks/Plan.md", "Archive/Plan.md")
            .expect("rename should succeed");
        assert_eq!(task.borrow().path(), "Archive/Plan.md");
        assert_eq!(task.borrow().load_count(), 2);

        task.borrow_mut().cleanup();
        vault
            .modify("Archive/Plan.md", "---\ntype: task\ndue: 2024-02-01\n---\nPlan\n")
            .expect("modify should succeed");
        let task = task.borrow();
        assert_eq!(task.due, None);
        assert_eq!(task.load_count(), 2);
        assert!(!task.is_loaded());
        assert!(!task.is_watching());
    }
}
