//! Task use-case service.
//!
//! # Responsibility
//! - Create task notes under the configured tasks folder.
//! - Re-create the next occurrence of a completed recurring task.
//! - Toggle completion and persist the task note.
//!
//! # Invariants
//! - The next occurrence shares no state with the completed task; it is
//!   built from a [`TaskSnapshot`].
//! - No task borrow is held while the vault is written.
//! - New task paths never overwrite an existing note.

use crate::context::AbeleContext;
use crate::dates::format_date;
use crate::model::task::DEFAULT_TASK_TITLE;
use crate::model::{Shared, TaskCreateRequest, TaskSnapshot};
use crate::paths::{clean_file_name, resolve_path};
use crate::recurrence::RecurrenceParser;
use crate::template::{get_available_path, TaskNoteTemplate, TemplateError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

static WIKILINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wikilink regex"));

/// Service error for task use-cases.
#[derive(Debug)]
pub enum TaskServiceError {
    /// Task has no recurrence phrase, or the phrase is not a rule.
    NotRecurring(String),
    /// Recurring task without `due` or `date` to step from.
    MissingAnchorDate(String),
    /// Task note could not be written.
    Template(TemplateError),
}

impl Display for TaskServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRecurring(path) => write!(f, "task is not recurring: {path}"),
            Self::MissingAnchorDate(path) => write!(f, "recurring task has no date or due: {path}"),
            Self::Template(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TaskServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Template(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TemplateError> for TaskServiceError {
    fn from(value: TemplateError) -> Self {
        Self::Template(value)
    }
}

pub type TaskServiceResult<T> = Result<T, TaskServiceError>;

pub struct TaskService {
    ctx: AbeleContext,
    parser: RecurrenceParser,
}

impl TaskService {
    pub fn new(ctx: &AbeleContext) -> Self {
        Self {
            ctx: ctx.clone(),
            parser: RecurrenceParser::new(),
        }
    }

    /// Writes a new task note and returns its path.
    ///
    /// The file name is the cleaned title (or `New Task`), suffixed with
    /// ` (n)` when taken. `created` defaults to today.
    pub fn create_task(&self, mut request: TaskCreateRequest) -> TaskServiceResult<String> {
        let mut name = clean_task_name(&request.title);
        if name.is_empty() {
            name = DEFAULT_TASK_TITLE.to_string();
        }
        let wanted = resolve_path(&self.ctx.config.tasks_folder, &name);
        let path = get_available_path(self.ctx.host.as_ref(), &wanted);

        request.created_at.get_or_insert_with(|| self.ctx.clock.today());
        TaskNoteTemplate::write(self.ctx.host.as_ref(), &path, &request, false)?;
        info!("event=task_create module=service status=ok path={path}");
        Ok(path)
    }

    /// Creates the occurrence following `task` and returns its path.
    ///
    /// `due` and `date` are stepped independently; completion is cleared and
    /// every other property is carried over.
    pub fn create_next_recurrence(&self, task: &TaskSnapshot) -> TaskServiceResult<String> {
        let request = &task.request;
        let Some(pattern) = request
            .recurrence
            .as_deref()
            .filter(|pattern| self.parser.parse(pattern).is_some())
        else {
            warn!(
                "event=task_recurrence module=service status=skipped reason=no_rule path={} pattern={:?}",
                task.path, request.recurrence
            );
            return Err(TaskServiceError::NotRecurring(task.path.clone()));
        };
        if request.due.is_none() && request.date.is_none() {
            return Err(TaskServiceError::MissingAnchorDate(task.path.clone()));
        }

        let step = |day: Option<NaiveDate>, time: Option<NaiveTime>| -> Option<NaiveDateTime> {
            let base = day?.and_time(time.unwrap_or_default());
            let completion = request
                .completed_at
                .map(|completed| completed.and_time(base.time()));
            self.parser.get_next_date(base, pattern, completion)
        };
        let next_due = step(request.due, request.due_time);
        let next_date = step(request.date, request.date_time);

        let title = recurrent_task_title(
            &request.content,
            next_due.or(next_date).map(|next| next.date()),
        );
        let next = TaskCreateRequest {
            title,
            completed_at: None,
            due: next_due.map(|next| next.date()),
            due_time: request.due_time.and(next_due.map(|next| next.time())),
            date: next_date.map(|next| next.date()),
            date_time: request.date_time.and(next_date.map(|next| next.time())),
            ..request.clone()
        };

        let path = self.create_task(next)?;
        info!(
            "event=task_recurrence module=service status=ok from={} to={}",
            task.path, path
        );
        Ok(path)
    }

    /// Flips completion and rewrites the task note.
    ///
    /// Completing a recurring task also creates its next occurrence, whose
    /// path is returned.
    pub fn toggle(&self, task: &Shared<crate::model::Task>) -> TaskServiceResult<Option<String>> {
        let (snapshot, completed) = {
            let mut task = task.borrow_mut();
            if task.completed_at.is_some() {
                task.completed_at = None;
                (task.snapshot(), false)
            } else {
                task.completed_at = Some(self.ctx.clock.today());
                if task.content.is_empty() {
                    task.load_content();
                }
                (task.snapshot(), true)
            }
        };

        let next = if completed && snapshot.request.recurrence.is_some() {
            match self.create_next_recurrence(&snapshot) {
                Ok(path) => Some(path),
                Err(TaskServiceError::Template(err)) => return Err(err.into()),
                Err(err) => {
                    warn!(
                        "event=task_toggle module=service status=no_recurrence path={} error={}",
                        snapshot.path, err
                    );
                    None
                }
            }
        } else {
            None
        };

        TaskNoteTemplate::write(
            self.ctx.host.as_ref(),
            &snapshot.path,
            &snapshot.request,
            true,
        )?;
        info!(
            "event=task_toggle module=service status=ok path={} completed={}",
            snapshot.path, completed
        );
        Ok(next)
    }
}

/// Replaces wikilinks by their alias (or target) and strips characters that
/// are invalid in file names.
pub fn clean_task_name(name: &str) -> String {
    let unlinked = WIKILINK_RE.replace_all(name, |caps: &regex::Captures<'_>| {
        let inner = caps.get(1).map_or("", |m| m.as_str());
        let mut parts = inner.split('|');
        let target = parts.next().unwrap_or_default();
        parts.next().unwrap_or(target).trim().to_string()
    });
    clean_file_name(&unlinked)
}

/// First content line, followed by the next occurrence date when known.
pub fn recurrent_task_title(content: &str, date: Option<NaiveDate>) -> String {
    let Some(first_line) = content.split('\n').find(|line| !line.trim().is_empty()) else {
        return DEFAULT_TASK_TITLE.to_string();
    };
    let raw = match date {
        Some(date) => format!("{first_line} {}", format_date(date)),
        None => first_line.to_string(),
    };
    let cleaned = clean_task_name(&raw);
    if cleaned.is_empty() {
        DEFAULT_TASK_TITLE.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::{clean_task_name, recurrent_task_title, TaskService, TaskServiceError};
    use crate::clock::ManualClock;
    use crate::config::AbeleConfig;
    use crate::context::AbeleContext;
    use crate::model::{TaskCreateRequest, TaskSnapshot};
    use chrono::NaiveDate;
    use std::rc::Rc;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn titles_are_cleaned_and_dated() {
        assert_eq!(clean_task_name("Call [[People/Ann|Ann]] re: [[Budget]]"), "Call Ann re Budget");
        assert_eq!(
            recurrent_task_title("\n  \nWater plants\nbalcony", Some(ymd(2024, 5, 1))),
            "Water plants 2024-05-01"
        );
        assert_eq!(recurrent_task_title("", None), "New Task");
    }

    #[test]
    fn create_task_picks_free_path_under_tasks_folder() {
        let (ctx, vault) = AbeleContext::in_memory(
            AbeleConfig::default(),
            Rc::new(ManualClock::at_date(ymd(2024, 5, 1))),
        );
        vault.seed("Tasks/Pay rent.md", "---\ntype: task\n---\nPay rent\n");
        let service = TaskService::new(&ctx);

        let path = service
            .create_task(TaskCreateRequest {
                title: "Pay rent".to_string(),
                content: "Pay rent\n".to_string(),
                ..TaskCreateRequest::default()
            })
            .expect("task should be created");
        assert_eq!(path, "Tasks/Pay rent (1).md");
    }

    #[test]
    fn non_recurring_snapshot_is_rejected() {
        let (ctx, _vault) = AbeleContext::in_memory(AbeleConfig::default(), Rc::new(ManualClock::new(0)));
        let snapshot = TaskSnapshot {
            path: "Tasks/Once.md".to_string(),
            request: TaskCreateRequest {
                recurrence: Some("whenever".to_string()),
                due: Some(ymd(2024, 1, 1)),
                ..TaskCreateRequest::default()
            },
        };
        let err = TaskService::new(&ctx)
            .create_next_recurrence(&snapshot)
            .expect_err("phrase is not a rule");
        assert!(matches!(err, TaskServiceError::NotRecurring(path) if path == "Tasks/Once.md"));
    }
}
