use crate::context::AbeleContext;
use crate::dates::{extract_date_from_filename, parse_date};
use crate::model::{Entity, EntityWatch, Shared};
use crate::paths::{name_from_path, normalize_path, path_to_wikilink};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Any related note that is neither a task nor a log.
pub struct Note {
    ctx: AbeleContext,
    self_ref: Weak<RefCell<Note>>,
    file_path: String,

    pub created_at: Option<NaiveDate>,
    pub note_type: Option<String>,

    loaded: bool,
    not_found: bool,
    cleaned_up: bool,
    watch: Option<EntityWatch>,
}

impl Note {
    pub fn new(ctx: &AbeleContext, file_path: &str) -> Shared<Self> {
        let file_path = normalize_path(file_path);
        Rc::new_cyclic(|self_ref| {
            RefCell::new(Self {
                ctx: ctx.clone(),
                self_ref: self_ref.clone(),
                file_path,
                created_at: None,
                note_type: None,
                loaded: false,
                not_found: false,
                cleaned_up: false,
                watch: None,
            })
        })
    }

    pub fn name(&self) -> &str {
        name_from_path(&self.file_path)
    }

    pub fn wikilink(&self) -> String {
        path_to_wikilink(&self.file_path, None)
    }

    fn init_watcher(&mut self) {
        if self.watch.is_some() {
            return;
        }
        self.watch = Some(EntityWatch::start(
            &self.ctx,
            &self.file_path,
            self.self_ref.clone(),
            |note: &mut Note, new_path| note.file_path = normalize_path(new_path),
            |note: &mut Note| note.load(true),
        ));
    }
}

impl Entity for Note {
    fn path(&self) -> &str {
        &self.file_path
    }

    fn load(&mut self, force: bool) {
        if self.cleaned_up || (self.loaded && !force) {
            return;
        }
        self.loaded = true;

        match self.ctx.host.frontmatter(&self.file_path) {
            Some(frontmatter) => {
                self.not_found = false;
                self.created_at = frontmatter
                    .get_str("created")
                    .and_then(parse_date)
                    .or_else(|| extract_date_from_filename(name_from_path(&self.file_path)));
                self.note_type = frontmatter
                    .note_type()
                    .filter(|value| !value.is_empty())
                    .map(str::to_string);
            }
            None => self.not_found = true,
        }

        self.init_watcher();
    }

    fn cleanup(&mut self) {
        self.cleaned_up = true;
        if let Some(watch) = self.watch.take() {
            watch.stop();
        }
        self.created_at = None;
        self.note_type = None;
        self.loaded = false;
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

impl Drop for Note {
    fn drop(&mut self) {
        if let Some(watch) = self.watch.take() {
            watch.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Note;
    use crate::clock::ManualClock;
    use crate::config::AbeleConfig;
    use crate::context::AbeleContext;
    use crate::host::VaultHost;
    use crate::model::Entity;
    use chrono::NaiveDate;
    use std::rc::Rc;

    #[test]
    fn modify_burst_reloads_once_then_trailing() {
        let clock = Rc::new(ManualClock::new(1_000));
        let (ctx, vault) = AbeleContext::in_memory(AbeleConfig::default(), clock.clone());
        vault.seed("Ideas/Tea.md", "---\ncreated: 2024-01-01\n---\n");
        let note = Note::new(&ctx, "Ideas/Tea.md");
        note.borrow_mut().load(false);

        vault
            .modify("Ideas/Tea.md", "---\ncreated: 2024-02-01\n---\n")
            .expect("modify should succeed");
        assert_eq!(note.borrow().created_at, NaiveDate::from_ymd_opt(2024, 2, 1));

        vault
            .modify("Ideas/Tea.md", "---\ncreated: 2024-03-01\n---\n")
            .expect("modify should succeed");
        assert_eq!(note.borrow().created_at, NaiveDate::from_ymd_opt(2024, 2, 1));

        clock.advance(300);
        assert_eq!(ctx.run_due_timers(), 1);
        assert_eq!(note.borrow().created_at, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn trailing_reload_after_cleanup_is_ignored() {
        let clock = Rc::new(ManualClock::new(1_000));
        let (ctx, vault) = AbeleContext::in_memory(AbeleConfig::default(), clock.clone());
        vault.seed("Ideas/Tea.md", "---\ntype: idea\n---\n");
        let note = Note::new(&ctx, "Ideas/Tea.md");
        note.borrow_mut().load(false);

        vault.modify("Ideas/Tea.md", "---\ntype: a\n---\n").expect("modify should succeed");
        vault.modify("Ideas/Tea.md", "---\ntype: b\n---\n").expect("modify should succeed");
        note.borrow_mut().cleanup();

        clock.advance(1_000);
        ctx.run_due_timers();
        assert_eq!(note.borrow().note_type, None);
        assert!(!note.borrow().is_loaded());
        assert_eq!(ctx.events.pending_timers(), 0);
    }
}
