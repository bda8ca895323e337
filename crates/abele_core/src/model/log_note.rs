//! Log entity: a dated diary-style note, optionally viewed from a target note.
//!
//! When a target is set, [`Log::load_content`] keeps only the paragraphs that
//! link to the target (or to a note grouped under it).

use crate::context::AbeleContext;
use crate::dates::{extract_date_from_filename, parse_date};
use crate::host::{strip_frontmatter, VaultHost};
use crate::model::{Entity, EntityWatch, Shared};
use crate::paths::{is_wikilink, name_from_path, normalize_path, path_to_wikilink, wikilink_to_path};
use chrono::NaiveDate;
use log::debug;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

pub struct Log {
    ctx: AbeleContext,
    self_ref: Weak<RefCell<Log>>,
    file_path: String,
    target_path: Option<String>,

    pub created_at: Option<NaiveDate>,
    pub note_type: Option<String>,
    pub content: String,

    loaded: bool,
    not_found: bool,
    cleaned_up: bool,
    load_count: usize,
    watch: Option<EntityWatch>,
    target_watch: Option<EntityWatch>,
}

impl Log {
    pub fn new(ctx: &AbeleContext, file_path: &str, target_path: Option<&str>) -> Shared<Self> {
        let file_path = normalize_path(file_path);
        let target_path = target_path.map(normalize_path);
        Rc::new_cyclic(|self_ref| {
            RefCell::new(Self {
                ctx: ctx.clone(),
                self_ref: self_ref.clone(),
                file_path,
                target_path,
                created_at: None,
                note_type: None,
                content: String::new(),
                loaded: false,
                not_found: false,
                cleaned_up: false,
                load_count: 0,
                watch: None,
                target_watch: None,
            })
        })
    }

    pub fn name(&self) -> &str {
        name_from_path(&self.file_path)
    }

    pub fn wikilink(&self) -> String {
        path_to_wikilink(&self.file_path, None)
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref()
    }

    pub fn load_count(&self) -> usize {
        self.load_count
    }

    /// Reads the note body, narrowed to target-related paragraphs when
    /// any paragraph mentions the target.
    pub fn load_content(&mut self) {
        if self.cleaned_up {
            return;
        }
        let Some(raw) = self.ctx.host.read(&self.file_path) else {
            self.not_found = true;
            return;
        };

        let mut paragraphs: Vec<&str> = strip_frontmatter(&raw).split("\n\n").map(str::trim).collect();
        if self.target_path.is_some() {
            let needles: Vec<String> = self
                .related_links()
                .iter()
                .flat_map(|path| link_prefixes(path))
                .map(|needle| needle.to_lowercase())
                .collect();
            let related: Vec<&str> = paragraphs
                .iter()
                .copied()
                .filter(|paragraph| {
                    let lowered = paragraph.to_lowercase();
                    needles.iter().any(|needle| lowered.contains(needle.as_str()))
                })
                .collect();
            if !related.is_empty() {
                paragraphs = related;
            }
        }
        self.content = paragraphs.join("\n\n");
    }

    /// Outgoing links pointing at the target, directly or through groups.
    fn related_links(&self) -> Vec<String> {
        let Some(target) = self.target_path.as_deref() else {
            return Vec::new();
        };
        let host = self.ctx.host.as_ref();
        let mut links: Vec<String> = Vec::new();
        for link in host.outgoing_links(&self.file_path) {
            let related = link == target || in_groups_tree(host, &link, target, &mut BTreeSet::new());
            if related && !links.contains(&link) {
                links.push(link);
            }
        }
        links
    }

    fn init_watcher(&mut self) {
        if self.watch.is_some() {
            return;
        }
        self.watch = Some(EntityWatch::start(
            &self.ctx,
            &self.file_path,
            self.self_ref.clone(),
            |log: &mut Log, new_path| log.file_path = normalize_path(new_path),
            |log: &mut Log| log.load(true),
        ));
        if let Some(target) = self.target_path.clone() {
            self.target_watch = Some(EntityWatch::start(
                &self.ctx,
                &target,
                self.self_ref.clone(),
                |log: &mut Log, new_path| log.target_path = Some(normalize_path(new_path)),
                |log: &mut Log| {
                    log.load(true);
                    log.load_content();
                },
            ));
        }
    }

    fn stop_watchers(&mut self) {
        for watch in [self.watch.take(), self.target_watch.take()].into_iter().flatten() {
            watch.stop();
        }
    }
}

/// `[[path-without-ext`, `[[path` and `[[name` prefixes of links to `path`.
fn link_prefixes(path: &str) -> [String; 3] {
    [
        format!("[[{}", path.strip_suffix(".md").unwrap_or(path)),
        format!("[[{path}"),
        format!("[[{}", name_from_path(path)),
    ]
}

/// Whether `path` is `target` or reaches it by following `groups` links.
pub(crate) fn in_groups_tree(
    host: &dyn VaultHost,
    path: &str,
    target: &str,
    visited: &mut BTreeSet<String>,
) -> bool {
    let path = normalize_path(path);
    if path == target {
        return true;
    }
    if !visited.insert(path.clone()) {
        return false;
    }
    let Some(frontmatter) = host.frontmatter(&path) else {
        return false;
    };

    frontmatter
        .groups()
        .iter()
        .filter(|group| is_wikilink(group))
        .filter_map(|group| wikilink_to_path(group))
        .filter_map(|group| host.resolve_link(&group))
        .any(|group_path| in_groups_tree(host, &group_path, target, visited))
}

impl Entity for Log {
    fn path(&self) -> &str {
        &self.file_path
    }

    fn load(&mut self, force: bool) {
        if self.cleaned_up || (self.loaded && !force) {
            return;
        }
        self.loaded = true;
        self.load_count += 1;

        let frontmatter = self.ctx.host.frontmatter(&self.file_path);
        if frontmatter.is_none() {
            debug!(
                "event=entity_load module=model status=not_found kind=log path={}",
                self.file_path
            );
        }
        self.not_found = frontmatter.is_none();
        self.created_at = frontmatter
            .as_ref()
            .and_then(|frontmatter| frontmatter.get_str("created"))
            .and_then(parse_date)
            .or_else(|| extract_date_from_filename(name_from_path(&self.file_path)));
        self.note_type = frontmatter
            .as_ref()
            .and_then(|frontmatter| frontmatter.note_type())
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        self.init_watcher();
    }

    fn cleanup(&mut self) {
        self.cleaned_up = true;
        self.stop_watchers();
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

impl Drop for Log {
    fn drop(&mut self) {
        self.stop_watchers();
    }
}
