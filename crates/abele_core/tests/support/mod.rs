#![allow(dead_code)]

use abele_core::{
    AbeleConfig, AbeleContext, AbeleSettings, Frontmatter, JournalRecurrence, JournalSettings,
    ManualClock, MemoryVault, VaultHost, VaultResult,
};
use chrono::NaiveDate;
use std::cell::Cell;
use std::rc::Rc;

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
}

pub fn memory_context(
    config: AbeleConfig,
    today: NaiveDate,
) -> (AbeleContext, Rc<MemoryVault>, Rc<ManualClock>) {
    let clock = Rc::new(ManualClock::at_date(today));
    let (ctx, vault) = AbeleContext::in_memory(config, clock.clone());
    (ctx, vault, clock)
}

/// Default daily journal whose instances live under `Daily/`.
pub fn daily_journal_config() -> AbeleConfig {
    AbeleConfig::from_settings(AbeleSettings {
        journals: vec![JournalSettings {
            id: Some("daily".to_string()),
            name: "Daily".to_string(),
            note_type: "/^Daily/".to_string(),
            is_default: true,
            date_property: None,
            template_path: None,
            new_path_template: Some("Daily/{{date:YYYY-MM-DD}}".to_string()),
            recurrence: JournalRecurrence::Daily,
            day_of_period: None,
        }],
        ..AbeleSettings::default()
    })
}

/// Vault wrapper counting existence probes.
pub struct CountingVault {
    inner: Rc<MemoryVault>,
    exists_calls: Cell<usize>,
}

impl CountingVault {
    pub fn new(inner: Rc<MemoryVault>) -> Self {
        Self {
            inner,
            exists_calls: Cell::new(0),
        }
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.get()
    }

    pub fn reset(&self) {
        self.exists_calls.set(0);
    }
}

impl VaultHost for CountingVault {
    fn backlinks(&self, path: &str) -> Vec<String> {
        self.inner.backlinks(path)
    }

    fn outgoing_links(&self, path: &str) -> Vec<String> {
        self.inner.outgoing_links(path)
    }

    fn frontmatter(&self, path: &str) -> Option<Frontmatter> {
        self.inner.frontmatter(path)
    }

    fn file_exists(&self, path: &str) -> bool {
        self.exists_calls.set(self.exists_calls.get() + 1);
        self.inner.file_exists(path)
    }

    fn resolve_link(&self, link: &str) -> Option<String> {
        self.inner.resolve_link(link)
    }

    fn markdown_files(&self) -> Vec<String> {
        self.inner.markdown_files()
    }

    fn read(&self, path: &str) -> Option<String> {
        self.inner.read(path)
    }

    fn create(&self, path: &str, content: &str) -> VaultResult<()> {
        self.inner.create(path, content)
    }

    fn modify(&self, path: &str, content: &str) -> VaultResult<()> {
        self.inner.modify(path, content)
    }

    fn rename(&self, old_path: &str, new_path: &str) -> VaultResult<()> {
        self.inner.rename(old_path, new_path)
    }

    fn delete(&self, path: &str) -> VaultResult<()> {
        self.inner.delete(path)
    }
}
