//! Note relations and recurrence engine for a plain-text note vault.
//!
//! The engine discovers the tasks, logs and notes related to a note, keeps
//! them current while the vault changes, and computes recurring dates for
//! journals and tasks. Host storage is reached through [`host::VaultHost`].

pub mod clock;
pub mod config;
pub mod context;
pub mod dates;
pub mod host;
pub mod logging;
pub mod model;
pub mod paths;
pub mod recurrence;
pub mod relations;
pub mod service;
pub mod template;
pub mod watch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AbeleConfig, AbeleSettings, ConfigError};
pub use context::AbeleContext;
pub use host::{Frontmatter, MemoryVault, VaultError, VaultHost, VaultResult};
pub use logging::{
    default_log_level, init_logging, init_logging_from_env, logging_status, LoggingError,
};
pub use model::{
    Criterion, CriterionOperator, CriterionType, DayOfPeriod, DayOfPeriodValue, Entity, Journal,
    JournalRecurrence, JournalSettings, Log, Note, Shared, Task, TaskCreateRequest, TaskSnapshot,
};
pub use recurrence::{RecurrenceParser, RecurrenceRule};
pub use relations::{NoteRelations, RelationKind};
pub use service::{TaskService, TaskServiceError};
pub use template::TemplateError;
pub use watch::{VaultEvent, VaultEvents};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
