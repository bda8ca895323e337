//! Engine logging bootstrap.
//!
//! # Responsibility
//! - Start one rolling file logger per process.
//! - Record panics as single-line log events.
//!
//! # Invariants
//! - Starting twice with the same level and directory is a no-op.
//! - Starting with another level or directory fails with
//!   [`LoggingError::AlreadyRunning`].
//! - Engine events read `event=<name> module=<module> status=<status>`
//!   followed by `key=value` pairs.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Environment variable naming the log directory for [`init_logging_from_env`].
pub const LOG_DIR_ENV: &str = "ABELE_LOG_DIR";
/// Optional level override read by [`init_logging_from_env`].
pub const LOG_LEVEL_ENV: &str = "ABELE_LOG_LEVEL";

const LOG_BASENAME: &str = "abele";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_ROTATED: usize = 4;
const PANIC_SUMMARY_CHARS: usize = 200;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    dir: PathBuf,
    _handle: LoggerHandle,
}

/// Failure to start engine logging.
#[derive(Debug)]
pub enum LoggingError {
    UnknownLevel(String),
    InvalidDirectory(String),
    CreateDirectory { dir: PathBuf, source: std::io::Error },
    AlreadyRunning { level: &'static str, dir: PathBuf },
    Backend(flexi_logger::FlexiLoggerError),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unknown log level `{level}`; expected trace|debug|info|warn|error"
            ),
            Self::InvalidDirectory(dir) => {
                write!(f, "log directory must be a non-empty absolute path, got `{dir}`")
            }
            Self::CreateDirectory { dir, source } => {
                write!(f, "cannot create log directory `{}`: {source}", dir.display())
            }
            Self::AlreadyRunning { level, dir } => write!(
                f,
                "logging already running at level `{level}` in `{}`",
                dir.display()
            ),
            Self::Backend(err) => write!(f, "logger backend failed: {err}"),
        }
    }
}

impl Error for LoggingError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::CreateDirectory { source, .. } => Some(source),
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<flexi_logger::FlexiLoggerError> for LoggingError {
    fn from(value: flexi_logger::FlexiLoggerError) -> Self {
        Self::Backend(value)
    }
}

/// Starts engine logging at `level` in the absolute directory `log_dir`.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = parse_level(level)?;
    let dir = parse_dir(log_dir)?;

    let active = ACTIVE.get_or_try_init(|| start(level, &dir))?;
    if active.level != level || active.dir != dir {
        return Err(LoggingError::AlreadyRunning {
            level: active.level,
            dir: active.dir.clone(),
        });
    }
    Ok(())
}

/// Starts logging when [`LOG_DIR_ENV`] is set.
///
/// Returns `Ok(false)` when the variable is absent. The level comes from
/// [`LOG_LEVEL_ENV`] or [`default_log_level`].
pub fn init_logging_from_env() -> Result<bool, LoggingError> {
    let Ok(dir) = std::env::var(LOG_DIR_ENV) else {
        return Ok(false);
    };
    let level = std::env::var(LOG_LEVEL_ENV).unwrap_or_else(|_| default_log_level().to_string());
    init_logging(&level, &dir)?;
    Ok(true)
}

/// `(level, directory)` of the running logger.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE.get().map(|active| (active.level, active.dir.clone()))
}

/// `debug` in debug builds, `info` in release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start(level: &'static str, dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(dir).map_err(|source| LoggingError::CreateDirectory {
        dir: dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::try_with_str(level)?
        .log_to_file(FileSpec::default().directory(dir).basename(LOG_BASENAME))
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_ROTATED),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    hook_panics();

    info!(
        "event=logging_start module=logging status=ok level={} dir={} os={} version={}",
        level,
        dir.display(),
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        dir: dir.to_path_buf(),
        _handle: handle,
    })
}

fn parse_level(level: &str) -> Result<&'static str, LoggingError> {
    let lowered = level.trim().to_ascii_lowercase();
    ["trace", "debug", "info", "warn", "error"]
        .into_iter()
        .find(|known| *known == lowered || (lowered == "warning" && *known == "warn"))
        .ok_or(LoggingError::UnknownLevel(lowered))
}

fn parse_dir(log_dir: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = log_dir.trim();
    let path = Path::new(trimmed);
    if trimmed.is_empty() || !path.is_absolute() {
        return Err(LoggingError::InvalidDirectory(trimmed.to_string()));
    }
    Ok(path.to_path_buf())
}

fn hook_panics() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map_or_else(|| "unknown".to_string(), |loc| format!("{}:{}", loc.file(), loc.line()));
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            one_line(&payload, PANIC_SUMMARY_CHARS)
        );
        previous(panic_info);
    }));
}

/// Note paths and phrases end up in panic payloads.
fn one_line(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, one_line, parse_dir, parse_level, LoggingError};

    #[test]
    fn levels_accept_case_and_warning_alias() {
        assert_eq!(parse_level(" DEBUG ").expect("DEBUG is a level"), "debug");
        assert_eq!(parse_level("warning").expect("warning is an alias"), "warn");
        assert!(matches!(
            parse_level("chatty"),
            Err(LoggingError::UnknownLevel(level)) if level == "chatty"
        ));
    }

    #[test]
    fn directory_must_be_absolute() {
        assert!(matches!(
            parse_dir("logs"),
            Err(LoggingError::InvalidDirectory(_))
        ));
        assert!(parse_dir("   ").is_err());
    }

    #[test]
    fn panic_payloads_collapse_to_one_bounded_line() {
        assert_eq!(one_line("Tasks/a.md\nTasks/b.md", 40), "Tasks/a.md Tasks/b.md");
        let cut = one_line("every 2 weeks on monday\rfrom completion", 10);
        assert_eq!(cut, "every 2 we...");
    }

    #[test]
    fn second_start_must_match_the_first() {
        let first = tempfile::Builder::new()
            .prefix("abele-log")
            .tempdir()
            .expect("temp dir should be created");
        let other = tempfile::Builder::new()
            .prefix("abele-log")
            .tempdir()
            .expect("temp dir should be created");
        let first_dir = first.path().to_str().expect("temp dir should be UTF-8");
        let other_dir = other.path().to_str().expect("temp dir should be UTF-8");

        init_logging("info", first_dir).expect("first start should succeed");
        init_logging("INFO", first_dir).expect("same settings should be a no-op");

        let err = init_logging("debug", first_dir).expect_err("level change should fail");
        assert!(matches!(err, LoggingError::AlreadyRunning { level: "info", .. }));
        assert!(init_logging("info", other_dir).is_err());

        let (level, dir) = logging_status().expect("logger should be running");
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
