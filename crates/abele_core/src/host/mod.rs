//! Host capability contract.
//!
//! # Responsibility
//! - Describe what the engine needs from the note host: link oracles,
//!   frontmatter cache, existence checks and file primitives.
//! - Ship an in-process implementation ([`MemoryVault`]).
//!
//! # Invariants
//! - Read-side methods never fail; missing data is `None` or empty.
//! - All paths crossing this boundary are normalized vault paths.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod frontmatter;
pub mod memory;

pub use frontmatter::{extract_frontmatter, strip_frontmatter, Frontmatter};
pub use memory::MemoryVault;

/// Write-side failure of a host file primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    NotFound(String),
    AlreadyExists(String),
    InvalidPath(String),
}

impl Display for VaultError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "file not found: {path}"),
            Self::AlreadyExists(path) => write!(f, "file already exists: {path}"),
            Self::InvalidPath(path) => write!(f, "invalid vault path: `{path}`"),
        }
    }
}

impl Error for VaultError {}

pub type VaultResult<T> = Result<T, VaultError>;

pub trait VaultHost {
    /// Source paths with at least one resolved link to `path`.
    fn backlinks(&self, path: &str) -> Vec<String>;
    /// Resolved link targets of `path`, frontmatter links included.
    fn outgoing_links(&self, path: &str) -> Vec<String>;
    /// Last indexed frontmatter of `path`.
    fn frontmatter(&self, path: &str) -> Option<Frontmatter>;
    fn file_exists(&self, path: &str) -> bool;
    /// Resolves a possibly folder-less link target to an existing file path.
    fn resolve_link(&self, link: &str) -> Option<String>;
    fn markdown_files(&self) -> Vec<String>;
    fn read(&self, path: &str) -> Option<String>;

    fn create(&self, path: &str, content: &str) -> VaultResult<()>;
    fn modify(&self, path: &str, content: &str) -> VaultResult<()>;
    fn rename(&self, old_path: &str, new_path: &str) -> VaultResult<()>;
    fn delete(&self, path: &str) -> VaultResult<()>;
}
