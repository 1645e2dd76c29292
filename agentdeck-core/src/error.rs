//! Error types for agentdeck-core
//!
//! Errors fall into two phases:
//! - **Discovery** ([`ScanError`], [`ParseError`], [`MergeWarning`]): recovered
//!   locally, logged, and returned as warnings next to the successful results.
//! - **Write** ([`ValidationError`], [`WriteError`], and the revert variants of
//!   [`Error`]): returned to the caller as explicit failures.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the agentdeck-core library
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Operation not available for this kind of resource
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// Resource file could not be parsed
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Resource failed validation before a write
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A requested write failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Resource is not editable (builtin or system install location)
    #[error("resource {0} is not editable")]
    NotEditable(String),

    /// Change not found in the change log
    #[error("change {change_id} not found for resource {resource_id}")]
    ChangeNotFound {
        resource_id: String,
        change_id: String,
    },

    /// Change has no prior content to restore
    #[error("change {0} has no previous content to revert to")]
    NothingToRevert(String),
}

/// Result type alias for agentdeck-core
pub type Result<T> = std::result::Result<T, Error>;

/// Non-fatal problem encountered while walking a directory tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// Entry could not be read due to permissions
    #[error("permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },

    /// Symlink points at nothing
    #[error("broken symlink: {}", path.display())]
    BrokenSymlink { path: PathBuf },

    /// Symlink points back at one of its ancestors
    #[error("symlink loop: {}", path.display())]
    SymlinkLoop { path: PathBuf },

    /// Any other unreadable entry
    #[error("unreadable entry {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    /// The root itself failed; only this root's sub-scan was aborted
    #[error("root {} aborted: {message}", root.display())]
    RootAborted { root: PathBuf, message: String },
}

impl ScanError {
    /// Path the error refers to.
    pub fn path(&self) -> &std::path::Path {
        match self {
            ScanError::PermissionDenied { path }
            | ScanError::BrokenSymlink { path }
            | ScanError::SymlinkLoop { path }
            | ScanError::Unreadable { path, .. } => path,
            ScanError::RootAborted { root, .. } => root,
        }
    }
}

/// Kind of parse failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// File does not start with a `---` frontmatter block
    MissingFrontmatter,
    /// Frontmatter is unterminated or is not a key/value mapping
    InvalidFrontmatter,
    /// Settings file is not valid JSON
    InvalidJson,
    /// File is not valid UTF-8 text or could not be read
    Unreadable,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ParseErrorKind::MissingFrontmatter => "missing frontmatter",
            ParseErrorKind::InvalidFrontmatter => "invalid frontmatter",
            ParseErrorKind::InvalidJson => "invalid JSON",
            ParseErrorKind::Unreadable => "unreadable file",
        };
        f.write_str(s)
    }
}

/// A file that could not be turned into a resource.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} in {}: {message}", path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    pub fn new(path: impl Into<PathBuf>, kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Resource rejected before any filesystem side effect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid resource name {0:?}")]
    InvalidName(String),

    #[error("invalid namespace {0:?}")]
    InvalidNamespace(String),

    #[error("resource {0} has no body content")]
    EmptyContent(String),

    #[error("settings resource {0} is not valid JSON")]
    InvalidSettings(String),

    #[error("project directory {} must be an existing absolute path", .0.display())]
    InvalidProject(PathBuf),

    #[error("project scope requires a target project")]
    MissingProject,

    #[error("builtin scope is read-only and cannot be an assignment target")]
    BuiltinTarget,

    #[error("destination {} is the source itself", .0.display())]
    SameLocation(PathBuf),

    #[error("resource {0} is not editable and cannot be moved")]
    NotMovable(String),
}

/// Filesystem failure during an explicit write.
#[derive(Error, Debug)]
#[error("failed to {action} {}: {source}", path.display())]
pub struct WriteError {
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    pub fn new(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}

/// A settings layer was left out of a merge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("settings layer {layer} excluded from merge: {reason}")]
pub struct MergeWarning {
    pub layer: String,
    pub path: PathBuf,
    pub reason: String,
}
