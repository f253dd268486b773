//! Error types for the mod director with context for every failure site

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, resolving or installing remote mods
#[derive(Error, Debug)]
pub enum DirectorError {
    /// HTTP-related errors with context
    #[error("HTTP request to '{url}' failed")]
    HttpRequest {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("HTTP request to '{url}' returned status {status}")]
    HttpStatus { url: String, status: u16 },

    /// File system I/O errors with file context
    #[error("Failed {operation} '{path}'")]
    FileSystem {
        path: PathBuf,
        operation: FileOperation,
        #[source]
        source: std::io::Error,
    },

    /// URL parsing errors
    #[error("Invalid URL '{url}'")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// JSON payload could not be parsed or mapped
    #[error("Failed to parse JSON {context}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Catalog answered but the answer is unusable
    #[error("Failed to query information from {remote}: {reason}")]
    QueryFailed { remote: String, reason: String },

    /// Version exists but has no file at the requested index
    #[error("No such file at index {index} for version {version_id}")]
    MissingFileIndex { version_id: String, index: usize },

    /// Follow marker was not present in the fetched page
    #[error("Unable to find follow string '{follow}' in html from {url}")]
    FollowNotFound { follow: String, url: String },

    /// Follow marker was found but the link next to it is empty
    #[error("Result url was empty when matching '{follow}' in html from {url}")]
    EmptyFollowUrl { follow: String, url: String },

    /// URL is hosted on a domain flagged by the repost blocklist
    #[error("Found flagged URL {url} on domain {domain} in the repost blocklist: {reason}")]
    Blocklisted {
        url: String,
        domain: String,
        reason: String,
    },

    /// Archive could not be read
    #[error("Failed to read archive '{path}'")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    /// Archive entry would escape the extraction directory
    #[error("Invalid archive entry '{name}'")]
    InvalidArchiveEntry { name: String },

    /// Computed path is not below the installation root
    #[error("Tried to install a file to {path}, which is outside of the installation root {root}")]
    OutsideInstallationRoot { path: PathBuf, root: PathBuf },

    /// Configuration file problems
    #[error("Invalid configuration '{path}': {message}")]
    Configuration { path: PathBuf, message: String },

    /// Background task panicked or was cancelled
    #[error("Task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Types of file operations for error context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
    Move,
    CreateDir,
    List,
}

impl std::fmt::Display for FileOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileOperation::Read => write!(f, "reading"),
            FileOperation::Write => write!(f, "writing"),
            FileOperation::Create => write!(f, "creating"),
            FileOperation::Delete => write!(f, "deleting"),
            FileOperation::Move => write!(f, "moving"),
            FileOperation::CreateDir => write!(f, "creating directory"),
            FileOperation::List => write!(f, "listing"),
        }
    }
}

pub type Result<T> = std::result::Result<T, DirectorError>;

impl DirectorError {
    /// Wrap an I/O error with the path and operation it happened on
    pub fn io(path: impl Into<PathBuf>, operation: FileOperation, source: std::io::Error) -> Self {
        DirectorError::FileSystem {
            path: path.into(),
            operation,
            source,
        }
    }

    pub fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        DirectorError::HttpRequest {
            url: url.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        DirectorError::Json {
            context: context.into(),
            source,
        }
    }

    /// Blocklist hits abort the descriptor and are never downgraded by policy
    pub fn is_blocklisted(&self) -> bool {
        matches!(self, DirectorError::Blocklisted { .. })
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            DirectorError::HttpRequest { .. } => "http_request",
            DirectorError::HttpStatus { .. } => "http_status",
            DirectorError::FileSystem { .. } => "file_system",
            DirectorError::InvalidUrl { .. } => "invalid_url",
            DirectorError::Json { .. } => "json",
            DirectorError::QueryFailed { .. } => "query_failed",
            DirectorError::MissingFileIndex { .. } => "missing_file_index",
            DirectorError::FollowNotFound { .. } => "follow_not_found",
            DirectorError::EmptyFollowUrl { .. } => "empty_follow_url",
            DirectorError::Blocklisted { .. } => "blocklisted",
            DirectorError::Archive { .. } => "archive",
            DirectorError::InvalidArchiveEntry { .. } => "invalid_archive_entry",
            DirectorError::OutsideInstallationRoot { .. } => "outside_installation_root",
            DirectorError::Configuration { .. } => "configuration",
            DirectorError::TaskFailed { .. } => "task_failed",
        }
    }
}
