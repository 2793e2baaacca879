//! Application-wide error types.
//!
//! Library modules return [`Result`] with the [`Error`] enum below, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - Title, store, collision and filesystem-conflict errors are distinct
//!   variants so the reconciler can collect them per folder and the CLI can
//!   report them without string matching.
//! - All errors implement `std::error::Error` for compatibility.
//!
//! # Example
//!
//! ```ignore
//! use lyrics_keeper::error::{Error, Result, ResultExt};
//!
//! fn read_title(path: &Path) -> Result<String> {
//!     let text = std::fs::read_to_string(path).with_context("reading lyrics")?;
//!     Ok(text.lines().next().unwrap_or_default().to_string())
//! }
//! ```

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Title text leaves nothing usable after slugification
    #[error("Invalid title {0:?}: no letters or digits to build a key from")]
    InvalidTitle(String),

    /// Metadata document exists but cannot be read as a song mapping
    #[error("Corrupt metadata store {path}: {message}")]
    CorruptStore { path: PathBuf, message: String },

    /// Two distinct entities resolve to the same key
    #[error("Key collision on '{key}': '{existing}' and '{incoming}' both resolve to it")]
    KeyCollision {
        key: String,
        existing: String,
        incoming: String,
    },

    /// Rename target already exists and is a different folder
    #[error("Filesystem conflict: cannot rename {from} to {to}, target exists and is not empty")]
    FilesystemConflict { from: PathBuf, to: PathBuf },

    /// Key not present in the metadata store
    #[error("Unknown song key: {0}")]
    UnknownKey(String),

    /// File or directory not found
    #[error("Not found: {0}")]
    NotFound(PathBuf),

    /// YAML/JSON encoding error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Watcher or lock file error
    #[error("Watch error: {0}")]
    Watch(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a corrupt store error.
    pub fn corrupt_store(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::CorruptStore {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a key collision error.
    pub fn collision(
        key: impl Into<String>,
        existing: impl Into<String>,
        incoming: impl Into<String>,
    ) -> Self {
        Self::KeyCollision {
            key: key.into(),
            existing: existing.into(),
            incoming: incoming.into(),
        }
    }

    /// Create a filesystem conflict error.
    pub fn conflict(from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        Self::FilesystemConflict {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound(path.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a watch error.
    pub fn watch(message: impl Into<String>) -> Self {
        Self::Watch(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error (ignoring context) is a key collision.
    pub fn is_collision(&self) -> bool {
        matches!(self.root(), Self::KeyCollision { .. })
    }

    /// Whether this error (ignoring context) is a filesystem conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self.root(), Self::FilesystemConflict { .. })
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialize(e.to_string())
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("/songs/missing");
        assert!(err.to_string().contains("/songs/missing"));
    }

    #[test]
    fn test_collision_names_both_sides() {
        let err = Error::collision("cafe", "Café", "Cafe");
        let msg = err.to_string();
        assert!(msg.contains("'cafe'"));
        assert!(msg.contains("Café"));
        assert!(msg.contains("Cafe"));
    }

    #[test]
    fn test_error_with_context() {
        let err = Error::conflict("/a/Foo", "/a/foo").context("while reconciling");
        let msg = err.to_string();
        assert!(msg.contains("while reconciling"));
        assert!(err.is_conflict());
        assert!(!err.is_collision());
    }

    #[test]
    fn test_result_ext() {
        let result: Result<()> = Err(Error::InvalidTitle("???".to_string()));
        let with_ctx = result.with_context("additional context");
        let err = with_ctx.unwrap_err();
        assert!(err.to_string().contains("additional context"));
        assert!(matches!(err.root(), Error::InvalidTitle(_)));
    }

    #[test]
    fn test_io_result_ext() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_context("opening store").unwrap_err();
        assert!(err.to_string().starts_with("opening store"));
        assert!(matches!(err.root(), Error::Io(_)));
    }
}
