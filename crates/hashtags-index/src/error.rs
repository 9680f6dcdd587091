#[cfg(feature = "sqlite")]
use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for hashtag index operations
#[derive(Debug, Error, Diagnostic)]
pub enum IndexError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Forum(#[from] ForumError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sqlite(#[from] SqliteError),
}

/// Sorted set storage errors
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("storage backend failed on {key}: {message}")]
    #[diagnostic(code(store::backend))]
    Backend { key: String, message: String },
}

/// Errors surfaced by the host forum's services
#[derive(Debug, Error, Diagnostic)]
pub enum ForumError {
    #[error("failed to look up {entity} {id}: {message}")]
    #[diagnostic(code(forum::lookup))]
    Lookup {
        entity: &'static str,
        id: String,
        message: String,
    },

    #[error("forum service unavailable: {message}")]
    #[diagnostic(code(forum::unavailable))]
    Unavailable { message: String },
}

/// SQLite storage errors
#[cfg(feature = "sqlite")]
#[derive(Debug, Error, Diagnostic)]
pub enum SqliteError {
    #[error("failed to open database at {}", path.display())]
    #[diagnostic(code(sqlite::open))]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to set pragma {pragma}")]
    #[diagnostic(code(sqlite::pragma))]
    Pragma {
        pragma: &'static str,
        #[source]
        source: rusqlite::Error,
    },

    #[error("migration failed: {message}")]
    #[diagnostic(code(sqlite::migration))]
    Migration { message: String },

    #[error("query failed: {message}")]
    #[diagnostic(code(sqlite::query))]
    Query { message: String },

    #[error("connection lock poisoned")]
    #[diagnostic(code(sqlite::lock))]
    LockPoisoned,
}

/// Configuration errors
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("invalid configuration value for {var}: {message}")]
    #[diagnostic(
        code(config::invalid),
        help("Unset {var} to use the default, or fix its value")
    )]
    Invalid { var: &'static str, message: String },
}

pub type Result<T> = std::result::Result<T, IndexError>;
