//! Log Tailing Error Hierarchy
//!
//! Defines the error types surfaced by the tailing engine, split between
//! request-time failures (returned synchronously to the caller of `tail`)
//! and infrastructure failures (configuration, I/O).

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tail request and subscription failures
    #[error(transparent)]
    Tail(#[from] TailError),

    /// Configuration source failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Configuration validation failures
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Disk I/O failures outside a running watcher
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Unrecoverable failures requiring process termination
    #[error("Fatal error: {0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// Request carried an empty path
    #[error("Tail path cannot be empty")]
    EmptyPath,

    /// Target path does not exist
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    /// Target path exists but cannot be opened or read
    #[error("File unreadable: {path}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Target path is a directory or other non-regular file
    #[error("Not a regular file: {path}")]
    NotAFile { path: PathBuf },

    /// Originating connection was already gone
    #[error("Connection closed")]
    ConnectionClosed,

    /// Subscriber sink rejected a line
    #[error("Sink delivery failed: {0}")]
    SinkDelivery(String),

    /// Watcher for the path stopped before the subscriber could attach
    #[error("Watcher for {path} is stopped")]
    WatcherStopped { path: PathBuf },
}

impl TailError {
    /// Classifies an `open`/`stat` failure on `path`.
    pub(crate) fn from_open(
        path: PathBuf,
        source: std::io::Error,
    ) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => TailError::NotFound { path },
            _ => TailError::Unreadable { path, source },
        }
    }
}
