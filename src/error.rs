//! Error types for gate-zones.

use std::path::PathBuf;

use thiserror::Error;

use crate::pattern::PatternError;

/// Errors that can occur while generating or watching zone sets.
#[derive(Debug, Error)]
pub enum WatchdogError {
    /// Malformed zone specification document.
    #[error("Invalid zone specification: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// A domain pattern is unbounded, oversized or syntactically invalid.
    #[error("Pattern {pattern:?} under {root}: {source}")]
    PatternExpansion {
        /// Root domain the pattern belongs to.
        root: String,
        /// The offending pattern text.
        pattern: String,
        /// Underlying expansion failure.
        #[source]
        source: PatternError,
    },

    /// Directory or file operation failure.
    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        /// Path the operation was acting on.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Remote specification could not be fetched.
    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    /// HTTP client error while fetching a remote specification.
    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// The nameserver reload command failed.
    #[error("Reload trigger failed: {0}")]
    ReloadTrigger(String),

    /// Invalid startup configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// File watcher error.
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
}

impl WatchdogError {
    /// Wrap an IO error with the path it occurred on.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }
}
