//! Error types for ipcbench
//!
//! Fatal failures of topology discovery and of the downstream benchmark
//! battery. Non-fatal degradations (missing sysfs roots, unreadable optional
//! attributes) are not errors; they are reported as
//! [`CollectionWarning`](crate::topology::CollectionWarning)s instead.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for ipcbench operations
#[derive(Error, Debug)]
pub enum IpcBenchError {
    /// I/O error during file operations
    #[error("I/O error at '{path}': {source}")]
    Io {
        /// File or directory being accessed
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A bitmap-list string (e.g. "0-3,8") could not be parsed
    #[error("Malformed bitmap list '{input}': {reason}")]
    MalformedBitmapList {
        /// The offending list
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// A sysfs attribute required for discovery is missing or unreadable
    #[error("Missing required topology attribute '{path}': {source}")]
    MissingAttribute {
        /// Attribute file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A sysfs attribute was readable but its contents made no sense
    #[error("Invalid value '{value}' in '{path}': {reason}")]
    InvalidAttribute {
        /// Attribute file
        path: PathBuf,
        /// Contents as read
        value: String,
        /// Why the contents were rejected
        reason: String,
    },

    /// The hardware description contradicts itself
    #[error("Inconsistent topology: {0}")]
    InconsistentTopology(String),

    /// An external benchmark program could not be run or failed
    #[error("Benchmark '{program}' failed ({args}): {reason}")]
    DownstreamInvocationFailure {
        /// Program path
        program: String,
        /// Space-separated arguments
        args: String,
        /// Spawn error or exit status
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        /// What was being done
        context: String,
        /// Wrapped error
        #[source]
        source: Box<IpcBenchError>,
    },
}

impl IpcBenchError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a bitmap-list parse error
    pub fn malformed_list(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedBitmapList {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid attribute error
    pub fn invalid_attribute(
        path: impl Into<PathBuf>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidAttribute {
            path: path.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Check if this error came from the external benchmark battery rather
    /// than from topology discovery
    pub fn is_downstream(&self) -> bool {
        match self {
            Self::DownstreamInvocationFailure { .. } => true,
            Self::WithContext { source, .. } => source.is_downstream(),
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. }
            | Self::MissingAttribute { path, .. }
            | Self::InvalidAttribute { path, .. } => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for ipcbench operations
pub type Result<T> = std::result::Result<T, IpcBenchError>;

impl From<std::io::Error> for IpcBenchError {
    fn from(err: std::io::Error) -> Self {
        IpcBenchError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for IpcBenchError {
    fn from(err: serde_json::Error) -> Self {
        IpcBenchError::ConfigError(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| IpcBenchError::io(path, e))
    }
}
