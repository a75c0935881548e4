//! Unified error types for the vold-inventory-core library.
//!
//! Uses SNAFU for context-rich error handling, especially useful when the same
//! underlying error type (like `std::io::Error`) appears in different contexts.
//!
//! Note that most of the engine never returns these: capacity probes degrade
//! to zero, malformed mount-table lines are skipped and absent volumes are
//! reported as `None`. Errors are reserved for unreadable inputs and invalid
//! caller arguments.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Mount table could not be opened or a read failed midway.
    #[snafu(display("failed to read mount table at {}", path.display()))]
    MountTableRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// None of the candidate mount tables exist.
    #[snafu(display("no mount table found (tried {})", tried.join(", ")))]
    MountTableMissing { tried: Vec<String> },

    /// Caller passed a value that cannot be used for this call.
    #[snafu(display("invalid argument: {message}"))]
    InvalidArgument { message: String },

    /// Configuration file exists but cannot be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for `HostConfig`.
    #[snafu(display("failed to parse config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// A configuration value is out of range or malformed.
    #[snafu(display("invalid config value for {key}: {value}"))]
    InvalidConfigValue { key: String, value: String },

    /// Directory creation failed.
    #[snafu(display("failed to create directory at {}", path.display()))]
    DirCreate {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for mount table read errors.
    fn mount_table_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for config read errors.
    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for directory creation errors.
    fn dir_create_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn mount_table_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(MountTableReadSnafu { path: path.into() })
    }

    fn config_read_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ConfigReadSnafu { path: path.into() })
    }

    fn dir_create_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(DirCreateSnafu { path: path.into() })
    }
}
