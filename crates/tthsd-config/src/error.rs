//! Error types for configuration operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Field contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Section that failed validation.
        section: &'static str,
        /// Field that failed validation.
        field: &'static str,
        /// Offending value when available.
        value: Option<String>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
    },
    /// Environment override carried an unusable value.
    #[error("invalid environment override")]
    InvalidEnv {
        /// Variable name.
        variable: &'static str,
        /// Value read from the environment.
        value: String,
    },
    /// Configuration file could not be read.
    #[error("configuration file could not be read")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
    /// Configuration document was not valid JSON for the model.
    #[error("configuration document could not be parsed")]
    Parse {
        /// Source parse error.
        #[source]
        source: serde_json::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;
