//! Loading configuration from JSON documents and environment overrides.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{ConfigError, ConfigResult};
use crate::model::{BindingConfig, PauseCapability};
use crate::validate::validate;

/// Environment variable overriding [`BindingConfig::library_path`].
pub const LIBRARY_PATH_ENV: &str = "TTHSD_LIBRARY_PATH";
/// Environment variable overriding [`BindingConfig::pause_capability`].
pub const PAUSE_CAPABILITY_ENV: &str = "TTHSD_PAUSE_CAPABILITY";

impl BindingConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents or unknown keys and
    /// [`ConfigError::InvalidField`] when validation fails.
    pub fn from_json_str(document: &str) -> ConfigResult<Self> {
        let config: Self =
            serde_json::from_str(document).map_err(|source| ConfigError::Parse { source })?;
        validate(&config)?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] when the file cannot be read, otherwise the errors
    /// of [`BindingConfig::from_json_str`].
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let document = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&document)
    }

    /// Load configuration from an optional file, then apply process environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Propagates file, parse, override and validation failures.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let base = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        base.with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides resolved through `lookup` and re-validate.
    ///
    /// Empty values are ignored so an exported-but-blank variable does not clobber
    /// the file setting.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnv`] for unparseable overrides and
    /// [`ConfigError::InvalidField`] when the merged configuration is invalid.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(LIBRARY_PATH_ENV).filter(|value| !value.trim().is_empty()) {
            debug!(variable = LIBRARY_PATH_ENV, path = %path, "library path overridden");
            self.library_path = Some(PathBuf::from(path));
        }

        if let Some(raw) = lookup(PAUSE_CAPABILITY_ENV).filter(|value| !value.trim().is_empty())
        {
            let capability =
                raw.parse::<PauseCapability>()
                    .map_err(|()| ConfigError::InvalidEnv {
                        variable: PAUSE_CAPABILITY_ENV,
                        value: raw.clone(),
                    })?;
            debug!(
                variable = PAUSE_CAPABILITY_ENV,
                capability = %capability,
                "pause capability overridden"
            );
            self.pause_capability = capability;
        }

        validate(&self)?;
        Ok(self)
    }
}
