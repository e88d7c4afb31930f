//! Typed configuration models.
//!
//! # Design
//! - Pure data carriers; IO lives in `loader.rs` and checks in `validate.rs`.
//! - Unknown keys are rejected so typos surface at load time.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults::{DEFAULT_CHUNK_SIZE_MB, DEFAULT_THREAD_COUNT};

/// How the loaded engine treats `pause`.
///
/// The engine exposes no version query, so this must be configured rather than
/// probed: a failed pause or resume looks the same as an unknown handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseCapability {
    /// Pause keeps the session alive and `resume` continues it.
    #[default]
    Resumable,
    /// Pause tears the session down; it can never be resumed.
    Destructive,
}

impl PauseCapability {
    /// Render the capability as its lowercase string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Resumable => "resumable",
            Self::Destructive => "destructive",
        }
    }
}

impl Display for PauseCapability {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for PauseCapability {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "resumable" => Ok(Self::Resumable),
            "destructive" => Ok(Self::Destructive),
            _ => Err(()),
        }
    }
}

/// Per-session tunables forwarded to the engine on create/start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionDefaults {
    /// Worker threads the engine may spawn for the session.
    pub thread_count: u32,
    /// Chunk size in megabytes.
    pub chunk_size_mb: u32,
    /// User-Agent header override; the engine default applies when `None`.
    pub user_agent: Option<String>,
    /// Whether the engine should mirror events to `remote_callback_url`.
    pub use_callback_url: bool,
    /// Remote endpoint receiving mirrored events.
    pub remote_callback_url: Option<String>,
    /// Use a raw socket instead of a websocket for the remote endpoint.
    pub use_socket: Option<bool>,
    /// Download the batch in parallel when started through create+start.
    pub is_multiple: Option<bool>,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            thread_count: DEFAULT_THREAD_COUNT,
            chunk_size_mb: DEFAULT_CHUNK_SIZE_MB,
            user_agent: None,
            use_callback_url: false,
            remote_callback_url: None,
            use_socket: None,
            is_multiple: None,
        }
    }
}

/// Top-level binding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BindingConfig {
    /// Explicit shared library path; the platform default name is used when `None`.
    pub library_path: Option<PathBuf>,
    /// Pause semantics of the configured engine.
    pub pause_capability: PauseCapability,
    /// Defaults applied to every session.
    pub session: SessionDefaults,
}
