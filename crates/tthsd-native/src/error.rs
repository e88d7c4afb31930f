//! # Design
//!
//! - Keep error messages constant; store operational context in fields.
//! - Construction failures (load, symbols) and per-call failures share one enum so
//!   callers match on a single type.

use std::path::PathBuf;

use thiserror::Error;

use crate::session::{SessionHandle, SessionState};

/// Errors surfaced by the native engine binding.
#[derive(Debug, Error)]
pub enum BindingError {
    /// The shared library file does not exist.
    #[error("engine library not found")]
    LibraryNotFound {
        /// Resolved library path.
        path: PathBuf,
    },
    /// The shared library exists but the loader rejected it.
    #[error("engine library could not be opened")]
    LibraryOpen {
        /// Resolved library path.
        path: PathBuf,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
    /// A required export is missing from the loaded library.
    #[error("engine library is missing a required export")]
    SignatureMismatch {
        /// Name of the missing export.
        symbol: &'static str,
        /// Loader error.
        #[source]
        source: libloading::Error,
    },
    /// URL and save-path lists differ in length.
    #[error("task url and save path counts differ")]
    TaskCountMismatch {
        /// Number of URLs supplied.
        urls: usize,
        /// Number of save paths supplied.
        save_paths: usize,
    },
    /// The task batch cannot be handed to the engine.
    #[error("task batch cannot be passed to the engine")]
    InvalidTaskBatch {
        /// Static reason describing the problem.
        reason: &'static str,
    },
    /// A session option cannot be handed to the engine.
    #[error("invalid session option")]
    InvalidOption {
        /// Option name.
        field: &'static str,
        /// Static reason describing the problem.
        reason: &'static str,
    },
    /// The engine returned a failure code.
    #[error("engine call failed")]
    NativeCallFailure {
        /// Operation that failed.
        operation: &'static str,
        /// Session handle, absent for session creation.
        handle: Option<SessionHandle>,
        /// Raw code returned by the engine.
        code: i32,
    },
    /// The operation is not legal from the session's current state.
    #[error("operation not permitted in current session state")]
    OperationFailed {
        /// Operation that was refused.
        operation: &'static str,
        /// Session handle.
        handle: SessionHandle,
        /// State the session was in.
        state: SessionState,
    },
    /// The handle was never created by this controller, or was already released.
    #[error("unknown session handle")]
    UnknownSession {
        /// Handle supplied by the caller.
        handle: SessionHandle,
    },
    /// Every callback slot is leased.
    #[error("callback slots exhausted")]
    CallbackCapacity {
        /// Total number of slots.
        capacity: usize,
    },
}

/// Convenience alias for binding results.
pub type BindingResult<T> = Result<T, BindingError>;
