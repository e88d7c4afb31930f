//! The seam between the session controller and whatever implements the engine ABI.
//!
//! [`crate::library::LibraryBinding`] forwards to a loaded shared library; the stub
//! engine (tests and the `stub` feature) runs in process.

use std::ffi::{CStr, c_int};

use crate::ffi::RawCallback;

#[cfg(any(test, feature = "stub"))]
#[allow(unsafe_code)]
pub mod stub;

/// Arguments of a session creation call, already converted to C types.
#[derive(Debug, Clone, Copy)]
pub struct NativeRequest<'a> {
    /// Serialized task array.
    pub tasks: &'a CStr,
    /// Number of tasks in `tasks`.
    pub task_count: c_int,
    /// Worker threads for the session.
    pub thread_count: c_int,
    /// Chunk size in megabytes.
    pub chunk_size_mb: c_int,
    /// Event callback, if any.
    pub callback: Option<RawCallback>,
    /// Mirror events to `remote_callback_url`.
    pub use_callback_url: bool,
    /// User-Agent override.
    pub user_agent: Option<&'a CStr>,
    /// Remote endpoint for mirrored events.
    pub remote_callback_url: Option<&'a CStr>,
    /// Raw socket instead of websocket for the remote endpoint.
    pub use_socket: Option<bool>,
    /// Parallel mode for create+start; ignored by `create`.
    pub is_multiple: Option<bool>,
}

/// Engine entry points, one per export. Returns are the raw engine codes.
///
/// Implementations must only read the request's strings during the call.
pub trait NativeEngine: Send + Sync {
    /// `get_downloader`: handle or a negative value on failure.
    fn create(&self, request: &NativeRequest<'_>) -> c_int;
    /// `start_download`: handle or a negative value on failure.
    fn create_and_start(&self, request: &NativeRequest<'_>) -> c_int;
    /// `start_download_id`.
    fn start_by_id(&self, handle: c_int) -> c_int;
    /// `start_multiple_downloads_id`.
    fn start_multiple_by_id(&self, handle: c_int) -> c_int;
    /// `pause_download`.
    fn pause(&self, handle: c_int) -> c_int;
    /// `resume_download`.
    fn resume(&self, handle: c_int) -> c_int;
    /// `stop_download`.
    fn stop(&self, handle: c_int) -> c_int;
}
