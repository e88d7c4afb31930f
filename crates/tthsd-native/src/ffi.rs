//! Raw C ABI of the engine's exported functions.

use std::ffi::{c_char, c_int};

/// Callback invoked by the engine with the envelope and payload JSON strings.
pub type RawCallback = unsafe extern "C" fn(*const c_char, *const c_char);

/// `get_downloader`: creates a session without starting it.
pub(crate) type GetDownloaderFn = unsafe extern "C" fn(
    tasks: *const c_char,
    task_count: c_int,
    thread_count: c_int,
    chunk_size_mb: c_int,
    callback: Option<RawCallback>,
    use_callback_url: bool,
    user_agent: *const c_char,
    remote_callback_url: *const c_char,
    use_socket: *const bool,
) -> c_int;

/// `start_download`: creates a session and starts it.
pub(crate) type StartDownloadFn = unsafe extern "C" fn(
    tasks: *const c_char,
    task_count: c_int,
    thread_count: c_int,
    chunk_size_mb: c_int,
    callback: Option<RawCallback>,
    use_callback_url: bool,
    user_agent: *const c_char,
    remote_callback_url: *const c_char,
    use_socket: *const bool,
    is_multiple: *const bool,
) -> c_int;

/// Lifecycle exports taking a session handle; `0` means success.
pub(crate) type HandleFn = unsafe extern "C" fn(handle: c_int) -> c_int;

pub(crate) const GET_DOWNLOADER: &[u8] = b"get_downloader\0";
pub(crate) const START_DOWNLOAD: &[u8] = b"start_download\0";
pub(crate) const START_DOWNLOAD_ID: &[u8] = b"start_download_id\0";
pub(crate) const START_MULTIPLE_DOWNLOADS_ID: &[u8] = b"start_multiple_downloads_id\0";
pub(crate) const PAUSE_DOWNLOAD: &[u8] = b"pause_download\0";
pub(crate) const RESUME_DOWNLOAD: &[u8] = b"resume_download\0";
pub(crate) const STOP_DOWNLOAD: &[u8] = b"stop_download\0";

/// Export name without the trailing NUL, for error context.
pub(crate) fn symbol_name(symbol: &'static [u8]) -> &'static str {
    symbol
        .strip_suffix(b"\0")
        .and_then(|name| std::str::from_utf8(name).ok())
        .unwrap_or("<non-utf8 symbol>")
}
